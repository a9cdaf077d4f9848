// Two handler tiers:
// public (no token) and protected (token gate applied as a route layer)
pub mod protected;
pub mod public;
