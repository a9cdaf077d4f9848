pub mod embedded;
pub mod github;
pub mod post_service;
pub mod profile_service;
pub mod user_service;

pub use embedded::{EmbeddedEditor, EmbeddedList};
pub use github::{GithubClient, GithubError};
pub use post_service::{PostInput, PostService};
pub use profile_service::{EducationInput, ExperienceInput, ProfileInput, ProfileOutcome, ProfileService};
pub use user_service::{LoginInput, RegisterInput, TokenResponse, UserService};
