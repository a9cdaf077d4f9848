// Public handlers: token acquisition, service status and profile reads
pub mod auth;
pub mod profile;
pub mod system;
pub mod users;

pub use auth::login as auth_login;
pub use profile::github as profile_github;
pub use profile::list as profile_list;
pub use profile::by_user as profile_by_user;
pub use system::{health, root};
pub use users::register as user_register;
