pub mod openid_refresher;
pub mod refresher;
pub mod session;
pub mod status;

// Re-export so callers can do "use crate::auth::{AuthSession, AuthStatus};"
pub use openid_refresher::OpenIdRefresher;
pub use refresher::{create_refresher, NoRefresher, Refresher};
pub use session::AuthSession;
pub use status::{next_status, AuthEvent, AuthStatus, InvalidTransition, StatusMachine};
