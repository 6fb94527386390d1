// This module re-exports important pieces for convenience,
// so we can "use crate::config::*" easily.
pub mod graphql;
pub mod logging;
pub mod refresh;
pub mod retry;
pub mod store;
pub mod types;

pub use graphql::*;
pub use logging::*;
pub use refresh::*;
pub use retry::*;
pub use store::*;
pub use types::*;
