pub mod error_record;
pub mod operation;
pub mod response;

// Re-export the wire and record types so callers can "use crate::models::*".
pub use error_record::{ErrorOrigin, ErrorRecord};
pub use operation::{GraphQLRequest, Operation};
pub use response::{GraphQLError, GraphQLResponse, UNAUTHENTICATED};
