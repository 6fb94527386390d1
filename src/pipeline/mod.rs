//! The request pipeline: every operation passes the stages in order
//! `auth → error → retry → normalize` and is then sent by the transport.

pub mod auth_stage;
pub mod base;
pub mod error_stage;
pub mod http_transport;
pub mod normalize_stage;
pub mod retry_stage;

pub use auth_stage::{attach_bearer, detach_bearer, AuthStage};
pub use base::{Next, Pipeline, Stage, Transport};
pub use error_stage::ErrorStage;
pub use http_transport::HttpTransport;
pub use normalize_stage::NormalizeStage;
pub use retry_stage::{Backoff, RetryPolicy, RetryStage};
