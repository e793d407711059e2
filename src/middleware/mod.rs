pub mod auth;
pub mod internal;
pub mod response;

pub use auth::{edge_auth_middleware, root_auth_middleware, InternalIdentity};
pub use internal::internal_context_middleware;
pub use response::{ApiResponse, ApiResult};
