pub mod auth;
pub mod response;

pub use auth::{authenticate, StaffUser};
pub use response::{created, no_content, ApiJson, ApiQuery, ApiResult, ResourceId};
