pub mod auth;
pub mod rate_limit;

pub use auth::{auth_middleware, CurrentUser};
pub use rate_limit::{limit_for_tier, rate_limit_middleware};
