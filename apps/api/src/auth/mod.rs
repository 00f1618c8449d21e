//! # Authentication & Authorization
//!
//! ```text
//! request ──► middleware::resolve_identity ──► policy::Authorized<P> ──► handler
//!             (token → Identity, fail open)    (role allow-list, 403)
//! ```

pub mod jwt;
pub mod middleware;
pub mod password;
pub mod policy;

pub use jwt::{Claims, JwtManager};
pub use policy::{AdminOnly, AnyUser, Authorized, Management, RolePolicy, Staff};
