//! Authentication
//!
//! Handles:
//! - Password hashing
//! - Session management
//! - The `CurrentUser` extractor

mod middleware;
pub mod password;
pub mod session;

pub use middleware::CurrentUser;
pub use password::{hash_password, verify_password};
pub use session::{SESSION_COOKIE, Session, create_session_token, verify_session_token};
