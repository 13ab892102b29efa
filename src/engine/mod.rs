pub mod aggregate;
mod coordinator;
pub mod score;
pub mod validate;

pub use coordinator::{ClientIdentity, Coordinator, SessionError};
pub use validate::{ContentFilter, DenyListFilter, NicknameError};
