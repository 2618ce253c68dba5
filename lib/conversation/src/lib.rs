//! Conversation sessions for chatbridge.
//!
//! This crate provides:
//!
//! - **Session Registry**: maps conversation ids to sessions and mints new ones
//! - **Session**: a conversation's bound peer and its transcript logger
//! - **Messages**: the role-tagged chat messages callers submit

pub mod error;
pub mod message;
pub mod registry;
pub mod session;

pub use error::{ConversationError, SessionError};
pub use message::{ChatMessage, ChatRole, ChatTurn};
pub use registry::{ResolvedSession, SessionRegistry};
pub use session::ConversationSession;
