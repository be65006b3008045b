//! Outbound notification seam
//!
//! The tracking engine only ever needs to push plain text at a chat; the
//! trait keeps it testable without a Telegram token.

use crate::error::Result;
use async_trait::async_trait;

/// Sends a text message to a chat
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, chat_id: i64, text: &str) -> Result<()>;
}
