//! Error types for the composition engine.

use thiserror::Error;

use crate::compose::ComposeAction;
use crate::models::{AccountId, MessageId};

/// Errors that can occur while loading, editing, saving or sending a draft.
#[derive(Debug, Error)]
pub enum ComposeError {
    /// The message, its body or its account could not be read.
    #[error("failed to load message {message_id:?}: {reason}")]
    LoadFailed {
        message_id: Option<MessageId>,
        reason: String,
    },

    /// A save/send task did not produce a draft id.
    #[error("save task failed: {0}")]
    SaveFailed(String),

    /// A background wait was cancelled by session teardown.
    #[error("interrupted while waiting for a pending save")]
    Interrupted,

    #[error("attachment {filename} is {size} bytes, limit is {limit}")]
    AttachmentTooLarge {
        filename: String,
        size: u64,
        limit: u64,
    },

    #[error("cannot switch from {from:?} to {to:?}")]
    InvalidTransition {
        from: ComposeAction,
        to: ComposeAction,
    },

    #[error("invalid address in {0}")]
    InvalidAddress(String),

    #[error("no recipients")]
    NoRecipients,

    /// Save requested before the draft/source finished loading.
    #[error("draft state not loaded yet")]
    NotLoaded,

    #[error("account {0} not found")]
    AccountNotFound(AccountId),

    #[error("store error: {0}")]
    Store(String),

    #[error("save lane error: {0}")]
    Lane(String),
}

impl From<String> for ComposeError {
    fn from(e: String) -> Self {
        Self::Store(e)
    }
}

pub type Result<T> = std::result::Result<T, ComposeError>;
