//! The draft state one composer session shares with the saves it queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use crate::models::{Account, Attachment, MessageId};

use super::action::ComposeAction;
use super::attachments::AttachmentSet;
use super::draft::{Draft, SourceMessage};

/// Everything a save needs to see, guarded as one unit. The save lane holds
/// the lock for the whole sync-then-persist sequence.
#[derive(Debug, Default)]
pub(crate) struct DraftState {
    pub draft: Draft,
    pub account: Option<Account>,
    pub attachments: AttachmentSet,
    pub source: Option<SourceMessage>,
    pub source_attachments: Vec<Attachment>,
    pub include_quoted_text: bool,
    pub quoted_text_shown: bool,
    pub action: ComposeAction,
}

/// Shared between a controller and the saves it queued, which may outlive it.
///
/// The draft id and the lifecycle flags live outside the state lock so the
/// interactive side can read them while a save holds it.
#[derive(Debug, Default)]
pub(crate) struct Session {
    state: Mutex<DraftState>,
    draft_id: OnceLock<MessageId>,
    changing_config: AtomicBool,
    discarded: AtomicBool,
}

impl Session {
    pub fn new(state: DraftState) -> Self {
        Self {
            state: Mutex::new(state),
            ..Self::default()
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, DraftState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A draft keeps the id of its first insert for the rest of the session.
    pub fn set_draft_id(&self, id: MessageId) {
        if let Err(id) = self.draft_id.set(id) {
            if self.draft_id.get() != Some(&id) {
                log::warn!("Draft id already set, ignoring {id}");
            }
        }
    }

    pub fn draft_id(&self) -> Option<MessageId> {
        self.draft_id.get().copied()
    }

    pub fn set_changing_config(&self, changing: bool) {
        self.changing_config.store(changing, Ordering::SeqCst);
    }

    /// Torn down only to be recreated (rotation); completion toasts are
    /// pointless then.
    pub fn is_changing_config(&self) -> bool {
        self.changing_config.load(Ordering::SeqCst)
    }

    pub fn mark_discarded(&self) {
        self.discarded.store(true, Ordering::SeqCst);
    }

    pub fn is_discarded(&self) -> bool {
        self.discarded.load(Ordering::SeqCst)
    }
}
