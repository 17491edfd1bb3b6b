//! Background loads of drafts, source messages and attachment lists.
//!
//! Store reads run on the blocking pool; results come back to the owning
//! controller as [`LoadEvent`]s on its channel.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::{ComposeError, Result};
use crate::models::{Account, Attachment, Body, Message, MessageId};
use crate::store::MailStore;

use super::queue::SaveTask;

/// What to load: a known message, or whatever draft a pending save produces.
#[derive(Debug, Clone)]
pub enum LoadTarget {
    Message(MessageId),
    AfterSave(SaveTask),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedMessage {
    pub message: Message,
    pub body: Body,
    pub account: Account,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MessagePurpose {
    Draft { restore_views: bool },
    Source { restore_views: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttachmentOwner {
    Draft,
    Source { restore_views: bool },
}

#[derive(Debug)]
pub(crate) enum LoadEvent {
    Message {
        purpose: MessagePurpose,
        result: Result<LoadedMessage>,
    },
    Attachments {
        owner: AttachmentOwner,
        attachments: Vec<Attachment>,
    },
}

/// Load a message with its body and account. Anything missing is a failure;
/// so is a pending save that fails or is interrupted.
///
/// Blocks; run it on a background thread.
pub fn load_message(
    store: &dyn MailStore,
    target: &LoadTarget,
    cancel: watch::Receiver<bool>,
) -> Result<LoadedMessage> {
    let id = match target {
        LoadTarget::Message(id) => *id,
        LoadTarget::AfterSave(task) => {
            task.wait_blocking(cancel)
                .map_err(|e| ComposeError::LoadFailed {
                    message_id: None,
                    reason: format!("save task {} did not finish: {e}", task.id()),
                })?
        }
    };

    let failed = move |reason: String| ComposeError::LoadFailed {
        message_id: Some(id),
        reason,
    };
    let message = store
        .restore_message(id)
        .map_err(failed)?
        .ok_or_else(|| failed("no such message".into()))?;
    let account = store
        .restore_account(message.account_id)
        .map_err(failed)?
        .ok_or_else(|| failed(format!("no account {}", message.account_id)))?;
    let body = store
        .restore_body(id)
        .map_err(failed)?
        .ok_or_else(|| failed("no body".into()))?;

    Ok(LoadedMessage {
        message,
        body,
        account,
    })
}

/// Attachments of a message. Never fails: errors read as an empty list.
pub fn load_attachments(store: &dyn MailStore, message_id: MessageId) -> Vec<Attachment> {
    store.restore_attachments(message_id).unwrap_or_else(|e| {
        log::warn!("Loading attachments of {message_id} failed: {e}");
        Vec::new()
    })
}

// ---------------------------------------------------------------------------
// Tracker: cancels every load of a session at once
// ---------------------------------------------------------------------------

pub(crate) struct Tracker {
    cancel: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl Tracker {
    pub fn new() -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            cancel,
            handles: Vec::new(),
        }
    }

    pub fn token(&self) -> watch::Receiver<bool> {
        self.cancel.subscribe()
    }

    fn track(&mut self, handle: JoinHandle<()>) {
        self.handles.retain(|h| !h.is_finished());
        self.handles.push(handle);
    }

    /// Abort outstanding loads and wake any blocked on a pending save.
    pub fn cancel_all_interrupt(&mut self) {
        self.cancel.send_replace(true);
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }

    pub fn spawn_message_load(
        &mut self,
        store: Arc<dyn MailStore>,
        target: LoadTarget,
        purpose: MessagePurpose,
        events: mpsc::UnboundedSender<LoadEvent>,
    ) {
        let cancel = self.token();
        let handle = tokio::spawn(async move {
            let result =
                tokio::task::spawn_blocking(move || load_message(&*store, &target, cancel))
                    .await
                    .unwrap_or_else(|e| {
                        Err(ComposeError::LoadFailed {
                            message_id: None,
                            reason: format!("load task died: {e}"),
                        })
                    });
            if let Err(e) = &result {
                log::warn!("{purpose:?} load failed: {e}");
            }
            let _ = events.send(LoadEvent::Message { purpose, result });
        });
        self.track(handle);
    }

    pub fn spawn_attachment_load(
        &mut self,
        store: Arc<dyn MailStore>,
        message_id: MessageId,
        owner: AttachmentOwner,
        events: mpsc::UnboundedSender<LoadEvent>,
    ) {
        let handle = tokio::spawn(async move {
            let attachments =
                tokio::task::spawn_blocking(move || load_attachments(&*store, message_id))
                    .await
                    .unwrap_or_default();
            let _ = events.send(LoadEvent::Attachments { owner, attachments });
        });
        self.track(handle);
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        self.cancel_all_interrupt();
    }
}
