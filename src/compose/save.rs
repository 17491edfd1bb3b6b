//! The body of a save/send task, run on the save lane.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{ComposeError, Result};
use crate::models::MessageId;
use crate::store::flags::ATTACHMENT_FLAG_DOWNLOAD_FORWARD;
use crate::store::MailStore;
use crate::transmit::Transmitter;

use super::draft::SyncInput;
use super::shell::{ComposeShell, Notice};
use super::state::Session;

/// Everything a queued save holds on to. Owned, so the job survives the
/// controller that submitted it.
pub(crate) struct SaveJob {
    pub store: Arc<dyn MailStore>,
    pub transmitter: Arc<dyn Transmitter>,
    pub shell: Arc<dyn ComposeShell>,
    pub session: Arc<Session>,
    pub send: bool,
}

impl SaveJob {
    pub fn run(self) -> Result<MessageId> {
        match self.persist() {
            Ok(id) => Ok(id),
            Err(e) => {
                self.shell.notify(Notice::SaveFailed);
                Err(e)
            }
        }
    }

    fn persist(&self) -> Result<MessageId> {
        let store = &*self.store;
        let mut guard = self.session.lock();
        let state = &mut *guard;
        let account = state.account.clone().ok_or(ComposeError::NotLoaded)?;

        let fields = self.shell.read_fields();
        state.draft.sync(
            &SyncInput {
                fields: &fields,
                account: &account,
                has_attachments: !state.attachments.is_empty(),
                source: state.source.as_ref(),
                quoted_text_shown: state.quoted_text_shown,
                include_quoted_text: state.include_quoted_text,
                forward: state.action.is_forward(),
                now_ms: now_ms(),
            },
            self.send,
        );

        let draft_id = match state.draft.id() {
            Some(id) => {
                store.update_draft(id, &state.draft.message)?;
                store.update_body(id, &state.draft.body)?;
                id
            }
            None => {
                let id = store.insert_draft(&state.draft.message, &state.draft.body)?;
                state.draft.message.id = Some(id);
                state.draft.body.message_id = Some(id);
                self.session.set_draft_id(id);
                log::debug!("Draft stored as {id}");
                id
            }
        };
        state.attachments.bind(Some(draft_id));

        let mut needs_download = false;
        for attachment in state.attachments.items_mut() {
            let flags_before = attachment.flags;
            if attachment.content_uri.is_none() && !attachment.is_smart_forward() {
                attachment.flags |= ATTACHMENT_FLAG_DOWNLOAD_FORWARD;
                needs_download = true;
            }

            if !attachment.is_saved() {
                attachment.message_id = Some(draft_id);
                attachment.id = Some(store.insert_attachment(attachment)?);
            } else if attachment.message_id != Some(draft_id) {
                // Still owned by the source message: copy it over.
                let mut copy = attachment.clone();
                copy.id = None;
                copy.message_id = Some(draft_id);
                attachment.id = Some(store.insert_attachment(&copy)?);
                attachment.message_id = Some(draft_id);
            } else if attachment.flags != flags_before {
                store.update_attachment(attachment)?;
            }
        }

        if self.send {
            if needs_download {
                self.shell.notify(Notice::SendDelayed);
            }
            self.transmitter
                .send_message(draft_id, state.draft.message.account_id);
        } else if !self.session.is_changing_config() && !self.session.is_discarded() {
            self.shell.notify(Notice::Saved);
        }
        Ok(draft_id)
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
