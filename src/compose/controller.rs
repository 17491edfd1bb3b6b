//! One composer session: owns the in-memory draft, drives loads, and feeds
//! the save lane.
//!
//! A controller lives on the interactive side and never calls the store
//! itself; load results are applied as they are pulled through
//! [`ComposeController::next_event`] or [`ComposeController::settle`].
//! It must be created and driven inside a tokio runtime.
//!
//! The draft sits behind a lock that the save lane holds for a whole save,
//! so methods that edit it (`set_action`, `add_attachment`,
//! `remove_attachment`, `set_include_quoted_text`, `attachments`) can wait
//! for a save in progress. `draft_id`, `action`, `saved_session`, `save`,
//! `send`, `discard` and `teardown` never wait on the lane.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::address::Address;
use crate::config::ComposeConfig;
use crate::error::{ComposeError, Result};
use crate::models::{Account, AccountId, Attachment, AttachmentId, MessageId};
use crate::store::MailStore;
use crate::transmit::Transmitter;

use super::action::{
    forward_subject, infer_action, reply_recipients, reply_subject, ComposeAction,
};
use super::attachments::reconcile;
use super::draft::{initial_text, Draft, SourceMessage};
use super::load::{
    AttachmentOwner, LoadEvent, LoadTarget, LoadedMessage, MessagePurpose, Tracker,
};
use super::queue::{SaveQueue, SaveTask, SaveTaskId};
use super::save::SaveJob;
use super::share::ShareRequest;
use super::shell::{ComposeFields, ComposeShell, Notice};
use super::state::{DraftState, Session};

/// Collaborators shared by every composer in the process.
#[derive(Clone)]
pub struct ComposeContext {
    pub store: Arc<dyn MailStore>,
    pub transmitter: Arc<dyn Transmitter>,
    pub saves: SaveQueue,
    pub config: Arc<ComposeConfig>,
}

impl ComposeContext {
    /// Starts the save lane.
    pub fn new(
        store: Arc<dyn MailStore>,
        transmitter: Arc<dyn Transmitter>,
        config: ComposeConfig,
    ) -> Result<Self> {
        let saves = SaveQueue::start().map_err(ComposeError::Lane)?;
        Ok(Self {
            store,
            transmitter,
            saves,
            config: Arc::new(config),
        })
    }
}

/// Why the composer was opened.
#[derive(Debug, Clone, PartialEq)]
pub enum ComposeRequest {
    New { account_id: AccountId },
    Share(ShareRequest),
    Reply { source_id: MessageId },
    ReplyAll { source_id: MessageId },
    Forward { source_id: MessageId },
    EditDraft { draft_id: MessageId },
}

impl ComposeRequest {
    pub fn action(&self) -> ComposeAction {
        match self {
            Self::New { .. } | Self::Share(_) => ComposeAction::Compose,
            Self::Reply { .. } => ComposeAction::Reply,
            Self::ReplyAll { .. } => ComposeAction::ReplyAll,
            Self::Forward { .. } => ComposeAction::Forward,
            Self::EditDraft { .. } => ComposeAction::EditDraft,
        }
    }
}

/// What a torn-down session leaves behind for its replacement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SavedSession {
    pub draft_id: Option<MessageId>,
    pub last_save_task: Option<SaveTaskId>,
    pub action: ComposeAction,
    pub cc_bcc_shown: bool,
    pub quoted_text_shown: bool,
}

#[derive(Debug, Clone, Copy)]
enum Cleanup {
    Message(MessageId),
    Attachment(AttachmentId),
}

/// Best-effort delete; failures are logged and dropped.
fn cleanup(store: &Arc<dyn MailStore>, target: Cleanup) {
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || {
        let result = match target {
            Cleanup::Message(id) => store.delete_message(id),
            Cleanup::Attachment(id) => store.delete_attachment(id),
        };
        if let Err(e) = result {
            log::warn!("Ignoring failed cleanup of {target:?}: {e}");
        }
    });
}

pub struct ComposeController {
    ctx: ComposeContext,
    shell: Arc<dyn ComposeShell>,
    session: Arc<Session>,
    tracker: Tracker,
    events_tx: mpsc::UnboundedSender<LoadEvent>,
    events_rx: mpsc::UnboundedReceiver<LoadEvent>,
    pending_loads: usize,
    needs_saving: bool,
    loaded: bool,
    closed: bool,
    cc_bcc_shown: bool,
    // Mirrors of the locked state, readable while a save holds the lock.
    action: ComposeAction,
    quoted_text_shown: bool,
    last_save: Option<SaveTask>,
}

impl ComposeController {
    fn with_action(
        ctx: ComposeContext,
        shell: Arc<dyn ComposeShell>,
        action: ComposeAction,
    ) -> Self {
        let state = DraftState {
            draft: Draft::new(0),
            include_quoted_text: true,
            action,
            ..DraftState::default()
        };
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            ctx,
            shell,
            session: Arc::new(Session::new(state)),
            tracker: Tracker::new(),
            events_tx,
            events_rx,
            pending_loads: 0,
            needs_saving: false,
            loaded: false,
            closed: false,
            cc_bcc_shown: false,
            action,
            quoted_text_shown: false,
            last_save: None,
        }
    }

    /// Start a fresh session for `request`.
    pub fn open(
        ctx: ComposeContext,
        shell: Arc<dyn ComposeShell>,
        request: ComposeRequest,
    ) -> Result<Self> {
        let mut this = Self::with_action(ctx, shell, request.action());
        this.resolve(request)?;
        Ok(this)
    }

    /// Recreate a session torn down earlier. The shell keeps whatever field
    /// values it had; only the draft behind them is reloaded. If nothing was
    /// ever saved, `request` is handled as if freshly opened.
    pub fn restore(
        ctx: ComposeContext,
        shell: Arc<dyn ComposeShell>,
        request: ComposeRequest,
        saved: SavedSession,
    ) -> Result<Self> {
        let mut this = Self::with_action(ctx, shell, saved.action);
        if saved.cc_bcc_shown {
            this.show_cc_bcc();
        }
        this.session.lock().quoted_text_shown = saved.quoted_text_shown;
        this.quoted_text_shown = saved.quoted_text_shown;
        if let Some(id) = saved.draft_id {
            this.session.set_draft_id(id);
        }

        let pending = saved
            .last_save_task
            .and_then(|id| this.ctx.saves.find(id));
        // A registered task may still be writing the draft; load after it.
        let target = match (pending, saved.draft_id) {
            (Some(task), _) => {
                this.last_save = Some(task.clone());
                Some(LoadTarget::AfterSave(task))
            }
            (None, Some(id)) => Some(LoadTarget::Message(id)),
            (None, None) => None,
        };

        match target {
            Some(target) => {
                log::debug!("Resuming composer on {target:?}");
                this.session.lock().draft.message.id = saved.draft_id;
                this.spawn_message_load(target, MessagePurpose::Draft { restore_views: false });
            }
            None => this.resolve(request)?,
        }
        Ok(this)
    }

    fn resolve(&mut self, request: ComposeRequest) -> Result<()> {
        match request {
            ComposeRequest::New { account_id } => {
                let account = self.restore_account(account_id)?;
                let fields = ComposeFields {
                    body: initial_text("", account.signature.as_deref()),
                    ..ComposeFields::default()
                };
                self.shell.write_fields(&fields);
                self.adopt_account(account);
                self.loaded = true;
            }
            ComposeRequest::Share(share) => {
                let account = self.restore_account(share.account_id)?;
                let content = share.resolve(account.signature.as_deref(), &self.ctx.config);
                self.shell.write_fields(&content.fields);
                if content.fields.has_cc_or_bcc() {
                    self.show_cc_bcc();
                }
                self.adopt_account(account);
                for attachment in content.attachments {
                    // Rejections are reported by the shell notice.
                    let _ = self.add_attachment(attachment);
                }
                self.set_needs_saving(true);
                self.loaded = true;
            }
            ComposeRequest::Reply { source_id }
            | ComposeRequest::ReplyAll { source_id }
            | ComposeRequest::Forward { source_id } => {
                self.spawn_message_load(
                    LoadTarget::Message(source_id),
                    MessagePurpose::Source { restore_views: true },
                );
            }
            ComposeRequest::EditDraft { draft_id } => {
                self.spawn_message_load(
                    LoadTarget::Message(draft_id),
                    MessagePurpose::Draft { restore_views: true },
                );
            }
        }
        Ok(())
    }

    fn restore_account(&self, id: AccountId) -> Result<Account> {
        self.ctx
            .store
            .restore_account(id)?
            .ok_or(ComposeError::AccountNotFound(id))
    }

    fn adopt_account(&self, account: Account) {
        let mut state = self.session.lock();
        state.draft.message.account_id = account.id;
        state.account = Some(account);
    }

    // -- accessors -----------------------------------------------------------

    pub fn needs_saving(&self) -> bool {
        self.needs_saving
    }

    /// Whether the draft (or source) has loaded far enough to be saved.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn action(&self) -> ComposeAction {
        self.action
    }

    pub fn draft_id(&self) -> Option<MessageId> {
        self.session.draft_id()
    }

    pub fn attachments(&self) -> Vec<Attachment> {
        self.session.lock().attachments.items().to_vec()
    }

    pub fn include_quoted_text(&self) -> bool {
        self.session.lock().include_quoted_text
    }

    pub fn quoted_text_shown(&self) -> bool {
        self.quoted_text_shown
    }

    /// The last save this session queued, if it has not finished.
    pub fn pending_save(&self) -> Option<SaveTask> {
        self.last_save
            .as_ref()
            .and_then(|task| self.ctx.saves.find(task.id()))
    }

    pub fn saved_session(&self) -> SavedSession {
        SavedSession {
            draft_id: self.session.draft_id(),
            last_save_task: self.last_save.as_ref().map(SaveTask::id),
            action: self.action,
            cc_bcc_shown: self.cc_bcc_shown,
            quoted_text_shown: self.quoted_text_shown,
        }
    }

    // -- load events ---------------------------------------------------------

    fn spawn_message_load(&mut self, target: LoadTarget, purpose: MessagePurpose) {
        self.tracker.spawn_message_load(
            Arc::clone(&self.ctx.store),
            target,
            purpose,
            self.events_tx.clone(),
        );
        self.pending_loads += 1;
    }

    fn spawn_attachment_load(&mut self, message_id: MessageId, owner: AttachmentOwner) {
        self.tracker.spawn_attachment_load(
            Arc::clone(&self.ctx.store),
            message_id,
            owner,
            self.events_tx.clone(),
        );
        self.pending_loads += 1;
    }

    /// Apply the next finished load. Returns false when none is outstanding.
    pub async fn next_event(&mut self) -> bool {
        if self.pending_loads == 0 {
            return false;
        }
        let Some(event) = self.events_rx.recv().await else {
            return false;
        };
        self.pending_loads -= 1;
        self.handle_event(event);
        true
    }

    /// Apply loads until none is outstanding, including the ones they start.
    pub async fn settle(&mut self) {
        while self.next_event().await {}
    }

    fn handle_event(&mut self, event: LoadEvent) {
        if self.closed {
            return;
        }
        match event {
            LoadEvent::Message {
                purpose: MessagePurpose::Draft { restore_views },
                result,
            } => match result {
                Ok(loaded) => self.on_draft_loaded(loaded, restore_views),
                Err(e) => self.fail_load(&e),
            },
            LoadEvent::Message {
                purpose: MessagePurpose::Source { restore_views },
                result,
            } => match result {
                Ok(loaded) => self.on_source_loaded(loaded, restore_views),
                Err(e) if restore_views => self.fail_load(&e),
                // Only enrichment for a resumed draft.
                Err(e) => log::debug!("Ignoring failed source reload: {e}"),
            },
            LoadEvent::Attachments {
                owner: AttachmentOwner::Draft,
                attachments,
            } => self.on_draft_attachments(attachments),
            LoadEvent::Attachments {
                owner: AttachmentOwner::Source { restore_views },
                attachments,
            } => self.on_source_attachments(attachments, restore_views),
        }
    }

    fn fail_load(&mut self, error: &ComposeError) {
        log::warn!("Closing composer: {error}");
        self.shell.notify(Notice::LoadFailed);
        self.close();
    }

    fn on_draft_loaded(&mut self, loaded: LoadedMessage, restore_views: bool) {
        let LoadedMessage {
            message,
            body,
            account,
        } = loaded;
        let draft_id = message.id;
        let source_key = body.source_message_key;

        let session = Arc::clone(&self.session);
        let mut state = session.lock();
        state.account = Some(account);
        state.draft = Draft { message, body };
        state.attachments.bind(draft_id);
        if let Some(id) = draft_id {
            self.session.set_draft_id(id);
        }

        if restore_views {
            let msg = &state.draft.message;
            let fields = ComposeFields {
                to: Address::join(&Address::unpack(&msg.to)),
                cc: Address::join(&Address::unpack(&msg.cc)),
                bcc: Address::join(&Address::unpack(&msg.bcc)),
                subject: msg.subject.clone(),
                body: state.draft.body.text_content.clone().unwrap_or_default(),
            };
            self.shell.write_fields(&fields);
            if fields.has_cc_or_bcc() {
                self.show_cc_bcc();
            }
        }

        // The quoted text always comes back, whatever the views did.
        if state.draft.body.text_reply.is_some() || state.draft.body.html_reply.is_some() {
            state.quoted_text_shown = true;
        }
        self.quoted_text_shown = state.quoted_text_shown;
        state.include_quoted_text = state.draft.message.includes_quoted_text();
        self.shell
            .show_quoted_text(state.quoted_text_shown, state.include_quoted_text);
        drop(state);

        self.set_needs_saving(false);
        self.loaded = true;

        if let Some(id) = draft_id {
            self.spawn_attachment_load(id, AttachmentOwner::Draft);
        }
        if let Some(source_id) = source_key {
            self.spawn_message_load(
                LoadTarget::Message(source_id),
                MessagePurpose::Source { restore_views: false },
            );
        }
    }

    fn on_source_loaded(&mut self, loaded: LoadedMessage, restore_views: bool) {
        let LoadedMessage {
            message,
            mut body,
            account,
        } = loaded;
        body.text_reply = None;
        body.html_reply = None;
        body.intro_text = None;
        let source_id = message.id;

        let session = Arc::clone(&self.session);
        let mut state = session.lock();
        if state.account.is_none() {
            state.draft.message.account_id = account.id;
            state.account = Some(account);
        }
        state.source = Some(SourceMessage { message, body });
        state.source_attachments.clear();

        if restore_views {
            let mut fields = self.shell.read_fields();
            self.apply_source(&mut state, &mut fields);
            let signature = state.account.as_ref().and_then(|a| a.signature.clone());
            fields.body = initial_text(&fields.body, signature.as_deref());
            self.shell.write_fields(&fields);
        }

        let inferred = if state.action == ComposeAction::EditDraft {
            infer_action(&self.shell.read_fields())
        } else {
            None
        };
        drop(state);

        self.loaded = true;
        if let Some(inferred) = inferred {
            log::debug!("Resumed draft inferred as {inferred:?}");
            // The draft's stored attachments already match what it was.
            if let Err(e) = self.switch_action(inferred, false) {
                log::warn!("Ignoring inferred action: {e}");
            }
        }
        if let Some(id) = source_id {
            self.spawn_attachment_load(id, AttachmentOwner::Source { restore_views });
        }
    }

    fn on_draft_attachments(&mut self, attachments: Vec<Attachment>) {
        let limit = self.ctx.config.max_attachment_upload_size;
        let mut state = self.session.lock();
        for attachment in attachments {
            if state.attachments.add(attachment, limit).is_err() {
                self.shell.notify(Notice::AttachmentTooLarge);
            }
        }
        self.shell.attachments_changed(state.attachments.items());
    }

    fn on_source_attachments(&mut self, attachments: Vec<Attachment>, restore_views: bool) {
        let session = Arc::clone(&self.session);
        let mut state = session.lock();
        state.source_attachments = attachments;
        if !(restore_views && state.action.is_forward()) {
            return;
        }
        let DraftState {
            attachments,
            source_attachments,
            ..
        } = &mut *state;
        if reconcile(attachments, source_attachments, true) {
            self.shell.attachments_changed(attachments.items());
            drop(state);
            self.set_needs_saving(true);
        }
    }

    /// Derive recipients, subject and quoted text from the source for the
    /// current action.
    fn apply_source(&mut self, state: &mut DraftState, fields: &mut ComposeFields) {
        let Some(source) = state.source.as_ref() else {
            return;
        };
        let own_address = state
            .account
            .as_ref()
            .map(|a| a.email_address.as_str())
            .unwrap_or_default();
        match state.action {
            ComposeAction::Reply | ComposeAction::ReplyAll => {
                let reply_all = state.action == ComposeAction::ReplyAll;
                let recipients = reply_recipients(&source.message, own_address, reply_all);
                fields.set_recipients(&recipients.to, &recipients.cc, &recipients.bcc);
                fields.subject = reply_subject(&source.message.subject);
            }
            ComposeAction::Forward => {
                fields.set_recipients(&[], &[], &[]);
                fields.subject = forward_subject(&source.message.subject);
            }
            other => {
                log::warn!("No source derivation for {other:?}");
                return;
            }
        }
        state.quoted_text_shown = true;
        state.include_quoted_text = true;
        self.quoted_text_shown = true;
        self.shell.show_quoted_text(true, true);
        if fields.has_cc_or_bcc() {
            self.show_cc_bcc();
        }
        self.set_needs_saving(true);
    }

    // -- user actions --------------------------------------------------------

    fn set_needs_saving(&mut self, needs_saving: bool) {
        if self.needs_saving != needs_saving {
            self.needs_saving = needs_saving;
            self.shell.needs_saving_changed(needs_saving);
        }
    }

    /// The user typed into a field.
    pub fn mark_edited(&mut self) {
        self.set_needs_saving(true);
    }

    pub fn show_cc_bcc(&mut self) {
        self.cc_bcc_shown = true;
        self.shell.show_cc_bcc();
    }

    pub fn set_include_quoted_text(&mut self, include: bool) {
        let mut state = self.session.lock();
        state.include_quoted_text = include;
        self.shell.show_quoted_text(state.quoted_text_shown, include);
        drop(state);
        self.set_needs_saving(true);
    }

    /// Switch between reply, reply-all and forward, re-deriving everything
    /// that depends on the source.
    pub fn set_action(&mut self, to: ComposeAction) -> Result<()> {
        self.switch_action(to, true)
    }

    fn switch_action(&mut self, to: ComposeAction, reconcile_attachments: bool) -> Result<()> {
        if !self.action.transition(to)? {
            return Ok(());
        }
        let session = Arc::clone(&self.session);
        let mut state = session.lock();
        state.action = to;
        self.action = to;
        self.shell.action_changed(to);

        // Without a source yet, its load applies the new action.
        if state.source.is_some() {
            let mut fields = self.shell.read_fields();
            self.apply_source(&mut state, &mut fields);
            self.shell.write_fields(&fields);
        }
        if state.source.is_some() && reconcile_attachments {
            let DraftState {
                attachments,
                source_attachments,
                ..
            } = &mut *state;
            if reconcile(attachments, source_attachments, to.is_forward()) {
                self.shell.attachments_changed(attachments.items());
                for id in attachments.take_orphaned() {
                    cleanup(&self.ctx.store, Cleanup::Attachment(id));
                }
            }
        }
        drop(state);
        self.set_needs_saving(true);
        Ok(())
    }

    /// Add a user-picked attachment. Oversized ones are refused with one
    /// notice per attempt.
    pub fn add_attachment(&mut self, attachment: Attachment) -> Result<()> {
        let limit = self.ctx.config.max_attachment_upload_size;
        let mut state = self.session.lock();
        let added = state.attachments.add(attachment, limit);
        if let Err(e) = added {
            drop(state);
            log::debug!("Refusing attachment: {e}");
            self.shell.notify(Notice::AttachmentTooLarge);
            return Err(e);
        }
        self.shell.attachments_changed(state.attachments.items());
        drop(state);
        self.set_needs_saving(true);
        Ok(())
    }

    /// Remove the attachment at `index`. Inherited (smart-forward)
    /// attachments stay; `None` is returned for them and for bad indexes.
    pub fn remove_attachment(&mut self, index: usize) -> Option<Attachment> {
        let mut state = self.session.lock();
        match state.attachments.items().get(index) {
            Some(attachment) if !attachment.is_smart_forward() => {}
            _ => return None,
        }
        let removed = state.attachments.remove(index);
        let orphaned = state.attachments.take_orphaned();
        self.shell.attachments_changed(state.attachments.items());
        drop(state);

        for id in orphaned {
            cleanup(&self.ctx.store, Cleanup::Attachment(id));
        }
        self.set_needs_saving(true);
        removed
    }

    fn submit(&mut self, send: bool) -> Result<SaveTask> {
        let send = if send && self.ctx.config.inhibit_send {
            log::info!("Send inhibited by configuration; saving instead");
            false
        } else {
            send
        };
        let job = SaveJob {
            store: Arc::clone(&self.ctx.store),
            transmitter: Arc::clone(&self.ctx.transmitter),
            shell: Arc::clone(&self.shell),
            session: Arc::clone(&self.session),
            send,
        };
        let task = self.ctx.saves.submit(send, move || job.run())?;
        self.last_save = Some(task.clone());
        Ok(task)
    }

    /// Queue a save if anything changed since the last one.
    pub fn save(&mut self) -> Result<Option<SaveTask>> {
        if !self.needs_saving {
            return Ok(None);
        }
        if !self.loaded {
            log::warn!("Attempted to save draft before its state finished loading");
            return Ok(None);
        }
        self.set_needs_saving(false);
        self.submit(false).map(Some)
    }

    /// The composer lost the foreground.
    pub fn pause(&mut self) -> Result<Option<SaveTask>> {
        self.save()
    }

    /// Validate recipients, queue the send and close the session.
    pub fn send(&mut self) -> Result<Option<SaveTask>> {
        let fields = self.shell.read_fields();
        for (name, text) in [("to", &fields.to), ("cc", &fields.cc), ("bcc", &fields.bcc)] {
            if !Address::is_all_valid(text.trim()) {
                self.shell.notify(Notice::InvalidAddress);
                return Err(ComposeError::InvalidAddress(name.to_string()));
            }
        }
        if fields.recipient_count() == 0 {
            self.shell.notify(Notice::NoRecipients);
            return Err(ComposeError::NoRecipients);
        }

        let task = if self.loaded {
            Some(self.submit(true)?)
        } else {
            log::warn!("Attempted to send draft before its state finished loading");
            None
        };
        self.set_needs_saving(false);
        self.close();
        Ok(task)
    }

    /// Throw the draft away, deleting whatever was stored of it.
    pub fn discard(&mut self) {
        self.session.mark_discarded();
        let known = self.session.draft_id();
        match (self.pending_save(), known) {
            (Some(task), _) => {
                // A queued save would write to a deleted row; delete after it.
                let store = Arc::clone(&self.ctx.store);
                tokio::spawn(async move {
                    match (task.wait().await, known) {
                        (Ok(id), _) | (Err(_), Some(id)) => {
                            cleanup(&store, Cleanup::Message(id));
                        }
                        (Err(e), None) => log::debug!("Nothing to discard: {e}"),
                    }
                });
            }
            (None, Some(id)) => cleanup(&self.ctx.store, Cleanup::Message(id)),
            (None, None) => {}
        }
        self.shell.notify(Notice::Discarded);
        self.set_needs_saving(false);
        self.close();
    }

    fn close(&mut self) {
        self.closed = true;
        self.tracker.cancel_all_interrupt();
        self.pending_loads = 0;
        self.shell.close();
    }

    /// End this controller instance. Pending edits are saved first; loads are
    /// cancelled, queued saves are not. `changing_configuration` marks a
    /// teardown that will be followed by [`ComposeController::restore`].
    pub fn teardown(mut self, changing_configuration: bool) -> SavedSession {
        self.session.set_changing_config(changing_configuration);
        if let Err(e) = self.pause() {
            log::error!("Saving on teardown failed: {e}");
        }
        let saved = self.saved_session();
        self.tracker.cancel_all_interrupt();
        saved
    }
}
