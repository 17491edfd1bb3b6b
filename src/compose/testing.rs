//! Fakes shared by the compose tests.

use std::sync::{Arc, Condvar, Mutex};

use crate::address::Address;
use crate::compose::{ComposeAction, ComposeFields, ComposeShell, Notice};
use crate::models::{
    Account, AccountId, Attachment, AttachmentId, Body, Mailbox, Message, MessageId,
};
use crate::store::{MailStore, SqliteStore};
use crate::transmit::Transmitter;

pub(crate) fn seed_account(store: &SqliteStore, email: &str) -> AccountId {
    store
        .insert_account(&Account {
            email_address: email.into(),
            sender_name: Some("Me".into()),
            signature: None,
            ..Account::default()
        })
        .expect("seed account")
}

pub(crate) fn seed_message(
    store: &SqliteStore,
    account_id: AccountId,
    mailbox: Mailbox,
    subject: &str,
    text: &str,
) -> MessageId {
    let message = Message {
        account_id,
        mailbox,
        subject: subject.into(),
        from: Address::pack(&[Address::new("alice@example.com", None)]),
        ..Message::default()
    };
    let body = Body {
        text_content: Some(text.into()),
        ..Body::default()
    };
    store.insert_message(&message, &body).expect("seed message")
}

/// An inbox message from d@x to a@x and b@x, cc c@x.
pub(crate) fn seed_source(store: &SqliteStore, account_id: AccountId, subject: &str) -> MessageId {
    let pack = |list: &[&str]| {
        Address::pack(&list.iter().map(|a| Address::new(*a, None)).collect::<Vec<_>>())
    };
    let message = Message {
        account_id,
        mailbox: Mailbox::Inbox,
        subject: subject.into(),
        from: pack(&["d@x.com"]),
        to: pack(&["a@x.com", "b@x.com"]),
        cc: pack(&["c@x.com"]),
        ..Message::default()
    };
    let body = Body {
        text_content: Some("original text".into()),
        ..Body::default()
    };
    store.insert_message(&message, &body).expect("seed source")
}

pub(crate) fn seed_attachment(store: &SqliteStore, message_id: MessageId, name: &str) -> AttachmentId {
    let mut attachment = Attachment::new(name, "application/pdf", 100);
    attachment.message_id = Some(message_id);
    attachment.content_uri = Some(format!("content://{name}"));
    store.insert_attachment(&attachment).expect("seed attachment")
}

// ---------------------------------------------------------------------------
// FakeShell
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct FakeShell {
    pub fields: Mutex<ComposeFields>,
    pub notices: Mutex<Vec<Notice>>,
    pub needs_saving: Mutex<Vec<bool>>,
    pub quoted: Mutex<Option<(bool, bool)>>,
    pub cc_bcc_shown: Mutex<bool>,
    pub actions: Mutex<Vec<ComposeAction>>,
    pub attachment_names: Mutex<Vec<String>>,
    pub closed: Mutex<bool>,
}

impl FakeShell {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fields(&self) -> ComposeFields {
        self.fields.lock().unwrap().clone()
    }

    pub fn edit(&self, f: impl FnOnce(&mut ComposeFields)) {
        f(&mut self.fields.lock().unwrap());
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }

    pub fn count(&self, notice: Notice) -> usize {
        self.notices().iter().filter(|n| **n == notice).count()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap()
    }

    pub fn last_needs_saving(&self) -> Option<bool> {
        self.needs_saving.lock().unwrap().last().copied()
    }
}

impl ComposeShell for FakeShell {
    fn read_fields(&self) -> ComposeFields {
        self.fields()
    }

    fn write_fields(&self, fields: &ComposeFields) {
        *self.fields.lock().unwrap() = fields.clone();
    }

    fn needs_saving_changed(&self, needs_saving: bool) {
        self.needs_saving.lock().unwrap().push(needs_saving);
    }

    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }

    fn show_quoted_text(&self, shown: bool, included: bool) {
        *self.quoted.lock().unwrap() = Some((shown, included));
    }

    fn show_cc_bcc(&self) {
        *self.cc_bcc_shown.lock().unwrap() = true;
    }

    fn close(&self) {
        *self.closed.lock().unwrap() = true;
    }

    fn attachments_changed(&self, attachments: &[Attachment]) {
        *self.attachment_names.lock().unwrap() =
            attachments.iter().map(|a| a.filename.clone()).collect();
    }

    fn action_changed(&self, action: ComposeAction) {
        self.actions.lock().unwrap().push(action);
    }
}

// ---------------------------------------------------------------------------
// RecordingTransmitter
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct RecordingTransmitter {
    pub sent: Mutex<Vec<(MessageId, AccountId)>>,
}

impl RecordingTransmitter {
    pub fn sent(&self) -> Vec<(MessageId, AccountId)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Transmitter for RecordingTransmitter {
    fn send_message(&self, message_id: MessageId, account_id: AccountId) {
        self.sent.lock().unwrap().push((message_id, account_id));
    }
}

// ---------------------------------------------------------------------------
// GatedStore: holds draft inserts until opened
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Gate {
    open: bool,
    entered: bool,
}

pub(crate) struct GatedStore {
    pub inner: SqliteStore,
    gate: Mutex<Gate>,
    cond: Condvar,
}

impl GatedStore {
    pub fn closed(inner: SqliteStore) -> Self {
        Self {
            inner,
            gate: Mutex::new(Gate::default()),
            cond: Condvar::new(),
        }
    }

    pub fn open_gate(&self) {
        self.gate.lock().unwrap().open = true;
        self.cond.notify_all();
    }

    /// Block until a draft insert is parked at the gate, i.e. the save lane
    /// is inside a save and holds that session's draft lock.
    pub fn wait_entered(&self) {
        let mut gate = self.gate.lock().unwrap();
        while !gate.entered {
            gate = self.cond.wait(gate).unwrap();
        }
    }

    fn wait_open(&self) {
        let mut gate = self.gate.lock().unwrap();
        gate.entered = true;
        self.cond.notify_all();
        while !gate.open {
            gate = self.cond.wait(gate).unwrap();
        }
    }
}

impl MailStore for GatedStore {
    fn restore_message(&self, id: MessageId) -> Result<Option<Message>, String> {
        self.inner.restore_message(id)
    }

    fn restore_body(&self, message_id: MessageId) -> Result<Option<Body>, String> {
        self.inner.restore_body(message_id)
    }

    fn restore_account(&self, id: AccountId) -> Result<Option<Account>, String> {
        self.inner.restore_account(id)
    }

    fn restore_attachments(&self, message_id: MessageId) -> Result<Vec<Attachment>, String> {
        self.inner.restore_attachments(message_id)
    }

    fn insert_draft(&self, message: &Message, body: &Body) -> Result<MessageId, String> {
        self.wait_open();
        self.inner.insert_draft(message, body)
    }

    fn update_draft(&self, id: MessageId, message: &Message) -> Result<(), String> {
        self.inner.update_draft(id, message)
    }

    fn update_body(&self, message_id: MessageId, body: &Body) -> Result<(), String> {
        self.inner.update_body(message_id, body)
    }

    fn insert_attachment(&self, attachment: &Attachment) -> Result<AttachmentId, String> {
        self.inner.insert_attachment(attachment)
    }

    fn update_attachment(&self, attachment: &Attachment) -> Result<(), String> {
        self.inner.update_attachment(attachment)
    }

    fn delete_message(&self, id: MessageId) -> Result<(), String> {
        self.inner.delete_message(id)
    }

    fn delete_attachment(&self, id: AttachmentId) -> Result<(), String> {
        self.inner.delete_attachment(id)
    }
}
