use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::Connection;

use super::queries;
use super::schema::{run_migrations, SCHEMA};
use crate::models::{
    Account, AccountId, Attachment, AttachmentId, Body, Mailbox, Message, MessageId,
};

// ---------------------------------------------------------------------------
// MailStore: what the composer needs from persistence
// ---------------------------------------------------------------------------

/// Create/read/update access to messages, bodies, accounts and attachments,
/// keyed by opaque ids. Calls block; the composer only makes them from
/// background threads or the save lane.
///
/// `restore_*` return `Ok(None)` when the record does not exist.
pub trait MailStore: Send + Sync {
    fn restore_message(&self, id: MessageId) -> Result<Option<Message>, String>;
    fn restore_body(&self, message_id: MessageId) -> Result<Option<Body>, String>;
    fn restore_account(&self, id: AccountId) -> Result<Option<Account>, String>;
    fn restore_attachments(&self, message_id: MessageId) -> Result<Vec<Attachment>, String>;
    /// Store a new draft (header and body) in the drafts mailbox.
    fn insert_draft(&self, message: &Message, body: &Body) -> Result<MessageId, String>;
    fn update_draft(&self, id: MessageId, message: &Message) -> Result<(), String>;
    fn update_body(&self, message_id: MessageId, body: &Body) -> Result<(), String>;
    fn insert_attachment(&self, attachment: &Attachment) -> Result<AttachmentId, String>;
    fn update_attachment(&self, attachment: &Attachment) -> Result<(), String>;
    fn delete_message(&self, id: MessageId) -> Result<(), String>;
    fn delete_attachment(&self, id: AttachmentId) -> Result<(), String>;
}

// ---------------------------------------------------------------------------
// SqliteStore: single connection, serialized by a mutex
// ---------------------------------------------------------------------------

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the store in the user data directory.
    pub fn open() -> Result<Self, String> {
        let dir = Self::resolve_path();
        std::fs::create_dir_all(&dir).map_err(|e| format!("Failed to create store dir: {e}"))?;
        Self::open_at(&dir.join("compose.db"))
    }

    pub fn open_at(path: &Path) -> Result<Self, String> {
        let conn = Connection::open(path).map_err(|e| format!("Failed to open store db: {e}"))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, String> {
        let conn =
            Connection::open_in_memory().map_err(|e| format!("Failed to open store db: {e}"))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, String> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| format!("Failed to init store schema: {e}"))?;
        run_migrations(&conn);
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    fn resolve_path() -> PathBuf {
        let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        base.join("neverlight-mail")
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert_account(&self, account: &Account) -> Result<AccountId, String> {
        queries::do_insert_account(&self.conn(), account)
    }

    /// Store an arbitrary message (e.g. one that arrived in the inbox).
    pub fn insert_message(&self, message: &Message, body: &Body) -> Result<MessageId, String> {
        queries::do_insert_message(&self.conn(), message, body)
    }

    pub fn count_messages(&self, mailbox: Mailbox) -> Result<u64, String> {
        queries::do_count_messages(&self.conn(), mailbox)
    }
}

impl MailStore for SqliteStore {
    fn restore_message(&self, id: MessageId) -> Result<Option<Message>, String> {
        queries::do_restore_message(&self.conn(), id)
    }

    fn restore_body(&self, message_id: MessageId) -> Result<Option<Body>, String> {
        queries::do_restore_body(&self.conn(), message_id)
    }

    fn restore_account(&self, id: AccountId) -> Result<Option<Account>, String> {
        queries::do_restore_account(&self.conn(), id)
    }

    fn restore_attachments(&self, message_id: MessageId) -> Result<Vec<Attachment>, String> {
        queries::do_restore_attachments(&self.conn(), message_id)
    }

    fn insert_draft(&self, message: &Message, body: &Body) -> Result<MessageId, String> {
        let mut draft = message.clone();
        draft.mailbox = Mailbox::Drafts;
        queries::do_insert_message(&self.conn(), &draft, body)
    }

    fn update_draft(&self, id: MessageId, message: &Message) -> Result<(), String> {
        queries::do_update_message(&self.conn(), id, message)
    }

    fn update_body(&self, message_id: MessageId, body: &Body) -> Result<(), String> {
        queries::do_update_body(&self.conn(), message_id, body)
    }

    fn insert_attachment(&self, attachment: &Attachment) -> Result<AttachmentId, String> {
        queries::do_insert_attachment(&self.conn(), attachment)
    }

    fn update_attachment(&self, attachment: &Attachment) -> Result<(), String> {
        queries::do_update_attachment(&self.conn(), attachment)
    }

    fn delete_message(&self, id: MessageId) -> Result<(), String> {
        queries::do_delete_message(&self.conn(), id)
    }

    fn delete_attachment(&self, id: AttachmentId) -> Result<(), String> {
        queries::do_delete_attachment(&self.conn(), id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_account() -> (SqliteStore, AccountId) {
        let store = SqliteStore::open_in_memory().expect("open store");
        let account_id = store
            .insert_account(&Account {
                email_address: "me@example.com".into(),
                ..Account::default()
            })
            .expect("insert account");
        (store, account_id)
    }

    #[test]
    fn draft_round_trips_header_and_body() {
        let (store, account_id) = store_with_account();
        let message = Message {
            account_id,
            subject: "hello".into(),
            to: "a@example.com".into(),
            flags: 3,
            ..Message::default()
        };
        let body = Body {
            text_content: Some("body".into()),
            source_message_key: Some(42),
            ..Body::default()
        };
        let id = store.insert_draft(&message, &body).expect("insert draft");

        let restored = store.restore_message(id).unwrap().expect("message exists");
        assert_eq!(restored.id, Some(id));
        assert_eq!(restored.mailbox, Mailbox::Drafts);
        assert_eq!(restored.subject, "hello");
        assert_eq!(restored.flags, 3);

        let restored_body = store.restore_body(id).unwrap().expect("body exists");
        assert_eq!(restored_body.text_content.as_deref(), Some("body"));
        assert_eq!(restored_body.source_message_key, Some(42));
        assert_eq!(store.count_messages(Mailbox::Drafts).unwrap(), 1);
    }

    #[test]
    fn missing_records_are_none() {
        let (store, _) = store_with_account();
        assert!(store.restore_message(99).unwrap().is_none());
        assert!(store.restore_body(99).unwrap().is_none());
        assert!(store.restore_account(99).unwrap().is_none());
        assert!(store.restore_attachments(99).unwrap().is_empty());
    }

    #[test]
    fn update_touches_existing_row_only() {
        let (store, account_id) = store_with_account();
        let mut message = Message {
            account_id,
            ..Message::default()
        };
        let id = store.insert_draft(&message, &Body::default()).unwrap();
        message.subject = "second".into();
        store.update_draft(id, &message).unwrap();
        store
            .update_body(
                id,
                &Body {
                    text_content: Some("new text".into()),
                    ..Body::default()
                },
            )
            .unwrap();

        assert_eq!(store.restore_message(id).unwrap().unwrap().subject, "second");
        assert_eq!(
            store.restore_body(id).unwrap().unwrap().text_content.as_deref(),
            Some("new text")
        );
        assert_eq!(store.count_messages(Mailbox::Drafts).unwrap(), 1);
        assert!(store.update_draft(id + 1, &message).is_err());
    }

    #[test]
    fn delete_message_cascades() {
        let (store, account_id) = store_with_account();
        let id = store
            .insert_draft(
                &Message {
                    account_id,
                    ..Message::default()
                },
                &Body::default(),
            )
            .unwrap();
        let mut att = Attachment::new("a.txt", "text/plain", 10);
        att.message_id = Some(id);
        let att_id = store.insert_attachment(&att).unwrap();
        att.id = Some(att_id);
        att.flags = 7;
        store.update_attachment(&att).unwrap();
        assert_eq!(store.restore_attachments(id).unwrap()[0].flags, 7);

        store.delete_message(id).unwrap();
        assert!(store.restore_message(id).unwrap().is_none());
        assert!(store.restore_body(id).unwrap().is_none());
        assert!(store.restore_attachments(id).unwrap().is_empty());
    }

    #[test]
    fn unsaved_attachment_cannot_be_updated() {
        let (store, _) = store_with_account();
        let att = Attachment::new("a.txt", "text/plain", 10);
        assert!(store.update_attachment(&att).is_err());
        assert!(store.insert_attachment(&att).is_err());
    }
}
