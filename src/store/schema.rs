use rusqlite::Connection;

/// Schema DDL run on open.
pub(super) const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email_address TEXT NOT NULL,
    sender_name TEXT,
    signature TEXT
);

CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    account_id INTEGER NOT NULL,
    mailbox TEXT NOT NULL DEFAULT 'inbox',
    message_id TEXT NOT NULL DEFAULT '',
    timestamp INTEGER NOT NULL DEFAULT 0,
    from_list TEXT NOT NULL DEFAULT '',
    to_list TEXT NOT NULL DEFAULT '',
    cc_list TEXT NOT NULL DEFAULT '',
    bcc_list TEXT NOT NULL DEFAULT '',
    reply_to_list TEXT NOT NULL DEFAULT '',
    subject TEXT NOT NULL DEFAULT '',
    display_name TEXT NOT NULL DEFAULT '',
    flag_read INTEGER DEFAULT 0,
    flag_loaded INTEGER DEFAULT 0,
    flag_attachment INTEGER DEFAULT 0,
    flags INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS bodies (
    message_id INTEGER PRIMARY KEY,
    text_content TEXT,
    html_content TEXT,
    text_reply TEXT,
    html_reply TEXT,
    intro_text TEXT,
    source_message_key INTEGER,
    FOREIGN KEY (message_id) REFERENCES messages(id)
);

CREATE TABLE IF NOT EXISTS attachments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    message_id INTEGER NOT NULL,
    filename TEXT NOT NULL DEFAULT 'unnamed',
    mime_type TEXT NOT NULL DEFAULT 'application/octet-stream',
    size INTEGER NOT NULL DEFAULT 0,
    content_uri TEXT,
    flags INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (message_id) REFERENCES messages(id)
);
";

/// Indexes are created separately so a database from before they existed
/// picks them up on the next open.
pub(super) fn run_migrations(conn: &Connection) {
    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_messages_mailbox ON messages(account_id, mailbox, timestamp DESC)",
        "CREATE INDEX IF NOT EXISTS idx_attachments_message ON attachments(message_id)",
    ];
    for sql in &indexes {
        if let Err(e) = conn.execute(sql, []) {
            log::warn!("Index creation failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_and_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().expect("open in-memory sqlite");
        conn.execute_batch(SCHEMA).expect("first schema run");
        run_migrations(&conn);
        conn.execute_batch(SCHEMA).expect("second schema run");
        run_migrations(&conn);

        let indexes: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name LIKE 'idx_%'",
                [],
                |row| row.get(0),
            )
            .expect("count indexes");
        assert_eq!(indexes, 2);
    }
}
