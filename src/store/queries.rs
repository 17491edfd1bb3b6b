use rusqlite::{Connection, OptionalExtension};

use crate::models::{
    Account, AccountId, Attachment, AttachmentId, Body, Mailbox, Message, MessageId,
};

/// Shared row-to-struct mapping for message header queries.
///
/// Expects columns in this order:
///   0: id, 1: account_id, 2: mailbox, 3: message_id, 4: timestamp,
///   5: from_list, 6: to_list, 7: cc_list, 8: bcc_list, 9: reply_to_list,
///   10: subject, 11: display_name, 12: flag_read, 13: flag_loaded,
///   14: flag_attachment, 15: flags
const MESSAGE_COLUMNS: &str = "id, account_id, mailbox, message_id, timestamp, from_list, to_list,
     cc_list, bcc_list, reply_to_list, subject, display_name, flag_read, flag_loaded,
     flag_attachment, flags";

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let mailbox: String = row.get(2)?;
    Ok(Message {
        id: Some(row.get(0)?),
        account_id: row.get(1)?,
        mailbox: Mailbox::parse(&mailbox),
        message_id: row.get(3)?,
        timestamp: row.get(4)?,
        from: row.get(5)?,
        to: row.get(6)?,
        cc: row.get(7)?,
        bcc: row.get(8)?,
        reply_to: row.get(9)?,
        subject: row.get(10)?,
        display_name: row.get(11)?,
        flag_read: row.get::<_, Option<i32>>(12)?.unwrap_or(0) != 0,
        flag_loaded: row.get::<_, Option<i32>>(13)?.unwrap_or(0) != 0,
        flag_attachment: row.get::<_, Option<i32>>(14)?.unwrap_or(0) != 0,
        flags: row.get::<_, i64>(15)? as u32,
    })
}

fn row_to_attachment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Attachment> {
    Ok(Attachment {
        id: Some(row.get(0)?),
        message_id: Some(row.get(1)?),
        filename: row.get(2)?,
        mime_type: row.get(3)?,
        size: row.get::<_, i64>(4)?.max(0) as u64,
        content_uri: row.get(5)?,
        flags: row.get::<_, i64>(6)? as u32,
    })
}

// -- accounts ----------------------------------------------------------------

pub(super) fn do_insert_account(conn: &Connection, account: &Account) -> Result<AccountId, String> {
    conn.execute(
        "INSERT INTO accounts (email_address, sender_name, signature) VALUES (?1, ?2, ?3)",
        rusqlite::params![account.email_address, account.sender_name, account.signature],
    )
    .map_err(|e| format!("Store insert error: {e}"))?;
    Ok(conn.last_insert_rowid())
}

pub(super) fn do_restore_account(conn: &Connection, id: AccountId) -> Result<Option<Account>, String> {
    conn.query_row(
        "SELECT id, email_address, sender_name, signature FROM accounts WHERE id = ?1",
        [id],
        |row| {
            Ok(Account {
                id: row.get(0)?,
                email_address: row.get(1)?,
                sender_name: row.get(2)?,
                signature: row.get(3)?,
            })
        },
    )
    .optional()
    .map_err(|e| format!("Store query error: {e}"))
}

// -- messages ----------------------------------------------------------------

pub(super) fn do_restore_message(conn: &Connection, id: MessageId) -> Result<Option<Message>, String> {
    conn.query_row(
        &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
        [id],
        row_to_message,
    )
    .optional()
    .map_err(|e| format!("Store query error: {e}"))
}

/// Insert a message and its body in one transaction; returns the new id.
pub(super) fn do_insert_message(
    conn: &Connection,
    message: &Message,
    body: &Body,
) -> Result<MessageId, String> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| format!("Store tx error: {e}"))?;

    tx.execute(
        "INSERT INTO messages
         (account_id, mailbox, message_id, timestamp, from_list, to_list, cc_list, bcc_list,
          reply_to_list, subject, display_name, flag_read, flag_loaded, flag_attachment, flags)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        rusqlite::params![
            message.account_id,
            message.mailbox.as_str(),
            message.message_id,
            message.timestamp,
            message.from,
            message.to,
            message.cc,
            message.bcc,
            message.reply_to,
            message.subject,
            message.display_name,
            message.flag_read as i32,
            message.flag_loaded as i32,
            message.flag_attachment as i32,
            message.flags as i64,
        ],
    )
    .map_err(|e| format!("Store insert error: {e}"))?;
    let id = tx.last_insert_rowid();

    tx.execute(
        "INSERT INTO bodies
         (message_id, text_content, html_content, text_reply, html_reply, intro_text,
          source_message_key)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            id,
            body.text_content,
            body.html_content,
            body.text_reply,
            body.html_reply,
            body.intro_text,
            body.source_message_key,
        ],
    )
    .map_err(|e| format!("Store insert error: {e}"))?;

    tx.commit().map_err(|e| format!("Store commit error: {e}"))?;
    Ok(id)
}

pub(super) fn do_update_message(conn: &Connection, id: MessageId, message: &Message) -> Result<(), String> {
    let changed = conn
        .execute(
            "UPDATE messages SET timestamp = ?1, from_list = ?2, to_list = ?3, cc_list = ?4,
             bcc_list = ?5, subject = ?6, display_name = ?7, flag_read = ?8, flag_loaded = ?9,
             flag_attachment = ?10, flags = ?11, message_id = ?12
             WHERE id = ?13",
            rusqlite::params![
                message.timestamp,
                message.from,
                message.to,
                message.cc,
                message.bcc,
                message.subject,
                message.display_name,
                message.flag_read as i32,
                message.flag_loaded as i32,
                message.flag_attachment as i32,
                message.flags as i64,
                message.message_id,
                id,
            ],
        )
        .map_err(|e| format!("Store update error: {e}"))?;
    if changed == 0 {
        return Err(format!("Store update error: message {id} does not exist"));
    }
    Ok(())
}

pub(super) fn do_delete_message(conn: &Connection, id: MessageId) -> Result<(), String> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| format!("Store tx error: {e}"))?;
    tx.execute("DELETE FROM attachments WHERE message_id = ?1", [id])
        .map_err(|e| format!("Store cascade error: {e}"))?;
    tx.execute("DELETE FROM bodies WHERE message_id = ?1", [id])
        .map_err(|e| format!("Store cascade error: {e}"))?;
    tx.execute("DELETE FROM messages WHERE id = ?1", [id])
        .map_err(|e| format!("Store delete error: {e}"))?;
    tx.commit().map_err(|e| format!("Store commit error: {e}"))
}

pub(super) fn do_count_messages(conn: &Connection, mailbox: Mailbox) -> Result<u64, String> {
    conn.query_row(
        "SELECT COUNT(*) FROM messages WHERE mailbox = ?1",
        [mailbox.as_str()],
        |row| row.get::<_, i64>(0),
    )
    .map(|n| n as u64)
    .map_err(|e| format!("Store query error: {e}"))
}

// -- bodies ------------------------------------------------------------------

pub(super) fn do_restore_body(conn: &Connection, message_id: MessageId) -> Result<Option<Body>, String> {
    conn.query_row(
        "SELECT message_id, text_content, html_content, text_reply, html_reply, intro_text,
                source_message_key
         FROM bodies WHERE message_id = ?1",
        [message_id],
        |row| {
            Ok(Body {
                message_id: Some(row.get(0)?),
                text_content: row.get(1)?,
                html_content: row.get(2)?,
                text_reply: row.get(3)?,
                html_reply: row.get(4)?,
                intro_text: row.get(5)?,
                source_message_key: row.get(6)?,
            })
        },
    )
    .optional()
    .map_err(|e| format!("Store query error: {e}"))
}

/// Update the draft-owned body fields. `html_content` belongs to the
/// original message and is never rewritten here.
pub(super) fn do_update_body(conn: &Connection, message_id: MessageId, body: &Body) -> Result<(), String> {
    let changed = conn
        .execute(
            "UPDATE bodies SET text_content = ?1, text_reply = ?2, html_reply = ?3,
             intro_text = ?4, source_message_key = ?5
             WHERE message_id = ?6",
            rusqlite::params![
                body.text_content,
                body.text_reply,
                body.html_reply,
                body.intro_text,
                body.source_message_key,
                message_id,
            ],
        )
        .map_err(|e| format!("Store update error: {e}"))?;
    if changed == 0 {
        // A draft row that lost its body; recreate rather than drop the text.
        conn.execute(
            "INSERT INTO bodies
             (message_id, text_content, text_reply, html_reply, intro_text, source_message_key)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                message_id,
                body.text_content,
                body.text_reply,
                body.html_reply,
                body.intro_text,
                body.source_message_key,
            ],
        )
        .map_err(|e| format!("Store insert error: {e}"))?;
    }
    Ok(())
}

// -- attachments -------------------------------------------------------------

pub(super) fn do_restore_attachments(
    conn: &Connection,
    message_id: MessageId,
) -> Result<Vec<Attachment>, String> {
    let mut stmt = conn
        .prepare(
            "SELECT id, message_id, filename, mime_type, size, content_uri, flags
             FROM attachments WHERE message_id = ?1 ORDER BY id",
        )
        .map_err(|e| format!("Store prepare error: {e}"))?;

    let rows = stmt
        .query_map([message_id], row_to_attachment)
        .map_err(|e| format!("Store query error: {e}"))?;

    let mut attachments = Vec::new();
    for row in rows {
        attachments.push(row.map_err(|e| format!("Store row error: {e}"))?);
    }
    Ok(attachments)
}

pub(super) fn do_insert_attachment(conn: &Connection, attachment: &Attachment) -> Result<AttachmentId, String> {
    let message_id = attachment
        .message_id
        .ok_or_else(|| format!("Store insert error: attachment {} has no owner", attachment.filename))?;
    conn.execute(
        "INSERT INTO attachments (message_id, filename, mime_type, size, content_uri, flags)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            message_id,
            attachment.filename,
            attachment.mime_type,
            attachment.size as i64,
            attachment.content_uri,
            attachment.flags as i64,
        ],
    )
    .map_err(|e| format!("Store insert error: {e}"))?;
    Ok(conn.last_insert_rowid())
}

pub(super) fn do_update_attachment(conn: &Connection, attachment: &Attachment) -> Result<(), String> {
    let (Some(id), Some(message_id)) = (attachment.id, attachment.message_id) else {
        return Err(format!(
            "Store update error: attachment {} was never saved",
            attachment.filename
        ));
    };
    conn.execute(
        "UPDATE attachments SET message_id = ?1, filename = ?2, mime_type = ?3, size = ?4,
         content_uri = ?5, flags = ?6
         WHERE id = ?7",
        rusqlite::params![
            message_id,
            attachment.filename,
            attachment.mime_type,
            attachment.size as i64,
            attachment.content_uri,
            attachment.flags as i64,
            id,
        ],
    )
    .map_err(|e| format!("Store update error: {e}"))?;
    Ok(())
}

pub(super) fn do_delete_attachment(conn: &Connection, id: AttachmentId) -> Result<(), String> {
    conn.execute("DELETE FROM attachments WHERE id = ?1", [id])
        .map_err(|e| format!("Store delete error: {e}"))?;
    Ok(())
}
