use serde::{Deserialize, Serialize};

use crate::store::flags::{
    SourceType, ATTACHMENT_FLAG_DOWNLOAD_FORWARD, ATTACHMENT_FLAG_SMART_FORWARD,
    FLAG_NOT_INCLUDE_QUOTED_TEXT,
};

pub type MessageId = i64;
pub type AccountId = i64;
pub type AttachmentId = i64;

/// A sending account as far as composition cares about it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub id: AccountId,
    pub email_address: String,
    pub sender_name: Option<String>,
    pub signature: Option<String>,
}

/// Which mailbox a stored message lives in.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum Mailbox {
    #[default]
    Inbox,
    Drafts,
    Outbox,
    Sent,
}

impl Mailbox {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inbox => "inbox",
            Self::Drafts => "drafts",
            Self::Outbox => "outbox",
            Self::Sent => "sent",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "drafts" => Self::Drafts,
            "outbox" => Self::Outbox,
            "sent" => Self::Sent,
            _ => Self::Inbox,
        }
    }
}

/// Message header record. Address lists are kept in packed form
/// (see [`crate::address::Address::pack`]).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: Option<MessageId>,
    pub account_id: AccountId,
    pub mailbox: Mailbox,
    pub message_id: String,
    pub timestamp: i64,
    pub from: String,
    pub to: String,
    pub cc: String,
    pub bcc: String,
    pub reply_to: String,
    pub subject: String,
    pub display_name: String,
    pub flag_read: bool,
    pub flag_loaded: bool,
    pub flag_attachment: bool,
    pub flags: u32,
}

impl Message {
    pub fn source_type(&self) -> SourceType {
        SourceType::from_flags(self.flags)
    }

    pub fn set_source_type(&mut self, source_type: SourceType) {
        self.flags = source_type.apply(self.flags);
    }

    pub fn includes_quoted_text(&self) -> bool {
        self.flags & FLAG_NOT_INCLUDE_QUOTED_TEXT == 0
    }

    pub fn set_includes_quoted_text(&mut self, include: bool) {
        if include {
            self.flags &= !FLAG_NOT_INCLUDE_QUOTED_TEXT;
        } else {
            self.flags |= FLAG_NOT_INCLUDE_QUOTED_TEXT;
        }
    }
}

/// Body record, keyed by the owning message.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Body {
    pub message_id: Option<MessageId>,
    pub text_content: Option<String>,
    pub html_content: Option<String>,
    pub text_reply: Option<String>,
    pub html_reply: Option<String>,
    pub intro_text: Option<String>,
    pub source_message_key: Option<MessageId>,
}

/// A file reference attached to a message.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Attachment {
    pub id: Option<AttachmentId>,
    pub message_id: Option<MessageId>,
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
    /// Local content locator; `None` when the content still lives on the server.
    pub content_uri: Option<String>,
    pub flags: u32,
}

impl Attachment {
    pub fn new(filename: impl Into<String>, mime_type: impl Into<String>, size: u64) -> Self {
        Self {
            filename: filename.into(),
            mime_type: mime_type.into(),
            size,
            ..Self::default()
        }
    }

    pub fn is_saved(&self) -> bool {
        self.id.is_some()
    }

    /// Inherited from a source message; the user may not delete it.
    pub fn is_smart_forward(&self) -> bool {
        self.flags & ATTACHMENT_FLAG_SMART_FORWARD != 0
    }

    pub fn needs_download(&self) -> bool {
        self.flags & ATTACHMENT_FLAG_DOWNLOAD_FORWARD != 0
    }
}
