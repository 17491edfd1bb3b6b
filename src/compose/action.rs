//! Reply / reply-all / forward semantics.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::{ComposeError, Result};
use crate::models::Message;
use crate::store::SourceType;

use super::shell::ComposeFields;

const REPLY_PREFIX: &str = "Re:";
const FORWARD_PREFIX: &str = "Fwd:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ComposeAction {
    /// A fresh message with no source.
    #[default]
    Compose,
    Reply,
    ReplyAll,
    Forward,
    /// Resuming a stored draft whose real action is not known yet.
    EditDraft,
}

impl ComposeAction {
    /// Actions that derive recipients, subject and quoted text from a source.
    pub fn has_source(self) -> bool {
        matches!(self, Self::Reply | Self::ReplyAll | Self::Forward)
    }

    pub fn is_forward(self) -> bool {
        self == Self::Forward
    }

    pub fn source_type(self) -> SourceType {
        match self {
            Self::Reply | Self::ReplyAll => SourceType::Reply,
            Self::Forward => SourceType::Forward,
            Self::Compose | Self::EditDraft => SourceType::None,
        }
    }

    /// Validate a switch to `to`. Returns whether anything changes.
    ///
    /// Reply, reply-all and forward may switch among each other, and an
    /// edit-draft session may settle on one of them. Nothing enters or
    /// leaves plain compose, and nothing returns to edit-draft.
    pub fn transition(self, to: ComposeAction) -> Result<bool> {
        if self == to {
            return Ok(false);
        }
        let allowed = to.has_source() && (self.has_source() || self == Self::EditDraft);
        if allowed {
            Ok(true)
        } else {
            Err(ComposeError::InvalidTransition { from: self, to })
        }
    }
}

/// Guess what a resumed draft was from its subject: a "fwd:" prefix is a
/// forward; a "re:" prefix is a reply-all when more than one recipient is
/// present, otherwise a reply. Anything else stays undecided.
pub fn infer_action(fields: &ComposeFields) -> Option<ComposeAction> {
    let subject = fields.subject.to_lowercase();
    if subject.starts_with("fwd:") {
        Some(ComposeAction::Forward)
    } else if subject.starts_with("re:") {
        if fields.recipient_count() > 1 {
            Some(ComposeAction::ReplyAll)
        } else {
            Some(ComposeAction::Reply)
        }
    } else {
        None
    }
}

fn with_prefix(subject: &str, prefix: &str) -> String {
    if subject.to_lowercase().starts_with(&prefix.to_lowercase()) {
        subject.to_string()
    } else {
        format!("{prefix} {subject}")
    }
}

pub fn reply_subject(subject: &str) -> String {
    with_prefix(subject, REPLY_PREFIX)
}

pub fn forward_subject(subject: &str) -> String {
    with_prefix(subject, FORWARD_PREFIX)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recipients {
    pub to: Vec<Address>,
    pub cc: Vec<Address>,
    pub bcc: Vec<Address>,
}

/// Recipients for answering `source` from `own_address`.
///
/// To is the source's Reply-To, falling back to From. Reply-all adds the
/// source's To and Cc to Cc, skipping our own address and anything already
/// placed.
pub fn reply_recipients(source: &Message, own_address: &str, reply_all: bool) -> Recipients {
    let mut to = Address::unpack(&source.reply_to);
    if to.is_empty() {
        to = Address::unpack(&source.from);
    }

    let mut cc: IndexMap<String, Address> = IndexMap::new();
    if reply_all {
        let placed: Vec<String> = to.iter().map(Address::key).collect();
        let candidates = Address::unpack(&source.to)
            .into_iter()
            .chain(Address::unpack(&source.cc));
        for addr in candidates {
            let key = addr.key();
            if addr.address.eq_ignore_ascii_case(own_address) || placed.contains(&key) {
                continue;
            }
            cc.entry(key).or_insert(addr);
        }
    }

    Recipients {
        to,
        cc: cc.into_values().collect(),
        bcc: Vec::new(),
    }
}
