//! The in-memory draft and the sync of UI fields into its storage form.

use crate::address::{self, Address};
use crate::models::{Account, Body, Mailbox, Message, MessageId};
use crate::store::SourceType;

use super::shell::ComposeFields;

/// The message being composed, in storage form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Draft {
    pub message: Message,
    pub body: Body,
}

/// The message being replied to or forwarded. Immutable once loaded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceMessage {
    pub message: Message,
    pub body: Body,
}

impl SourceMessage {
    pub fn id(&self) -> Option<MessageId> {
        self.message.id
    }
}

/// Everything [`Draft::sync`] reads besides the draft itself.
pub struct SyncInput<'a> {
    pub fields: &'a ComposeFields,
    pub account: &'a Account,
    pub has_attachments: bool,
    pub source: Option<&'a SourceMessage>,
    /// Whether the quoted-text region is shown; only then does the draft
    /// carry its source reference.
    pub quoted_text_shown: bool,
    pub include_quoted_text: bool,
    pub forward: bool,
    pub now_ms: i64,
}

impl Draft {
    pub fn new(account_id: i64) -> Self {
        let mut draft = Self::default();
        draft.message.account_id = account_id;
        draft.message.mailbox = Mailbox::Drafts;
        draft
    }

    pub fn id(&self) -> Option<MessageId> {
        self.message.id
    }

    pub fn source_key(&self) -> Option<MessageId> {
        self.body.source_message_key
    }

    /// Copy the current UI state into the draft.
    ///
    /// With quoted text excluded the reply/forward fields stay in place so
    /// the user can change their mind, until `sending`, when they are
    /// dropped for good together with the source-type bits.
    pub fn sync(&mut self, input: &SyncInput<'_>, sending: bool) {
        let msg = &mut self.message;
        if msg.message_id.is_empty() {
            msg.message_id = generate_message_id();
        }
        msg.timestamp = input.now_ms;
        msg.account_id = input.account.id;
        msg.mailbox = Mailbox::Drafts;
        msg.from = Address::pack(&[Address::new(
            input.account.email_address.clone(),
            input.account.sender_name.clone(),
        )]);

        let to = input.fields.to_addresses();
        let cc = input.fields.cc_addresses();
        let bcc = input.fields.bcc_addresses();
        msg.to = Address::pack(&to);
        msg.cc = Address::pack(&cc);
        msg.bcc = Address::pack(&bcc);
        msg.display_name = address::display_name(&to, &cc, &bcc);
        msg.subject = input.fields.subject.clone();
        msg.flag_read = true;
        msg.flag_loaded = true;
        msg.flag_attachment = input.has_attachments;

        self.body.text_content = Some(input.fields.body.clone());

        if let Some(source) = input.source.filter(|_| input.quoted_text_shown) {
            self.body.source_message_key = source.id();
            self.body.text_reply = source.body.text_content.clone();
            self.body.html_reply = source.body.html_content.clone();
            if input.forward {
                msg.set_source_type(SourceType::Forward);
                self.body.intro_text = Some(forward_intro(&source.message));
            } else {
                msg.set_source_type(SourceType::Reply);
                self.body.intro_text = Some(reply_intro(&source.message));
            }
        }

        msg.set_includes_quoted_text(input.include_quoted_text);
        if !input.include_quoted_text && sending {
            self.body.intro_text = None;
            self.body.text_reply = None;
            self.body.html_reply = None;
            self.body.source_message_key = None;
            msg.set_source_type(SourceType::None);
        }
    }
}

fn unpacked(packed: &str) -> String {
    Address::join(&Address::unpack(packed))
}

pub fn reply_intro(source: &Message) -> String {
    format!("\n\n{} wrote:\n\n", unpacked(&source.from))
}

pub fn forward_intro(source: &Message) -> String {
    format!(
        "\n\n-------- Original Message --------\nSubject: {}\nFrom: {}\nTo: {}\nCC: {}\n\n",
        source.subject,
        unpacked(&source.from),
        unpacked(&source.to),
        unpacked(&source.cc),
    )
}

fn generate_message_id() -> String {
    format!("<{}@neverlight.mail>", uuid::Uuid::new_v4().simple())
}

/// Body text for a fresh composition: `text` followed by the account
/// signature, separated by a newline unless `text` already ends with one.
pub fn initial_text(text: &str, signature: Option<&str>) -> String {
    let mut out = text.to_string();
    if let Some(sig) = signature.filter(|s| !s.is_empty()) {
        if out.is_empty() || !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(sig);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::flags::FLAG_NOT_INCLUDE_QUOTED_TEXT;

    fn account() -> Account {
        Account {
            id: 4,
            email_address: "me@example.com".into(),
            sender_name: Some("Me".into()),
            signature: None,
        }
    }

    fn source() -> SourceMessage {
        SourceMessage {
            message: Message {
                id: Some(9),
                from: Address::pack(&[Address::new("alice@example.com", None)]),
                to: Address::pack(&[Address::new("me@example.com", None)]),
                subject: "lunch".into(),
                ..Message::default()
            },
            body: Body {
                text_content: Some("are you in?".into()),
                html_content: Some("<p>are you in?</p>".into()),
                ..Body::default()
            },
        }
    }

    fn fields() -> ComposeFields {
        ComposeFields {
            to: "alice@example.com".into(),
            subject: "Re: lunch".into(),
            body: "yes".into(),
            ..ComposeFields::default()
        }
    }

    fn input<'a>(
        fields: &'a ComposeFields,
        account: &'a Account,
        source: Option<&'a SourceMessage>,
        include: bool,
    ) -> SyncInput<'a> {
        SyncInput {
            fields,
            account,
            has_attachments: false,
            source,
            quoted_text_shown: true,
            include_quoted_text: include,
            forward: false,
            now_ms: 1_700_000_000_000,
        }
    }

    #[test]
    fn sync_fills_header_fields() {
        let (f, a, s) = (fields(), account(), source());
        let mut draft = Draft::new(a.id);
        draft.sync(&input(&f, &a, Some(&s), true), false);

        let msg = &draft.message;
        assert_eq!(msg.subject, "Re: lunch");
        assert_eq!(msg.display_name, "alice@example.com");
        assert_eq!(Address::unpack(&msg.from)[0].personal.as_deref(), Some("Me"));
        assert!(msg.message_id.starts_with('<'));
        assert_eq!(msg.source_type(), SourceType::Reply);
        assert_eq!(draft.source_key(), Some(9));
        assert_eq!(draft.body.text_reply.as_deref(), Some("are you in?"));
        assert_eq!(
            draft.body.intro_text.as_deref(),
            Some("\n\nalice@example.com wrote:\n\n")
        );
    }

    #[test]
    fn message_id_is_generated_once() {
        let (f, a) = (fields(), account());
        let mut draft = Draft::new(a.id);
        draft.sync(&input(&f, &a, None, true), false);
        let first = draft.message.message_id.clone();
        draft.sync(&input(&f, &a, None, true), false);
        assert_eq!(draft.message.message_id, first);
    }

    #[test]
    fn excluded_quote_survives_saves_until_send() {
        let (f, a, s) = (fields(), account(), source());
        let mut draft = Draft::new(a.id);
        draft.sync(&input(&f, &a, Some(&s), false), false);
        assert_ne!(draft.message.flags & FLAG_NOT_INCLUDE_QUOTED_TEXT, 0);
        assert!(draft.body.text_reply.is_some());

        draft.sync(&input(&f, &a, Some(&s), false), true);
        assert_eq!(draft.body.intro_text, None);
        assert_eq!(draft.body.text_reply, None);
        assert_eq!(draft.body.html_reply, None);
        assert_eq!(draft.source_key(), None);
        assert_eq!(draft.message.source_type(), SourceType::None);
        assert_eq!(draft.message.subject, "Re: lunch");
    }

    #[test]
    fn hidden_quote_bar_keeps_source_detached() {
        let (f, a, s) = (fields(), account(), source());
        let mut sync = input(&f, &a, Some(&s), true);
        sync.quoted_text_shown = false;
        let mut draft = Draft::new(a.id);
        draft.sync(&sync, false);
        assert_eq!(draft.source_key(), None);
        assert_eq!(draft.message.source_type(), SourceType::None);
    }

    #[test]
    fn forward_intro_lists_source_headers() {
        let (f, a, s) = (fields(), account(), source());
        let mut sync = input(&f, &a, Some(&s), true);
        sync.forward = true;
        let mut draft = Draft::new(a.id);
        draft.sync(&sync, false);
        assert_eq!(draft.message.source_type(), SourceType::Forward);
        assert_eq!(
            draft.body.intro_text.as_deref(),
            Some(
                "\n\n-------- Original Message --------\nSubject: lunch\n\
                 From: alice@example.com\nTo: me@example.com\nCC: \n\n"
            )
        );
    }

    #[test]
    fn signature_is_separated_by_a_newline() {
        assert_eq!(initial_text("", Some("-- me")), "\n-- me");
        assert_eq!(initial_text("hi", Some("-- me")), "hi\n-- me");
        assert_eq!(initial_text("hi\n", Some("-- me")), "hi\n-- me");
        assert_eq!(initial_text("hi", None), "hi");
    }
}
