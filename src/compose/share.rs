//! Turning an inbound share / view / sendto request into initial fields and
//! attachments.

use serde::{Deserialize, Serialize};

use crate::config::ComposeConfig;
use crate::models::{AccountId, Attachment};

use super::draft::initial_text;
use super::shell::ComposeFields;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShareKind {
    View,
    SendTo,
    /// One streamed file.
    Send,
    /// Any number of streamed files.
    SendMultiple,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedFile {
    pub filename: String,
    pub content_uri: String,
    /// `None` when the provider could not measure it.
    pub size: Option<u64>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareRequest {
    pub account_id: AccountId,
    pub kind: ShareKind,
    #[serde(default)]
    pub to: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub bcc: Vec<String>,
    pub subject: Option<String>,
    pub uri: Option<String>,
    pub text: Option<String>,
    #[serde(default)]
    pub files: Vec<SharedFile>,
}

impl ShareRequest {
    pub fn new(account_id: AccountId, kind: ShareKind) -> Self {
        Self {
            account_id,
            kind,
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            subject: None,
            uri: None,
            text: None,
            files: Vec::new(),
        }
    }
}

/// What a share request contributes to a fresh draft.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShareContent {
    pub fields: ComposeFields,
    /// Candidates only; the size limit is enforced when they are added.
    pub attachments: Vec<Attachment>,
}

#[derive(Default)]
struct MailTo {
    to: Vec<String>,
    cc: Vec<String>,
    bcc: Vec<String>,
    subject: Option<String>,
    body: Option<String>,
}

fn decode(s: &str) -> Option<String> {
    match urlencoding::decode(s) {
        Ok(v) => Some(v.into_owned()),
        Err(e) => {
            log::warn!("Ignoring undecodable mailto part '{s}': {e}");
            None
        }
    }
}

fn split_addresses(list: &str) -> impl Iterator<Item = String> + '_ {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_mailto(rest: &str) -> MailTo {
    let mut out = MailTo::default();
    let (recipients, query) = match rest.split_once('?') {
        Some((r, q)) => (r, Some(q)),
        None => (rest, None),
    };
    if let Some(to) = decode(recipients) {
        out.to.extend(split_addresses(&to));
    }

    for pair in query.into_iter().flat_map(|q| q.split('&')) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let Some(value) = decode(value) else {
            continue;
        };
        match key.to_ascii_lowercase().as_str() {
            "to" => out.to.extend(split_addresses(&value)),
            "cc" => out.cc.extend(split_addresses(&value)),
            "bcc" => out.bcc.extend(split_addresses(&value)),
            "subject" if out.subject.is_none() => out.subject = Some(value),
            "body" if out.body.is_none() => out.body = Some(value),
            _ => {}
        }
    }
    out
}

/// Case-insensitive MIME match against patterns such as `image/*` or `*/*`.
pub fn mime_type_matches(mime_type: &str, patterns: &[String]) -> bool {
    let Some((ty, sub)) = mime_type.split_once('/') else {
        return false;
    };
    patterns.iter().any(|pattern| {
        let Some((pty, psub)) = pattern.split_once('/') else {
            return false;
        };
        (pty == "*" || pty.eq_ignore_ascii_case(ty)) && (psub == "*" || psub.eq_ignore_ascii_case(sub))
    })
}

impl ShareRequest {
    /// Build the initial fields and candidate attachments. `signature` is
    /// appended to the body text.
    pub fn resolve(&self, signature: Option<&str>, config: &ComposeConfig) -> ShareContent {
        let mut to = self.to.clone();
        let mut cc = self.cc.clone();
        let mut bcc = self.bcc.clone();
        let mut subject = self.subject.clone();
        let mut mailto_body = None;

        if let Some(uri) = self.uri.as_deref() {
            match uri.split_once(':') {
                Some((scheme, rest)) if scheme.eq_ignore_ascii_case("mailto") => {
                    let mailto = parse_mailto(rest);
                    to.extend(mailto.to);
                    cc.extend(mailto.cc);
                    bcc.extend(mailto.bcc);
                    if mailto.subject.is_some() {
                        subject = mailto.subject;
                    }
                    mailto_body = mailto.body;
                }
                Some((_, rest)) => to.extend(split_addresses(rest)),
                None => log::debug!("Share uri without a scheme: {uri}"),
            }
        }

        let text = self.text.as_deref().or(mailto_body.as_deref()).unwrap_or("");
        let fields = ComposeFields {
            to: to.join(", "),
            cc: cc.join(", "),
            bcc: bcc.join(", "),
            subject: subject.unwrap_or_default(),
            body: initial_text(text, signature),
        };

        let streamed = match self.kind {
            ShareKind::Send => &self.files[..self.files.len().min(1)],
            ShareKind::SendMultiple => &self.files[..],
            ShareKind::View | ShareKind::SendTo => &[][..],
        };
        let limit = config.max_attachment_upload_size;
        let attachments = streamed
            .iter()
            .filter(|f| {
                f.mime_type
                    .as_deref()
                    .is_some_and(|m| !m.is_empty() && mime_type_matches(m, &config.accepted_share_types))
            })
            .map(|f| {
                // Unmeasurable files are forced over the limit.
                let size = f.size.filter(|s| *s > 0).unwrap_or(limit.saturating_add(1));
                let mut attachment =
                    Attachment::new(f.filename.clone(), f.mime_type.clone().unwrap_or_default(), size);
                attachment.content_uri = Some(f.content_uri.clone());
                attachment
            })
            .collect();

        ShareContent { fields, attachments }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_uri(uri: &str) -> ShareRequest {
        let mut req = ShareRequest::new(1, ShareKind::View);
        req.uri = Some(uri.into());
        req
    }

    fn file(name: &str, mime: Option<&str>, size: Option<u64>) -> SharedFile {
        SharedFile {
            filename: name.into(),
            content_uri: format!("file:///tmp/{name}"),
            size,
            mime_type: mime.map(str::to_string),
        }
    }

    #[test]
    fn mailto_fills_every_field() {
        let req = with_uri(
            "mailto:a%40x.com,b@x.com?cc=c@x.com&to=d@x.com&bcc=e@x.com\
             &subject=Hello%20there&subject=ignored&body=line%201",
        );
        let content = req.resolve(None, &ComposeConfig::default());
        let f = content.fields;
        assert_eq!(f.to, "a@x.com, b@x.com, d@x.com");
        assert_eq!(f.cc, "c@x.com");
        assert_eq!(f.bcc, "e@x.com");
        assert_eq!(f.subject, "Hello there");
        assert_eq!(f.body, "line 1");
    }

    #[test]
    fn explicit_text_beats_mailto_body() {
        let mut req = with_uri("mailto:a@x.com?body=from-uri");
        req.text = Some("from-text".into());
        let content = req.resolve(Some("-- sig"), &ComposeConfig::default());
        assert_eq!(content.fields.body, "from-text\n-- sig");
    }

    #[test]
    fn other_schemes_contribute_to_addresses() {
        let content = with_uri("sms:a@x.com, b@x.com").resolve(None, &ComposeConfig::default());
        assert_eq!(content.fields.to, "a@x.com, b@x.com");
    }

    #[test]
    fn extras_come_before_uri_recipients() {
        let mut req = with_uri("mailto:b@x.com");
        req.to = vec!["a@x.com".into()];
        req.subject = Some("extra".into());
        let content = req.resolve(None, &ComposeConfig::default());
        assert_eq!(content.fields.to, "a@x.com, b@x.com");
        assert_eq!(content.fields.subject, "extra");
    }

    #[test]
    fn streams_only_count_for_send_kinds() {
        let mut req = ShareRequest::new(1, ShareKind::SendTo);
        req.files = vec![file("a.png", Some("image/png"), Some(10))];
        assert!(req.resolve(None, &ComposeConfig::default()).attachments.is_empty());

        req.kind = ShareKind::Send;
        req.files.push(file("b.png", Some("image/png"), Some(10)));
        assert_eq!(req.resolve(None, &ComposeConfig::default()).attachments.len(), 1);

        req.kind = ShareKind::SendMultiple;
        let atts = req.resolve(None, &ComposeConfig::default()).attachments;
        assert_eq!(atts.len(), 2);
        assert_eq!(atts[1].content_uri.as_deref(), Some("file:///tmp/b.png"));
    }

    #[test]
    fn unaccepted_or_untyped_streams_are_dropped() {
        let config = ComposeConfig {
            accepted_share_types: vec!["image/*".into()],
            ..ComposeConfig::default()
        };
        let mut req = ShareRequest::new(1, ShareKind::SendMultiple);
        req.files = vec![
            file("a.png", Some("IMAGE/PNG"), Some(10)),
            file("b.exe", Some("application/x-msdownload"), Some(10)),
            file("c", None, Some(10)),
        ];
        let atts = req.resolve(None, &config).attachments;
        assert_eq!(atts.len(), 1);
        assert_eq!(atts[0].filename, "a.png");
    }

    #[test]
    fn unmeasured_size_is_over_the_limit() {
        let config = ComposeConfig::default();
        let mut req = ShareRequest::new(1, ShareKind::SendMultiple);
        req.files = vec![
            file("a.txt", Some("text/plain"), None),
            file("b.txt", Some("text/plain"), Some(0)),
        ];
        for att in req.resolve(None, &config).attachments {
            assert!(att.size > config.max_attachment_upload_size);
        }
    }

    #[test]
    fn mime_patterns() {
        let all = vec!["*/*".to_string()];
        assert!(mime_type_matches("text/plain", &all));
        assert!(!mime_type_matches("garbage", &all));
        let text = vec!["text/*".to_string(), "application/pdf".to_string()];
        assert!(mime_type_matches("text/html", &text));
        assert!(mime_type_matches("application/PDF", &text));
        assert!(!mime_type_matches("application/zip", &text));
    }
}
