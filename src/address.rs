//! Recipient addresses: parsing user-entered text, the packed storage form,
//! and validation.

use std::fmt;

const PACK_ADDRESS_SEPARATOR: char = '\u{1}';
const PACK_PERSONAL_SEPARATOR: char = '\u{2}';

/// Characters that force the personal name to be quoted when rendered.
const SPECIALS: &[char] = &['(', ')', '<', '>', '@', ',', ';', ':', '\\', '"', '.', '[', ']'];

#[derive(Debug, Clone)]
pub struct Address {
    pub address: String,
    pub personal: Option<String>,
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.address.eq_ignore_ascii_case(&other.address)
    }
}

impl Eq for Address {}

impl Address {
    pub fn new(address: impl Into<String>, personal: Option<String>) -> Self {
        let personal = personal.filter(|p| !p.trim().is_empty());
        Self {
            address: address.into(),
            personal,
        }
    }

    /// Lowercased address, used as a de-duplication key.
    pub fn key(&self) -> String {
        self.address.to_ascii_lowercase()
    }

    /// Personal name if present, otherwise the bare address.
    pub fn friendly(&self) -> &str {
        self.personal.as_deref().unwrap_or(self.address.as_str())
    }

    pub fn is_valid(&self) -> bool {
        let addr = self.address.as_str();
        if addr.chars().any(char::is_whitespace) {
            return false;
        }
        let Some((local, domain)) = addr.rsplit_once('@') else {
            return false;
        };
        !local.is_empty()
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
    }

    /// Parse user-entered recipient text (`a@x, "Name" <b@x>; c@x`).
    pub fn parse(text: &str) -> Vec<Address> {
        tokenize(text)
            .into_iter()
            .filter_map(|token| parse_token(&token))
            .collect()
    }

    /// True when every non-empty token of `text` is a valid address.
    pub fn is_all_valid(text: &str) -> bool {
        tokenize(text).iter().all(|token| {
            let token = token.trim();
            token.is_empty() || parse_token(token).is_some_and(|a| a.is_valid())
        })
    }

    pub fn pack(addresses: &[Address]) -> String {
        addresses
            .iter()
            .map(|a| match &a.personal {
                Some(p) => format!("{}{}{}", a.address, PACK_PERSONAL_SEPARATOR, p),
                None => a.address.clone(),
            })
            .collect::<Vec<_>>()
            .join(&PACK_ADDRESS_SEPARATOR.to_string())
    }

    pub fn unpack(packed: &str) -> Vec<Address> {
        packed
            .split(PACK_ADDRESS_SEPARATOR)
            .filter(|s| !s.is_empty())
            .map(|s| match s.split_once(PACK_PERSONAL_SEPARATOR) {
                Some((addr, personal)) => Address::new(addr, Some(personal.to_string())),
                None => Address::new(s, None),
            })
            .collect()
    }

    /// Render a list back into editable text, the way the recipient fields show it.
    pub fn join(addresses: &[Address]) -> String {
        addresses
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.personal {
            Some(p) if p.contains(SPECIALS) => {
                write!(f, "\"{}\" <{}>", p.replace('"', "\\\""), self.address)
            }
            Some(p) => write!(f, "{p} <{}>", self.address),
            None => f.write_str(&self.address),
        }
    }
}

/// Summary of who a message goes to: the first recipient's friendly form,
/// plus a count of the rest.
pub fn display_name(to: &[Address], cc: &[Address], bcc: &[Address]) -> String {
    let total = to.len() + cc.len() + bcc.len();
    let Some(first) = to.iter().chain(cc).chain(bcc).next() else {
        return String::new();
    };
    if total == 1 {
        first.friendly().to_string()
    } else {
        format!("{} and {} others", first.friendly(), total - 1)
    }
}

fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut in_angle = false;
    for c in text.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            '<' if !in_quotes => {
                in_angle = true;
                current.push(c);
            }
            '>' if !in_quotes => {
                in_angle = false;
                current.push(c);
            }
            ',' | ';' if !in_quotes && !in_angle => {
                tokens.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    tokens.push(current);
    tokens
}

fn parse_token(token: &str) -> Option<Address> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    if let (Some(open), Some(close)) = (token.rfind('<'), token.rfind('>')) {
        if open < close {
            let address = token[open + 1..close].trim();
            if address.is_empty() {
                return None;
            }
            let personal = token[..open].trim().trim_matches('"').replace("\\\"", "\"");
            return Some(Address::new(address, Some(personal)));
        }
    }
    Some(Address::new(token, None))
}
