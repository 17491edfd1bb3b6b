/// Message flag bits as stored in the `flags` column:
///   bit 0  = reply
///   bit 1  = forward
///   bit 17 = quoted text excluded by the user
pub const FLAG_TYPE_REPLY: u32 = 1 << 0;
pub const FLAG_TYPE_FORWARD: u32 = 1 << 1;
pub const FLAG_TYPE_MASK: u32 = FLAG_TYPE_REPLY | FLAG_TYPE_FORWARD;
pub const FLAG_NOT_INCLUDE_QUOTED_TEXT: u32 = 1 << 17;

/// Attachment flag bits:
///   bit 8 = inherited from the source message (smart forward)
///   bit 9 = content must be fetched before the message can go out
pub const ATTACHMENT_FLAG_SMART_FORWARD: u32 = 1 << 8;
pub const ATTACHMENT_FLAG_DOWNLOAD_FORWARD: u32 = 1 << 9;

/// What kind of source message a draft was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceType {
    #[default]
    None,
    Reply,
    Forward,
}

impl SourceType {
    pub fn from_flags(flags: u32) -> Self {
        if flags & FLAG_TYPE_FORWARD != 0 {
            Self::Forward
        } else if flags & FLAG_TYPE_REPLY != 0 {
            Self::Reply
        } else {
            Self::None
        }
    }

    /// Replace the source-type bits of `flags`, leaving every other bit alone.
    pub fn apply(self, flags: u32) -> u32 {
        let cleared = flags & !FLAG_TYPE_MASK;
        match self {
            Self::None => cleared,
            Self::Reply => cleared | FLAG_TYPE_REPLY,
            Self::Forward => cleared | FLAG_TYPE_FORWARD,
        }
    }
}
