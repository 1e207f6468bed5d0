use regex::Regex;
use std::sync::LazyLock;

/// Slack clients turn `#channel` into a link token of this shape.
static CHANNEL_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^<#(?P<id>[CG][0-9A-Z]+)(?:\|[^>]*)?>$").expect("channel link pattern is valid")
});

/// Conversation type encoded in the first character of a channel id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// `C…`
    PublicChannel,
    /// `G…`
    PrivateGroup,
    /// `D…`
    Direct,
    Unknown,
}

impl ChannelKind {
    pub fn from_id(id: &str) -> Self {
        match id.as_bytes().first() {
            Some(b'C') => Self::PublicChannel,
            Some(b'G') => Self::PrivateGroup,
            Some(b'D') => Self::Direct,
            _ => Self::Unknown,
        }
    }

    pub fn is_private(self) -> bool {
        self == Self::PrivateGroup
    }

    /// Method family for room administration: `groups.*` for private groups,
    /// `channels.*` for everything else.
    pub fn api_family(self) -> &'static str {
        if self.is_private() {
            "groups"
        } else {
            "channels"
        }
    }

    /// Key holding the object in `channels.info` / `groups.info` responses.
    pub fn info_key(self) -> &'static str {
        if self.is_private() {
            "group"
        } else {
            "channel"
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PublicChannel => write!(f, "channel"),
            Self::PrivateGroup => write!(f, "group"),
            Self::Direct => write!(f, "im"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// How a caller referred to a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomRef {
    Id(String),
    Name(String),
}

impl RoomRef {
    /// Accepts channel links (`<#C123>`, `<#C123|general>`), bare channel or
    /// group ids, and names with or without a leading `#`.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if let Some(caps) = CHANNEL_LINK.captures(input) {
            return Self::Id(caps["id"].to_string());
        }
        if looks_like_room_id(input) {
            return Self::Id(input.to_string());
        }
        Self::Name(strip_sigil(input).to_string())
    }
}

/// `C` or `G` followed by upper-case letters and digits only.
pub fn looks_like_room_id(input: &str) -> bool {
    let mut chars = input.chars();
    matches!(chars.next(), Some('C' | 'G'))
        && input.len() > 1
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

pub fn strip_sigil(name: &str) -> &str {
    name.strip_prefix('#').unwrap_or(name)
}
