use std::fmt;

use crate::address;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("while parsing `{line}`: missing item type")]
    EmptyType { line: String },
}

/// Gopher item type, the first character of a menu line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EntryKind {
    File,
    #[default]
    Menu,
    Ccso,
    Error,
    BinHex,
    Dos,
    UuEncoded,
    Search,
    Telnet,
    Binary,
    Mirror,
    Telnet3270,
    Gif,
    Image,
    Html,
    Info,
    Sound,
    Other(char),
}

impl EntryKind {
    pub fn from_code(code: char) -> Self {
        match code {
            '0' => EntryKind::File,
            '1' => EntryKind::Menu,
            '2' => EntryKind::Ccso,
            '3' => EntryKind::Error,
            '4' => EntryKind::BinHex,
            '5' => EntryKind::Dos,
            '6' => EntryKind::UuEncoded,
            '7' => EntryKind::Search,
            '8' => EntryKind::Telnet,
            '9' => EntryKind::Binary,
            '+' => EntryKind::Mirror,
            'T' => EntryKind::Telnet3270,
            'g' => EntryKind::Gif,
            'I' => EntryKind::Image,
            'h' => EntryKind::Html,
            'i' => EntryKind::Info,
            's' => EntryKind::Sound,
            other => EntryKind::Other(other),
        }
    }

    pub fn code(&self) -> char {
        match self {
            EntryKind::File => '0',
            EntryKind::Menu => '1',
            EntryKind::Ccso => '2',
            EntryKind::Error => '3',
            EntryKind::BinHex => '4',
            EntryKind::Dos => '5',
            EntryKind::UuEncoded => '6',
            EntryKind::Search => '7',
            EntryKind::Telnet => '8',
            EntryKind::Binary => '9',
            EntryKind::Mirror => '+',
            EntryKind::Telnet3270 => 'T',
            EntryKind::Gif => 'g',
            EntryKind::Image => 'I',
            EntryKind::Html => 'h',
            EntryKind::Info => 'i',
            EntryKind::Sound => 's',
            EntryKind::Other(code) => *code,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EntryKind::Menu => "menu",
            EntryKind::Html => "html",
            EntryKind::Image | EntryKind::Gif => "image",
            EntryKind::BinHex | EntryKind::Dos | EntryKind::UuEncoded | EntryKind::Binary => {
                "binary"
            }
            EntryKind::Telnet | EntryKind::Telnet3270 => "telnet",
            EntryKind::Error => "error",
            EntryKind::Search => "search",
            EntryKind::Mirror => "mirror",
            EntryKind::Ccso => "ccso",
            EntryKind::File => "file",
            EntryKind::Sound => "sound",
            EntryKind::Info | EntryKind::Other(_) => "",
        }
    }

    /// Kinds this client can request and display itself.
    pub fn is_link(&self) -> bool {
        matches!(self, EntryKind::Menu | EntryKind::Html)
    }

    /// Whether a response of this kind is readable text. Binary payloads,
    /// images, sounds and interactive sessions are never decoded.
    pub fn is_text(&self) -> bool {
        matches!(
            self,
            EntryKind::File
                | EntryKind::Menu
                | EntryKind::Ccso
                | EntryKind::Error
                | EntryKind::Search
                | EntryKind::Mirror
                | EntryKind::Html
                | EntryKind::Info
        )
    }
}

/// One line of a Gopher menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub kind: EntryKind,
    pub display: String,
    pub selector: Option<String>,
    pub host: Option<String>,
    pub port: Option<String>,
    address: Option<String>,
}

impl Entry {
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let fields: Vec<&str> = line.split('\t').collect();
        let head = fields.first().copied().unwrap_or_default();
        let mut chars = head.chars();
        let Some(code) = chars.next() else {
            return Err(ParseError::EmptyType {
                line: line.to_string(),
            });
        };
        let kind = EntryKind::from_code(code);
        let display = chars.as_str().to_string();

        let (selector, host, port, address) = if fields.len() >= 4 {
            let (selector, host, port) = (fields[1], fields[2], fields[3]);
            (
                Some(selector.to_string()),
                Some(host.to_string()),
                Some(port.to_string()),
                Some(address::for_entry(host, port, selector, kind)),
            )
        } else {
            (None, None, None, None)
        };

        Ok(Self {
            kind,
            display,
            selector,
            host,
            port,
            address,
        })
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn label(&self) -> &'static str {
        self.kind.label()
    }

    pub fn is_link(&self) -> bool {
        self.kind.is_link()
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self.label();
        if label.is_empty() {
            f.write_str(&self.display)
        } else {
            write!(f, "[{}] {}", label, self.display)
        }
    }
}

/// Parses every line of a menu. One malformed line rejects the whole listing.
pub fn parse_listing<S: AsRef<str>>(lines: &[S]) -> Result<Vec<Entry>, ParseError> {
    lines.iter().map(|line| Entry::parse(line.as_ref())).collect()
}
