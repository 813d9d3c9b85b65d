use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use url::{Host, Url};

use crate::address;
use crate::entry::EntryKind;

const CRLF: &str = "\r\n";
const EOM: &[u8] = b".";

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid url `{address}`: {source}")]
    InvalidUrl {
        address: String,
        source: url::ParseError,
    },
    #[error("invalid scheme `{0}`")]
    InvalidScheme(String),
    #[error("missing host for `{0}`")]
    MissingHost(String),
    #[error("unsupported item type `{0}`")]
    UnsupportedType(char),
    #[error("cannot connect to `{endpoint}`: {source}")]
    Connect {
        endpoint: String,
        source: io::Error,
    },
    #[error("cannot send request: {0}")]
    Write(#[source] io::Error),
    #[error("while reading response: {0}")]
    Read(#[source] io::Error),
}

/// Outcome of one fetch, handed back to whoever requested it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    Menu { address: String, lines: Vec<String> },
    Html { address: String, body: String },
    Error { message: String },
}

impl FetchResult {
    pub fn error(message: impl Into<String>) -> Self {
        FetchResult::Error {
            message: message.into(),
        }
    }

    pub fn address(&self) -> Option<&str> {
        match self {
            FetchResult::Menu { address, .. } | FetchResult::Html { address, .. } => {
                Some(address)
            }
            FetchResult::Error { .. } => None,
        }
    }
}

impl From<FetchError> for FetchResult {
    fn from(err: FetchError) -> Self {
        FetchResult::error(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Option<Duration>,
    pub read: Option<Duration>,
}

/// Where a request address points: server, selector and expected item type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: u16,
    pub selector: String,
    pub kind: EntryKind,
}

impl Target {
    pub fn parse(address: &str) -> Result<Self, FetchError> {
        let normalized = if address.starts_with("//") {
            format!("{}:{}", address::SCHEME, address)
        } else {
            address.to_string()
        };
        let url = Url::parse(&normalized).map_err(|source| FetchError::InvalidUrl {
            address: address.to_string(),
            source,
        })?;

        if url.scheme() != address::SCHEME {
            return Err(FetchError::InvalidScheme(url.scheme().to_string()));
        }

        let host = match url.host() {
            Some(Host::Domain(domain)) if !domain.is_empty() => domain.to_string(),
            Some(Host::Ipv4(ip)) => ip.to_string(),
            Some(Host::Ipv6(ip)) => ip.to_string(),
            _ => return Err(FetchError::MissingHost(address.to_string())),
        };
        let port = url.port().unwrap_or(address::DEFAULT_PORT);

        let mut selector = String::new();
        let mut kind = EntryKind::default();
        for (key, value) in url.query_pairs() {
            if key == address::SELECTOR_PARAM {
                selector = value.into_owned();
            } else if key == address::TYPE_PARAM {
                if let Some(code) = value.chars().next() {
                    kind = EntryKind::from_code(code);
                }
            }
        }

        Ok(Self {
            host,
            port,
            selector,
            kind,
        })
    }

    pub fn endpoint(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Performs one request over a fresh connection. The connection is closed
/// when this returns, whatever the outcome.
pub fn fetch(address: &str, timeouts: Timeouts) -> Result<FetchResult, FetchError> {
    let target = Target::parse(address)?;
    if !target.kind.is_text() {
        return Err(FetchError::UnsupportedType(target.kind.code()));
    }

    let mut stream = connect(&target, timeouts)?;
    stream
        .set_read_timeout(timeouts.read)
        .and_then(|_| stream.set_write_timeout(timeouts.read))
        .map_err(FetchError::Read)?;

    send_selector(&mut stream, &target.selector)?;

    let mut reader = BufReader::new(stream);
    if target.kind == EntryKind::Html {
        let body = read_body(&mut reader)?;
        Ok(FetchResult::Html {
            address: address.to_string(),
            body,
        })
    } else {
        let lines = read_menu(&mut reader)?;
        Ok(FetchResult::Menu {
            address: address.to_string(),
            lines,
        })
    }
}

fn connect(target: &Target, timeouts: Timeouts) -> Result<TcpStream, FetchError> {
    let connect_error = |source: io::Error| FetchError::Connect {
        endpoint: target.endpoint(),
        source,
    };

    let candidates = (target.host.as_str(), target.port)
        .to_socket_addrs()
        .map_err(connect_error)?;

    let mut last_error = None;
    for candidate in candidates {
        let attempt = match timeouts.connect {
            Some(limit) => TcpStream::connect_timeout(&candidate, limit),
            None => TcpStream::connect(candidate),
        };
        match attempt {
            Ok(stream) => return Ok(stream),
            Err(err) => last_error = Some(err),
        }
    }

    Err(connect_error(last_error.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses")
    })))
}

pub fn send_selector<W: Write>(writer: &mut W, selector: &str) -> Result<(), FetchError> {
    writer
        .write_all(format!("{selector}{CRLF}").as_bytes())
        .and_then(|_| writer.flush())
        .map_err(FetchError::Write)
}

/// Reads `\r\n` framed lines until the end-of-menu marker or end of stream.
pub fn read_menu<R: BufRead>(reader: &mut R) -> Result<Vec<String>, FetchError> {
    let mut lines = Vec::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = reader.read_until(b'\n', &mut buf).map_err(FetchError::Read)?;
        if read == 0 {
            break;
        }
        let line = strip_terminator(&buf);
        if line == EOM {
            break;
        }
        lines.push(String::from_utf8_lossy(line).into_owned());
    }
    Ok(lines)
}

/// Reads the whole stream with no framing.
pub fn read_body<R: Read>(reader: &mut R) -> Result<String, FetchError> {
    let mut body = Vec::new();
    reader.read_to_end(&mut body).map_err(FetchError::Read)?;
    Ok(String::from_utf8_lossy(&body).into_owned())
}

fn strip_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
        }
    }

    #[test]
    fn menu_stops_at_end_marker() {
        let mut reader = Cursor::new(b"abc\r\ndef\r\n.\r\nignored\r\n".to_vec());
        assert_eq!(read_menu(&mut reader).unwrap(), vec!["abc", "def"]);
    }

    #[test]
    fn menu_stops_at_end_of_stream() {
        let mut reader = Cursor::new(b"abc\r\ndef\r\n".to_vec());
        assert_eq!(read_menu(&mut reader).unwrap(), vec!["abc", "def"]);
    }

    #[test]
    fn menu_keeps_dot_prefixed_lines() {
        let mut reader = Cursor::new(b"i.hidden\r\n..\r\n.\r\n".to_vec());
        assert_eq!(read_menu(&mut reader).unwrap(), vec!["i.hidden", ".."]);
    }

    #[test]
    fn menu_tolerates_bare_newlines_and_trailing_data() {
        let mut reader = Cursor::new(b"abc\ndef".to_vec());
        assert_eq!(read_menu(&mut reader).unwrap(), vec!["abc", "def"]);
    }

    #[test]
    fn menu_keeps_tabs_and_empty_lines() {
        let mut reader = Cursor::new(b"1Docs\t/docs\thost\t70\r\n\r\n.\r\n".to_vec());
        assert_eq!(
            read_menu(&mut reader).unwrap(),
            vec!["1Docs\t/docs\thost\t70", ""]
        );
    }

    #[test]
    fn read_errors_are_reported() {
        let mut reader = BufReader::new(FailingReader);
        assert!(matches!(read_menu(&mut reader), Err(FetchError::Read(_))));
        assert!(matches!(
            read_body(&mut FailingReader),
            Err(FetchError::Read(_))
        ));
    }

    #[test]
    fn body_is_returned_unmodified() {
        let html = "<html>\r\n<body>.\r\n</body>\n</html>";
        let mut reader = Cursor::new(html.as_bytes().to_vec());
        assert_eq!(read_body(&mut reader).unwrap(), html);
    }

    #[test]
    fn selector_is_sent_with_crlf() {
        let mut wire = Vec::new();
        send_selector(&mut wire, "/req").unwrap();
        assert_eq!(wire, b"/req\r\n");
    }

    #[test]
    fn target_defaults() {
        let target = Target::parse("gopher://example.org").unwrap();
        assert_eq!(target.host, "example.org");
        assert_eq!(target.port, 70);
        assert_eq!(target.selector, "");
        assert_eq!(target.kind, EntryKind::Menu);
    }

    #[test]
    fn target_reads_query() {
        let target = Target::parse("gopher://go.server.net:42/?q=/a%20b&t=h&l=3").unwrap();
        assert_eq!(target.port, 42);
        assert_eq!(target.selector, "/a b");
        assert_eq!(target.kind, EntryKind::Html);
        assert_eq!(target.endpoint(), "go.server.net:42");
    }

    #[test]
    fn target_accepts_empty_scheme() {
        let target = Target::parse("//example.org:7070/?q=/x").unwrap();
        assert_eq!(target.host, "example.org");
        assert_eq!(target.port, 7070);
    }

    #[test]
    fn target_errors() {
        assert!(matches!(
            Target::parse("not a url"),
            Err(FetchError::InvalidUrl { .. })
        ));
        let err = Target::parse("http://example.org").unwrap_err();
        assert!(matches!(err, FetchError::InvalidScheme(ref scheme) if scheme == "http"));
        assert!(err.to_string().starts_with("invalid scheme"));
        assert!(matches!(
            Target::parse("gopher:nohost"),
            Err(FetchError::MissingHost(_))
        ));
    }

    #[test]
    fn binary_types_are_refused_before_connecting() {
        let err = fetch("gopher://192.0.2.1/?q=/file.bin&t=9", Timeouts::default()).unwrap_err();
        assert!(matches!(err, FetchError::UnsupportedType('9')));
    }

    #[test]
    fn errors_convert_to_results() {
        let result = FetchResult::from(FetchError::MissingHost("gopher:x".into()));
        assert_eq!(result, FetchResult::error("missing host for `gopher:x`"));
        assert_eq!(result.address(), None);
    }
}
