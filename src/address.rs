use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::entry::EntryKind;

pub const DEFAULT_PORT: u16 = 70;
pub const SCHEME: &str = "gopher";

/// Query parameter carrying the selector.
pub const SELECTOR_PARAM: &str = "q";
/// Query parameter carrying the item type.
pub const TYPE_PARAM: &str = "t";
/// Query parameter carrying the 1-based cursor line saved in history.
pub const LINE_PARAM: &str = "l";

// Characters that would change how the query string splits or decodes.
const SELECTOR_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'<')
    .add(b'=')
    .add(b'>');

pub fn for_entry(host: &str, port: &str, selector: &str, kind: EntryKind) -> String {
    format!(
        "{SCHEME}://{host}:{port}/?{SELECTOR_PARAM}={}&{TYPE_PARAM}={}",
        utf8_percent_encode(selector, SELECTOR_ENCODE_SET),
        kind.code()
    )
}

/// Turns what a user typed into a request address. Bare host names and
/// scheme-relative addresses are treated as gopher.
pub fn normalize(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.starts_with("//") {
        format!("{SCHEME}:{trimmed}")
    } else if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("{SCHEME}://{trimmed}")
    }
}

/// Returns `address` with the cursor line stored in its query string,
/// replacing any line already there. Other query segments are kept byte for
/// byte so that [`take_line`] gives back the original address.
pub fn with_line(address: &str, line: usize) -> String {
    let line_segment = format!("{LINE_PARAM}={line}");
    let (base, query, fragment) = split(address);
    let mut segments: Vec<&str> = query
        .map(|q| q.split('&').filter(|segment| !is_line_segment(segment)).collect())
        .unwrap_or_default();
    segments.push(&line_segment);
    join(base, &segments, fragment)
}

/// Removes the cursor line from `address`, returning the clean address and
/// the line if one was stored.
pub fn take_line(address: &str) -> (String, Option<usize>) {
    let (base, query, fragment) = split(address);
    let Some(query) = query else {
        return (address.to_string(), None);
    };

    let mut line = None;
    let mut segments = Vec::new();
    for segment in query.split('&') {
        if is_line_segment(segment) {
            if let Some((_, value)) = segment.split_once('=') {
                line = value.parse::<usize>().ok().or(line);
            }
        } else {
            segments.push(segment);
        }
    }
    (join(base, &segments, fragment), line)
}

fn is_line_segment(segment: &str) -> bool {
    segment
        .split_once('=')
        .map(|(key, _)| key == LINE_PARAM)
        .unwrap_or(segment == LINE_PARAM)
}

fn split(address: &str) -> (&str, Option<&str>, Option<&str>) {
    let (rest, fragment) = match address.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment)),
        None => (address, None),
    };
    match rest.split_once('?') {
        Some((base, query)) => (base, Some(query), fragment),
        None => (rest, None, fragment),
    }
}

fn join(base: &str, segments: &[&str], fragment: Option<&str>) -> String {
    let mut out = base.to_string();
    if !segments.is_empty() {
        out.push('?');
        out.push_str(&segments.join("&"));
    }
    if let Some(fragment) = fragment {
        out.push('#');
        out.push_str(fragment);
    }
    out
}
