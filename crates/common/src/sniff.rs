//! Content-type sniffing.
//!
//! Binary formats are recognised by `infer` from their magic bytes. What
//! `infer` does not classify gets a text pass over the first [`SNIFF_LEN`]
//! bytes: byte order marks, HTML tags and the XML prolog, then `text/plain`
//! when no binary control bytes appear and `application/octet-stream`
//! otherwise.

use mime::Mime;

/// Number of leading bytes the text pass considers.
pub const SNIFF_LEN: usize = 512;

const HTML: &str = "text/html; charset=utf-8";
const XML: &str = "text/xml; charset=utf-8";
const TEXT_UTF8: &str = "text/plain; charset=utf-8";

/// HTML tags recognised after leading whitespace, matched case-insensitively
/// and terminated by a space or `>`.
const HTML_TAGS: &[&[u8]] = &[
    b"<!DOCTYPE HTML",
    b"<HTML",
    b"<HEAD",
    b"<SCRIPT",
    b"<IFRAME",
    b"<H1",
    b"<DIV",
    b"<FONT",
    b"<TABLE",
    b"<A",
    b"<STYLE",
    b"<TITLE",
    b"<B",
    b"<BODY",
    b"<BR",
    b"<P",
    b"<!--",
];

const BOMS: &[(&[u8], &str)] = &[
    (b"\xEF\xBB\xBF", TEXT_UTF8),
    (b"\xFE\xFF", "text/plain; charset=utf-16be"),
    (b"\xFF\xFE", "text/plain; charset=utf-16le"),
];

fn is_ws(b: u8) -> bool {
    matches!(b, b'\t' | b'\n' | b'\x0C' | b'\r' | b' ')
}

/// Binary data bytes per the WHATWG definition.
fn is_binary(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}

fn skip_ws(data: &[u8]) -> &[u8] {
    let start = data.iter().position(|b| !is_ws(*b)).unwrap_or(data.len());
    &data[start..]
}

fn is_html(data: &[u8]) -> bool {
    HTML_TAGS.iter().any(|tag| {
        data.len() > tag.len()
            && data[..tag.len()].eq_ignore_ascii_case(tag)
            && matches!(data[tag.len()], b' ' | b'>')
    })
}

fn sniff_text(head: &[u8]) -> &'static str {
    if let Some(&(_, content_type)) = BOMS.iter().find(|(bom, _)| head.starts_with(bom)) {
        return content_type;
    }

    let trimmed = skip_ws(head);
    if is_html(trimmed) {
        return HTML;
    }
    if trimmed.starts_with(b"<?xml") {
        return XML;
    }

    if head.iter().any(|b| is_binary(*b)) {
        "application/octet-stream"
    } else {
        TEXT_UTF8
    }
}

/// Sniff the MIME type of `data` from its content, never from a name.
pub fn sniff(data: &[u8]) -> Mime {
    let content_type = match infer::get(data) {
        Some(kind) => kind.mime_type(),
        None => sniff_text(&data[..data.len().min(SNIFF_LEN)]),
    };
    content_type
        .parse()
        .unwrap_or(mime::APPLICATION_OCTET_STREAM)
}
