//! Response body decoding.
//!
//! Wiki and post pages are usually UTF-8, but older pages declare legacy
//! charsets. The declared charset wins; otherwise UTF-8, lossy as a last resort.

use std::sync::LazyLock;

use encoding_rs::Encoding;
use regex::bytes::Regex;

/// `charset=` inside a `<meta ...>` tag.
static META_CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]*charset\s*=\s*["']?\s*([A-Za-z0-9_\-:.]+)"#)
        .expect("Invalid meta charset regex")
});

/// How far into a document to look for a meta charset declaration.
const META_SCAN_BYTES: usize = 1024;

/// Decode a response body, honouring the Content-Type header and HTML meta tags.
pub fn decode_bytes_to_utf8(bytes: &[u8], content_type: Option<&str>) -> String {
    let declared = content_type
        .and_then(charset_from_content_type)
        .or_else(|| charset_from_html_meta(bytes));

    if let Some(encoding) = declared.filter(|e| *e != encoding_rs::UTF_8) {
        let (decoded, _, _) = encoding.decode(bytes);
        return decoded.into_owned();
    }

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(e) => {
            tracing::debug!("falling back to lossy UTF-8 conversion: {}", e);
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// e.g. "text/html; charset=iso-8859-1" -> ISO-8859-1 (mapped to windows-1252 per WHATWG)
fn charset_from_content_type(content_type: &str) -> Option<&'static Encoding> {
    let lower = content_type.to_ascii_lowercase();
    let label = lower
        .split(';')
        .filter_map(|part| part.trim().strip_prefix("charset="))
        .next()?
        .trim_matches(|c| c == '"' || c == '\'' || c == ' ');

    if label.is_empty() {
        return None;
    }
    Encoding::for_label(label.as_bytes())
}

fn charset_from_html_meta(bytes: &[u8]) -> Option<&'static Encoding> {
    let head = &bytes[..bytes.len().min(META_SCAN_BYTES)];
    let label = META_CHARSET.captures(head)?.get(1)?;
    Encoding::for_label(label.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_utf8_passthrough() {
        assert_eq!(decode_bytes_to_utf8("héllo".as_bytes(), None), "héllo");
    }

    #[test]
    fn test_content_type_charset_wins() {
        // 0xE9 is "é" in latin-1
        let bytes = b"caf\xe9";
        let decoded = decode_bytes_to_utf8(bytes, Some("text/html; charset=ISO-8859-1"));
        assert_eq!(decoded, "café");
    }

    #[test]
    fn test_meta_charset_detected() {
        let bytes = b"<html><head><meta charset=\"windows-1252\"></head><body>caf\xe9</body>";
        let decoded = decode_bytes_to_utf8(bytes, Some("text/html"));
        assert!(decoded.contains("café"));
    }

    #[test]
    fn test_meta_http_equiv_detected() {
        let bytes = b"<meta http-equiv=\"Content-Type\" content=\"text/html; charset=iso-8859-1\">caf\xe9";
        assert!(decode_bytes_to_utf8(bytes, None).ends_with("café"));
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let decoded = decode_bytes_to_utf8(b"ok\xff", None);
        assert!(decoded.starts_with("ok"));
        assert!(decoded.contains('\u{FFFD}'));
    }

    #[test]
    fn test_unknown_label_ignored() {
        assert_eq!(
            decode_bytes_to_utf8(b"plain", Some("text/html; charset=not-a-charset")),
            "plain"
        );
    }
}
