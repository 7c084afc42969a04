//! Working out which provider post a local file corresponds to.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

static POST_ID_STEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^r34_(\d+)").expect("Invalid post id regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostIdentifier {
    /// The filename embeds the post id (`r34_{id}_...`).
    PostId(String),
    /// Content hash to look up through the post API.
    Md5(String),
}

fn file_stem(path: &str) -> &str {
    Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
}

/// Post id from a `r34_{id}` filename prefix.
pub fn post_id_from_path(path: &str) -> Option<String> {
    POST_ID_STEM
        .captures(file_stem(path))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// The hex characters of the filename stem, lowercased.
pub fn md5_from_path(path: &str) -> Option<String> {
    let hash: String = file_stem(path)
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .collect::<String>()
        .to_lowercase();
    (!hash.is_empty()).then_some(hash)
}

/// Pick the best identifier for a file: an embedded post id, then the
/// store's md5 fingerprint, then a hash taken from the filename.
pub fn identify(path: Option<&str>, checksum: Option<&str>) -> Option<PostIdentifier> {
    if let Some(id) = path.and_then(post_id_from_path) {
        return Some(PostIdentifier::PostId(id));
    }
    if let Some(sum) = checksum.map(str::trim).filter(|s| !s.is_empty()) {
        return Some(PostIdentifier::Md5(sum.to_lowercase()));
    }
    path.and_then(md5_from_path).map(PostIdentifier::Md5)
}
