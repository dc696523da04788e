//! Cache and rate-limit key construction.
//!
//! Keys have the shape `<namespace>:<version>:<clientId>:<sortedParamString>`.
//! The namespace and version segments allow bulk invalidation by prefix
//! deletion when a schema changes; the client segment scopes invalidation to
//! one client.
//!
//! Construction is deterministic: no randomness, no wall-clock component,
//! stable across process restarts. Invalid or empty segments are kept as
//! empty strings rather than rejected - the cost of a bad key is a cache
//! miss, not corruption.

use sha2::{Digest, Sha256};

/// Separator between key segments.
const SEPARATOR: char = ':';

/// Separator between sorted `name=value` parameter pairs.
const PARAM_SEPARATOR: char = '&';

/// Segments longer than this are replaced by their digest so keys stay
/// bounded regardless of parameter size.
const MAX_SEGMENT_LEN: usize = 64;

/// A fully-built store key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// View the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the key and return the underlying string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Deterministic, collision-resistant key builder.
///
/// A codec is constructed once per namespace/schema-version pair and shared;
/// every key it produces is prefixed `<namespace>:<version>:`, so bumping the
/// version orphans all previous entries at once and
/// [`KeyCodec::version_prefix`] can sweep them.
#[derive(Debug, Clone)]
pub struct KeyCodec {
    namespace: String,
    version: String,
}

impl KeyCodec {
    /// Create a codec for a namespace and schema version.
    pub fn new(namespace: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            namespace: sanitize_segment(&namespace.into()),
            version: sanitize_segment(&version.into()),
        }
    }

    /// Build a key for a client and a set of named parameters.
    ///
    /// Parameters are sorted by name before joining, so callers do not need
    /// to agree on argument order for the same logical resource. Duplicate
    /// names keep their relative order.
    pub fn build(&self, client_id: &str, parts: &[(&str, &str)]) -> CacheKey {
        let mut sorted: Vec<&(&str, &str)> = parts.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));

        let params = sorted
            .iter()
            .map(|(name, value)| {
                format!("{}={}", sanitize_segment(name), sanitize_segment(value))
            })
            .collect::<Vec<_>>()
            .join(&PARAM_SEPARATOR.to_string());

        CacheKey(format!(
            "{}{sep}{}{sep}{}{sep}{}",
            self.namespace,
            self.version,
            sanitize_segment(client_id),
            params,
            sep = SEPARATOR,
        ))
    }

    /// Prefix covering every key this codec builds for one client.
    pub fn client_prefix(&self, client_id: &str) -> String {
        format!(
            "{}{sep}{}{sep}{}{sep}",
            self.namespace,
            self.version,
            sanitize_segment(client_id),
            sep = SEPARATOR,
        )
    }

    /// Prefix covering every key this codec builds, across all clients.
    pub fn version_prefix(&self) -> String {
        format!("{}{sep}{}{sep}", self.namespace, self.version, sep = SEPARATOR)
    }
}

/// Make a segment safe to embed between separators.
///
/// Segments containing a separator character, or longer than
/// [`MAX_SEGMENT_LEN`], are replaced by the hex digest of their bytes. The
/// digest is a pure function of the input, so determinism is preserved, and
/// two distinct inputs only collide if SHA-256 does.
fn sanitize_segment(segment: &str) -> String {
    // '*', '?' and '[' would act as glob metacharacters if the segment ever
    // ends up inside a SCAN MATCH pattern via a prefix helper.
    let needs_hash = segment.len() > MAX_SEGMENT_LEN
        || segment.contains(SEPARATOR)
        || segment.contains(PARAM_SEPARATOR)
        || segment.contains(['=', '*', '?', '[']);

    if needs_hash {
        let mut hasher = Sha256::new();
        hasher.update(segment.as_bytes());
        hex::encode(&hasher.finalize()[..16])
    } else {
        segment.to_string()
    }
}
