// ─── Lenient Version Ordering ───
// Numeric-segment-aware comparison used to decide which of two
// same-named libraries survives a merge.

use std::cmp::Ordering;
use std::fmt;

use super::artifact::MavenArtifact;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Number(u64),
    Text(String),
}

impl Segment {
    fn parse(raw: &str) -> Self {
        match raw.parse::<u64>() {
            Ok(n) => Segment::Number(n),
            Err(_) => Segment::Text(raw.to_string()),
        }
    }
}

/// A version string split into numeric and textual segments.
///
/// `1.0 == 1.0.0`, `1.10 > 1.9`, `1.0 > 1.0-SNAPSHOT`. When neither side has a
/// numeric segment the raw strings are compared lexically.
#[derive(Debug, Clone)]
pub struct LenientVersion {
    raw: String,
    segments: Vec<Segment>,
}

impl LenientVersion {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let body = trimmed
            .strip_prefix('v')
            .filter(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
            .unwrap_or(trimmed);

        let segments = body
            .split(['.', '-', '_', '+'])
            .filter(|s| !s.is_empty())
            .map(Segment::parse)
            .collect();

        Self {
            raw: trimmed.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    fn has_numbers(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Number(_)))
    }
}

impl Ord for LenientVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        if !self.has_numbers() && !other.has_numbers() {
            return self.raw.cmp(&other.raw);
        }

        let zero = Segment::Number(0);
        let max_len = self.segments.len().max(other.segments.len());
        for idx in 0..max_len {
            let a = self.segments.get(idx).unwrap_or(&zero);
            let b = other.segments.get(idx).unwrap_or(&zero);
            let ord = match (a, b) {
                (Segment::Number(x), Segment::Number(y)) => x.cmp(y),
                (Segment::Text(x), Segment::Text(y)) => x.cmp(y),
                (Segment::Number(_), Segment::Text(_)) => Ordering::Greater,
                (Segment::Text(_), Segment::Number(_)) => Ordering::Less,
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for LenientVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for LenientVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for LenientVersion {}

impl fmt::Display for LenientVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Compare two raw version strings leniently.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    LenientVersion::parse(a).cmp(&LenientVersion::parse(b))
}

/// True iff version `a` orders strictly after version `b`.
pub fn supersedes(a: &str, b: &str) -> bool {
    compare_versions(a, b) == Ordering::Greater
}

/// True iff two library specifiers name the same artifact, ignoring version.
///
/// Specifiers that don't parse as Maven coordinates fall back to comparing
/// everything before the last `:`.
pub fn same_artifact(a: &str, b: &str) -> bool {
    match (MavenArtifact::parse(a), MavenArtifact::parse(b)) {
        (Ok(a), Ok(b)) => a.matches_name(&b),
        _ => strip_version(a) == strip_version(b),
    }
}

fn strip_version(spec: &str) -> &str {
    spec.rsplit_once(':').map(|(name, _)| name).unwrap_or(spec)
}
