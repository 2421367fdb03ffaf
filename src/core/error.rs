use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the profile engine and entity resolution.
/// Every module returns `Result<T, CoreError>`.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request to {url} failed: HTTP {status}")]
    RequestFailed { url: String, status: u16 },

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Maven ───────────────────────────────────────────
    #[error("Invalid Maven coordinate: {0}")]
    InvalidMavenCoordinate(String),

    // ── Patches ─────────────────────────────────────────
    #[error("Patch {patch} rejected: {reason}")]
    Parse { patch: String, reason: String },

    #[error("Invalid patch uid: {0:?}")]
    InvalidPatchUid(String),

    #[error("Patch not found: {0}")]
    PatchNotFound(String),

    #[error("Patch {uid} cannot be {action}")]
    PatchLocked { uid: String, action: &'static str },

    // ── Providers ───────────────────────────────────────
    #[error("Provider {provider} failed to fetch {entity}: {reason}")]
    ProviderFetch {
        provider: String,
        entity: String,
        reason: String,
    },

    #[error("Entity update failed for providers: {}", failed.join(", "))]
    UpdateFailed { failed: Vec<String> },

    #[error("Update cancelled after {completed} providers{}", cancelled_failures(failed))]
    UpdateCancelled { completed: usize, failed: Vec<String> },

    #[error("Provider already registered: {0}")]
    DuplicateProvider(String),

    #[error("No such provider: {0}")]
    NoSuchProvider(String),

    #[error("No such entity: {0}")]
    NoSuchEntity(String),

    #[error("No such version {version} for {entity}")]
    NoSuchVersion { entity: String, version: String },

    #[error("Provider channel closed: {0}")]
    ChannelClosed(String),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

fn cancelled_failures(failed: &[String]) -> String {
    if failed.is_empty() {
        String::new()
    } else {
        format!(" ({} failed: {})", failed.len(), failed.join(", "))
    }
}

/// Convenience alias used throughout the crate.
pub type CoreResult<T> = Result<T, CoreError>;

impl From<std::io::Error> for CoreError {
    fn from(source: std::io::Error) -> Self {
        CoreError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

impl CoreError {
    pub(crate) fn parse(patch: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::Parse {
            patch: patch.into(),
            reason: reason.into(),
        }
    }
}

// ── Serialization for frontends ─────────────────────────
// Hosts that forward errors over IPC need the error type to implement `Serialize`.
impl serde::Serialize for CoreError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_failed_lists_every_provider() {
        let err = CoreError::UpdateFailed {
            failed: vec!["scripts".into(), "solder".into()],
        };
        assert_eq!(
            err.to_string(),
            "Entity update failed for providers: scripts, solder"
        );
    }

    #[test]
    fn cancelled_update_mentions_failures() {
        let clean = CoreError::UpdateCancelled {
            completed: 2,
            failed: Vec::new(),
        };
        assert_eq!(clean.to_string(), "Update cancelled after 2 providers");

        let partial = CoreError::UpdateCancelled {
            completed: 1,
            failed: vec!["scripts".into()],
        };
        assert_eq!(
            partial.to_string(),
            "Update cancelled after 1 providers (1 failed: scripts)"
        );
    }

    #[test]
    fn serializes_as_display_string() {
        let err = CoreError::NoSuchProvider("ghost".into());
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, "\"No such provider: ghost\"");
    }
}
