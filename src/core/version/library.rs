// ─── Library ───
// A library/mod reference declared by a patch, with OS rules and natives.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::maven::{self, MavenArtifact, MOJANG_LIBRARIES};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Library {
    pub name: String,
    /// Repository base the artifact is fetched from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<LibraryDownloads>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<LibraryRule>>,
    /// OS name -> classifier, e.g. `"windows": "natives-windows-${arch}"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub natives: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<LibraryHint>,
    /// Explicit file name, used by local jar mods.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(
        default,
        rename = "displayName",
        skip_serializing_if = "Option::is_none"
    )]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryHint {
    /// Resolved from the instance-local library directory.
    Local,
    /// Always re-fetched; treated like a normal library when building paths.
    Always,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryDownloads {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<LibDownloadArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifiers: Option<BTreeMap<String, LibDownloadArtifact>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibDownloadArtifact {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    pub url: String,
}

// ─── OS Rule Evaluation ───

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryRule {
    pub action: RuleAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<OsRule>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OsRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Where a native library's files live, per JVM architecture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeFiles {
    Single(PathBuf),
    PerArch { x32: PathBuf, x64: PathBuf },
}

impl Library {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: None,
            downloads: None,
            rules: None,
            natives: None,
            hint: None,
            filename: None,
            display_name: None,
        }
    }

    pub fn artifact(&self) -> Option<MavenArtifact> {
        MavenArtifact::parse(&self.name).ok()
    }

    /// Version portion of the specifier; empty when the name doesn't parse.
    pub fn version(&self) -> String {
        self.artifact().map(|a| a.version).unwrap_or_default()
    }

    pub fn same_artifact(&self, other: &Library) -> bool {
        maven::same_artifact(&self.name, &other.name)
    }

    pub fn supersedes(&self, other: &Library) -> bool {
        maven::supersedes(&self.version(), &other.version())
    }

    pub fn is_native(&self) -> bool {
        self.natives.is_some()
    }

    pub fn is_local(&self) -> bool {
        self.hint == Some(LibraryHint::Local)
    }

    /// Active on the current OS: rules allow it and, for natives, a
    /// classifier exists for this OS.
    pub fn is_active(&self) -> bool {
        self.is_active_for(current_os_name())
    }

    pub fn is_active_for(&self, os: &str) -> bool {
        if !self.is_allowed_for(os) {
            return false;
        }
        match &self.natives {
            Some(natives) => natives.contains_key(os),
            None => true,
        }
    }

    /// Evaluate the OS rules.
    ///
    /// - No rules → allowed.
    /// - Rules are processed top to bottom starting from "disallowed"; each
    ///   matching rule (no OS constraint, or the OS name matches) sets the state.
    pub fn is_allowed_for(&self, os: &str) -> bool {
        let rules = match &self.rules {
            Some(r) => r,
            None => return true,
        };

        let mut allowed = false;
        for rule in rules {
            let os_matches = match rule.os.as_ref().and_then(|o| o.name.as_deref()) {
                None => true,
                Some(name) => name == os,
            };
            if os_matches {
                allowed = rule.action == RuleAction::Allow;
            }
        }
        allowed
    }

    /// Storage path of the main artifact, relative to its library root.
    pub fn storage_path(&self) -> PathBuf {
        if let Some(filename) = &self.filename {
            return PathBuf::from(filename);
        }
        if let Some(artifact) = self.downloads.as_ref().and_then(|d| d.artifact.as_ref()) {
            return PathBuf::from(&artifact.path);
        }
        match self.artifact() {
            Some(a) => a.local_path(),
            None => PathBuf::from(&self.name),
        }
    }

    /// Storage path(s) of the native classifier for `os`.
    pub fn native_files(&self, os: &str) -> Option<NativeFiles> {
        let classifier = self.natives.as_ref()?.get(os)?;
        if classifier.contains("${arch}") {
            Some(NativeFiles::PerArch {
                x32: self.classifier_path(&classifier.replace("${arch}", "32")),
                x64: self.classifier_path(&classifier.replace("${arch}", "64")),
            })
        } else {
            Some(NativeFiles::Single(self.classifier_path(classifier)))
        }
    }

    fn classifier_path(&self, classifier: &str) -> PathBuf {
        let declared = self
            .downloads
            .as_ref()
            .and_then(|d| d.classifiers.as_ref())
            .and_then(|c| c.get(classifier));
        if let Some(download) = declared {
            return PathBuf::from(&download.path);
        }
        match self.artifact() {
            Some(a) => a.with_classifier(classifier).local_path(),
            None => PathBuf::from(format!("{}-{}", self.name, classifier)),
        }
    }

    /// Where the main artifact is downloaded from.
    pub fn download_url(&self) -> Option<String> {
        if let Some(artifact) = self.downloads.as_ref().and_then(|d| d.artifact.as_ref()) {
            return Some(artifact.url.clone());
        }
        if self.is_local() {
            return None;
        }
        let repo = self.url.as_deref().unwrap_or(MOJANG_LIBRARIES);
        self.artifact().map(|a| a.url(repo))
    }

    /// Name shown in launch summaries.
    pub fn display_name(&self) -> String {
        self.display_name.clone().unwrap_or_else(|| self.name.clone())
    }
}

/// Get the Mojang OS name for the current platform.
pub fn current_os_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "macos") {
        "osx"
    } else {
        "linux"
    }
}
