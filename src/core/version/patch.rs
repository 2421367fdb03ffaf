// ─── Version Patch ───
// One immutable document contributing a subset of launch-profile fields.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::library::Library;
use crate::core::error::{CoreError, CoreResult};

/// Severity of a problem attached to a patch or to a merged profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemSeverity {
    #[default]
    None,
    Warning,
    Error,
    FatalError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchProblem {
    pub severity: ProblemSeverity,
    pub description: String,
}

impl PatchProblem {
    pub fn new(severity: ProblemSeverity, description: impl Into<String>) -> Self {
        Self {
            severity,
            description: description.into(),
        }
    }
}

/// Reference to the asset index a version uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetIndexRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_size: Option<u64>,
}

impl AssetIndexRef {
    pub const LEGACY_ID: &'static str = "legacy";

    /// Marker used by profiles that never received an asset index.
    pub fn legacy() -> Self {
        Self {
            id: Self::LEGACY_ID.to_string(),
            url: None,
            sha1: None,
            total_size: None,
        }
    }
}

/// Dependency of one patch on another, optionally pinned to a version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Require {
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equals: Option<String>,
}

/// Where a patch came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOrigin {
    /// Derived from remote metadata.
    #[default]
    BuiltIn,
    /// Authored or installed into the instance by the user.
    Custom,
}

/// Provenance and edit permissions. Not part of the document itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchMeta {
    pub origin: PatchOrigin,
    pub filename: Option<PathBuf>,
    pub movable: bool,
    pub removable: bool,
    pub revertible: bool,
    pub customizable: bool,
}

impl PatchMeta {
    pub fn for_origin(origin: PatchOrigin) -> Self {
        let custom = origin == PatchOrigin::Custom;
        Self {
            origin,
            filename: None,
            movable: custom,
            removable: custom,
            revertible: false,
            customizable: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionPatch {
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_time: Option<DateTime<Utc>>,
    /// Entity the patch was installed from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,

    #[serde(default, alias = "mcVersion", skip_serializing_if = "Option::is_none")]
    pub minecraft_version: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub version_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_index: Option<AssetIndexRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applet_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minecraft_arguments: Option<String>,
    #[serde(default, rename = "+tweakers", skip_serializing_if = "Vec::is_empty")]
    pub tweakers: Vec<String>,
    #[serde(default, rename = "+traits", skip_serializing_if = "BTreeSet::is_empty")]
    pub traits: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub libraries: Vec<Library>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_jar: Option<Library>,
    #[serde(default, rename = "+jarMods", skip_serializing_if = "Vec::is_empty")]
    pub jar_mods: Vec<Library>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mods: Vec<Library>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<Require>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub problems: Vec<PatchProblem>,

    #[serde(skip)]
    pub meta: PatchMeta,
}

impl VersionPatch {
    /// A blank patch with the given identity.
    pub fn new(uid: impl Into<String>, origin: PatchOrigin) -> Self {
        Self {
            uid: uid.into(),
            meta: PatchMeta::for_origin(origin),
            ..Self::default()
        }
    }

    /// Parse a patch document.
    ///
    /// Malformed JSON, duplicate keys (e.g. two `mainJar` entries) and a
    /// missing `uid` are all reported as [`CoreError::Parse`].
    pub fn from_json(raw: &str, origin: PatchOrigin, filename: Option<&Path>) -> CoreResult<Self> {
        let label = filename
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<inline>".to_string());

        let mut patch: VersionPatch =
            serde_json::from_str(raw).map_err(|e| CoreError::parse(&label, e.to_string()))?;

        if patch.uid.trim().is_empty() {
            return Err(CoreError::parse(label, "missing uid"));
        }

        patch.meta = PatchMeta::for_origin(origin);
        patch.meta.filename = filename.map(Path::to_path_buf);
        Ok(patch)
    }

    pub fn to_json_pretty(&self) -> CoreResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Display name, falling back to the uid.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.uid)
    }

    /// Worst severity among the declared problems.
    pub fn problem_severity(&self) -> ProblemSeverity {
        self.problems
            .iter()
            .map(|p| p.severity)
            .max()
            .unwrap_or_default()
    }

    pub fn is_custom(&self) -> bool {
        self.meta.origin == PatchOrigin::Custom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_declared_fields_only() {
        let raw = r#"{
            "uid": "net.minecraftforge",
            "name": "Forge",
            "version": "14.23.5.2859",
            "order": 5,
            "releaseTime": "2019-06-24T01:23:45+00:00",
            "mainClass": "net.minecraft.launchwrapper.Launch",
            "+tweakers": ["net.minecraftforge.fml.common.launcher.FMLTweaker"],
            "+traits": ["legacyLaunch"],
            "libraries": [{"name": "net.minecraft:launchwrapper:1.12"}],
            "requires": [{"uid": "net.minecraft", "equals": "1.12.2"}]
        }"#;

        let patch = VersionPatch::from_json(raw, PatchOrigin::BuiltIn, None).unwrap();

        assert_eq!(patch.display_name(), "Forge");
        assert_eq!(patch.order, Some(5));
        assert!(patch.release_time.is_some());
        assert_eq!(patch.applet_class, None);
        assert_eq!(patch.tweakers.len(), 1);
        assert!(patch.traits.contains("legacyLaunch"));
        assert_eq!(patch.requires[0].equals.as_deref(), Some("1.12.2"));
        assert!(!patch.meta.removable);
    }

    #[test]
    fn accepts_short_mc_version_key() {
        let patch = VersionPatch::from_json(
            r#"{"uid": "x", "mcVersion": "1.7.10"}"#,
            PatchOrigin::Custom,
            None,
        )
        .unwrap();
        assert_eq!(patch.minecraft_version.as_deref(), Some("1.7.10"));
        assert!(patch.meta.removable);
        assert!(patch.meta.movable);
    }

    #[test]
    fn duplicate_main_jar_is_a_parse_error() {
        let raw = r#"{
            "uid": "net.minecraft",
            "mainJar": {"name": "com.mojang:minecraft:1.12.2:client"},
            "mainJar": {"name": "com.mojang:minecraft:1.12.1:client"}
        }"#;
        let err = VersionPatch::from_json(raw, PatchOrigin::BuiltIn, Some(Path::new("mc.json")))
            .unwrap_err();
        match err {
            CoreError::Parse { patch, reason } => {
                assert_eq!(patch, "mc.json");
                assert!(reason.contains("duplicate field"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_uid_is_rejected() {
        assert!(matches!(
            VersionPatch::from_json(r#"{"uid": "  "}"#, PatchOrigin::Custom, None),
            Err(CoreError::Parse { .. })
        ));
    }

    #[test]
    fn severity_is_the_worst_problem() {
        let mut patch = VersionPatch::new("a", PatchOrigin::Custom);
        assert_eq!(patch.problem_severity(), ProblemSeverity::None);
        patch.problems = vec![
            PatchProblem::new(ProblemSeverity::Error, "broken"),
            PatchProblem::new(ProblemSeverity::Warning, "odd"),
        ];
        assert_eq!(patch.problem_severity(), ProblemSeverity::Error);
    }
}
