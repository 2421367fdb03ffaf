// ─── Entity Versions ───
// One closed enum over every provider kind; no downcasting.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::maven::LenientVersion;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Scripted,
    Solder,
}

/// The provider and entity a version was produced for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionOrigin {
    pub provider: String,
    pub entity: String,
}

/// A version described by a scripted backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedVersion {
    pub origin: VersionOrigin,
    pub descriptor: String,
    pub name: String,
    #[serde(default, rename = "type")]
    pub type_string: String,
    /// Remaining backend fields, handed back to the backend on install.
    #[serde(default)]
    pub data: Map<String, Value>,
}

/// One build of a Technic Solder modpack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolderVersion {
    pub origin: VersionOrigin,
    pub id: String,
    pub base_url: String,
    pub pack_name: String,
    pub is_recommended: bool,
    pub is_latest: bool,
}

impl SolderVersion {
    pub fn new(origin: VersionOrigin, id: impl Into<String>, base_url: &str) -> Self {
        let pack_name = origin.entity.clone();
        Self {
            origin,
            id: id.into(),
            base_url: base_url.to_string(),
            pack_name,
            is_recommended: false,
            is_latest: false,
        }
    }

    /// Version used for ordering builds; a leading `v` is ignored.
    pub fn version(&self) -> LenientVersion {
        LenientVersion::parse(&self.id)
    }

    pub fn url(&self) -> String {
        format!("{}{}/{}", self.base_url, self.pack_name, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EntityVersion {
    Scripted(ScriptedVersion),
    Solder(SolderVersion),
}

impl EntityVersion {
    pub fn kind(&self) -> ProviderKind {
        match self {
            EntityVersion::Scripted(_) => ProviderKind::Scripted,
            EntityVersion::Solder(_) => ProviderKind::Solder,
        }
    }

    pub fn origin(&self) -> &VersionOrigin {
        match self {
            EntityVersion::Scripted(v) => &v.origin,
            EntityVersion::Solder(v) => &v.origin,
        }
    }

    /// Stable identifier within the owning version list.
    pub fn descriptor(&self) -> &str {
        match self {
            EntityVersion::Scripted(v) => &v.descriptor,
            EntityVersion::Solder(v) => &v.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            EntityVersion::Scripted(v) => &v.name,
            EntityVersion::Solder(v) => &v.id,
        }
    }

    /// Free-form label such as "Recommended" or "Latest".
    pub fn type_string(&self) -> &str {
        match self {
            EntityVersion::Scripted(v) => &v.type_string,
            EntityVersion::Solder(v) if v.is_latest => "Latest",
            EntityVersion::Solder(v) if v.is_recommended => "Recommended",
            EntityVersion::Solder(_) => "",
        }
    }

    /// Natural ordering, used when a provider supplies no comparator.
    ///
    /// Solder builds order by lenient version. Everything else by name.
    pub fn compare(&self, other: &EntityVersion) -> Ordering {
        match (self, other) {
            (EntityVersion::Solder(a), EntityVersion::Solder(b)) => a.version().cmp(&b.version()),
            _ => self.name().cmp(other.name()),
        }
    }
}

pub type VersionComparator = Arc<dyn Fn(&EntityVersion, &EntityVersion) -> Ordering + Send + Sync>;

/// Newest first: the natural ordering, descending.
pub fn default_comparator() -> VersionComparator {
    Arc::new(|a: &EntityVersion, b: &EntityVersion| b.compare(a))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin(entity: &str) -> VersionOrigin {
        VersionOrigin {
            provider: "test".into(),
            entity: entity.into(),
        }
    }

    fn scripted(name: &str) -> EntityVersion {
        EntityVersion::Scripted(ScriptedVersion {
            origin: origin("jei"),
            descriptor: format!("jei-{name}"),
            name: name.into(),
            type_string: String::new(),
            data: Map::new(),
        })
    }

    fn build(id: &str) -> EntityVersion {
        EntityVersion::Solder(SolderVersion::new(
            origin("tekkitmain"),
            id,
            "http://solder.technicpack.net/api/modpack/",
        ))
    }

    #[test]
    fn default_order_is_name_descending() {
        let mut versions = vec![scripted("a"), scripted("c"), scripted("b")];
        let cmp = default_comparator();
        versions.sort_by(|a, b| cmp(a, b));
        let names: Vec<_> = versions.iter().map(EntityVersion::name).collect();
        assert_eq!(names, ["c", "b", "a"]);
    }

    #[test]
    fn solder_builds_order_numerically() {
        let mut versions = vec![build("1.2.9e"), build("v1.2.10"), build("1.0.2")];
        let cmp = default_comparator();
        versions.sort_by(|a, b| cmp(a, b));
        let ids: Vec<_> = versions.iter().map(EntityVersion::descriptor).collect();
        assert_eq!(ids, ["v1.2.10", "1.2.9e", "1.0.2"]);
    }

    #[test]
    fn latest_label_wins_over_recommended() {
        let mut v = SolderVersion::new(origin("tekkitmain"), "1.2.10c", "http://repo/");
        v.is_recommended = true;
        v.is_latest = true;
        assert_eq!(v.url(), "http://repo/tekkitmain/1.2.10c");
        let v = EntityVersion::Solder(v);
        assert_eq!(v.type_string(), "Latest");
        assert_eq!(v.kind(), ProviderKind::Solder);
        assert_eq!(build("1.0").type_string(), "");
    }
}
