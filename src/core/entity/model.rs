// ─── Entity Model ───

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Mod,
    Modpack,
    #[serde(alias = "texture_pack")]
    TexturePack,
    World,
    Patch,
    #[default]
    #[serde(other)]
    Other,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Mod => write!(f, "Mod"),
            EntityKind::Modpack => write!(f, "Modpack"),
            EntityKind::TexturePack => write!(f, "Texture Pack"),
            EntityKind::World => write!(f, "World"),
            EntityKind::Patch => write!(f, "Patch"),
            EntityKind::Other => write!(f, "Other"),
        }
    }
}

/// An installable unit exposed by a provider.
///
/// Equality and hashing use only the owning provider and the internal id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub provider: String,
    pub internal_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: EntityKind,
    /// Provider-specific attributes the core does not interpret.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl Entity {
    pub fn new(
        provider: impl Into<String>,
        internal_id: impl Into<String>,
        name: impl Into<String>,
        kind: EntityKind,
    ) -> Self {
        Self {
            provider: provider.into(),
            internal_id: internal_id.into(),
            name: name.into(),
            icon_url: None,
            kind,
            extra: Map::new(),
        }
    }

    pub fn with_icon(mut self, url: impl Into<String>) -> Self {
        self.icon_url = Some(url.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.provider == other.provider && self.internal_id == other.internal_id
    }
}

impl Eq for Entity {}

impl Hash for Entity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.provider.hash(state);
        self.internal_id.hash(state);
    }
}
