// ─── Scripted Provider ───
// A provider whose data comes from a script backend running on its own task.
// The provider only exchanges `ScriptRequest` messages with it.

use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{debug, info, warn};

use super::{EntityProvider, VersionFetcher};
use crate::core::entity::{
    default_comparator, Entity, EntityKind, EntityVersion, ScriptedVersion, VersionComparator,
    VersionOrigin,
};
use crate::core::error::{CoreError, CoreResult};
use crate::core::instance::Instance;
use crate::core::maven::compare_versions;

/// Entity as described by a script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptEntity {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub icon_url: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: EntityKind,
}

impl ScriptEntity {
    fn into_entity(self, provider: &str) -> Entity {
        let mut entity = Entity::new(provider, self.id, self.name, self.kind);
        entity.icon_url = self.icon_url;
        entity
    }
}

/// How a script's version lists are ordered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptSort {
    #[default]
    NameDescending,
    NameAscending,
    /// Lenient version order of the name, newest first.
    VersionDescending,
}

/// Static description of a scripted provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptManifest {
    pub id: String,
    #[serde(default)]
    pub static_entities: Vec<ScriptEntity>,
    /// Whether the backend answers `DynamicEntities`.
    #[serde(default)]
    pub dynamic_entities: bool,
    #[serde(default)]
    pub sort: ScriptSort,
}

/// One change a script's installer makes to the instance's patches.
#[derive(Debug, Clone, PartialEq)]
pub enum PatchOp {
    /// Write the object as the entity's patch document.
    Write(Map<String, Value>),
    RemoveIfExists,
}

#[derive(Debug)]
pub enum ScriptRequest {
    DynamicEntities {
        reply: oneshot::Sender<CoreResult<Vec<ScriptEntity>>>,
    },
    LoadVersions {
        entity: String,
        reply: oneshot::Sender<CoreResult<Vec<Value>>>,
    },
    Install {
        entity: String,
        version: Map<String, Value>,
        /// The entity's current patch document, if one is installed.
        existing_patch: Option<Value>,
        reply: oneshot::Sender<CoreResult<Vec<PatchOp>>>,
    },
}

/// The script side of the boundary.
#[async_trait]
pub trait ScriptBackend: Send + 'static {
    async fn dynamic_entities(&mut self) -> CoreResult<Vec<ScriptEntity>>;

    /// Raw version objects; each needs `descriptor`, `name` and `type`.
    async fn load_versions(&mut self, entity: &str) -> CoreResult<Vec<Value>>;

    async fn install(
        &mut self,
        entity: &str,
        version: &Map<String, Value>,
        existing_patch: Option<&Value>,
    ) -> CoreResult<Vec<PatchOp>>;
}

/// Answer requests until every sender is gone.
pub async fn serve<B: ScriptBackend>(mut backend: B, mut requests: mpsc::Receiver<ScriptRequest>) {
    while let Some(request) = requests.recv().await {
        let delivered = match request {
            ScriptRequest::DynamicEntities { reply } => {
                reply.send(backend.dynamic_entities().await).is_ok()
            }
            ScriptRequest::LoadVersions { entity, reply } => {
                reply.send(backend.load_versions(&entity).await).is_ok()
            }
            ScriptRequest::Install {
                entity,
                version,
                existing_patch,
                reply,
            } => reply
                .send(backend.install(&entity, &version, existing_patch.as_ref()).await)
                .is_ok(),
        };
        if !delivered {
            debug!("Script request abandoned by caller");
        }
    }
    debug!("Script backend stopped");
}

async fn call<T>(
    requests: &mpsc::Sender<ScriptRequest>,
    provider: &str,
    build: impl FnOnce(oneshot::Sender<CoreResult<T>>) -> ScriptRequest,
) -> CoreResult<T> {
    let (tx, rx) = oneshot::channel();
    requests
        .send(build(tx))
        .await
        .map_err(|_| CoreError::ChannelClosed(provider.to_string()))?;
    rx.await
        .map_err(|_| CoreError::ChannelClosed(provider.to_string()))?
}

fn required_str(table: &Map<String, Value>, key: &str) -> Option<String> {
    table.get(key).and_then(Value::as_str).map(str::to_string)
}

fn parse_version(origin: &VersionOrigin, raw: Value) -> CoreResult<ScriptedVersion> {
    let fail = |reason: String| CoreError::ProviderFetch {
        provider: origin.provider.clone(),
        entity: origin.entity.clone(),
        reason,
    };
    let Value::Object(table) = raw else {
        return Err(fail("version entry is not an object".into()));
    };
    let field = |key: &str| {
        required_str(&table, key).ok_or_else(|| fail(format!("version entry lacks a string '{key}'")))
    };

    Ok(ScriptedVersion {
        origin: origin.clone(),
        descriptor: field("descriptor")?,
        name: field("name")?,
        type_string: field("type")?,
        data: table,
    })
}

struct ScriptedFetcher {
    provider: String,
    requests: mpsc::Sender<ScriptRequest>,
}

#[async_trait]
impl VersionFetcher for ScriptedFetcher {
    async fn fetch(&self, entity: &Entity) -> CoreResult<Vec<EntityVersion>> {
        let origin = VersionOrigin {
            provider: self.provider.clone(),
            entity: entity.internal_id.clone(),
        };
        let raw = call(&self.requests, &self.provider, |reply| ScriptRequest::LoadVersions {
            entity: entity.internal_id.clone(),
            reply,
        })
        .await?;

        raw.into_iter()
            .map(|v| parse_version(&origin, v).map(EntityVersion::Scripted))
            .collect()
    }
}

pub struct ScriptedProvider {
    id: String,
    statics: Vec<Entity>,
    dynamic: bool,
    /// Entities from the last successful refresh.
    refreshed: RwLock<Vec<Entity>>,
    sort: ScriptSort,
    requests: mpsc::Sender<ScriptRequest>,
}

impl ScriptedProvider {
    /// Wrap an already running backend.
    pub fn new(manifest: ScriptManifest, requests: mpsc::Sender<ScriptRequest>) -> CoreResult<Self> {
        if manifest.static_entities.is_empty() && !manifest.dynamic_entities {
            return Err(CoreError::Other(format!(
                "Provider {} does not provide any entities; it needs static or dynamic entities",
                manifest.id
            )));
        }
        let statics = manifest
            .static_entities
            .into_iter()
            .map(|e| e.into_entity(&manifest.id))
            .collect();
        Ok(Self {
            id: manifest.id,
            statics,
            dynamic: manifest.dynamic_entities,
            refreshed: RwLock::new(Vec::new()),
            sort: manifest.sort,
            requests,
        })
    }

    /// Start `backend` on its own task and connect a provider to it.
    pub fn spawn<B: ScriptBackend>(manifest: ScriptManifest, backend: B) -> CoreResult<Self> {
        let (tx, rx) = mpsc::channel(32);
        let provider = Self::new(manifest, tx)?;
        tokio::spawn(serve(backend, rx));
        info!("Started script backend for provider {}", provider.id);
        Ok(provider)
    }

    async fn apply_patch_op(
        &self,
        instance: &Instance,
        entity: &Entity,
        version: &ScriptedVersion,
        op: PatchOp,
    ) -> CoreResult<()> {
        match op {
            PatchOp::Write(mut document) => {
                document.insert("name".into(), Value::String(entity.name.clone()));
                document.insert("fileId".into(), Value::String(entity.internal_id.clone()));
                document.insert("version".into(), Value::String(version.name.clone()));
                if !document.contains_key("mcVersion") {
                    if let Some(mc) = version.data.get("mcVersion") {
                        document.insert("mcVersion".into(), mc.clone());
                    }
                }
                document
                    .entry("uid")
                    .or_insert_with(|| Value::String(entity.internal_id.clone()));

                let path = instance
                    .write_patch(&entity.internal_id, &Value::Object(document))
                    .await?;
                info!("Wrote patch {}", path.display());
            }
            PatchOp::RemoveIfExists => {
                if instance.remove_patch_if_exists(&entity.internal_id).await? {
                    info!("Removed patch for {}", entity.internal_id);
                }
            }
        }
        Ok(())
    }

    async fn read_existing_patch(&self, path: &Path) -> Option<Value> {
        let raw = tokio::fs::read_to_string(path).await.ok()?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring unreadable patch {}: {}", path.display(), e);
                None
            }
        }
    }
}

#[async_trait]
impl EntityProvider for ScriptedProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn static_entities(&self) -> Vec<Entity> {
        self.statics.clone()
    }

    async fn refresh_entities(&self) -> CoreResult<Vec<Entity>> {
        if !self.dynamic {
            return Ok(Vec::new());
        }
        let entities = call(&self.requests, &self.id, |reply| {
            ScriptRequest::DynamicEntities { reply }
        })
        .await?;
        let entities: Vec<Entity> = entities
            .into_iter()
            .map(|e| e.into_entity(&self.id))
            .collect();
        *self.refreshed.write().await = entities.clone();
        Ok(entities)
    }

    fn version_fetcher(&self, _entity: &Entity) -> Arc<dyn VersionFetcher> {
        Arc::new(ScriptedFetcher {
            provider: self.id.clone(),
            requests: self.requests.clone(),
        })
    }

    fn comparator(&self, _entity: &Entity) -> VersionComparator {
        match self.sort {
            ScriptSort::NameDescending => default_comparator(),
            ScriptSort::NameAscending => {
                Arc::new(|a: &EntityVersion, b: &EntityVersion| a.name().cmp(b.name()))
            }
            ScriptSort::VersionDescending => Arc::new(|a: &EntityVersion, b: &EntityVersion| {
                match compare_versions(b.name(), a.name()) {
                    Ordering::Equal => b.name().cmp(a.name()),
                    other => other,
                }
            }),
        }
    }

    async fn install(&self, instance: &Instance, version: &EntityVersion) -> CoreResult<()> {
        let EntityVersion::Scripted(version) = version else {
            return Err(CoreError::NoSuchVersion {
                entity: version.origin().entity.clone(),
                version: version.descriptor().to_string(),
            });
        };
        let entity_id = &version.origin.entity;
        let known = self
            .refreshed
            .read()
            .await
            .iter()
            .find(|e| &e.internal_id == entity_id)
            .cloned();
        let entity = known
            .or_else(|| self.statics.iter().find(|e| &e.internal_id == entity_id).cloned())
            .unwrap_or_else(|| Entity::new(&self.id, entity_id, entity_id, EntityKind::Other));

        let patch_path = instance.patch_path(entity_id)?;
        let existing_patch = self.read_existing_patch(&patch_path).await;
        let ops = call(&self.requests, &self.id, |reply| ScriptRequest::Install {
            entity: entity_id.clone(),
            version: version.data.clone(),
            existing_patch,
            reply,
        })
        .await?;

        for op in ops {
            self.apply_patch_op(instance, &entity, version, op).await?;
        }
        Ok(())
    }
}
