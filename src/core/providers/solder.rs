// ─── Technic Solder Provider ───
// Modpacks served by a Solder API. Each configured pack is one entity and
// each of its builds is a version.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{EntityProvider, VersionFetcher};
use crate::core::entity::{Entity, EntityKind, EntityVersion, SolderVersion, VersionOrigin};
use crate::core::error::{CoreError, CoreResult};
use crate::core::instance::Instance;

pub const DEFAULT_SOLDER_REPOSITORY: &str = "http://solder.technicpack.net/api/modpack/";

/// Packs the public API serves that are not installable modpacks.
const IGNORED_PACKS: &[&str] = &["vanilla"];

/// Pack description as returned by `GET <repo><pack>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolderPack {
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    pub recommended: String,
    pub latest: String,
    pub builds: Vec<String>,
}

impl SolderPack {
    pub fn to_entity(&self, provider: &str) -> Entity {
        let mut entity = Entity::new(provider, &self.name, &self.display_name, EntityKind::Modpack)
            .with_extra("recommended", Value::String(self.recommended.clone()))
            .with_extra("latest", Value::String(self.latest.clone()));
        if let Some(url) = &self.url {
            entity = entity.with_extra("url", Value::String(url.clone()));
        }
        if let Some(icon) = self.icon.as_deref().filter(|i| !i.is_empty()) {
            entity = entity.with_icon(icon);
        }
        entity
    }

    /// Builds newest first, flagged as latest / recommended.
    pub fn versions(&self, provider: &str, repo: &str) -> Vec<SolderVersion> {
        let origin = VersionOrigin {
            provider: provider.to_string(),
            entity: self.name.clone(),
        };
        let mut builds: Vec<SolderVersion> = self
            .builds
            .iter()
            .map(|build| {
                let mut v = SolderVersion::new(origin.clone(), build, repo);
                v.is_latest = *build == self.latest;
                v.is_recommended = *build == self.recommended;
                v
            })
            .collect();
        builds.sort_by(|a, b| b.version().cmp(&a.version()));
        builds
    }
}

async fn fetch_pack(client: &Client, repo: &str, pack: &str) -> CoreResult<SolderPack> {
    let url = format!("{repo}{pack}");
    debug!("Fetching Solder pack {}", url);

    let response = client.get(&url).send().await?;
    if !response.status().is_success() {
        return Err(CoreError::RequestFailed {
            url,
            status: response.status().as_u16(),
        });
    }
    Ok(response.json::<SolderPack>().await?)
}

type PackCache = Arc<RwLock<HashMap<String, SolderPack>>>;

struct SolderFetcher {
    provider: String,
    repo: String,
    client: Client,
    cache: PackCache,
}

#[async_trait]
impl VersionFetcher for SolderFetcher {
    async fn fetch(&self, entity: &Entity) -> CoreResult<Vec<EntityVersion>> {
        let cached = self.cache.read().await.get(&entity.internal_id).cloned();
        let pack = match cached {
            Some(pack) => pack,
            None => {
                let pack = fetch_pack(&self.client, &self.repo, &entity.internal_id)
                    .await
                    .map_err(|e| CoreError::ProviderFetch {
                        provider: self.provider.clone(),
                        entity: entity.internal_id.clone(),
                        reason: e.to_string(),
                    })?;
                self.cache
                    .write()
                    .await
                    .insert(pack.name.clone(), pack.clone());
                pack
            }
        };

        Ok(pack
            .versions(&self.provider, &self.repo)
            .into_iter()
            .map(EntityVersion::Solder)
            .collect())
    }
}

pub struct SolderProvider {
    id: String,
    repo: String,
    packs: Vec<String>,
    client: Client,
    cache: PackCache,
}

impl SolderProvider {
    pub fn new(id: impl Into<String>, repo: impl Into<String>, packs: Vec<String>, client: Client) -> Self {
        let mut repo = repo.into();
        if !repo.ends_with('/') {
            repo.push('/');
        }
        Self {
            id: id.into(),
            repo,
            packs,
            client,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn repository(&self) -> &str {
        &self.repo
    }

    /// Seed the pack cache, bypassing the network.
    pub async fn insert_pack(&self, pack: SolderPack) {
        self.cache.write().await.insert(pack.name.clone(), pack);
    }
}

#[async_trait]
impl EntityProvider for SolderProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn refresh_entities(&self) -> CoreResult<Vec<Entity>> {
        let wanted: Vec<String> = self
            .packs
            .iter()
            .filter(|p| !IGNORED_PACKS.contains(&p.as_str()))
            .cloned()
            .collect();

        let results = stream::iter(wanted)
            .map(|name| {
                let client = self.client.clone();
                let repo = self.repo.clone();
                async move {
                    let result = fetch_pack(&client, &repo, &name).await;
                    (name, result)
                }
            })
            .buffered(8)
            .collect::<Vec<_>>()
            .await;

        let mut entities = Vec::new();
        let mut failures = 0usize;
        let mut cache = self.cache.write().await;
        for (name, result) in results {
            match result {
                Ok(pack) if IGNORED_PACKS.contains(&pack.name.as_str()) => {
                    warn!("Solder pack {} ignored", name);
                }
                Ok(pack) => {
                    entities.push(pack.to_entity(&self.id));
                    cache.insert(pack.name.clone(), pack);
                }
                Err(e) => {
                    warn!("Solder pack {} could not be loaded: {}", name, e);
                    failures += 1;
                }
            }
        }

        if entities.is_empty() && failures > 0 {
            return Err(CoreError::ProviderFetch {
                provider: self.id.clone(),
                entity: "*".into(),
                reason: format!("all {failures} packs failed to load"),
            });
        }
        info!("Solder provider {} loaded {} packs", self.id, entities.len());
        Ok(entities)
    }

    fn version_fetcher(&self, _entity: &Entity) -> Arc<dyn VersionFetcher> {
        Arc::new(SolderFetcher {
            provider: self.id.clone(),
            repo: self.repo.clone(),
            client: self.client.clone(),
            cache: self.cache.clone(),
        })
    }

    async fn install(&self, instance: &Instance, version: &EntityVersion) -> CoreResult<()> {
        let EntityVersion::Solder(build) = version else {
            return Err(CoreError::NoSuchVersion {
                entity: version.origin().entity.clone(),
                version: version.descriptor().to_string(),
            });
        };
        let display = self
            .cache
            .read()
            .await
            .get(&build.pack_name)
            .map(|p| p.display_name.clone())
            .unwrap_or_else(|| build.pack_name.clone());

        let document = json!({
            "uid": build.pack_name,
            "name": display,
            "version": build.id,
            "fileId": build.pack_name,
            "solderUrl": build.url(),
        });
        let path = instance.write_patch(&build.pack_name, &document).await?;
        info!("Recorded Solder build {} at {}", build.id, path.display());
        Ok(())
    }
}
