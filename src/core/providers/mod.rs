// ─── Entity Providers ───
// The narrow interface the registry sees a provider through.

pub mod scripted;
pub mod solder;

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::entity::{default_comparator, Entity, EntityVersion, VersionComparator};
use crate::core::error::CoreResult;
use crate::core::instance::Instance;

pub use scripted::{ScriptBackend, ScriptRequest, ScriptedProvider};
pub use solder::{SolderPack, SolderProvider};

/// Fetches the versions of one entity. Runs off the owner task.
#[async_trait]
pub trait VersionFetcher: Send + Sync {
    async fn fetch(&self, entity: &Entity) -> CoreResult<Vec<EntityVersion>>;
}

#[async_trait]
pub trait EntityProvider: Send + Sync {
    /// Unique among registered providers.
    fn id(&self) -> &str;

    /// Entities fixed at construction.
    fn static_entities(&self) -> Vec<Entity> {
        Vec::new()
    }

    /// Produce a fresh dynamic entity set. The registry replaces the previous one.
    async fn refresh_entities(&self) -> CoreResult<Vec<Entity>>;

    fn version_fetcher(&self, entity: &Entity) -> Arc<dyn VersionFetcher>;

    fn comparator(&self, _entity: &Entity) -> VersionComparator {
        default_comparator()
    }

    async fn install(&self, instance: &Instance, version: &EntityVersion) -> CoreResult<()>;
}
