// ─── Entity Registry ───
// Owns every provider's entity set and version-list cache, and keeps the
// flat and tree projections in step with them. All mutation happens on the
// owning task; spawned fetches report back through a completion channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::flat::FlatEntityList;
use super::model::Entity;
use super::tree::{EntityTree, NodeData, NodeHandle};
use super::version::EntityVersion;
use super::version_list::{LoadCompletion, LoadStatus, LoadWaiter, VersionDelta, VersionList};
use crate::core::error::{CoreError, CoreResult};
use crate::core::events::ListChange;
use crate::core::instance::Instance;
use crate::core::providers::EntityProvider;

struct ProviderSlot {
    provider: Arc<dyn EntityProvider>,
    statics: Vec<Entity>,
    dynamic: Vec<Entity>,
    /// One list per entity, created on first use.
    lists: HashMap<String, VersionList>,
    node: NodeHandle,
}

impl ProviderSlot {
    fn id(&self) -> &str {
        self.provider.id()
    }

    /// Dynamic entities followed by static ones.
    fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.dynamic.iter().chain(self.statics.iter())
    }

    fn entity_count(&self) -> usize {
        self.dynamic.len() + self.statics.len()
    }

    fn find_entity(&self, internal_id: &str) -> Option<&Entity> {
        self.entities().find(|e| e.internal_id == internal_id)
    }
}

fn entity_data(entity: &Entity) -> NodeData {
    NodeData::Entity {
        provider: entity.provider.clone(),
        internal_id: entity.internal_id.clone(),
    }
}

fn version_data(version: &EntityVersion) -> NodeData {
    NodeData::Version {
        descriptor: version.descriptor().to_string(),
    }
}

pub struct EntityRegistry {
    slots: Vec<ProviderSlot>,
    flat: FlatEntityList,
    tree: EntityTree,
    completions_tx: mpsc::UnboundedSender<LoadCompletion>,
    completions_rx: mpsc::UnboundedReceiver<LoadCompletion>,
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityRegistry {
    pub fn new() -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            slots: Vec::new(),
            flat: FlatEntityList::new(),
            tree: EntityTree::new(),
            completions_tx,
            completions_rx,
        }
    }

    // ── Providers ───────────────────────────────────────

    pub fn register_provider(&mut self, provider: Arc<dyn EntityProvider>) -> CoreResult<()> {
        let id = provider.id().to_string();
        if self.slot_index(&id).is_some() {
            return Err(CoreError::DuplicateProvider(id));
        }

        let statics = provider.static_entities();
        for entity in &statics {
            if let Some(owner) = self.owner_index(&entity.internal_id) {
                warn!(
                    "Entity id {} from {} is already provided by {}; lookups keep resolving to {}",
                    entity.internal_id,
                    id,
                    self.slots[owner].id(),
                    self.slots[owner].id(),
                );
            }
        }

        let root = self.tree.root();
        let position = self.slots.len();
        let node = self
            .tree
            .insert_children(root, position, vec![NodeData::Provider { id: id.clone() }])
            .first()
            .copied()
            .ok_or_else(|| CoreError::Other("entity tree rejected provider node".into()))?;
        self.tree
            .insert_children(node, 0, statics.iter().map(entity_data).collect());
        self.flat.insert(self.flat.len(), statics.clone());

        info!("Registered entity provider {} ({} static entities)", id, statics.len());
        self.slots.push(ProviderSlot {
            provider,
            statics,
            dynamic: Vec::new(),
            lists: HashMap::new(),
            node,
        });
        Ok(())
    }

    /// Remove a provider, taking its entities out of both projections first.
    pub fn unregister_provider(&mut self, id: &str) -> CoreResult<Arc<dyn EntityProvider>> {
        let index = self
            .slot_index(id)
            .ok_or_else(|| CoreError::NoSuchProvider(id.to_string()))?;

        let offset = self.flat_offset(index);
        self.flat.remove(offset, self.slots[index].entity_count());
        self.tree.remove_children(self.tree.root(), index, 1);

        let slot = self.slots.remove(index);
        info!("Unregistered entity provider {}", id);
        Ok(slot.provider)
    }

    pub fn provider(&self, id: &str) -> Option<&Arc<dyn EntityProvider>> {
        self.slots.iter().find(|s| s.id() == id).map(|s| &s.provider)
    }

    pub fn providers(&self) -> impl Iterator<Item = &Arc<dyn EntityProvider>> {
        self.slots.iter().map(|s| &s.provider)
    }

    fn slot_index(&self, id: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.id() == id)
    }

    /// First provider whose current entity set contains `internal_id`.
    fn owner_index(&self, internal_id: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.find_entity(internal_id).is_some())
    }

    fn flat_offset(&self, index: usize) -> usize {
        self.slots[..index].iter().map(ProviderSlot::entity_count).sum()
    }

    // ── Entities ────────────────────────────────────────

    /// Every provider's entities, in registration order.
    pub fn entities(&self) -> Vec<Entity> {
        self.slots
            .iter()
            .flat_map(|s| s.entities().cloned())
            .collect()
    }

    pub fn entity(&self, internal_id: &str) -> Option<&Entity> {
        self.slots.iter().find_map(|s| s.find_entity(internal_id))
    }

    /// Replace a provider's dynamic entities.
    ///
    /// The provider's version lists are discarded; completions still in
    /// flight for them are dropped on arrival.
    pub fn replace_entities(&mut self, provider_id: &str, entities: Vec<Entity>) -> CoreResult<()> {
        let index = self
            .slot_index(provider_id)
            .ok_or_else(|| CoreError::NoSuchProvider(provider_id.to_string()))?;
        let offset = self.flat_offset(index);

        let slot = &mut self.slots[index];
        self.flat.remove(offset, slot.entity_count());
        slot.dynamic = entities;
        slot.lists.clear();
        let rows: Vec<Entity> = slot.entities().cloned().collect();
        let nodes = rows.iter().map(entity_data).collect();
        let node = slot.node;

        debug!("Provider {} now has {} entities", provider_id, rows.len());
        self.flat.insert(offset, rows);
        self.tree.reset_children(node, nodes);
        Ok(())
    }

    pub fn flat(&self) -> &FlatEntityList {
        &self.flat
    }

    pub fn flat_mut(&mut self) -> &mut FlatEntityList {
        &mut self.flat
    }

    pub fn tree(&self) -> &EntityTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut EntityTree {
        &mut self.tree
    }

    /// Tree node of an entity, if it is currently provided.
    pub fn entity_node(&self, internal_id: &str) -> Option<NodeHandle> {
        let index = self.owner_index(internal_id)?;
        self.entity_node_in(index, internal_id)
    }

    fn entity_node_in(&self, index: usize, internal_id: &str) -> Option<NodeHandle> {
        self.tree
            .find_child(self.slots[index].node, |d| {
                matches!(d, NodeData::Entity { internal_id: id, .. } if id == internal_id)
            })
            .map(|(_, h)| h)
    }

    // ── Version lists ───────────────────────────────────

    /// The cached version list of an entity, created on first access.
    pub fn version_list(&mut self, internal_id: &str) -> CoreResult<&mut VersionList> {
        let index = self
            .owner_index(internal_id)
            .ok_or_else(|| CoreError::NoSuchEntity(internal_id.to_string()))?;
        let slot = &mut self.slots[index];

        if !slot.lists.contains_key(internal_id) {
            let entity = slot
                .find_entity(internal_id)
                .cloned()
                .ok_or_else(|| CoreError::NoSuchEntity(internal_id.to_string()))?;
            let list = VersionList::new(
                entity.clone(),
                slot.provider.version_fetcher(&entity),
                slot.provider.comparator(&entity),
            );
            slot.lists.insert(internal_id.to_string(), list);
        }

        slot.lists
            .get_mut(internal_id)
            .ok_or_else(|| CoreError::NoSuchEntity(internal_id.to_string()))
    }

    /// Start (or join) the load of an entity's version list.
    pub fn request_load(&mut self, internal_id: &str) -> CoreResult<LoadWaiter> {
        let tx = self.completions_tx.clone();
        let list = self.version_list(internal_id)?;
        let before = list.status();
        let waiter = list.request_load(&tx);
        let after = list.status();
        let provider = list.entity().provider.clone();

        if before != after {
            self.mark_entity_changed(&provider, internal_id);
        }
        Ok(waiter)
    }

    fn mark_entity_changed(&mut self, provider: &str, internal_id: &str) {
        if let Some(row) = self.flat.position(provider, internal_id) {
            self.flat.mark_changed(row, vec!["load_status"]);
        }
    }

    fn has_pending_loads(&self) -> bool {
        self.slots
            .iter()
            .flat_map(|s| s.lists.values())
            .any(|l| l.status() == LoadStatus::Loading)
    }

    /// Apply a finished fetch. Completions for discarded lists are dropped.
    pub fn apply_completion(&mut self, completion: LoadCompletion) {
        let LoadCompletion {
            provider,
            entity,
            generation,
            result,
        } = completion;

        let Some(index) = self.slot_index(&provider) else {
            debug!("Dropping completion for unregistered provider {}", provider);
            return;
        };
        let Some(list) = self.slots[index].lists.get_mut(&entity) else {
            debug!("Dropping completion for discarded list {}", entity);
            return;
        };
        if !list.finish_load(generation, result) {
            return;
        }

        let versions: Vec<NodeData> = list.versions().iter().map(version_data).collect();
        let loaded = list.is_loaded();
        if loaded {
            if let Some(node) = self.entity_node_in(index, &entity) {
                self.tree.reset_children(node, versions);
            }
        }
        self.mark_entity_changed(&provider, &entity);
    }

    /// Apply every completion that has already arrived.
    pub fn process_completions(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.completions_rx.try_recv() {
            self.apply_completion(completion);
            applied += 1;
        }
        applied
    }

    /// Wait for and apply completions until no list is loading.
    pub async fn drive_until_idle(&mut self) {
        self.process_completions();
        while self.has_pending_loads() {
            match self.completions_rx.recv().await {
                Some(completion) => self.apply_completion(completion),
                None => break,
            }
        }
    }

    /// Apply an incremental version change and mirror it into the tree.
    pub fn apply_version_delta(
        &mut self,
        internal_id: &str,
        delta: VersionDelta,
    ) -> CoreResult<Option<ListChange>> {
        let nodes: Vec<NodeData> = match &delta {
            VersionDelta::Insert { versions, .. } => versions.iter().map(version_data).collect(),
            VersionDelta::Remove { .. } => Vec::new(),
        };

        let list = self.version_list(internal_id)?;
        let change = list.apply_delta(delta);
        let node = self.entity_node(internal_id);

        if let (Some(change), Some(node)) = (&change, node) {
            match change {
                ListChange::Inserted { first, .. } => {
                    self.tree.insert_children(node, *first, nodes);
                }
                ListChange::Removed { first, last } => {
                    self.tree.remove_children(node, *first, last - first + 1);
                }
                _ => {}
            }
        }
        Ok(change)
    }

    // ── Tasks ───────────────────────────────────────────

    pub fn create_update_all_task(&self) -> UpdateAllTask {
        UpdateAllTask {
            providers: self.slots.iter().map(|s| s.id().to_string()).collect(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Install `version` into `instance` through the provider that produced it.
    pub async fn install(&self, instance: &Instance, version: &EntityVersion) -> CoreResult<()> {
        let origin = version.origin();
        let index = self
            .slot_index(&origin.provider)
            .ok_or_else(|| CoreError::NoSuchProvider(origin.provider.clone()))?;
        let slot = &self.slots[index];

        let no_such_version = || CoreError::NoSuchVersion {
            entity: origin.entity.clone(),
            version: version.descriptor().to_string(),
        };
        if slot.find_entity(&origin.entity).is_none() {
            return Err(no_such_version());
        }
        if let Some(list) = slot.lists.get(&origin.entity) {
            if list.is_loaded() && list.find(version.descriptor()).is_none() {
                return Err(no_such_version());
            }
        }

        info!(
            "Installing {} {} into {}",
            origin.entity,
            version.descriptor(),
            instance.name
        );
        let provider = slot.provider.clone();
        provider.install(instance, version).await
    }
}

/// Refreshes every provider's entities, one provider at a time.
#[derive(Debug, Clone)]
pub struct UpdateAllTask {
    providers: Vec<String>,
    cancelled: Arc<AtomicBool>,
}

/// Stops an [`UpdateAllTask`] before its next provider.
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl UpdateAllTask {
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(self.cancelled.clone())
    }

    pub fn providers(&self) -> &[String] {
        &self.providers
    }

    /// A failing provider does not stop the others; every failure is reported.
    pub async fn run(self, registry: &mut EntityRegistry) -> CoreResult<()> {
        let mut failed = Vec::new();

        for (completed, id) in self.providers.iter().enumerate() {
            if self.cancelled.load(Ordering::SeqCst) {
                info!("Entity update cancelled after {} providers", completed);
                return Err(CoreError::UpdateCancelled { completed, failed });
            }
            let Some(provider) = registry.provider(id).cloned() else {
                debug!("Provider {} was unregistered before its update", id);
                continue;
            };

            match provider.refresh_entities().await {
                Ok(entities) => registry.replace_entities(id, entities)?,
                Err(e) => {
                    warn!("Entity update of {} failed: {}", id, e);
                    failed.push(id.clone());
                }
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(CoreError::UpdateFailed { failed })
        }
    }
}
