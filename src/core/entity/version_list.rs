// ─── Version Lists ───
// Lazily loaded, sorted version list of one entity.
//
// NOT_LOADED -> LOADING -> LOADED, and LOADING -> NOT_LOADED on failure.
// Fetches run as spawned tokio tasks and come back to the owner as
// `LoadCompletion`s, so only the owner mutates the list.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use super::model::Entity;
use super::version::{EntityVersion, VersionComparator};
use crate::core::error::{CoreError, CoreResult};
use crate::core::events::{ListChange, Subscribers};
use crate::core::providers::VersionFetcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    NotLoaded,
    Loading,
    Loaded,
}

impl std::fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotLoaded => write!(f, "NOT_LOADED"),
            Self::Loading => write!(f, "LOADING"),
            Self::Loaded => write!(f, "LOADED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum LoadOutcome {
    Loaded,
    Failed(String),
}

/// Result of a spawned fetch, delivered to the owner.
#[derive(Debug)]
pub struct LoadCompletion {
    pub provider: String,
    pub entity: String,
    pub generation: u64,
    pub result: CoreResult<Vec<EntityVersion>>,
}

/// Incremental change reported by providers that can diff.
#[derive(Debug, Clone)]
pub enum VersionDelta {
    Insert {
        index: usize,
        versions: Vec<EntityVersion>,
    },
    Remove {
        first: usize,
        count: usize,
    },
}

/// Resolves when the load it was handed out for finishes.
///
/// Every caller that joined the same load observes the same outcome.
#[derive(Debug)]
pub struct LoadWaiter {
    provider: String,
    entity: String,
    rx: watch::Receiver<Option<LoadOutcome>>,
}

impl LoadWaiter {
    fn resolved(provider: &str, entity: &str, outcome: LoadOutcome) -> Self {
        let (_tx, rx) = watch::channel(Some(outcome));
        Self {
            provider: provider.to_string(),
            entity: entity.to_string(),
            rx,
        }
    }

    pub async fn wait(mut self) -> CoreResult<()> {
        let outcome = match self.rx.wait_for(Option::is_some).await {
            Ok(value) => value.clone(),
            Err(_) => {
                return Err(CoreError::ChannelClosed(format!(
                    "load of {} dropped before completing",
                    self.entity
                )))
            }
        };
        match outcome {
            Some(LoadOutcome::Loaded) => Ok(()),
            Some(LoadOutcome::Failed(reason)) => Err(CoreError::ProviderFetch {
                provider: self.provider,
                entity: self.entity,
                reason,
            }),
            None => Err(CoreError::Other("load finished without an outcome".into())),
        }
    }
}

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

pub struct VersionList {
    entity: Entity,
    status: LoadStatus,
    versions: Vec<EntityVersion>,
    comparator: VersionComparator,
    fetcher: Arc<dyn VersionFetcher>,
    /// Identifies the in-flight load; completions with another value are stale.
    generation: u64,
    pending: Option<watch::Sender<Option<LoadOutcome>>>,
    fetches: u64,
    changes: Subscribers<ListChange>,
}

impl std::fmt::Debug for VersionList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionList")
            .field("entity", &self.entity.internal_id)
            .field("status", &self.status)
            .field("versions", &self.versions.len())
            .field("generation", &self.generation)
            .finish()
    }
}

impl VersionList {
    pub fn new(
        entity: Entity,
        fetcher: Arc<dyn VersionFetcher>,
        comparator: VersionComparator,
    ) -> Self {
        Self {
            entity,
            status: LoadStatus::NotLoaded,
            versions: Vec::new(),
            comparator,
            fetcher,
            generation: 0,
            pending: None,
            fetches: 0,
            changes: Subscribers::new(),
        }
    }

    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    pub fn status(&self) -> LoadStatus {
        self.status
    }

    pub fn is_loaded(&self) -> bool {
        self.status == LoadStatus::Loaded
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of fetches this list has dispatched.
    pub fn fetch_count(&self) -> u64 {
        self.fetches
    }

    pub fn changes(&mut self) -> &mut Subscribers<ListChange> {
        &mut self.changes
    }

    /// Start a load, or join the one already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn request_load(&mut self, completions: &mpsc::UnboundedSender<LoadCompletion>) -> LoadWaiter {
        let provider = self.entity.provider.clone();
        let entity_id = self.entity.internal_id.clone();

        match self.status {
            LoadStatus::Loaded => {
                return LoadWaiter::resolved(&provider, &entity_id, LoadOutcome::Loaded);
            }
            LoadStatus::Loading => {
                if let Some(tx) = &self.pending {
                    debug!("Joining in-flight load of {}", entity_id);
                    return LoadWaiter {
                        provider,
                        entity: entity_id,
                        rx: tx.subscribe(),
                    };
                }
            }
            LoadStatus::NotLoaded => {}
        }

        let (tx, rx) = watch::channel(None);
        self.pending = Some(tx);
        self.status = LoadStatus::Loading;
        self.generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
        self.fetches += 1;

        debug!(
            "Fetching versions of {} from {} (generation {})",
            entity_id, provider, self.generation
        );

        let fetcher = self.fetcher.clone();
        let entity = self.entity.clone();
        let generation = self.generation;
        let completions = completions.clone();
        tokio::spawn(async move {
            let fetch = tokio::spawn({
                let entity = entity.clone();
                async move { fetcher.fetch(&entity).await }
            });
            // A panicking fetcher still has to settle the load.
            let result = fetch.await.unwrap_or_else(|e| {
                Err(CoreError::ProviderFetch {
                    provider: entity.provider.clone(),
                    entity: entity.internal_id.clone(),
                    reason: format!("fetch task aborted: {e}"),
                })
            });
            let completion = LoadCompletion {
                provider: entity.provider,
                entity: entity.internal_id,
                generation,
                result,
            };
            if completions.send(completion).is_err() {
                debug!("Version list owner is gone, dropping fetch result");
            }
        });

        LoadWaiter {
            provider,
            entity: entity_id,
            rx,
        }
    }

    /// Apply a fetch result. Returns `false` if the completion was stale.
    pub fn finish_load(&mut self, generation: u64, result: CoreResult<Vec<EntityVersion>>) -> bool {
        if self.status != LoadStatus::Loading || generation != self.generation {
            debug!(
                "Ignoring stale completion for {} (generation {}, current {})",
                self.entity.internal_id, generation, self.generation
            );
            return false;
        }

        let outcome = match result {
            Ok(mut versions) => {
                let cmp = self.comparator.clone();
                versions.sort_by(|a, b| cmp(a, b));
                self.versions = versions;
                self.status = LoadStatus::Loaded;
                self.changes.emit(&ListChange::Reset);
                debug!(
                    "Loaded {} versions of {}",
                    self.versions.len(),
                    self.entity.internal_id
                );
                LoadOutcome::Loaded
            }
            Err(e) => {
                warn!("Failed to load versions of {}: {}", self.entity.internal_id, e);
                self.status = LoadStatus::NotLoaded;
                LoadOutcome::Failed(e.to_string())
            }
        };

        if let Some(tx) = self.pending.take() {
            tx.send_replace(Some(outcome));
        }
        true
    }

    /// Apply an incremental change, returning the event that was emitted.
    ///
    /// Ignored until the first load has finished.
    pub fn apply_delta(&mut self, delta: VersionDelta) -> Option<ListChange> {
        if self.status != LoadStatus::Loaded {
            debug!(
                "Ignoring version delta for {} while {}",
                self.entity.internal_id, self.status
            );
            return None;
        }
        let change = match delta {
            VersionDelta::Insert { index, versions } => {
                let index = index.min(self.versions.len());
                let count = versions.len();
                self.versions.splice(index..index, versions);
                ListChange::inserted(index, count)
            }
            VersionDelta::Remove { first, count } => {
                if first >= self.versions.len() {
                    return None;
                }
                let end = first.saturating_add(count).min(self.versions.len());
                self.versions.drain(first..end);
                ListChange::removed(first, end - first)
            }
        }?;
        self.changes.emit(&change);
        Some(change)
    }

    pub fn at(&self, index: usize) -> Option<&EntityVersion> {
        self.versions.get(index)
    }

    pub fn count(&self) -> usize {
        self.versions.len()
    }

    pub fn versions(&self) -> &[EntityVersion] {
        &self.versions
    }

    pub fn find(&self, descriptor: &str) -> Option<&EntityVersion> {
        self.versions.iter().find(|v| v.descriptor() == descriptor)
    }

    pub fn recommended(&self) -> Option<&EntityVersion> {
        self.versions.iter().find(|v| v.type_string() == "Recommended")
    }

    pub fn latest(&self) -> Option<&EntityVersion> {
        self.versions.iter().find(|v| v.type_string() == "Latest")
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::entity::model::EntityKind;
    use crate::core::entity::version::{default_comparator, ScriptedVersion, VersionOrigin};
    use crate::core::events::recorder;
    use async_trait::async_trait;
    use serde_json::Map;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::sync::Mutex;
    use tokio::sync::Notify;

    pub(crate) fn scripted(entity: &str, name: &str, type_string: &str) -> EntityVersion {
        EntityVersion::Scripted(ScriptedVersion {
            origin: VersionOrigin {
                provider: "test".into(),
                entity: entity.into(),
            },
            descriptor: name.into(),
            name: name.into(),
            type_string: type_string.into(),
            data: Map::new(),
        })
    }

    /// Fetcher whose results are released by the test.
    #[derive(Default)]
    pub(crate) struct GatedFetcher {
        pub calls: AtomicUsize,
        pub release: Notify,
        pub results: Mutex<Vec<CoreResult<Vec<EntityVersion>>>>,
        /// Panic instead of answering once released.
        pub panics: AtomicBool,
    }

    #[async_trait]
    impl VersionFetcher for GatedFetcher {
        async fn fetch(&self, entity: &Entity) -> CoreResult<Vec<EntityVersion>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.release.notified().await;
            if self.panics.load(Ordering::SeqCst) {
                panic!("fetcher for {} crashed", entity.internal_id);
            }
            self.results.lock().unwrap().pop().unwrap_or_else(|| {
                Err(CoreError::ProviderFetch {
                    provider: entity.provider.clone(),
                    entity: entity.internal_id.clone(),
                    reason: "no result queued".into(),
                })
            })
        }
    }

    fn list_with(fetcher: Arc<GatedFetcher>) -> VersionList {
        VersionList::new(
            Entity::new("test", "jei", "JEI", EntityKind::Mod),
            fetcher,
            default_comparator(),
        )
    }

    async fn deliver(list: &mut VersionList, rx: &mut mpsc::UnboundedReceiver<LoadCompletion>) {
        let completion = rx.recv().await.unwrap();
        list.finish_load(completion.generation, completion.result);
    }

    #[test]
    fn empty_before_first_load() {
        let list = list_with(Arc::new(GatedFetcher::default()));
        assert_eq!(list.status(), LoadStatus::NotLoaded);
        assert_eq!(list.count(), 0);
        assert!(list.at(0).is_none());
        assert!(list.latest().is_none());
    }

    #[tokio::test]
    async fn two_requests_share_one_fetch() {
        let fetcher = Arc::new(GatedFetcher::default());
        fetcher.results.lock().unwrap().push(Ok(vec![
            scripted("jei", "4.15", ""),
            scripted("jei", "4.16", "Latest"),
        ]));
        let mut list = list_with(fetcher.clone());
        let events = recorder(list.changes());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let first = list.request_load(&tx);
        let second = list.request_load(&tx);
        assert_eq!(list.status(), LoadStatus::Loading);
        assert_eq!(list.fetch_count(), 1);

        fetcher.release.notify_one();
        deliver(&mut list, &mut rx).await;

        first.wait().await.unwrap();
        second.wait().await.unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(list.status(), LoadStatus::Loaded);
        assert_eq!(list.at(0).unwrap().name(), "4.16");
        assert_eq!(list.latest().unwrap().descriptor(), "4.16");
        assert_eq!(*events.lock().unwrap(), vec![ListChange::Reset]);

        // Already loaded: resolves without fetching.
        list.request_load(&tx).wait().await.unwrap();
        assert_eq!(list.fetch_count(), 1);
    }

    #[tokio::test]
    async fn failed_load_reverts_and_can_retry() {
        let fetcher = Arc::new(GatedFetcher::default());
        let mut list = list_with(fetcher.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let waiter = list.request_load(&tx);
        fetcher.release.notify_one();
        deliver(&mut list, &mut rx).await;

        let err = waiter.wait().await.unwrap_err();
        assert!(matches!(err, CoreError::ProviderFetch { .. }));
        assert_eq!(list.status(), LoadStatus::NotLoaded);
        assert_eq!(list.count(), 0);

        fetcher
            .results
            .lock()
            .unwrap()
            .push(Ok(vec![scripted("jei", "1.0", "")]));
        let retry = list.request_load(&tx);
        assert_eq!(list.fetch_count(), 2);
        fetcher.release.notify_one();
        deliver(&mut list, &mut rx).await;
        retry.wait().await.unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
        assert_eq!(list.count(), 1);
    }

    #[tokio::test]
    async fn stale_completion_is_ignored() {
        let mut list = list_with(Arc::new(GatedFetcher::default()));
        assert!(!list.finish_load(42, Ok(vec![scripted("jei", "1.0", "")])));
        assert_eq!(list.status(), LoadStatus::NotLoaded);
        assert_eq!(list.count(), 0);
    }

    fn loaded_empty() -> VersionList {
        let mut list = list_with(Arc::new(GatedFetcher::default()));
        list.status = LoadStatus::Loaded;
        list
    }

    #[tokio::test]
    async fn panicking_fetch_settles_the_load() {
        let fetcher = Arc::new(GatedFetcher::default());
        fetcher.panics.store(true, Ordering::SeqCst);
        let mut list = list_with(fetcher.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let waiter = list.request_load(&tx);
        fetcher.release.notify_one();
        deliver(&mut list, &mut rx).await;

        assert_eq!(list.status(), LoadStatus::NotLoaded);
        assert!(matches!(
            waiter.wait().await,
            Err(CoreError::ProviderFetch { ref entity, .. }) if entity == "jei"
        ));

        // A later request starts a fresh fetch instead of joining the dead one.
        fetcher.panics.store(false, Ordering::SeqCst);
        fetcher.results.lock().unwrap().push(Ok(vec![scripted("jei", "1.0", "")]));
        let retry = list.request_load(&tx);
        fetcher.release.notify_one();
        deliver(&mut list, &mut rx).await;
        retry.wait().await.unwrap();
        assert_eq!(list.fetch_count(), 2);
    }

    #[test]
    fn deltas_wait_for_the_first_load() {
        let mut list = list_with(Arc::new(GatedFetcher::default()));
        let events = recorder(list.changes());
        let inserted = list.apply_delta(VersionDelta::Insert {
            index: 0,
            versions: vec![scripted("jei", "a", "")],
        });
        assert_eq!(inserted, None);
        assert_eq!(list.count(), 0);
        assert!(list.at(0).is_none());
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn oversized_remove_is_clamped() {
        let mut list = loaded_empty();
        list.apply_delta(VersionDelta::Insert {
            index: 0,
            versions: vec![scripted("jei", "a", ""), scripted("jei", "b", "")],
        });
        let removed = list.apply_delta(VersionDelta::Remove {
            first: 1,
            count: usize::MAX,
        });
        assert_eq!(removed, Some(ListChange::Removed { first: 1, last: 1 }));
        assert_eq!(list.count(), 1);
    }

    #[test]
    fn deltas_report_their_ranges() {
        let mut list = loaded_empty();
        let events = recorder(list.changes());

        let inserted = list.apply_delta(VersionDelta::Insert {
            index: 0,
            versions: vec![scripted("jei", "a", ""), scripted("jei", "b", "")],
        });
        assert_eq!(inserted, Some(ListChange::Inserted { first: 0, last: 1 }));

        let appended = list.apply_delta(VersionDelta::Insert {
            index: 99,
            versions: vec![scripted("jei", "c", "Recommended")],
        });
        assert_eq!(appended, Some(ListChange::Inserted { first: 2, last: 2 }));
        assert_eq!(list.recommended().unwrap().name(), "c");

        let removed = list.apply_delta(VersionDelta::Remove { first: 1, count: 5 });
        assert_eq!(removed, Some(ListChange::Removed { first: 1, last: 2 }));
        assert_eq!(list.apply_delta(VersionDelta::Remove { first: 7, count: 1 }), None);

        assert_eq!(list.count(), 1);
        assert_eq!(events.lock().unwrap().len(), 3);
    }
}
