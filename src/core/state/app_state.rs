use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::entity::{EntityRegistry, EntityVersion};
use crate::core::error::{CoreError, CoreResult};
use crate::core::http::{build_http_client, DEFAULT_USER_AGENT};
use crate::core::instance::{Instance, InstanceManager};
use crate::core::launch::{LibraryFiles, PatchSet};
use crate::core::providers::solder::{SolderProvider, DEFAULT_SOLDER_REPOSITORY};

const APP_DIR_NAME: &str = "LaunchProfile";
const BOOTSTRAP_FILE: &str = "launcher_bootstrap.json";
const SETTINGS_FILE: &str = "launcher_settings.json";

pub const SOLDER_PROVIDER_ID: &str = "solder";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherSettings {
    /// "32" or "64"; selects per-arch native classifiers.
    pub java_architecture: String,
    pub solder_repository: String,
    pub solder_packs: Vec<String>,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BootstrapConfig {
    data_dir: PathBuf,
}

impl Default for LauncherSettings {
    fn default() -> Self {
        Self {
            java_architecture: if cfg!(target_pointer_width = "32") { "32" } else { "64" }.into(),
            solder_repository: DEFAULT_SOLDER_REPOSITORY.into(),
            solder_packs: Vec::new(),
            user_agent: DEFAULT_USER_AGENT.into(),
        }
    }
}

pub struct AppState {
    pub data_dir: PathBuf,
    pub instance_manager: InstanceManager,
    pub http_client: Client,
    pub registry: EntityRegistry,
    pub launcher_settings: LauncherSettings,
}

impl AppState {
    /// State rooted at the platform data directory, honouring a bootstrap redirect.
    pub fn new() -> CoreResult<Self> {
        Self::with_data_dir(default_data_dir())
    }

    pub fn with_data_dir(data_dir: PathBuf) -> CoreResult<Self> {
        std::fs::create_dir_all(&data_dir).map_err(|source| CoreError::Io {
            path: data_dir.clone(),
            source,
        })?;

        let launcher_settings = load_settings_from_disk(&data_dir).unwrap_or_default();
        let http_client = build_http_client(&launcher_settings.user_agent)?;
        let instance_manager = InstanceManager::new(data_dir.join("instances"));

        let mut state = Self {
            data_dir,
            instance_manager,
            http_client,
            registry: EntityRegistry::new(),
            launcher_settings,
        };
        state.register_default_providers()?;
        info!("Launcher state ready at {}", state.data_dir.display());
        Ok(state)
    }

    fn register_default_providers(&mut self) -> CoreResult<()> {
        if self.launcher_settings.solder_packs.is_empty() {
            return Ok(());
        }
        let provider = SolderProvider::new(
            SOLDER_PROVIDER_ID,
            self.launcher_settings.solder_repository.clone(),
            self.launcher_settings.solder_packs.clone(),
            self.http_client.clone(),
        );
        self.registry.register_provider(Arc::new(provider))
    }

    pub fn libraries_dir(&self) -> PathBuf {
        self.data_dir.join("libraries")
    }

    pub fn instances_dir(&self) -> PathBuf {
        self.data_dir.join("instances")
    }

    pub fn save_settings(&self) -> CoreResult<()> {
        let path = self.data_dir.join(SETTINGS_FILE);
        let json = serde_json::to_string_pretty(&self.launcher_settings)?;
        std::fs::write(&path, json).map_err(|source| CoreError::Io { path, source })
    }

    /// Load an instance's patches and merge them into a launch profile.
    pub async fn instance_profile(&self, instance: &Instance) -> CoreResult<PatchSet> {
        self.instance_manager.load_patches(instance).await
    }

    /// Classpath and natives for a merged instance, for the configured architecture.
    pub fn instance_library_files(
        &self,
        instance: &Instance,
        patches: &PatchSet,
    ) -> Option<LibraryFiles> {
        let paths = instance.library_paths(&self.libraries_dir());
        patches
            .profile()
            .map(|p| p.library_files(&self.launcher_settings.java_architecture, &paths))
    }

    /// Install an entity version, then reload the instance's patches.
    pub async fn install_version(
        &self,
        instance: &Instance,
        version: &EntityVersion,
    ) -> CoreResult<PatchSet> {
        self.registry.install(instance, version).await?;
        self.instance_profile(instance).await
    }
}

fn load_settings_from_disk(data_dir: &Path) -> Option<LauncherSettings> {
    let path = data_dir.join(SETTINGS_FILE);
    let raw = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(settings) => Some(settings),
        Err(e) => {
            warn!("Ignoring malformed {}: {}", path.display(), e);
            None
        }
    }
}

fn default_base_dir() -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn default_data_dir() -> PathBuf {
    let base = default_base_dir();
    let bootstrap_path = base.join(BOOTSTRAP_FILE);

    if let Ok(raw) = std::fs::read_to_string(&bootstrap_path) {
        if let Ok(cfg) = serde_json::from_str::<BootstrapConfig>(&raw) {
            return cfg.data_dir;
        }
    }

    base.join(APP_DIR_NAME)
}
