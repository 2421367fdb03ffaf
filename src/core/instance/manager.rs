use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::model::Instance;
use crate::core::error::{CoreError, CoreResult};
use crate::core::launch::PatchSet;

/// Manages the instances stored under one directory.
pub struct InstanceManager {
    instances_dir: PathBuf,
}

impl InstanceManager {
    pub fn new(instances_dir: PathBuf) -> Self {
        Self { instances_dir }
    }

    pub fn instances_dir(&self) -> &Path {
        &self.instances_dir
    }

    /// Create a new instance on disk with its subdirectories and `instance.json`.
    pub async fn create(&self, name: &str, minecraft_version: Option<String>) -> CoreResult<Instance> {
        let mut instance = Instance::new(name, &self.instances_dir);
        instance.minecraft_version = minecraft_version;

        let patches_dir = instance.patches_dir();
        let libraries_dir = instance.libraries_dir();
        let jar_mods_dir = instance.jar_mods_dir();
        tokio::try_join!(
            create_dir_safe(&patches_dir),
            create_dir_safe(&libraries_dir),
            create_dir_safe(&jar_mods_dir),
        )?;
        self.save(&instance).await?;

        info!("Created instance '{}' ({})", instance.name, instance.id);
        Ok(instance)
    }

    pub async fn save(&self, instance: &Instance) -> CoreResult<()> {
        let json = serde_json::to_string_pretty(instance)?;
        let config_path = instance.config_path();
        if let Some(parent) = config_path.parent() {
            create_dir_safe(parent).await?;
        }
        tokio::fs::write(&config_path, json)
            .await
            .map_err(|e| CoreError::Io {
                path: config_path,
                source: e,
            })?;
        Ok(())
    }

    pub async fn load(&self, id: &str) -> CoreResult<Instance> {
        let config_path = self.instances_dir.join(id).join("instance.json");
        let json = tokio::fs::read_to_string(&config_path)
            .await
            .map_err(|e| CoreError::Io {
                path: config_path.clone(),
                source: e,
            })?;
        Ok(serde_json::from_str(&json)?)
    }

    /// All readable instances. Corrupt entries are skipped with a warning.
    pub async fn list(&self) -> CoreResult<Vec<Instance>> {
        let mut instances = Vec::new();
        if !self.instances_dir.exists() {
            return Ok(instances);
        }

        let mut entries = tokio::fs::read_dir(&self.instances_dir)
            .await
            .map_err(|e| CoreError::Io {
                path: self.instances_dir.clone(),
                source: e,
            })?;

        while let Some(entry) = entries.next_entry().await.map_err(|e| CoreError::Io {
            path: self.instances_dir.clone(),
            source: e,
        })? {
            let config_path = entry.path().join("instance.json");
            if !config_path.exists() {
                continue;
            }
            match tokio::fs::read_to_string(&config_path).await {
                Ok(json) => match serde_json::from_str::<Instance>(&json) {
                    Ok(inst) => instances.push(inst),
                    Err(e) => warn!("Corrupt instance.json at {:?}: {}", config_path, e),
                },
                Err(e) => warn!("Cannot read {:?}: {}", config_path, e),
            }
        }

        instances.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(instances)
    }

    /// Load the instance's patches and build its launch profile.
    pub async fn load_patches(&self, instance: &Instance) -> CoreResult<PatchSet> {
        let mut patches = PatchSet::load_from_dir(&instance.patches_dir()).await?;
        patches.rebuild()?;
        Ok(patches)
    }
}

async fn create_dir_safe(path: &Path) -> CoreResult<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| CoreError::Io {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn created_instances_can_be_listed_and_loaded() {
        let root = std::env::temp_dir().join(format!("instance-manager-test-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        let manager = InstanceManager::new(root.clone());

        let created = manager.create("Tekkit", Some("1.12.2".into())).await.unwrap();
        assert!(created.patches_dir().is_dir());
        assert!(created.jar_mods_dir().is_dir());

        let loaded = manager.load(&created.id).await.unwrap();
        assert_eq!(loaded, created);

        std::fs::write(root.join("stray.txt"), "x").unwrap();
        let listed = manager.list().await.unwrap();
        assert_eq!(listed.len(), 1);

        created
            .write_patch(
                "net.minecraft",
                &serde_json::json!({"uid": "net.minecraft", "mainClass": "net.minecraft.client.main.Main"}),
            )
            .await
            .unwrap();
        let patches = manager.load_patches(&created).await.unwrap();
        assert_eq!(
            patches.profile().unwrap().main_class(),
            "net.minecraft.client.main.Main"
        );

        let _ = std::fs::remove_dir_all(&root);
    }
}
