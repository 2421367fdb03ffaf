use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::core::error::{CoreError, CoreResult};
use crate::core::launch::LibraryPaths;

/// An install target, persisted to disk as `instance.json`.
///
/// Each instance has its own folder under `instances/<uuid>/` with:
/// - `patches/`    custom and installed patch documents
/// - `libraries/`  instance-local libraries (`hint: local`) and jar mods
/// - `jarmods/`    temp output of the jar-mod-patched main jar
/// - `instance.json` this serialized struct
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instance {
    pub id: String,
    pub name: String,
    pub path: PathBuf,
    /// Game version the instance was created for, if known.
    #[serde(default)]
    pub minecraft_version: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Instance {
    pub fn new(name: impl Into<String>, base_dir: &Path) -> Self {
        let id = Uuid::new_v4().to_string();
        let path = base_dir.join(&id);
        Self {
            id,
            name: name.into(),
            path,
            minecraft_version: None,
            created_at: Utc::now(),
        }
    }

    pub fn patches_dir(&self) -> PathBuf {
        self.path.join("patches")
    }

    pub fn libraries_dir(&self) -> PathBuf {
        self.path.join("libraries")
    }

    pub fn jar_mods_dir(&self) -> PathBuf {
        self.path.join("jarmods")
    }

    pub fn config_path(&self) -> PathBuf {
        self.path.join("instance.json")
    }

    /// Path of the patch document with the given uid.
    ///
    /// The uid must be a single plain file name component.
    pub fn patch_path(&self, uid: &str) -> CoreResult<PathBuf> {
        let plain = !uid.trim().is_empty()
            && uid != "."
            && !uid.contains("..")
            && !uid.contains(['/', '\\', ':', '\0']);
        if !plain {
            return Err(CoreError::InvalidPatchUid(uid.to_string()));
        }
        Ok(self.patches_dir().join(format!("{uid}.json")))
    }

    /// Library roots for building this instance's classpath.
    pub fn library_paths(&self, shared_libraries: &Path) -> LibraryPaths {
        LibraryPaths {
            libraries_dir: shared_libraries.to_path_buf(),
            local_libraries_dir: self.libraries_dir(),
            jar_mods_dir: self.jar_mods_dir(),
        }
    }

    /// Write a patch document to `patches/<uid>.json`, replacing any existing one.
    pub async fn write_patch(&self, uid: &str, document: &serde_json::Value) -> CoreResult<PathBuf> {
        let path = self.patch_path(uid)?;
        let dir = self.patches_dir();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| CoreError::Io {
                path: dir.clone(),
                source,
            })?;

        let json = serde_json::to_string_pretty(document)?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|source| CoreError::Io {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }

    /// Delete `patches/<uid>.json`. Returns whether a file was removed.
    pub async fn remove_patch_if_exists(&self, uid: &str) -> CoreResult<bool> {
        let path = self.patch_path(uid)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(CoreError::Io { path, source }),
        }
    }
}
