// ─── Patch Application Engine ───
// Folds ordered patches into a LaunchProfile, and keeps the ordered patch
// set of an instance together with the profile last built from it.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info, warn};

use super::profile::LaunchProfile;
use crate::core::error::{CoreError, CoreResult};
use crate::core::version::{PatchOrigin, PatchProblem, ProblemSeverity, VersionPatch};

/// Apply every field `patch` declares, in the fixed application order.
pub fn apply_patch(profile: &mut LaunchProfile, patch: &VersionPatch) {
    if let Some(v) = &patch.minecraft_version {
        profile.apply_minecraft_version(v);
    }
    if let Some(t) = &patch.version_type {
        profile.apply_version_type(t);
    }
    profile.apply_asset_index(patch.asset_index.as_ref());
    profile.apply_main_jar(patch.main_jar.as_ref());
    if let Some(c) = &patch.main_class {
        profile.apply_main_class(c);
    }
    if let Some(c) = &patch.applet_class {
        profile.apply_applet_class(c);
    }
    if let Some(args) = &patch.minecraft_arguments {
        profile.apply_legacy_arguments(args);
    }
    if !patch.tweakers.is_empty() {
        profile.apply_tweakers(&patch.tweakers);
    }
    if !patch.jar_mods.is_empty() {
        profile.apply_jar_mods(&patch.jar_mods);
    }
    for m in &patch.mods {
        profile.apply_mod(m);
    }
    profile.apply_traits(&patch.traits);
    for library in &patch.libraries {
        profile.apply_library(library);
    }
    profile.apply_problem_severity(patch.problem_severity());
}

/// Apply `patches` in order.
///
/// All patches are checked before the profile is touched: a patch carrying a
/// fatal problem rejects the whole pass.
pub fn apply_to(profile: &mut LaunchProfile, patches: &[VersionPatch]) -> CoreResult<()> {
    for patch in patches {
        if let Some(fatal) = patch
            .problems
            .iter()
            .find(|p| p.severity == ProblemSeverity::FatalError)
        {
            return Err(CoreError::parse(&patch.uid, fatal.description.clone()));
        }
    }

    for patch in patches {
        debug!("Applying patch {} ({})", patch.uid, patch.display_name());
        apply_patch(profile, patch);
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
}

// ─── Patch Set ───

/// Ordered patches of one instance and the profile built from them.
#[derive(Debug, Default)]
pub struct PatchSet {
    patches: Vec<VersionPatch>,
    /// Built-in patches shadowed by a custom patch with the same uid.
    shadowed: HashMap<String, VersionPatch>,
    /// Problems found by `check_requirements`, keyed by uid.
    derived: HashMap<String, Vec<PatchProblem>>,
    profile: Option<LaunchProfile>,
}

impl PatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_patches(patches: impl IntoIterator<Item = VersionPatch>) -> Self {
        let mut set = Self::new();
        for patch in patches {
            set.push(patch);
        }
        set
    }

    /// Load every `*.json` patch in `dir` as a custom patch.
    ///
    /// Ordered by `order` (unset sorts last), then uid. A missing directory
    /// yields an empty set.
    pub async fn load_from_dir(dir: &Path) -> CoreResult<Self> {
        let mut set = Self::new();
        if !dir.exists() {
            return Ok(set);
        }

        let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| CoreError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let mut loaded = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| CoreError::Io {
            path: dir.to_path_buf(),
            source: e,
        })? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let raw = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| CoreError::Io {
                    path: path.clone(),
                    source: e,
                })?;
            loaded.push(VersionPatch::from_json(&raw, PatchOrigin::Custom, Some(&path))?);
        }

        loaded.sort_by(|a, b| {
            let a_order = a.order.unwrap_or(i32::MAX);
            let b_order = b.order.unwrap_or(i32::MAX);
            a_order.cmp(&b_order).then_with(|| a.uid.cmp(&b.uid))
        });

        info!("Loaded {} patches from {}", loaded.len(), dir.display());
        for patch in loaded {
            set.push(patch);
        }
        Ok(set)
    }

    /// Append `patch`, or replace the patch with the same uid in place.
    ///
    /// A custom patch replacing a built-in one becomes revertible.
    pub fn push(&mut self, mut patch: VersionPatch) {
        match self.index_of(&patch.uid) {
            None => self.patches.push(patch),
            Some(index) => {
                let existing = &self.patches[index];
                if patch.is_custom() && !existing.is_custom() {
                    patch.meta.revertible = true;
                    self.shadowed.insert(patch.uid.clone(), existing.clone());
                } else if patch.is_custom() && existing.meta.revertible {
                    patch.meta.revertible = true;
                }
                self.patches[index] = patch;
            }
        }
    }

    pub fn patches(&self) -> &[VersionPatch] {
        &self.patches
    }

    pub fn find(&self, uid: &str) -> Option<&VersionPatch> {
        self.patches.iter().find(|p| p.uid == uid)
    }

    fn index_of(&self, uid: &str) -> Option<usize> {
        self.patches.iter().position(|p| p.uid == uid)
    }

    /// The profile from the last successful rebuild.
    pub fn profile(&self) -> Option<&LaunchProfile> {
        self.profile.as_ref()
    }

    /// Declared and derived problems of one patch.
    pub fn problems(&self, uid: &str) -> Vec<PatchProblem> {
        let declared = self.find(uid).map(|p| p.problems.as_slice()).unwrap_or(&[]);
        let derived = self.derived.get(uid).map(Vec::as_slice).unwrap_or(&[]);
        declared.iter().chain(derived).cloned().collect()
    }

    /// Recompute problems caused by unmet `requires` entries.
    pub fn check_requirements(&mut self) {
        self.derived.clear();
        for patch in &self.patches {
            for req in &patch.requires {
                let problem = match (self.find(&req.uid), &req.equals) {
                    (None, _) => Some(format!("{} is missing, it is needed by {}", req.uid, patch.uid)),
                    (Some(found), Some(wanted)) if found.version.as_deref() != Some(wanted.as_str()) => {
                        Some(format!(
                            "{} needs {} {}, but {} is present",
                            patch.uid,
                            req.uid,
                            wanted,
                            found.version.as_deref().unwrap_or("no version")
                        ))
                    }
                    _ => None,
                };
                if let Some(description) = problem {
                    warn!("{}", description);
                    self.derived
                        .entry(patch.uid.clone())
                        .or_default()
                        .push(PatchProblem::new(ProblemSeverity::Error, description));
                }
            }
        }
    }

    /// Build a fresh profile from the current patches.
    ///
    /// On failure the previously built profile stays in effect.
    pub fn rebuild(&mut self) -> CoreResult<&LaunchProfile> {
        self.check_requirements();

        let mut profile = LaunchProfile::new();
        if let Err(e) = apply_to(&mut profile, &self.patches) {
            warn!("Profile rebuild failed: {}", e);
            return Err(e);
        }
        for problems in self.derived.values() {
            for problem in problems {
                profile.apply_problem_severity(problem.severity);
            }
        }

        info!(
            "Rebuilt launch profile from {} patches (severity {:?})",
            self.patches.len(),
            profile.problem_severity()
        );
        Ok(&*self.profile.insert(profile))
    }

    pub fn move_patch(&mut self, uid: &str, direction: MoveDirection) -> CoreResult<()> {
        let index = self
            .index_of(uid)
            .ok_or_else(|| CoreError::PatchNotFound(uid.to_string()))?;
        if !self.patches[index].meta.movable {
            return Err(CoreError::PatchLocked {
                uid: uid.to_string(),
                action: "moved",
            });
        }

        let target = match direction {
            MoveDirection::Up => index.checked_sub(1),
            MoveDirection::Down => Some(index + 1).filter(|i| *i < self.patches.len()),
        };
        let Some(target) = target else {
            return Ok(());
        };
        if !self.patches[target].meta.movable {
            return Err(CoreError::PatchLocked {
                uid: self.patches[target].uid.clone(),
                action: "moved",
            });
        }

        self.patches.swap(index, target);
        self.rebuild().map(|_| ())
    }

    /// Remove a patch. The removed document is returned so its file can be deleted.
    pub fn remove_patch(&mut self, uid: &str) -> CoreResult<VersionPatch> {
        let index = self
            .index_of(uid)
            .ok_or_else(|| CoreError::PatchNotFound(uid.to_string()))?;
        if !self.patches[index].meta.removable {
            return Err(CoreError::PatchLocked {
                uid: uid.to_string(),
                action: "removed",
            });
        }

        let removed = self.patches.remove(index);
        self.shadowed.remove(uid);
        self.rebuild()?;
        Ok(removed)
    }

    /// Drop a custom override and restore the built-in patch it shadowed.
    pub fn revert_patch(&mut self, uid: &str) -> CoreResult<VersionPatch> {
        let index = self
            .index_of(uid)
            .ok_or_else(|| CoreError::PatchNotFound(uid.to_string()))?;
        if !self.patches[index].meta.revertible {
            return Err(CoreError::PatchLocked {
                uid: uid.to_string(),
                action: "reverted",
            });
        }
        let builtin = self
            .shadowed
            .remove(uid)
            .ok_or_else(|| CoreError::PatchNotFound(uid.to_string()))?;

        let custom = std::mem::replace(&mut self.patches[index], builtin);
        self.rebuild()?;
        Ok(custom)
    }
}
