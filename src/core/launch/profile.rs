// ─── Launch Profile ───
// The single mutable merge target patches are folded into.

use std::collections::BTreeSet;

use crate::core::version::{AssetIndexRef, Library, ProblemSeverity};

/// Flattened, runnable configuration derived from all patches of an instance.
///
/// Every `apply_*` reflects one patch's contribution; later patches may add or
/// override, never erase.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LaunchProfile {
    minecraft_version: String,
    minecraft_version_type: String,
    asset_index: Option<AssetIndexRef>,
    main_class: String,
    applet_class: String,
    minecraft_arguments: String,
    tweakers: Vec<String>,
    traits: BTreeSet<String>,
    libraries: Vec<Library>,
    native_libraries: Vec<Library>,
    jar_mods: Vec<Library>,
    main_jar: Option<Library>,
    mods: Vec<Library>,
    problem_severity: ProblemSeverity,
}

fn apply_string(from: &str, to: &mut String) {
    if from.is_empty() {
        return;
    }
    *to = from.to_string();
}

/// Insert or upgrade `library` in `list`: highest version wins, first seen wins ties.
fn merge_by_name(list: &mut Vec<Library>, library: &Library) {
    match list.iter().position(|existing| existing.same_artifact(library)) {
        None => list.push(library.clone()),
        Some(index) => {
            if library.supersedes(&list[index]) {
                list[index] = library.clone();
            }
        }
    }
}

impl LaunchProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset every field, discarding a stale merge.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    // ── Scalars ─────────────────────────────────────────

    pub fn apply_minecraft_version(&mut self, id: &str) {
        apply_string(id, &mut self.minecraft_version);
    }

    pub fn apply_version_type(&mut self, version_type: &str) {
        apply_string(version_type, &mut self.minecraft_version_type);
    }

    pub fn apply_main_class(&mut self, main_class: &str) {
        apply_string(main_class, &mut self.main_class);
    }

    pub fn apply_applet_class(&mut self, applet_class: &str) {
        apply_string(applet_class, &mut self.applet_class);
    }

    pub fn apply_legacy_arguments(&mut self, arguments: &str) {
        apply_string(arguments, &mut self.minecraft_arguments);
    }

    pub fn apply_asset_index(&mut self, asset_index: Option<&AssetIndexRef>) {
        if let Some(index) = asset_index {
            self.asset_index = Some(index.clone());
        }
    }

    // ── Collections ─────────────────────────────────────

    pub fn apply_traits<'a>(&mut self, traits: impl IntoIterator<Item = &'a String>) {
        self.traits.extend(traits.into_iter().cloned());
    }

    /// A tweaker re-declared by a later patch moves to the position that patch implies.
    pub fn apply_tweakers(&mut self, tweakers: &[String]) {
        self.tweakers.retain(|existing| !tweakers.contains(existing));
        self.tweakers.extend(tweakers.iter().cloned());
    }

    /// Jar mods are cumulative and order-significant.
    pub fn apply_jar_mods(&mut self, jar_mods: &[Library]) {
        self.jar_mods.extend(jar_mods.iter().cloned());
    }

    pub fn apply_library(&mut self, library: &Library) {
        if !library.is_active() {
            return;
        }
        let list = if library.is_native() {
            &mut self.native_libraries
        } else {
            &mut self.libraries
        };
        merge_by_name(list, library);
    }

    pub fn apply_mod(&mut self, library: &Library) {
        if !library.is_active() {
            return;
        }
        merge_by_name(&mut self.mods, library);
    }

    pub fn apply_main_jar(&mut self, jar: Option<&Library>) {
        if let Some(jar) = jar {
            self.main_jar = Some(jar.clone());
        }
    }

    pub fn apply_problem_severity(&mut self, severity: ProblemSeverity) {
        if self.problem_severity < severity {
            self.problem_severity = severity;
        }
    }

    // ── Accessors ───────────────────────────────────────

    pub fn minecraft_version(&self) -> &str {
        &self.minecraft_version
    }

    pub fn minecraft_version_type(&self) -> &str {
        &self.minecraft_version_type
    }

    /// The asset index, or the `legacy` marker if no patch supplied one.
    pub fn asset_index(&self) -> AssetIndexRef {
        self.asset_index.clone().unwrap_or_else(AssetIndexRef::legacy)
    }

    pub fn main_class(&self) -> &str {
        &self.main_class
    }

    pub fn applet_class(&self) -> &str {
        &self.applet_class
    }

    pub fn minecraft_arguments(&self) -> &str {
        &self.minecraft_arguments
    }

    pub fn tweakers(&self) -> &[String] {
        &self.tweakers
    }

    pub fn traits(&self) -> &BTreeSet<String> {
        &self.traits
    }

    pub fn has_trait(&self, name: &str) -> bool {
        self.traits.contains(name)
    }

    pub fn libraries(&self) -> &[Library] {
        &self.libraries
    }

    pub fn native_libraries(&self) -> &[Library] {
        &self.native_libraries
    }

    pub fn jar_mods(&self) -> &[Library] {
        &self.jar_mods
    }

    pub fn main_jar(&self) -> Option<&Library> {
        self.main_jar.as_ref()
    }

    pub fn mods(&self) -> &[Library] {
        &self.mods
    }

    pub fn problem_severity(&self) -> ProblemSeverity {
        self.problem_severity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::core::version::current_os_name;

    fn lib(name: &str) -> Library {
        Library::new(name)
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_scalar_never_erases() {
        let mut profile = LaunchProfile::new();
        profile.apply_main_class("net.A");
        profile.apply_main_class("");
        profile.apply_minecraft_version("1.12.2");
        profile.apply_minecraft_version("");
        profile.apply_applet_class("");
        assert_eq!(profile.main_class(), "net.A");
        assert_eq!(profile.minecraft_version(), "1.12.2");
        assert_eq!(profile.applet_class(), "");

        profile.apply_applet_class("net.minecraft.client.MinecraftApplet");
        profile.apply_applet_class("");
        profile.apply_version_type("release");
        profile.apply_version_type("");
        profile.apply_legacy_arguments("--username ${auth_player_name}");
        profile.apply_legacy_arguments("");
        assert_eq!(profile.applet_class(), "net.minecraft.client.MinecraftApplet");
        assert_eq!(profile.minecraft_version_type(), "release");
        assert_eq!(profile.minecraft_arguments(), "--username ${auth_player_name}");
    }

    #[test]
    fn asset_index_defaults_to_legacy() {
        let mut profile = LaunchProfile::new();
        assert_eq!(profile.asset_index().id, AssetIndexRef::LEGACY_ID);
        profile.apply_asset_index(None);
        assert_eq!(profile.asset_index().id, AssetIndexRef::LEGACY_ID);

        let mut index = AssetIndexRef::legacy();
        index.id = "1.12".into();
        profile.apply_asset_index(Some(&index));
        profile.apply_asset_index(None);
        assert_eq!(profile.asset_index().id, "1.12");
    }

    #[test]
    fn tweakers_move_to_their_latest_declaration() {
        let mut profile = LaunchProfile::new();
        profile.apply_tweakers(&strings(&["x", "y"]));
        profile.apply_tweakers(&strings(&["y", "z"]));
        assert_eq!(profile.tweakers(), strings(&["x", "y", "z"]).as_slice());

        profile.apply_tweakers(&strings(&["x"]));
        assert_eq!(profile.tweakers(), strings(&["y", "z", "x"]).as_slice());
    }

    #[test]
    fn tweakers_are_idempotent() {
        let mut profile = LaunchProfile::new();
        profile.apply_tweakers(&strings(&["a", "b"]));
        profile.apply_tweakers(&strings(&["a", "b"]));
        assert_eq!(profile.tweakers(), strings(&["a", "b"]).as_slice());
    }

    #[test]
    fn higher_library_version_wins_in_either_order() {
        let mut forward = LaunchProfile::new();
        forward.apply_library(&lib("lib:foo:1.0"));
        forward.apply_library(&lib("lib:foo:2.0"));

        let mut backward = LaunchProfile::new();
        backward.apply_library(&lib("lib:foo:2.0"));
        backward.apply_library(&lib("lib:foo:1.0"));

        for profile in [forward, backward] {
            assert_eq!(profile.libraries().len(), 1);
            assert_eq!(profile.libraries()[0].name, "lib:foo:2.0");
        }
    }

    #[test]
    fn equal_versions_keep_the_first_declaration() {
        let mut first = lib("lib:foo:1.0");
        first.url = Some("https://first.example".into());
        let mut second = lib("lib:foo:1.0.0");
        second.url = Some("https://second.example".into());

        let mut profile = LaunchProfile::new();
        profile.apply_library(&first);
        profile.apply_library(&second);

        assert_eq!(profile.libraries(), &[first]);
    }

    #[test]
    fn replaced_library_keeps_its_position() {
        let mut profile = LaunchProfile::new();
        profile.apply_library(&lib("a:a:1"));
        profile.apply_library(&lib("b:b:1"));
        profile.apply_library(&lib("a:a:2"));
        let names: Vec<_> = profile.libraries().iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["a:a:2", "b:b:1"]);
    }

    #[test]
    fn natives_and_inactive_libraries_are_routed() {
        let mut native = lib("org.lwjgl:lwjgl-platform:2.9.4");
        native.natives = Some(BTreeMap::from([(
            current_os_name().to_string(),
            "natives".to_string(),
        )]));

        let mut foreign = lib("org.lwjgl:lwjgl-platform-other:2.9.4");
        foreign.natives = Some(BTreeMap::from([(
            "nonexistent-os".to_string(),
            "natives".to_string(),
        )]));

        let mut profile = LaunchProfile::new();
        profile.apply_library(&native);
        profile.apply_library(&foreign);
        profile.apply_library(&lib("org.lwjgl:lwjgl:2.9.4"));

        assert_eq!(profile.native_libraries(), &[native]);
        assert_eq!(profile.libraries().len(), 1);
    }

    #[test]
    fn merged_library_is_a_copy() {
        let mut source = lib("lib:foo:1.0");
        let mut profile = LaunchProfile::new();
        profile.apply_library(&source);
        source.name = "lib:foo:9.9".into();
        assert_eq!(profile.libraries()[0].name, "lib:foo:1.0");
    }

    #[test]
    fn mods_dedupe_like_libraries() {
        let mut profile = LaunchProfile::new();
        profile.apply_mod(&lib("mods:jei:4.15"));
        profile.apply_mod(&lib("mods:jei:4.16"));
        profile.apply_mod(&lib("mods:jei:4.14"));
        assert_eq!(profile.mods().len(), 1);
        assert_eq!(profile.mods()[0].version(), "4.16");
    }

    #[test]
    fn jar_mods_append_without_dedup() {
        let mut profile = LaunchProfile::new();
        for name in ["m1", "m2", "m3"] {
            profile.apply_jar_mods(&[lib(&format!("jarmods:{name}:1"))]);
        }
        profile.apply_jar_mods(&[lib("jarmods:m1:1")]);
        let names: Vec<_> = profile.jar_mods().iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["jarmods:m1:1", "jarmods:m2:1", "jarmods:m3:1", "jarmods:m1:1"]);
    }

    #[test]
    fn severity_is_monotone() {
        use ProblemSeverity::*;
        let inputs = [Warning, FatalError, None, Error];
        let mut profile = LaunchProfile::new();
        for s in inputs {
            profile.apply_problem_severity(s);
        }
        assert_eq!(profile.problem_severity(), FatalError);

        let mut reversed = LaunchProfile::new();
        for s in inputs.iter().rev() {
            reversed.apply_problem_severity(*s);
        }
        assert_eq!(reversed.problem_severity(), FatalError);
    }

    #[test]
    fn main_jar_is_last_write_wins() {
        let mut profile = LaunchProfile::new();
        profile.apply_main_jar(Some(&lib("com.mojang:minecraft:1.12.2:client")));
        profile.apply_main_jar(None);
        assert_eq!(
            profile.main_jar().map(|l| l.name.as_str()),
            Some("com.mojang:minecraft:1.12.2:client")
        );
        profile.apply_main_jar(Some(&lib("com.mojang:minecraft:1.12.1:client")));
        assert_eq!(profile.main_jar().unwrap().version(), "1.12.1");
    }

    #[test]
    fn clear_resets_everything() {
        let mut profile = LaunchProfile::new();
        profile.apply_main_class("net.A");
        profile.apply_traits(&BTreeSet::from(["texturepacks".to_string()]));
        profile.apply_problem_severity(ProblemSeverity::Error);
        profile.clear();
        assert_eq!(profile, LaunchProfile::new());
        assert!(!profile.has_trait("texturepacks"));
    }
}
