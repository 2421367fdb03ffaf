// ─── Classpath Builder ───
// Projects a merged profile onto concrete jar and native files.

use std::path::{Path, PathBuf};

use super::profile::LaunchProfile;
use crate::core::version::{current_os_name, Library, NativeFiles};

/// File name of the jar produced by applying jar mods to the main jar.
pub const JAR_MODDED_MAIN_JAR: &str = "minecraft.jar";

/// Roots that library storage paths are resolved against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryPaths {
    /// Shared library store.
    pub libraries_dir: PathBuf,
    /// Instance-local store for `hint: local` libraries and jar mods.
    pub local_libraries_dir: PathBuf,
    /// Temp directory the jar-mod-patched main jar is written to.
    pub jar_mods_dir: PathBuf,
}

impl LibraryPaths {
    fn resolve(&self, library: &Library, relative: PathBuf) -> PathBuf {
        if library.is_local() {
            self.local_libraries_dir.join(relative)
        } else {
            self.libraries_dir.join(relative)
        }
    }
}

/// Classpath and native entries, in launch order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryFiles {
    pub classpath: Vec<PathBuf>,
    pub natives: Vec<PathBuf>,
}

#[derive(Default)]
struct FileBuckets {
    jars: Vec<PathBuf>,
    natives: Vec<PathBuf>,
    natives32: Vec<PathBuf>,
    natives64: Vec<PathBuf>,
}

impl FileBuckets {
    fn collect(&mut self, library: &Library, os: &str, paths: &LibraryPaths) {
        if !library.is_native() {
            self.jars.push(paths.resolve(library, library.storage_path()));
            return;
        }
        match library.native_files(os) {
            Some(NativeFiles::Single(path)) => self.natives.push(paths.resolve(library, path)),
            Some(NativeFiles::PerArch { x32, x64 }) => {
                self.natives32.push(paths.resolve(library, x32));
                self.natives64.push(paths.resolve(library, x64));
            }
            None => {}
        }
    }
}

impl LaunchProfile {
    /// Resolve the files needed to launch.
    ///
    /// Order: regular libraries in merge order, then the main jar (or the
    /// jar-modded placeholder if any jar mods exist), then native libraries.
    /// `architecture` ("32" or "64") picks the `${arch}` native variants.
    pub fn library_files(&self, architecture: &str, paths: &LibraryPaths) -> LibraryFiles {
        self.library_files_for_os(current_os_name(), architecture, paths)
    }

    pub fn library_files_for_os(
        &self,
        os: &str,
        architecture: &str,
        paths: &LibraryPaths,
    ) -> LibraryFiles {
        let mut buckets = FileBuckets::default();

        for library in self.libraries() {
            buckets.collect(library, os, paths);
        }

        if let Some(main_jar) = self.main_jar() {
            if self.jar_mods().is_empty() {
                buckets.collect(main_jar, os, paths);
            } else {
                buckets.jars.push(paths.jar_mods_dir.join(JAR_MODDED_MAIN_JAR));
            }
        }

        for library in self.native_libraries() {
            buckets.collect(library, os, paths);
        }

        let mut natives = buckets.natives;
        match architecture {
            "32" => natives.extend(buckets.natives32),
            "64" => natives.extend(buckets.natives64),
            _ => {}
        }

        LibraryFiles {
            classpath: buckets.jars,
            natives,
        }
    }

    /// Human-readable summary written to the launch log.
    pub fn verbose_description(&self, architecture: &str, paths: &LibraryPaths) -> Vec<String> {
        let mut out = vec![
            "Main Class:".to_string(),
            format!("  {}", self.main_class()),
            String::new(),
        ];

        if !self.traits().is_empty() {
            out.push("Traits:".to_string());
            out.extend(self.traits().iter().map(|t| format!("  {t}")));
            out.push(String::new());
        }

        let files = self.library_files(architecture, paths);
        out.push("Libraries:".to_string());
        out.extend(files.classpath.iter().map(|p| describe_file(p)));
        out.push(String::new());
        out.push("Native libraries:".to_string());
        out.extend(files.natives.iter().map(|p| describe_file(p)));
        out.push(String::new());

        if !self.mods().is_empty() {
            out.push("Mods:".to_string());
            out.extend(self.mods().iter().map(|m| format!("  {}", m.display_name())));
            out.push(String::new());
        }

        if !self.jar_mods().is_empty() {
            out.push("Jar Mods:".to_string());
            for jar_mod in self.jar_mods() {
                let display = jar_mod.display_name();
                let real = jar_mod.storage_path().display().to_string();
                if display == real {
                    out.push(format!("  {real}"));
                } else {
                    out.push(format!("  {display} ({real})"));
                }
            }
            out.push(String::new());
        }

        out.push("Params:".to_string());
        out.push(format!("  {}", self.minecraft_arguments()));
        out.push(String::new());
        out
    }
}

fn describe_file(path: &Path) -> String {
    if path.exists() {
        format!("  {}", path.display())
    } else {
        format!("  {} (missing)", path.display())
    }
}

/// Platform-specific Java classpath separator.
pub fn get_classpath_separator() -> &'static str {
    if cfg!(target_os = "windows") {
        ";"
    } else {
        ":"
    }
}

/// Join classpath entries with the platform separator.
pub fn classpath_string(files: &LibraryFiles) -> String {
    files
        .classpath
        .iter()
        .map(|p| p.to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join(get_classpath_separator())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn paths() -> LibraryPaths {
        LibraryPaths {
            libraries_dir: PathBuf::from("/libs"),
            local_libraries_dir: PathBuf::from("/inst/libraries"),
            jar_mods_dir: PathBuf::from("/inst/jarmods"),
        }
    }

    // Declared for both linux and the host so merging accepts it anywhere.
    fn native(name: &str, classifier: &str) -> Library {
        let mut lib = Library::new(name);
        lib.natives = Some(BTreeMap::from([
            ("linux".to_string(), classifier.to_string()),
            (current_os_name().to_string(), classifier.to_string()),
        ]));
        lib
    }

    fn profile_with_main_jar() -> LaunchProfile {
        let mut profile = LaunchProfile::new();
        profile.apply_library(&Library::new("a:first:1"));
        profile.apply_library(&Library::new("b:second:1"));
        profile.apply_main_jar(Some(&Library::new("com.mojang:minecraft:1.12.2:client")));
        profile
    }

    #[test]
    fn libraries_then_main_jar_then_natives() {
        let mut profile = profile_with_main_jar();
        profile.apply_library(&native("org.lwjgl:lwjgl-platform:2.9.4", "natives-linux"));

        let files = profile.library_files_for_os("linux", "64", &paths());
        assert_eq!(
            files.classpath,
            vec![
                PathBuf::from("/libs/a/first/1/first-1.jar"),
                PathBuf::from("/libs/b/second/1/second-1.jar"),
                PathBuf::from("/libs/com/mojang/minecraft/1.12.2/minecraft-1.12.2-client.jar"),
            ]
        );
        assert_eq!(
            files.natives,
            vec![PathBuf::from(
                "/libs/org/lwjgl/lwjgl-platform/2.9.4/lwjgl-platform-2.9.4-natives-linux.jar"
            )]
        );
    }

    #[test]
    fn jar_mods_replace_main_jar_with_placeholder() {
        let mut profile = profile_with_main_jar();
        profile.apply_jar_mods(&[Library::new("jarmods:optifine:1")]);

        let files = profile.library_files_for_os("linux", "64", &paths());
        assert_eq!(
            files.classpath.last(),
            Some(&PathBuf::from("/inst/jarmods/minecraft.jar"))
        );
        assert_eq!(files.classpath.len(), 3);
    }

    #[test]
    fn natives_follow_architecture() {
        let mut profile = LaunchProfile::new();
        profile.apply_library(&native("tv.twitch:twitch:5.16", "natives-linux-${arch}"));
        profile.apply_library(&native("org.lwjgl:lwjgl:2.9.4", "natives-linux"));

        let x64 = profile.library_files_for_os("linux", "64", &paths());
        assert_eq!(
            x64.natives,
            vec![
                PathBuf::from("/libs/org/lwjgl/lwjgl/2.9.4/lwjgl-2.9.4-natives-linux.jar"),
                PathBuf::from("/libs/tv/twitch/twitch/5.16/twitch-5.16-natives-linux-64.jar"),
            ]
        );

        let x32 = profile.library_files_for_os("linux", "32", &paths());
        assert!(x32.natives[1].ends_with("twitch-5.16-natives-linux-32.jar"));

        let unknown = profile.library_files_for_os("linux", "arm", &paths());
        assert_eq!(unknown.natives.len(), 1);
    }

    #[test]
    fn local_libraries_resolve_against_instance() {
        let mut local = Library::new("custom:thing:1");
        local.hint = Some(crate::core::version::LibraryHint::Local);
        local.filename = Some("thing.jar".into());

        let mut profile = LaunchProfile::new();
        profile.apply_library(&local);
        let files = profile.library_files_for_os("linux", "64", &paths());
        assert_eq!(files.classpath, vec![PathBuf::from("/inst/libraries/thing.jar")]);
    }

    #[test]
    fn verbose_description_marks_missing_files() {
        let mut profile = profile_with_main_jar();
        profile.apply_main_class("net.minecraft.client.main.Main");
        profile.apply_jar_mods(&[{
            let mut m = Library::new("jarmods:optifine:1");
            m.display_name = Some("OptiFine".into());
            m.filename = Some("optifine.jar".into());
            m
        }]);

        let lines = profile.verbose_description("64", &paths());
        assert_eq!(lines[1], "  net.minecraft.client.main.Main");
        assert!(lines.iter().any(|l| l.ends_with("(missing)")));
        assert!(lines.iter().any(|l| l == "  OptiFine (optifine.jar)"));
    }

    #[test]
    fn classpath_string_uses_platform_separator() {
        let files = LibraryFiles {
            classpath: vec![PathBuf::from("a.jar"), PathBuf::from("b.jar")],
            natives: vec![],
        };
        let joined = classpath_string(&files);
        assert_eq!(joined, format!("a.jar{}b.jar", get_classpath_separator()));
    }
}
