pub mod library;
pub mod patch;

pub use library::{
    current_os_name, LibDownloadArtifact, Library, LibraryDownloads, LibraryHint, LibraryRule,
    NativeFiles, OsRule, RuleAction,
};
pub use patch::{
    AssetIndexRef, PatchMeta, PatchOrigin, PatchProblem, ProblemSeverity, Require, VersionPatch,
};
