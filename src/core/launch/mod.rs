pub mod classpath;
pub mod engine;
pub mod profile;

pub use classpath::{classpath_string, get_classpath_separator, LibraryFiles, LibraryPaths};
pub use engine::{apply_patch, apply_to, MoveDirection, PatchSet};
pub use profile::LaunchProfile;
