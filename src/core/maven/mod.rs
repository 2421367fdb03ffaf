mod artifact;
mod version;

pub use artifact::MavenArtifact;
pub use version::{compare_versions, same_artifact, supersedes, LenientVersion};

/// Well-known Maven repositories used by the Minecraft ecosystem.
pub const MOJANG_LIBRARIES: &str = "https://libraries.minecraft.net";
