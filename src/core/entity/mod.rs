pub mod flat;
pub mod model;
pub mod registry;
pub mod tree;
pub mod version;
pub mod version_list;

pub use flat::FlatEntityList;
pub use model::{Entity, EntityKind};
pub use registry::{CancelHandle, EntityRegistry, UpdateAllTask};
pub use tree::{EntityTree, NodeData, NodeHandle, TreeChange};
pub use version::{
    default_comparator, EntityVersion, ProviderKind, ScriptedVersion, SolderVersion,
    VersionComparator, VersionOrigin,
};
pub use version_list::{LoadCompletion, LoadStatus, LoadWaiter, VersionDelta, VersionList};
