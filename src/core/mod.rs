// ─── Launch Profile Core ───
// Patch merging and entity resolution for a Minecraft launcher.
//
// Architecture:
//   core/
//     version/    — Library + version patch documents
//     maven/      — Artifact coordinates + lenient version ordering
//     launch/     — Profile merge engine, patch sets, classpath assembly
//     entity/     — Entities, version lists, registry, flat + tree projections
//     providers/  — Scripted and Technic Solder providers
//     instance/   — Instance model + CRUD manager
//     events      — Structural change notifications
//     state/      — Settings + application state

pub mod entity;
pub mod error;
pub mod events;
pub mod http;
pub mod instance;
pub mod launch;
pub mod maven;
pub mod providers;
pub mod state;
pub mod version;
