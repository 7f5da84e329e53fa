//! Data definitions shared by the Woodtick runtime: verb table, object flag
//! bits and the JSON scene format.

pub mod flags;
pub mod scene;
pub mod verbs;

pub use flags::{object_flags, Facing, ReachPose, UseDirection, UseFlag};
pub use scene::{ActorDef, ObjectDef, SceneError, SceneFile, Vec2};
pub use verbs::{parse_verb, VerbDescriptor, VerbId, VerbTable};
