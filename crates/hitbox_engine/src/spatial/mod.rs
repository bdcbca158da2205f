//! Spatial partitioning data structures
//!
//! Each layer is divided into a fixed grid of chunks. Chunks bucket entity
//! IDs per collision group so the broad phase only pairs up groups that can
//! interact, and flag whether they contain wall subtiles so wall collision
//! checks can be skipped for open ground.

mod chunk;
mod collision_groups;
mod layer;

pub use chunk::{Chunk, ChunkIndex};
pub use collision_groups::{build_collision_group_pairs, collision_groups_can_collide, CollisionGroup};
pub use layer::{Layer, LayerId};
