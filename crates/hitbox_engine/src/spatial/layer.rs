//! Layers: independent chunk grids with wall subtiles

use std::ops::RangeInclusive;

use crate::config::PhysicsConfig;
use crate::foundation::math::{Aabb, Vec2};
use crate::physics::collision::CollisionBox;
use crate::physics::hitbox::ChunkBounds;
use crate::spatial::{Chunk, ChunkIndex};

/// Index of a layer within the world
pub type LayerId = usize;

/// A square board of chunks. Entities on different layers never collide.
#[derive(Debug, Clone)]
pub struct Layer {
    id: LayerId,
    chunks_per_side: usize,
    chunk_size: f32,
    world_size: f32,
    subtile_size: f32,
    subtiles_per_side: usize,
    chunks: Vec<Chunk>,
    wall_subtiles: Vec<bool>,
}

impl Layer {
    /// Create an empty layer sized from the config
    pub fn new(id: LayerId, config: &PhysicsConfig) -> Self {
        let chunks_per_side = config.chunks_per_side();
        let subtiles_per_side = config.subtiles_per_side();

        let mut chunks = Vec::with_capacity(chunks_per_side * chunks_per_side);
        for y in 0..chunks_per_side {
            for x in 0..chunks_per_side {
                chunks.push(Chunk::new(x, y));
            }
        }

        Self {
            id,
            chunks_per_side,
            chunk_size: config.chunk_size(),
            world_size: config.world_size(),
            subtile_size: config.subtile_size(),
            subtiles_per_side,
            chunks,
            wall_subtiles: vec![false; subtiles_per_side * subtiles_per_side],
        }
    }

    /// Layer index
    pub fn id(&self) -> LayerId {
        self.id
    }

    /// Number of chunks along each side
    pub fn chunks_per_side(&self) -> usize {
        self.chunks_per_side
    }

    /// Side length of the layer in world units
    pub fn world_size(&self) -> f32 {
        self.world_size
    }

    /// World-space extent of the layer
    pub fn bounds(&self) -> Aabb {
        Aabb::new(Vec2::zeros(), Vec2::new(self.world_size, self.world_size))
    }

    /// All chunks, row-major
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Chunk by index
    pub fn chunk(&self, index: ChunkIndex) -> Option<&Chunk> {
        self.chunks.get(index)
    }

    pub(crate) fn chunk_mut(&mut self, index: ChunkIndex) -> Option<&mut Chunk> {
        self.chunks.get_mut(index)
    }

    /// Index of the chunk at column `x`, row `y`
    pub fn chunk_index(&self, x: usize, y: usize) -> ChunkIndex {
        y * self.chunks_per_side + x
    }

    fn chunk_coordinate(&self, value: f32) -> i32 {
        let max = self.chunks_per_side as i32 - 1;
        ((value / self.chunk_size).floor() as i32).clamp(0, max)
    }

    /// Chunk-space extent of a world-space box, clamped to the layer
    pub fn chunk_bounds(&self, area: &Aabb) -> ChunkBounds {
        ChunkBounds {
            min_x: self.chunk_coordinate(area.min.x),
            max_x: self.chunk_coordinate(area.max.x),
            min_y: self.chunk_coordinate(area.min.y),
            max_y: self.chunk_coordinate(area.max.y),
        }
    }

    /// Indices of every chunk in a chunk-space extent
    pub fn chunk_indices(&self, bounds: ChunkBounds) -> impl Iterator<Item = ChunkIndex> + '_ {
        (bounds.min_y..=bounds.max_y).flat_map(move |y| {
            (bounds.min_x..=bounds.max_x).map(move |x| self.chunk_index(x as usize, y as usize))
        })
    }

    /// Indices of every chunk a world-space box overlaps
    pub fn chunks_overlapping(&self, area: &Aabb) -> Vec<ChunkIndex> {
        if area.is_empty() {
            return Vec::new();
        }
        self.chunk_indices(self.chunk_bounds(area)).collect()
    }

    /// Number of subtiles along each side
    pub fn subtiles_per_side(&self) -> usize {
        self.subtiles_per_side
    }

    /// Side length of a subtile in world units
    pub fn subtile_size(&self) -> f32 {
        self.subtile_size
    }

    fn subtile_index(&self, x: i32, y: i32) -> Option<usize> {
        let side = self.subtiles_per_side as i32;
        if x < 0 || y < 0 || x >= side || y >= side {
            return None;
        }
        Some(y as usize * self.subtiles_per_side + x as usize)
    }

    /// Whether the subtile at `(x, y)` is a wall. Out-of-range subtiles are open.
    pub fn is_wall_subtile(&self, x: i32, y: i32) -> bool {
        self.subtile_index(x, y)
            .is_some_and(|index| self.wall_subtiles[index])
    }

    /// Mark or clear a wall subtile, keeping the owning chunk's wall flag in sync
    ///
    /// Returns `false` if the subtile lies outside the layer.
    pub fn set_wall_subtile(&mut self, x: i32, y: i32, is_wall: bool) -> bool {
        let Some(index) = self.subtile_index(x, y) else {
            return false;
        };
        self.wall_subtiles[index] = is_wall;

        let chunk_x = (x as f32 * self.subtile_size / self.chunk_size) as usize;
        let chunk_y = (y as f32 * self.subtile_size / self.chunk_size) as usize;
        let chunk_index = self.chunk_index(
            chunk_x.min(self.chunks_per_side - 1),
            chunk_y.min(self.chunks_per_side - 1),
        );
        let has_walls = is_wall || self.chunk_has_wall_subtiles(chunk_index);
        if let Some(chunk) = self.chunks.get_mut(chunk_index) {
            chunk.set_has_wall_subtiles(has_walls);
        }
        true
    }

    fn chunk_has_wall_subtiles(&self, chunk_index: ChunkIndex) -> bool {
        let Some(chunk) = self.chunks.get(chunk_index) else {
            return false;
        };
        let range = self.subtile_range(&Aabb::new(
            Vec2::new(chunk.x as f32 * self.chunk_size, chunk.y as f32 * self.chunk_size),
            // Stop just short of the next chunk's first subtile
            Vec2::new(
                (chunk.x + 1) as f32 * self.chunk_size - self.subtile_size * 0.5,
                (chunk.y + 1) as f32 * self.chunk_size - self.subtile_size * 0.5,
            ),
        ));
        let (xs, ys) = range;
        ys.into_iter()
            .any(|y| xs.clone().any(|x| self.is_wall_subtile(x, y)))
    }

    /// Subtile columns and rows touched by a world-space box, clamped to the layer
    pub fn subtile_range(&self, area: &Aabb) -> (RangeInclusive<i32>, RangeInclusive<i32>) {
        let max = self.subtiles_per_side as i32 - 1;
        let to_subtile = |value: f32| ((value / self.subtile_size).floor() as i32).clamp(0, max);
        (
            to_subtile(area.min.x)..=to_subtile(area.max.x),
            to_subtile(area.min.y)..=to_subtile(area.max.y),
        )
    }

    /// Synthetic collision box covering a subtile
    pub fn subtile_box(&self, x: i32, y: i32) -> CollisionBox {
        let half = self.subtile_size * 0.5;
        let center = Vec2::new(x as f32 * self.subtile_size + half, y as f32 * self.subtile_size + half);
        CollisionBox::rectangular(center, self.subtile_size, self.subtile_size)
    }

    /// Number of wall subtiles on the layer
    pub fn wall_subtile_count(&self) -> usize {
        self.wall_subtiles.iter().filter(|&&wall| wall).count()
    }
}
