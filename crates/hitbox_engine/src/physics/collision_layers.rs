//! Collision bit/mask filtering for hitboxes
//!
//! Every hitbox carries a collision bit (what it is) and a collision mask
//! (what it reacts to). Two hitboxes only collide when each one's bit is in
//! the other's mask. A mismatch is never an error: it is how friendly
//! projectiles and carried entities pass through each other.

use bitflags::bitflags;

bitflags! {
    /// Collision bit / mask flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CollisionBits: u32 {
        /// Generic creatures, players and objects
        const DEFAULT = 1 << 0;
        /// Static world structures (walls, trees, buildings)
        const STRUCTURE = 1 << 1;
        /// Projectiles in flight
        const PROJECTILE = 1 << 2;
        /// Plants and other things creatures can stand in
        const PLANT = 1 << 3;
        /// Items lying on the ground
        const ITEM = 1 << 4;
        /// Hitboxes that only exist to detect overlaps
        const SENSOR = 1 << 5;
        /// Creatures currently carried or mounted
        const CARRIED = 1 << 6;
    }
}

impl CollisionBits {
    /// No collision bits
    pub const NONE: Self = Self::empty();

    /// Check if two hitboxes should collide based on their bits and masks
    ///
    /// # Example
    /// ```
    /// use hitbox_engine::physics::CollisionBits;
    ///
    /// let creature_bit = CollisionBits::DEFAULT;
    /// let creature_mask = CollisionBits::all();
    /// let arrow_bit = CollisionBits::PROJECTILE;
    /// let arrow_mask = CollisionBits::DEFAULT | CollisionBits::STRUCTURE;
    ///
    /// assert!(CollisionBits::should_collide(creature_bit, creature_mask, arrow_bit, arrow_mask));
    /// ```
    pub fn should_collide(bit_a: Self, mask_a: Self, bit_b: Self, mask_b: Self) -> bool {
        // A's bit must be in B's mask AND B's bit must be in A's mask
        bit_a.intersects(mask_b) && bit_b.intersects(mask_a)
    }
}
