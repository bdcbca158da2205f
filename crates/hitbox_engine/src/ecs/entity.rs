//! Entity implementation
//!
//! Entities are generational handles into the [`World`](super::World)'s
//! transform arena. A handle to a removed entity never aliases a new one, so
//! cross-entity hitbox links stay safe after removals.

slotmap::new_key_type! {
    /// Entity identifier
    pub struct Entity;
}
