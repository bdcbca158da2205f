//! Coarse entity classification for broad-phase pruning

use serde::{Deserialize, Serialize};

/// Broad-phase collision group of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum CollisionGroup {
    /// Creatures, players and most dynamic objects
    #[default]
    Default,
    /// Static structures that never need checking against each other
    Structure,
    /// Projectiles, which pass through other projectiles
    Projectile,
    /// Purely visual objects
    Decoration,
    /// Never collides
    None,
}

impl CollisionGroup {
    /// Number of collision groups
    pub const COUNT: usize = 5;

    /// Every group, in index order
    pub const ALL: [CollisionGroup; Self::COUNT] = [
        CollisionGroup::Default,
        CollisionGroup::Structure,
        CollisionGroup::Projectile,
        CollisionGroup::Decoration,
        CollisionGroup::None,
    ];

    /// Dense index used for per-group chunk buckets
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Whether entities in `pushed` need to be checked against entities in `pushing`
pub fn collision_groups_can_collide(pushing: CollisionGroup, pushed: CollisionGroup) -> bool {
    use CollisionGroup::{Decoration, Projectile, Structure};

    match (pushing, pushed) {
        (CollisionGroup::None | Decoration, _) | (_, CollisionGroup::None | Decoration) => false,
        (Structure, Structure) | (Projectile, Projectile) => false,
        _ => true,
    }
}

/// Every `(pushing, pushed)` group pair the broad phase must visit
pub fn build_collision_group_pairs() -> Vec<(CollisionGroup, CollisionGroup)> {
    let mut pairs = Vec::new();
    for pushing in CollisionGroup::ALL {
        for pushed in CollisionGroup::ALL {
            if collision_groups_can_collide(pushing, pushed) {
                pairs.push((pushing, pushed));
            }
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_table_matches_predicate() {
        let pairs = build_collision_group_pairs();
        for pushing in CollisionGroup::ALL {
            for pushed in CollisionGroup::ALL {
                assert_eq!(
                    pairs.contains(&(pushing, pushed)),
                    collision_groups_can_collide(pushing, pushed)
                );
            }
        }
    }

    #[test]
    fn test_structures_only_push_movers() {
        assert!(!collision_groups_can_collide(CollisionGroup::Structure, CollisionGroup::Structure));
        assert!(collision_groups_can_collide(CollisionGroup::Structure, CollisionGroup::Default));
        assert!(collision_groups_can_collide(CollisionGroup::Projectile, CollisionGroup::Structure));
        assert!(!collision_groups_can_collide(CollisionGroup::Default, CollisionGroup::Decoration));
    }

    #[test]
    fn test_none_group_collides_with_nothing() {
        for group in CollisionGroup::ALL {
            assert!(!collision_groups_can_collide(CollisionGroup::None, group));
            assert!(!collision_groups_can_collide(group, CollisionGroup::None));
        }
        let pairs = build_collision_group_pairs();
        assert!(pairs
            .iter()
            .all(|&(pushing, pushed)| pushing != CollisionGroup::None && pushed != CollisionGroup::None));
    }

    #[test]
    fn test_indices_are_dense() {
        for (index, group) in CollisionGroup::ALL.iter().enumerate() {
            assert_eq!(group.index(), index);
        }
    }
}
