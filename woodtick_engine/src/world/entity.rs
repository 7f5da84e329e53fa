use std::fmt;

use serde::Serialize;
use woodtick_formats::{Facing, UseDirection, Vec2, VerbId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Actor,
    Object,
}

/// Script hook names that differ by entity kind.
#[derive(Debug)]
pub struct HookNames {
    pub pre_walk: &'static str,
    pub post_walk: &'static str,
}

const ACTOR_HOOKS: HookNames = HookNames {
    pre_walk: "actorPreWalk",
    post_walk: "actorPostWalk",
};

const OBJECT_HOOKS: HookNames = HookNames {
    pre_walk: "objectPreWalk",
    post_walk: "objectPostWalk",
};

impl EntityKind {
    pub fn hooks(self) -> &'static HookNames {
        match self {
            EntityKind::Actor => &ACTOR_HOOKS,
            EntityKind::Object => &OBJECT_HOOKS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Actor => "actor",
            EntityKind::Object => "object",
        }
    }
}

/// Kind-tagged reference to a scene entity by id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: String,
}

impl EntityRef {
    pub fn actor(id: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Actor,
            id: id.into(),
        }
    }

    pub fn object(id: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Object,
            id: id.into(),
        }
    }

    pub fn is_actor(&self) -> bool {
        self.kind == EntityKind::Actor
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Snapshot of the attributes sentence building reads from an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityInfo {
    pub entity: EntityRef,
    pub position: Vec2,
    pub use_offset: Vec2,
    pub flags: u32,
    pub default_verb: Option<VerbId>,
    /// Objects only.
    pub use_direction: Option<UseDirection>,
    /// Actors only.
    pub facing: Option<Facing>,
    pub in_inventory: bool,
}

impl EntityInfo {
    /// Where an actor stands to use this entity.
    pub fn use_position(&self) -> Vec2 {
        self.position + self.use_offset
    }

    /// Direction an actor faces once arrived: the object's use direction,
    /// or turned towards an actor target.
    pub fn approach_facing(&self) -> Facing {
        match (self.use_direction, self.facing) {
            (Some(direction), _) => direction.into(),
            (None, Some(facing)) => facing.opposite(),
            (None, None) => Facing::Front,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hook_names_dispatch_on_kind() {
        assert_eq!(EntityKind::Actor.hooks().pre_walk, "actorPreWalk");
        assert_eq!(EntityKind::Object.hooks().post_walk, "objectPostWalk");
    }

    #[test]
    fn approach_facing_turns_towards_actors() {
        let info = EntityInfo {
            entity: EntityRef::actor("largo"),
            position: Vec2::new(10.0, 0.0),
            use_offset: Vec2::new(-5.0, 0.0),
            flags: 0,
            default_verb: None,
            use_direction: None,
            facing: Some(Facing::Left),
            in_inventory: false,
        };
        assert_eq!(info.approach_facing(), Facing::Right);
        assert_eq!(info.use_position(), Vec2::new(5.0, 0.0));

        let door = EntityInfo {
            entity: EntityRef::object("door"),
            use_direction: Some(UseDirection::Back),
            facing: None,
            ..info
        };
        assert_eq!(door.approach_facing(), Facing::Back);
    }
}
