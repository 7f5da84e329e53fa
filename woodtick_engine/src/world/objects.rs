use std::time::Duration;

use serde::Serialize;
use woodtick_formats::{ObjectDef, UseDirection, Vec2, VerbId};

use super::actors::Animation;

#[derive(Debug, Clone, Serialize)]
pub struct ObjectState {
    pub id: String,
    pub name: String,
    pub position: Vec2,
    pub use_offset: Vec2,
    pub use_direction: UseDirection,
    pub flags: u32,
    pub default_verb: Option<VerbId>,
    pub owner: Option<String>,
    pub animation: Option<Animation>,
}

impl ObjectState {
    pub fn from_def(def: &ObjectDef) -> Self {
        Self {
            id: def.id.clone(),
            name: def.name.clone().unwrap_or_else(|| def.id.clone()),
            position: def.position,
            use_offset: def.use_offset,
            use_direction: def.use_direction,
            flags: def.flags,
            default_verb: def.default_verb,
            owner: def.owner.clone(),
            animation: None,
        }
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    pub fn in_inventory(&self) -> bool {
        self.owner.is_some()
    }

    pub fn play(&mut self, name: &str, length: Option<Duration>) {
        self.animation = Some(Animation::new(name, length));
    }

    /// Returns the animation that just ran out, if any.
    pub fn update(&mut self, elapsed: Duration) -> Option<String> {
        let animation = self.animation.as_mut()?;
        if animation.advance(elapsed) {
            self.animation.take().map(|done| done.name)
        } else {
            None
        }
    }
}
