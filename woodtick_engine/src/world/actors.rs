use std::time::Duration;

use serde::Serialize;
use woodtick_formats::{ActorDef, Facing, Vec2, VerbId};

pub const DEFAULT_WALK_SPEED: f32 = 120.0;
pub const IDLE_ANIMATION: &str = "stand";
pub const WALK_ANIMATION: &str = "walk";
pub const TALK_ANIMATION: &str = "talk";

const SAY_LINE_BASE: Duration = Duration::from_millis(1500);
const SAY_LINE_PER_CHAR: Duration = Duration::from_millis(25);
const SAY_LINE_MIN: Duration = Duration::from_millis(200);

/// How long an actor keeps talking for a line of `text`.
pub fn say_line_duration(text: &str) -> Duration {
    let chars = u32::try_from(text.chars().count()).unwrap_or(u32::MAX);
    (SAY_LINE_BASE + SAY_LINE_PER_CHAR.saturating_mul(chars)).max(SAY_LINE_MIN)
}

#[derive(Debug, Clone, Serialize)]
pub struct Walk {
    pub destination: Vec2,
    pub facing: Option<Facing>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Speech {
    pub line: String,
    pub remaining: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct Animation {
    pub name: String,
    /// `None` keeps playing until replaced.
    pub remaining: Option<Duration>,
}

impl Animation {
    pub fn new(name: &str, length: Option<Duration>) -> Self {
        Self {
            name: name.to_string(),
            remaining: length,
        }
    }

    /// Advances the animation clock; true once it ran out.
    pub fn advance(&mut self, elapsed: Duration) -> bool {
        match self.remaining.as_mut() {
            Some(remaining) => {
                *remaining = remaining.saturating_sub(elapsed);
                remaining.is_zero()
            }
            None => false,
        }
    }
}

/// Things that happened to an actor during one update.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ActorUpdate {
    pub arrived: bool,
    pub finished_talking: bool,
    pub finished_animation: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActorState {
    pub id: String,
    pub name: String,
    pub position: Vec2,
    pub facing: Facing,
    pub walk_speed: f32,
    pub use_offset: Vec2,
    pub flags: u32,
    pub default_verb: Option<VerbId>,
    pub walk: Option<Walk>,
    pub speech: Option<Speech>,
    pub animation: Option<Animation>,
}

impl ActorState {
    pub fn from_def(def: &ActorDef) -> Self {
        Self {
            id: def.id.clone(),
            name: def.name.clone().unwrap_or_else(|| def.id.clone()),
            position: def.position,
            facing: def.facing,
            walk_speed: def.walk_speed.unwrap_or(DEFAULT_WALK_SPEED),
            use_offset: def.use_offset,
            flags: def.flags,
            default_verb: def.default_verb,
            walk: None,
            speech: None,
            animation: None,
        }
    }

    pub fn is_walking(&self) -> bool {
        self.walk.is_some()
    }

    pub fn is_talking(&self) -> bool {
        self.speech.is_some()
    }

    pub fn current_animation(&self) -> Option<&str> {
        self.animation.as_ref().map(|animation| animation.name.as_str())
    }

    pub fn start_walk(&mut self, destination: Vec2, facing: Option<Facing>) {
        self.walk = Some(Walk {
            destination,
            facing,
        });
        self.animation = Some(Animation::new(WALK_ANIMATION, None));
    }

    pub fn say(&mut self, line: &str) {
        self.speech = Some(Speech {
            line: line.to_string(),
            remaining: say_line_duration(line),
        });
    }

    pub fn stop_talking(&mut self) -> bool {
        self.speech.take().is_some()
    }

    /// Plays `name`; the idle animation clears whatever was playing.
    pub fn play(&mut self, name: &str, length: Option<Duration>) {
        self.animation = if name == IDLE_ANIMATION {
            None
        } else {
            Some(Animation::new(name, length))
        };
    }

    pub fn update(&mut self, elapsed: Duration) -> ActorUpdate {
        let mut update = ActorUpdate::default();
        if let Some(walk) = self.walk.as_ref() {
            let step = self.walk_speed * elapsed.as_secs_f32();
            let remaining = self.position.distance(walk.destination);
            if remaining <= step || remaining <= f32::EPSILON {
                self.position = walk.destination;
                if let Some(facing) = walk.facing {
                    self.facing = facing;
                }
                self.walk = None;
                self.animation = None;
                update.arrived = true;
            } else {
                let ratio = step / remaining;
                self.position = Vec2::new(
                    self.position.x + (walk.destination.x - self.position.x) * ratio,
                    self.position.y + (walk.destination.y - self.position.y) * ratio,
                );
            }
        }
        if let Some(speech) = self.speech.as_mut() {
            speech.remaining = speech.remaining.saturating_sub(elapsed);
            if speech.remaining.is_zero() {
                self.speech = None;
                update.finished_talking = true;
            }
        }
        if !update.arrived {
            if let Some(animation) = self.animation.as_mut() {
                if animation.advance(elapsed) {
                    update.finished_animation = self.animation.take().map(|done| done.name);
                }
            }
        }
        update
    }
}
