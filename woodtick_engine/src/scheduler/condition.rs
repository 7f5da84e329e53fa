use std::time::Duration;

use serde::Serialize;

use super::ThreadId;
use crate::world::SoundId;

/// Read-only view of engine state that completion predicates sample once per
/// tick. `None` answers mean the target no longer exists.
pub trait WorldView {
    fn actor_walking(&self, actor: &str) -> Option<bool>;
    fn actor_talking(&self, actor: &str) -> Option<bool>;
    fn any_actor_talking(&self) -> bool;
    /// Animation the actor is currently playing, if any.
    fn actor_animation(&self, actor: &str) -> Option<&str>;
    fn object_animating(&self, object: &str) -> Option<bool>;
    fn camera_moving(&self) -> bool;
    fn dialog_active(&self) -> bool;
    fn cutscene_active(&self) -> bool;
    fn input_active(&self) -> bool;
    fn sound_playing(&self, sound: SoundId) -> Option<bool>;
    fn thread_running(&self, thread: ThreadId) -> bool;
}

/// Completion predicate of a continuation, tagged by what it waits for.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    Immediate,
    Frames { remaining: u64 },
    Elapsed { remaining: Duration },
    ActorWalking { actor: String },
    ActorTalking { actor: String },
    AnyActorTalking,
    ActorAnimating { actor: String, animation: String },
    ObjectAnimating { object: String },
    CameraMoving,
    DialogActive,
    CutsceneActive,
    InputDisabled,
    SoundPlaying { sound: SoundId },
    ThreadRunning { thread: ThreadId },
}

impl Condition {
    /// Due on the `count`-th poll; a count of zero is due on the first.
    /// Polls that never happen, such as while paused, do not count.
    pub fn frames(count: u64) -> Self {
        Condition::Frames { remaining: count }
    }

    pub fn elapsed(duration: Duration) -> Self {
        Condition::Elapsed {
            remaining: duration,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Condition::Immediate => "immediate",
            Condition::Frames { .. } => "frames",
            Condition::Elapsed { .. } => "elapsed",
            Condition::ActorWalking { .. } => "actor_walking",
            Condition::ActorTalking { .. } => "actor_talking",
            Condition::AnyActorTalking => "any_actor_talking",
            Condition::ActorAnimating { .. } => "actor_animating",
            Condition::ObjectAnimating { .. } => "object_animating",
            Condition::CameraMoving => "camera_moving",
            Condition::DialogActive => "dialog_active",
            Condition::CutsceneActive => "cutscene_active",
            Condition::InputDisabled => "input_disabled",
            Condition::SoundPlaying { .. } => "sound_playing",
            Condition::ThreadRunning { .. } => "thread_running",
        }
    }

    /// Samples the predicate for this tick. Frame and elapsed-time conditions
    /// count down per poll; every other kind only reads `world`. A target
    /// that vanished counts as complete.
    pub fn poll<P>(&mut self, world: &P, elapsed: Duration) -> bool
    where
        P: WorldView + ?Sized,
    {
        match self {
            Condition::Immediate => true,
            Condition::Frames { remaining } => {
                *remaining = remaining.saturating_sub(1);
                *remaining == 0
            }
            Condition::Elapsed { remaining } => {
                *remaining = remaining.saturating_sub(elapsed);
                remaining.is_zero()
            }
            Condition::ActorWalking { actor } => !world.actor_walking(actor).unwrap_or(false),
            Condition::ActorTalking { actor } => !world.actor_talking(actor).unwrap_or(false),
            Condition::AnyActorTalking => !world.any_actor_talking(),
            Condition::ActorAnimating { actor, animation } => {
                world.actor_animation(actor) != Some(animation.as_str())
            }
            Condition::ObjectAnimating { object } => !world.object_animating(object).unwrap_or(false),
            Condition::CameraMoving => !world.camera_moving(),
            Condition::DialogActive => !world.dialog_active(),
            Condition::CutsceneActive => !world.cutscene_active(),
            Condition::InputDisabled => world.input_active(),
            Condition::SoundPlaying { sound } => !world.sound_playing(*sound).unwrap_or(false),
            Condition::ThreadRunning { thread } => !world.thread_running(*thread),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::{BTreeMap, BTreeSet};
    use std::time::Duration;

    use super::{Condition, WorldView};
    use crate::scheduler::ThreadId;
    use crate::world::SoundId;

    /// Hand-driven world used by scheduler and pipeline tests. `frame` only
    /// counts the ticks a test has driven.
    #[derive(Debug, Default)]
    pub(crate) struct StubWorld {
        pub(crate) frame: u64,
        pub(crate) walking: BTreeMap<String, bool>,
        pub(crate) talking: BTreeMap<String, bool>,
        pub(crate) animations: BTreeMap<String, String>,
        pub(crate) animating_objects: BTreeSet<String>,
        pub(crate) camera_moving: bool,
        pub(crate) dialog: bool,
        pub(crate) cutscene: bool,
        pub(crate) input_off: bool,
        pub(crate) sounds: BTreeSet<SoundId>,
        pub(crate) threads: BTreeSet<ThreadId>,
    }

    impl WorldView for StubWorld {
        fn actor_walking(&self, actor: &str) -> Option<bool> {
            self.walking.get(actor).copied()
        }

        fn actor_talking(&self, actor: &str) -> Option<bool> {
            self.talking.get(actor).copied()
        }

        fn any_actor_talking(&self) -> bool {
            self.talking.values().any(|talking| *talking)
        }

        fn actor_animation(&self, actor: &str) -> Option<&str> {
            self.animations.get(actor).map(String::as_str)
        }

        fn object_animating(&self, object: &str) -> Option<bool> {
            Some(self.animating_objects.contains(object))
        }

        fn camera_moving(&self) -> bool {
            self.camera_moving
        }

        fn dialog_active(&self) -> bool {
            self.dialog
        }

        fn cutscene_active(&self) -> bool {
            self.cutscene
        }

        fn input_active(&self) -> bool {
            !self.input_off
        }

        fn sound_playing(&self, sound: SoundId) -> Option<bool> {
            self.sounds.contains(&sound).then_some(true)
        }

        fn thread_running(&self, thread: ThreadId) -> bool {
            self.threads.contains(&thread)
        }
    }

    #[test]
    fn frame_condition_counts_polls() {
        let world = StubWorld::default();
        let mut condition = Condition::frames(2);
        assert!(!condition.poll(&world, Duration::ZERO));
        assert_eq!(condition, Condition::Frames { remaining: 1 });
        assert!(condition.poll(&world, Duration::ZERO));
    }

    #[test]
    fn zero_frame_wait_is_due_on_first_poll() {
        let world = StubWorld::default();
        assert!(Condition::frames(0).poll(&world, Duration::ZERO));
        assert!(Condition::frames(1).poll(&world, Duration::ZERO));
    }

    #[test]
    fn elapsed_condition_accumulates_tick_time() {
        let world = StubWorld::default();
        let mut condition = Condition::elapsed(Duration::from_millis(25));
        assert!(!condition.poll(&world, Duration::from_millis(10)));
        assert!(!condition.poll(&world, Duration::from_millis(10)));
        assert!(condition.poll(&world, Duration::from_millis(10)));
    }

    #[test]
    fn missing_targets_count_as_complete() {
        let world = StubWorld::default();
        let mut walking = Condition::ActorWalking {
            actor: "ghost".to_string(),
        };
        let mut sound = Condition::SoundPlaying { sound: 250_001 };
        let mut thread = Condition::ThreadRunning { thread: 300_001 };
        assert!(walking.poll(&world, Duration::ZERO));
        assert!(sound.poll(&world, Duration::ZERO));
        assert!(thread.poll(&world, Duration::ZERO));
    }

    #[test]
    fn animation_condition_ends_when_animation_changes() {
        let mut world = StubWorld::default();
        world
            .animations
            .insert("guybrush".to_string(), "reach_low".to_string());
        let mut condition = Condition::ActorAnimating {
            actor: "guybrush".to_string(),
            animation: "reach_low".to_string(),
        };
        assert!(!condition.poll(&world, Duration::ZERO));
        world
            .animations
            .insert("guybrush".to_string(), "walk".to_string());
        assert!(condition.poll(&world, Duration::ZERO));
    }

    #[test]
    fn input_condition_waits_for_input_to_return() {
        let mut world = StubWorld {
            input_off: true,
            ..StubWorld::default()
        };
        let mut condition = Condition::InputDisabled;
        assert!(!condition.poll(&world, Duration::ZERO));
        world.input_off = false;
        assert!(condition.poll(&world, Duration::ZERO));
        assert_eq!(condition.kind(), "input_disabled");
    }
}
