//! Verb sentence construction and the steps a sentence executes.

mod pipeline;
mod steps;

pub use pipeline::{build_sentence, Abort, SentenceBuild, VerbRequest, REACH_HOLD};
pub use steps::{run_step, VerbStep};

use woodtick_formats::{Facing, UseFlag, Vec2, VerbDescriptor, VerbId};

use crate::world::{EntityInfo, EntityRef};

/// Argument handed to a script hook.
#[derive(Debug, Clone, PartialEq)]
pub enum HookArg {
    Verb(VerbId),
    Entity(EntityRef),
    Nil,
}

impl From<Option<&EntityRef>> for HookArg {
    fn from(entity: Option<&EntityRef>) -> Self {
        entity.map_or(HookArg::Nil, |entity| HookArg::Entity(entity.clone()))
    }
}

/// Result of asking the script side to run a hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookCall {
    /// No such function.
    Missing,
    /// The function raised an error.
    Failed,
    /// The function ran; carries the truthiness of its first return value.
    Returned(bool),
}

impl HookCall {
    pub fn ran(self) -> bool {
        matches!(self, HookCall::Returned(_))
    }

    pub fn handled(self) -> bool {
        self == HookCall::Returned(true)
    }
}

/// Where a hook function is looked up.
#[derive(Debug, Clone, Copy)]
pub enum HookTarget<'a> {
    Entity(&'a EntityRef),
    Global,
    DefaultObject,
}

/// Everything the sentence pipeline needs from the engine and the script VM.
pub trait VerbHost {
    fn verb(&self, id: VerbId) -> Option<VerbDescriptor>;
    fn entity(&self, entity: &EntityRef) -> Option<EntityInfo>;
    fn current_actor(&self) -> Option<String>;
    fn walk_to(&mut self, actor: &str, destination: Vec2, facing: Facing);
    fn play_pose(&mut self, actor: &str, animation: &str);
    fn request_use_mode(&mut self, flag: UseFlag, entity: &EntityRef);
    /// Moves `object` into `receiver`'s inventory.
    fn give_to(&mut self, object: &EntityRef, receiver: &EntityRef);
    fn restore_default_verb(&mut self);
    fn has_hook(&self, target: HookTarget<'_>, name: &str) -> bool;
    fn call_hook(&mut self, target: HookTarget<'_>, name: &str, args: &[HookArg]) -> HookCall;
    fn record(&mut self, event: String);
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use woodtick_formats::verbs::{
        VERB_GIVE, VERB_LOOKAT, VERB_OPEN, VERB_PICKUP, VERB_TALKTO, VERB_USE,
    };
    use woodtick_formats::{object_flags, UseDirection, VerbTable};

    use super::*;
    use crate::scheduler::StubWorld;
    use crate::sentence::{Sentence, StepFlow};

    const TICK: Duration = Duration::from_millis(10);

    struct FakeHost {
        world: StubWorld,
        verbs: VerbTable,
        entities: BTreeMap<String, EntityInfo>,
        actor: Option<String>,
        hooks: BTreeMap<(String, String), HookCall>,
        calls: Vec<String>,
        log: Vec<String>,
    }

    fn owner_key(target: HookTarget<'_>) -> String {
        match target {
            HookTarget::Entity(entity) => entity.id.clone(),
            HookTarget::Global => "_G".to_string(),
            HookTarget::DefaultObject => "defaultObject".to_string(),
        }
    }

    impl FakeHost {
        fn new() -> Self {
            let mut host = FakeHost {
                world: StubWorld::default(),
                verbs: VerbTable::default(),
                entities: BTreeMap::new(),
                actor: Some("guybrush".to_string()),
                hooks: BTreeMap::new(),
                calls: Vec::new(),
                log: Vec::new(),
            };
            host.add_actor("guybrush", Vec2::ZERO);
            host.add_actor("largo", Vec2::new(80.0, 0.0));
            host
        }

        fn add_actor(&mut self, id: &str, position: Vec2) {
            self.entities.insert(
                id.to_string(),
                EntityInfo {
                    entity: EntityRef::actor(id),
                    position,
                    use_offset: Vec2::ZERO,
                    flags: 0,
                    default_verb: None,
                    use_direction: None,
                    facing: Some(Facing::Left),
                    in_inventory: false,
                },
            );
        }

        fn add_object(&mut self, id: &str, flags: u32, in_inventory: bool) {
            self.entities.insert(
                id.to_string(),
                EntityInfo {
                    entity: EntityRef::object(id),
                    position: Vec2::new(40.0, 10.0),
                    use_offset: Vec2::new(0.0, -10.0),
                    flags,
                    default_verb: None,
                    use_direction: Some(UseDirection::Back),
                    facing: None,
                    in_inventory,
                },
            );
        }

        fn hook(&mut self, owner: &str, name: &str, result: HookCall) {
            self.hooks
                .insert((owner.to_string(), name.to_string()), result);
        }

        /// Drives a sentence to completion; walkers arrive one tick after
        /// they start. Returns the names of the steps that fired.
        fn drive(&mut self, mut sentence: Sentence<VerbStep>) -> Vec<&'static str> {
            let mut fired = Vec::new();
            for _ in 0..200 {
                if sentence.is_complete() {
                    break;
                }
                self.world.frame += 1;
                let step = sentence.poll_front(&self.world, TICK);
                for walking in self.world.walking.values_mut() {
                    *walking = false;
                }
                if let Some(step) = step {
                    fired.push(step.name());
                    if run_step(self, step) == StepFlow::Stop {
                        sentence.stop();
                    }
                }
            }
            fired
        }
    }

    impl VerbHost for FakeHost {
        fn verb(&self, id: VerbId) -> Option<VerbDescriptor> {
            self.verbs.get(id).cloned()
        }

        fn entity(&self, entity: &EntityRef) -> Option<EntityInfo> {
            self.entities.get(&entity.id).cloned()
        }

        fn current_actor(&self) -> Option<String> {
            self.actor.clone()
        }

        fn walk_to(&mut self, actor: &str, destination: Vec2, facing: Facing) {
            self.world.walking.insert(actor.to_string(), true);
            self.log.push(format!(
                "walk {actor} ({}, {}) {}",
                destination.x,
                destination.y,
                facing.as_str()
            ));
        }

        fn play_pose(&mut self, actor: &str, animation: &str) {
            self.log.push(format!("pose {actor} {animation}"));
        }

        fn request_use_mode(&mut self, flag: UseFlag, entity: &EntityRef) {
            self.log.push(format!("use_mode {} {entity}", flag.as_str()));
        }

        fn give_to(&mut self, object: &EntityRef, receiver: &EntityRef) {
            self.log.push(format!("give_to {object} {receiver}"));
        }

        fn restore_default_verb(&mut self) {
            self.log.push("restore".to_string());
        }

        fn has_hook(&self, target: HookTarget<'_>, name: &str) -> bool {
            self.hooks
                .get(&(owner_key(target), name.to_string()))
                .is_some_and(|call| *call != HookCall::Missing)
        }

        fn call_hook(&mut self, target: HookTarget<'_>, name: &str, _args: &[HookArg]) -> HookCall {
            let key = (owner_key(target), name.to_string());
            self.calls.push(format!("{}.{}", key.0, key.1));
            self.hooks.get(&key).copied().unwrap_or(HookCall::Missing)
        }

        fn record(&mut self, event: String) {
            self.log.push(event);
        }
    }

    fn request(verb: Option<VerbId>, target: EntityRef, second: Option<EntityRef>) -> VerbRequest {
        VerbRequest {
            verb,
            target,
            second,
        }
    }

    fn ready(build: SentenceBuild) -> Sentence<VerbStep> {
        match build {
            SentenceBuild::Ready(sentence) => sentence,
            other => panic!("expected a sentence, got {other:?}"),
        }
    }

    #[test]
    fn use_with_single_target_requests_use_mode() {
        let mut host = FakeHost::new();
        host.add_object("rope", object_flags::USE_WITH, true);
        let build = build_sentence(
            &mut host,
            &request(Some(VERB_USE), EntityRef::object("rope"), None),
        );
        assert!(matches!(build, SentenceBuild::UseMode(UseFlag::UseWith)));
        assert_eq!(host.log, vec!["use_mode use_with rope"]);
        assert!(host.calls.is_empty());
    }

    #[test]
    fn combined_use_flags_build_a_sentence() {
        let mut host = FakeHost::new();
        host.add_object(
            "rope",
            object_flags::USE_WITH | object_flags::USE_ON,
            true,
        );
        let build = build_sentence(
            &mut host,
            &request(Some(VERB_USE), EntityRef::object("rope"), None),
        );
        assert!(matches!(build, SentenceBuild::Ready(_)));
    }

    #[test]
    fn use_with_two_targets_walks_then_executes() {
        let mut host = FakeHost::new();
        host.add_object("rope", object_flags::USE_WITH, true);
        host.add_object("bucket", 0, false);
        host.hook("rope", "verbUse", HookCall::Returned(false));
        let sentence = ready(build_sentence(
            &mut host,
            &request(
                Some(VERB_USE),
                EntityRef::object("rope"),
                Some(EntityRef::object("bucket")),
            ),
        ));
        assert_eq!(host.log, vec!["walk guybrush (40, 0) back"]);
        let fired = host.drive(sentence);
        assert_eq!(fired, vec!["arrive", "post_walk", "execute", "restore_default_verb"]);
        assert_eq!(
            host.calls,
            vec!["rope.objectPreWalk", "rope.objectPostWalk", "rope.verbUse"]
        );
    }

    #[test]
    fn accepted_give_stops_after_the_give_step() {
        let mut host = FakeHost::new();
        host.add_object("map", 0, true);
        host.hook("guybrush", "verbGive", HookCall::Returned(true));
        let sentence = ready(build_sentence(
            &mut host,
            &request(
                Some(VERB_GIVE),
                EntityRef::object("map"),
                Some(EntityRef::actor("largo")),
            ),
        ));
        let fired = host.drive(sentence);
        assert_eq!(fired, vec!["arrive", "post_walk", "give"]);
        assert!(!host.log.iter().any(|entry| entry == "restore"));
        // walking towards an actor faces them
        assert_eq!(host.log[0], "walk guybrush (80, 0) right");
    }

    #[test]
    fn refused_give_falls_back_to_object_give() {
        let mut host = FakeHost::new();
        host.add_object("map", 0, true);
        host.hook("guybrush", "verbGive", HookCall::Returned(false));
        let sentence = ready(build_sentence(
            &mut host,
            &request(
                Some(VERB_GIVE),
                EntityRef::object("map"),
                Some(EntityRef::actor("largo")),
            ),
        ));
        host.drive(sentence);
        assert!(host.calls.contains(&"_G.objectGive".to_string()));
        assert!(host.log.contains(&"give_to map largo".to_string()));
        assert_eq!(host.log.last().map(String::as_str), Some("restore"));
    }

    #[test]
    fn give_without_receiver_requests_give_mode() {
        let mut host = FakeHost::new();
        host.add_object("map", 0, true);
        let build = build_sentence(
            &mut host,
            &request(Some(VERB_GIVE), EntityRef::object("map"), None),
        );
        assert!(matches!(build, SentenceBuild::UseMode(UseFlag::GiveTo)));
    }

    #[test]
    fn far_look_skips_the_walk() {
        let mut host = FakeHost::new();
        host.add_object("ship", object_flags::FAR_LOOK, false);
        let sentence = ready(build_sentence(
            &mut host,
            &request(Some(VERB_LOOKAT), EntityRef::object("ship"), None),
        ));
        assert_eq!(sentence.steps().next().map(|c| c.action().name()), Some("post_walk"));
        assert!(host.log.is_empty());
    }

    #[test]
    fn inventory_targets_are_not_walked_to() {
        let mut host = FakeHost::new();
        host.add_object("map", 0, true);
        let sentence = ready(build_sentence(
            &mut host,
            &request(Some(VERB_LOOKAT), EntityRef::object("map"), None),
        ));
        assert_eq!(sentence.len(), 3);
    }

    #[test]
    fn pre_walk_hook_can_veto_the_sentence() {
        let mut host = FakeHost::new();
        host.add_object("door", 0, false);
        host.hook("door", "objectPreWalk", HookCall::Returned(true));
        let build = build_sentence(
            &mut host,
            &request(Some(VERB_OPEN), EntityRef::object("door"), None),
        );
        assert!(matches!(build, SentenceBuild::Aborted(Abort::HandledByPreWalk)));
    }

    #[test]
    fn default_verb_resolution() {
        let mut host = FakeHost::new();
        host.add_object("door", 0, false);
        let sentence = ready(build_sentence(
            &mut host,
            &request(None, EntityRef::object("door"), None),
        ));
        let execute = sentence
            .steps()
            .find_map(|c| match c.action() {
                VerbStep::Execute { verb, .. } => Some(verb.id),
                _ => None,
            });
        assert_eq!(execute, Some(VERB_LOOKAT));

        if let Some(door) = host.entities.get_mut("door") {
            door.default_verb = Some(0);
        }
        let build = build_sentence(&mut host, &request(None, EntityRef::object("door"), None));
        assert!(matches!(build, SentenceBuild::Aborted(Abort::DefaultVerbDisabled(_))));

        let build = build_sentence(&mut host, &request(Some(42), EntityRef::object("door"), None));
        assert!(matches!(build, SentenceBuild::Aborted(Abort::UnknownVerb(42))));
    }

    #[test]
    fn no_current_actor_aborts() {
        let mut host = FakeHost::new();
        host.actor = None;
        host.add_object("door", 0, false);
        let build = build_sentence(
            &mut host,
            &request(Some(VERB_OPEN), EntityRef::object("door"), None),
        );
        assert!(matches!(build, SentenceBuild::Aborted(Abort::NoActor)));
    }

    #[test]
    fn pickup_reaches_holds_and_notifies() {
        let mut host = FakeHost::new();
        host.add_object("rope", object_flags::REACH_HIGH, false);
        host.hook("rope", "verbPickUp", HookCall::Returned(false));
        let sentence = ready(build_sentence(
            &mut host,
            &request(Some(VERB_PICKUP), EntityRef::object("rope"), None),
        ));
        let start = host.world.frame;
        let fired = host.drive(sentence);
        assert_eq!(
            fired,
            vec!["arrive", "post_walk", "reach", "stand", "execute", "restore_default_verb"]
        );
        assert!(host.log.contains(&"pose guybrush reach_high".to_string()));
        assert!(host.log.contains(&"pose guybrush stand".to_string()));
        assert!(host.calls.contains(&"_G.onPickup".to_string()));
        // the hold alone spans 33 ticks of 10ms
        assert!(host.world.frame - start >= 33);
    }

    #[test]
    fn reach_needs_a_handler_and_a_flag() {
        let mut host = FakeHost::new();
        host.add_object("crate", 0, false);
        host.hook("crate", "verbPickUp", HookCall::Returned(false));
        let fired = {
            let sentence = ready(build_sentence(
                &mut host,
                &request(Some(VERB_PICKUP), EntityRef::object("crate"), None),
            ));
            host.drive(sentence)
        };
        assert!(!fired.contains(&"reach"));

        host.add_object("bell", object_flags::REACH_LOW, false);
        let sentence = ready(build_sentence(
            &mut host,
            &request(Some(VERB_PICKUP), EntityRef::object("bell"), None),
        ));
        assert!(!sentence.steps().any(|c| c.action().name() == "reach"));
    }

    #[test]
    fn unhandled_verb_falls_through_to_default_object() {
        let mut host = FakeHost::new();
        host.add_object("door", 0, false);
        host.hook("defaultObject", "verbOpen", HookCall::Returned(false));
        let sentence = ready(build_sentence(
            &mut host,
            &request(Some(VERB_OPEN), EntityRef::object("door"), None),
        ));
        host.drive(sentence);
        let tail: Vec<&str> = host.calls.iter().rev().take(3).map(String::as_str).collect();
        assert_eq!(tail, vec!["defaultObject.verbOpen", "door.verbDefault", "door.verbOpen"]);
    }

    #[test]
    fn talk_to_stops_once_the_actor_hook_runs() {
        let mut host = FakeHost::new();
        host.hook("guybrush", "verbTalkTo", HookCall::Returned(false));
        let sentence = ready(build_sentence(
            &mut host,
            &request(Some(VERB_TALKTO), EntityRef::actor("largo"), None),
        ));
        let fired = host.drive(sentence);
        assert_eq!(fired, vec!["arrive", "post_walk", "talk_to"]);
        assert!(host.calls.contains(&"largo.actorPreWalk".to_string()));
    }
}
