use serde::Serialize;
use woodtick_formats::verbs::{VERB_GIVE, VERB_PICKUP};
use woodtick_formats::{ReachPose, VerbDescriptor, VerbId};

use super::{HookArg, HookTarget, VerbHost};
use crate::sentence::StepFlow;
use crate::world::{EntityKind, EntityRef, IDLE_ANIMATION};

/// One step of a verb sentence.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum VerbStep {
    Arrive {
        actor: String,
    },
    PostWalk {
        verb: VerbId,
        target: EntityRef,
        second: Option<EntityRef>,
    },
    Give {
        actor: String,
        target: EntityRef,
    },
    TalkTo {
        actor: String,
    },
    Reach {
        actor: String,
        pose: ReachPose,
    },
    Stand {
        actor: String,
    },
    Execute {
        verb: VerbDescriptor,
        actor: String,
        target: EntityRef,
        second: Option<EntityRef>,
    },
    RestoreDefaultVerb,
}

impl VerbStep {
    pub fn name(&self) -> &'static str {
        match self {
            VerbStep::Arrive { .. } => "arrive",
            VerbStep::PostWalk { .. } => "post_walk",
            VerbStep::Give { .. } => "give",
            VerbStep::TalkTo { .. } => "talk_to",
            VerbStep::Reach { .. } => "reach",
            VerbStep::Stand { .. } => "stand",
            VerbStep::Execute { .. } => "execute",
            VerbStep::RestoreDefaultVerb => "restore_default_verb",
        }
    }
}

/// Runs a due step against the host and reports whether the sentence goes on.
pub fn run_step<H>(host: &mut H, step: VerbStep) -> StepFlow
where
    H: VerbHost + ?Sized,
{
    match step {
        VerbStep::Arrive { actor } => {
            host.record(format!("sentence.arrived {actor}"));
            StepFlow::Continue
        }
        VerbStep::PostWalk {
            verb,
            target,
            second,
        } => {
            let hook = target.kind.hooks().post_walk;
            let args = [
                HookArg::Verb(verb),
                HookArg::Entity(target.clone()),
                HookArg::from(second.as_ref()),
            ];
            if host
                .call_hook(HookTarget::Entity(&target), hook, &args)
                .handled()
            {
                StepFlow::Stop
            } else {
                StepFlow::Continue
            }
        }
        VerbStep::Give { actor, target } => {
            let giver = EntityRef::actor(actor);
            let accepted = host
                .call_hook(
                    HookTarget::Entity(&giver),
                    "verbGive",
                    &[HookArg::Entity(target)],
                )
                .handled();
            if accepted {
                StepFlow::Stop
            } else {
                StepFlow::Continue
            }
        }
        VerbStep::TalkTo { actor } => {
            let talker = EntityRef::actor(actor);
            if host
                .call_hook(HookTarget::Entity(&talker), "verbTalkTo", &[])
                .ran()
            {
                StepFlow::Stop
            } else {
                StepFlow::Continue
            }
        }
        VerbStep::Reach { actor, pose } => {
            host.play_pose(&actor, pose.animation());
            StepFlow::Continue
        }
        VerbStep::Stand { actor } => {
            host.play_pose(&actor, IDLE_ANIMATION);
            StepFlow::Continue
        }
        VerbStep::Execute {
            verb,
            actor,
            target,
            second,
        } => {
            execute_verb(host, &verb, &actor, &target, second.as_ref());
            StepFlow::Continue
        }
        VerbStep::RestoreDefaultVerb => {
            host.restore_default_verb();
            StepFlow::Continue
        }
    }
}

/// Target's handler first, then the give transfer, the target's
/// `verbDefault` and finally the default object's handler.
fn execute_verb<H>(
    host: &mut H,
    verb: &VerbDescriptor,
    actor: &str,
    target: &EntityRef,
    second: Option<&EntityRef>,
) where
    H: VerbHost + ?Sized,
{
    let args: Vec<HookArg> = second.map(|s| HookArg::Entity(s.clone())).into_iter().collect();
    if host
        .call_hook(HookTarget::Entity(target), &verb.func, &args)
        .ran()
    {
        if verb.id == VERB_PICKUP {
            host.call_hook(
                HookTarget::Global,
                "onPickup",
                &[
                    HookArg::Entity(EntityRef::actor(actor)),
                    HookArg::Entity(target.clone()),
                ],
            );
        }
        return;
    }

    if verb.id == VERB_GIVE {
        host.call_hook(
            HookTarget::Global,
            "objectGive",
            &[
                HookArg::Entity(target.clone()),
                HookArg::Entity(EntityRef::actor(actor)),
                HookArg::from(second),
            ],
        );
        if let Some(receiver) = second.filter(|entity| entity.kind == EntityKind::Actor) {
            if target.kind == EntityKind::Object {
                host.give_to(target, receiver);
            }
        }
        return;
    }

    if host
        .call_hook(HookTarget::Entity(target), "verbDefault", &[])
        .ran()
    {
        return;
    }

    let fallback = host.call_hook(
        HookTarget::DefaultObject,
        &verb.func,
        &[
            HookArg::Entity(EntityRef::actor(actor)),
            HookArg::Entity(target.clone()),
        ],
    );
    if !fallback.ran() {
        host.record(format!("verb.unhandled {} {}", verb.func, target));
    }
}
