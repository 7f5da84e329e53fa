use std::fmt;
use std::time::Duration;

use woodtick_formats::verbs::{FALLBACK_DEFAULT_VERB, VERB_GIVE, VERB_LOOKAT, VERB_TALKTO, VERB_USE};
use woodtick_formats::{object_flags, ReachPose, UseFlag, VerbId};

use super::steps::VerbStep;
use super::{HookArg, HookTarget, VerbHost};
use crate::scheduler::Condition;
use crate::sentence::Sentence;
use crate::world::EntityRef;

/// How long a reach pose is held before the actor stands again.
pub const REACH_HOLD: Duration = Duration::from_millis(330);

#[derive(Debug, Clone, PartialEq)]
pub struct VerbRequest {
    /// `None` (or 0) selects the target's default verb.
    pub verb: Option<VerbId>,
    pub target: EntityRef,
    pub second: Option<EntityRef>,
}

/// Why a request produced no sentence. None of these are errors: the verb
/// simply has nothing to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Abort {
    UnknownTarget(String),
    DefaultVerbDisabled(String),
    UnknownVerb(VerbId),
    HandledByPreWalk,
    NoActor,
}

impl fmt::Display for Abort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Abort::UnknownTarget(id) => write!(f, "unknown target {id}"),
            Abort::DefaultVerbDisabled(id) => write!(f, "{id} has no default verb"),
            Abort::UnknownVerb(verb) => write!(f, "verb {verb} is not in the table"),
            Abort::HandledByPreWalk => f.write_str("handled by pre-walk hook"),
            Abort::NoActor => f.write_str("no current actor"),
        }
    }
}

#[derive(Debug)]
pub enum SentenceBuild {
    Ready(Sentence<VerbStep>),
    UseMode(UseFlag),
    Aborted(Abort),
}

/// Resolves a verb request into the ordered steps the engine will run.
/// Walking starts here; every later effect happens when its step fires.
pub fn build_sentence<H>(host: &mut H, request: &VerbRequest) -> SentenceBuild
where
    H: VerbHost + ?Sized,
{
    let Some(target) = host.entity(&request.target) else {
        return SentenceBuild::Aborted(Abort::UnknownTarget(request.target.id.clone()));
    };
    let verb_id = match request.verb.filter(|id| *id != 0) {
        Some(id) => id,
        None => match target.default_verb {
            Some(0) => {
                return SentenceBuild::Aborted(Abort::DefaultVerbDisabled(
                    request.target.id.clone(),
                ))
            }
            Some(id) => id,
            None => FALLBACK_DEFAULT_VERB,
        },
    };
    let Some(verb) = host.verb(verb_id) else {
        return SentenceBuild::Aborted(Abort::UnknownVerb(verb_id));
    };

    if request.second.is_none() {
        let use_mode = match verb.id {
            VERB_USE => UseFlag::from_exact_flags(target.flags),
            VERB_GIVE => Some(UseFlag::GiveTo),
            _ => None,
        };
        if let Some(flag) = use_mode {
            host.request_use_mode(flag, &request.target);
            return SentenceBuild::UseMode(flag);
        }
    }

    let pre_walk = request.target.kind.hooks().pre_walk;
    let args = [
        HookArg::Verb(verb.id),
        HookArg::Entity(request.target.clone()),
        HookArg::from(request.second.as_ref()),
    ];
    if host
        .call_hook(HookTarget::Entity(&request.target), pre_walk, &args)
        .handled()
    {
        host.record(format!("sentence.prewalk_handled {}", request.target));
        return SentenceBuild::Aborted(Abort::HandledByPreWalk);
    }

    let Some(actor) = host.current_actor() else {
        return SentenceBuild::Aborted(Abort::NoActor);
    };

    let walk_target = match request.second.as_ref() {
        Some(second) => match host.entity(second) {
            Some(info) => info,
            None => return SentenceBuild::Aborted(Abort::UnknownTarget(second.id.clone())),
        },
        None => target.clone(),
    };

    let mut sentence = Sentence::new();
    let far_look =
        verb.id == VERB_LOOKAT && target.flags & object_flags::FAR_LOOK == object_flags::FAR_LOOK;
    if !far_look && !walk_target.in_inventory {
        host.walk_to(
            &actor,
            walk_target.use_position(),
            walk_target.approach_facing(),
        );
        sentence.push_step(
            Condition::ActorWalking {
                actor: actor.clone(),
            },
            VerbStep::Arrive {
                actor: actor.clone(),
            },
        );
    }

    sentence.push_step(
        Condition::Immediate,
        VerbStep::PostWalk {
            verb: verb.id,
            target: request.target.clone(),
            second: request.second.clone(),
        },
    );

    match verb.id {
        VERB_GIVE => sentence.push_step(
            Condition::Immediate,
            VerbStep::Give {
                actor: actor.clone(),
                target: request.target.clone(),
            },
        ),
        VERB_TALKTO => sentence.push_step(
            Condition::Immediate,
            VerbStep::TalkTo {
                actor: actor.clone(),
            },
        ),
        _ => {}
    }

    if verb.plays_reach() && host.has_hook(HookTarget::Entity(&request.target), &verb.func) {
        if let Some(pose) = ReachPose::from_flags(target.flags) {
            sentence.push_step(
                Condition::Immediate,
                VerbStep::Reach {
                    actor: actor.clone(),
                    pose,
                },
            );
            sentence.push_step(
                Condition::elapsed(REACH_HOLD),
                VerbStep::Stand {
                    actor: actor.clone(),
                },
            );
        }
    }

    sentence.push_step(
        Condition::Immediate,
        VerbStep::Execute {
            verb,
            actor,
            target: request.target.clone(),
            second: request.second.clone(),
        },
    );
    sentence.push_step(Condition::Immediate, VerbStep::RestoreDefaultVerb);
    SentenceBuild::Ready(sentence)
}
