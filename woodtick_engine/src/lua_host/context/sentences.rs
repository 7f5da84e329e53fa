use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use anyhow::Result;
use mlua::{Function, Lua, MultiValue, Table, Value, Variadic};
use woodtick_formats::verbs::VERB_DIALOG;
use woodtick_formats::{Facing, UseFlag, Vec2, VerbDescriptor, VerbId};

use super::bindings::{
    call_outside_thread, expect_entity, first_value, invalid_argument, is_truthy, script_error,
    value_to_i64,
};
use super::{ActiveSentence, EngineContext};
use crate::scheduler::SchedulerError;
use crate::sentence::{Sentence, StepFlow};
use crate::verbs::{
    build_sentence, run_step, HookArg, HookCall, HookTarget, SentenceBuild, VerbHost,
    VerbRequest, VerbStep,
};
use crate::world::{EntityInfo, EntityRef};

/// Outcome of handing a verb request to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentenceOutcome {
    Started,
    UseMode(UseFlag),
    DialogChoice(i64),
    Aborted(String),
}

/// Bridges the verb pipeline to the world and the Lua hook tables. Each
/// call borrows the context only for its own duration.
struct LuaVerbHost<'a> {
    lua: &'a Lua,
    context: &'a Rc<RefCell<EngineContext>>,
}

impl<'a> LuaVerbHost<'a> {
    fn hook_owner(&self, target: HookTarget<'_>) -> Option<Table<'a>> {
        let name = match target {
            HookTarget::Entity(entity) => entity.id.as_str(),
            HookTarget::DefaultObject => "defaultObject",
            HookTarget::Global => return None,
        };
        match self.lua.globals().get::<_, Value>(name) {
            Ok(Value::Table(table)) => Some(table),
            _ => None,
        }
    }

    fn hook_function(&self, target: HookTarget<'_>, name: &str) -> Option<Function<'a>> {
        let value = match target {
            HookTarget::Global => self.lua.globals().get::<_, Value>(name).ok()?,
            _ => self.hook_owner(target)?.get::<_, Value>(name).ok()?,
        };
        match value {
            Value::Function(function) => Some(function),
            _ => None,
        }
    }

    fn hook_value(&self, arg: &HookArg) -> Value<'a> {
        match arg {
            HookArg::Verb(verb) => Value::Integer(i64::from(*verb)),
            HookArg::Entity(entity) => match self.lua.globals().get::<_, Value>(entity.id.as_str())
            {
                Ok(Value::Table(table)) => Value::Table(table),
                _ => match self.lua.create_string(&entity.id) {
                    Ok(text) => Value::String(text),
                    Err(_) => Value::Nil,
                },
            },
            HookArg::Nil => Value::Nil,
        }
    }
}

impl VerbHost for LuaVerbHost<'_> {
    fn verb(&self, id: VerbId) -> Option<VerbDescriptor> {
        self.context.borrow().world.verbs().get(id).cloned()
    }

    fn entity(&self, entity: &EntityRef) -> Option<EntityInfo> {
        self.context.borrow().world.entity_info(entity)
    }

    fn current_actor(&self) -> Option<String> {
        self.context
            .borrow()
            .world
            .selected_actor()
            .map(str::to_string)
    }

    fn walk_to(&mut self, actor: &str, destination: Vec2, facing: Facing) {
        self.context
            .borrow_mut()
            .world
            .walk_actor_to(actor, destination, Some(facing));
    }

    fn play_pose(&mut self, actor: &str, animation: &str) {
        self.context
            .borrow_mut()
            .world
            .play_actor_animation(actor, animation, None);
    }

    fn request_use_mode(&mut self, flag: UseFlag, entity: &EntityRef) {
        self.context
            .borrow_mut()
            .world
            .request_use_mode(flag, entity.clone());
    }

    fn give_to(&mut self, object: &EntityRef, receiver: &EntityRef) {
        self.context
            .borrow_mut()
            .world
            .give_object(&object.id, &receiver.id);
    }

    fn restore_default_verb(&mut self) {
        self.context.borrow_mut().world.reset_verb();
    }

    fn has_hook(&self, target: HookTarget<'_>, name: &str) -> bool {
        self.hook_function(target, name).is_some()
    }

    fn call_hook(&mut self, target: HookTarget<'_>, name: &str, args: &[HookArg]) -> HookCall {
        let Some(function) = self.hook_function(target, name) else {
            return HookCall::Missing;
        };
        let mut values: Vec<Value> = Vec::with_capacity(args.len() + 1);
        if let Some(owner) = self.hook_owner(target) {
            values.push(Value::Table(owner));
        }
        values.extend(args.iter().map(|arg| self.hook_value(arg)));
        let result =
            call_outside_thread::<_, MultiValue>(self.context, &function, MultiValue::from_vec(values));
        match result {
            Ok(returned) => HookCall::Returned(is_truthy(&first_value(returned))),
            Err(err) => {
                log::error!("hook {name} failed: {err}");
                self.record(format!("hook.error {name}"));
                HookCall::Failed
            }
        }
    }

    fn record(&mut self, event: String) {
        self.context.borrow_mut().log_event(event);
    }
}

pub(crate) fn install_sentence_bindings(
    lua: &Lua,
    context: Rc<RefCell<EngineContext>>,
) -> Result<()> {
    let globals = lua.globals();

    let push_state = context.clone();
    globals.set(
        "pushSentence",
        lua.create_function(move |lua, args: Variadic<Value>| {
            let verb = match args.first() {
                None | Some(Value::Nil) => None,
                Some(value) => Some(
                    value_to_i64(value)
                        .and_then(|id| VerbId::try_from(id).ok())
                        .ok_or_else(|| invalid_argument("pushSentence", "a verb id", Some(value)))?,
                ),
            };
            if verb == Some(VERB_DIALOG) {
                let choice = args
                    .get(1)
                    .and_then(value_to_i64)
                    .ok_or_else(|| invalid_argument("pushSentence", "a dialog choice", args.get(1)))?;
                push_state.borrow_mut().choose_dialog(choice);
                return Ok(true);
            }
            let target = resolve(&push_state, &expect_entity("pushSentence", &args, 1)?)?;
            let second = match args.get(2) {
                None | Some(Value::Nil) => None,
                Some(_) => Some(resolve(
                    &push_state,
                    &expect_entity("pushSentence", &args, 2)?,
                )?),
            };
            let outcome = push_sentence(
                lua,
                &push_state,
                &VerbRequest {
                    verb,
                    target,
                    second,
                },
            );
            Ok(outcome == SentenceOutcome::Started)
        })?,
    )?;

    let active_state = context.clone();
    globals.set(
        "sentenceActive",
        lua.create_function(move |_, ()| Ok(active_state.borrow().sentence.is_some()))?,
    )?;

    let stop_state = context;
    globals.set(
        "stopSentence",
        lua.create_function(move |_, ()| {
            let mut state = stop_state.borrow_mut();
            match state.sentence.take() {
                Some(active) => {
                    state.log_event(format!("sentence.stop {}", active.label));
                    Ok(true)
                }
                None => Ok(false),
            }
        })?,
    )?;

    Ok(())
}

fn resolve(context: &Rc<RefCell<EngineContext>>, id: &str) -> mlua::Result<EntityRef> {
    context
        .borrow()
        .world
        .entity(id)
        .ok_or_else(|| {
            script_error(SchedulerError::UnknownEntity {
                function: "pushSentence",
                target: id.to_string(),
            })
        })
}

/// Builds a sentence for `request` and installs it, abandoning any sentence
/// still running.
pub(crate) fn push_sentence(
    lua: &Lua,
    context: &Rc<RefCell<EngineContext>>,
    request: &VerbRequest,
) -> SentenceOutcome {
    let mut host = LuaVerbHost { lua, context };
    match build_sentence(&mut host, request) {
        SentenceBuild::Ready(sentence) => {
            let mut state = context.borrow_mut();
            let label = sentence_label(&sentence, request);
            if let Some(previous) = state.sentence.take() {
                state.log_event(format!("sentence.abandon {}", previous.label));
            }
            let serial = state.next_sentence;
            state.next_sentence += 1;
            state.log_event(format!("sentence.start {label}"));
            state.sentence = Some(ActiveSentence {
                serial,
                label,
                sentence,
            });
            SentenceOutcome::Started
        }
        SentenceBuild::UseMode(flag) => SentenceOutcome::UseMode(flag),
        SentenceBuild::Aborted(abort) => {
            let reason = abort.to_string();
            context
                .borrow_mut()
                .log_event(format!("sentence.abort {reason}"));
            SentenceOutcome::Aborted(reason)
        }
    }
}

fn sentence_label(sentence: &Sentence<VerbStep>, request: &VerbRequest) -> String {
    let verb = sentence
        .steps()
        .find_map(|step| match step.action() {
            VerbStep::Execute { verb, .. } => Some(verb.func.clone()),
            _ => None,
        })
        .unwrap_or_else(|| "sentence".to_string());
    match request.second.as_ref() {
        Some(second) => format!("{verb} {} {second}", request.target),
        None => format!("{verb} {}", request.target),
    }
}

/// Polls the front step of the active sentence and runs it when due. The
/// sentence leaves its slot while the step runs; if script code installs a
/// new sentence meanwhile, the old one stays abandoned.
pub(super) fn drive_sentence(lua: &Lua, context: &Rc<RefCell<EngineContext>>, elapsed: Duration) {
    let (serial, step) = {
        let mut state = context.borrow_mut();
        let Some(mut active) = state.sentence.take() else {
            return;
        };
        let step = active.sentence.poll_front(&*state, elapsed);
        let serial = active.serial;
        state.sentence = Some(active);
        (serial, step)
    };
    let Some(step) = step else {
        finish_if_complete(context, serial);
        return;
    };

    context
        .borrow_mut()
        .log_event(format!("sentence.step {}", step.name()));
    let mut host = LuaVerbHost { lua, context };
    let flow = run_step(&mut host, step);

    if flow == StepFlow::Stop {
        let mut state = context.borrow_mut();
        if let Some(active) = state.sentence.as_mut().filter(|active| active.serial == serial) {
            active.sentence.stop();
        }
    }
    finish_if_complete(context, serial);
}

fn finish_if_complete(context: &Rc<RefCell<EngineContext>>, serial: u64) {
    let mut state = context.borrow_mut();
    let complete = state
        .sentence
        .as_ref()
        .is_some_and(|active| active.serial == serial && active.sentence.is_complete());
    if !complete {
        return;
    }
    if let Some(active) = state.sentence.take() {
        let verdict = if active.sentence.is_stopped() {
            "stopped"
        } else {
            "done"
        };
        state.log_event(format!("sentence.{verdict} {}", active.label));
    }
}
