//! Wait primitives. Each native suspends the calling thread and queues its
//! wakeup; a small Lua wrapper then yields the coroutine. The condition is
//! first sampled on the next tick, even when it already holds.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use anyhow::Result;
use mlua::{Function, Lua, Result as LuaResult, Value, Variadic};

use super::bindings::{
    expect_entity, expect_handle, expect_number, script_error, value_to_entity_id,
};
use super::{enqueue, EngineContext, Wakeup};
use crate::scheduler::{Condition, SchedulerError};

const WAIT_WRAPPER: &str = r#"
local native = ...
return function(...)
    if native(...) then
        return coroutine.yield()
    end
end
"#;

pub(crate) fn install_wait_primitives(
    lua: &Lua,
    context: Rc<RefCell<EngineContext>>,
) -> Result<()> {
    install_wait(lua, &context, "waitFrames", |_, args| {
        let frames = expect_number("waitFrames", args, 0)?.max(0.0) as u64;
        Ok(Some(Condition::frames(frames)))
    })?;

    install_wait(lua, &context, "waitSeconds", |_, args| {
        let seconds = expect_number("waitSeconds", args, 0)?;
        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        Ok(Some(Condition::elapsed(Duration::from_secs_f64(seconds))))
    })?;

    install_wait(lua, &context, "waitWhileWalking", |state, args| {
        let actor = known_actor("waitWhileWalking", state, args)?;
        Ok(Some(Condition::ActorWalking { actor }))
    })?;

    install_wait(lua, &context, "waitWhileTalking", |state, args| {
        match args.first() {
            None | Some(Value::Nil) => Ok(Some(Condition::AnyActorTalking)),
            Some(_) => {
                let actor = known_actor("waitWhileTalking", state, args)?;
                Ok(Some(Condition::ActorTalking { actor }))
            }
        }
    })?;

    install_wait(lua, &context, "waitWhileAnimating", |state, args| {
        let target = expect_entity("waitWhileAnimating", args, 0)?;
        if state.world.actor(&target).is_some() {
            let animation = state.world.actor_animation(&target).map(str::to_string);
            return Ok(animation.map(|animation| Condition::ActorAnimating {
                actor: target,
                animation,
            }));
        }
        if state.world.object(&target).is_some() {
            return Ok(Some(Condition::ObjectAnimating { object: target }));
        }
        Err(script_error(SchedulerError::UnknownEntity {
            function: "waitWhileAnimating",
            target,
        }))
    })?;

    install_wait(lua, &context, "waitWhileSound", |_, args| {
        let sound = expect_handle("waitWhileSound", args, 0)?;
        Ok(Some(Condition::SoundPlaying { sound }))
    })?;

    install_wait(lua, &context, "waitWhileDialog", |_, _| {
        Ok(Some(Condition::DialogActive))
    })?;
    install_wait(lua, &context, "waitWhileCutscene", |_, _| {
        Ok(Some(Condition::CutsceneActive))
    })?;
    install_wait(lua, &context, "waitWhileCamera", |_, _| {
        Ok(Some(Condition::CameraMoving))
    })?;
    install_wait(lua, &context, "waitWhileInputOff", |_, _| {
        Ok(Some(Condition::InputDisabled))
    })?;

    install_wait(lua, &context, "waitWhileThreadRunning", |state, args| {
        let id = expect_handle("waitWhileThreadRunning", args, 0)?;
        if state.threads.is_thread_handle(id) {
            if state.threads.current() == Some(id) || !state.threads.contains(id) {
                return Ok(None);
            }
            return Ok(Some(Condition::ThreadRunning { thread: id }));
        }
        if state.world.is_sound_handle(id) {
            return Ok(Some(Condition::SoundPlaying { sound: id }));
        }
        Ok(None)
    })?;

    Ok(())
}

/// Registers `name` as a yielding wrapper around a native that builds the
/// wait condition; `None` from `build` means there is nothing to wait for.
fn install_wait<F>(
    lua: &Lua,
    context: &Rc<RefCell<EngineContext>>,
    name: &'static str,
    build: F,
) -> LuaResult<()>
where
    F: Fn(&EngineContext, &[Value]) -> LuaResult<Option<Condition>> + 'static,
{
    let state = context.clone();
    let native = lua.create_function(move |_, args: Variadic<Value>| {
        let condition = {
            let snapshot = state.borrow();
            if snapshot.threads.current().is_none() {
                return Err(script_error(SchedulerError::NoCurrentThread(name)));
            }
            build(&snapshot, &args)?
        };
        match condition {
            Some(condition) => Ok(suspend_current(&state, name, condition)),
            None => Ok(false),
        }
    })?;
    let wrapper: Function = lua
        .load(WAIT_WRAPPER)
        .set_name(name)
        .call(native)?;
    lua.globals().set(name, wrapper)?;
    Ok(())
}

/// Suspends the current thread behind `condition`. Returns whether the
/// caller must yield.
fn suspend_current(
    context: &Rc<RefCell<EngineContext>>,
    function: &'static str,
    condition: Condition,
) -> bool {
    let mut state = context.borrow_mut();
    let Some(thread) = state.threads.current() else {
        return false;
    };
    // A thread that stopped itself has nothing to wake; it just yields out.
    if state.threads.suspend(thread) {
        log::debug!("{function}: thread #{thread} waits on {}", condition.kind());
        enqueue(&mut state, condition, Wakeup::Thread { thread });
    }
    true
}

fn known_actor(function: &'static str, state: &EngineContext, args: &[Value]) -> LuaResult<String> {
    let actor = args
        .first()
        .and_then(value_to_entity_id)
        .ok_or_else(|| super::bindings::invalid_argument(function, "an actor", args.first()))?;
    if state.world.actor(&actor).is_none() {
        return Err(script_error(SchedulerError::UnknownActor { function, actor }));
    }
    Ok(actor)
}
