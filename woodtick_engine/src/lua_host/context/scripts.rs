use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Result;
use mlua::{
    Error as LuaError, Function, Lua, MultiValue, RegistryKey, Result as LuaResult, Thread,
    ThreadStatus, Value, Variadic,
};

use super::bindings::{
    describe_callable_label, expect_handle, script_error, value_to_bool, value_to_handle,
};
use super::{enqueue, EngineContext, Wakeup};
use crate::scheduler::{
    Condition, Coroutine, ExitReason, RunState, SchedulerError, SegmentEnd, ThreadId,
};

/// A Lua coroutine parked in the registry so the scheduler can hold it
/// without borrowing the VM.
#[derive(Debug)]
pub(crate) struct LuaCoroutine {
    thread: RegistryKey,
}

impl LuaCoroutine {
    fn new(thread: RegistryKey) -> Self {
        Self { thread }
    }

    /// Runs one segment, feeding `args` to the coroutine.
    fn call(&self, lua: &Lua, args: MultiValue) -> RunState {
        let thread: Thread = match lua.registry_value(&self.thread) {
            Ok(thread) => thread,
            Err(err) => return RunState::Failed(err.to_string()),
        };
        if !matches!(thread.status(), ThreadStatus::Resumable) {
            return RunState::Completed;
        }
        match thread.resume::<_, MultiValue>(args) {
            Ok(_) => match thread.status() {
                ThreadStatus::Resumable => RunState::Yielded,
                ThreadStatus::Unresumable | ThreadStatus::Error => RunState::Completed,
            },
            Err(LuaError::CoroutineInactive) => RunState::Completed,
            Err(err) => RunState::Failed(err.to_string()),
        }
    }
}

impl Coroutine for LuaCoroutine {
    type Vm = Lua;

    fn resume(&self, vm: &Lua) -> RunState {
        self.call(vm, MultiValue::new())
    }
}

pub(crate) fn install_thread_bindings(
    lua: &Lua,
    context: Rc<RefCell<EngineContext>>,
) -> Result<()> {
    let globals = lua.globals();

    let start_state = context.clone();
    globals.set(
        "startThread",
        lua.create_function(move |lua, args: Variadic<Value>| {
            start_thread(lua, &start_state, args, false)
        })?,
    )?;

    let global_state = context.clone();
    globals.set(
        "startGlobalThread",
        lua.create_function(move |lua, args: Variadic<Value>| {
            start_thread(lua, &global_state, args, true)
        })?,
    )?;

    let stop_state = context.clone();
    globals.set(
        "stopThread",
        lua.create_function(move |_, args: Variadic<Value>| {
            let Some(id) = args.first().and_then(value_to_handle) else {
                return Ok(false);
            };
            Ok(stop_thread(&mut stop_state.borrow_mut(), id))
        })?,
    )?;

    let current_state = context.clone();
    globals.set(
        "threadId",
        lua.create_function(move |_, ()| {
            Ok(current_state.borrow().threads.current().unwrap_or(0))
        })?,
    )?;

    let pauseable_state = context.clone();
    globals.set(
        "threadPauseable",
        lua.create_function(move |_, args: Variadic<Value>| {
            let id = expect_handle("threadPauseable", &args, 0)?;
            let pauseable = args.get(1).map_or(true, value_to_bool);
            Ok(pauseable_state
                .borrow_mut()
                .threads
                .set_pauseable(id, pauseable))
        })?,
    )?;

    let running_state = context;
    globals.set(
        "isThreadRunning",
        lua.create_function(move |_, args: Variadic<Value>| {
            let running = args
                .first()
                .and_then(value_to_handle)
                .is_some_and(|id| running_state.borrow().threads.contains(id));
            Ok(running)
        })?,
    )?;

    Ok(())
}

/// Spawns a thread and runs it synchronously up to its first suspension.
fn start_thread(
    lua: &Lua,
    context: &Rc<RefCell<EngineContext>>,
    args: Variadic<Value>,
    global: bool,
) -> LuaResult<ThreadId> {
    let mut args = args.into_iter();
    let callable = args.next().unwrap_or(Value::Nil);
    let name = describe_callable_label(&callable)?;
    let function = resolve_callable(lua, callable)
        .ok_or_else(|| script_error(SchedulerError::NotCallable(name.clone())))?;
    let thread = lua.create_thread(function)?;
    let key = lua.create_registry_value(thread)?;

    let (id, coroutine) = {
        let mut state = context.borrow_mut();
        let id = state
            .threads
            .spawn(name.clone(), global, LuaCoroutine::new(key))
            .map_err(script_error)?;
        let scope = if global { "global " } else { "" };
        state.log_event(format!("thread.start {scope}{name} (#{id})"));
        (id, state.threads.begin_call(id))
    };
    let Some(coroutine) = coroutine else {
        return Ok(id);
    };

    let run = coroutine.call(lua, args.collect());
    let end = context.borrow_mut().threads.finish(id, run);
    if let SegmentEnd::Exited(ExitReason::Failed(message)) = &end {
        log::error!("thread {name} (#{id}) failed: {message}");
        context
            .borrow_mut()
            .log_event(format!("thread.error {name} (#{id})"));
        return Err(script_error(SchedulerError::ThreadFailed {
            name,
            message: message.clone(),
        }));
    }
    settle_segment(context, id, &name, end);
    Ok(id)
}

fn resolve_callable<'lua>(lua: &'lua Lua, callable: Value<'lua>) -> Option<Function<'lua>> {
    match callable {
        Value::Function(function) => Some(function),
        Value::String(name) => match lua.globals().get::<_, Value>(name).ok()? {
            Value::Function(function) => Some(function),
            _ => None,
        },
        _ => None,
    }
}

fn stop_thread(state: &mut EngineContext, id: ThreadId) -> bool {
    let Some(name) = state.threads.get(id).map(|thread| thread.name().to_string()) else {
        return false;
    };
    state.threads.stop(id);
    state.log_event(format!("thread.stop {name} (#{id})"));
    true
}

/// Re-enters a suspended thread. Stale wakeups (thread gone, stopped or
/// not suspended) do nothing.
pub(super) fn resume_thread(lua: &Lua, context: &Rc<RefCell<EngineContext>>, id: ThreadId) {
    let (name, coroutine) = {
        let mut state = context.borrow_mut();
        let name = state
            .threads
            .get(id)
            .map(|thread| thread.name().to_string())
            .unwrap_or_default();
        (name, state.threads.begin_resume(id))
    };
    let Some(coroutine) = coroutine else {
        return;
    };
    let run = coroutine.resume(lua);
    let end = context.borrow_mut().threads.finish(id, run);
    settle_segment(context, id, &name, end);
}

/// Applies the outcome of a segment: a bare `coroutine.yield()` waits one
/// frame, exits are logged.
fn settle_segment(context: &Rc<RefCell<EngineContext>>, id: ThreadId, name: &str, end: SegmentEnd) {
    let mut state = context.borrow_mut();
    match end {
        SegmentEnd::Waiting => {}
        SegmentEnd::Yielded => {
            let condition = Condition::frames(1);
            enqueue(&mut state, condition, Wakeup::Thread { thread: id });
        }
        SegmentEnd::Exited(ExitReason::Completed) => {
            state.log_event(format!("thread.end {name} (#{id})"));
        }
        SegmentEnd::Exited(ExitReason::Stopped) => {}
        SegmentEnd::Exited(ExitReason::Failed(message)) => {
            log::error!("thread {name} (#{id}) failed: {message}");
            state.log_event(format!("thread.error {name} (#{id})"));
        }
    }
}
