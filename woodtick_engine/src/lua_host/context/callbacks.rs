use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use anyhow::Result;
use mlua::{Function, Lua, RegistryKey, Value, Variadic};

use super::bindings::{
    call_outside_thread, describe_function, expect_number, invalid_argument, value_to_handle,
};
use super::{enqueue, EngineContext, Wakeup};
use crate::handles::{HandlePool, CALLBACK_IDS};
use crate::scheduler::Condition;

#[derive(Debug)]
pub(super) struct TimedCallback {
    label: String,
    function: RegistryKey,
}

/// Functions waiting on an `addCallback` timer, keyed by callback id.
#[derive(Debug)]
pub(super) struct CallbackRegistry {
    handles: HandlePool,
    pending: BTreeMap<u32, TimedCallback>,
}

impl CallbackRegistry {
    pub(super) fn new() -> Self {
        Self {
            handles: HandlePool::new(CALLBACK_IDS),
            pending: BTreeMap::new(),
        }
    }

    fn add(&mut self, label: String, function: RegistryKey) -> Option<u32> {
        let id = self.handles.allocate()?;
        self.pending.insert(id, TimedCallback { label, function });
        Some(id)
    }

    fn remove(&mut self, id: u32) -> Option<TimedCallback> {
        let callback = self.pending.remove(&id)?;
        self.handles.release(id);
        Some(callback)
    }

    pub(super) fn contains(&self, id: u32) -> bool {
        self.pending.contains_key(&id)
    }
}

pub(crate) fn install_callbacks(lua: &Lua, context: Rc<RefCell<EngineContext>>) -> Result<()> {
    let globals = lua.globals();

    let add_state = context.clone();
    globals.set(
        "addCallback",
        lua.create_function(move |lua, args: Variadic<Value>| {
            let seconds = expect_number("addCallback", &args, 0)?;
            let function = match args.get(1) {
                Some(Value::Function(function)) => function.clone(),
                other => return Err(invalid_argument("addCallback", "a function", other)),
            };
            let label = describe_function(&function);
            let key = lua.create_registry_value(function)?;
            let mut state = add_state.borrow_mut();
            let Some(id) = state.callbacks.add(label.clone(), key) else {
                log::warn!("addCallback: callback ids exhausted");
                return Ok(None);
            };
            let delay = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
            enqueue(
                &mut state,
                Condition::elapsed(Duration::from_secs_f64(delay)),
                Wakeup::Callback { callback: id },
            );
            state.log_event(format!("callback.add {label} (#{id})"));
            Ok(Some(id))
        })?,
    )?;

    let remove_state = context;
    globals.set(
        "removeCallback",
        lua.create_function(move |_, args: Variadic<Value>| {
            let Some(id) = args.first().and_then(value_to_handle) else {
                return Ok(false);
            };
            let mut state = remove_state.borrow_mut();
            match state.callbacks.remove(id) {
                Some(callback) => {
                    state.log_event(format!("callback.remove {} (#{id})", callback.label));
                    Ok(true)
                }
                None => Ok(false),
            }
        })?,
    )?;

    Ok(())
}

/// Runs a due callback once. It is unregistered before it runs, so it may
/// schedule itself again.
pub(super) fn fire_callback(lua: &Lua, context: &Rc<RefCell<EngineContext>>, id: u32) {
    let Some(callback) = context.borrow_mut().callbacks.remove(id) else {
        return;
    };
    context
        .borrow_mut()
        .log_event(format!("callback.fire {} (#{id})", callback.label));
    let result = lua
        .registry_value::<Function>(&callback.function)
        .and_then(|function| call_outside_thread::<_, ()>(context, &function, ()));
    if let Err(err) = result {
        log::error!("callback {} (#{id}) failed: {err}", callback.label);
        context
            .borrow_mut()
            .log_event(format!("callback.error {} (#{id})", callback.label));
    }
}
