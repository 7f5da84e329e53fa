use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use anyhow::{Context, Result};
use mlua::{
    Error as LuaError, Function, IntoLuaMulti, Lua, MultiValue, Result as LuaResult, Value,
    Variadic,
};
use woodtick_formats::object_flags;
use woodtick_formats::verbs::{
    VERB_CLOSE, VERB_DIALOG, VERB_GIVE, VERB_LOOKAT, VERB_OPEN, VERB_PICKUP, VERB_PULL, VERB_PUSH,
    VERB_TALKTO, VERB_USE, VERB_WALKTO,
};

use super::{callbacks, pause, scripts, sentences, waits, world_api, EngineContext};
use crate::scheduler::SchedulerError;
use crate::world::EntityKind;

pub(crate) fn install_globals(lua: &Lua, context: Rc<RefCell<EngineContext>>) -> Result<()> {
    install_constants(lua).context("installing verb and flag constants")?;
    install_logging_functions(lua, context.clone())?;
    scripts::install_thread_bindings(lua, context.clone())?;
    waits::install_wait_primitives(lua, context.clone())?;
    sentences::install_sentence_bindings(lua, context.clone())?;
    callbacks::install_callbacks(lua, context.clone())?;
    world_api::install_world_api(lua, context.clone())?;
    pause::install_game_pauser(lua, context)?;
    Ok(())
}

fn install_constants(lua: &Lua) -> LuaResult<()> {
    let globals = lua.globals();
    let verbs = [
        ("VERB_WALKTO", VERB_WALKTO),
        ("VERB_LOOKAT", VERB_LOOKAT),
        ("VERB_TALKTO", VERB_TALKTO),
        ("VERB_PICKUP", VERB_PICKUP),
        ("VERB_OPEN", VERB_OPEN),
        ("VERB_CLOSE", VERB_CLOSE),
        ("VERB_PUSH", VERB_PUSH),
        ("VERB_PULL", VERB_PULL),
        ("VERB_GIVE", VERB_GIVE),
        ("VERB_USE", VERB_USE),
        ("VERB_DIALOG", VERB_DIALOG),
    ];
    for (name, value) in verbs {
        globals.set(name, value)?;
    }
    let flags = [
        ("USE_WITH", object_flags::USE_WITH),
        ("USE_ON", object_flags::USE_ON),
        ("USE_IN", object_flags::USE_IN),
        ("FAR_LOOK", object_flags::FAR_LOOK),
        ("DOOR", object_flags::DOOR),
        ("GIVEABLE", object_flags::GIVEABLE),
        ("TALKABLE", object_flags::TALKABLE),
        ("IMMEDIATE", object_flags::IMMEDIATE),
        ("REACH_HIGH", object_flags::REACH_HIGH),
        ("REACH_MED", object_flags::REACH_MED),
        ("REACH_LOW", object_flags::REACH_LOW),
        ("REACH_NONE", object_flags::REACH_NONE),
    ];
    for (name, value) in flags {
        globals.set(name, value)?;
    }
    Ok(())
}

fn install_logging_functions(lua: &Lua, context: Rc<RefCell<EngineContext>>) -> Result<()> {
    let globals = lua.globals();

    let info = lua.create_function(|_, args: Variadic<Value>| {
        log::info!("[lua] {}", join_values(&args));
        Ok(())
    })?;
    globals.set("logInfo", info)?;

    let warning = lua.create_function(|_, args: Variadic<Value>| {
        log::warn!("[lua] {}", join_values(&args));
        Ok(())
    })?;
    globals.set("logWarning", warning)?;

    let event_state = context;
    let event = lua.create_function(move |_, args: Variadic<Value>| {
        event_state
            .borrow_mut()
            .log_event(format!("script.{}", join_values(&args)));
        Ok(())
    })?;
    globals.set("logEvent", event)?;

    Ok(())
}

/// Gives every scene entity a global table named after its id, unless the
/// script already defined one. Hooks are looked up on these tables.
pub(crate) fn bind_entity_tables(lua: &Lua, context: &Rc<RefCell<EngineContext>>) -> Result<()> {
    let entities: Vec<(String, EntityKind)> = {
        let state = context.borrow();
        let world = state.world();
        world
            .actors()
            .map(|actor| (actor.id.clone(), EntityKind::Actor))
            .chain(
                world
                    .objects()
                    .map(|object| (object.id.clone(), EntityKind::Object)),
            )
            .collect()
    };
    let globals = lua.globals();
    for (id, kind) in entities {
        let table = match globals.get::<_, Value>(id.as_str())? {
            Value::Table(table) => table,
            Value::Nil => {
                let table = lua.create_table()?;
                globals.set(id.as_str(), table.clone())?;
                table
            }
            other => {
                log::warn!(
                    "global `{id}` is a {} and cannot host entity hooks",
                    other.type_name()
                );
                continue;
            }
        };
        table.set("_id", id.as_str())?;
        table.set("_kind", kind.as_str())?;
    }
    if globals.get::<_, Value>("defaultObject")?.is_nil() {
        globals.set("defaultObject", lua.create_table()?)?;
    }
    Ok(())
}

pub(crate) fn execute_script(lua: &Lua, path: &Path) -> Result<()> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("reading script {}", path.display()))?;
    let chunk_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("script");
    lua.load(&source)
        .set_name(chunk_name)
        .exec()
        .with_context(|| format!("executing {}", path.display()))?;
    Ok(())
}

/// Calls `boot()` when the script defines one. Returns whether it did.
pub(crate) fn call_boot(lua: &Lua, context: &Rc<RefCell<EngineContext>>) -> Result<bool> {
    let boot = match lua.globals().get::<_, Value>("boot")? {
        Value::Function(boot) => boot,
        _ => return Ok(false),
    };
    call_outside_thread::<_, ()>(context, &boot, ()).context("executing boot()")?;
    context.borrow_mut().log_event("script.boot");
    Ok(true)
}

/// Calls a Lua function outside any script thread, so wait primitives raise
/// instead of yielding through a native frame.
pub(crate) fn call_outside_thread<'lua, A, R>(
    context: &Rc<RefCell<EngineContext>>,
    function: &Function<'lua>,
    args: A,
) -> LuaResult<R>
where
    A: IntoLuaMulti<'lua>,
    R: mlua::FromLuaMulti<'lua>,
{
    context.borrow_mut().threads.enter_hook();
    let result = function.call::<A, R>(args);
    context.borrow_mut().threads.leave_hook();
    result
}

pub(crate) fn script_error(error: SchedulerError) -> LuaError {
    LuaError::external(error)
}

pub(crate) fn invalid_argument(
    function: &'static str,
    expected: &'static str,
    found: Option<&Value>,
) -> LuaError {
    script_error(SchedulerError::InvalidArgument {
        function,
        expected,
        found: found.map_or_else(|| "nothing".to_string(), describe_value),
    })
}

pub(crate) fn describe_function(func: &Function) -> String {
    let info = func.info();
    if let Some(name) = info.name.clone() {
        if !name.is_empty() {
            return name;
        }
    }
    if let Some(short) = info.short_src.clone() {
        if let Some(line) = info.line_defined {
            if line > 0 {
                return format!("{short}:{line}");
            }
        }
        return format!("function@{short}");
    }
    match info.what {
        "C" => "<cfunction>".to_string(),
        other => format!("<{other}>"),
    }
}

pub(crate) fn describe_callable_label(value: &Value) -> LuaResult<String> {
    match value {
        Value::Function(func) => Ok(describe_function(func)),
        Value::String(s) => Ok(s.to_str()?.to_string()),
        Value::Nil => Ok("<nil>".to_string()),
        other => Ok(describe_value(other)),
    }
}

pub(crate) fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => text.to_str().ok().map(|s| s.to_string()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Boolean(b) => Some(b.to_string()),
        _ => None,
    }
}

pub(crate) fn describe_value(value: &Value) -> String {
    if let Some(text) = value_to_string(value) {
        return text;
    }
    match value {
        Value::Function(func) => describe_function(func),
        Value::Table(table) => match table.get::<_, String>("_id") {
            Ok(id) => id,
            Err(_) => "<table>".to_string(),
        },
        Value::Nil => "nil".to_string(),
        other => format!("<{}>", other.type_name()),
    }
}

pub(crate) fn value_to_bool(value: &Value) -> bool {
    match value {
        Value::Boolean(flag) => *flag,
        Value::Integer(i) => *i != 0,
        Value::Number(n) => *n != 0.0,
        Value::String(s) => s
            .to_str()
            .map(|text| text != "0" && text != "false")
            .unwrap_or(false),
        _ => false,
    }
}

/// Lua truthiness: everything but `nil` and `false`.
pub(crate) fn is_truthy(value: &Value) -> bool {
    !matches!(value, Value::Nil | Value::Boolean(false))
}

pub(crate) fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(i) => Some(*i as f64),
        Value::Number(n) => Some(*n),
        Value::String(s) => s.to_str().ok()?.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn value_to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(i) => Some(*i),
        Value::Number(n) if n.fract() == 0.0 => Some(*n as i64),
        Value::String(s) => s.to_str().ok()?.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn value_to_handle(value: &Value) -> Option<u32> {
    value_to_i64(value).and_then(|id| u32::try_from(id).ok())
}

/// Entity id from either its name or its global table.
pub(crate) fn value_to_entity_id(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => text.to_str().ok().map(str::to_string),
        Value::Table(table) => table.get::<_, String>("_id").ok(),
        _ => None,
    }
}

pub(crate) fn expect_number(function: &'static str, args: &[Value], index: usize) -> LuaResult<f64> {
    args.get(index)
        .and_then(value_to_f64)
        .ok_or_else(|| invalid_argument(function, "a number", args.get(index)))
}

pub(crate) fn expect_handle(function: &'static str, args: &[Value], index: usize) -> LuaResult<u32> {
    args.get(index)
        .and_then(value_to_handle)
        .ok_or_else(|| invalid_argument(function, "a handle", args.get(index)))
}

pub(crate) fn expect_entity(
    function: &'static str,
    args: &[Value],
    index: usize,
) -> LuaResult<String> {
    args.get(index)
        .and_then(value_to_entity_id)
        .ok_or_else(|| invalid_argument(function, "an actor or object", args.get(index)))
}

pub(crate) fn expect_string(
    function: &'static str,
    args: &[Value],
    index: usize,
) -> LuaResult<String> {
    args.get(index)
        .and_then(value_to_string)
        .ok_or_else(|| invalid_argument(function, "a string", args.get(index)))
}

fn join_values(args: &[Value]) -> String {
    args.iter()
        .map(describe_value)
        .collect::<Vec<_>>()
        .join(" ")
}

/// First returned value, or nil.
pub(crate) fn first_value(values: MultiValue) -> Value {
    values.into_iter().next().unwrap_or(Value::Nil)
}
