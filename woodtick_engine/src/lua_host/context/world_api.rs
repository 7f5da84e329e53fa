use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use anyhow::Result;
use mlua::{Lua, Value, Variadic};
use woodtick_formats::{Facing, Vec2, VerbId};

use super::bindings::{
    expect_entity, expect_handle, expect_number, expect_string, invalid_argument,
    value_to_entity_id, value_to_f64, value_to_string,
};
use super::EngineContext;
use crate::scheduler::ThreadId;

/// Optional trailing duration in seconds; absent or non-positive means
/// "until replaced" for animations and "instant" for camera pans.
fn optional_seconds(args: &[Value], index: usize) -> Option<Duration> {
    let seconds = args.get(index).and_then(value_to_f64)?;
    (seconds.is_finite() && seconds > 0.0).then(|| Duration::from_secs_f64(seconds))
}

fn missing(function: &str, id: &str) -> bool {
    log::warn!("{function}: no actor or object named `{id}`");
    false
}

pub(crate) fn install_world_api(lua: &Lua, context: Rc<RefCell<EngineContext>>) -> Result<()> {
    install_actor_functions(lua, &context)?;
    install_scene_functions(lua, &context)?;
    install_verb_functions(lua, &context)?;
    Ok(())
}

fn install_actor_functions(lua: &Lua, context: &Rc<RefCell<EngineContext>>) -> Result<()> {
    let globals = lua.globals();

    let select_state = context.clone();
    globals.set(
        "selectActor",
        lua.create_function(move |_, args: Variadic<Value>| {
            let actor = expect_entity("selectActor", &args, 0)?;
            let selected = select_state.borrow_mut().world.select_actor(&actor);
            Ok(selected || missing("selectActor", &actor))
        })?,
    )?;

    let selected_state = context.clone();
    globals.set(
        "selectedActor",
        lua.create_function(move |_, ()| {
            Ok(selected_state
                .borrow()
                .world
                .selected_actor()
                .map(str::to_string))
        })?,
    )?;

    let walk_state = context.clone();
    globals.set(
        "actorWalkTo",
        lua.create_function(move |_, args: Variadic<Value>| {
            let actor = expect_entity("actorWalkTo", &args, 0)?;
            let x = expect_number("actorWalkTo", &args, 1)? as f32;
            let y = expect_number("actorWalkTo", &args, 2)? as f32;
            let facing = match args.get(3) {
                None | Some(Value::Nil) => None,
                Some(value) => Some(
                    value_to_string(value)
                        .as_deref()
                        .and_then(Facing::parse)
                        .ok_or_else(|| invalid_argument("actorWalkTo", "a facing", Some(value)))?,
                ),
            };
            let walking = walk_state
                .borrow_mut()
                .world
                .walk_actor_to(&actor, Vec2::new(x, y), facing);
            Ok(walking || missing("actorWalkTo", &actor))
        })?,
    )?;

    let facing_state = context.clone();
    globals.set(
        "actorFacing",
        lua.create_function(move |_, args: Variadic<Value>| {
            let actor = expect_entity("actorFacing", &args, 0)?;
            Ok(facing_state
                .borrow()
                .world
                .actor_facing(&actor)
                .map(Facing::as_str))
        })?,
    )?;

    let position_state = context.clone();
    globals.set(
        "actorPosition",
        lua.create_function(move |_, args: Variadic<Value>| {
            let actor = expect_entity("actorPosition", &args, 0)?;
            let state = position_state.borrow();
            match state.world.actor(&actor) {
                Some(actor) => Ok((Some(actor.position.x), Some(actor.position.y))),
                None => Ok((None, None)),
            }
        })?,
    )?;

    let say_state = context.clone();
    globals.set(
        "sayLine",
        lua.create_function(move |_, args: Variadic<Value>| {
            let actor = expect_entity("sayLine", &args, 0)?;
            let line = expect_string("sayLine", &args, 1)?;
            let talking = say_state.borrow_mut().world.say_line(&actor, &line);
            Ok(talking || missing("sayLine", &actor))
        })?,
    )?;

    let stop_state = context.clone();
    globals.set(
        "stopTalking",
        lua.create_function(move |_, args: Variadic<Value>| {
            let actor = args.first().and_then(value_to_entity_id);
            stop_state
                .borrow_mut()
                .world
                .stop_talking(actor.as_deref());
            Ok(())
        })?,
    )?;

    let animation_state = context.clone();
    globals.set(
        "playAnimation",
        lua.create_function(move |_, args: Variadic<Value>| {
            let actor = expect_entity("playAnimation", &args, 0)?;
            let name = expect_string("playAnimation", &args, 1)?;
            let length = optional_seconds(&args, 2);
            let playing = animation_state
                .borrow_mut()
                .world
                .play_actor_animation(&actor, &name, length);
            Ok(playing || missing("playAnimation", &actor))
        })?,
    )?;

    let object_state = context.clone();
    globals.set(
        "playObjectAnimation",
        lua.create_function(move |_, args: Variadic<Value>| {
            let object = expect_entity("playObjectAnimation", &args, 0)?;
            let name = expect_string("playObjectAnimation", &args, 1)?;
            let length = optional_seconds(&args, 2);
            let playing = object_state
                .borrow_mut()
                .world
                .play_object_animation(&object, &name, length);
            Ok(playing || missing("playObjectAnimation", &object))
        })?,
    )?;

    Ok(())
}

fn install_scene_functions(lua: &Lua, context: &Rc<RefCell<EngineContext>>) -> Result<()> {
    let globals = lua.globals();

    let room_state = context.clone();
    globals.set(
        "setRoom",
        lua.create_function(move |_, args: Variadic<Value>| {
            let room = expect_string("setRoom", &args, 0)?;
            let mut state = room_state.borrow_mut();
            let names: BTreeMap<ThreadId, String> = state
                .threads
                .iter()
                .map(|thread| (thread.id(), thread.name().to_string()))
                .collect();
            for id in state.threads.stop_scene_threads() {
                let name = names.get(&id).map_or("<thread>", String::as_str);
                state.log_event(format!("thread.stop {name} (#{id})"));
            }
            state.world.set_room(&room);
            Ok(())
        })?,
    )?;

    let current_room_state = context.clone();
    globals.set(
        "currentRoom",
        lua.create_function(move |_, ()| Ok(current_room_state.borrow().world.room().to_string()))?,
    )?;

    let sound_state = context.clone();
    globals.set(
        "playSound",
        lua.create_function(move |_, args: Variadic<Value>| {
            let name = expect_string("playSound", &args, 0)?;
            let length = optional_seconds(&args, 1);
            Ok(sound_state.borrow_mut().world.play_sound(&name, length))
        })?,
    )?;

    let stop_sound_state = context.clone();
    globals.set(
        "stopSound",
        lua.create_function(move |_, args: Variadic<Value>| {
            let id = expect_handle("stopSound", &args, 0)?;
            Ok(stop_sound_state.borrow_mut().world.stop_sound(id))
        })?,
    )?;

    let camera_state = context.clone();
    globals.set(
        "cameraPanTo",
        lua.create_function(move |_, args: Variadic<Value>| {
            let x = expect_number("cameraPanTo", &args, 0)? as f32;
            let y = expect_number("cameraPanTo", &args, 1)? as f32;
            let length = optional_seconds(&args, 2).unwrap_or(Duration::ZERO);
            camera_state
                .borrow_mut()
                .world
                .pan_camera(Vec2::new(x, y), length);
            Ok(())
        })?,
    )?;

    let dialog_state = context.clone();
    globals.set(
        "startDialog",
        lua.create_function(move |_, args: Variadic<Value>| {
            let name = expect_string("startDialog", &args, 0)?;
            dialog_state.borrow_mut().world.start_dialog(&name);
            Ok(())
        })?,
    )?;

    let end_dialog_state = context.clone();
    globals.set(
        "endDialog",
        lua.create_function(move |_, ()| {
            end_dialog_state.borrow_mut().world.end_dialog();
            Ok(())
        })?,
    )?;

    let cutscene_state = context.clone();
    globals.set(
        "beginCutscene",
        lua.create_function(move |_, ()| {
            cutscene_state.borrow_mut().world.begin_cutscene();
            Ok(())
        })?,
    )?;

    let end_cutscene_state = context.clone();
    globals.set(
        "endCutscene",
        lua.create_function(move |_, ()| {
            end_cutscene_state.borrow_mut().world.end_cutscene();
            Ok(())
        })?,
    )?;

    let input_on_state = context.clone();
    globals.set(
        "inputOn",
        lua.create_function(move |_, ()| {
            input_on_state.borrow_mut().world.set_input_active(true);
            Ok(())
        })?,
    )?;

    let input_off_state = context.clone();
    globals.set(
        "inputOff",
        lua.create_function(move |_, ()| {
            input_off_state.borrow_mut().world.set_input_active(false);
            Ok(())
        })?,
    )?;

    let input_query_state = context.clone();
    globals.set(
        "isInputOn",
        lua.create_function(move |_, ()| Ok(input_query_state.borrow().world.input_active()))?,
    )?;

    let time_state = context.clone();
    globals.set(
        "gameTime",
        lua.create_function(move |_, ()| Ok(time_state.borrow().world.clock().as_secs_f64()))?,
    )?;

    let frame_state = context.clone();
    globals.set(
        "gameFrame",
        lua.create_function(move |_, ()| Ok(frame_state.borrow().world.frame()))?,
    )?;

    Ok(())
}

fn install_verb_functions(lua: &Lua, context: &Rc<RefCell<EngineContext>>) -> Result<()> {
    let globals = lua.globals();

    let set_state = context.clone();
    globals.set(
        "setVerb",
        lua.create_function(move |_, args: Variadic<Value>| {
            let verb = expect_number("setVerb", &args, 0)? as VerbId;
            set_state.borrow_mut().world.set_verb(verb);
            Ok(())
        })?,
    )?;

    let current_state = context.clone();
    globals.set(
        "currentVerb",
        lua.create_function(move |_, ()| Ok(current_state.borrow().world.active_verb()))?,
    )?;

    let owner_state = context.clone();
    globals.set(
        "objectOwner",
        lua.create_function(move |_, args: Variadic<Value>| {
            let object = expect_entity("objectOwner", &args, 0)?;
            Ok(owner_state
                .borrow()
                .world
                .object_owner(&object)
                .map(str::to_string))
        })?,
    )?;

    let give_state = context.clone();
    globals.set(
        "giveObject",
        lua.create_function(move |_, args: Variadic<Value>| {
            let object = expect_entity("giveObject", &args, 0)?;
            let receiver = expect_entity("giveObject", &args, 1)?;
            let given = give_state
                .borrow_mut()
                .world
                .give_object(&object, &receiver);
            Ok(given || missing("giveObject", &object))
        })?,
    )?;

    let flags_state = context.clone();
    globals.set(
        "setObjectFlags",
        lua.create_function(move |_, args: Variadic<Value>| {
            let object = expect_entity("setObjectFlags", &args, 0)?;
            let flags = expect_handle("setObjectFlags", &args, 1)?;
            let set = flags_state
                .borrow_mut()
                .world
                .set_object_flags(&object, flags);
            Ok(set || missing("setObjectFlags", &object))
        })?,
    )?;

    Ok(())
}
