use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Result;
use mlua::Lua;
use serde::Serialize;

use super::EngineContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseLabel {
    Pause,
    Resume,
}

impl PauseLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            PauseLabel::Pause => "pause",
            PauseLabel::Resume => "resume",
        }
    }
}

/// A pause transition and the frame it happened on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PauseEvent {
    pub label: PauseLabel,
    pub frame: u64,
}

#[derive(Debug, Default, Clone)]
pub(crate) struct PauseState {
    pub(super) active: bool,
    pub(super) history: Vec<PauseEvent>,
}

impl PauseState {
    pub(crate) fn record(&mut self, label: PauseLabel, frame: u64) {
        self.history.push(PauseEvent { label, frame });
        self.active = label == PauseLabel::Pause;
    }
}

pub(crate) fn install_game_pauser(lua: &Lua, context: Rc<RefCell<EngineContext>>) -> Result<()> {
    let globals = lua.globals();
    let game_pauser = lua.create_table()?;

    let pause_context = context.clone();
    game_pauser.set(
        "pause",
        lua.create_function(move |_, ()| {
            pause_context
                .borrow_mut()
                .handle_pause_request(PauseLabel::Pause);
            Ok(())
        })?,
    )?;

    let resume_context = context.clone();
    game_pauser.set(
        "resume",
        lua.create_function(move |_, ()| {
            resume_context
                .borrow_mut()
                .handle_pause_request(PauseLabel::Resume);
            Ok(())
        })?,
    )?;

    let query_context = context;
    game_pauser.set(
        "isPaused",
        lua.create_function(move |_, ()| Ok(query_context.borrow().pause.active))?,
    )?;

    globals.set("game_pauser", game_pauser)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_tracks_transitions() {
        let mut state = PauseState::default();
        state.record(PauseLabel::Pause, 3);
        assert!(state.active);
        state.record(PauseLabel::Resume, 9);
        assert!(!state.active);
        assert_eq!(
            state.history,
            vec![
                PauseEvent {
                    label: PauseLabel::Pause,
                    frame: 3
                },
                PauseEvent {
                    label: PauseLabel::Resume,
                    frame: 9
                },
            ]
        );
    }
}
