//! Embedded Lua host: script threads, wait primitives, verb hooks and the
//! per-tick driver, all sharing one `EngineContext`.

mod context;

pub use context::{EngineContext, PauseEvent, PauseLabel, SentenceOutcome, Wakeup};

use std::cell::{Ref, RefCell};
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use mlua::{Lua, LuaOptions, StdLib};
use serde::Serialize;
use woodtick_formats::verbs::VERB_DIALOG;
use woodtick_formats::{SceneFile, VerbId};

use crate::scheduler::{Condition, ThreadId, ThreadState};
use crate::verbs::VerbRequest;
use crate::world::{AudioCallback, UseRequest, World};

#[derive(Debug, Clone, Serialize)]
pub struct ThreadSummary {
    pub id: ThreadId,
    pub name: String,
    pub global: bool,
    pub pauseable: bool,
    pub state: ThreadState,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContinuationSummary {
    pub condition: Condition,
    pub wakeup: Wakeup,
}

#[derive(Debug, Clone, Serialize)]
pub struct SentenceSummary {
    pub label: String,
    pub steps: Vec<&'static str>,
}

/// Snapshot of the engine at the end of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub room: String,
    pub frame: u64,
    pub clock_seconds: f64,
    pub selected_actor: Option<String>,
    pub paused: bool,
    pub pauses: Vec<PauseEvent>,
    pub threads: Vec<ThreadSummary>,
    pub continuations: Vec<ContinuationSummary>,
    pub sentence: Option<SentenceSummary>,
    pub use_request: Option<UseRequest>,
    pub dialog_choices: Vec<i64>,
    pub events: Vec<String>,
}

/// A Lua VM bound to one scene.
pub struct ScriptHost {
    lua: Lua,
    context: Rc<RefCell<EngineContext>>,
}

impl ScriptHost {
    pub fn new(
        scene: &SceneFile,
        audio_callback: Option<Rc<dyn AudioCallback>>,
        verbose: bool,
    ) -> Result<Self> {
        let lua = Lua::new_with(StdLib::ALL_SAFE, LuaOptions::default())
            .context("initialising Lua runtime with standard libraries")?;
        let world = World::from_scene(scene, audio_callback);
        let context = Rc::new(RefCell::new(EngineContext::new(world, verbose)));
        context::install_globals(&lua, context.clone())?;
        context::bind_entity_tables(&lua, &context)?;
        Ok(ScriptHost { lua, context })
    }

    /// Runs a script file's main chunk, then re-binds entity tables so hooks
    /// defined on fresh tables still resolve.
    pub fn load_script(&self, path: &Path) -> Result<()> {
        context::execute_script(&self.lua, path)?;
        context::bind_entity_tables(&self.lua, &self.context)
    }

    pub fn exec(&self, source: &str, name: &str) -> Result<()> {
        self.lua
            .load(source)
            .set_name(name)
            .exec()
            .with_context(|| format!("executing {name}"))?;
        context::bind_entity_tables(&self.lua, &self.context)
    }

    /// Calls the script's `boot()` if it defines one.
    pub fn call_boot(&self) -> Result<bool> {
        context::call_boot(&self.lua, &self.context)
    }

    /// Queues a verb sentence as if the player had clicked it. `dialog`
    /// records `target` as the chosen dialog line instead.
    pub fn push_sentence(
        &self,
        verb: Option<VerbId>,
        target: &str,
        second: Option<&str>,
    ) -> Result<SentenceOutcome> {
        if verb == Some(VERB_DIALOG) {
            let choice = target
                .parse::<i64>()
                .with_context(|| format!("dialog choice `{target}` is not a number"))?;
            self.context.borrow_mut().choose_dialog(choice);
            return Ok(SentenceOutcome::DialogChoice(choice));
        }
        let request = {
            let state = self.context.borrow();
            let resolve = |id: &str| {
                state
                    .world()
                    .entity(id)
                    .ok_or_else(|| anyhow!("no actor or object named `{id}` in the scene"))
            };
            VerbRequest {
                verb,
                target: resolve(target)?,
                second: second.map(resolve).transpose()?,
            }
        };
        Ok(context::push_sentence(&self.lua, &self.context, &request))
    }

    pub fn tick(&self, elapsed: Duration) {
        context::tick(&self.lua, &self.context, elapsed);
    }

    pub fn context(&self) -> Ref<'_, EngineContext> {
        self.context.borrow()
    }

    pub fn is_idle(&self) -> bool {
        self.context.borrow().is_idle()
    }

    pub fn summary(&self) -> RunSummary {
        self.context.borrow().summary()
    }

    pub fn lua(&self) -> &Lua {
        &self.lua
    }
}

pub fn dump_runtime_summary(summary: &RunSummary) {
    println!("Lua runtime summary:");
    println!("  Room: {}", summary.room);
    println!(
        "  Frame: {} ({:.2}s)",
        summary.frame, summary.clock_seconds
    );
    println!(
        "  Selected actor: {}",
        summary.selected_actor.as_deref().unwrap_or("<none>")
    );
    if summary.paused {
        println!("  Game paused");
    }
    if summary.threads.is_empty() {
        println!("  Threads: <none>");
    } else {
        println!("  Threads:");
        for thread in &summary.threads {
            let scope = if thread.global { "global" } else { "scene" };
            println!(
                "    - #{} {} [{scope}, {:?}]",
                thread.id, thread.name, thread.state
            );
        }
    }
    if !summary.continuations.is_empty() {
        println!("  Pending continuations: {}", summary.continuations.len());
    }
    if let Some(sentence) = &summary.sentence {
        println!(
            "  Active sentence: {} [{}]",
            sentence.label,
            sentence.steps.join(" -> ")
        );
    }
    if let Some(request) = &summary.use_request {
        println!(
            "  Use mode: {} {}",
            request.flag.as_str(),
            request.entity.id
        );
    }
    if !summary.events.is_empty() {
        println!("  Event log:");
        for event in &summary.events {
            println!("    - {event}");
        }
    }
}
