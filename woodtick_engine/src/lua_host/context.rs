use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

mod bindings;
mod callbacks;
mod pause;
mod scripts;
mod sentences;
mod waits;
mod world_api;

pub(super) use bindings::{bind_entity_tables, call_boot, execute_script, install_globals};
pub(super) use sentences::push_sentence;
pub use pause::{PauseEvent, PauseLabel};
pub use sentences::SentenceOutcome;

use mlua::Lua;
use serde::Serialize;

use callbacks::CallbackRegistry;
use pause::PauseState;
use scripts::LuaCoroutine;

use crate::scheduler::{
    Condition, Continuation, ContinuationQueue, ThreadId, ThreadRegistry, Verdict, WorldView,
};
use crate::sentence::Sentence;
use crate::verbs::VerbStep;
use crate::world::{SoundId, World};

use super::{ContinuationSummary, RunSummary, SentenceSummary, ThreadSummary};

/// What a queued continuation does once its condition holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Wakeup {
    Thread { thread: ThreadId },
    Callback { callback: u32 },
}

#[derive(Debug)]
pub(super) struct ActiveSentence {
    serial: u64,
    label: String,
    sentence: Sentence<VerbStep>,
}

/// Everything the Lua bindings share: the world stand-in, the thread
/// registry, the continuation queue and the sentence slot.
#[derive(Debug)]
pub struct EngineContext {
    verbose: bool,
    world: World,
    threads: ThreadRegistry<LuaCoroutine>,
    queue: ContinuationQueue<Wakeup>,
    sentence: Option<ActiveSentence>,
    next_sentence: u64,
    callbacks: CallbackRegistry,
    pause: PauseState,
}

impl EngineContext {
    pub(super) fn new(world: World, verbose: bool) -> Self {
        EngineContext {
            verbose,
            world,
            threads: ThreadRegistry::new(),
            queue: ContinuationQueue::new(),
            sentence: None,
            next_sentence: 1,
            callbacks: CallbackRegistry::new(),
            pause: PauseState::default(),
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn live_threads(&self) -> usize {
        self.threads.len()
    }

    pub fn queue(&self) -> &ContinuationQueue<Wakeup> {
        &self.queue
    }

    pub fn events(&self) -> &[String] {
        self.world.events()
    }

    pub fn is_paused(&self) -> bool {
        self.pause.active
    }

    /// Step names still pending in the active sentence.
    pub fn sentence_steps(&self) -> Option<Vec<&'static str>> {
        self.sentence.as_ref().map(|active| {
            active
                .sentence
                .steps()
                .map(|step| step.action().name())
                .collect()
        })
    }

    /// Nothing left to run: no live threads, no queued continuations, no
    /// sentence and no actor still walking or talking.
    pub fn is_idle(&self) -> bool {
        self.threads.is_empty()
            && self.queue.is_empty()
            && self.sentence.is_none()
            && !self
                .world
                .actors()
                .any(|actor| actor.is_walking() || actor.is_talking())
    }

    pub(super) fn log_event(&mut self, event: impl Into<String>) {
        let event = event.into();
        if self.verbose {
            log::info!("{event}");
        }
        self.world.log_event(event);
    }

    pub(super) fn choose_dialog(&mut self, choice: i64) {
        self.world.choose_dialog(choice);
    }

    pub(super) fn handle_pause_request(&mut self, label: PauseLabel) {
        let active = label == PauseLabel::Pause;
        if self.pause.active == active {
            return;
        }
        self.pause.record(label, self.world.frame());
        let state = if active { "on" } else { "off" };
        self.log_event(format!("game_pauser.{} {state}", label.as_str()));
    }

    /// Pause holds back wakeups of pauseable threads; they are neither
    /// polled nor fired until the game resumes.
    fn is_frozen(&self, wakeup: &Wakeup) -> bool {
        if !self.pause.active {
            return false;
        }
        match wakeup {
            Wakeup::Thread { thread } => self
                .threads
                .get(*thread)
                .is_some_and(|thread| thread.is_pauseable()),
            Wakeup::Callback { .. } => false,
        }
    }

    fn is_stale(&self, wakeup: &Wakeup) -> bool {
        match wakeup {
            Wakeup::Thread { thread } => !self.threads.contains(*thread),
            Wakeup::Callback { callback } => !self.callbacks.contains(*callback),
        }
    }

    pub(super) fn summary(&self) -> RunSummary {
        RunSummary {
            room: self.world.room().to_string(),
            frame: self.world.frame(),
            clock_seconds: self.world.clock().as_secs_f64(),
            selected_actor: self.world.selected_actor().map(str::to_string),
            paused: self.pause.active,
            pauses: self.pause.history.clone(),
            threads: self
                .threads
                .iter()
                .map(|thread| ThreadSummary {
                    id: thread.id(),
                    name: thread.name().to_string(),
                    global: thread.is_global(),
                    pauseable: thread.is_pauseable(),
                    state: thread.state(),
                })
                .collect(),
            continuations: self
                .queue
                .iter()
                .map(|continuation| ContinuationSummary {
                    condition: continuation.condition().clone(),
                    wakeup: *continuation.action(),
                })
                .collect(),
            sentence: self.sentence.as_ref().map(|active| SentenceSummary {
                label: active.label.clone(),
                steps: active
                    .sentence
                    .steps()
                    .map(|step| step.action().name())
                    .collect(),
            }),
            use_request: self.world.use_request().cloned(),
            dialog_choices: self.world.dialog_choices().to_vec(),
            events: self.world.events().to_vec(),
        }
    }
}

impl WorldView for EngineContext {
    fn actor_walking(&self, actor: &str) -> Option<bool> {
        self.world.actor_walking(actor)
    }

    fn actor_talking(&self, actor: &str) -> Option<bool> {
        self.world.actor_talking(actor)
    }

    fn any_actor_talking(&self) -> bool {
        self.world.any_actor_talking()
    }

    fn actor_animation(&self, actor: &str) -> Option<&str> {
        self.world.actor_animation(actor)
    }

    fn object_animating(&self, object: &str) -> Option<bool> {
        self.world.object_animating(object)
    }

    fn camera_moving(&self) -> bool {
        self.world.camera_moving()
    }

    fn dialog_active(&self) -> bool {
        self.world.dialog_active()
    }

    fn cutscene_active(&self) -> bool {
        self.world.cutscene_active()
    }

    fn input_active(&self) -> bool {
        self.world.input_active()
    }

    fn sound_playing(&self, sound: SoundId) -> Option<bool> {
        self.world.sound_playing(sound)
    }

    fn thread_running(&self, thread: ThreadId) -> bool {
        self.threads.contains(thread)
    }
}

/// Advances the world, then the continuation queue, then the active
/// sentence. Script errors raised along the way are logged, never returned.
pub(super) fn tick(lua: &Lua, context: &Rc<RefCell<EngineContext>>, elapsed: Duration) {
    context.borrow_mut().world.update(elapsed);
    drive_continuations(lua, context, elapsed);
    sentences::drive_sentence(lua, context, elapsed);
    lua.expire_registry_values();
}

/// Polls every continuation that was pending when the tick started. The
/// queue is detached while it ticks and no borrow of the context is held
/// while a wakeup runs script code, so the code may queue new
/// continuations; those land behind the survivors and wait for the next tick.
fn drive_continuations(lua: &Lua, context: &Rc<RefCell<EngineContext>>, elapsed: Duration) {
    let mut queue = std::mem::take(&mut context.borrow_mut().queue);
    queue.tick(
        |continuation| {
            let state = context.borrow();
            if state.is_stale(continuation.action()) {
                log::debug!("dropping stale wakeup {:?}", continuation.action());
                return Verdict::Stale;
            }
            if state.is_frozen(continuation.action()) || !continuation.poll(&*state, elapsed) {
                return Verdict::Pending;
            }
            Verdict::Due
        },
        |wakeup| match wakeup {
            Wakeup::Thread { thread } => scripts::resume_thread(lua, context, thread),
            Wakeup::Callback { callback } => callbacks::fire_callback(lua, context, callback),
        },
    );
    let mut state = context.borrow_mut();
    let added = std::mem::replace(&mut state.queue, queue);
    state.queue.append(added);
}

/// Queues `wakeup` behind `condition`.
fn enqueue(state: &mut EngineContext, condition: Condition, wakeup: Wakeup) {
    state.queue.enqueue(Continuation::new(condition, wakeup));
}
