use std::rc::Rc;

use serde::Serialize;

pub type ThreadId = u32;

/// Outcome of running a coroutine up to its next suspension point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Yielded,
    Completed,
    Failed(String),
}

/// The only contract the scheduler needs from a script VM coroutine.
pub trait Coroutine {
    type Vm: ?Sized;

    fn resume(&self, vm: &Self::Vm) -> RunState;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadState {
    Running,
    Suspended,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Completed,
    Stopped,
    Failed(String),
}

/// How a segment of script execution ended, as seen by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentEnd {
    /// Suspended by a wait primitive; its continuation is already queued.
    Waiting,
    /// Yielded without a wait primitive; the host decides when to wake it.
    Yielded,
    Exited(ExitReason),
}

#[derive(Debug)]
pub struct ScriptThread<C> {
    id: ThreadId,
    name: String,
    global: bool,
    pauseable: bool,
    state: ThreadState,
    coroutine: Rc<C>,
}

impl<C> ScriptThread<C> {
    pub(crate) fn new(id: ThreadId, name: String, global: bool, coroutine: C) -> Self {
        Self {
            id,
            name,
            global,
            pauseable: true,
            state: ThreadState::Running,
            coroutine: Rc::new(coroutine),
        }
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_global(&self) -> bool {
        self.global
    }

    pub fn is_pauseable(&self) -> bool {
        self.pauseable
    }

    pub fn set_pauseable(&mut self, pauseable: bool) {
        self.pauseable = pauseable;
    }

    pub fn state(&self) -> ThreadState {
        self.state
    }

    pub fn is_stopped(&self) -> bool {
        self.state == ThreadState::Stopped
    }

    /// Running -> Suspended. Refused in any other state.
    pub fn suspend(&mut self) -> bool {
        if self.state == ThreadState::Running {
            self.state = ThreadState::Suspended;
            true
        } else {
            false
        }
    }

    pub fn stop(&mut self) {
        self.state = ThreadState::Stopped;
    }

    /// Suspended -> Running, handing out the coroutine to re-enter.
    pub(crate) fn wake(&mut self) -> Option<Rc<C>> {
        if self.state != ThreadState::Suspended {
            return None;
        }
        self.state = ThreadState::Running;
        Some(Rc::clone(&self.coroutine))
    }

    /// Coroutine for the first segment; only valid before it ever suspended.
    pub(crate) fn entry(&self) -> Option<Rc<C>> {
        (self.state == ThreadState::Running).then(|| Rc::clone(&self.coroutine))
    }

    pub(crate) fn settle(&mut self, run: RunState) -> SegmentEnd {
        if self.state == ThreadState::Stopped {
            return SegmentEnd::Exited(ExitReason::Stopped);
        }
        match run {
            RunState::Completed => {
                self.state = ThreadState::Stopped;
                SegmentEnd::Exited(ExitReason::Completed)
            }
            RunState::Failed(message) => {
                self.state = ThreadState::Stopped;
                SegmentEnd::Exited(ExitReason::Failed(message))
            }
            RunState::Yielded => {
                if self.state == ThreadState::Suspended {
                    SegmentEnd::Waiting
                } else {
                    self.state = ThreadState::Suspended;
                    SegmentEnd::Yielded
                }
            }
        }
    }
}
