use std::collections::BTreeMap;
use std::rc::Rc;

use super::thread::{ExitReason, RunState, ScriptThread, SegmentEnd, ThreadId};
use super::SchedulerError;
use crate::handles::{HandlePool, THREAD_IDS};

/// Frame on the execution stack: a script thread, or host-invoked script
/// code (verb hooks, callbacks) that has no thread of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Thread(ThreadId),
    Hook,
}

/// Live script threads keyed by handle, plus the stack of whatever script
/// code is executing right now.
#[derive(Debug)]
pub struct ThreadRegistry<C> {
    threads: BTreeMap<ThreadId, ScriptThread<C>>,
    handles: HandlePool,
    running: Vec<Frame>,
}

impl<C> Default for ThreadRegistry<C> {
    fn default() -> Self {
        Self {
            threads: BTreeMap::new(),
            handles: HandlePool::new(THREAD_IDS),
            running: Vec::new(),
        }
    }
}

impl<C> ThreadRegistry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(
        &mut self,
        name: impl Into<String>,
        global: bool,
        coroutine: C,
    ) -> Result<ThreadId, SchedulerError> {
        let id = self
            .handles
            .allocate()
            .ok_or(SchedulerError::ThreadHandlesExhausted)?;
        self.threads
            .insert(id, ScriptThread::new(id, name.into(), global, coroutine));
        Ok(id)
    }

    /// Live thread lookup. Stopped threads are never returned.
    pub fn get(&self, id: ThreadId) -> Option<&ScriptThread<C>> {
        self.threads.get(&id).filter(|thread| !thread.is_stopped())
    }

    pub fn get_mut(&mut self, id: ThreadId) -> Option<&mut ScriptThread<C>> {
        self.threads.get_mut(&id).filter(|thread| !thread.is_stopped())
    }

    pub fn contains(&self, id: ThreadId) -> bool {
        self.get(id).is_some()
    }

    /// Whether `id` lies in the thread handle range, live or not.
    pub fn is_thread_handle(&self, id: u32) -> bool {
        self.handles.owns(id)
    }

    pub fn len(&self) -> usize {
        self.threads.values().filter(|t| !t.is_stopped()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScriptThread<C>> {
        self.threads.values().filter(|thread| !thread.is_stopped())
    }

    /// Thread whose code is executing at the top of the stack, even if it
    /// was stopped mid-segment. `None` at the top level and inside
    /// host-invoked hooks.
    pub fn current(&self) -> Option<ThreadId> {
        match self.running.last() {
            Some(Frame::Thread(id)) if self.threads.contains_key(id) => Some(*id),
            _ => None,
        }
    }

    pub fn enter_hook(&mut self) {
        self.running.push(Frame::Hook);
    }

    pub fn leave_hook(&mut self) {
        if let Some(index) = self.running.iter().rposition(|frame| *frame == Frame::Hook) {
            self.running.remove(index);
        }
    }

    pub fn suspend(&mut self, id: ThreadId) -> bool {
        self.get_mut(id).map(ScriptThread::suspend).unwrap_or(false)
    }

    pub fn set_pauseable(&mut self, id: ThreadId, pauseable: bool) -> bool {
        match self.get_mut(id) {
            Some(thread) => {
                thread.set_pauseable(pauseable);
                true
            }
            None => false,
        }
    }

    /// Forces a thread to stopped. A thread that is not executing is
    /// released immediately; one on the stack is released when its segment
    /// returns.
    pub fn stop(&mut self, id: ThreadId) -> bool {
        let Some(thread) = self.get_mut(id) else {
            return false;
        };
        thread.stop();
        if !self.is_executing(id) {
            self.release(id);
        }
        true
    }

    /// Stops every scene-scoped thread, as happens when the room unloads.
    pub fn stop_scene_threads(&mut self) -> Vec<ThreadId> {
        let doomed: Vec<ThreadId> = self
            .iter()
            .filter(|thread| !thread.is_global())
            .map(ScriptThread::id)
            .collect();
        for id in &doomed {
            self.stop(*id);
        }
        doomed
    }

    /// Pushes a freshly spawned thread for its first segment.
    pub fn begin_call(&mut self, id: ThreadId) -> Option<Rc<C>> {
        let coroutine = self.get(id)?.entry()?;
        self.running.push(Frame::Thread(id));
        Some(coroutine)
    }

    /// Wakes a suspended thread and pushes it; `None` when the thread is
    /// gone, stopped or not suspended, which makes stale wakeups no-ops.
    pub fn begin_resume(&mut self, id: ThreadId) -> Option<Rc<C>> {
        let coroutine = self.get_mut(id)?.wake()?;
        self.running.push(Frame::Thread(id));
        Some(coroutine)
    }

    /// Pops the thread after a segment and applies its outcome. Exited
    /// threads are removed and their handle released.
    pub fn finish(&mut self, id: ThreadId, run: RunState) -> SegmentEnd {
        if let Some(index) = self
            .running
            .iter()
            .rposition(|frame| *frame == Frame::Thread(id))
        {
            self.running.remove(index);
        }
        let end = match self.threads.get_mut(&id) {
            Some(thread) => thread.settle(run),
            None => SegmentEnd::Exited(ExitReason::Stopped),
        };
        if matches!(end, SegmentEnd::Exited(_)) && !self.is_executing(id) {
            self.release(id);
        }
        end
    }

    fn is_executing(&self, id: ThreadId) -> bool {
        self.running.contains(&Frame::Thread(id))
    }

    fn release(&mut self, id: ThreadId) {
        self.threads.remove(&id);
        self.handles.release(id);
    }
}
