use std::collections::VecDeque;
use std::time::Duration;

use crate::scheduler::{Condition, Continuation, WorldView};

/// Whether a fired step lets the rest of its sentence run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepFlow {
    Continue,
    Stop,
}

/// Ordered steps of one verb invocation. Only the front step is ever
/// polled, and nothing is polled once the sentence is stopped.
#[derive(Debug)]
pub struct Sentence<A> {
    steps: VecDeque<Continuation<A>>,
    stopped: bool,
}

impl<A> Default for Sentence<A> {
    fn default() -> Self {
        Self {
            steps: VecDeque::new(),
            stopped: false,
        }
    }
}

impl<A> Sentence<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_step(&mut self, condition: Condition, action: A) {
        self.steps.push_back(Continuation::new(condition, action));
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> impl Iterator<Item = &Continuation<A>> {
        self.steps.iter()
    }

    /// Idempotent; drops every remaining step.
    pub fn stop(&mut self) {
        self.stopped = true;
        self.steps.clear();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn is_complete(&self) -> bool {
        self.stopped || self.steps.is_empty()
    }

    /// Polls the front step and pops its action when due. Lets a host run
    /// the action without holding the sentence borrowed.
    pub fn poll_front<P>(&mut self, world: &P, elapsed: Duration) -> Option<A>
    where
        P: WorldView + ?Sized,
    {
        if self.stopped {
            return None;
        }
        let front = self.steps.front_mut()?;
        if !front.poll(world, elapsed) {
            return None;
        }
        self.steps.pop_front().map(Continuation::into_action)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::Sentence;
    use crate::scheduler::{Condition, StubWorld};

    #[test]
    fn steps_fire_in_order_one_per_poll() {
        let world = StubWorld::default();
        let mut sentence = Sentence::new();
        sentence.push_step(Condition::Immediate, "a");
        sentence.push_step(Condition::Immediate, "b");
        sentence.push_step(Condition::Immediate, "c");

        let mut fired = Vec::new();
        while let Some(step) = sentence.poll_front(&world, Duration::ZERO) {
            fired.push(step);
        }
        assert_eq!(fired, vec!["a", "b", "c"]);
        assert!(sentence.is_complete());
        assert!(!sentence.is_stopped());
    }

    #[test]
    fn later_steps_wait_behind_a_blocked_front() {
        let mut world = StubWorld::default();
        world.walking.insert("guybrush".to_string(), true);
        let mut sentence = Sentence::new();
        sentence.push_step(
            Condition::ActorWalking {
                actor: "guybrush".to_string(),
            },
            "arrive",
        );
        sentence.push_step(Condition::Immediate, "execute");

        assert_eq!(sentence.poll_front(&world, Duration::ZERO), None);
        assert_eq!(sentence.poll_front(&world, Duration::ZERO), None);
        world.walking.insert("guybrush".to_string(), false);
        assert_eq!(sentence.poll_front(&world, Duration::ZERO), Some("arrive"));
        assert_eq!(sentence.poll_front(&world, Duration::ZERO), Some("execute"));
    }

    #[test]
    fn stopping_drops_the_rest() {
        let world = StubWorld::default();
        let mut sentence = Sentence::new();
        sentence.push_step(Condition::Immediate, "a");
        sentence.push_step(Condition::Immediate, "b");
        assert_eq!(sentence.poll_front(&world, Duration::ZERO), Some("a"));
        sentence.stop();
        assert!(sentence.is_stopped());
        assert!(sentence.is_empty());

        sentence.stop();
        assert!(sentence.is_stopped());
        assert_eq!(sentence.poll_front(&world, Duration::ZERO), None);
    }
}
