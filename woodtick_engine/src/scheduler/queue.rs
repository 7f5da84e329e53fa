use std::time::Duration;

use serde::Serialize;

use super::condition::{Condition, WorldView};

/// A deferred action paired with the predicate that releases it.
#[derive(Debug, Clone, Serialize)]
pub struct Continuation<A> {
    condition: Condition,
    action: A,
}

impl<A> Continuation<A> {
    pub fn new(condition: Condition, action: A) -> Self {
        Self { condition, action }
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    pub fn action(&self) -> &A {
        &self.action
    }

    pub fn poll<P>(&mut self, world: &P, elapsed: Duration) -> bool
    where
        P: WorldView + ?Sized,
    {
        self.condition.poll(world, elapsed)
    }

    pub fn into_action(self) -> A {
        self.action
    }
}

/// What a tick does with one pending continuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Due,
    Pending,
    /// The target is gone; the continuation is dropped without firing.
    Stale,
}

/// Pending continuations in insertion order. Each tick drains the list,
/// fires whatever became due and keeps the rest in their original order.
#[derive(Debug)]
pub struct ContinuationQueue<A> {
    pending: Vec<Continuation<A>>,
}

impl<A> Default for ContinuationQueue<A> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
        }
    }
}

impl<A> ContinuationQueue<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, continuation: Continuation<A>) {
        self.pending.push(continuation);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Continuation<A>> {
        self.pending.iter()
    }

    /// Samples every pending continuation once, in insertion order, and
    /// hands due actions to `fire`. Returns how many fired.
    pub fn tick<S, F>(&mut self, mut sample: S, mut fire: F) -> usize
    where
        S: FnMut(&mut Continuation<A>) -> Verdict,
        F: FnMut(A),
    {
        let pending = std::mem::take(&mut self.pending);
        let mut fired = 0;
        for mut continuation in pending {
            match sample(&mut continuation) {
                Verdict::Due => {
                    fire(continuation.into_action());
                    fired += 1;
                }
                Verdict::Pending => self.pending.push(continuation),
                Verdict::Stale => {}
            }
        }
        fired
    }

    /// Moves everything in `later` behind the current entries.
    pub fn append(&mut self, mut later: ContinuationQueue<A>) {
        self.pending.append(&mut later.pending);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{Continuation, ContinuationQueue, Verdict};
    use crate::scheduler::StubWorld;
    use crate::scheduler::Condition;

    fn poll(world: &StubWorld) -> impl FnMut(&mut Continuation<&'static str>) -> Verdict + '_ {
        move |continuation| {
            if continuation.poll(world, Duration::ZERO) {
                Verdict::Due
            } else {
                Verdict::Pending
            }
        }
    }

    #[test]
    fn fires_once_on_first_due_tick() {
        let world = StubWorld::default();
        let mut queue = ContinuationQueue::new();
        queue.enqueue(Continuation::new(Condition::frames(2), "wake"));

        let mut fired = Vec::new();
        for tick in 1..=4 {
            queue.tick(poll(&world), |action| fired.push((tick, action)));
        }
        assert_eq!(fired, vec![(2, "wake")]);
        assert!(queue.is_empty());
    }

    #[test]
    fn shorter_frame_waits_fire_first() {
        let world = StubWorld::default();
        let mut queue = ContinuationQueue::new();
        queue.enqueue(Continuation::new(Condition::frames(5), "long"));
        queue.enqueue(Continuation::new(Condition::frames(2), "short"));

        let mut fired = Vec::new();
        while !queue.is_empty() {
            queue.tick(poll(&world), |action| fired.push(action));
        }
        assert_eq!(fired, vec!["short", "long"]);
    }

    #[test]
    fn due_continuations_fire_in_insertion_order() {
        let mut world = StubWorld::default();
        world.camera_moving = true;
        let mut queue = ContinuationQueue::new();
        for (name, condition) in [
            ("a", Condition::Immediate),
            ("b", Condition::CameraMoving),
            ("c", Condition::Immediate),
            ("d", Condition::CameraMoving),
        ] {
            queue.enqueue(Continuation::new(condition, name));
        }

        let mut fired = Vec::new();
        assert_eq!(queue.tick(poll(&world), |action| fired.push(action)), 2);
        assert_eq!(fired, vec!["a", "c"]);
        let order: Vec<_> = queue.iter().map(|continuation| *continuation.action()).collect();
        assert_eq!(order, vec!["b", "d"]);
    }

    #[test]
    fn stale_continuations_are_dropped_unfired() {
        let mut queue = ContinuationQueue::new();
        queue.enqueue(Continuation::new(Condition::Immediate, "gone"));
        queue.enqueue(Continuation::new(Condition::Immediate, "live"));

        let mut fired = Vec::new();
        queue.tick(
            |continuation| {
                if *continuation.action() == "gone" {
                    Verdict::Stale
                } else {
                    Verdict::Due
                }
            },
            |action| fired.push(action),
        );
        assert_eq!(fired, vec!["live"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn work_added_during_a_tick_waits_behind_the_survivors() {
        let mut world = StubWorld::default();
        world.camera_moving = true;
        let mut queue = ContinuationQueue::new();
        queue.enqueue(Continuation::new(Condition::Immediate, "now"));
        queue.enqueue(Continuation::new(Condition::CameraMoving, "survivor"));

        let mut detached = std::mem::take(&mut queue);
        detached.tick(poll(&world), |_| {
            queue.enqueue(Continuation::new(Condition::Immediate, "added"));
        });
        let added = std::mem::replace(&mut queue, detached);
        queue.append(added);

        let order: Vec<_> = queue.iter().map(|continuation| *continuation.action()).collect();
        assert_eq!(order, vec!["survivor", "added"]);
    }
}
