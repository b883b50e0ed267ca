// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::cmp::Ordering;

use parking_lot::{Condvar, Mutex};

use crate::{CompilationError, NodeId};

#[derive(Debug, Default)]
struct CountdownState {
    remaining: usize,
    errors: Vec<(NodeId, CompilationError)>,
}

/// Blocks the analysis thread until every method of a batch was compiled.
#[derive(Debug, Default)]
pub(super) struct Countdown {
    state: Mutex<CountdownState>,
    condvar: Condvar,
}

impl Countdown {
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self {
            state: Mutex::new(CountdownState {
                remaining: count,
                errors: Vec::new(),
            }),
            condvar: Condvar::new(),
        }
    }

    pub fn signal(&self) {
        let mut state = self.state.lock();
        debug_assert!(state.remaining > 0, "countdown signalled too often");
        state.remaining = state.remaining.saturating_sub(1);
        if state.remaining == 0 {
            self.condvar.notify_all();
        }
    }

    pub fn record_error(&self, node: NodeId, error: CompilationError) {
        self.state.lock().errors.push((node, error));
    }

    /// Waits until the count reaches zero. Of the recorded errors, the one of
    /// the node that sorts first under `order` is handed back, so the result
    /// does not depend on which worker finished first.
    pub fn wait(&self, order: impl Fn(NodeId, NodeId) -> Ordering) -> Result<(), CompilationError> {
        let mut state = self.state.lock();
        while state.remaining != 0 {
            self.condvar.wait(&mut state);
        }

        match state.errors.drain(..).min_by(|(a, _), (b, _)| order(*a, *b)) {
            Some((_, error)) => Err(error),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;

    fn by_id(a: NodeId, b: NodeId) -> Ordering {
        a.cmp(&b)
    }

    #[test]
    fn zero_does_not_block() {
        Countdown::new(0).wait(by_id).unwrap();
    }

    #[test]
    fn waits_for_every_signal() {
        let countdown = Arc::new(Countdown::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let countdown = Arc::clone(&countdown);
                thread::spawn(move || countdown.signal())
            })
            .collect();

        countdown.wait(by_id).unwrap();
        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn errors_are_reported_after_the_batch() {
        let countdown = Countdown::new(2);
        countdown.record_error(NodeId::new(0), CompilationError::WorkerPanicked);
        countdown.signal();
        countdown.signal();

        assert!(matches!(countdown.wait(by_id), Err(CompilationError::WorkerPanicked)));
    }

    #[test]
    fn reported_error_does_not_depend_on_completion_order() {
        let missing = |name: &str| CompilationError::MissingEntryPoint { name: name.into() };

        for reversed in [false, true] {
            let countdown = Countdown::new(2);
            let mut errors = vec![(NodeId::new(7), missing("late")), (NodeId::new(2), missing("early"))];
            if reversed {
                errors.reverse();
            }

            for (node, error) in errors {
                countdown.record_error(node, error);
                countdown.signal();
            }

            let result = countdown.wait(by_id);
            assert!(
                matches!(&result, Err(CompilationError::MissingEntryPoint { name }) if name == "early"),
                "{result:?}",
            );
        }
    }
}
