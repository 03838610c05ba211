//! Cancellable timers that deliver events to an actor's event channel.
//!
//! Every timer is a task in one `JoinSet`; replacing the set aborts them all.
//! An event already queued before cancellation can still arrive, so actors
//! tag events with a generation and drop stale ones.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{Instant, interval_at, sleep};

pub(crate) struct Timers<E> {
    set: JoinSet<()>,
    events: mpsc::UnboundedSender<E>,
}

impl<E: Send + 'static> Timers<E> {
    pub(crate) fn new(events: mpsc::UnboundedSender<E>) -> Self {
        Self { set: JoinSet::new(), events }
    }

    /// Deliver `event` once after `delay`.
    pub(crate) fn after(&mut self, delay: Duration, event: E) {
        let tx = self.events.clone();
        self.set.spawn(async move {
            sleep(delay).await;
            let _ = tx.send(event);
        });
    }

    /// Deliver `make()` every `period`, first firing one period from now.
    pub(crate) fn every(&mut self, period: Duration, make: impl Fn() -> E + Send + 'static) {
        let tx = self.events.clone();
        self.set.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                if tx.send(make()).is_err() {
                    break;
                }
            }
        });
    }

    pub(crate) fn cancel_all(&mut self) {
        // Dropping a JoinSet aborts every task in it.
        self.set = JoinSet::new();
    }

    /// Drop bookkeeping for timers that already fired.
    pub(crate) fn reap(&mut self) {
        while self.set.try_join_next().is_some() {}
    }

    pub(crate) fn pending(&self) -> usize {
        self.set.len()
    }
}
