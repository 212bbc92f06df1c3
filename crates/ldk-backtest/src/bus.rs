use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use ldk_execution::Order;
use ldk_portfolio::Fill;
use ldk_strategy::SignalBatch;

/// Everything that travels between components during a tick.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// The feed advanced to a new tick.
    DataTick { timestamp: DateTime<Utc> },
    /// One strategy batch for the tick.
    Signals(SignalBatch),
    Order(Order),
    Fill(Fill),
}

impl Event {
    pub fn label(&self) -> &'static str {
        match self {
            Event::DataTick { .. } => "DATA_TICK",
            Event::Signals(_) => "SIGNALS",
            Event::Order(_) => "ORDER",
            Event::Fill(_) => "FILL",
        }
    }
}

/// FIFO event queue. Single-threaded; owned by the simulation loop.
#[derive(Debug, Default)]
pub struct EventBus {
    queue: VecDeque<Event>,
    /// Events ever pushed (monotonic).
    pushed: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        self.pushed += 1;
        self.queue.push_back(event);
    }

    pub fn pop(&mut self) -> Option<Event> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn pushed(&self) -> u64 {
        self.pushed
    }

    /// Drop everything still queued; returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let n = self.queue.len();
        self.queue.clear();
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick(secs: i64) -> Event {
        Event::DataTick {
            timestamp: DateTime::<Utc>::from_timestamp(secs, 0).unwrap(),
        }
    }

    #[test]
    fn fifo_order() {
        let mut bus = EventBus::new();
        bus.push(tick(1));
        bus.push(tick(2));
        assert_eq!(bus.pop(), Some(tick(1)));
        bus.push(tick(3));
        assert_eq!(bus.pop(), Some(tick(2)));
        assert_eq!(bus.pop(), Some(tick(3)));
        assert_eq!(bus.pop(), None);
        assert_eq!(bus.pushed(), 3);
    }

    #[test]
    fn clear_reports_dropped() {
        let mut bus = EventBus::new();
        bus.push(tick(1));
        bus.push(tick(2));
        assert_eq!(bus.clear(), 2);
        assert!(bus.is_empty());
    }
}
