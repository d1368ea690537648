//! Bounded, priority-ordered, debounced input buffer
//!
//! Sits between the recognition stream and the dispatch loop. Producers never
//! block: a full buffer evicts its weakest item. The consumer side is rate
//! limited by a debounce gate, so bursts of near-duplicate transcripts turn
//! into a paced stream of actions.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct BufferedCommand<T> {
    pub priority: i32,
    pub arrival: Instant,
    seq: u64,
    pub payload: T,
}

impl<T> BufferedCommand<T> {
    /// Dequeue order: higher priority first, then earlier arrival
    fn goes_before(&self, other: &Self) -> bool {
        (self.priority, std::cmp::Reverse(self.arrival), std::cmp::Reverse(self.seq))
            > (other.priority, std::cmp::Reverse(other.arrival), std::cmp::Reverse(other.seq))
    }

    /// Eviction order: lower priority first, then earlier arrival
    fn evicts_before(&self, other: &Self) -> bool {
        (self.priority, self.arrival, self.seq) < (other.priority, other.arrival, other.seq)
    }
}

struct Inner<T> {
    items: Vec<BufferedCommand<T>>,
    last_release: Option<Instant>,
    next_seq: u64,
    evictions: u64,
}

impl<T> Inner<T> {
    fn gate_open(&self, now: Instant, debounce: Duration) -> bool {
        self.last_release
            .is_none_or(|last| now.saturating_duration_since(last) >= debounce)
    }

    fn gate_remaining(&self, now: Instant, debounce: Duration) -> Duration {
        self.last_release
            .map(|last| debounce.saturating_sub(now.saturating_duration_since(last)))
            .unwrap_or_default()
    }

    fn position_of(&self, better: impl Fn(&BufferedCommand<T>, &BufferedCommand<T>) -> bool) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, item) in self.items.iter().enumerate() {
            if best.is_none_or(|b| better(item, &self.items[b])) {
                best = Some(i);
            }
        }
        best
    }

    fn pop(&mut self, now: Instant) -> Option<T> {
        let idx = self.position_of(BufferedCommand::goes_before)?;
        self.last_release = Some(now);
        Some(self.items.swap_remove(idx).payload)
    }
}

pub struct InputBuffer<T> {
    inner: Mutex<Inner<T>>,
    available: Condvar,
    capacity: usize,
    debounce: Duration,
}

impl<T> InputBuffer<T> {
    pub fn new(capacity: usize, debounce: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: Vec::with_capacity(capacity),
                last_release: None,
                next_seq: 0,
                evictions: 0,
            }),
            available: Condvar::new(),
            capacity,
            debounce,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Queue a payload; evicts the lowest-priority, oldest item when full
    pub fn add_input(&self, payload: T, priority: i32) -> bool {
        let mut inner = self.inner.lock();

        if inner.items.len() >= self.capacity {
            match inner.position_of(BufferedCommand::evicts_before) {
                Some(idx) => {
                    inner.items.swap_remove(idx);
                    inner.evictions += 1;
                    tracing::debug!("Input buffer full, evicted one item");
                }
                None => return false,
            }
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.items.push(BufferedCommand {
            priority,
            arrival: Instant::now(),
            seq,
            payload,
        });
        drop(inner);

        self.available.notify_one();
        true
    }

    /// Pop the next payload if the debounce gate is open
    pub fn get_next(&self) -> Option<T> {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        if !inner.gate_open(now, self.debounce) {
            return None;
        }
        inner.pop(now)
    }

    /// Like `get_next`, but waits up to `timeout` for an item to become
    /// available and for the gate to open
    pub fn wait_next(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();

        loop {
            let now = Instant::now();
            if !inner.items.is_empty() && inner.gate_open(now, self.debounce) {
                return inner.pop(now);
            }
            if now >= deadline {
                return None;
            }

            let wake_at = if inner.items.is_empty() {
                deadline
            } else {
                (now + inner.gate_remaining(now, self.debounce)).min(deadline)
            };
            self.available.wait_until(&mut inner, wake_at);
        }
    }

    /// Drop everything queued; the debounce clock is left alone
    pub fn flush(&self) -> usize {
        let mut inner = self.inner.lock();
        let dropped = inner.items.len();
        inner.items.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items evicted to make room since creation
    pub fn evictions(&self) -> u64 {
        self.inner.lock().evictions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn drain(buffer: &InputBuffer<&'static str>) -> Vec<&'static str> {
        let mut out = Vec::new();
        while let Some(item) = buffer.wait_next(Duration::from_millis(200)) {
            out.push(item);
        }
        out
    }

    #[test]
    fn test_eviction_keeps_high_priority_and_newest() {
        let buffer = InputBuffer::new(2, Duration::ZERO);
        assert!(buffer.add_input("first", 0));
        assert!(buffer.add_input("second", 0));
        assert!(buffer.add_input("urgent", 5));

        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.evictions(), 1);
        assert_eq!(buffer.get_next(), Some("urgent"));
        assert_eq!(buffer.get_next(), Some("second"));
        assert_eq!(buffer.get_next(), None);
    }

    #[test]
    fn test_priority_then_fifo() {
        let buffer = InputBuffer::new(10, Duration::ZERO);
        buffer.add_input("a", 0);
        buffer.add_input("b", 1);
        buffer.add_input("c", 0);
        buffer.add_input("d", 1);
        assert_eq!(drain(&buffer), vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn test_debounce_gate() {
        let buffer = InputBuffer::new(10, Duration::from_millis(100));
        buffer.add_input("one", 0);
        buffer.add_input("two", 0);

        assert_eq!(buffer.get_next(), Some("one"));
        // Gate closed even though an item is queued
        assert_eq!(buffer.get_next(), None);
        assert_eq!(buffer.len(), 1);

        thread::sleep(Duration::from_millis(120));
        assert_eq!(buffer.get_next(), Some("two"));
    }

    #[test]
    fn test_empty_get_does_not_reset_gate() {
        let buffer: InputBuffer<&str> = InputBuffer::new(10, Duration::from_millis(100));
        assert_eq!(buffer.get_next(), None);
        buffer.add_input("one", 0);
        assert_eq!(buffer.get_next(), Some("one"));
    }

    #[test]
    fn test_flush_keeps_debounce_clock() {
        let buffer = InputBuffer::new(10, Duration::from_millis(200));
        buffer.add_input("one", 0);
        assert_eq!(buffer.get_next(), Some("one"));

        buffer.add_input("two", 0);
        buffer.add_input("three", 0);
        assert_eq!(buffer.flush(), 2);
        assert!(buffer.is_empty());

        buffer.add_input("four", 0);
        assert_eq!(buffer.get_next(), None);
    }

    #[test]
    fn test_zero_capacity_rejects() {
        let buffer = InputBuffer::new(0, Duration::ZERO);
        assert!(!buffer.add_input("x", 0));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_wait_next_times_out_when_empty() {
        let buffer: InputBuffer<&str> = InputBuffer::new(4, Duration::ZERO);
        let start = Instant::now();
        assert_eq!(buffer.wait_next(Duration::from_millis(50)), None);
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_wait_next_wakes_on_input() {
        let buffer = Arc::new(InputBuffer::new(4, Duration::ZERO));
        let producer = Arc::clone(&buffer);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            producer.add_input("late", 0);
        });

        assert_eq!(buffer.wait_next(Duration::from_secs(2)), Some("late"));
        handle.join().unwrap();
    }

    #[test]
    fn test_wait_next_waits_for_gate() {
        let buffer = InputBuffer::new(4, Duration::from_millis(60));
        buffer.add_input("one", 0);
        buffer.add_input("two", 0);
        assert_eq!(buffer.get_next(), Some("one"));

        let start = Instant::now();
        assert_eq!(buffer.wait_next(Duration::from_secs(1)), Some("two"));
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_concurrent_consumers_respect_gate() {
        let buffer = Arc::new(InputBuffer::new(10, Duration::from_millis(500)));
        for i in 0..5 {
            buffer.add_input(i, 0);
        }

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let b = Arc::clone(&buffer);
                thread::spawn(move || b.get_next())
            })
            .collect();
        let released = handles
            .into_iter()
            .filter_map(|h| h.join().unwrap())
            .count();
        assert_eq!(released, 1);
    }
}
