//! # Event Scheduler
//!
//! The scheduler is the single time base of the system. Every component that
//! needs to do something "later" registers an [`EventKind`] with a delay in
//! CPU cycles; the bus pops due events after each burst of cycles and
//! dispatches them synchronously.
//!
//! ```text
//!   now ──────────────────────────────────────────────▶ time
//!    │        │ HBlankStart      │ AudioSample   │ LineEnd
//!    └─ advance(n) moves `now`, then pop_pending() drains every event
//!       whose time <= now, in (time, registration order) order.
//! ```
//!
//! ## Lateness
//!
//! The CPU advances time in bursts (a whole instruction, a DMA block, a halt
//! fast-forward), so an event is usually popped a few cycles after its nominal
//! time. [`Scheduler::pop_pending`] reports that difference and periodic
//! events re-arm with `period - lateness`, which keeps their long-run average
//! period exact.
//!
//! There is no cancel operation: owners that may need to drop an event (timers)
//! tag it with a generation counter and ignore stale firings.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

/// The closed set of things that can be scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// End of the visible part of a scanline (HDraw -> HBlank).
    HBlankStart,
    /// End of a scanline, moves to the next line.
    LineEnd,
    /// A timer reached 0x10000. `generation` identifies the timer configuration
    /// that scheduled it.
    TimerOverflow { timer: usize, generation: u32 },
    /// A DMA channel finished its start-up delay and runs its transfer.
    DmaTransfer { channel: usize },
    /// Produce one stereo output sample.
    AudioSample,
    /// Hand the accumulated samples to the presentation side.
    AudioBufferFull,
    /// The serial shift register finished a transfer.
    SerialTransfer,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct Event {
    time: u64,
    sequence: u64,
    kind: EventKind,
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.sequence == other.sequence
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    // BinaryHeap is a max-heap, so the comparison is reversed to pop the
    // earliest (time, sequence) first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Scheduler {
    now: u64,
    next_sequence: u64,
    events: BinaryHeap<Event>,
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current absolute cycle count. Never decreases.
    #[must_use]
    pub const fn now(&self) -> u64 {
        self.now
    }

    /// Registers `kind` to fire once `now()` reaches `now() + delay`.
    pub fn add_event(&mut self, delay: u64, kind: EventKind) {
        let event = Event {
            time: self.now + delay,
            sequence: self.next_sequence,
            kind,
        };
        self.next_sequence += 1;

        tracing::trace!("scheduled {kind:?} at cycle {}", event.time);
        self.events.push(event);
    }

    /// Re-arms a periodic event `period` cycles after the nominal time of a
    /// firing that happened `late` cycles late. This is `add_event(period -
    /// late)`, except that a burst longer than `period` leaves the event due
    /// immediately with its true lateness instead of losing the missed time.
    pub fn add_periodic_event(&mut self, period: u64, late: u64, kind: EventKind) {
        if late <= period {
            self.add_event(period - late, kind);
            return;
        }

        let event = Event {
            time: self.now - late + period,
            sequence: self.next_sequence,
            kind,
        };
        self.next_sequence += 1;
        self.events.push(event);
    }

    /// Moves time forward. Due events are not fired here, the owner drains
    /// them with [`Self::pop_pending`].
    pub const fn advance(&mut self, cycles: u64) {
        self.now += cycles;
    }

    /// Pops the earliest event that is due, along with how many cycles late
    /// it is being fired.
    pub fn pop_pending(&mut self) -> Option<(EventKind, u64)> {
        if self.events.peek()?.time > self.now {
            return None;
        }

        let event = self.events.pop()?;
        Some((event.kind, self.now - event.time))
    }

    /// Absolute time of the earliest pending event.
    #[must_use]
    pub fn next_event_time(&self) -> Option<u64> {
        self.events.peek().map(|event| event.time)
    }

    /// Jumps straight to the next pending event (used while the CPU is halted).
    /// Returns the number of cycles skipped.
    pub fn skip_to_next_event(&mut self) -> u64 {
        match self.next_event_time() {
            Some(time) if time > self.now => {
                let skipped = time - self.now;
                self.now = time;
                skipped
            }
            Some(_) => 0,
            None => {
                // Nothing will ever wake the CPU up, just let time flow.
                self.now += 1;
                1
            }
        }
    }

    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }
}
