//! # Timers
//!
//! Four 16-bit up-counters (TM0CNT..TM3CNT at `0x0400_0100`). Each register
//! pair is a reload value (`CNT_L`) and a control word (`CNT_H`):
//!
//! | Bits | Meaning                                             |
//! |------|-----------------------------------------------------|
//! | 0-1  | prescaler: 1, 64, 256 or 1024 cycles per tick       |
//! | 2    | count-up: tick on the previous timer's overflow     |
//! | 6    | overflow IRQ enable                                 |
//! | 7    | start                                               |
//!
//! A running timer is never ticked cycle by cycle. Its counter is derived
//! from the scheduler clock and a single `TimerOverflow` event is pending at
//! the moment it wraps. Every reconfiguration bumps the timer's generation so
//! that an overflow scheduled for the old configuration fires as a no-op.

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::hardware::interrupt_control::{Interrupt, IrqHandle};
use crate::scheduler::{EventKind, Scheduler};

pub const PRESCALERS: [u64; 4] = [1, 64, 256, 1024];

const OVERFLOW: u64 = 0x1_0000;

#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
struct Timer {
    reload: u16,
    control: u16,
    /// Counter value at `started_at`, or the live value for count-up timers.
    counter: u16,
    started_at: u64,
    generation: u32,
}

impl Timer {
    fn enabled(&self) -> bool {
        self.control.get_bit(7)
    }

    fn irq_enabled(&self) -> bool {
        self.control.get_bit(6)
    }

    fn prescaler(&self) -> u64 {
        PRESCALERS[self.control.get_bits(0..=1) as usize]
    }

    fn period(&self) -> u64 {
        (OVERFLOW - u64::from(self.reload)) * self.prescaler()
    }
}

#[derive(Debug)]
pub struct Timers {
    timers: [Timer; 4],
    irq: IrqHandle,
}

impl Timers {
    #[must_use]
    pub fn new(irq: IrqHandle) -> Self {
        Self {
            timers: [Timer::default(); 4],
            irq,
        }
    }

    const fn counts_up(&self, index: usize) -> bool {
        // Timer 0 has no predecessor, its count-up bit is ignored.
        index > 0 && self.timers[index].control & 0b100 != 0
    }

    fn free_running(&self, index: usize) -> bool {
        self.timers[index].enabled() && !self.counts_up(index)
    }

    /// Current counter value of `index` at cycle `now`.
    #[must_use]
    pub fn counter(&self, index: usize, now: u64) -> u16 {
        let timer = &self.timers[index];
        if !self.free_running(index) {
            return timer.counter;
        }

        let ticks = now.saturating_sub(timer.started_at) / timer.prescaler();
        // The overflow event may still be pending for a few cycles.
        (u64::from(timer.counter) + ticks).min(0xFFFF) as u16
    }

    const fn overflow_event(&self, index: usize) -> EventKind {
        EventKind::TimerOverflow {
            timer: index,
            generation: self.timers[index].generation,
        }
    }

    /// `offset` is relative to `0x0400_0100`.
    #[must_use]
    pub fn read_register(&self, offset: u32, now: u64) -> u8 {
        let index = (offset / 4) as usize;
        match offset % 4 {
            0 => self.counter(index, now).get_byte(0),
            1 => self.counter(index, now).get_byte(1),
            2 => self.timers[index].control.get_byte(0),
            _ => self.timers[index].control.get_byte(1),
        }
    }

    pub fn write_register(&mut self, offset: u32, value: u8, scheduler: &mut Scheduler) {
        let index = (offset / 4) as usize;
        match offset % 4 {
            byte @ (0 | 1) => self.timers[index].reload.set_byte(byte as u8, value),
            2 => self.write_control(index, u16::from(value), scheduler),
            // Upper half of the control word is unused.
            _ => {}
        }
    }

    fn write_control(&mut self, index: usize, control: u16, scheduler: &mut Scheduler) {
        let now = scheduler.now();
        let counter = self.counter(index, now);
        let was_enabled = self.timers[index].enabled();
        let was_free_running = self.free_running(index);
        let old_prescaler = self.timers[index].prescaler();
        let old_started_at = self.timers[index].started_at;

        let timer = &mut self.timers[index];
        timer.counter = counter;
        timer.control = control & 0xC7;
        timer.started_at = now;
        timer.generation = timer.generation.wrapping_add(1);

        if !was_enabled && timer.enabled() {
            timer.counter = timer.reload;
            tracing::debug!(
                "timer {index} started: reload {:#06X}, prescaler {}",
                timer.reload,
                timer.prescaler()
            );
        }

        if self.free_running(index) {
            let timer = &mut self.timers[index];
            // Still ticking at the same rate: the partial tick carries over.
            let phase = if was_free_running && timer.prescaler() == old_prescaler {
                now.saturating_sub(old_started_at) % old_prescaler
            } else {
                0
            };
            timer.started_at = now - phase;

            let remaining = (OVERFLOW - u64::from(timer.counter)) * timer.prescaler();
            scheduler.add_event(remaining.saturating_sub(phase), self.overflow_event(index));
        }
    }

    /// Handles a `TimerOverflow` event fired `late` cycles after its due time.
    pub fn handle_overflow(
        &mut self,
        index: usize,
        generation: u32,
        late: u64,
        scheduler: &mut Scheduler,
    ) {
        let timer = &self.timers[index];
        if timer.generation != generation || !self.free_running(index) {
            tracing::trace!("stale overflow for timer {index} ignored");
            return;
        }

        let due = scheduler.now() - late;
        self.overflow(index, due);

        let period = self.timers[index].period();
        scheduler.add_periodic_event(period, late, self.overflow_event(index));
    }

    fn overflow(&mut self, index: usize, due: u64) {
        let timer = &mut self.timers[index];
        timer.counter = timer.reload;
        timer.started_at = due;

        if timer.irq_enabled() {
            self.irq.request(Interrupt::timer(index));
        }

        let next = index + 1;
        if next < self.timers.len() && self.timers[next].enabled() && self.counts_up(next) {
            let cascade = &mut self.timers[next];
            if cascade.counter == 0xFFFF {
                self.overflow(next, due);
            } else {
                cascade.counter += 1;
            }
        }
    }
}
