//! Audio output scheduling.
//!
//! Channel synthesis is not emulated: the mixer output is the SOUNDBIAS level
//! alone. What matters here is the timing contract, one stereo sample every
//! [`SAMPLE_PERIOD`] cycles and a buffer hand-off every `buffer_len` samples,
//! which is what a presentation backend paces itself against.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::scheduler::{EventKind, Scheduler};

/// 16.78 MHz / 512 = 32768 Hz
pub const SAMPLE_PERIOD: u64 = 512;

/// SOUNDBIAS after reset: level 0x100, 9 bit resolution.
pub const DEFAULT_BIAS: u16 = 0x0200;

/// Completed buffers kept around for a consumer that is falling behind.
const MAX_QUEUED_BUFFERS: usize = 8;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StereoSample {
    pub left: i16,
    pub right: i16,
}

#[derive(Debug)]
pub struct Sound {
    bias: u16,
    buffer_len: usize,
    current: Vec<StereoSample>,
    flush_scheduled: bool,
    completed: VecDeque<Vec<StereoSample>>,
}

impl Sound {
    #[must_use]
    pub fn new(buffer_len: usize) -> Self {
        let buffer_len = buffer_len.max(1);
        Self {
            bias: DEFAULT_BIAS,
            buffer_len,
            current: Vec::with_capacity(buffer_len),
            flush_scheduled: false,
            completed: VecDeque::new(),
        }
    }

    /// Arms the sample clock. Called once when the system powers on.
    pub fn start(&self, scheduler: &mut Scheduler) {
        scheduler.add_event(SAMPLE_PERIOD, EventKind::AudioSample);
    }

    /// Output level in the signed 16 bit range. The bias sits at the center of
    /// the 10 bit DAC range (0x200), so the default setting is silence.
    fn level(&self) -> i16 {
        let level = i32::from(self.bias.get_bits(1..=9) << 1);
        ((level - 0x200) << 6) as i16
    }

    /// Handles the `AudioSample` event.
    pub fn sample(&mut self, late: u64, scheduler: &mut Scheduler) {
        let level = self.level();
        self.current.push(StereoSample {
            left: level,
            right: level,
        });

        if self.current.len() >= self.buffer_len && !self.flush_scheduled {
            self.flush_scheduled = true;
            scheduler.add_event(0, EventKind::AudioBufferFull);
        }

        scheduler.add_periodic_event(SAMPLE_PERIOD, late, EventKind::AudioSample);
    }

    /// Handles the `AudioBufferFull` event.
    pub fn flush(&mut self) {
        self.flush_scheduled = false;

        let buffer = std::mem::replace(&mut self.current, Vec::with_capacity(self.buffer_len));
        if self.completed.len() == MAX_QUEUED_BUFFERS {
            tracing::debug!("audio consumer is behind, dropping a buffer");
            self.completed.pop_front();
        }
        self.completed.push_back(buffer);
    }

    /// Drains every completed buffer, oldest first.
    pub fn take_samples(&mut self) -> Vec<StereoSample> {
        self.completed.drain(..).flatten().collect()
    }

    /// `offset` is relative to SOUNDBIAS (`0x0400_0088`).
    #[must_use]
    pub fn read_register(&self, offset: u32) -> u8 {
        self.bias.get_byte((offset & 1) as u8)
    }

    pub fn write_register(&mut self, offset: u32, value: u8) {
        self.bias.set_byte((offset & 1) as u8, value);
        self.bias &= 0xC3FE;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run(sound: &mut Sound, scheduler: &mut Scheduler, cycles: u64) {
        scheduler.advance(cycles);
        while let Some((kind, late)) = scheduler.pop_pending() {
            match kind {
                EventKind::AudioSample => sound.sample(late, scheduler),
                EventKind::AudioBufferFull => sound.flush(),
                _ => unreachable!(),
            }
        }
    }

    #[test]
    fn one_sample_every_period() {
        let mut sound = Sound::new(4);
        let mut scheduler = Scheduler::new();
        sound.start(&mut scheduler);

        run(&mut sound, &mut scheduler, SAMPLE_PERIOD * 3);
        assert_eq!(sound.take_samples(), Vec::new());

        run(&mut sound, &mut scheduler, SAMPLE_PERIOD);
        assert_eq!(sound.take_samples(), vec![StereoSample::default(); 4]);
    }

    #[test]
    fn bursts_keep_the_sample_rate() {
        let mut sound = Sound::new(16);
        let mut scheduler = Scheduler::new();
        sound.start(&mut scheduler);

        // Drained as it goes, older buffers are dropped when the queue is full.
        let mut produced = 0;
        for _ in 0..1000 {
            run(&mut sound, &mut scheduler, 333);
            produced += sound.take_samples().len();
        }

        produced += sound.current.len();
        assert_eq!(produced as u64, 333_000 / SAMPLE_PERIOD);
    }

    #[test]
    fn slow_consumer_keeps_only_the_newest_buffers() {
        let mut sound = Sound::new(2);
        let mut scheduler = Scheduler::new();
        sound.start(&mut scheduler);

        run(&mut sound, &mut scheduler, SAMPLE_PERIOD * 2 * 10);
        assert_eq!(sound.take_samples().len(), 2 * MAX_QUEUED_BUFFERS);
    }

    #[test]
    fn bias_drives_the_level() {
        let mut sound = Sound::new(1);
        let mut scheduler = Scheduler::new();
        sound.write_register(0, 0x00);
        sound.write_register(1, 0x03);

        sound.sample(0, &mut scheduler);
        sound.flush();

        let samples = sound.take_samples();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].left, (0x300 - 0x200) << 6);
        assert_eq!(sound.read_register(1), 0x03);
    }
}
