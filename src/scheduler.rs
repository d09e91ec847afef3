use std::time::{Duration, Instant, SystemTime};

use rand::Rng;

use crate::message::{ControlChange, MAX_MIDI_CHANNEL, MidiMessage, ProgramChange};
use crate::midi::MessageSink;
use crate::registry::{self, CcException, Registry};

pub const MIN_RANDOM_CC: u8 = 1;
pub const MAX_RANDOM_CC: u8 = 127;
pub const MIN_RANDOM_PROGRAM: u8 = 1;
pub const MAX_RANDOM_PROGRAM: u8 = 50;

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// The periodic modulation timer.
///
/// Holds at most one pending deadline, so restarting never leaves a second
/// timer running.
pub struct Scheduler {
    interval: Duration,
    next_due: Option<Instant>,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Scheduler {
            interval,
            next_due: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    pub fn start(&mut self, now: Instant) {
        if self.next_due.is_none() {
            self.next_due = Some(now + self.interval);
        }
    }

    pub fn stop(&mut self) {
        self.next_due = None;
    }

    /// Drop any pending deadline and arm a fresh one.
    pub fn restart(&mut self, now: Instant) {
        self.next_due = Some(now + self.interval);
    }

    /// True when a tick is due at `now`. Re-arms the timer.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.next_due {
            Some(due) if now >= due => {
                self.next_due = Some(now + self.interval);
                true
            }
            _ => false,
        }
    }
}

/// Advance every enabled LFO to `now_ms` and emit messages for sliders
/// whose value changed. Returns the number of sliders that changed.
pub fn modulate<R, S>(registry: &mut Registry, now_ms: u64, rng: &mut R, sink: &mut S) -> usize
where
    R: Rng + ?Sized,
    S: MessageSink + ?Sized,
{
    let mut changed = 0;
    let sliders: Vec<_> = registry
        .sliders()
        .iter()
        .map(|slider| {
            let mut slider = slider.clone();
            let Some(lfo) = slider.lfo.as_mut().filter(|l| l.enabled) else {
                return slider;
            };
            let Some(value) = lfo.sample(now_ms, &mut *rng) else {
                log::trace!("slider {}: degenerate LFO frequency, skipping", slider.id);
                return slider;
            };
            if value != slider.value {
                slider.value = value;
                changed += 1;
                sink.emit(slider.messages(value));
            }
            slider
        })
        .collect();
    registry.replace_sliders(sliders);
    changed
}

/// One random value per CC on every channel, skipping excepted pairs.
pub fn random_cc_messages<R: Rng + ?Sized>(
    exceptions: &[CcException],
    rng: &mut R,
) -> Vec<MidiMessage> {
    let mut messages = Vec::new();
    for channel in 0..MAX_MIDI_CHANNEL {
        for cc_number in MIN_RANDOM_CC..=MAX_RANDOM_CC {
            if registry::is_excluded(cc_number, channel, exceptions) {
                continue;
            }
            messages.push(MidiMessage::ControlChange(ControlChange {
                cc_number,
                value: rng.gen_range(0..=127),
                channel,
            }));
        }
    }
    messages
}

/// One random program per channel.
pub fn random_program_changes<R: Rng + ?Sized>(rng: &mut R) -> Vec<MidiMessage> {
    (0..MAX_MIDI_CHANNEL)
        .map(|channel| {
            MidiMessage::ProgramChange(ProgramChange {
                program_number: rng.gen_range(MIN_RANDOM_PROGRAM..=MAX_RANDOM_PROGRAM),
                channel,
            })
        })
        .collect()
}
