use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::message::{self, ChannelSpec, MidiMessage};
use crate::session::SessionState;
use crate::waveform::{self, RandomHold, Waveform};

/// Frequency given to a freshly created LFO.
pub const DEFAULT_LFO_FREQUENCY: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SliderKind {
    #[default]
    Cc,
    Program,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lfo {
    pub enabled: bool,
    /// Cycles per second.
    pub frequency: f64,
    pub min_amplitude: u8,
    pub max_amplitude: u8,
    #[serde(default)]
    pub waveform: Waveform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub random: Option<RandomHold>,
}

impl Default for Lfo {
    fn default() -> Self {
        Lfo {
            enabled: true,
            frequency: DEFAULT_LFO_FREQUENCY,
            min_amplitude: 0,
            max_amplitude: 127,
            waveform: Waveform::Triangle,
            random: None,
        }
    }
}

impl Lfo {
    /// Value at `now_ms`, or `None` when the frequency cannot produce a
    /// period. The random hold is advanced only for the random waveform.
    pub fn sample<R: Rng + ?Sized>(&mut self, now_ms: u64, rng: &mut R) -> Option<u8> {
        let period = waveform::period_ms(self.frequency)?;
        let phase = waveform::phase_at(now_ms, period);
        let held = if self.waveform == Waveform::Random {
            let hold = RandomHold::advance(self.random, now_ms, period / 10.0, rng);
            self.random = Some(hold);
            hold.value
        } else {
            0.0
        };
        Some(waveform::evaluate(
            self.waveform,
            phase,
            self.min_amplitude,
            self.max_amplitude,
            held,
        ))
    }
}

/// A virtual fader bound to a CC or program-change parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slider {
    pub id: u32,
    #[serde(rename = "type", default)]
    pub kind: SliderKind,
    #[serde(default)]
    pub channel: ChannelSpec,
    pub cc_number: u8,
    pub value: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lfo: Option<Lfo>,
}

impl Slider {
    fn new(id: u32) -> Self {
        Slider {
            id,
            kind: SliderKind::Cc,
            channel: ChannelSpec::Channel(0),
            cc_number: 1,
            value: 0,
            lfo: None,
        }
    }

    /// Wire messages carrying `value` for this slider's binding.
    pub fn messages(&self, value: u8) -> Vec<MidiMessage> {
        match self.kind {
            SliderKind::Cc => message::compose_cc(self.cc_number, value, self.channel)
                .into_iter()
                .map(MidiMessage::ControlChange)
                .collect(),
            SliderKind::Program => message::compose_program_change(value, self.channel)
                .into_iter()
                .map(MidiMessage::ProgramChange)
                .collect(),
        }
    }
}

/// A (CC, channel) pair left untouched by bulk randomization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CcException {
    pub id: u32,
    pub cc_number: u8,
    #[serde(default)]
    pub channel: ChannelSpec,
}

/// True if any exception covers `cc_number` on `channel`.
pub fn is_excluded(cc_number: u8, channel: u8, exceptions: &[CcException]) -> bool {
    exceptions
        .iter()
        .any(|e| e.cc_number == cc_number && e.channel.matches(channel))
}

/// Field-level slider edits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SliderEdit {
    Value(u8),
    Channel(ChannelSpec),
    CcNumber(u8),
    /// Also resets the value to 0.
    Kind(SliderKind),
    LfoEnabled(bool),
    LfoFrequency(f64),
    LfoMinAmplitude(u8),
    LfoMaxAmplitude(u8),
    LfoWaveform(Waveform),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExceptionEdit {
    CcNumber(u8),
    Channel(ChannelSpec),
}

/// Owns sliders and CC exceptions and allocates their ids.
///
/// Ids are monotonic per collection and never reused. Edits addressed to
/// an unknown id are ignored.
#[derive(Debug, Clone)]
pub struct Registry {
    sliders: Vec<Slider>,
    exceptions: Vec<CcException>,
    next_slider_id: u32,
    next_exception_id: u32,
}

impl Default for Registry {
    fn default() -> Self {
        Registry {
            sliders: Vec::new(),
            exceptions: Vec::new(),
            next_slider_id: 1,
            next_exception_id: 1,
        }
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore collections from persisted state, resuming id allocation
    /// past the highest stored id.
    pub fn from_state(state: &SessionState) -> Self {
        let next_slider_id = state.sliders.iter().map(|s| s.id).max().unwrap_or(0) + 1;
        let next_exception_id = state
            .cc_exceptions
            .iter()
            .map(|e| e.id)
            .max()
            .unwrap_or(0)
            + 1;
        Registry {
            sliders: state.sliders.clone(),
            exceptions: state.cc_exceptions.clone(),
            next_slider_id,
            next_exception_id,
        }
    }

    pub fn sliders(&self) -> &[Slider] {
        &self.sliders
    }

    pub fn exceptions(&self) -> &[CcException] {
        &self.exceptions
    }

    pub fn slider(&self, id: u32) -> Option<&Slider> {
        self.sliders.iter().find(|s| s.id == id)
    }

    pub fn add_slider(&mut self) -> u32 {
        let id = self.next_slider_id;
        self.next_slider_id += 1;
        let mut sliders = self.sliders.clone();
        sliders.push(Slider::new(id));
        self.sliders = sliders;
        id
    }

    /// Apply `edit` to slider `id`, returning the updated record.
    pub fn update_slider(&mut self, id: u32, edit: SliderEdit) -> Option<&Slider> {
        let Some(current) = self.slider(id) else {
            log::debug!("update_slider: no slider {id}");
            return None;
        };
        let updated = apply_slider_edit(current.clone(), edit);
        self.replace_slider(updated);
        self.slider(id)
    }

    pub fn remove_slider(&mut self, id: u32) {
        self.sliders = self.sliders.iter().filter(|s| s.id != id).cloned().collect();
    }

    pub fn add_exception(&mut self) -> u32 {
        let id = self.next_exception_id;
        self.next_exception_id += 1;
        let mut exceptions = self.exceptions.clone();
        exceptions.push(CcException {
            id,
            cc_number: 1,
            channel: ChannelSpec::Channel(0),
        });
        self.exceptions = exceptions;
        id
    }

    pub fn update_exception(&mut self, id: u32, edit: ExceptionEdit) {
        if !self.exceptions.iter().any(|e| e.id == id) {
            log::debug!("update_exception: no exception {id}");
            return;
        }
        self.exceptions = self
            .exceptions
            .iter()
            .map(|e| {
                if e.id != id {
                    return *e;
                }
                match edit {
                    ExceptionEdit::CcNumber(cc_number) => CcException { cc_number, ..*e },
                    ExceptionEdit::Channel(channel) => CcException { channel, ..*e },
                }
            })
            .collect();
    }

    pub fn remove_exception(&mut self, id: u32) {
        self.exceptions = self.exceptions.iter().filter(|e| e.id != id).copied().collect();
    }

    /// Swap in a whole slider collection (used by the scheduler after a tick).
    pub fn replace_sliders(&mut self, sliders: Vec<Slider>) {
        self.sliders = sliders;
    }

    fn replace_slider(&mut self, updated: Slider) {
        self.sliders = self
            .sliders
            .iter()
            .map(|s| if s.id == updated.id { updated.clone() } else { s.clone() })
            .collect();
    }

    pub fn to_state(&self, selected_device_name: String) -> SessionState {
        SessionState {
            selected_device_name,
            sliders: self.sliders.clone(),
            cc_exceptions: self.exceptions.clone(),
        }
    }
}

fn apply_slider_edit(mut slider: Slider, edit: SliderEdit) -> Slider {
    match edit {
        SliderEdit::Value(v) => slider.value = v,
        SliderEdit::Channel(c) => slider.channel = c,
        SliderEdit::CcNumber(n) => slider.cc_number = n,
        SliderEdit::Kind(kind) => {
            if slider.kind != kind {
                slider.kind = kind;
                slider.value = 0;
            }
        }
        SliderEdit::LfoEnabled(enabled) => match slider.lfo.as_mut() {
            Some(lfo) => lfo.enabled = enabled,
            None if enabled => slider.lfo = Some(Lfo::default()),
            None => {}
        },
        SliderEdit::LfoFrequency(f) => {
            if waveform::period_ms(f).is_none() {
                log::warn!("Ignoring LFO frequency {f} for slider {}", slider.id);
            } else {
                slider.lfo.get_or_insert_with(disabled_lfo).frequency = f;
            }
        }
        SliderEdit::LfoMinAmplitude(v) => {
            slider.lfo.get_or_insert_with(disabled_lfo).min_amplitude = v;
        }
        SliderEdit::LfoMaxAmplitude(v) => {
            slider.lfo.get_or_insert_with(disabled_lfo).max_amplitude = v;
        }
        SliderEdit::LfoWaveform(w) => {
            slider.lfo.get_or_insert_with(disabled_lfo).waveform = w;
        }
    }
    slider
}

fn disabled_lfo() -> Lfo {
    Lfo {
        enabled: false,
        ..Lfo::default()
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn add_slider_defaults() {
        let mut reg = Registry::new();
        let id = reg.add_slider();
        assert_eq!(id, 1);
        let s = reg.slider(id).unwrap();
        assert_eq!(s.kind, SliderKind::Cc);
        assert_eq!(s.channel, ChannelSpec::Channel(0));
        assert_eq!(s.cc_number, 1);
        assert_eq!(s.value, 0);
        assert!(s.lfo.is_none());
    }

    #[test]
    fn ids_are_never_reused() {
        let mut reg = Registry::new();
        let a = reg.add_slider();
        let b = reg.add_slider();
        reg.remove_slider(b);
        let c = reg.add_slider();
        assert_eq!((a, b, c), (1, 2, 3));

        let e1 = reg.add_exception();
        assert_eq!(e1, 1);
    }

    #[test]
    fn unknown_ids_are_ignored() {
        let mut reg = Registry::new();
        reg.add_slider();
        reg.add_exception();
        assert!(reg.update_slider(99, SliderEdit::Value(5)).is_none());
        reg.remove_slider(99);
        reg.update_exception(99, ExceptionEdit::CcNumber(5));
        reg.remove_exception(99);
        assert_eq!(reg.sliders().len(), 1);
        assert_eq!(reg.exceptions().len(), 1);
        assert_eq!(reg.exceptions()[0].cc_number, 1);
    }

    #[test]
    fn kind_change_resets_value() {
        let mut reg = Registry::new();
        let id = reg.add_slider();
        reg.update_slider(id, SliderEdit::Value(90));
        let s = reg.update_slider(id, SliderEdit::Kind(SliderKind::Program)).unwrap();
        assert_eq!(s.kind, SliderKind::Program);
        assert_eq!(s.value, 0);
    }

    #[test]
    fn lfo_survives_disable_enable() {
        let mut reg = Registry::new();
        let id = reg.add_slider();
        reg.update_slider(id, SliderEdit::LfoEnabled(true));
        reg.update_slider(id, SliderEdit::LfoFrequency(1.5));
        reg.update_slider(id, SliderEdit::LfoMinAmplitude(10));
        reg.update_slider(id, SliderEdit::LfoMaxAmplitude(90));
        reg.update_slider(id, SliderEdit::LfoWaveform(Waveform::Square));
        let before = reg.slider(id).unwrap().lfo.clone().unwrap();

        reg.update_slider(id, SliderEdit::LfoEnabled(false));
        let off = reg.slider(id).unwrap().lfo.clone().unwrap();
        assert!(!off.enabled);

        reg.update_slider(id, SliderEdit::LfoEnabled(true));
        let after = reg.slider(id).unwrap().lfo.clone().unwrap();
        assert_eq!(after, before);
    }

    #[test]
    fn non_positive_frequency_is_rejected() {
        let mut reg = Registry::new();
        let id = reg.add_slider();
        reg.update_slider(id, SliderEdit::LfoEnabled(true));
        reg.update_slider(id, SliderEdit::LfoFrequency(0.0));
        reg.update_slider(id, SliderEdit::LfoFrequency(-2.0));
        let lfo = reg.slider(id).unwrap().lfo.clone().unwrap();
        assert_eq!(lfo.frequency, DEFAULT_LFO_FREQUENCY);
    }

    #[test]
    fn exception_edits() {
        let mut reg = Registry::new();
        let id = reg.add_exception();
        reg.update_exception(id, ExceptionEdit::CcNumber(64));
        reg.update_exception(id, ExceptionEdit::Channel(ChannelSpec::All));
        assert_eq!(
            reg.exceptions(),
            &[CcException {
                id,
                cc_number: 64,
                channel: ChannelSpec::All
            }]
        );
        reg.remove_exception(id);
        assert!(reg.exceptions().is_empty());
    }

    #[test]
    fn exclusion_matches_channel_or_all() {
        let all = [CcException {
            id: 1,
            cc_number: 10,
            channel: ChannelSpec::All,
        }];
        let one = [CcException {
            id: 1,
            cc_number: 10,
            channel: ChannelSpec::Channel(1),
        }];
        assert!(is_excluded(10, 2, &all));
        assert!(!is_excluded(10, 2, &one));
        assert!(is_excluded(10, 1, &one));
        assert!(!is_excluded(11, 1, &one));
        assert!(!is_excluded(10, 0, &[]));
    }

    #[test]
    fn from_state_resumes_ids() {
        let mut reg = Registry::new();
        reg.add_slider();
        reg.add_slider();
        reg.remove_slider(1);
        reg.add_exception();
        let state = reg.to_state("Synth".into());

        let mut restored = Registry::from_state(&state);
        assert_eq!(restored.add_slider(), 3);
        assert_eq!(restored.add_exception(), 2);
    }

    #[test]
    fn program_slider_messages() {
        let mut reg = Registry::new();
        let id = reg.add_slider();
        reg.update_slider(id, SliderEdit::Kind(SliderKind::Program));
        reg.update_slider(id, SliderEdit::Channel(ChannelSpec::All));
        let msgs = reg.slider(id).unwrap().messages(9);
        assert_eq!(msgs.len(), 4);
        assert!(msgs.iter().all(|m| matches!(
            m,
            MidiMessage::ProgramChange(pc) if pc.program_number == 9
        )));
    }

    #[test]
    fn lfo_sample_skips_degenerate_frequency() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut lfo = Lfo {
            frequency: 0.0,
            ..Lfo::default()
        };
        assert_eq!(lfo.sample(1_000, &mut rng), None);
    }

    #[test]
    fn lfo_sample_seeds_random_hold_lazily() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut lfo = Lfo {
            waveform: Waveform::Random,
            frequency: 1.0,
            ..Lfo::default()
        };
        assert!(lfo.random.is_none());
        let v = lfo.sample(5_000, &mut rng).unwrap();
        let hold = lfo.random.unwrap();
        assert_eq!(hold.updated_at, 5_000);
        assert_eq!(v, (hold.value * 127.0).round() as u8);

        // Within the 100 ms sub-period the value is held.
        assert_eq!(lfo.sample(5_050, &mut rng), Some(v));
        assert_eq!(lfo.random.unwrap(), hold);
    }
}
