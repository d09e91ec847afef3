use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::midi::MessageSink;
use crate::registry::{ExceptionEdit, Registry, SliderEdit};
use crate::scheduler;

/// Routes user intents to the registry and emits the resulting messages.
pub struct Controller<S: MessageSink> {
    registry: Registry,
    sink: S,
    rng: StdRng,
}

impl<S: MessageSink> Controller<S> {
    pub fn new(registry: Registry, sink: S) -> Self {
        Self::with_rng(registry, sink, StdRng::from_entropy())
    }

    pub fn with_rng(registry: Registry, sink: S, rng: StdRng) -> Self {
        Controller { registry, sink, rng }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn add_slider(&mut self) -> u32 {
        self.registry.add_slider()
    }

    pub fn remove_slider(&mut self, id: u32) {
        self.registry.remove_slider(id);
    }

    /// Manual fader move: store the value and send it right away.
    pub fn set_value(&mut self, id: u32, value: u8) {
        if let Some(slider) = self.registry.update_slider(id, SliderEdit::Value(value)) {
            let messages = slider.messages(value);
            self.sink.emit(messages);
        }
    }

    /// Apply a field edit. Only value edits produce messages.
    pub fn edit_slider(&mut self, id: u32, edit: SliderEdit) {
        if let SliderEdit::Value(value) = edit {
            self.set_value(id, value);
        } else {
            self.registry.update_slider(id, edit);
        }
    }

    pub fn set_lfo_enabled(&mut self, id: u32, enabled: bool) {
        self.registry.update_slider(id, SliderEdit::LfoEnabled(enabled));
    }

    pub fn add_exception(&mut self) -> u32 {
        self.registry.add_exception()
    }

    pub fn edit_exception(&mut self, id: u32, edit: ExceptionEdit) {
        self.registry.update_exception(id, edit);
    }

    pub fn remove_exception(&mut self, id: u32) {
        self.registry.remove_exception(id);
    }

    /// Random values for every CC on every channel, honoring exceptions.
    pub fn randomize_ccs(&mut self) -> usize {
        let messages = scheduler::random_cc_messages(self.registry.exceptions(), &mut self.rng);
        let count = messages.len();
        log::info!("Randomizing {count} CC(s)");
        self.sink.emit(messages);
        count
    }

    pub fn randomize_programs(&mut self) -> usize {
        let messages = scheduler::random_program_changes(&mut self.rng);
        let count = messages.len();
        log::info!("Randomizing programs on {count} channel(s)");
        self.sink.emit(messages);
        count
    }

    /// One modulation tick at wall-clock `now_ms`.
    pub fn tick(&mut self, now_ms: u64) -> usize {
        scheduler::modulate(&mut self.registry, now_ms, &mut self.rng, &mut self.sink)
    }
}
