//! LFO-driven MIDI CC and program-change sliders.

pub mod config;
pub mod controller;
pub mod message;
pub mod midi;
pub mod registry;
pub mod scheduler;
pub mod session;
pub mod waveform;
