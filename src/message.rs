use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of addressable channels; `ChannelSpec::All` fans out to `0..MAX_MIDI_CHANNEL`.
pub const MAX_MIDI_CHANNEL: u8 = 4;

/// A single channel, or every channel.
///
/// Serialized as an integer or the string `"all"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ChannelRepr", into = "ChannelRepr")]
pub enum ChannelSpec {
    Channel(u8),
    All,
}

impl Default for ChannelSpec {
    fn default() -> Self {
        ChannelSpec::Channel(0)
    }
}

impl ChannelSpec {
    pub fn matches(self, channel: u8) -> bool {
        match self {
            ChannelSpec::All => true,
            ChannelSpec::Channel(c) => c == channel,
        }
    }
}

impl fmt::Display for ChannelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelSpec::Channel(c) => write!(f, "{c}"),
            ChannelSpec::All => f.write_str("all"),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ChannelRepr {
    Index(u8),
    Name(String),
}

impl TryFrom<ChannelRepr> for ChannelSpec {
    type Error = String;

    fn try_from(repr: ChannelRepr) -> Result<Self, Self::Error> {
        match repr {
            ChannelRepr::Index(c) => Ok(ChannelSpec::Channel(c)),
            ChannelRepr::Name(s) if s.eq_ignore_ascii_case("all") => Ok(ChannelSpec::All),
            ChannelRepr::Name(s) => Err(format!("invalid channel '{s}' (expected 0-255 or \"all\")")),
        }
    }
}

impl From<ChannelSpec> for ChannelRepr {
    fn from(spec: ChannelSpec) -> Self {
        match spec {
            ChannelSpec::Channel(c) => ChannelRepr::Index(c),
            ChannelSpec::All => ChannelRepr::Name("all".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlChange {
    pub cc_number: u8,
    pub value: u8,
    pub channel: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramChange {
    pub program_number: u8,
    pub channel: u8,
}

/// A concrete per-channel message ready for the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    ControlChange(ControlChange),
    ProgramChange(ProgramChange),
}

impl MidiMessage {
    /// Raw bytes: `[0xB0 + ch, cc, value]` or `[0xC0 + ch, program]`.
    ///
    /// Data bytes are passed through unchecked.
    pub fn to_bytes(&self) -> Vec<u8> {
        match *self {
            MidiMessage::ControlChange(cc) => {
                vec![0xB0u8.wrapping_add(cc.channel), cc.cc_number, cc.value]
            }
            MidiMessage::ProgramChange(pc) => {
                vec![0xC0u8.wrapping_add(pc.channel), pc.program_number]
            }
        }
    }
}

fn channels(spec: ChannelSpec) -> impl Iterator<Item = u8> {
    match spec {
        ChannelSpec::All => 0..=MAX_MIDI_CHANNEL - 1,
        ChannelSpec::Channel(c) => c..=c,
    }
}

/// Expand a control change onto one channel or all of them, in ascending
/// channel order.
pub fn compose_cc(cc_number: u8, value: u8, spec: ChannelSpec) -> Vec<ControlChange> {
    channels(spec)
        .map(|channel| ControlChange {
            cc_number,
            value,
            channel,
        })
        .collect()
}

pub fn compose_program_change(program_number: u8, spec: ChannelSpec) -> Vec<ProgramChange> {
    channels(spec)
        .map(|channel| ProgramChange {
            program_number,
            channel,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cc_fans_out_to_all_channels() {
        let msgs = compose_cc(5, 64, ChannelSpec::All);
        assert_eq!(msgs.len(), 4);
        for (i, m) in msgs.iter().enumerate() {
            assert_eq!(
                *m,
                ControlChange {
                    cc_number: 5,
                    value: 64,
                    channel: i as u8
                }
            );
        }
    }

    #[test]
    fn cc_single_channel() {
        assert_eq!(
            compose_cc(5, 64, ChannelSpec::Channel(2)),
            vec![ControlChange {
                cc_number: 5,
                value: 64,
                channel: 2
            }]
        );
    }

    #[test]
    fn program_change_fans_out() {
        let msgs = compose_program_change(12, ChannelSpec::All);
        let chans: Vec<u8> = msgs.iter().map(|m| m.channel).collect();
        assert_eq!(chans, vec![0, 1, 2, 3]);
        assert!(msgs.iter().all(|m| m.program_number == 12));
        assert_eq!(compose_program_change(12, ChannelSpec::Channel(3)).len(), 1);
    }

    #[test]
    fn single_channel_at_top_of_byte_range() {
        let msgs = compose_cc(1, 1, ChannelSpec::Channel(255));
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].channel, 255);
    }

    #[test]
    fn wire_encoding() {
        let cc = MidiMessage::ControlChange(ControlChange {
            cc_number: 7,
            value: 100,
            channel: 3,
        });
        assert_eq!(cc.to_bytes(), vec![0xB3, 7, 100]);

        let pc = MidiMessage::ProgramChange(ProgramChange {
            program_number: 42,
            channel: 0,
        });
        assert_eq!(pc.to_bytes(), vec![0xC0, 42]);
    }

    #[test]
    fn out_of_range_values_pass_through() {
        let msgs = compose_cc(200, 255, ChannelSpec::Channel(1));
        assert_eq!(msgs[0].cc_number, 200);
        assert_eq!(msgs[0].value, 255);
    }

    #[test]
    fn channel_spec_matches() {
        assert!(ChannelSpec::All.matches(3));
        assert!(ChannelSpec::Channel(1).matches(1));
        assert!(!ChannelSpec::Channel(1).matches(2));
    }
}
