use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use midir::{MidiOutput, MidiOutputConnection};

use crate::message::MidiMessage;

/// An output port as seen at enumeration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputInfo {
    pub id: usize,
    pub name: String,
}

/// Device-side MIDI output.
pub trait Transport: Send {
    fn outputs(&self) -> anyhow::Result<Vec<OutputInfo>>;
    /// Open `output`. Must be cheap to call again while already open.
    fn open(&mut self, output: &OutputInfo) -> anyhow::Result<()>;
    fn send(&mut self, output: &OutputInfo, bytes: &[u8]) -> anyhow::Result<()>;
}

/// Receiver of composed message batches.
pub trait MessageSink {
    fn emit(&mut self, messages: Vec<MidiMessage>);
}

pub struct MidirTransport {
    client_name: String,
    connection: Option<(String, MidiOutputConnection)>,
}

impl MidirTransport {
    /// Fails when the platform offers no MIDI output at all.
    pub fn new(client_name: &str) -> anyhow::Result<Self> {
        // Probe once so a missing backend is reported up front.
        MidiOutput::new(client_name)?;
        Ok(MidirTransport {
            client_name: client_name.to_string(),
            connection: None,
        })
    }
}

impl Transport for MidirTransport {
    fn outputs(&self) -> anyhow::Result<Vec<OutputInfo>> {
        let midi_out = MidiOutput::new(&self.client_name)?;
        Ok(midi_out
            .ports()
            .iter()
            .enumerate()
            .map(|(id, port)| OutputInfo {
                id,
                name: midi_out
                    .port_name(port)
                    .unwrap_or_else(|_| "Unknown Device".into()),
            })
            .collect())
    }

    fn open(&mut self, output: &OutputInfo) -> anyhow::Result<()> {
        if let Some((ref name, _)) = self.connection {
            if *name == output.name {
                return Ok(());
            }
        }
        // Close the previous port before opening another.
        if let Some((name, conn)) = self.connection.take() {
            conn.close();
            log::info!("Closed MIDI output: {name}");
        }

        let midi_out = MidiOutput::new(&self.client_name)?;
        let port = midi_out
            .ports()
            .into_iter()
            .find(|p| midi_out.port_name(p).is_ok_and(|n| n == output.name))
            .ok_or_else(|| anyhow::anyhow!("MIDI output not found: {}", output.name))?;
        let conn = midi_out
            .connect(&port, &self.client_name)
            .map_err(|e| anyhow::anyhow!("Failed to open MIDI output {}: {e}", output.name))?;
        log::info!("Opened MIDI output: {}", output.name);
        self.connection = Some((output.name.clone(), conn));
        Ok(())
    }

    fn send(&mut self, output: &OutputInfo, bytes: &[u8]) -> anyhow::Result<()> {
        match self.connection {
            Some((ref name, ref mut conn)) if *name == output.name => conn
                .send(bytes)
                .map_err(|e| anyhow::anyhow!("send to {name} failed: {e}")),
            _ => anyhow::bail!("MIDI output {} is not open", output.name),
        }
    }
}

enum OutputCommand {
    Select(Option<OutputInfo>),
    Send(Vec<MidiMessage>),
    Stop,
}

/// Handle to the background thread that owns the transport.
///
/// Batches are queued without waiting for delivery. When the queue is full
/// the batch is dropped.
pub struct OutputHandle {
    sender: Option<Sender<OutputCommand>>,
    thread: Option<thread::JoinHandle<()>>,
    outputs: Vec<OutputInfo>,
    selected: Option<OutputInfo>,
}

impl OutputHandle {
    pub fn spawn(transport: Box<dyn Transport>, queue: usize) -> Self {
        let outputs = match transport.outputs() {
            Ok(o) => o,
            Err(e) => {
                log::warn!("Failed to enumerate MIDI outputs: {e}");
                Vec::new()
            }
        };
        let (tx, rx) = crossbeam_channel::bounded(queue.max(1));
        let thread = thread::Builder::new()
            .name("midi-out".into())
            .spawn(move || output_thread(transport, rx))
            .map_err(|e| log::error!("Failed to start MIDI output thread: {e}"))
            .ok();
        OutputHandle {
            sender: thread.as_ref().map(|_| tx),
            thread,
            outputs,
            selected: None,
        }
    }

    /// No MIDI access: every operation is a no-op.
    pub fn disconnected() -> Self {
        OutputHandle {
            sender: None,
            thread: None,
            outputs: Vec::new(),
            selected: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.sender.is_some()
    }

    pub fn outputs(&self) -> &[OutputInfo] {
        &self.outputs
    }

    pub fn selected(&self) -> Option<&OutputInfo> {
        self.selected.as_ref()
    }

    /// First output whose name contains `filter`.
    pub fn find(&self, filter: &str) -> Option<OutputInfo> {
        self.outputs
            .iter()
            .find(|o| o.name.contains(filter))
            .cloned()
    }

    pub fn select(&mut self, output: Option<OutputInfo>) {
        match &output {
            Some(o) => log::info!("Selected MIDI output: {}", o.name),
            None => log::info!("No MIDI output selected"),
        }
        self.selected = output.clone();
        if let Some(tx) = &self.sender {
            if tx.send(OutputCommand::Select(output)).is_err() {
                log::warn!("MIDI output thread has exited");
            }
        }
    }

    /// Select the output after the current one, wrapping around.
    pub fn select_next(&mut self) {
        if self.outputs.is_empty() {
            log::warn!("No MIDI outputs available");
            return;
        }
        let next = match &self.selected {
            Some(cur) => self
                .outputs
                .iter()
                .position(|o| o.id == cur.id)
                .map_or(0, |i| (i + 1) % self.outputs.len()),
            None => 0,
        };
        self.select(Some(self.outputs[next].clone()));
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.sender.take() {
            let _ = tx.send(OutputCommand::Stop);
        }
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl MessageSink for OutputHandle {
    fn emit(&mut self, messages: Vec<MidiMessage>) {
        let Some(tx) = &self.sender else {
            return;
        };
        if self.selected.is_none() || messages.is_empty() {
            return;
        }
        log::debug!("Queueing {} MIDI message(s)", messages.len());
        match tx.try_send(OutputCommand::Send(messages)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => log::warn!("MIDI output queue full, dropping batch"),
            Err(TrySendError::Disconnected(_)) => log::warn!("MIDI output thread has exited"),
        }
    }
}

impl Drop for OutputHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

fn output_thread(mut transport: Box<dyn Transport>, rx: Receiver<OutputCommand>) {
    let mut selected: Option<OutputInfo> = None;
    for cmd in rx.iter() {
        match cmd {
            OutputCommand::Select(output) => selected = output,
            OutputCommand::Send(messages) => {
                let Some(output) = &selected else {
                    continue;
                };
                if let Err(e) = deliver(transport.as_mut(), output, &messages) {
                    log::error!("Error sending MIDI to {}: {e}", output.name);
                }
            }
            OutputCommand::Stop => break,
        }
    }
}

fn deliver(
    transport: &mut dyn Transport,
    output: &OutputInfo,
    messages: &[MidiMessage],
) -> anyhow::Result<()> {
    transport.open(output)?;
    for msg in messages {
        let bytes = msg.to_bytes();
        transport.send(output, &bytes)?;
        log::trace!("MIDI out [{}] data={bytes:02x?}", output.name);
    }
    Ok(())
}

#[cfg(test)]
impl MessageSink for Vec<Vec<MidiMessage>> {
    fn emit(&mut self, messages: Vec<MidiMessage>) {
        self.push(messages);
    }
}
