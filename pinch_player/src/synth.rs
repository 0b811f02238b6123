//! MIDI output.
//!
//! [`SynthBackend`] is the seam between the scheduler and whatever renders
//! audio.  [`MidirSynth`] sends raw channel messages to a system MIDI port;
//! when no port can be opened the scheduler simply runs without a backend.

use log::{info, warn};
use thiserror::Error;

const CLIENT_NAME: &str = "pinch_player";

/// Port names that look like a General MIDI softsynth.
const SOFTSYNTH_HINTS: [&str; 5] = ["fluid", "timidity", "microsoft", "gm", "synth"];

#[derive(Error, Debug)]
pub enum SynthError {
    #[error("MIDI init failed: {0}")]
    Init(#[from] midir::InitError),

    #[error("no MIDI output ports found")]
    NoPorts,

    #[error("cannot connect to MIDI port {port}: {reason}")]
    Connect { port: String, reason: String },

    #[error("MIDI send failed: {0}")]
    Send(#[from] midir::SendError),
}

/// Channel voice messages the performance needs.  Every call is
/// fire-and-forget from the caller's point of view; errors are reported so
/// the caller can decide whether to log them.
pub trait SynthBackend {
    fn program_change(&mut self, channel: u8, program: u8) -> Result<(), SynthError>;
    fn note_on(&mut self, channel: u8, note: u8, velocity: u8) -> Result<(), SynthError>;
    fn note_off(&mut self, channel: u8, note: u8) -> Result<(), SynthError>;
    fn controller_change(&mut self, channel: u8, controller: u8, value: u8) -> Result<(), SynthError>;
    fn channel_pressure(&mut self, channel: u8, pressure: u8) -> Result<(), SynthError>;
}

// ════════════════════════════════════════════════════════════════════════════
// MidirSynth
// ════════════════════════════════════════════════════════════════════════════

pub struct MidirSynth {
    conn: midir::MidiOutputConnection,
    port: String,
}

impl MidirSynth {
    /// Connect to an output port.  With `port_hint` the first port whose name
    /// contains it (ignoring case) is used; otherwise a softsynth-looking port
    /// is preferred, then the first port.
    pub fn open(port_hint: Option<&str>) -> Result<Self, SynthError> {
        let midi_out = midir::MidiOutput::new(CLIENT_NAME)?;
        let ports = midi_out.ports();
        if ports.is_empty() {
            warn!("no MIDI output ports found; install a synthesiser such as \
                   `fluidsynth` or `timidity -iA` on Linux");
            return Err(SynthError::NoPorts);
        }

        let names: Vec<String> = ports.iter()
            .map(|p| midi_out.port_name(p).unwrap_or_else(|_| "Unknown".to_string()))
            .collect();
        let index = pick_port(&names, port_hint);
        let port = names[index].clone();
        info!("opening MIDI port: {}", port);

        match midi_out.connect(&ports[index], "pinch-play") {
            Ok(conn) => Ok(MidirSynth { conn, port }),
            Err(e)   => Err(SynthError::Connect { port, reason: e.to_string() }),
        }
    }

    pub fn port_name(&self) -> &str {
        &self.port
    }

    fn send(&mut self, message: &[u8]) -> Result<(), SynthError> {
        self.conn.send(message)?;
        Ok(())
    }
}

impl SynthBackend for MidirSynth {
    fn program_change(&mut self, channel: u8, program: u8) -> Result<(), SynthError> {
        self.send(&[0xC0 | (channel & 0x0F), program & 0x7F])
    }
    fn note_on(&mut self, channel: u8, note: u8, velocity: u8) -> Result<(), SynthError> {
        self.send(&[0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F])
    }
    fn note_off(&mut self, channel: u8, note: u8) -> Result<(), SynthError> {
        self.send(&[0x80 | (channel & 0x0F), note & 0x7F, 0])
    }
    fn controller_change(&mut self, channel: u8, controller: u8, value: u8) -> Result<(), SynthError> {
        self.send(&[0xB0 | (channel & 0x0F), controller & 0x7F, value & 0x7F])
    }
    fn channel_pressure(&mut self, channel: u8, pressure: u8) -> Result<(), SynthError> {
        self.send(&[0xD0 | (channel & 0x0F), pressure & 0x7F])
    }
}

/// Index of the port to open.  `names` must be non-empty.
fn pick_port(names: &[String], hint: Option<&str>) -> usize {
    let lower: Vec<String> = names.iter().map(|n| n.to_lowercase()).collect();
    if let Some(hint) = hint.map(str::to_lowercase).filter(|h| !h.is_empty()) {
        if let Some(i) = lower.iter().position(|n| n.contains(&hint)) {
            return i;
        }
        warn!("no MIDI port matches {:?}; falling back", hint);
    }
    lower.iter()
        .position(|n| SOFTSYNTH_HINTS.iter().any(|h| n.contains(h)))
        .unwrap_or(0)
}

// ════════════════════════════════════════════════════════════════════════════
// Recording backend (tests)
// ════════════════════════════════════════════════════════════════════════════


// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
