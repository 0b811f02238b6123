//! Top-level application state and the frame loop.
//!
//! `App` owns the [`Session`], the catalog listing and the background
//! loader/download channels.  Window input is first turned into
//! [`Command`]s by [`commands`] and [`SimControls`] by [`sim_controls`],
//! both pure functions so the whole app can be tested without a window.

use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::Arc;
use std::time::Instant;

use log::{info, warn};
use minifb::Key;

use pinch_gesture::Detection;
use pinch_sequence::{
    filter_items, program_family, spawn_download, CatalogItem, CatalogLoader, CatalogMessage,
    CatalogTransport, DirCatalog, DownloadMessage, PagingPolicy,
};

use crate::config::AppConfig;
use crate::detector::{HandDetector, SimControls};
use crate::error::AppError;
use crate::scheduler::PlaybackMode;
use crate::session::{FrameOutput, Session};
use crate::synth::{MidirSynth, SynthBackend};
use crate::visualizer::{FrameView, PanelView, Visualizer, WindowInput};

/// Left-hand movement per frame while an arrow key is held.
const NUDGE_STEP: f32 = 0.01;

// ════════════════════════════════════════════════════════════════════════════
// Commands
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Quit,
    Play,
    Stop,
    ToggleCatalog,
    SelectUp,
    SelectDown,
    Confirm,
    Close,
    Backspace,
    Type(char),
}

/// Keys pressed this frame → commands.  While the catalog panel is open
/// letters and digits go to the search filter instead of the shortcuts.
pub fn commands(input: &WindowInput, panel_open: bool) -> Vec<Command> {
    input.pressed.iter()
        .filter_map(|&key| {
            if panel_open {
                match key {
                    Key::Up        => Some(Command::SelectUp),
                    Key::Down      => Some(Command::SelectDown),
                    Key::Enter     => Some(Command::Confirm),
                    Key::Escape    => Some(Command::Close),
                    Key::Backspace => Some(Command::Backspace),
                    other          => key_char(other).map(Command::Type),
                }
            } else {
                match key {
                    Key::Q => Some(Command::Quit),
                    Key::P => Some(Command::Play),
                    Key::O => Some(Command::Stop),
                    Key::C => Some(Command::ToggleCatalog),
                    _      => None,
                }
            }
        })
        .collect()
}

/// Held keys and the mouse → simulated hand input.  Keyboard-driven hand
/// movement pauses while the panel has focus; the mouse hand keeps working.
pub fn sim_controls(input: &WindowInput, panel_open: bool) -> SimControls {
    let keys = !panel_open;
    let axis = |neg: Key, pos: Key| {
        let mut v = 0.0;
        if keys && input.is_held(neg) { v -= NUDGE_STEP; }
        if keys && input.is_held(pos) { v += NUDGE_STEP; }
        v
    };
    SimControls {
        pointer:     input.pointer,
        pinch_left:  keys && input.is_held(Key::J),
        pinch_right: input.mouse_down || (keys && input.is_held(Key::K)),
        nudge_left:  (axis(Key::Left, Key::Right), axis(Key::Up, Key::Down)),
    }
}

fn key_char(key: Key) -> Option<char> {
    let c = match key {
        Key::A => 'a', Key::B => 'b', Key::C => 'c', Key::D => 'd', Key::E => 'e',
        Key::F => 'f', Key::G => 'g', Key::H => 'h', Key::I => 'i', Key::J => 'j',
        Key::K => 'k', Key::L => 'l', Key::M => 'm', Key::N => 'n', Key::O => 'o',
        Key::P => 'p', Key::Q => 'q', Key::R => 'r', Key::S => 's', Key::T => 't',
        Key::U => 'u', Key::V => 'v', Key::W => 'w', Key::X => 'x', Key::Y => 'y',
        Key::Z => 'z',
        Key::Key0 => '0', Key::Key1 => '1', Key::Key2 => '2', Key::Key3 => '3',
        Key::Key4 => '4', Key::Key5 => '5', Key::Key6 => '6', Key::Key7 => '7',
        Key::Key8 => '8', Key::Key9 => '9',
        Key::Space => ' ',
        Key::Minus => '-',
        _ => return None,
    };
    Some(c)
}

// ════════════════════════════════════════════════════════════════════════════
// App
// ════════════════════════════════════════════════════════════════════════════

pub struct App {
    session:  Session,

    // ── catalog ──────────────────────────────────────────────────────────
    catalog:      Option<Arc<dyn CatalogTransport>>,
    policy:       PagingPolicy,
    loader:       Option<CatalogLoader>,
    download:     Option<Receiver<DownloadMessage>>,
    listing:      Vec<CatalogItem>,
    /// Set once a listing completes; the catalog is not fetched again.
    fully_loaded: bool,

    // ── panel ────────────────────────────────────────────────────────────
    panel_open: bool,
    filter:     String,
    selected:   usize,

    // ── presentation ─────────────────────────────────────────────────────
    pub status: String,
    flash:      Option<String>,
    last:       FrameOutput,
}

impl App {
    pub fn new(config: &AppConfig, catalog: Option<Arc<dyn CatalogTransport>>) -> Self {
        let status = if catalog.is_some() {
            "Ready. Press C to browse the catalog.".to_string()
        } else {
            "Ready. No catalog configured.".to_string()
        };
        App {
            session:      Session::new(config),
            catalog,
            policy:       config.paging_policy(),
            loader:       None,
            download:     None,
            listing:      Vec::new(),
            fully_loaded: false,
            panel_open:   false,
            filter:       String::new(),
            selected:     0,
            status,
            flash:        None,
            last:         FrameOutput::default(),
        }
    }

    pub fn attach_synth(&mut self, synth: Box<dyn SynthBackend>) {
        self.session.attach_synth(synth);
    }

    // ── commands ─────────────────────────────────────────────────────────

    /// Apply one command.  Returns `false` when the app should quit.
    pub fn handle(&mut self, cmd: Command, now: Instant) -> bool {
        match cmd {
            Command::Quit => return false,

            Command::Play => {
                let notes = self.session.play(now);
                self.status = if notes > 0 {
                    format!("Playing: {} notes scheduled", notes)
                } else {
                    "Nothing to play. Pick a song first.".to_string()
                };
            }

            Command::Stop => {
                self.session.stop();
                self.status = "Stopped".to_string();
            }

            Command::ToggleCatalog => {
                self.panel_open = !self.panel_open;
                if self.panel_open {
                    self.ensure_listing();
                }
            }

            Command::Close => self.panel_open = false,

            Command::SelectUp => self.selected = self.selected.saturating_sub(1),

            Command::SelectDown => {
                let count = self.visible_items().len();
                if self.selected + 1 < count {
                    self.selected += 1;
                }
            }

            Command::Type(c) => {
                self.filter.push(c);
                self.selected = 0;
            }

            Command::Backspace => {
                self.filter.pop();
                self.selected = 0;
            }

            Command::Confirm => self.start_download(),
        }
        true
    }

    fn ensure_listing(&mut self) {
        if self.fully_loaded || self.loader.is_some() {
            return;
        }
        let Some(catalog) = &self.catalog else {
            self.status = "No catalog configured (set [catalog] dir)".to_string();
            return;
        };
        info!("loading catalog listing");
        self.loader = Some(CatalogLoader::spawn(Arc::clone(catalog), self.policy.clone()));
        self.status = "Loading catalog...".to_string();
    }

    fn start_download(&mut self) {
        let Some(item) = self.visible_items().get(self.selected).map(|&i| i.clone()) else {
            return;
        };
        let Some(catalog) = &self.catalog else { return };
        // Whatever is sounding belongs to the previous song.
        self.session.stop();
        self.status = format!("Downloading {}...", item.title);
        self.download = Some(spawn_download(Arc::clone(catalog), item));
    }

    // ── background work ──────────────────────────────────────────────────

    /// Apply every finished page and download.  Never blocks.
    pub fn drain_background(&mut self) {
        if let Some(loader) = self.loader.as_mut() {
            for msg in loader.drain() {
                match msg {
                    CatalogMessage::Progress { page, loaded } => {
                        self.status = format!("Catalog page {}, {} items so far", page, loaded);
                    }
                    CatalogMessage::Loaded(items) => {
                        self.status = format!("Catalog loaded: {} items", items.len());
                        self.listing = items;
                        self.fully_loaded = true;
                        self.selected = 0;
                    }
                    CatalogMessage::Failed { page, error } => {
                        self.status = format!("Catalog page {} failed: {}", page, error);
                    }
                }
            }
            if loader.is_finished() {
                self.loader = None;
            }
        }

        let Some(rx) = &self.download else { return };
        match rx.try_recv() {
            Ok(DownloadMessage::Done { item, payload }) => {
                let chords = self.session.select_sequence(&payload);
                let family = payload.events.first()
                    .map(|e| program_family(e.program))
                    .unwrap_or("no notes");
                self.status = format!(
                    "{} / {}: {} chords ({})",
                    item.title, item.composer_or_unknown(), chords, family,
                );
                self.flash = None;
                self.download = None;
            }
            Ok(DownloadMessage::Failed { item, error }) => {
                self.status = format!("Download of {} failed: {}", item.title, error);
                self.download = None;
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => self.download = None,
        }
    }

    // ── per-frame ────────────────────────────────────────────────────────

    pub fn tick(&mut self, detections: &[Detection], now: Instant) {
        self.drain_background();
        let out = self.session.tick(detections, now);
        if let Some(lyric) = &out.released_lyric {
            self.flash = Some(lyric.clone());
        }
        self.last = out;
    }

    pub fn view(&self) -> FrameView<'_> {
        let panel = self.panel_open.then(|| PanelView {
            filter:       &self.filter,
            items:        self.visible_items(),
            selected:     self.selected,
            fully_loaded: self.fully_loaded,
        });
        FrameView {
            frame:      self.session.frame(),
            fingertips: &self.last.fingertips,
            owner:      self.session.gesture_state().active_hand,
            lyric:      self.last.lyric.as_ref().map(|(text, tip)| (text.as_str(), *tip)),
            flash:      self.flash.as_deref(),
            status:     &self.status,
            mode:       self.session.scheduler().mode(),
            panel,
        }
    }

    /// Stop everything before the window goes away.
    pub fn shutdown(&mut self) {
        self.session.stop();
        if let Some(loader) = &self.loader {
            loader.cancel();
        }
    }

    fn visible_items(&self) -> Vec<&CatalogItem> {
        filter_items(&self.listing, &self.filter)
    }

    pub fn panel_open(&self)   -> bool         { self.panel_open }
    pub fn fully_loaded(&self) -> bool         { self.fully_loaded }
    pub fn listing(&self)      -> &[CatalogItem] { &self.listing }
    pub fn session(&self)      -> &Session     { &self.session }
    pub fn mode(&self)         -> PlaybackMode { self.session.scheduler().mode() }
}

// ════════════════════════════════════════════════════════════════════════════
// run
// ════════════════════════════════════════════════════════════════════════════

/// Open the window, MIDI port and hand tracker, then run until the window
/// closes or `Q` is pressed.
pub fn run(cfg: AppConfig) -> Result<(), AppError> {
    let catalog = cfg.catalog.dir.as_ref().map(|dir| {
        info!("catalog directory: {}", dir.display());
        Arc::new(DirCatalog::new(dir.clone())) as Arc<dyn CatalogTransport>
    });
    let mut app = App::new(&cfg, catalog);

    match MidirSynth::open(cfg.midi.port.as_deref()) {
        Ok(synth) => {
            info!("MIDI output: {}", synth.port_name());
            app.attach_synth(Box::new(synth));
        }
        Err(e) => warn!("running without MIDI output: {}", e),
    }

    let mut detector = open_detector();
    let mut vis = Visualizer::new()?;

    'frames: while vis.is_open() {
        let input = vis.poll_input();
        let now = Instant::now();

        for cmd in commands(&input, app.panel_open()) {
            if !app.handle(cmd, now) {
                break 'frames;
            }
        }

        detector.feed(&sim_controls(&input, app.panel_open()));
        let detections = detector.detect();
        app.tick(&detections, now);

        vis.render(&app.view());
    }

    app.shutdown();
    Ok(())
}

#[cfg(feature = "leap")]
fn open_detector() -> Box<dyn HandDetector> {
    Box::new(crate::detector::LeapHands::spawn())
}

#[cfg(not(feature = "leap"))]
fn open_detector() -> Box<dyn HandDetector> {
    Box::new(crate::detector::SimHands::new())
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
