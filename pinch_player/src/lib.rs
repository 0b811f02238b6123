//! # pinch_player
//!
//! Pinch-gesture MIDI performance: each pinch steps one chord through a
//! song from the catalog, the other hand shapes volume and pressure, and a
//! timed mode replays the whole song on its original clock.
//!
//! ## Gesture → Action mapping
//!
//! | Gesture | Hand | Action |
//! |---|---|---|
//! | Pinch (thumb tip meets index tip) | Either | Play the next chord; the pinching hand owns the performance |
//! | Pinch with the other hand while the owner holds | Other | Release, then play the next chord for the new owner |
//! | Open the owning hand while the other stays pinched | Owner | Ownership moves silently |
//! | Open both hands | Both | Release every sounding note; the chord's lyric flashes |
//! | Move controller index tip up / down | Free hand by default | Channel volume (CC 7) |
//! | Move controller index tip sideways | Free hand by default | Channel pressure, centred on the pinch point |
//!
//! ## Feature flags
//!
//! * (default) — **Simulation mode**: mouse and keyboard drive two hands.
//! * `leap` — **Hardware mode**: polls a real LeapMotion controller via LeapC.
//!
//! ### Simulation controls
//!
//! | Input | Action |
//! |---|---|
//! | Mouse | Move the right index tip |
//! | Arrow keys | Move the left hand |
//! | `J` | Pinch left |
//! | `K` / left mouse button | Pinch right |
//! | `P` / `O` | Timed play / stop |
//! | `C` | Open the catalog panel |
//! | `Up` / `Down`, `Enter` | Select and load a song (panel open) |
//! | typing, `Backspace` | Search by title or composer (panel open) |
//! | `Escape` | Close the panel |
//! | `Q` | Quit |

pub mod synth;
pub mod timer;
pub mod scheduler;
pub mod session;
pub mod config;
pub mod error;
pub mod detector;
pub mod visualizer;
pub mod app;
