//! # pinch_sequence
//!
//! Everything between the remote MIDI catalog and the player:
//!
//! * [`EventPayload`] — decodes a catalog download (`events` + `lyrics`)
//!   into typed [`NoteEvent`]s, skipping entries that cannot be played.
//! * [`group_events`] — filters to the performance channel, groups notes
//!   sharing a timestamp into [`Chord`]s, attaches lyrics, and sorts the
//!   result into a [`Sequence`].
//! * [`CatalogTransport`] — the paged catalog service; [`DirCatalog`] reads
//!   an on-disk mirror, [`MemoryCatalog`] serves fixed data.
//! * [`Pages`] / [`CatalogLoader`] — page-by-page listing with a
//!   configurable delay between requests, run off the frame thread.
//!
//! ## Quick start
//!
//! ```rust
//! use pinch_sequence::{group_events, EventPayload, GroupingConfig};
//!
//! let payload = EventPayload::from_json(r#"{
//!     "events": [
//!         {"time": 0.0, "channel": 0, "note": 60, "velocity": 0.8, "duration": 0.5, "program": 0},
//!         {"time": 0.0, "channel": 0, "midi": 64, "velocity": 0.8, "duration": 0.5, "program": 0},
//!         {"time": 0.5, "channel": 0, "note": 67, "velocity": 0.7, "duration": 1.0, "program": 0}
//!     ],
//!     "lyrics": [{"time": 0.5, "text": "la"}]
//! }"#).unwrap();
//!
//! let seq = group_events(&payload.events, &payload.lyrics, &GroupingConfig::default());
//! assert_eq!(seq.len(), 2);
//! assert_eq!(seq.get(1).unwrap().lyric.as_deref(), Some("la"));
//! ```

pub mod error;
pub mod event;
pub mod grouping;
pub mod catalog;
pub mod transport;
pub mod loader;
pub mod program;

pub use error::CatalogError;
pub use event::{EventPayload, LyricEvent, NoteEvent};
pub use grouping::{group_events, quantize, Chord, GroupingConfig, Sequence, TIME_QUANTUM};
pub use catalog::{filter_items, sort_by_title, CatalogItem, CatalogPage};
pub use transport::{CatalogTransport, DirCatalog, MemoryCatalog};
pub use loader::{
    spawn_download, CatalogLoader, CatalogMessage, DownloadMessage, Pages, PagingPolicy,
};
pub use program::program_family;
