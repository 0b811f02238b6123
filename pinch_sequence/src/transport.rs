//! The catalog service behind a trait.
//!
//! | Transport        | Source                                         |
//! |------------------|------------------------------------------------|
//! | [`DirCatalog`]   | on-disk mirror: `index.json` + `events/<id>.json` |
//! | [`MemoryCatalog`]| fixed in-memory data                           |
//!
//! Pages are 1-based, matching the remote API.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use log::debug;
use serde_json::{json, Value};

use crate::catalog::{CatalogItem, CatalogPage};
use crate::error::CatalogError;
use crate::event::EventPayload;

/// Paged listing and per-item event download.  Implementations are called
/// from background threads.
pub trait CatalogTransport: Send + Sync + 'static {
    fn fetch_page(&self, page: u32, limit: u32) -> Result<CatalogPage, CatalogError>;
    fn fetch_events(&self, id: &str) -> Result<EventPayload, CatalogError>;
}

fn page_slice(items: &[CatalogItem], page: u32, limit: u32) -> Vec<CatalogItem> {
    if page == 0 || limit == 0 {
        return Vec::new();
    }
    let start = (page as usize - 1).saturating_mul(limit as usize);
    items.iter().skip(start).take(limit as usize).cloned().collect()
}

// ════════════════════════════════════════════════════════════════════════════
// DirCatalog
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug)]
pub struct DirCatalog {
    root: PathBuf,
}

impl DirCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirCatalog { root: root.into() }
    }

    fn read(&self, path: &Path) -> Result<String, CatalogError> {
        fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `index.json` may be a bare array or an object with `items`.
    fn index(&self) -> Result<Vec<CatalogItem>, CatalogError> {
        let body = self.read(&self.root.join("index.json"))?;
        let value: Value = serde_json::from_str(&body)?;
        let page = match value {
            Value::Array(items) => CatalogPage::from_value(&json!({ "items": items })),
            other => CatalogPage::from_value(&other),
        };
        Ok(page.items)
    }
}

impl CatalogTransport for DirCatalog {
    fn fetch_page(&self, page: u32, limit: u32) -> Result<CatalogPage, CatalogError> {
        let items = self.index()?;
        Ok(CatalogPage { items: page_slice(&items, page, limit) })
    }

    fn fetch_events(&self, id: &str) -> Result<EventPayload, CatalogError> {
        if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
            return Err(CatalogError::NotFound(id.to_string()));
        }
        let path = self.root.join("events").join(format!("{id}.json"));
        if !path.is_file() {
            debug!("no events file at {}", path.display());
            return Err(CatalogError::NotFound(id.to_string()));
        }
        EventPayload::from_json(&self.read(&path)?)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// MemoryCatalog
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct MemoryCatalog {
    items:     Vec<CatalogItem>,
    events:    HashMap<String, EventPayload>,
    fail_page: Option<(u32, u16)>,
    requests:  AtomicUsize,
}

impl MemoryCatalog {
    pub fn new(items: Vec<CatalogItem>) -> Self {
        MemoryCatalog { items, ..Default::default() }
    }

    pub fn with_events(mut self, id: &str, payload: EventPayload) -> Self {
        self.events.insert(id.to_string(), payload);
        self
    }

    /// Make `page` answer with an HTTP-like `status` error.
    pub fn failing_page(mut self, page: u32, status: u16) -> Self {
        self.fail_page = Some((page, status));
        self
    }

    /// Page requests served so far.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl CatalogTransport for MemoryCatalog {
    fn fetch_page(&self, page: u32, limit: u32) -> Result<CatalogPage, CatalogError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        match self.fail_page {
            Some((p, status)) if p == page => Err(CatalogError::Status(status)),
            _ => Ok(CatalogPage { items: page_slice(&self.items, page, limit) }),
        }
    }

    fn fetch_events(&self, id: &str) -> Result<EventPayload, CatalogError> {
        self.events.get(id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join(format!("pinch_sequence_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(dir.join("events")).unwrap();
        dir
    }

    fn items(n: usize) -> Vec<CatalogItem> {
        (0..n).map(|i| CatalogItem::new(i.to_string(), format!("Song {i}"), None)).collect()
    }

    #[test]
    fn pages_are_one_based_slices() {
        let cat = MemoryCatalog::new(items(5));
        assert_eq!(cat.fetch_page(1, 2).unwrap().items.len(), 2);
        assert_eq!(cat.fetch_page(3, 2).unwrap().items[0].id, "4");
        assert!(cat.fetch_page(4, 2).unwrap().is_empty());
        assert!(cat.fetch_page(0, 2).unwrap().is_empty());
        assert_eq!(cat.requests(), 4);
    }

    #[test]
    fn failing_page_reports_status() {
        let cat = MemoryCatalog::new(items(3)).failing_page(2, 503);
        assert!(cat.fetch_page(1, 1).is_ok());
        assert!(matches!(cat.fetch_page(2, 1), Err(CatalogError::Status(503))));
    }

    #[test]
    fn memory_events_lookup() {
        let cat = MemoryCatalog::new(items(1)).with_events("0", EventPayload::default());
        assert!(cat.fetch_events("0").is_ok());
        assert!(matches!(cat.fetch_events("1"), Err(CatalogError::NotFound(_))));
    }

    #[test]
    fn dir_catalog_reads_array_index_and_events() {
        let dir = scratch_dir("array");
        fs::write(dir.join("index.json"),
                  r#"[{"id":1,"title":"One"},{"id":2,"title":"Two"},{"id":3,"title":"Three"}]"#).unwrap();
        fs::write(dir.join("events").join("2.json"),
                  r#"{"events":[{"time":0,"note":60}],"lyrics":[]}"#).unwrap();

        let cat = DirCatalog::new(&dir);
        let page = cat.fetch_page(2, 2).unwrap();
        assert_eq!(page.items, vec![CatalogItem::new("3", "Three", None)]);
        assert_eq!(cat.fetch_events("2").unwrap().events.len(), 1);
        assert!(matches!(cat.fetch_events("9"), Err(CatalogError::NotFound(_))));
        assert!(matches!(cat.fetch_events("../index"), Err(CatalogError::NotFound(_))));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn dir_catalog_reads_object_index() {
        let dir = scratch_dir("object");
        fs::write(dir.join("index.json"), r#"{"items":[{"id":"a","title":"A"}]}"#).unwrap();
        let cat = DirCatalog::new(&dir);
        assert_eq!(cat.fetch_page(1, 100).unwrap().items.len(), 1);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn dir_catalog_missing_index_is_io_error() {
        let dir = scratch_dir("missing");
        let cat = DirCatalog::new(&dir);
        assert!(matches!(cat.fetch_page(1, 10), Err(CatalogError::Io { .. })));
        let _ = fs::remove_dir_all(&dir);
    }
}
