//! Background catalog listing and event downloads.
//!
//! [`Pages`] walks the paged listing one request at a time, waiting
//! [`PagingPolicy::delay`] between requests.  [`CatalogLoader`] runs it on a
//! spawned thread and reports over a `mpsc` channel so the frame loop only
//! ever drains messages.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{info, warn};

use crate::catalog::{sort_by_title, CatalogItem};
use crate::error::CatalogError;
use crate::event::EventPayload;
use crate::transport::CatalogTransport;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PagingPolicy {
    pub limit:     u32,
    pub delay:     Duration,
    /// Stop after this many pages even if the listing continues.
    pub max_pages: Option<u32>,
}

impl Default for PagingPolicy {
    fn default() -> Self {
        PagingPolicy {
            limit:     100,
            delay:     Duration::from_millis(250),
            max_pages: None,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Pages
// ════════════════════════════════════════════════════════════════════════════

/// Restartable, cancelable iterator over listing pages.
///
/// Yields `(page, items)` for each non-empty page.  Ends at the first empty
/// page, after yielding an error, on cancel, or at `max_pages`.
pub struct Pages<T: CatalogTransport + ?Sized> {
    transport: Arc<T>,
    policy:    PagingPolicy,
    cancel:    Arc<AtomicBool>,
    next_page: u32,
    fetched:   u32,
    done:      bool,
}

impl<T: CatalogTransport + ?Sized> Pages<T> {
    pub fn new(transport: Arc<T>, policy: PagingPolicy) -> Self {
        Pages {
            transport,
            policy,
            cancel:    Arc::new(AtomicBool::new(false)),
            next_page: 1,
            fetched:   0,
            done:      false,
        }
    }

    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// The page the next call to `next` will request.
    pub fn next_page(&self) -> u32 {
        self.next_page
    }

    pub fn restart(&mut self) {
        self.next_page = 1;
        self.fetched   = 0;
        self.done      = false;
        self.cancel.store(false, Ordering::SeqCst);
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

impl<T: CatalogTransport + ?Sized> Iterator for Pages<T> {
    type Item = Result<(u32, Vec<CatalogItem>), CatalogError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.cancelled() {
            self.done = true;
            return None;
        }
        if self.policy.max_pages.is_some_and(|max| self.fetched >= max) {
            self.done = true;
            return None;
        }
        if self.fetched > 0 && !self.policy.delay.is_zero() {
            thread::sleep(self.policy.delay);
            if self.cancelled() {
                self.done = true;
                return None;
            }
        }

        let page = self.next_page;
        match self.transport.fetch_page(page, self.policy.limit) {
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
            Ok(p) if p.is_empty() => {
                self.done = true;
                None
            }
            Ok(p) => {
                self.next_page += 1;
                self.fetched   += 1;
                Some(Ok((page, p.items)))
            }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// CatalogLoader
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CatalogMessage {
    /// `page` arrived; `loaded` items so far.
    Progress { page: u32, loaded: usize },
    /// Whole listing, sorted by title.
    Loaded(Vec<CatalogItem>),
    /// Paging stopped at `page`; nothing already loaded is delivered.
    Failed { page: u32, error: String },
}

pub struct CatalogLoader {
    rx:       Receiver<CatalogMessage>,
    cancel:   Arc<AtomicBool>,
    finished: bool,
}

impl CatalogLoader {
    pub fn spawn<T: CatalogTransport + ?Sized>(transport: Arc<T>, policy: PagingPolicy) -> Self {
        let (tx, rx) = mpsc::channel();
        let cancel   = Arc::new(AtomicBool::new(false));
        let pages    = Pages::new(transport, policy).with_cancel(Arc::clone(&cancel));
        let flag     = Arc::clone(&cancel);
        thread::spawn(move || run_listing(pages, flag, tx));
        CatalogLoader { rx, cancel, finished: false }
    }

    /// Every message that has arrived, without blocking.
    pub fn drain(&mut self) -> Vec<CatalogMessage> {
        let messages: Vec<_> = self.rx.try_iter().collect();
        if messages.iter().any(is_final) {
            self.finished = true;
        }
        messages
    }

    /// Block for the next message, up to `timeout`.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<CatalogMessage> {
        match self.rx.recv_timeout(timeout) {
            Ok(msg) => {
                self.finished |= is_final(&msg);
                Some(msg)
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.finished = true;
                None
            }
            Err(RecvTimeoutError::Timeout) => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }
}

impl Drop for CatalogLoader {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn is_final(msg: &CatalogMessage) -> bool {
    !matches!(msg, CatalogMessage::Progress { .. })
}

fn run_listing<T: CatalogTransport + ?Sized>(
    mut pages: Pages<T>,
    cancel:    Arc<AtomicBool>,
    tx:        Sender<CatalogMessage>,
) {
    let mut items = Vec::new();
    while let Some(result) = pages.next() {
        match result {
            Ok((page, batch)) => {
                items.extend(batch);
                let _ = tx.send(CatalogMessage::Progress { page, loaded: items.len() });
            }
            Err(e) => {
                warn!("catalog page {} failed: {}", pages.next_page(), e);
                let _ = tx.send(CatalogMessage::Failed { page: pages.next_page(), error: e.to_string() });
                return;
            }
        }
    }
    if cancel.load(Ordering::SeqCst) {
        info!("catalog listing cancelled after {} items", items.len());
        return;
    }
    sort_by_title(&mut items);
    info!("catalog listing complete: {} items", items.len());
    let _ = tx.send(CatalogMessage::Loaded(items));
}

// ════════════════════════════════════════════════════════════════════════════
// Downloads
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq)]
pub enum DownloadMessage {
    Done { item: CatalogItem, payload: EventPayload },
    Failed { item: CatalogItem, error: String },
}

/// Fetch one item's events on a background thread.  Exactly one message is
/// sent.
pub fn spawn_download<T: CatalogTransport + ?Sized>(
    transport: Arc<T>,
    item:      CatalogItem,
) -> Receiver<DownloadMessage> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let msg = match transport.fetch_events(&item.id) {
            Ok(payload) => DownloadMessage::Done { item, payload },
            Err(e) => {
                warn!("download of {} failed: {}", item.id, e);
                DownloadMessage::Failed { item, error: e.to_string() }
            }
        };
        let _ = tx.send(msg);
    });
    rx
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
