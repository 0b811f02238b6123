//! Interactive browser for an on-disk catalog mirror.
//!
//! Usage: `catalog_menu [catalog-dir]`

use pinch_sequence::{
    filter_items, group_events, program_family, CatalogItem, CatalogLoader, CatalogMessage,
    CatalogTransport, DirCatalog, GroupingConfig, PagingPolicy, Sequence,
};
use std::collections::BTreeSet;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!();
    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║        Pinch Player — catalog browser                    ║");
    println!("║  List, search and inspect catalog items as chords        ║");
    println!("╚══════════════════════════════════════════════════════════╝");
    println!();

    let dir = match std::env::args().nth(1) {
        Some(d) => d,
        None    => read_line("  Catalog directory (default: catalog): ").trim().to_string(),
    };
    let dir = if dir.is_empty() { "catalog".to_string() } else { dir };
    let catalog = Arc::new(DirCatalog::new(&dir));

    let mut listing: Vec<CatalogItem> = Vec::new();
    let mut shown:   Vec<CatalogItem> = Vec::new();

    loop {
        println!("  Main menu:");
        println!("    1. Load listing from '{}'", dir);
        println!("    2. Search title / composer");
        println!("    3. Inspect item");
        println!("    q. Quit");
        println!();

        match read_line("Choice: ").trim() {
            "1" => {
                if let Some(items) = load_listing(&catalog) {
                    listing = items;
                    shown   = listing.clone();
                    print_items(&shown);
                }
            }
            "2" => {
                let keyword = read_line("  Keyword (blank = all): ");
                shown = filter_items(&listing, &keyword).into_iter().cloned().collect();
                print_items(&shown);
            }
            "3" => inspect(&catalog, &shown),
            "q" | "quit" => { println!("\nGoodbye!\n"); break; }
            _   => println!("  ⚠  Enter 1–3 or q.\n"),
        }
        println!();
    }
}

fn load_listing(catalog: &Arc<DirCatalog>) -> Option<Vec<CatalogItem>> {
    let policy = PagingPolicy { delay: Duration::ZERO, ..PagingPolicy::default() };
    let mut loader = CatalogLoader::spawn(Arc::clone(catalog), policy);
    while !loader.is_finished() {
        match loader.recv_timeout(Duration::from_secs(30)) {
            Some(CatalogMessage::Progress { page, loaded }) => {
                println!("  ⏳ page {} read, {} items so far", page, loaded);
            }
            Some(CatalogMessage::Loaded(items)) => {
                println!("  ✓  {} items", items.len());
                return Some(items);
            }
            Some(CatalogMessage::Failed { page, error }) => {
                println!("  ⚠  page {}: {}", page, error);
                return None;
            }
            None => {}
        }
    }
    println!("  ⚠  listing ended without a result");
    None
}

fn print_items(items: &[CatalogItem]) {
    println!();
    for (i, item) in items.iter().enumerate() {
        println!("  {:>4}. {:<40} {}", i + 1, item.title, item.composer_or_unknown());
    }
    println!("  ({} shown)", items.len());
}

fn inspect(catalog: &DirCatalog, shown: &[CatalogItem]) {
    if shown.is_empty() {
        println!("  ⚠  Load the listing first.");
        return;
    }
    let n: usize = match read_line(&format!("  Item number (1–{}): ", shown.len())).trim().parse() {
        Ok(n) if (1..=shown.len()).contains(&n) => n,
        _ => { println!("  ⚠  No such item."); return; }
    };
    let item = &shown[n - 1];
    match catalog.fetch_events(&item.id) {
        Err(e) => println!("  ⚠  {}", e),
        Ok(payload) => {
            let seq = group_events(&payload.events, &payload.lyrics, &GroupingConfig::default());
            summarize(item, &seq);
        }
    }
}

fn summarize(item: &CatalogItem, seq: &Sequence) {
    println!("\n  ── {} ({}) ──", item.title, item.composer_or_unknown());
    println!("  {} chords, {} notes, {:.2} s", seq.len(), seq.note_count(), seq.end_time());

    let families: BTreeSet<&str> = seq.iter()
        .flat_map(|c| c.notes.values())
        .map(|n| program_family(n.program))
        .collect();
    if !families.is_empty() {
        println!("  Instruments: {}", families.into_iter().collect::<Vec<_>>().join(", "));
    }

    for chord in seq.iter().take(16) {
        let pitches: Vec<String> = chord.pitches().map(|p| p.to_string()).collect();
        match &chord.lyric {
            Some(l) => println!("  {:>8.3}s  [{}]  \"{}\"", chord.timestamp, pitches.join(" "), l),
            None    => println!("  {:>8.3}s  [{}]", chord.timestamp, pitches.join(" ")),
        }
    }
    if seq.len() > 16 {
        println!("  … {} more", seq.len() - 16);
    }
}

fn read_line(prompt: &str) -> String {
    print!("{}", prompt);
    io::stdout().flush().ok();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf
}
