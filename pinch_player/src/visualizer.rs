//! Software-rendered overlay using `minifb`.
//!
//! Layout:
//!
//! ```text
//! ┌──────────────────────────────────────────────┬───────────────┐
//! │  flash lyric                                 │  CATALOG      │
//! │                                              │  filter: ...  │
//! │      ● thumb (red)   ● index (blue)          │  > item       │
//! │                                              │    item       │
//! │          (lyric circle at playing tip)       │    item       │
//! │                                              │  (when open)  │
//! ├──────────────────────────────────────────────┴───────────────┤
//! │  status bar                                                  │
//! │  key legend                                                  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Camera-space points are mirrored horizontally so the overlay reads like
//! a selfie view.

use minifb::{Key, KeyRepeat, MouseButton, MouseMode, Window, WindowOptions};

use pinch_gesture::{FrameSize, HandSide, Landmark};
use pinch_sequence::CatalogItem;

use crate::error::AppError;
use crate::scheduler::PlaybackMode;
use crate::session::Fingertips;

// ════════════════════════════════════════════════════════════════════════════
// Layout constants
// ════════════════════════════════════════════════════════════════════════════

pub const WIN_W:     usize = 960;
pub const WIN_H:     usize = 540;
const PANEL_W:       usize = 330;
const PANEL_X:       usize = WIN_W - PANEL_W;
const STATUS_H:      usize = 40;
const STATUS_Y:      usize = WIN_H - STATUS_H;
const ROW_H:         usize = 14;
const DOT_R:         usize = 8;
const LYRIC_R:       usize = 46;
const BG_COLOR:      u32   = 0xFF101418;
const PANEL_BG:      u32   = 0xFF16213E;
const SELECT_BG:     u32   = 0xFF0F3460;
const STATUS_BG:     u32   = 0xFF0B0E12;
const THUMB_COLOR:   u32   = 0xFFE53935;  // red
const INDEX_COLOR:   u32   = 0xFF1E88E5;  // blue
const OWNER_RING:    u32   = 0xFFFFD700;  // gold
const LYRIC_FILL:    u32   = 0xFFFFFFFF;
const TEXT_COLOR:    u32   = 0xFFEEEEEE;
const DIM_TEXT:      u32   = 0xFF888888;

/// Catalog rows that fit in the panel.
pub const PANEL_ROWS: usize = (STATUS_Y - 70) / ROW_H;

// ════════════════════════════════════════════════════════════════════════════
// Input / view types
// ════════════════════════════════════════════════════════════════════════════

/// Raw window input for one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WindowInput {
    /// Pointer as a fraction of the window, if inside it.
    pub pointer:    Option<(f32, f32)>,
    pub mouse_down: bool,
    /// Keys that went down this frame.
    pub pressed:    Vec<Key>,
    /// Keys held down now.
    pub held:       Vec<Key>,
}

impl WindowInput {
    pub fn is_held(&self, key: Key) -> bool {
        self.held.contains(&key)
    }
}

pub struct PanelView<'a> {
    pub filter:       &'a str,
    pub items:        Vec<&'a CatalogItem>,
    /// Index into `items`.
    pub selected:     usize,
    pub fully_loaded: bool,
}

/// Everything drawn in one frame.
pub struct FrameView<'a> {
    pub frame:      FrameSize,
    pub fingertips: &'a [Fingertips],
    pub owner:      Option<HandSide>,
    pub lyric:      Option<(&'a str, Landmark)>,
    pub flash:      Option<&'a str>,
    pub status:     &'a str,
    pub mode:       PlaybackMode,
    pub panel:      Option<PanelView<'a>>,
}

/// Camera pixels → window pixels, mirrored horizontally.
pub fn to_window(point: Landmark, frame: FrameSize) -> (f32, f32) {
    let sx = WIN_W as f32 / frame.width.max(1.0);
    let sy = WIN_H as f32 / frame.height.max(1.0);
    (WIN_W as f32 - point.x * sx, point.y * sy)
}

// ════════════════════════════════════════════════════════════════════════════
// Visualizer
// ════════════════════════════════════════════════════════════════════════════

pub struct Visualizer {
    window: Window,
    buf:    Vec<u32>,
}

impl Visualizer {
    pub fn new() -> Result<Self, AppError> {
        let mut window = Window::new(
            "Pinch Player: gesture MIDI performance",
            WIN_W, WIN_H,
            WindowOptions {
                resize: false,
                ..WindowOptions::default()
            },
        )?;

        window.limit_update_rate(Some(std::time::Duration::from_millis(16))); // ~60fps

        Ok(Visualizer {
            window,
            buf: vec![BG_COLOR; WIN_W * WIN_H],
        })
    }

    pub fn is_open(&self) -> bool { self.window.is_open() }

    pub fn poll_input(&self) -> WindowInput {
        let pointer = self.window
            .get_mouse_pos(MouseMode::Discard)
            .map(|(x, y)| (x / WIN_W as f32, y / WIN_H as f32));
        WindowInput {
            pointer,
            mouse_down: self.window.get_mouse_down(MouseButton::Left),
            pressed:    self.window.get_keys_pressed(KeyRepeat::No),
            held:       self.window.get_keys(),
        }
    }

    /// Render one frame.
    pub fn render(&mut self, view: &FrameView) {
        self.buf.fill(BG_COLOR);

        if let Some(flash) = view.flash {
            self.draw_text(flash, 16, 16, 3, TEXT_COLOR);
        }

        // ── fingertips ───────────────────────────────────────────────────
        for tips in view.fingertips {
            let (tx, ty) = to_window(tips.thumb, view.frame);
            let (ix, iy) = to_window(tips.index, view.frame);
            if view.owner == Some(tips.side) {
                self.fill_circle(ix, iy, DOT_R + 3, OWNER_RING, 1.0);
            }
            self.fill_circle(tx, ty, DOT_R, THUMB_COLOR, 1.0);
            self.fill_circle(ix, iy, DOT_R, INDEX_COLOR, 1.0);
            let label = if tips.side == HandSide::Left { "L" } else { "R" };
            self.draw_text(label, (ix as usize).saturating_sub(3), (iy as usize) + DOT_R + 4, 2, DIM_TEXT);
        }

        // ── lyric at the playing fingertip ───────────────────────────────
        if let Some((text, tip)) = view.lyric {
            let (x, y) = to_window(tip, view.frame);
            self.fill_circle(x, y, LYRIC_R, LYRIC_FILL, 0.35);
            let w = text_width(text, 2);
            self.draw_text(text, (x as usize).saturating_sub(w / 2), (y as usize).saturating_sub(5), 2, TEXT_COLOR);
        }

        if let Some(panel) = &view.panel {
            self.draw_panel(panel);
        }

        // ── status bar ───────────────────────────────────────────────────
        self.fill_rect(0, STATUS_Y, WIN_W, STATUS_H, STATUS_BG);
        let mode = match view.mode {
            PlaybackMode::Idle  => "IDLE",
            PlaybackMode::Timed => "PLAY",
            PlaybackMode::Step  => "STEP",
        };
        self.draw_text(mode, 10, STATUS_Y + 6, 2, OWNER_RING);
        self.draw_text(view.status, 60, STATUS_Y + 6, 2, TEXT_COLOR);
        self.draw_text(
            "mouse=right hand  arrows=left hand  J/K or click=pinch  P=play  O=stop  C=catalog  Q=quit",
            10, WIN_H - 10, 1, DIM_TEXT,
        );

        self.window.update_with_buffer(&self.buf, WIN_W, WIN_H).ok();
    }

    // ── catalog panel ────────────────────────────────────────────────────

    fn draw_panel(&mut self, panel: &PanelView) {
        self.fill_rect(PANEL_X, 0, PANEL_W, STATUS_Y, PANEL_BG);
        let title = if panel.fully_loaded {
            format!("CATALOG  {} items", panel.items.len())
        } else {
            "CATALOG  loading...".to_string()
        };
        self.draw_text(&title, PANEL_X + 10, 10, 2, TEXT_COLOR);
        self.draw_text(&format!("search: {}_", panel.filter), PANEL_X + 10, 32, 2, DIM_TEXT);

        let first = panel.selected.saturating_sub(PANEL_ROWS.saturating_sub(1));
        for (row, (i, item)) in panel.items.iter().enumerate().skip(first).take(PANEL_ROWS).enumerate() {
            let y = 56 + row * ROW_H;
            if i == panel.selected {
                self.fill_rect(PANEL_X, y - 2, PANEL_W, ROW_H, SELECT_BG);
            }
            let line = format!("{}  / {}", item.title, item.composer_or_unknown());
            self.draw_text(&line, PANEL_X + 10, y, 2, if i == panel.selected { TEXT_COLOR } else { DIM_TEXT });
        }
    }

    // ── primitive drawing helpers ────────────────────────────────────────

    fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize, color: u32) {
        for row in y..(y+h).min(WIN_H) {
            for col in x..(x+w).min(WIN_W) {
                self.buf[row * WIN_W + col] = color;
            }
        }
    }

    /// `alpha` of 1.0 paints over; lower values blend with what is there.
    fn fill_circle(&mut self, cx: f32, cy: f32, r: usize, color: u32, alpha: f32) {
        let r = r as isize;
        let (cx, cy) = (cx.round() as isize, cy.round() as isize);
        for dy in -r..=r {
            for dx in -r..=r {
                if dx*dx + dy*dy > r*r { continue; }
                let (x, y) = (cx + dx, cy + dy);
                if x < 0 || y < 0 || x as usize >= WIN_W || y as usize >= WIN_H { continue; }
                let idx = y as usize * WIN_W + x as usize;
                self.buf[idx] = blend(self.buf[idx], color, alpha);
            }
        }
    }

    fn draw_text(&mut self, text: &str, x: usize, y: usize, scale: usize, color: u32) {
        let mut cx = x;
        for ch in text.chars() {
            if cx + 3 * scale > WIN_W { break; }
            for (row, &bits) in glyph(ch).iter().enumerate() {
                for col in 0..3usize {
                    if bits & (1 << (2 - col)) == 0 { continue; }
                    for py in 0..scale {
                        for px in 0..scale {
                            let (gx, gy) = (cx + col*scale + px, y + row*scale + py);
                            if gx < WIN_W && gy < WIN_H {
                                self.buf[gy * WIN_W + gx] = color;
                            }
                        }
                    }
                }
            }
            cx += 4 * scale;
        }
    }
}

fn text_width(text: &str, scale: usize) -> usize {
    text.chars().count() * 4 * scale
}

// ────────────────────────────────────────────────────────────────────────────
// Minimal 3×5 bitmap font
// ────────────────────────────────────────────────────────────────────────────

fn glyph(c: char) -> [u8; 5] {
    match c.to_ascii_uppercase() {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        'A' => [0b111, 0b101, 0b111, 0b101, 0b101],
        'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'C' => [0b111, 0b100, 0b100, 0b100, 0b111],
        'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'E' => [0b111, 0b100, 0b111, 0b100, 0b111],
        'F' => [0b111, 0b100, 0b111, 0b100, 0b100],
        'G' => [0b111, 0b100, 0b101, 0b101, 0b111],
        'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'J' => [0b001, 0b001, 0b001, 0b101, 0b111],
        'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'M' => [0b101, 0b111, 0b101, 0b101, 0b101],
        'N' => [0b111, 0b101, 0b101, 0b101, 0b101],
        'O' => [0b111, 0b101, 0b101, 0b101, 0b111],
        'P' => [0b111, 0b101, 0b111, 0b100, 0b100],
        'Q' => [0b111, 0b101, 0b101, 0b111, 0b001],
        'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        'S' => [0b111, 0b100, 0b111, 0b001, 0b111],
        'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'V' => [0b101, 0b101, 0b101, 0b010, 0b010],
        'W' => [0b101, 0b101, 0b101, 0b111, 0b101],
        'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'Y' => [0b101, 0b101, 0b111, 0b010, 0b010],
        'Z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        '/' => [0b001, 0b001, 0b010, 0b100, 0b100],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '_' => [0b000, 0b000, 0b000, 0b000, 0b111],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        ',' => [0b000, 0b000, 0b000, 0b010, 0b100],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        '=' => [0b000, 0b111, 0b000, 0b111, 0b000],
        '+' => [0b000, 0b010, 0b111, 0b010, 0b000],
        '(' => [0b001, 0b010, 0b010, 0b010, 0b001],
        ')' => [0b100, 0b010, 0b010, 0b010, 0b100],
        '!' => [0b010, 0b010, 0b010, 0b000, 0b010],
        '?' => [0b111, 0b001, 0b011, 0b000, 0b010],
        '\'' | '"' => [0b010, 0b010, 0b000, 0b000, 0b000],
        '>' => [0b100, 0b010, 0b001, 0b010, 0b100],
        ' ' => [0b000, 0b000, 0b000, 0b000, 0b000],
        _   => [0b000, 0b000, 0b010, 0b000, 0b000], // fallback dot
    }
}

/// Alpha-blend two ARGB colors. `t` = 0.0 → all `a`, `t` = 1.0 → all `b`.
fn blend(a: u32, b: u32, t: f32) -> u32 {
    let t = t.clamp(0.0, 1.0);
    let lerp = |ca: u32, cb: u32| (ca as f32 * (1.0-t) + cb as f32 * t).round() as u32;
    let ch = |c: u32, shift: u32| (c >> shift) & 0xFF;
    0xFF000000
        | (lerp(ch(a, 16), ch(b, 16)) << 16)
        | (lerp(ch(a, 8),  ch(b, 8))  << 8)
        |  lerp(ch(a, 0),  ch(b, 0))
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_points_are_mirrored_and_scaled() {
        let frame = FrameSize::new(1280.0, 720.0);
        let (x, y) = to_window(Landmark::new(0.0, 0.0, 0.0), frame);
        assert_eq!((x, y), (WIN_W as f32, 0.0));
        let (x, y) = to_window(Landmark::new(1280.0, 720.0, 0.0), frame);
        assert!(x.abs() < 1e-3);
        assert!((y - WIN_H as f32).abs() < 1e-3);
        let (x, _) = to_window(Landmark::new(320.0, 0.0, 0.0), frame);
        assert!((x - 0.75 * WIN_W as f32).abs() < 1e-3);
    }

    #[test]
    fn blend_endpoints() {
        assert_eq!(blend(0xFF000000, 0xFFFFFFFF, 0.0), 0xFF000000);
        assert_eq!(blend(0xFF000000, 0xFFFFFFFF, 1.0), 0xFFFFFFFF);
        assert_eq!(blend(0xFF000000, 0xFFFFFFFF, 0.5), 0xFF808080);
    }

    #[test]
    fn lowercase_shares_uppercase_glyphs() {
        assert_eq!(glyph('q'), glyph('Q'));
        assert_ne!(glyph('q'), glyph('\u{4e00}'));
    }
}
