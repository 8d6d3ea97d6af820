//! Per-frame text layout and hit-testing
//!
//! The renderer records every selectable text line it draws, in terminal
//! cells, so mouse gestures from the next event can be mapped back to text and
//! to the panel that owns it. Canvas units are terminal cells.

use ratatui::layout::Rect;
use tangent_core::{
    ChatMessage, ChatRole, ConnectorStyle, Note, PanelId, PanelResolver, Point, RawSelection,
    Rect as ScreenRect,
};

pub const PANEL_WIDTH: u16 = 44;
pub const PANEL_HEIGHT: u16 = 16;
/// Conversation rows between the title border and the input separator
pub const BODY_ROWS: usize = (PANEL_HEIGHT - 4) as usize;
pub const TEXT_WIDTH: usize = (PANEL_WIDTH - 2) as usize;
pub const SIDEBAR_WIDTH: u16 = 36;

/// Terminal cell as (column, row)
pub type Cell = (u16, u16);

pub fn panel_size() -> Point {
    Point::new(PANEL_WIDTH as f32, PANEL_HEIGHT as f32)
}

pub fn cell_point((col, row): Cell) -> Point {
    Point::new(col as f32, row as f32)
}

/// Connector metrics scaled to terminal cells
pub fn connector_style() -> ConnectorStyle {
    ConnectorStyle {
        anchor_offset: Point::new(PANEL_WIDTH as f32 / 2.0, PANEL_HEIGHT as f32 / 2.0),
        dash_length: 1.0,
        gap_length: 1.0,
        dot_radius: 0.5,
        arrow_length: 2.0,
        arrow_half_width: 1.0,
        arrow_backoff: PANEL_HEIGHT as f32 / 2.0 + 1.0,
        tick_spacing: 6.0,
        tick_length: 1.0,
    }
}

/// Wrap text to fit within a given width, returning multiple lines
/// Uses word boundaries for wrapping (doesn't break mid-word)
pub fn wrap_text_to_width(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current_line = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if current_len == 0 {
            current_line = word.to_string();
            current_len = word_len;
        } else if current_len + 1 + word_len <= width {
            current_line.push(' ');
            current_line.push_str(word);
            current_len += 1 + word_len;
        } else {
            lines.push(current_line);
            current_line = word.to_string();
            current_len = word_len;
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Speaker(ChatRole),
    Body(ChatRole),
    Stamp,
    Hint,
    Blank,
}

impl LineKind {
    pub fn is_selectable(self) -> bool {
        matches!(self, LineKind::Body(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BodyLine {
    pub text: String,
    pub kind: LineKind,
    /// Soft-wrapped continuation of the line above
    pub joins_previous: bool,
}

impl BodyLine {
    fn new(text: impl Into<String>, kind: LineKind) -> Self {
        Self {
            text: text.into(),
            kind,
            joins_previous: false,
        }
    }
}

fn push_wrapped(out: &mut Vec<BodyLine>, content: &str, kind: LineKind, width: usize) {
    for paragraph in content.split('\n') {
        for (i, text) in wrap_text_to_width(paragraph, width).into_iter().enumerate() {
            out.push(BodyLine {
                text,
                kind,
                joins_previous: i > 0,
            });
        }
    }
}

/// A panel's conversation as display lines
pub fn conversation_lines(messages: &[ChatMessage], model_name: &str, width: usize) -> Vec<BodyLine> {
    if messages.is_empty() {
        return vec![BodyLine::new(format!("Ask {model_name} anything..."), LineKind::Hint)];
    }

    let mut lines = Vec::new();
    for (i, message) in messages.iter().enumerate() {
        if i > 0 {
            lines.push(BodyLine::new("", LineKind::Blank));
        }
        let speaker = match message.role {
            ChatRole::User => "You",
            ChatRole::Assistant => model_name,
            ChatRole::System => "System",
        };
        lines.push(BodyLine::new(speaker, LineKind::Speaker(message.role)));
        push_wrapped(&mut lines, &message.content, LineKind::Body(message.role), width);
    }
    lines
}

/// Notes as display lines, each tagged with its note index
pub fn notebook_lines(notes: &[Note], width: usize) -> Vec<(usize, BodyLine)> {
    let mut lines = Vec::new();
    for (index, note) in notes.iter().enumerate() {
        let stamp = note.created_at().format("%H:%M:%S").to_string();
        lines.push((index, BodyLine::new(stamp, LineKind::Stamp)));
        let mut body = Vec::new();
        push_wrapped(&mut body, note.content(), LineKind::Body(ChatRole::User), width);
        lines.extend(body.into_iter().map(|line| (index, line)));
        lines.push((index, BodyLine::new("", LineKind::Blank)));
    }
    lines
}

/// Index range of the lines shown in a window of `rows`, scrolled
/// `scroll_back` lines up from the bottom
pub fn visible_window(total: usize, rows: usize, scroll_back: usize) -> std::ops::Range<usize> {
    let end = total - scroll_back.min(total.saturating_sub(rows));
    end.saturating_sub(rows)..end
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionKey {
    Panel(PanelId),
    Notes,
}

/// A drawn text line in screen cells. Coordinates may lie off screen.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub x: i32,
    pub y: i32,
    pub text: String,
    pub joins_previous: bool,
}

/// A rectangular area of the last frame holding selectable text
#[derive(Debug, Clone)]
pub struct Region {
    pub key: RegionKey,
    pub left: i32,
    pub top: i32,
    pub width: u16,
    pub height: u16,
    pub lines: Vec<TextLine>,
}

/// Selected part of one line: line index and char range
struct Span {
    line: usize,
    from: usize,
    to: usize,
}

impl Region {
    pub fn contains(&self, (col, row): Cell) -> bool {
        let (x, y) = (col as i32, row as i32);
        x >= self.left
            && x < self.left + self.width as i32
            && y >= self.top
            && y < self.top + self.height as i32
    }

    pub fn owner(&self) -> Option<PanelId> {
        match self.key {
            RegionKey::Panel(id) => Some(id),
            RegionKey::Notes => None,
        }
    }

    fn spans(&self, start: Cell, end: Cell) -> Vec<Span> {
        if start == end {
            return Vec::new();
        }
        let (first, last) = if (start.1, start.0) <= (end.1, end.0) {
            (start, end)
        } else {
            (end, start)
        };
        let (top, bottom) = (first.1 as i32, last.1 as i32);

        self.lines
            .iter()
            .enumerate()
            .filter(|(_, line)| line.y >= top && line.y <= bottom)
            .filter_map(|(index, line)| {
                let len = line.text.chars().count() as i32;
                let from = if line.y == top { (first.0 as i32 - line.x).clamp(0, len) } else { 0 };
                let to = if line.y == bottom { (last.0 as i32 - line.x + 1).clamp(0, len) } else { len };
                (from < to).then(|| Span {
                    line: index,
                    from: from as usize,
                    to: to as usize,
                })
            })
            .collect()
    }

    /// Screen cells covered by a drag from `start` to `end`, as
    /// (row, first column, end column exclusive)
    pub fn selected_cells(&self, start: Cell, end: Cell) -> Vec<(i32, i32, i32)> {
        self.spans(start, end)
            .into_iter()
            .map(|span| {
                let line = &self.lines[span.line];
                (line.y, line.x + span.from as i32, line.x + span.to as i32)
            })
            .collect()
    }

    /// Text and bounding box of a drag from `start` to `end`
    pub fn extract(&self, start: Cell, end: Cell) -> RawSelection<Cell> {
        let mut text = String::new();
        let mut bounds: Option<ScreenRect> = None;
        let mut previous: Option<usize> = None;

        for span in self.spans(start, end) {
            let line = &self.lines[span.line];
            if previous.is_some() {
                let continues = line.joins_previous && previous == Some(span.line.wrapping_sub(1));
                text.push(if continues { ' ' } else { '\n' });
            }
            text.extend(line.text.chars().skip(span.from).take(span.to - span.from));
            previous = Some(span.line);

            let rect = ScreenRect::new(
                (line.x + span.from as i32) as f32,
                line.y as f32,
                (span.to - span.from) as f32,
                1.0,
            );
            bounds = Some(bounds.map_or(rect, |b| b.union(&rect)));
        }

        RawSelection {
            text,
            ranges: bounds.into_iter().collect(),
            anchor: start,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolbarAction {
    CopyToNotes,
    /// Branch with the catalog model at this index
    Branch(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolbarButton {
    pub area: Rect,
    pub action: ToolbarAction,
}

/// Everything the last frame drew that input handling needs to hit-test
#[derive(Debug, Clone, Default)]
pub struct FrameLayout {
    pub canvas_area: Rect,
    pub sidebar_area: Option<Rect>,
    /// Bottom first, matching paint order
    pub regions: Vec<Region>,
    pub toolbar: Vec<ToolbarButton>,
}

impl FrameLayout {
    pub fn new(canvas_area: Rect, sidebar_area: Option<Rect>) -> Self {
        Self {
            canvas_area,
            sidebar_area,
            ..Self::default()
        }
    }

    /// Topmost region under the cell
    pub fn region_at(&self, cell: Cell) -> Option<&Region> {
        self.regions.iter().rev().find(|r| r.contains(cell))
    }

    pub fn region(&self, key: RegionKey) -> Option<&Region> {
        self.regions.iter().find(|r| r.key == key)
    }

    pub fn button_at(&self, (col, row): Cell) -> Option<ToolbarAction> {
        self.toolbar
            .iter()
            .find(|b| point_in_rect(col, row, b.area))
            .map(|b| b.action)
    }

    pub fn in_sidebar(&self, (col, row): Cell) -> bool {
        self.sidebar_area.is_some_and(|area| point_in_rect(col, row, area))
    }
}

/// The owner of a selection is the panel whose region holds its start cell
impl PanelResolver<Cell> for FrameLayout {
    fn owning_panel(&self, anchor: &Cell) -> Option<PanelId> {
        self.region_at(*anchor).and_then(Region::owner)
    }
}

pub fn point_in_rect(col: u16, row: u16, rect: Rect) -> bool {
    col >= rect.x && col < rect.x + rect.width && row >= rect.y && row < rect.y + rect.height
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(lines: &[(&str, bool)]) -> Region {
        Region {
            key: RegionKey::Panel(PanelId::new()),
            left: 10,
            top: 5,
            width: 20,
            height: 10,
            lines: lines
                .iter()
                .enumerate()
                .map(|(i, (text, joins))| TextLine {
                    x: 11,
                    y: 6 + i as i32,
                    text: text.to_string(),
                    joins_previous: *joins,
                })
                .collect(),
        }
    }

    #[test]
    fn test_wrap_text_to_width() {
        assert_eq!(
            wrap_text_to_width("the quick brown fox jumps", 10),
            vec!["the quick", "brown fox", "jumps"]
        );
        assert_eq!(wrap_text_to_width("", 10), vec![String::new()]);
    }

    #[test]
    fn test_conversation_lines_mark_continuations() {
        let messages = vec![
            ChatMessage::user("hello there"),
            ChatMessage::assistant("one two three four\nnext"),
        ];
        let lines = conversation_lines(&messages, "Claude", 10);
        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["You", "hello", "there", "", "Claude", "one two", "three four", "next"]
        );
        assert!(lines[2].joins_previous);
        assert!(lines[6].joins_previous);
        assert!(!lines[7].joins_previous);
        assert_eq!(lines[5].kind, LineKind::Body(ChatRole::Assistant));
    }

    #[test]
    fn test_empty_conversation_shows_hint() {
        let lines = conversation_lines(&[], "Gemini", 40);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].kind, LineKind::Hint);
    }

    #[test]
    fn test_visible_window() {
        assert_eq!(visible_window(5, 12, 0), 0..5);
        assert_eq!(visible_window(30, 12, 0), 18..30);
        assert_eq!(visible_window(30, 12, 4), 14..26);
        // Scrolling stops at the top
        assert_eq!(visible_window(30, 12, 100), 0..12);
    }

    #[test]
    fn test_extract_joins_soft_wraps_with_spaces() {
        let region = region(&[("alpha beta", false), ("gamma", true), ("delta", false)]);
        // From "beta" to the end of "delta"
        let raw = region.extract((17, 6), (15, 8));
        assert_eq!(raw.text, "beta gamma\ndelta");
        assert_eq!(raw.ranges, vec![ScreenRect::new(11.0, 6.0, 10.0, 3.0)]);
        assert_eq!(raw.anchor, (17, 6));
    }

    #[test]
    fn test_extract_backwards_drag() {
        let region = region(&[("alpha beta", false)]);
        let raw = region.extract((15, 6), (11, 6));
        assert_eq!(raw.text, "alpha");
    }

    #[test]
    fn test_click_without_drag_is_empty() {
        let region = region(&[("alpha", false)]);
        let raw = region.extract((12, 6), (12, 6));
        assert!(raw.text.is_empty());
        assert!(raw.ranges.is_empty());
    }

    #[test]
    fn test_resolver_uses_topmost_region() {
        let bottom = region(&[]);
        let mut top = region(&[]);
        let top_id = PanelId::new();
        top.key = RegionKey::Panel(top_id);
        top.left = 20;

        let mut notes = region(&[]);
        notes.key = RegionKey::Notes;
        notes.left = 60;

        let layout = FrameLayout {
            regions: vec![bottom.clone(), top, notes],
            ..FrameLayout::default()
        };
        assert_eq!(layout.owning_panel(&(25, 6)), Some(top_id));
        assert_eq!(layout.owning_panel(&(12, 6)), bottom.owner());
        assert_eq!(layout.owning_panel(&(65, 6)), None);
        assert_eq!(layout.owning_panel(&(0, 0)), None);
    }
}
