use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        canvas::{Canvas as Plot, Circle, Line as PlotLine},
        Block, Borders, Clear, List, ListItem, Paragraph, Widget, Wrap,
    },
    Frame,
};
use tangent_core::{panel::PLACEHOLDER, ChatRole, Panel, Point, Primitive, Provider, Selection, Stroke};

use crate::app::{App, InputMode, KeyDialog};
use crate::layout::{
    connector_style, conversation_lines, notebook_lines, visible_window, FrameLayout, LineKind, Region,
    RegionKey, TextLine, ToolbarAction, ToolbarButton, BODY_ROWS, PANEL_HEIGHT, PANEL_WIDTH,
    SIDEBAR_WIDTH, TEXT_WIDTH,
};

const GRID_COLS: i32 = 8;
const GRID_ROWS: i32 = 4;

pub fn render(app: &mut App, frame: &mut Frame) {
    let full = frame.area();
    let [main, footer] = Layout::vertical([Constraint::Min(0), Constraint::Length(1)]).areas(full);
    let (canvas_area, sidebar_area) = if app.show_notes {
        let [canvas, sidebar] =
            Layout::horizontal([Constraint::Min(0), Constraint::Length(SIDEBAR_WIDTH)]).areas(main);
        (canvas, Some(sidebar))
    } else {
        (main, None)
    };
    let mut layout = FrameLayout::new(canvas_area, sidebar_area);

    render_grid(app, frame, canvas_area);
    render_connectors(app, frame, canvas_area);
    for panel in app.canvas.panels.iter() {
        render_panel(app, panel, frame, canvas_area, &mut layout);
    }
    if let Some(area) = sidebar_area {
        render_notes(app, frame, area, &mut layout);
    }
    render_highlight(app, frame, &layout);
    if let Some(selection) = app.canvas.selection.current() {
        render_toolbar(app, selection, frame, canvas_area, &mut layout);
    }
    render_footer(app, frame, footer);

    if app.show_help {
        render_help(frame, canvas_area);
    }
    if let Some(dialog) = &app.key_dialog {
        render_key_dialog(app, dialog, frame, full);
    }

    app.layout = layout;
}

/// Dotted background that moves with the pan so panning is visible on an empty canvas
fn render_grid(app: &App, frame: &mut Frame, area: Rect) {
    let offset = app.canvas.viewport.offset;
    let (ox, oy) = (offset.x.round() as i32, offset.y.round() as i32);
    let style = Style::default().fg(Color::DarkGray);
    let buf = frame.buffer_mut();
    for y in area.top()..area.bottom() {
        if (y as i32 - oy).rem_euclid(GRID_ROWS) != 0 {
            continue;
        }
        for x in area.left()..area.right() {
            if (x as i32 - ox).rem_euclid(GRID_COLS) == 0 {
                if let Some(cell) = buf.cell_mut((x, y)) {
                    cell.set_symbol("·").set_style(style);
                }
            }
        }
    }
}

fn stroke_color(stroke: Stroke) -> Color {
    match stroke {
        Stroke::Dash => Color::DarkGray,
        Stroke::Tick => Color::Gray,
        Stroke::Arrow => Color::Cyan,
    }
}

fn render_connectors(app: &App, frame: &mut Frame, area: Rect) {
    let connectors = app.canvas.connectors(&connector_style());
    if connectors.is_empty() {
        return;
    }
    let viewport = app.canvas.viewport;
    let height = area.height as f64;
    // Cell centers, with y flipped for the plot's upward axis
    let plot = |p: Point| {
        let screen = viewport.to_screen(p);
        (
            (screen.x - area.x as f32) as f64 + 0.5,
            height - (screen.y - area.y as f32) as f64 - 0.5,
        )
    };

    let widget = Plot::default()
        .marker(Marker::Braille)
        .x_bounds([0.0, area.width as f64])
        .y_bounds([0.0, height])
        .paint(|ctx| {
            for connector in &connectors {
                for primitive in connector.primitives() {
                    match primitive {
                        Primitive::Segment { from, to, stroke } => {
                            let (x1, y1) = plot(from);
                            let (x2, y2) = plot(to);
                            ctx.draw(&PlotLine::new(x1, y1, x2, y2, stroke_color(stroke)));
                        }
                        Primitive::Dot { center, radius } => {
                            let (x, y) = plot(center);
                            ctx.draw(&Circle {
                                x,
                                y,
                                radius: radius as f64,
                                color: Color::Cyan,
                            });
                        }
                    }
                }
            }
        });
    frame.render_widget(widget, area);
}

fn line_style(kind: LineKind) -> Style {
    match kind {
        LineKind::Speaker(ChatRole::User) => Style::default().fg(Color::Green).bold(),
        LineKind::Speaker(_) => Style::default().fg(Color::Cyan).bold(),
        LineKind::Body(ChatRole::User) => Style::default().fg(Color::White),
        LineKind::Body(_) => Style::default(),
        LineKind::Stamp | LineKind::Hint | LineKind::Blank => Style::default().fg(Color::DarkGray),
    }
}

/// Copy `src` onto `dst` with its top-left at `origin`, dropping cells outside `clip`
fn blit(src: &Buffer, origin: (i32, i32), clip: Rect, dst: &mut Buffer) {
    for y in 0..src.area.height {
        for x in 0..src.area.width {
            let (sx, sy) = (origin.0 + x as i32, origin.1 + y as i32);
            if sx < clip.left() as i32 || sy < clip.top() as i32 || sx >= clip.right() as i32 || sy >= clip.bottom() as i32 {
                continue;
            }
            if let (Some(cell), Some(target)) = (src.cell((x, y)), dst.cell_mut((sx as u16, sy as u16))) {
                *target = cell.clone();
            }
        }
    }
}

/// Panels are drawn into their own buffer and clipped onto the frame, so a
/// panel partly past the edge of the canvas still renders the visible part.
fn render_panel(app: &App, panel: &Panel, frame: &mut Frame, area: Rect, layout: &mut FrameLayout) {
    let screen = app.canvas.viewport.to_screen(panel.position);
    let (left, top) = (screen.x.round() as i32, screen.y.round() as i32);
    let visible = left < area.right() as i32
        && top < area.bottom() as i32
        && left + PANEL_WIDTH as i32 > area.left() as i32
        && top + PANEL_HEIGHT as i32 > area.top() as i32;
    if !visible {
        return;
    }

    let focused = app.focused == Some(panel.id());
    let border = if focused { Color::Cyan } else { Color::DarkGray };
    let local = Rect::new(0, 0, PANEL_WIDTH, PANEL_HEIGHT);
    let mut buf = Buffer::empty(local);

    let mut title = vec![Span::styled(
        format!(" {} ", panel.model_name()),
        Style::default().fg(border).add_modifier(Modifier::BOLD),
    )];
    if panel.is_waiting() {
        title.push(Span::styled(format!("{} ", app.spinner()), Style::default().fg(Color::Yellow)));
    }
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(Line::from(title))
        .render(local, &mut buf);

    let lines = conversation_lines(panel.messages(), panel.model_name(), TEXT_WIDTH);
    let scroll = app.scroll_back.get(&panel.id()).copied().unwrap_or(0);
    let window = visible_window(lines.len(), BODY_ROWS, scroll);
    if window.start > 0 {
        buf.set_string(PANEL_WIDTH - 3, 0, "↑", Style::default().fg(Color::DarkGray));
    }

    let mut text_lines = Vec::new();
    for (row, line) in lines[window].iter().enumerate() {
        let y = 1 + row as u16;
        let style = if panel.is_waiting() && line.text == PLACEHOLDER {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC)
        } else {
            line_style(line.kind)
        };
        buf.set_stringn(1, y, &line.text, TEXT_WIDTH, style);
        if line.kind.is_selectable() {
            text_lines.push(TextLine {
                x: left + 1,
                y: top + y as i32,
                text: line.text.clone(),
                joins_previous: line.joins_previous,
            });
        }
    }

    buf.set_string(1, PANEL_HEIGHT - 3, "─".repeat(TEXT_WIDTH), Style::default().fg(border));

    let editing = focused && app.input_mode == InputMode::Editing;
    let input = &panel.pending_input;
    let room = TEXT_WIDTH - 2;
    let cursor = if editing { app.input_cursor } else { input.chars().count() };
    let skip = cursor.saturating_sub(room.saturating_sub(1));
    let input_row = PANEL_HEIGHT - 2;
    if input.is_empty() && !editing {
        buf.set_string(1, input_row, "> Type a message...", Style::default().fg(Color::DarkGray));
    } else {
        let shown: String = input.chars().skip(skip).take(room).collect();
        let style = if editing { Style::default().fg(Color::Yellow) } else { Style::default() };
        buf.set_string(1, input_row, "> ", style);
        buf.set_string(3, input_row, shown, style);
    }

    blit(&buf, (left, top), area, frame.buffer_mut());

    if editing {
        let (cx, cy) = (left + 3 + (cursor - skip) as i32, top + input_row as i32);
        let inside = cx >= area.left() as i32 && cx < area.right() as i32 && cy >= area.top() as i32 && cy < area.bottom() as i32;
        if inside {
            frame.set_cursor_position((cx as u16, cy as u16));
        }
    }

    layout.regions.push(Region {
        key: RegionKey::Panel(panel.id()),
        left,
        top,
        width: PANEL_WIDTH,
        height: PANEL_HEIGHT,
        lines: text_lines,
    });
}

fn render_notes(app: &App, frame: &mut Frame, area: Rect, layout: &mut FrameLayout) {
    let editing = app.input_mode == InputMode::NoteEditing;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if editing { Color::Cyan } else { Color::DarkGray }))
        .title(format!(" Notes ({}) ", app.canvas.notes.len()));
    let inner = block.inner(area);
    frame.render_widget(Clear, area);
    frame.render_widget(block, area);
    if inner.height < 3 {
        return;
    }

    let input_area = Rect::new(inner.x, inner.y, inner.width, 1);
    if editing {
        let room = inner.width.saturating_sub(3) as usize;
        let skip = app.note_cursor.saturating_sub(room.saturating_sub(1));
        let shown: String = app.note_input.chars().skip(skip).take(room).collect();
        frame.render_widget(
            Paragraph::new(format!("+ {shown}")).style(Style::default().fg(Color::Yellow)),
            input_area,
        );
        frame.set_cursor_position((inner.x + 2 + (app.note_cursor - skip) as u16, inner.y));
    } else {
        frame.render_widget(
            Paragraph::new("a add · [ ] pick · D delete").style(Style::default().fg(Color::DarkGray)),
            input_area,
        );
    }

    let list_top = inner.y + 2;
    let rows = (inner.bottom() - list_top) as usize;
    let notes = app.canvas.notes.notes();
    if notes.is_empty() {
        frame.render_widget(
            Paragraph::new("No notes yet. Select text and press c to keep it here.")
                .style(Style::default().fg(Color::DarkGray))
                .wrap(Wrap { trim: true }),
            Rect::new(inner.x, list_top, inner.width, rows as u16),
        );
        return;
    }

    let lines = notebook_lines(notes, inner.width.saturating_sub(2) as usize);
    let selected = app.notes_state.selected();
    // Keep the selected note's timestamp on screen
    let selected_start = selected
        .and_then(|s| lines.iter().position(|(i, _)| *i == s))
        .unwrap_or(0);
    let start = selected_start.saturating_sub(rows.saturating_sub(3));

    let buf = frame.buffer_mut();
    let mut text_lines = Vec::new();
    for (row, (index, line)) in lines.iter().skip(start).take(rows).enumerate() {
        let y = list_top + row as u16;
        if line.kind == LineKind::Stamp && selected == Some(*index) {
            buf.set_string(inner.x, y, "▶", Style::default().fg(Color::Cyan));
        }
        let room = (inner.width as usize).saturating_sub(2);
        buf.set_stringn(inner.x + 2, y, &line.text, room, line_style(line.kind));
        if line.kind.is_selectable() {
            text_lines.push(TextLine {
                x: (inner.x + 2) as i32,
                y: y as i32,
                text: line.text.clone(),
                joins_previous: line.joins_previous,
            });
        }
    }

    layout.regions.push(Region {
        key: RegionKey::Notes,
        left: area.x as i32,
        top: area.y as i32,
        width: area.width,
        height: area.height,
        lines: text_lines,
    });
}

fn render_highlight(app: &App, frame: &mut Frame, layout: &FrameLayout) {
    let Some(drag) = app.highlight else {
        return;
    };
    let Some(region) = layout.region(drag.region) else {
        return;
    };
    let clip = match drag.region {
        RegionKey::Notes => layout.sidebar_area.unwrap_or_default(),
        RegionKey::Panel(_) => layout.canvas_area,
    };
    let buf = frame.buffer_mut();
    for (y, from, to) in region.selected_cells(drag.start, drag.end) {
        for x in from..to {
            let inside = x >= clip.left() as i32 && x < clip.right() as i32 && y >= clip.top() as i32 && y < clip.bottom() as i32;
            if !inside {
                continue;
            }
            if let Some(cell) = buf.cell_mut((x as u16, y as u16)) {
                cell.set_style(Style::default().add_modifier(Modifier::REVERSED));
            }
        }
    }
}

/// Actions for the live selection, just above it (or below when there is no room)
fn render_toolbar(app: &App, selection: &Selection, frame: &mut Frame, area: Rect, layout: &mut FrameLayout) {
    let mut buttons = vec![(" + Notes ".to_string(), ToolbarAction::CopyToNotes)];
    for (i, entry) in app.catalog.entries().iter().enumerate().take(9) {
        buttons.push((format!(" {} {} ", i + 1, entry.name), ToolbarAction::Branch(i)));
    }
    let width: u16 = buttons.iter().map(|(label, _)| label.chars().count() as u16 + 1).sum();
    let width = width.min(area.width);

    let rect = selection.anchor_rect;
    let above = rect.top as i32 - 2;
    let y = if above >= area.top() as i32 { above } else { rect.bottom() as i32 + 1 };
    let y = y.clamp(area.top() as i32, area.bottom().saturating_sub(1) as i32) as u16;
    let max_x = area.right().saturating_sub(width) as i32;
    let x = (rect.left as i32).clamp(area.left() as i32, max_x.max(area.left() as i32)) as u16;

    let bar = Rect::new(x, y, width, 1);
    frame.render_widget(Clear, bar);

    let buf = frame.buffer_mut();
    let mut cursor = x;
    for (label, action) in buttons {
        let len = label.chars().count() as u16;
        if cursor + len > bar.right() {
            break;
        }
        let style = match action {
            ToolbarAction::CopyToNotes => Style::default().bg(Color::Green).fg(Color::Black),
            ToolbarAction::Branch(_) => Style::default().bg(Color::DarkGray).fg(Color::White),
        };
        buf.set_string(cursor, y, &label, style);
        layout.toolbar.push(ToolbarButton {
            area: Rect::new(cursor, y, len, 1),
            action,
        });
        cursor += len + 1;
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let selecting = app.canvas.selection.current().is_some();
    let (mode_text, mode_style) = match app.input_mode {
        InputMode::Editing => (" INSERT ", Style::default().bg(Color::Yellow).fg(Color::Black)),
        InputMode::NoteEditing => (" NOTE ", Style::default().bg(Color::Yellow).fg(Color::Black)),
        InputMode::Normal if selecting => (" SELECTION ", Style::default().bg(Color::Green).fg(Color::Black)),
        InputMode::Normal => (" CANVAS ", Style::default().bg(Color::Blue).fg(Color::White)),
    };

    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);
    let hint = |key: &'static str, label: &'static str| {
        [Span::styled(format!(" {key} "), key_style), Span::styled(format!(" {label} "), label_style)]
    };

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::raw(" ")];
    let hints: Vec<[Span; 2]> = match app.input_mode {
        InputMode::Editing => vec![hint("Enter", "send"), hint("Esc", "done")],
        InputMode::NoteEditing => vec![hint("Enter", "save note"), hint("Esc", "cancel")],
        InputMode::Normal if selecting => vec![hint("1-9", "branch"), hint("c", "to notes"), hint("Esc", "clear")],
        InputMode::Normal => vec![
            hint("n", "new"),
            hint("m", "model"),
            hint("i", "type"),
            hint("Tab", "next"),
            hint("x", "close"),
            hint("N", "notes"),
            hint("K", "keys"),
            hint("?", "help"),
            hint("q", "quit"),
        ],
    };
    spans.extend(hints.into_iter().flatten());

    if app.input_mode == InputMode::Normal && !selecting {
        spans.push(Span::styled(
            format!("  new: {}", app.spawn_model_name()),
            Style::default().fg(Color::Cyan),
        ));
    }
    if let Some(status) = &app.status {
        spans.push(Span::styled(format!("  {status}"), Style::default().fg(Color::Yellow)));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(2));
    Rect::new(
        area.x + (area.width.saturating_sub(width)) / 2,
        area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    )
}

fn render_help(frame: &mut Frame, area: Rect) {
    let rows = [
        ("mouse drag", "pan (background), move (title bar), select (text)"),
        ("arrows/hjkl", "pan the canvas"),
        ("n / m", "new panel / change model for new panels"),
        ("i, Enter", "type into the focused panel, Enter sends"),
        ("Tab", "focus next panel"),
        ("x", "close the focused panel"),
        ("PgUp/PgDn", "scroll the focused panel"),
        ("1-9", "branch the selection with that model"),
        ("c", "add the selection to notes"),
        ("N / a", "toggle notes / add a note"),
        ("[ ] D", "pick / delete a note"),
        ("K", "manage API keys"),
        ("q", "quit"),
    ];
    let popup = centered(area, 72, rows.len() as u16 + 2);
    frame.render_widget(Clear, popup);

    let lines: Vec<Line> = rows
        .iter()
        .map(|(key, text)| {
            Line::from(vec![
                Span::styled(format!("{key:>12} "), Style::default().fg(Color::Yellow)),
                Span::raw(*text),
            ])
        })
        .collect();
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Keys (any key to close) ");
    frame.render_widget(Paragraph::new(lines).block(block), popup);
}

/// Show only the last four characters of a key being typed
fn mask(input: &str) -> String {
    let count = input.chars().count();
    if count <= 4 {
        return "*".repeat(count);
    }
    let tail: String = input.chars().skip(count - 4).collect();
    format!("{}...{}", "*".repeat((count - 4).min(20)), tail)
}

fn render_key_dialog(app: &App, dialog: &KeyDialog, frame: &mut Frame, area: Rect) {
    let popup = centered(area, 64, 14);
    frame.render_widget(Clear, popup);

    let (title, hint) = match dialog {
        KeyDialog::List => (" API Keys ".to_string(), "a add · d delete · j/k move · Esc close"),
        KeyDialog::PickProvider => (" Choose Provider ".to_string(), "j/k move · Enter choose · Esc back"),
        KeyDialog::EnterKey { provider } => (format!(" API Key for {} ", provider.display_name()), "Enter next · Esc back"),
        KeyDialog::EnterLabel { provider, .. } => (format!(" Label for {} key ", provider.display_name()), "Enter save · Esc back"),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(title);
    let inner = block.inner(popup);
    frame.render_widget(block, popup);
    if inner.height < 3 {
        return;
    }

    let [body, footer] = Layout::vertical([Constraint::Min(0), Constraint::Length(1)]).areas(inner);
    frame.render_widget(Paragraph::new(hint).style(Style::default().fg(Color::DarkGray)), footer);

    match dialog {
        KeyDialog::List if app.credentials.is_empty() => {
            let text = vec![
                Line::from("Welcome! tangent needs at least one provider key."),
                Line::from(""),
                Line::from("Keys are stored on this machine and sent to the relay"),
                Line::from("only with your chat requests. Press a to add one."),
            ];
            frame.render_widget(Paragraph::new(text).wrap(Wrap { trim: true }), body);
        }
        KeyDialog::List => {
            let items: Vec<ListItem> = app
                .credentials
                .iter()
                .map(|c| {
                    let label = if c.label.is_empty() { "-" } else { c.label.as_str() };
                    ListItem::new(format!("{:<10} {:<14} {}", c.provider.display_name(), label, c.masked_key()))
                })
                .collect();
            let list = List::new(items)
                .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
                .highlight_symbol("▶ ");
            let mut state = app.key_list_state.clone();
            frame.render_stateful_widget(list, body, &mut state);
        }
        KeyDialog::PickProvider => {
            let items: Vec<ListItem> = Provider::all()
                .into_iter()
                .map(|p| {
                    let models = app.catalog.models_for(p).join(", ");
                    ListItem::new(format!("{:<10} {}", p.display_name(), models))
                })
                .collect();
            let list = List::new(items)
                .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
                .highlight_symbol("▶ ");
            let mut state = app.provider_state.clone();
            if state.selected().is_none() {
                state.select(Some(0));
            }
            frame.render_stateful_widget(list, body, &mut state);
        }
        KeyDialog::EnterKey { .. } | KeyDialog::EnterLabel { .. } => {
            let secret = matches!(dialog, KeyDialog::EnterKey { .. });
            let prompt = if secret { "Paste the API key:" } else { "Optional label, e.g. work:" };
            frame.render_widget(
                Paragraph::new(prompt).style(Style::default().fg(Color::DarkGray)),
                Rect::new(body.x, body.y, body.width, 1),
            );
            let shown = if secret { mask(&app.dialog_input) } else { app.dialog_input.clone() };
            let input_area = Rect::new(body.x, body.y + 2, body.width, 1);
            frame.render_widget(Paragraph::new(shown.clone()).style(Style::default().fg(Color::Cyan)), input_area);
            let cursor_x = (shown.chars().count() as u16).min(input_area.width.saturating_sub(1));
            frame.set_cursor_position((input_area.x + cursor_x, input_area.y));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::test_app;
    use ratatui::{backend::TestBackend, Terminal};

    fn draw(app: &mut App) -> Buffer {
        let mut terminal = Terminal::new(TestBackend::new(100, 40)).unwrap();
        terminal.draw(|frame| render(app, frame)).unwrap();
        terminal.backend().buffer().clone()
    }

    fn row_text(buf: &Buffer, y: u16) -> String {
        (0..buf.area.width)
            .map(|x| buf.cell((x, y)).map(|c| c.symbol()).unwrap_or(" "))
            .collect()
    }

    #[tokio::test]
    async fn test_panel_title_and_region_recorded() {
        let (mut app, _rx) = test_app();
        app.key_dialog = None;
        let buf = draw(&mut app);

        // Welcome panel sits at (2, 1)
        assert!(row_text(&buf, 1).contains(" GPT-4 "));
        assert_eq!(app.layout.regions.len(), 1);
        let region = &app.layout.regions[0];
        assert_eq!((region.left, region.top), (2, 1));
        assert!(region.lines.iter().all(|l| l.x == 3));
        assert!(region.lines[0].text.starts_with("Welcome to tangent."));
    }

    #[tokio::test]
    async fn test_panel_clipped_at_canvas_edge() {
        let (mut app, _rx) = test_app();
        app.key_dialog = None;
        app.canvas.viewport.pan_by(Point::new(-3.0, 0.0));
        let buf = draw(&mut app);

        // Left border is off screen; the title is still drawn from column 0
        assert!(row_text(&buf, 1).starts_with(" GPT-4 "));
        assert_eq!(app.layout.regions[0].left, -1);
    }

    #[tokio::test]
    async fn test_notes_sidebar_region_has_no_owner() {
        let (mut app, _rx) = test_app();
        app.key_dialog = None;
        app.canvas.notes.add("remember this");
        app.show_notes = true;
        draw(&mut app);

        let sidebar = app.layout.sidebar_area.unwrap();
        assert_eq!(sidebar.width, SIDEBAR_WIDTH);
        let notes = app.layout.region(RegionKey::Notes).unwrap();
        assert_eq!(notes.owner(), None);
        assert_eq!(notes.lines[0].text, "remember this");
    }

    #[tokio::test]
    async fn test_notes_sidebar_on_narrow_terminal() {
        let (mut app, _rx) = test_app();
        app.key_dialog = None;
        app.canvas.notes.add("kept");
        app.show_notes = true;

        // The sidebar squeezes down to one inner column
        let mut terminal = Terminal::new(TestBackend::new(3, 20)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();
        assert!(app.layout.sidebar_area.unwrap().width <= 3);
        assert!(app.layout.regions.iter().all(|r| r.key == RegionKey::Notes));
    }

    #[tokio::test]
    async fn test_offscreen_panel_not_drawn() {
        let (mut app, _rx) = test_app();
        app.key_dialog = None;
        app.canvas.viewport.pan_by(Point::new(500.0, 0.0));
        draw(&mut app);
        assert!(app.layout.regions.is_empty());
    }

    #[test]
    fn test_mask() {
        assert_eq!(mask("abc"), "***");
        assert_eq!(mask("sk-123456"), "*****...3456");
    }
}
