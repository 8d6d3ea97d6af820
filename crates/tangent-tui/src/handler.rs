use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use tangent_core::{Point, RawSelection};

use crate::app::{App, InputMode, KeyDialog, TextDrag};
use crate::layout::{cell_point, panel_size, point_in_rect, Cell, RegionKey, ToolbarAction, BODY_ROWS, PANEL_HEIGHT};
use crate::tui::AppEvent;

const PAN_STEP_X: f32 = 4.0;
const PAN_STEP_Y: f32 = 2.0;

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick(),
        AppEvent::Reply(pending, result) => app.apply_reply(pending, result),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }
    app.status = None;

    if app.key_dialog.is_some() {
        handle_key_dialog(app, key);
        return;
    }
    if app.show_help {
        app.show_help = false;
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
        InputMode::NoteEditing => handle_note_editing(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    // A live selection claims its action keys first
    if app.canvas.selection.current().is_some() {
        match key.code {
            KeyCode::Char('c') => return app.copy_selection_to_notes(),
            KeyCode::Char(d @ '1'..='9') => {
                let index = d.to_digit(10).unwrap_or(1) as usize - 1;
                app.branch_selection(index);
                return;
            }
            KeyCode::Esc => return app.clear_selection(),
            _ => {}
        }
    }

    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('?') => app.show_help = true,

        // Panels
        KeyCode::Char('n') => {
            app.spawn_panel();
        }
        KeyCode::Char('m') => app.cycle_spawn_model(),
        KeyCode::Tab => app.focus_next(),
        KeyCode::Char('i') | KeyCode::Enter => {
            if let Some(id) = app.focused {
                app.focus(id);
                app.input_mode = InputMode::Editing;
            }
        }
        KeyCode::Char('x') | KeyCode::Delete => app.delete_focused(),
        KeyCode::PageUp | KeyCode::PageDown => {
            if let Some(id) = app.focused {
                app.scroll_panel(id, key.code == KeyCode::PageUp, BODY_ROWS / 2);
            }
        }

        // Keyboard panning moves the view, so content shifts the other way
        KeyCode::Left | KeyCode::Char('h') => app.pan_by(Point::new(PAN_STEP_X, 0.0)),
        KeyCode::Right | KeyCode::Char('l') => app.pan_by(Point::new(-PAN_STEP_X, 0.0)),
        KeyCode::Up | KeyCode::Char('k') => app.pan_by(Point::new(0.0, PAN_STEP_Y)),
        KeyCode::Down | KeyCode::Char('j') => app.pan_by(Point::new(0.0, -PAN_STEP_Y)),

        // Notes
        KeyCode::Char('N') => app.toggle_notes(),
        KeyCode::Char('a') => app.begin_note(),
        KeyCode::Char(']') if app.show_notes => app.notes_nav_down(),
        KeyCode::Char('[') if app.show_notes => app.notes_nav_up(),
        KeyCode::Char('D') if app.show_notes => app.delete_selected_note(),

        KeyCode::Char('K') => app.open_key_dialog(),
        KeyCode::Esc => app.clear_selection(),
        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.input_mode = InputMode::Normal,
        KeyCode::Enter => app.send_focused(),
        KeyCode::Backspace => app.delete_char(),
        KeyCode::Left => app.move_cursor(false),
        KeyCode::Right => app.move_cursor(true),
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => app.insert_char(c),
        _ => {}
    }
}

fn handle_note_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.note_input.clear();
            app.note_cursor = 0;
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => app.commit_note(),
        KeyCode::Backspace => app.note_delete_char(),
        KeyCode::Left => app.note_cursor = app.note_cursor.saturating_sub(1),
        KeyCode::Right => app.note_cursor = (app.note_cursor + 1).min(app.note_input.chars().count()),
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => app.note_insert_char(c),
        _ => {}
    }
}

fn handle_key_dialog(app: &mut App, key: KeyEvent) {
    let Some(dialog) = app.key_dialog.clone() else {
        return;
    };
    match dialog {
        KeyDialog::List => match key.code {
            KeyCode::Esc | KeyCode::Char('q') => app.close_key_dialog(),
            KeyCode::Char('a') => {
                app.provider_state.select(Some(0));
                app.key_dialog = Some(KeyDialog::PickProvider);
            }
            KeyCode::Char('d') | KeyCode::Delete => app.remove_selected_credential(),
            KeyCode::Char('j') | KeyCode::Down => app.key_list_nav(true),
            KeyCode::Char('k') | KeyCode::Up => app.key_list_nav(false),
            _ => {}
        },
        KeyDialog::PickProvider => match key.code {
            KeyCode::Esc => app.key_dialog = Some(KeyDialog::List),
            KeyCode::Char('j') | KeyCode::Down => app.provider_nav(true),
            KeyCode::Char('k') | KeyCode::Up => app.provider_nav(false),
            KeyCode::Enter => {
                app.dialog_input.clear();
                app.key_dialog = Some(KeyDialog::EnterKey {
                    provider: app.selected_provider(),
                });
            }
            _ => {}
        },
        KeyDialog::EnterKey { provider } => match key.code {
            KeyCode::Esc => app.key_dialog = Some(KeyDialog::List),
            KeyCode::Enter if !app.dialog_input.trim().is_empty() => {
                let key = std::mem::take(&mut app.dialog_input);
                app.key_dialog = Some(KeyDialog::EnterLabel { provider, key });
            }
            KeyCode::Backspace => {
                app.dialog_input.pop();
            }
            KeyCode::Char(c) => app.dialog_input.push(c),
            _ => {}
        },
        KeyDialog::EnterLabel { provider, key: secret } => match key.code {
            KeyCode::Esc => app.key_dialog = Some(KeyDialog::List),
            KeyCode::Enter => {
                let label = std::mem::take(&mut app.dialog_input);
                app.add_credential(provider, &secret, &label);
                app.key_dialog = Some(KeyDialog::List);
            }
            KeyCode::Backspace => {
                app.dialog_input.pop();
            }
            KeyCode::Char(c) => app.dialog_input.push(c),
            _ => {}
        },
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    if app.key_dialog.is_some() {
        return;
    }
    let cell = (mouse.column, mouse.row);

    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => on_press(app, cell),
        MouseEventKind::Drag(MouseButton::Left) => {
            if app.canvas.is_dragging() {
                app.canvas.drag_to(cell_point(cell));
            } else if let Some(drag) = app.text_drag.as_mut() {
                drag.end = cell;
                app.highlight = Some(*drag);
            }
        }
        MouseEventKind::Up(MouseButton::Left) => on_release(app, cell),
        MouseEventKind::ScrollUp | MouseEventKind::ScrollDown => {
            let owner = app.layout.region_at(cell).and_then(|r| r.owner());
            if let Some(id) = owner {
                app.scroll_panel(id, mouse.kind == MouseEventKind::ScrollUp, 2);
            }
        }
        _ => {}
    }
}

fn on_press(app: &mut App, cell: Cell) {
    if let Some(action) = app.layout.button_at(cell) {
        match action {
            ToolbarAction::CopyToNotes => app.copy_selection_to_notes(),
            ToolbarAction::Branch(index) => {
                app.branch_selection(index);
            }
        }
        return;
    }

    app.highlight = None;
    if app.layout.in_sidebar(cell) {
        if app.layout.region(RegionKey::Notes).is_some_and(|r| r.contains(cell)) {
            app.text_drag = Some(TextDrag {
                region: RegionKey::Notes,
                start: cell,
                end: cell,
            });
        }
        return;
    }
    if !point_in_rect(cell.0, cell.1, app.layout.canvas_area) {
        return;
    }

    let pointer = cell_point(cell);
    let canvas_point = app.canvas.viewport.to_canvas(pointer);
    let Some(id) = app.canvas.panels.panel_at(canvas_point, panel_size()) else {
        app.canvas.begin_pan(pointer);
        return;
    };

    app.focus(id);
    let row = app
        .canvas
        .panels
        .get(id)
        .map(|p| (canvas_point.y - p.position.y).floor() as i32)
        .unwrap_or(0);
    if row == 0 {
        app.canvas.begin_panel_drag(id, pointer);
    } else if row >= PANEL_HEIGHT as i32 - 2 {
        app.input_mode = InputMode::Editing;
    } else {
        app.input_mode = InputMode::Normal;
        app.text_drag = Some(TextDrag {
            region: RegionKey::Panel(id),
            start: cell,
            end: cell,
        });
    }
}

/// Every release reports a selection, empty unless text was dragged over
fn on_release(app: &mut App, cell: Cell) {
    if app.canvas.is_dragging() {
        app.canvas.end_drag();
    }

    let drag = app.text_drag.take().map(|d| TextDrag { end: cell, ..d });
    let raw = drag
        .and_then(|d| app.layout.region(d.region).map(|r| r.extract(d.start, d.end)))
        .unwrap_or_else(|| RawSelection {
            text: String::new(),
            ranges: Vec::new(),
            anchor: cell,
        });

    let captured = app.canvas.selection.on_pointer_release(raw, &app.layout).is_some();
    app.highlight = if captured { drag } else { None };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::test_app;
    use crate::ui;
    use crossterm::event::KeyEventState;
    use ratatui::{backend::TestBackend, Terminal};
    use tangent_core::ChatMessage;

    fn draw(app: &mut App) {
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal.draw(|frame| ui::render(app, frame)).unwrap();
    }

    fn mouse(app: &mut App, kind: MouseEventKind, (column, row): Cell) {
        handle_mouse(
            app,
            MouseEvent {
                kind,
                column,
                row,
                modifiers: KeyModifiers::NONE,
            },
        );
    }

    fn drag(app: &mut App, from: Cell, to: Cell) {
        mouse(app, MouseEventKind::Down(MouseButton::Left), from);
        mouse(app, MouseEventKind::Drag(MouseButton::Left), to);
        mouse(app, MouseEventKind::Up(MouseButton::Left), to);
    }

    fn key(app: &mut App, code: KeyCode) {
        handle_key(
            app,
            KeyEvent {
                code,
                modifiers: KeyModifiers::NONE,
                kind: crossterm::event::KeyEventKind::Press,
                state: KeyEventState::NONE,
            },
        );
    }

    fn ready_app() -> App {
        let (app, _rx) = test_app();
        let mut app = app;
        app.key_dialog = None;
        app
    }

    #[tokio::test]
    async fn test_background_drag_pans() {
        let mut app = ready_app();
        draw(&mut app);
        let panel = app.focused.unwrap();
        let before = app.canvas.panels.get(panel).unwrap().position;

        drag(&mut app, (80, 30), (90, 33));
        assert_eq!(app.canvas.viewport.offset, Point::new(10.0, 3.0));
        assert_eq!(app.canvas.panels.get(panel).unwrap().position, before);
        assert!(!app.canvas.is_dragging());
    }

    #[tokio::test]
    async fn test_title_drag_moves_panel() {
        let mut app = ready_app();
        app.canvas.viewport.pan_by(Point::new(5.0, 5.0));
        draw(&mut app);
        let panel = app.focused.unwrap();

        // Welcome panel at canvas (2, 1) is on screen at (7, 6)
        drag(&mut app, (10, 6), (30, 16));
        assert_eq!(app.canvas.panels.get(panel).unwrap().position, Point::new(22.0, 11.0));
        assert_eq!(app.canvas.viewport.offset, Point::new(5.0, 5.0));
    }

    #[tokio::test]
    async fn test_text_drag_captures_selection_with_source() {
        let mut app = ready_app();
        draw(&mut app);
        let panel = app.focused.unwrap();

        // Row 3 is the first body line: "Welcome to tangent. ..." starting at column 3
        drag(&mut app, (3, 3), (9, 3));
        let selection = app.canvas.selection.current().unwrap();
        assert_eq!(selection.text, "Welcome");
        assert_eq!(selection.source_panel_id, Some(panel));
        assert!(app.highlight.is_some());

        // Number keys branch from it
        key(&mut app, KeyCode::Char('3'));
        assert!(app.canvas.selection.current().is_none());
        let child = app.pending_focus.unwrap();
        let child_panel = app.canvas.panels.get(child).unwrap();
        assert_eq!(child_panel.model_name(), "Gemini");
        assert_eq!(child_panel.parent_id(), Some(panel));
        assert_eq!(child_panel.messages()[0], ChatMessage::user("Welcome"));
    }

    #[tokio::test]
    async fn test_keyboard_pan_drops_selection() {
        let mut app = ready_app();
        draw(&mut app);
        let parent = app.focused.unwrap();
        drag(&mut app, (3, 3), (9, 3));
        assert!(app.canvas.selection.current().is_some());

        key(&mut app, KeyCode::Left);
        assert!(app.canvas.selection.current().is_none());
        assert!(app.highlight.is_none());
        draw(&mut app);
        assert!(app.layout.toolbar.is_empty());

        // Reselecting at the panned position branches at the same canvas offset
        let step = PAN_STEP_X as u16;
        drag(&mut app, (3 + step, 3), (9 + step, 3));
        assert_eq!(app.canvas.selection.current().unwrap().text, "Welcome");
        key(&mut app, KeyCode::Char('1'));
        let child = app.pending_focus.unwrap();
        let offset = app.canvas.panels.get(child).unwrap().position
            - app.canvas.panels.get(parent).unwrap().position;

        let mut unpanned = ready_app();
        draw(&mut unpanned);
        let parent = unpanned.focused.unwrap();
        drag(&mut unpanned, (3, 3), (9, 3));
        key(&mut unpanned, KeyCode::Char('1'));
        let child = unpanned.pending_focus.unwrap();
        let expected = unpanned.canvas.panels.get(child).unwrap().position
            - unpanned.canvas.panels.get(parent).unwrap().position;
        assert_eq!(offset, expected);
    }

    #[tokio::test]
    async fn test_scroll_drops_selection_over_panel() {
        let mut app = ready_app();
        draw(&mut app);
        drag(&mut app, (3, 3), (9, 3));
        assert!(app.highlight.is_some());

        mouse(&mut app, MouseEventKind::ScrollUp, (5, 4));
        assert!(app.canvas.selection.current().is_none());
        assert!(app.highlight.is_none());
    }

    #[tokio::test]
    async fn test_click_clears_selection() {
        let mut app = ready_app();
        draw(&mut app);
        drag(&mut app, (3, 3), (9, 3));
        assert!(app.canvas.selection.current().is_some());

        drag(&mut app, (100, 30), (100, 30));
        assert!(app.canvas.selection.current().is_none());
        assert!(app.highlight.is_none());
    }

    #[tokio::test]
    async fn test_toolbar_button_copies_to_notes() {
        let mut app = ready_app();
        draw(&mut app);
        drag(&mut app, (3, 3), (9, 3));
        draw(&mut app);

        let button = app
            .layout
            .toolbar
            .iter()
            .find(|b| b.action == ToolbarAction::CopyToNotes)
            .copied()
            .unwrap();
        drag(&mut app, (button.area.x, button.area.y), (button.area.x, button.area.y));
        assert_eq!(app.canvas.notes.notes()[0].content(), "Welcome");
        assert!(app.canvas.selection.current().is_none());
    }

    #[tokio::test]
    async fn test_selection_in_notes_has_no_source() {
        let mut app = ready_app();
        app.canvas.notes.add("sidebar words");
        app.show_notes = true;
        draw(&mut app);

        let line = app.layout.region(RegionKey::Notes).unwrap().lines[0].clone();
        let (x, y) = (line.x as u16, line.y as u16);
        drag(&mut app, (x, y), (x + 6, y));
        let selection = app.canvas.selection.current().unwrap();
        assert_eq!(selection.text, "sidebar");
        assert_eq!(selection.source_panel_id, None);

        key(&mut app, KeyCode::Char('1'));
        let child = app.pending_focus.unwrap();
        assert_eq!(app.canvas.panels.get(child).unwrap().parent_id(), None);
    }

    #[tokio::test]
    async fn test_editing_keys_and_send() {
        let mut app = ready_app();
        key(&mut app, KeyCode::Char('n'));
        assert_eq!(app.input_mode, InputMode::Editing);
        for c in "hi".chars() {
            key(&mut app, KeyCode::Char(c));
        }
        key(&mut app, KeyCode::Enter);
        let panel = app.focused_panel().unwrap();
        assert_eq!(panel.messages()[0], ChatMessage::user("hi"));
        assert!(panel.is_waiting());

        key(&mut app, KeyCode::Esc);
        assert_eq!(app.input_mode, InputMode::Normal);
        key(&mut app, KeyCode::Left);
        assert_eq!(app.canvas.viewport.offset, Point::new(PAN_STEP_X, 0.0));
    }

    #[tokio::test]
    async fn test_key_dialog_adds_credential() {
        let mut app = ready_app();
        key(&mut app, KeyCode::Char('K'));
        key(&mut app, KeyCode::Char('a'));
        key(&mut app, KeyCode::Down);
        key(&mut app, KeyCode::Enter);
        for c in "sk-ant-key".chars() {
            key(&mut app, KeyCode::Char(c));
        }
        key(&mut app, KeyCode::Enter);
        for c in "home".chars() {
            key(&mut app, KeyCode::Char(c));
        }
        key(&mut app, KeyCode::Enter);

        assert_eq!(app.key_dialog, Some(KeyDialog::List));
        assert_eq!(app.credentials.len(), 1);
        assert_eq!(app.credentials[0].provider, tangent_core::Provider::Anthropic);
        assert_eq!(app.credentials[0].key, "sk-ant-key");
        assert_eq!(app.credentials[0].label, "home");

        key(&mut app, KeyCode::Esc);
        assert!(app.key_dialog.is_none());
    }

    #[tokio::test]
    async fn test_mouse_ignored_under_dialog() {
        let (mut app, _rx) = test_app();
        draw(&mut app);
        drag(&mut app, (80, 30), (90, 33));
        assert_eq!(app.canvas.viewport.offset, Point::ORIGIN);
    }
}
