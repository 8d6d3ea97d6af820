use std::collections::HashMap;
use std::path::PathBuf;

use ratatui::widgets::ListState;
use tangent_core::{
    Canvas, ChatMessage, Config, Credential, HttpRelayClient, KeyStore, LocalStorage, ModelCatalog,
    NewPanel, Panel, PanelId, PanelPatch, PendingSend, Point, Provider, RelayClient, SendError,
};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::layout::{Cell, FrameLayout, RegionKey, PANEL_HEIGHT, PANEL_WIDTH};
use crate::tui::AppEvent;

/// Where a branched panel opens, in cells from the selection's bottom-left corner
pub const TUI_BRANCH_OFFSET: Point = Point::new(2.0, 1.0);

const WELCOME: &str = "Welcome to tangent. Drag the background to pan and drag a title bar to \
move a panel. Select text in any panel with the mouse, then press a number to branch a new \
conversation with that model or c to keep it as a note. Press n for a new panel, K to manage \
API keys and ? for all keys.";

const SPINNER: [&str; 4] = ["⠋", "⠙", "⠸", "⠴"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    /// Typing into the focused panel's input line
    Editing,
    /// Typing a manual note in the sidebar
    NoteEditing,
}

/// Steps of the key manager dialog
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyDialog {
    List,
    PickProvider,
    EnterKey { provider: Provider },
    EnterLabel { provider: Provider, key: String },
}

/// Mouse drag across text in one region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextDrag {
    pub region: RegionKey,
    pub start: Cell,
    pub end: Cell,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub canvas: Canvas,
    pub catalog: ModelCatalog,
    pub focused: Option<PanelId>,
    pub show_help: bool,

    // Panel editing
    pub input_cursor: usize,
    /// Lines scrolled up from the bottom, per panel
    pub scroll_back: HashMap<PanelId, usize>,
    /// Catalog index used for new panels
    pub spawn_model: usize,
    /// Panel to focus on the next tick, set after branching
    pub pending_focus: Option<PanelId>,

    // Text selection
    pub text_drag: Option<TextDrag>,
    /// Cells of the live selection, kept until it is used or cleared
    pub highlight: Option<TextDrag>,

    // Notes sidebar
    pub show_notes: bool,
    pub note_input: String,
    pub note_cursor: usize,
    pub notes_state: ListState,

    // Key manager
    pub key_dialog: Option<KeyDialog>,
    pub key_list_state: ListState,
    pub provider_state: ListState,
    pub dialog_input: String,
    pub credentials: Vec<Credential>,

    // Feedback
    pub status: Option<String>,
    pub animation_frame: usize,

    // Areas and text drawn last frame, for mouse hit-testing
    pub layout: FrameLayout,

    relay: HttpRelayClient,
    key_store: KeyStore<Box<dyn LocalStorage>>,
    events: UnboundedSender<AppEvent>,
    // Where the chosen spawn model is remembered; `None` keeps it in memory
    config_path: Option<PathBuf>,
}

impl App {
    pub fn new(
        config: &Config,
        config_path: Option<PathBuf>,
        key_store: KeyStore<Box<dyn LocalStorage>>,
        events: UnboundedSender<AppEvent>,
    ) -> Self {
        let credentials = key_store.load();
        let relay = HttpRelayClient::new(&config.relay_url, config.catalog.clone(), credentials.clone());
        info!(relay = %config.relay_url, credentials = credentials.len(), "starting canvas");

        let mut canvas = Canvas::new();
        let welcome_model = config.catalog.get(0).map(|m| m.name.clone()).unwrap_or_default();
        let welcome = canvas.panels.create_panel(
            &canvas.viewport,
            NewPanel::at(Point::new(2.0, 1.0), &welcome_model)
                .with_messages(vec![ChatMessage::assistant(WELCOME)]),
        );

        let spawn_model = config
            .default_model
            .as_deref()
            .and_then(|name| config.catalog.entries().iter().position(|m| m.name == name))
            .unwrap_or(0);

        // First run goes straight to key entry
        let key_dialog = credentials.is_empty().then_some(KeyDialog::List);

        Self {
            should_quit: false,
            input_mode: InputMode::Normal,
            canvas,
            catalog: config.catalog.clone(),
            focused: Some(welcome),
            show_help: false,

            input_cursor: 0,
            scroll_back: HashMap::new(),
            spawn_model,
            pending_focus: None,

            text_drag: None,
            highlight: None,

            show_notes: false,
            note_input: String::new(),
            note_cursor: 0,
            notes_state: ListState::default(),

            key_dialog,
            key_list_state: ListState::default(),
            provider_state: ListState::default(),
            dialog_input: String::new(),
            credentials,

            status: None,
            animation_frame: 0,

            layout: FrameLayout::default(),

            relay,
            key_store,
            events,
            config_path,
        }
    }

    pub fn focused_panel(&self) -> Option<&Panel> {
        self.focused.and_then(|id| self.canvas.panels.get(id))
    }

    pub fn spawn_model_name(&self) -> &str {
        self.catalog.get(self.spawn_model).map(|m| m.name.as_str()).unwrap_or("")
    }

    pub fn cycle_spawn_model(&mut self) {
        if !self.catalog.is_empty() {
            self.spawn_model = (self.spawn_model + 1) % self.catalog.len();
            self.remember_spawn_model();
        }
    }

    fn remember_spawn_model(&mut self) {
        let Some(path) = &self.config_path else {
            return;
        };
        let model = self.spawn_model_name().to_string();
        if let Err(e) = Config::save_default_model(path, &model) {
            warn!(error = %e, "could not save default model");
            self.status = Some(format!("Could not save config: {e}"));
        }
    }

    pub fn spinner(&self) -> &'static str {
        SPINNER[self.animation_frame % SPINNER.len()]
    }

    /// Tick animation frame and apply deferred focus (called by Tick event)
    pub fn tick(&mut self) {
        self.animation_frame = self.animation_frame.wrapping_add(1);
        if let Some(id) = self.pending_focus.take() {
            if self.canvas.panels.contains(id) {
                self.focus(id);
            }
        }
    }

    // Panels

    pub fn focus(&mut self, id: PanelId) {
        self.canvas.panels.bring_to_front(id);
        self.focused = Some(id);
        self.input_cursor = self
            .canvas
            .panels
            .get(id)
            .map(|p| p.pending_input.chars().count())
            .unwrap_or(0);
    }

    /// Focus the panel lowest in the stack, which raises it
    pub fn focus_next(&mut self) {
        let ids = self.canvas.panels.ids();
        let next = match self.focused.and_then(|f| ids.iter().position(|&id| id == f)) {
            Some(i) => ids.get((i + 1) % ids.len()),
            None => ids.last(),
        };
        if let Some(&id) = next {
            self.focus(id);
        }
    }

    /// New panel for the palette model in the middle of the canvas area
    pub fn spawn_panel(&mut self) -> PanelId {
        let area = self.layout.canvas_area;
        let (width, height) = if area.width == 0 { (80.0, 24.0) } else { (area.width as f32, area.height as f32) };
        // Fan out repeated spawns so they don't stack exactly
        let nudge = (self.canvas.panels.len() % 6) as f32 * 2.0;
        // Whole cells, so the panel grid lines up with mouse hit-testing
        let anchor = Point::new(
            ((width - PANEL_WIDTH as f32) / 2.0).max(0.0).floor() + nudge,
            ((height - PANEL_HEIGHT as f32) / 2.0).max(0.0).floor() + nudge / 2.0,
        );
        let model = self.spawn_model_name().to_string();
        let id = self.canvas.spawn_panel(anchor, &model);
        self.focus(id);
        self.input_mode = InputMode::Editing;
        id
    }

    pub fn delete_focused(&mut self) {
        let Some(id) = self.focused.take() else {
            return;
        };
        self.canvas.delete_panel(id);
        self.scroll_back.remove(&id);
        if self.highlight.is_some_and(|h| h.region == RegionKey::Panel(id)) {
            self.highlight = None;
        }
        self.focused = self.canvas.panels.ids().last().copied();
        self.input_mode = InputMode::Normal;
    }

    /// Pan the view. A live selection is screen-anchored, so it is dropped.
    pub fn pan_by(&mut self, delta: Point) {
        self.clear_selection();
        self.canvas.viewport.pan_by(delta);
    }

    pub fn scroll_panel(&mut self, id: PanelId, up: bool, lines: usize) {
        self.drop_selection_over(RegionKey::Panel(id));
        let back = self.scroll_back.entry(id).or_insert(0);
        *back = if up { back.saturating_add(lines) } else { back.saturating_sub(lines) };
    }

    // Input line of the focused panel

    fn focused_input(&self) -> Option<(PanelId, String)> {
        self.focused_panel().map(|p| (p.id(), p.pending_input.clone()))
    }

    pub fn insert_char(&mut self, c: char) {
        let Some((id, mut input)) = self.focused_input() else {
            return;
        };
        let byte_idx = char_to_byte_index(&input, self.input_cursor);
        input.insert(byte_idx, c);
        self.input_cursor += 1;
        self.canvas.panels.update_panel(id, PanelPatch::input(input));
    }

    pub fn delete_char(&mut self) {
        let Some((id, mut input)) = self.focused_input() else {
            return;
        };
        if self.input_cursor == 0 {
            return;
        }
        let byte_idx = char_to_byte_index(&input, self.input_cursor - 1);
        input.remove(byte_idx);
        self.input_cursor -= 1;
        self.canvas.panels.update_panel(id, PanelPatch::input(input));
    }

    pub fn move_cursor(&mut self, right: bool) {
        let len = self.focused_panel().map(|p| p.pending_input.chars().count()).unwrap_or(0);
        self.input_cursor = if right { (self.input_cursor + 1).min(len) } else { self.input_cursor.saturating_sub(1) };
    }

    /// Send the focused panel's input line
    pub fn send_focused(&mut self) {
        let Some((id, text)) = self.focused_input() else {
            return;
        };
        if let Some(pending) = self.canvas.panels.begin_send(id, &text) {
            self.drop_selection_over(RegionKey::Panel(id));
            self.input_cursor = 0;
            self.scroll_back.remove(&id);
            self.dispatch(pending);
        }
    }

    /// Run the relay call in the background; the reply comes back as an event
    pub fn dispatch(&self, pending: PendingSend) {
        let relay = self.relay.clone();
        let events = self.events.clone();
        debug!(panel = %pending.panel_id, model = %pending.model_name, "dispatching send");
        tokio::spawn(async move {
            let result = relay.send(&pending.model_name, &pending.messages).await;
            let _ = events.send(AppEvent::Reply(pending, result));
        });
    }

    pub fn apply_reply(&mut self, pending: PendingSend, result: Result<String, SendError>) {
        if let Err(e) = &result {
            warn!(panel = %pending.panel_id, error = %e, "send failed");
        }
        self.drop_selection_over(RegionKey::Panel(pending.panel_id));
        self.canvas.panels.complete_send(pending, result);
    }

    // Selection actions

    /// Branch the live selection into a new panel for catalog model `index`
    pub fn branch_selection(&mut self, index: usize) -> Option<PanelId> {
        let model = self.catalog.get(index)?.name.clone();
        let (id, pending) = self.canvas.branch_from_selection(&model, TUI_BRANCH_OFFSET)?;
        self.highlight = None;
        self.pending_focus = Some(id);
        if let Some(pending) = pending {
            self.dispatch(pending);
        }
        Some(id)
    }

    pub fn copy_selection_to_notes(&mut self) {
        if self.canvas.copy_selection_to_notes().is_some() {
            self.highlight = None;
            self.notes_state.select(Some(0));
            self.status = Some("Saved to notes".to_string());
        }
    }

    pub fn clear_selection(&mut self) {
        self.canvas.selection.clear();
        self.highlight = None;
    }

    // The text under the highlight in `region` is about to move
    fn drop_selection_over(&mut self, region: RegionKey) {
        if self.highlight.is_some_and(|h| h.region == region) {
            self.clear_selection();
        }
    }

    // Notes sidebar

    pub fn toggle_notes(&mut self) {
        self.show_notes = !self.show_notes;
        if self.show_notes && self.notes_state.selected().is_none() && !self.canvas.notes.is_empty() {
            self.notes_state.select(Some(0));
        }
    }

    pub fn begin_note(&mut self) {
        self.show_notes = true;
        self.note_input.clear();
        self.note_cursor = 0;
        self.input_mode = InputMode::NoteEditing;
    }

    pub fn note_insert_char(&mut self, c: char) {
        let byte_idx = char_to_byte_index(&self.note_input, self.note_cursor);
        self.note_input.insert(byte_idx, c);
        self.note_cursor += 1;
    }

    pub fn note_delete_char(&mut self) {
        if self.note_cursor > 0 {
            let byte_idx = char_to_byte_index(&self.note_input, self.note_cursor - 1);
            self.note_input.remove(byte_idx);
            self.note_cursor -= 1;
        }
    }

    pub fn commit_note(&mut self) {
        if self.canvas.notes.add(&self.note_input).is_some() {
            self.drop_selection_over(RegionKey::Notes);
            self.notes_state.select(Some(0));
        }
        self.note_input.clear();
        self.note_cursor = 0;
        self.input_mode = InputMode::Normal;
    }

    pub fn notes_nav_down(&mut self) {
        let len = self.canvas.notes.len();
        if len > 0 {
            let i = self.notes_state.selected().unwrap_or(0);
            self.notes_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn notes_nav_up(&mut self) {
        let i = self.notes_state.selected().unwrap_or(0);
        self.notes_state.select(Some(i.saturating_sub(1)));
    }

    pub fn delete_selected_note(&mut self) {
        let Some(i) = self.notes_state.selected() else {
            return;
        };
        let Some(id) = self.canvas.notes.notes().get(i).map(|n| n.id()) else {
            return;
        };
        self.canvas.notes.delete(id);
        self.drop_selection_over(RegionKey::Notes);
        let len = self.canvas.notes.len();
        if len == 0 {
            self.notes_state.select(None);
        } else if i >= len {
            self.notes_state.select(Some(len - 1));
        }
    }

    // Key manager

    pub fn open_key_dialog(&mut self) {
        self.key_dialog = Some(KeyDialog::List);
        self.dialog_input.clear();
        if self.key_list_state.selected().is_none() && !self.credentials.is_empty() {
            self.key_list_state.select(Some(0));
        }
    }

    pub fn close_key_dialog(&mut self) {
        self.key_dialog = None;
        self.dialog_input.clear();
    }

    pub fn key_list_nav(&mut self, down: bool) {
        let len = self.credentials.len();
        if len == 0 {
            return;
        }
        let i = self.key_list_state.selected().unwrap_or(0);
        let next = if down { (i + 1).min(len - 1) } else { i.saturating_sub(1) };
        self.key_list_state.select(Some(next));
    }

    pub fn provider_nav(&mut self, down: bool) {
        let len = Provider::all().len();
        let i = self.provider_state.selected().unwrap_or(0);
        let next = if down { (i + 1).min(len - 1) } else { i.saturating_sub(1) };
        self.provider_state.select(Some(next));
    }

    pub fn selected_provider(&self) -> Provider {
        let providers = Provider::all();
        let i = self.provider_state.selected().unwrap_or(0);
        providers.get(i).copied().unwrap_or(Provider::OpenAI)
    }

    pub fn add_credential(&mut self, provider: Provider, key: &str, label: &str) {
        let key = key.trim();
        if key.is_empty() {
            return;
        }
        self.credentials.push(Credential::new(provider, key, label.trim()));
        self.key_list_state.select(Some(self.credentials.len() - 1));
        self.persist_credentials();
    }

    pub fn remove_selected_credential(&mut self) {
        let Some(i) = self.key_list_state.selected().filter(|&i| i < self.credentials.len()) else {
            return;
        };
        self.credentials.remove(i);
        let len = self.credentials.len();
        self.key_list_state.select(if len == 0 { None } else { Some(i.min(len - 1)) });
        self.persist_credentials();
    }

    fn persist_credentials(&mut self) {
        if let Err(e) = self.key_store.save(&self.credentials) {
            warn!(error = %e, "could not save credentials");
            self.status = Some(format!("Could not save keys: {e}"));
        }
        self.relay.set_credentials(self.credentials.clone());
    }
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tangent_core::panel::PLACEHOLDER;
    use tangent_core::{MemoryStorage, RawSelection, Rect};
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    pub(crate) fn test_app() -> (App, UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let config = Config {
            // Nothing listens here; tests never reach the network
            relay_url: "http://127.0.0.1:9/api/chat".to_string(),
            ..Config::default()
        };
        let storage: Box<dyn LocalStorage> = Box::new(MemoryStorage::default());
        let app = App::new(&config, None, KeyStore::new(storage), tx);
        (app, rx)
    }

    fn select_in(app: &mut App, text: &str, owner: Option<PanelId>) {
        struct Owner(Option<PanelId>);
        impl tangent_core::PanelResolver<()> for Owner {
            fn owning_panel(&self, _: &()) -> Option<PanelId> {
                self.0
            }
        }
        app.canvas.selection.on_pointer_release(
            RawSelection {
                text: text.to_string(),
                ranges: vec![Rect::new(10.0, 4.0, 8.0, 1.0)],
                anchor: (),
            },
            &Owner(owner),
        );
    }

    #[tokio::test]
    async fn test_first_run_opens_key_dialog() {
        let (app, _rx) = test_app();
        assert_eq!(app.key_dialog, Some(KeyDialog::List));
        assert_eq!(app.canvas.panels.len(), 1);
        assert!(app.focused.is_some());
    }

    #[tokio::test]
    async fn test_typing_edits_focused_input() {
        let (mut app, _rx) = test_app();
        app.spawn_panel();
        for c in "héllo".chars() {
            app.insert_char(c);
        }
        app.move_cursor(false);
        app.delete_char();
        assert_eq!(app.focused_panel().unwrap().pending_input, "hélo");
        assert_eq!(app.input_cursor, 3);
    }

    #[tokio::test]
    async fn test_send_without_key_reports_error_in_panel() {
        let (mut app, mut rx) = test_app();
        let id = app.spawn_panel();
        for c in "hi".chars() {
            app.insert_char(c);
        }
        app.send_focused();

        let panel = app.canvas.panels.get(id).unwrap();
        assert!(panel.is_waiting());
        assert!(panel.pending_input.is_empty());
        assert_eq!(panel.messages()[1].content, PLACEHOLDER);

        let Some(AppEvent::Reply(pending, result)) = rx.recv().await else {
            panic!("expected a reply event");
        };
        app.apply_reply(pending, result);
        let panel = app.canvas.panels.get(id).unwrap();
        assert!(!panel.is_waiting());
        assert!(panel.messages()[1].content.starts_with("Error: No API key configured for GPT-4"));
    }

    #[tokio::test]
    async fn test_blank_send_does_nothing() {
        let (mut app, mut rx) = test_app();
        let id = app.spawn_panel();
        app.insert_char(' ');
        app.send_focused();
        assert!(app.canvas.panels.get(id).unwrap().messages().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_branch_focuses_new_panel_on_tick() {
        let (mut app, _rx) = test_app();
        let source = app.focused.unwrap();
        select_in(&mut app, "branch me", Some(source));

        let id = app.branch_selection(1).unwrap();
        let panel = app.canvas.panels.get(id).unwrap();
        assert_eq!(panel.model_name(), "Claude");
        assert_eq!(panel.parent_id(), Some(source));
        assert_eq!(panel.position, Point::new(12.0, 6.0));
        assert_eq!(app.focused, Some(source));

        app.tick();
        assert_eq!(app.focused, Some(id));
        assert!(app.pending_focus.is_none());
    }

    #[tokio::test]
    async fn test_branch_with_unknown_model_keeps_selection() {
        let (mut app, _rx) = test_app();
        select_in(&mut app, "text", None);
        assert!(app.branch_selection(42).is_none());
        assert!(app.canvas.selection.current().is_some());
    }

    #[tokio::test]
    async fn test_notes_flow() {
        let (mut app, _rx) = test_app();
        select_in(&mut app, "snippet", None);
        app.copy_selection_to_notes();
        app.begin_note();
        for c in "manual".chars() {
            app.note_insert_char(c);
        }
        app.commit_note();

        let contents: Vec<&str> = app.canvas.notes.notes().iter().map(|n| n.content()).collect();
        assert_eq!(contents, vec!["manual", "snippet"]);
        assert_eq!(app.input_mode, InputMode::Normal);

        app.notes_nav_down();
        app.delete_selected_note();
        assert_eq!(app.canvas.notes.len(), 1);
        assert_eq!(app.notes_state.selected(), Some(0));
    }

    #[tokio::test]
    async fn test_credentials_persist_and_reach_relay() {
        let (mut app, _rx) = test_app();
        app.add_credential(Provider::Anthropic, " sk-ant ", "work");
        app.add_credential(Provider::OpenAI, "   ", "ignored");
        assert_eq!(app.credentials.len(), 1);
        assert_eq!(app.credentials[0].key, "sk-ant");
        assert_eq!(app.key_store.load(), app.credentials);
        assert_eq!(app.relay.credentials(), app.credentials.as_slice());

        app.remove_selected_credential();
        assert!(app.credentials.is_empty());
        assert!(app.key_store.load().is_empty());
    }

    #[tokio::test]
    async fn test_spawn_model_choice_survives_restart() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let open = |path: &std::path::Path| {
            let (tx, _rx) = mpsc::unbounded_channel();
            let config = Config::load_from(path).unwrap();
            let storage: Box<dyn LocalStorage> = Box::new(MemoryStorage::default());
            App::new(&config, Some(path.to_path_buf()), KeyStore::new(storage), tx)
        };

        let mut app = open(&path);
        assert_eq!(app.spawn_model_name(), "GPT-4");
        app.cycle_spawn_model();
        app.cycle_spawn_model();
        assert_eq!(app.spawn_model_name(), "Gemini");

        let reopened = open(&path);
        assert_eq!(reopened.spawn_model_name(), "Gemini");
    }

    #[tokio::test]
    async fn test_delete_focused_moves_focus_to_top() {
        let (mut app, _rx) = test_app();
        let first = app.focused.unwrap();
        let second = app.spawn_panel();
        app.delete_focused();
        assert!(!app.canvas.panels.contains(second));
        assert_eq!(app.focused, Some(first));
    }

    #[tokio::test]
    async fn test_focus_next_cycles_all_panels() {
        let (mut app, _rx) = test_app();
        app.spawn_panel();
        app.spawn_panel();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..3 {
            app.focus_next();
            seen.insert(app.focused.unwrap());
        }
        assert_eq!(seen.len(), 3);
    }
}
