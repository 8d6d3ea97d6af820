//! Chat panels and their provenance graph
//!
//! Panels live in a slot arena; an id→slot map doubles as the adjacency lookup
//! for `parent_id`. Removing a panel empties its slot and drops its map entry,
//! so children keep a dangling `parent_id` that simply stops resolving.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::client::{RelayClient, SendError};
use crate::geometry::{Point, Rect, Viewport};
use crate::state::{ChatMessage, ChatRole};

/// Assistant text shown while a reply is in flight
pub const PLACEHOLDER: &str = "Thinking...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PanelId(Uuid);

impl PanelId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PanelId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PanelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone)]
pub struct Panel {
    id: PanelId,
    model_name: String,
    parent_id: Option<PanelId>,
    pub position: Point,
    messages: Vec<ChatMessage>,
    pub pending_input: String,
    /// Indices of placeholders still waiting for a reply
    in_flight: Vec<usize>,
}

impl Panel {
    pub fn id(&self) -> PanelId {
        self.id
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn parent_id(&self) -> Option<PanelId> {
        self.parent_id
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_waiting(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// History to send: everything except unresolved placeholders
    fn history(&self) -> Vec<ChatMessage> {
        self.messages
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.in_flight.contains(i))
            .map(|(_, m)| m.clone())
            .collect()
    }
}

/// Arguments for `PanelStore::create_panel`
#[derive(Debug, Clone)]
pub struct NewPanel {
    pub anchor: Point,
    pub model_name: String,
    pub parent_id: Option<PanelId>,
    pub messages: Vec<ChatMessage>,
    pub input: String,
}

impl NewPanel {
    /// A root panel anchored at a screen point
    pub fn at(anchor: Point, model_name: &str) -> Self {
        Self {
            anchor,
            model_name: model_name.to_string(),
            parent_id: None,
            messages: Vec::new(),
            input: String::new(),
        }
    }

    pub fn branched_from(mut self, parent_id: Option<PanelId>) -> Self {
        self.parent_id = parent_id;
        self
    }

    pub fn with_messages(mut self, messages: Vec<ChatMessage>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_input(mut self, input: &str) -> Self {
        self.input = input.to_string();
        self
    }
}

/// Partial update for `PanelStore::update_panel`
#[derive(Debug, Clone, Default)]
pub struct PanelPatch {
    pub position: Option<Point>,
    pub input: Option<String>,
    pub messages: Option<Vec<ChatMessage>>,
}

impl PanelPatch {
    pub fn position(position: Point) -> Self {
        Self {
            position: Some(position),
            ..Default::default()
        }
    }

    pub fn input(input: impl Into<String>) -> Self {
        Self {
            input: Some(input.into()),
            ..Default::default()
        }
    }

    pub fn messages(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages: Some(messages),
            ..Default::default()
        }
    }
}

/// A send that has been appended to its panel and awaits the relay
#[derive(Debug, Clone)]
pub struct PendingSend {
    pub panel_id: PanelId,
    pub model_name: String,
    pub messages: Vec<ChatMessage>,
    placeholder: usize,
}

/// Text stored in the panel when a send fails
pub fn error_message(error: &SendError) -> String {
    format!("Error: {}", error)
}

#[derive(Debug, Default)]
pub struct PanelStore {
    slots: Vec<Option<Panel>>,
    index: HashMap<PanelId, usize>,
}

impl PanelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, id: PanelId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn get(&self, id: PanelId) -> Option<&Panel> {
        self.index.get(&id).and_then(|&slot| self.slots[slot].as_ref())
    }

    pub fn get_mut(&mut self, id: PanelId) -> Option<&mut Panel> {
        let slot = *self.index.get(&id)?;
        self.slots[slot].as_mut()
    }

    /// Panels in stacking order, bottom first
    pub fn iter(&self) -> impl Iterator<Item = &Panel> {
        self.slots.iter().flatten()
    }

    pub fn ids(&self) -> Vec<PanelId> {
        self.iter().map(Panel::id).collect()
    }

    /// Resolved parent; `None` for roots and for dangling references
    pub fn parent_of(&self, id: PanelId) -> Option<&Panel> {
        self.get(id)?.parent_id.and_then(|parent| self.get(parent))
    }

    pub fn children_of(&self, id: PanelId) -> Vec<PanelId> {
        self.iter()
            .filter(|p| p.parent_id == Some(id))
            .map(Panel::id)
            .collect()
    }

    /// Topmost panel whose `size`-sized box contains the canvas point
    pub fn panel_at(&self, canvas: Point, size: Point) -> Option<PanelId> {
        self.slots
            .iter()
            .rev()
            .flatten()
            .find(|p| Rect::new(p.position.x, p.position.y, size.x, size.y).contains(canvas))
            .map(Panel::id)
    }

    pub fn create_panel(&mut self, viewport: &Viewport, new: NewPanel) -> PanelId {
        let id = PanelId::new();
        let panel = Panel {
            id,
            model_name: new.model_name,
            parent_id: new.parent_id,
            position: viewport.to_canvas(new.anchor),
            messages: new.messages,
            pending_input: new.input,
            in_flight: Vec::new(),
        };
        debug!(panel = %id, parent = ?panel.parent_id, model = %panel.model_name, "panel created");
        self.index.insert(id, self.slots.len());
        self.slots.push(Some(panel));
        id
    }

    pub fn update_panel(&mut self, id: PanelId, patch: PanelPatch) {
        let Some(panel) = self.get_mut(id) else {
            return;
        };
        if let Some(position) = patch.position {
            panel.position = position;
        }
        if let Some(input) = patch.input {
            panel.pending_input = input;
        }
        if let Some(messages) = patch.messages {
            // Outstanding replies cannot be matched to a replaced history
            panel.messages = messages;
            panel.in_flight.clear();
        }
    }

    pub fn delete_panel(&mut self, id: PanelId) {
        if let Some(slot) = self.index.remove(&id) {
            self.slots[slot] = None;
            debug!(panel = %id, "panel deleted");
            self.compact_if_sparse();
        }
    }

    /// Move a panel to the top of the stacking order
    pub fn bring_to_front(&mut self, id: PanelId) {
        let Some(&slot) = self.index.get(&id) else {
            return;
        };
        if slot + 1 == self.slots.len() {
            return;
        }
        if let Some(panel) = self.slots[slot].take() {
            self.index.insert(id, self.slots.len());
            self.slots.push(Some(panel));
            self.compact_if_sparse();
        }
    }

    fn compact_if_sparse(&mut self) {
        if self.slots.len() <= 2 * self.index.len() + 16 {
            return;
        }
        self.slots.retain(Option::is_some);
        for (slot, panel) in self.slots.iter().flatten().enumerate() {
            self.index.insert(panel.id, slot);
        }
    }

    /// Append the user turn and a placeholder, clear the input, and hand back
    /// the request to run. `None` for blank text or an unknown panel.
    pub fn begin_send(&mut self, id: PanelId, text: &str) -> Option<PendingSend> {
        if text.trim().is_empty() {
            return None;
        }
        let panel = self.get_mut(id)?;
        panel.messages.push(ChatMessage::user(text));
        let messages = panel.history();
        let placeholder = panel.messages.len();
        panel.messages.push(ChatMessage::assistant(PLACEHOLDER));
        panel.in_flight.push(placeholder);
        panel.pending_input.clear();

        Some(PendingSend {
            panel_id: id,
            model_name: panel.model_name.clone(),
            messages,
            placeholder,
        })
    }

    /// Replace the send's placeholder with the answer or an error line.
    /// Returns false when the panel is gone or its history was replaced.
    pub fn complete_send(&mut self, pending: PendingSend, result: Result<String, SendError>) -> bool {
        let Some(panel) = self.get_mut(pending.panel_id) else {
            debug!(panel = %pending.panel_id, "reply for deleted panel dropped");
            return false;
        };
        let Some(pos) = panel.in_flight.iter().position(|&i| i == pending.placeholder) else {
            debug!(panel = %pending.panel_id, "reply for replaced history dropped");
            return false;
        };
        panel.in_flight.swap_remove(pos);

        let content = match result {
            Ok(text) => text,
            Err(e) => error_message(&e),
        };
        panel.messages[pending.placeholder] = ChatMessage {
            role: ChatRole::Assistant,
            content,
        };
        true
    }

    /// `begin_send`, the relay call and `complete_send` in one step
    pub async fn append_and_send(&mut self, id: PanelId, text: &str, relay: &dyn RelayClient) -> bool {
        let Some(pending) = self.begin_send(id, text) else {
            return false;
        };
        let result = relay.send(&pending.model_name, &pending.messages).await;
        self.complete_send(pending, result)
    }
}
