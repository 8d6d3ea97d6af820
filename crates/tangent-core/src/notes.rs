use chrono::{DateTime, Local};
use uuid::Uuid;

/// A captured snippet. Content never changes after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    id: Uuid,
    content: String,
    created_at: DateTime<Local>,
}

impl Note {
    fn new(content: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.to_string(),
            created_at: Local::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn created_at(&self) -> DateTime<Local> {
        self.created_at
    }
}

/// Notes sidebar contents, newest first
#[derive(Debug, Default)]
pub struct Notebook {
    notes: Vec<Note>,
}

impl Notebook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Manual entry. Blank text is ignored.
    pub fn add(&mut self, content: &str) -> Option<Uuid> {
        if content.trim().is_empty() {
            return None;
        }
        Some(self.push(content))
    }

    /// Store a selection snippet as-is
    pub fn add_snippet(&mut self, content: &str) -> Uuid {
        self.push(content)
    }

    fn push(&mut self, content: &str) -> Uuid {
        let note = Note::new(content);
        let id = note.id;
        self.notes.insert(0, note);
        id
    }

    pub fn delete(&mut self, id: Uuid) -> bool {
        let before = self.notes.len();
        self.notes.retain(|n| n.id != id);
        self.notes.len() != before
    }
}
