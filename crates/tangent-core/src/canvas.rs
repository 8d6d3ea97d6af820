//! The canvas state object
//!
//! Bundles the panel store, viewport, live selection and notes, and routes the
//! pointer gestures and selection actions through them. Hosts keep one
//! `Canvas` and pass it by reference to whatever renders or handles input.

use uuid::Uuid;

use crate::connector::{derive_connectors, Connector, ConnectorStyle};
use crate::geometry::{PanDrag, PanelDrag, Point, Viewport};
use crate::notes::Notebook;
use crate::panel::{NewPanel, PanelId, PanelPatch, PanelStore, PendingSend};
use crate::selection::SelectionCapture;

/// Where a branched panel appears relative to the selection's bottom-left corner
pub const BRANCH_OFFSET: Point = Point::new(50.0, 10.0);

#[derive(Debug, Clone, Copy, PartialEq)]
enum Drag {
    Pan(PanDrag),
    Panel { id: PanelId, drag: PanelDrag },
}

#[derive(Debug, Default)]
pub struct Canvas {
    pub panels: PanelStore,
    pub viewport: Viewport,
    pub selection: SelectionCapture,
    pub notes: Notebook,
    drag: Option<Drag>,
}

impl Canvas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pointer went down on empty background
    pub fn begin_pan(&mut self, pointer: Point) {
        self.drag = Some(Drag::Pan(PanDrag::begin(&self.viewport, pointer)));
    }

    /// Pointer went down on a panel's drag handle. False if the panel is gone.
    pub fn begin_panel_drag(&mut self, id: PanelId, pointer: Point) -> bool {
        let Some(panel) = self.panels.get(id) else {
            return false;
        };
        let drag = PanelDrag::begin(&self.viewport, panel.position, pointer);
        self.drag = Some(Drag::Panel { id, drag });
        true
    }

    pub fn drag_to(&mut self, pointer: Point) {
        match self.drag {
            Some(Drag::Pan(drag)) => drag.update(&mut self.viewport, pointer),
            Some(Drag::Panel { id, drag }) => {
                let position = drag.position_for(&self.viewport, pointer);
                self.panels.update_panel(id, PanelPatch::position(position));
            }
            None => {}
        }
    }

    pub fn end_drag(&mut self) {
        self.drag = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn dragged_panel(&self) -> Option<PanelId> {
        match self.drag {
            Some(Drag::Panel { id, .. }) => Some(id),
            _ => None,
        }
    }

    /// New root panel at a screen point
    pub fn spawn_panel(&mut self, anchor: Point, model_name: &str) -> PanelId {
        self.panels
            .create_panel(&self.viewport, NewPanel::at(anchor, model_name))
    }

    /// Open a panel for `model_name` below the live selection, parented to the
    /// panel the selection came from, and start sending the selected text.
    /// `offset` is measured from the selection's bottom-left corner.
    pub fn branch_from_selection(
        &mut self,
        model_name: &str,
        offset: Point,
    ) -> Option<(PanelId, Option<PendingSend>)> {
        let selection = self.selection.take()?;
        let anchor = Point::new(
            selection.anchor_rect.left + offset.x,
            selection.anchor_rect.bottom() + offset.y,
        );
        let id = self.panels.create_panel(
            &self.viewport,
            NewPanel::at(anchor, model_name).branched_from(selection.source_panel_id),
        );
        let pending = self.panels.begin_send(id, &selection.text);
        Some((id, pending))
    }

    /// Save the live selection as a note and clear it
    pub fn copy_selection_to_notes(&mut self) -> Option<Uuid> {
        let selection = self.selection.take()?;
        Some(self.notes.add_snippet(&selection.text))
    }

    pub fn delete_panel(&mut self, id: PanelId) {
        if self.dragged_panel() == Some(id) {
            self.drag = None;
        }
        self.panels.delete_panel(id);
    }

    pub fn connectors(&self, style: &ConnectorStyle) -> Vec<Connector> {
        derive_connectors(&self.panels, style)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use crate::panel::PLACEHOLDER;
    use crate::selection::{PanelResolver, RawSelection};
    use crate::state::ChatMessage;

    struct Owner(Option<PanelId>);

    impl PanelResolver<()> for Owner {
        fn owning_panel(&self, _: &()) -> Option<PanelId> {
            self.0
        }
    }

    fn select(canvas: &mut Canvas, text: &str, owner: Option<PanelId>) {
        canvas.selection.on_pointer_release(
            RawSelection {
                text: text.to_string(),
                ranges: vec![Rect::new(120.0, 80.0, 60.0, 16.0)],
                anchor: (),
            },
            &Owner(owner),
        );
    }

    #[test]
    fn test_branch_links_to_source_panel() {
        let mut canvas = Canvas::new();
        canvas.viewport = Viewport::new(Point::new(20.0, 20.0));
        let source = canvas.spawn_panel(Point::new(0.0, 0.0), "GPT-4");
        select(&mut canvas, "an idea", Some(source));

        let (id, pending) = canvas.branch_from_selection("Claude", BRANCH_OFFSET).unwrap();
        let panel = canvas.panels.get(id).unwrap();
        assert_eq!(panel.parent_id(), Some(source));
        assert_eq!(panel.model_name(), "Claude");
        // (120 + 50, 96 + 10) on screen, minus the pan
        assert_eq!(panel.position, Point::new(150.0, 86.0));
        assert_eq!(
            panel.messages(),
            &[ChatMessage::user("an idea"), ChatMessage::assistant(PLACEHOLDER)]
        );
        let pending = pending.unwrap();
        assert_eq!(pending.model_name, "Claude");
        assert!(canvas.selection.current().is_none());
    }

    #[test]
    fn test_branch_outside_panel_is_root() {
        let mut canvas = Canvas::new();
        select(&mut canvas, "from notes", None);
        let (id, _) = canvas.branch_from_selection("Gemini", BRANCH_OFFSET).unwrap();
        assert_eq!(canvas.panels.get(id).unwrap().parent_id(), None);
    }

    #[test]
    fn test_branch_without_selection() {
        let mut canvas = Canvas::new();
        assert!(canvas.branch_from_selection("GPT-4", BRANCH_OFFSET).is_none());
        assert!(canvas.panels.is_empty());
    }

    #[test]
    fn test_copy_selection_to_notes() {
        let mut canvas = Canvas::new();
        select(&mut canvas, " keep this ", None);
        canvas.copy_selection_to_notes().unwrap();
        assert_eq!(canvas.notes.notes()[0].content(), "keep this");
        assert!(canvas.selection.current().is_none());
        assert!(canvas.copy_selection_to_notes().is_none());
    }

    #[test]
    fn test_pan_does_not_move_panels() {
        let mut canvas = Canvas::new();
        let id = canvas.spawn_panel(Point::new(50.0, 50.0), "GPT-4");
        canvas.begin_pan(Point::new(10.0, 10.0));
        canvas.drag_to(Point::new(110.0, 60.0));
        canvas.end_drag();

        assert_eq!(canvas.viewport.offset, Point::new(100.0, 50.0));
        assert_eq!(canvas.panels.get(id).unwrap().position, Point::new(50.0, 50.0));
        assert!(!canvas.is_dragging());
    }

    #[test]
    fn test_panel_drag_under_pan() {
        let mut canvas = Canvas::new();
        canvas.viewport = Viewport::new(Point::new(-300.0, 40.0));
        let id = canvas.spawn_panel(Point::new(0.0, 0.0), "GPT-4");
        let before = canvas.panels.get(id).unwrap().position;

        assert!(canvas.begin_panel_drag(id, Point::new(5.0, 5.0)));
        assert_eq!(canvas.dragged_panel(), Some(id));
        canvas.drag_to(Point::new(9.0, 2.0));
        canvas.drag_to(Point::new(25.0, 45.0));
        canvas.end_drag();

        let after = canvas.panels.get(id).unwrap().position;
        assert_eq!(after - before, Point::new(20.0, 40.0));
        assert_eq!(canvas.viewport.offset, Point::new(-300.0, 40.0));
    }

    #[test]
    fn test_deleting_dragged_panel_stops_drag() {
        let mut canvas = Canvas::new();
        let id = canvas.spawn_panel(Point::ORIGIN, "GPT-4");
        canvas.begin_panel_drag(id, Point::ORIGIN);
        canvas.delete_panel(id);
        assert!(!canvas.is_dragging());
        canvas.drag_to(Point::new(1.0, 1.0));
        assert!(canvas.panels.is_empty());
    }
}
