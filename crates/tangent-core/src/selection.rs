//! Text-selection capture
//!
//! Hosts report what the user selected on pointer release; this module decides
//! whether that is a live selection and which panel it came from. Finding the
//! owning panel is host-specific, so it goes through a `PanelResolver`.

use crate::geometry::Rect;
use crate::panel::PanelId;

/// What the host saw when the pointer was released
#[derive(Debug, Clone)]
pub struct RawSelection<N> {
    pub text: String,
    /// Bounding boxes of the selection ranges, screen space, in range order
    pub ranges: Vec<Rect>,
    /// Host node where the selection started
    pub anchor: N,
}

/// Resolves the panel owning a selection's anchor node
pub trait PanelResolver<N> {
    fn owning_panel(&self, anchor: &N) -> Option<PanelId>;
}

/// A host node hierarchy: parent links plus an optional panel marker per node
pub trait NodeTree {
    type Node;

    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;
    fn panel_marker(&self, node: &Self::Node) -> Option<PanelId>;
}

/// Walks up from the anchor to the nearest node carrying a panel marker
pub struct AncestryResolver<'a, T>(pub &'a T);

impl<T: NodeTree> PanelResolver<T::Node> for AncestryResolver<'_, T>
where
    T::Node: Clone,
{
    fn owning_panel(&self, anchor: &T::Node) -> Option<PanelId> {
        let mut node = Some(anchor.clone());
        while let Some(current) = node {
            if let Some(id) = self.0.panel_marker(&current) {
                return Some(id);
            }
            node = self.0.parent(&current);
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub text: String,
    pub anchor_rect: Rect,
    pub source_panel_id: Option<PanelId>,
}

/// Holds at most one live selection
#[derive(Debug, Default)]
pub struct SelectionCapture {
    current: Option<Selection>,
}

impl SelectionCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&Selection> {
        self.current.as_ref()
    }

    /// Replace the live selection from a pointer release. Blank text clears it.
    pub fn on_pointer_release<N, R>(&mut self, raw: RawSelection<N>, resolver: &R) -> Option<&Selection>
    where
        R: PanelResolver<N> + ?Sized,
    {
        let text = raw.text.trim();
        let Some(first) = raw.ranges.first().copied().filter(|_| !text.is_empty()) else {
            self.current = None;
            return None;
        };

        self.current = Some(Selection {
            text: text.to_string(),
            anchor_rect: first,
            source_panel_id: resolver.owning_panel(&raw.anchor),
        });
        self.current.as_ref()
    }

    /// Consume the selection when the user acts on it
    pub fn take(&mut self) -> Option<Selection> {
        self.current.take()
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}
