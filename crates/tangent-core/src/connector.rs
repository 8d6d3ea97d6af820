//! Parent→child connector geometry
//!
//! Recomputed from the store on every change; nothing is cached. All points
//! are in canvas space, so the host draws them under the same single viewport
//! transform as the panels.

use crate::geometry::Point;
use crate::panel::{PanelId, PanelStore};

/// Smallest dash period and tick spacing honored, in canvas units
const MIN_SPACING: f32 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectorStyle {
    /// Offset from a panel's position to its anchor (roughly its center)
    pub anchor_offset: Point,
    pub dash_length: f32,
    pub gap_length: f32,
    pub dot_radius: f32,
    pub arrow_length: f32,
    pub arrow_half_width: f32,
    /// Distance between the arrow tip and the child anchor
    pub arrow_backoff: f32,
    pub tick_spacing: f32,
    pub tick_length: f32,
}

impl Default for ConnectorStyle {
    fn default() -> Self {
        Self {
            anchor_offset: Point::new(160.0, 120.0),
            dash_length: 6.0,
            gap_length: 4.0,
            dot_radius: 4.0,
            arrow_length: 12.0,
            arrow_half_width: 6.0,
            arrow_backoff: 24.0,
            tick_spacing: 40.0,
            tick_length: 6.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arrow {
    pub tip: Point,
    pub left: Point,
    pub right: Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stroke {
    Dash,
    Tick,
    Arrow,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Primitive {
    Segment { from: Point, to: Point, stroke: Stroke },
    Dot { center: Point, radius: f32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Connector {
    pub parent: PanelId,
    pub child: PanelId,
    pub from: Point,
    pub to: Point,
    pub dashes: Vec<(Point, Point)>,
    pub ticks: Vec<(Point, Point)>,
    pub arrow: Option<Arrow>,
    pub dot_radius: f32,
}

impl Connector {
    fn between(parent: PanelId, child: PanelId, from: Point, to: Point, style: &ConnectorStyle) -> Self {
        let delta = to - from;
        let length = delta.length();
        let mut connector = Connector {
            parent,
            child,
            from,
            to,
            dashes: Vec::new(),
            ticks: Vec::new(),
            arrow: None,
            dot_radius: style.dot_radius,
        };
        if length <= f32::EPSILON {
            return connector;
        }

        let dir = delta.scale(1.0 / length);
        let normal = Point::new(-dir.y, dir.x);

        let period = (style.dash_length + style.gap_length).max(MIN_SPACING);
        let mut start = 0.0;
        while start < length {
            let end = (start + style.dash_length).min(length);
            connector
                .dashes
                .push((from.lerp(to, start / length), from.lerp(to, end / length)));
            start += period;
        }

        if style.tick_spacing > 0.0 {
            let spacing = style.tick_spacing.max(MIN_SPACING);
            let half = normal.scale(style.tick_length / 2.0);
            let mut at = spacing;
            while at < length {
                let center = from.lerp(to, at / length);
                connector.ticks.push((center - half, center + half));
                at += spacing;
            }
        }

        let backoff = style.arrow_backoff.min(length / 2.0);
        let tip = to - dir.scale(backoff);
        let base = tip - dir.scale(style.arrow_length);
        let wing = normal.scale(style.arrow_half_width);
        connector.arrow = Some(Arrow {
            tip,
            left: base + wing,
            right: base - wing,
        });
        connector
    }

    /// Drawing order: line, ticks, anchor dots, arrow
    pub fn primitives(&self) -> Vec<Primitive> {
        let mut out = Vec::with_capacity(self.dashes.len() + self.ticks.len() + 4);
        out.extend(self.dashes.iter().map(|&(from, to)| Primitive::Segment {
            from,
            to,
            stroke: Stroke::Dash,
        }));
        out.extend(self.ticks.iter().map(|&(from, to)| Primitive::Segment {
            from,
            to,
            stroke: Stroke::Tick,
        }));
        for center in [self.from, self.to] {
            out.push(Primitive::Dot {
                center,
                radius: self.dot_radius,
            });
        }
        if let Some(arrow) = self.arrow {
            for wing in [arrow.left, arrow.right] {
                out.push(Primitive::Segment {
                    from: wing,
                    to: arrow.tip,
                    stroke: Stroke::Arrow,
                });
            }
        }
        out
    }
}

/// One connector per panel whose parent is still in the store
pub fn derive_connectors(store: &PanelStore, style: &ConnectorStyle) -> Vec<Connector> {
    store
        .iter()
        .filter_map(|child| {
            let parent = store.parent_of(child.id())?;
            Some(Connector::between(
                parent.id(),
                child.id(),
                parent.position + style.anchor_offset,
                child.position + style.anchor_offset,
                style,
            ))
        })
        .collect()
}
