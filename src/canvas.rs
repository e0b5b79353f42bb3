//! Interactive journey canvas.
//!
//! Holds the node positions, zoom, drag, hover, selection and expansion state
//! for one mounted map and turns pointer input into position updates. Nothing
//! here draws; [`JourneyCanvas::scene`] produces the positioned scene that
//! `render` turns into SVG.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Serialize;

use crate::config::{CanvasConfig, LayoutConfig};
use crate::layout::{
    Bounds, EdgeGeometry, NodeSizer, PositionedNode, compute_edge_geometry, layout_canvas_nodes,
    max_count, node_bounds, reposition,
};
use crate::model::{CanvasEdge, CanvasNode, MapEdge, MapNode, NodeKind, Path, Position, Stage};

pub const PRIMARY_BUTTON: u16 = 0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub button: u16,
    pub client_x: f32,
    pub client_y: f32,
}

impl PointerEvent {
    pub fn primary(client_x: f32, client_y: f32) -> Self {
        Self {
            button: PRIMARY_BUTTON,
            client_x,
            client_y,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum Selection {
    Node(String),
    Edge(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CanvasEvent {
    NodeSelected {
        id: String,
        /// New expansion state when the click toggled it.
        expanded: Option<bool>,
    },
    EdgeSelected(String),
    SelectionCleared,
    DragEnded {
        id: String,
        position: Position,
    },
}

#[derive(Debug, Clone)]
struct DragState {
    node_id: String,
    grab_x: f32,
    grab_y: f32,
    moved: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SceneNode {
    pub id: String,
    pub label: String,
    pub kind: NodeKind,
    pub count: u64,
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub hovered: bool,
    pub selected: bool,
    pub expandable: bool,
    pub expanded: bool,
}

impl SceneNode {
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.size / 2.0, self.y + self.size / 2.0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SceneEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub count: u64,
    pub label: Option<String>,
    pub geometry: EdgeGeometry,
    pub opacity: f32,
    pub highlighted: bool,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailsPanel {
    pub title: String,
    pub rows: Vec<(String, String)>,
}

/// Everything visible in one render pass, in logical (pre-zoom) coordinates.
#[derive(Debug, Clone, Serialize)]
pub struct Scene {
    pub zoom: f32,
    pub bounds: Option<Bounds>,
    pub nodes: Vec<SceneNode>,
    pub edges: Vec<SceneEdge>,
    pub details: Option<DetailsPanel>,
}

pub type StageMap = JourneyCanvas<Stage, Path>;
pub type GoalMap = JourneyCanvas<CanvasNode, CanvasEdge>;

pub struct JourneyCanvas<N: MapNode, E: MapEdge> {
    nodes: Vec<N>,
    edges: Vec<E>,
    index: HashMap<String, usize>,
    children: HashSet<String>,
    sizer: NodeSizer,
    max_edge_count: u64,
    layout: LayoutConfig,
    config: CanvasConfig,
    zoom: f32,
    origin: (f32, f32),
    viewport: Option<(f32, f32)>,
    drag: Option<DragState>,
    hovered_node: Option<String>,
    hovered_edge: Option<String>,
    expanded: BTreeSet<String>,
    selection: Option<Selection>,
    on_select: Option<Box<dyn FnMut(&N)>>,
}

impl GoalMap {
    /// Canvas for the goal/campaign graph; positions come from the lane layout.
    pub fn from_canvas_graph(
        mut nodes: Vec<CanvasNode>,
        edges: Vec<CanvasEdge>,
        layout: LayoutConfig,
        config: CanvasConfig,
    ) -> Self {
        layout_canvas_nodes(&mut nodes, &layout);
        Self::new(nodes, edges, layout, config)
    }
}

impl<N: MapNode, E: MapEdge> JourneyCanvas<N, E> {
    /// Canvas over already positioned nodes.
    pub fn new(nodes: Vec<N>, edges: Vec<E>, layout: LayoutConfig, config: CanvasConfig) -> Self {
        let mut index = HashMap::new();
        for (idx, node) in nodes.iter().enumerate() {
            index.entry(node.id().to_string()).or_insert(idx);
        }
        let children = nodes
            .iter()
            .flat_map(|node| node.parent_ids().iter().cloned())
            .collect();
        let sizer = NodeSizer::new(nodes.iter().map(|node| node.count()), &layout);
        let max_edge_count = max_count(edges.iter().map(|edge| edge.count()));
        Self {
            nodes,
            edges,
            index,
            children,
            sizer,
            max_edge_count,
            layout,
            config,
            zoom: 1.0,
            origin: (0.0, 0.0),
            viewport: None,
            drag: None,
            hovered_node: None,
            hovered_edge: None,
            expanded: BTreeSet::new(),
            selection: None,
            on_select: None,
        }
    }

    pub fn nodes(&self) -> &[N] {
        &self.nodes
    }

    pub fn edges(&self) -> &[E] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&N> {
        self.index.get(id).map(|idx| &self.nodes[*idx])
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn hovered_node(&self) -> Option<&str> {
        self.hovered_node.as_deref()
    }

    pub fn hovered_edge(&self) -> Option<&str> {
        self.hovered_edge.as_deref()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn is_expanded(&self, id: &str) -> bool {
        self.expanded.contains(id)
    }

    /// Client coordinates of the canvas' top-left corner.
    pub fn set_origin(&mut self, x: f32, y: f32) {
        self.origin = (x, y);
    }

    /// Visible client area. Once set, dragged nodes are kept inside it.
    pub fn set_viewport(&mut self, width: f32, height: f32) {
        self.viewport = Some((width.max(0.0), height.max(0.0)));
    }

    /// Registers the callback invoked with a node's data when it is clicked.
    pub fn on_select(&mut self, callback: impl FnMut(&N) + 'static) {
        self.on_select = Some(Box::new(callback));
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        let zoom = if zoom.is_finite() { zoom } else { 1.0 };
        // Rounded so repeated steps do not accumulate float drift.
        let clamped = zoom.clamp(self.config.min_zoom, self.config.max_zoom);
        self.zoom = (clamped * 100.0).round() / 100.0;
        tracing::trace!(zoom = self.zoom, "zoom changed");
    }

    pub fn zoom_in(&mut self) {
        self.set_zoom(self.zoom + self.config.zoom_step);
    }

    pub fn zoom_out(&mut self) {
        self.set_zoom(self.zoom - self.config.zoom_step);
    }

    pub fn reset_zoom(&mut self) {
        self.set_zoom(1.0);
    }

    /// Moves a node; unknown ids are ignored.
    pub fn reposition(&mut self, node_id: &str, position: Position) -> bool {
        match self.index.get(node_id) {
            Some(&idx) => reposition(&mut self.nodes[idx..=idx], node_id, position),
            None => false,
        }
    }

    pub fn node_size(&self, node: &N) -> f32 {
        self.sizer.size(node.count())
    }

    fn positioned(&self, node: &N) -> PositionedNode {
        PositionedNode {
            position: node.position(),
            size: self.node_size(node),
        }
    }

    pub fn is_node_visible(&self, node: &N) -> bool {
        node.is_top_level()
            || node
                .parent_ids()
                .iter()
                .any(|parent| self.expanded.contains(parent))
    }

    fn visible_node(&self, id: &str) -> Option<&N> {
        self.node(id).filter(|node| self.is_node_visible(node))
    }

    fn edge_geometry(&self, edge: &E) -> Option<EdgeGeometry> {
        let source = self.visible_node(edge.source())?;
        let target = self.visible_node(edge.target())?;
        Some(compute_edge_geometry(
            self.positioned(source),
            self.positioned(target),
            edge.count(),
            self.max_edge_count,
            &self.layout,
        ))
    }

    pub fn to_logical(&self, client_x: f32, client_y: f32) -> (f32, f32) {
        (
            (client_x - self.origin.0) / self.zoom,
            (client_y - self.origin.1) / self.zoom,
        )
    }

    /// Topmost visible node under a logical point.
    pub fn node_at(&self, x: f32, y: f32) -> Option<&N> {
        self.nodes.iter().rev().find(|node| {
            if !self.is_node_visible(node) {
                return false;
            }
            let (cx, cy) = self.positioned(node).center();
            let radius = self.node_size(node) / 2.0;
            (x - cx).powi(2) + (y - cy).powi(2) <= radius * radius
        })
    }

    pub fn edge_at(&self, x: f32, y: f32) -> Option<&E> {
        let tolerance = self.config.edge_hit_tolerance / self.zoom;
        self.edges.iter().rev().find(|edge| {
            self.edge_geometry(edge).is_some_and(|geometry| {
                geometry.distance_to(x, y) <= geometry.stroke_width / 2.0 + tolerance
            })
        })
    }

    /// Starts dragging the node under the pointer. Only the primary button
    /// grabs; returns whether a drag started.
    pub fn pointer_down(&mut self, event: PointerEvent) -> bool {
        if event.button != PRIMARY_BUTTON {
            return false;
        }
        let (x, y) = self.to_logical(event.client_x, event.client_y);
        let Some(node) = self.node_at(x, y) else {
            return false;
        };
        let position = node.position();
        let node_id = node.id().to_string();
        tracing::trace!(node = node_id.as_str(), "drag started");
        self.drag = Some(DragState {
            node_id,
            grab_x: event.client_x - self.origin.0 - position.x * self.zoom,
            grab_y: event.client_y - self.origin.1 - position.y * self.zoom,
            moved: false,
        });
        true
    }

    /// Moves the dragged node, or updates hover state when nothing is dragged.
    /// Returns whether anything changed.
    pub fn pointer_move(&mut self, event: PointerEvent) -> bool {
        if let Some(drag) = &self.drag {
            let node_id = drag.node_id.clone();
            let mut position = Position::new(
                (event.client_x - self.origin.0 - drag.grab_x) / self.zoom,
                (event.client_y - self.origin.1 - drag.grab_y) / self.zoom,
            );
            let Some(node) = self.node(&node_id) else {
                self.drag = None;
                return false;
            };
            if let Some((width, height)) = self.viewport {
                let size = self.node_size(node);
                position.x = position.x.clamp(0.0, (width / self.zoom - size).max(0.0));
                position.y = position.y.clamp(0.0, (height / self.zoom - size).max(0.0));
            }
            if node.position() == position {
                return false;
            }
            self.reposition(&node_id, position);
            if let Some(drag) = &mut self.drag {
                drag.moved = true;
            }
            return true;
        }

        let (x, y) = self.to_logical(event.client_x, event.client_y);
        let hovered_node = self.node_at(x, y).map(|node| node.id().to_string());
        let hovered_edge = if hovered_node.is_none() {
            self.edge_at(x, y).map(|edge| edge.id().to_string())
        } else {
            None
        };
        let changed = hovered_node != self.hovered_node || hovered_edge != self.hovered_edge;
        self.hovered_node = hovered_node;
        self.hovered_edge = hovered_edge;
        changed
    }

    /// Ends a drag. A press that never moved counts as a click on the node;
    /// a release away from any node selects the edge under it, or clears the
    /// selection on empty canvas.
    pub fn pointer_up(&mut self, event: PointerEvent) -> Option<CanvasEvent> {
        if let Some(drag) = self.drag.take() {
            if drag.moved {
                let position = self.node(&drag.node_id)?.position();
                tracing::trace!(
                    node = drag.node_id.as_str(),
                    x = position.x,
                    y = position.y,
                    "drag ended"
                );
                return Some(CanvasEvent::DragEnded {
                    id: drag.node_id,
                    position,
                });
            }
            return self.click_node(&drag.node_id);
        }
        if event.button != PRIMARY_BUTTON {
            return None;
        }
        let (x, y) = self.to_logical(event.client_x, event.client_y);
        if let Some(edge_id) = self.edge_at(x, y).map(|edge| edge.id().to_string()) {
            return self.select_edge(&edge_id);
        }
        self.selection.take().map(|_| CanvasEvent::SelectionCleared)
    }

    /// Pointer left the canvas: drop any drag and hover state.
    pub fn pointer_leave(&mut self) {
        self.drag = None;
        self.hovered_node = None;
        self.hovered_edge = None;
    }

    pub fn hover_node(&mut self, id: Option<&str>) {
        self.hovered_node = id
            .filter(|id| self.visible_node(id).is_some())
            .map(str::to_string);
        if self.hovered_node.is_some() {
            self.hovered_edge = None;
        }
    }

    pub fn hover_edge(&mut self, id: Option<&str>) {
        self.hovered_edge = id
            .filter(|id| self.edges.iter().any(|edge| edge.id() == *id))
            .map(str::to_string);
        if self.hovered_edge.is_some() {
            self.hovered_node = None;
        }
    }

    /// Selects a visible node and runs the select callback.
    pub fn select_node(&mut self, id: &str) -> bool {
        let Some(&idx) = self.index.get(id) else {
            return false;
        };
        if !self.is_node_visible(&self.nodes[idx]) {
            return false;
        }
        self.selection = Some(Selection::Node(id.to_string()));
        if let Some(callback) = self.on_select.as_mut() {
            callback(&self.nodes[idx]);
        }
        true
    }

    /// Like [`select_node`](Self::select_node); clicking a node that other
    /// nodes hang off also toggles its expansion.
    pub fn click_node(&mut self, id: &str) -> Option<CanvasEvent> {
        if !self.select_node(id) {
            return None;
        }
        let expanded = if self.children.contains(id) {
            Some(self.toggle_expanded(id))
        } else {
            None
        };
        Some(CanvasEvent::NodeSelected {
            id: id.to_string(),
            expanded,
        })
    }

    pub fn select_edge(&mut self, id: &str) -> Option<CanvasEvent> {
        let edge = self.edges.iter().find(|edge| edge.id() == id)?;
        self.edge_geometry(edge)?;
        self.selection = Some(Selection::Edge(id.to_string()));
        Some(CanvasEvent::EdgeSelected(id.to_string()))
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// Flips a node's expansion and returns the new state.
    pub fn toggle_expanded(&mut self, id: &str) -> bool {
        let expanded = if self.expanded.remove(id) {
            false
        } else {
            self.expanded.insert(id.to_string());
            true
        };
        self.drop_hidden_state();
        expanded
    }

    /// Expands or collapses a node that has children. Returns false for
    /// nodes nothing hangs off.
    pub fn set_expanded(&mut self, id: &str, expanded: bool) -> bool {
        if !self.children.contains(id) || !self.index.contains_key(id) {
            return false;
        }
        if expanded {
            self.expanded.insert(id.to_string());
        } else {
            self.expanded.remove(id);
            self.drop_hidden_state();
        }
        true
    }

    pub fn expand_all(&mut self) {
        self.expanded = self
            .children
            .iter()
            .filter(|id| self.index.contains_key(id.as_str()))
            .cloned()
            .collect();
    }

    pub fn collapse_all(&mut self) {
        self.expanded.clear();
        self.drop_hidden_state();
    }

    /// Forgets hover/selection that points at something no longer visible.
    fn drop_hidden_state(&mut self) {
        let hidden_node = |canvas: &Self, id: &str| canvas.visible_node(id).is_none();
        if self
            .hovered_node
            .as_deref()
            .is_some_and(|id| hidden_node(self, id))
        {
            self.hovered_node = None;
        }
        let edge_hidden = |canvas: &Self, id: &str| {
            canvas
                .edges
                .iter()
                .find(|edge| edge.id() == id)
                .and_then(|edge| canvas.edge_geometry(edge))
                .is_none()
        };
        if self
            .hovered_edge
            .as_deref()
            .is_some_and(|id| edge_hidden(self, id))
        {
            self.hovered_edge = None;
        }
        let selection_hidden = match &self.selection {
            Some(Selection::Node(id)) => hidden_node(self, id),
            Some(Selection::Edge(id)) => edge_hidden(self, id),
            None => false,
        };
        if selection_hidden {
            self.selection = None;
        }
    }

    fn edge_opacity(&self, edge: &E) -> (f32, bool) {
        let highlighted = match (&self.hovered_node, &self.hovered_edge) {
            (Some(node), _) => edge.source() == node.as_str() || edge.target() == node.as_str(),
            (None, Some(hovered)) => edge.id() == hovered.as_str(),
            (None, None) => return (1.0, false),
        };
        if highlighted {
            (1.0, true)
        } else {
            (self.config.dim_opacity, false)
        }
    }

    /// Visible nodes and edges with their geometry. Edges with a missing or
    /// hidden endpoint are left out.
    pub fn scene(&self) -> Scene {
        let selected_node = match &self.selection {
            Some(Selection::Node(id)) => Some(id.as_str()),
            _ => None,
        };
        let selected_edge = match &self.selection {
            Some(Selection::Edge(id)) => Some(id.as_str()),
            _ => None,
        };

        let visible: Vec<&N> = self
            .nodes
            .iter()
            .filter(|node| self.is_node_visible(node))
            .collect();
        let nodes = visible
            .iter()
            .map(|node| {
                let position = node.position();
                SceneNode {
                    id: node.id().to_string(),
                    label: node.label().to_string(),
                    kind: node.kind(),
                    count: node.count(),
                    x: position.x,
                    y: position.y,
                    size: self.node_size(node),
                    hovered: self.hovered_node.as_deref() == Some(node.id()),
                    selected: selected_node == Some(node.id()),
                    expandable: self.children.contains(node.id()),
                    expanded: self.expanded.contains(node.id()),
                }
            })
            .collect();

        let mut edges = Vec::new();
        for edge in &self.edges {
            let Some(geometry) = self.edge_geometry(edge) else {
                if self.node(edge.source()).is_none() || self.node(edge.target()).is_none() {
                    tracing::trace!(edge = edge.id(), "skipping edge with missing endpoint");
                }
                continue;
            };
            let (opacity, highlighted) = self.edge_opacity(edge);
            edges.push(SceneEdge {
                id: edge.id().to_string(),
                source: edge.source().to_string(),
                target: edge.target().to_string(),
                count: edge.count(),
                label: edge.label(),
                geometry,
                opacity,
                highlighted,
                selected: selected_edge == Some(edge.id()),
            });
        }

        let details = match &self.selection {
            Some(Selection::Node(id)) => self.node(id).map(|node| DetailsPanel {
                title: node.label().to_string(),
                rows: node.details(),
            }),
            Some(Selection::Edge(id)) => self
                .edges
                .iter()
                .find(|edge| edge.id() == id)
                .map(|edge| {
                    let source = self
                        .node(edge.source())
                        .map(|n| n.label())
                        .unwrap_or(edge.source());
                    let target = self
                        .node(edge.target())
                        .map(|n| n.label())
                        .unwrap_or(edge.target());
                    DetailsPanel {
                        title: format!("{source} \u{2192} {target}"),
                        rows: edge.details(),
                    }
                }),
            None => None,
        };

        Scene {
            zoom: self.zoom,
            bounds: node_bounds(visible.iter().copied(), &self.sizer),
            nodes,
            edges,
            details,
        }
    }
}
