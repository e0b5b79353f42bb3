use serde::Serialize;

use crate::config::LayoutConfig;
use crate::model::Position;

/// Largest count in a dataset, never below 1 so it is always a safe divisor.
pub fn max_count<I: IntoIterator<Item = u64>>(counts: I) -> u64 {
    counts.into_iter().max().unwrap_or(0).max(1)
}

fn count_ratio(count: u64, max_count: u64) -> f32 {
    let max_count = max_count.max(1);
    (count.min(max_count) as f64 / max_count as f64) as f32
}

/// Maps node counts onto diameters between the configured minimum and maximum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeSizer {
    pub min_size: f32,
    pub max_size: f32,
    pub max_count: u64,
}

impl NodeSizer {
    pub fn new<I: IntoIterator<Item = u64>>(counts: I, config: &LayoutConfig) -> Self {
        Self {
            min_size: config.min_node_size,
            max_size: config.max_node_size,
            max_count: max_count(counts),
        }
    }

    pub fn size(&self, count: u64) -> f32 {
        self.min_size + (self.max_size - self.min_size) * count_ratio(count, self.max_count)
    }
}

/// Edge weight to stroke width, relative to the heaviest edge of the dataset.
pub fn stroke_width(count: u64, max_count: u64, config: &LayoutConfig) -> f32 {
    config.min_stroke_width
        + (config.max_stroke_width - config.min_stroke_width) * count_ratio(count, max_count)
}

/// A node's top-left position together with its diameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionedNode {
    pub position: Position,
    pub size: f32,
}

impl PositionedNode {
    pub fn center(&self) -> (f32, f32) {
        (
            self.position.x + self.size / 2.0,
            self.position.y + self.size / 2.0,
        )
    }
}

/// Single quadratic connector between two node centres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeGeometry {
    pub source_x: f32,
    pub source_y: f32,
    pub target_x: f32,
    pub target_y: f32,
    pub control_x: f32,
    pub control_y: f32,
    pub stroke_width: f32,
}

impl EdgeGeometry {
    pub fn path_data(&self) -> String {
        format!(
            "M {:.2} {:.2} Q {:.2} {:.2} {:.2} {:.2}",
            self.source_x,
            self.source_y,
            self.control_x,
            self.control_y,
            self.target_x,
            self.target_y
        )
    }

    pub fn point_at(&self, t: f32) -> (f32, f32) {
        let u = 1.0 - t;
        (
            u * u * self.source_x + 2.0 * u * t * self.control_x + t * t * self.target_x,
            u * u * self.source_y + 2.0 * u * t * self.control_y + t * t * self.target_y,
        )
    }

    /// Curve point at `t = 0.5`, where edge labels go.
    pub fn midpoint(&self) -> (f32, f32) {
        self.point_at(0.5)
    }

    /// Approximate distance from `(x, y)` to the curve, sampled along `t`.
    pub fn distance_to(&self, x: f32, y: f32) -> f32 {
        const SAMPLES: usize = 24;
        let mut best = f32::INFINITY;
        let mut prev = self.point_at(0.0);
        for step in 1..=SAMPLES {
            let next = self.point_at(step as f32 / SAMPLES as f32);
            best = best.min(distance_to_segment((x, y), prev, next));
            prev = next;
        }
        best
    }
}

fn distance_to_segment(p: (f32, f32), a: (f32, f32), b: (f32, f32)) -> f32 {
    let dx = b.0 - a.0;
    let dy = b.1 - a.1;
    let len_sq = dx * dx + dy * dy;
    if len_sq <= f32::EPSILON {
        return ((p.0 - a.0).powi(2) + (p.1 - a.1).powi(2)).sqrt();
    }
    let t = (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len_sq).clamp(0.0, 1.0);
    let cx = a.0 + t * dx;
    let cy = a.1 + t * dy;
    ((p.0 - cx).powi(2) + (p.1 - cy).powi(2)).sqrt()
}

/// Connector between two positioned nodes. The control point is pushed off the
/// midpoint perpendicular to the edge by `min(0.2, 50 / distance)` of its length,
/// so short edges bow visibly and long ones flatten out. A self-loop collapses
/// to a zero-length path at the node centre.
pub fn compute_edge_geometry(
    source: PositionedNode,
    target: PositionedNode,
    count: u64,
    max_count: u64,
    config: &LayoutConfig,
) -> EdgeGeometry {
    let (source_x, source_y) = source.center();
    let (target_x, target_y) = target.center();
    let dx = target_x - source_x;
    let dy = target_y - source_y;
    let distance = (dx * dx + dy * dy).sqrt();
    let mid_x = (source_x + target_x) / 2.0;
    let mid_y = (source_y + target_y) / 2.0;

    let (control_x, control_y) = if distance > f32::EPSILON {
        let factor = config
            .curve_max_factor
            .min(config.curve_distance / distance);
        // (-dy, dx) is the perpendicular with the same length as the edge.
        (mid_x - dy * factor, mid_y + dx * factor)
    } else {
        (mid_x, mid_y)
    };

    EdgeGeometry {
        source_x,
        source_y,
        target_x,
        target_y,
        control_x,
        control_y,
        stroke_width: stroke_width(count, max_count, config),
    }
}

/// Cubic S-curve for left-to-right flow diagrams; both control points sit at
/// `fraction` of the horizontal run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FlowCurve {
    pub start: (f32, f32),
    pub control_a: (f32, f32),
    pub control_b: (f32, f32),
    pub end: (f32, f32),
}

impl FlowCurve {
    pub fn new(start: (f32, f32), end: (f32, f32), fraction: f32) -> Self {
        let control_x = start.0 + (end.0 - start.0) * fraction;
        Self {
            start,
            control_a: (control_x, start.1),
            control_b: (control_x, end.1),
            end,
        }
    }

    pub fn path_data(&self) -> String {
        format!(
            "M {:.2} {:.2} C {:.2} {:.2}, {:.2} {:.2}, {:.2} {:.2}",
            self.start.0,
            self.start.1,
            self.control_a.0,
            self.control_a.1,
            self.control_b.0,
            self.control_b.1,
            self.end.0,
            self.end.1
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(x: f32, y: f32, size: f32) -> PositionedNode {
        PositionedNode {
            position: Position::new(x, y),
            size,
        }
    }

    #[test]
    fn node_size_is_monotonic_and_bounded() {
        let config = LayoutConfig::default();
        let counts = [0u64, 5, 10, 500, 25_000, 100_000];
        let sizer = NodeSizer::new(counts, &config);
        let sizes: Vec<f32> = counts.iter().map(|c| sizer.size(*c)).collect();
        for pair in sizes.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
        for size in sizes {
            assert!(size >= config.min_node_size && size <= config.max_node_size);
        }
        assert_eq!(sizer.size(0), config.min_node_size);
        assert_eq!(sizer.size(100_000), config.max_node_size);
        // Counts above the recorded max stay clamped.
        assert_eq!(sizer.size(1_000_000), config.max_node_size);
    }

    #[test]
    fn empty_dataset_never_divides_by_zero() {
        let config = LayoutConfig::default();
        assert_eq!(max_count(std::iter::empty()), 1);
        let sizer = NodeSizer::new(Vec::new(), &config);
        assert!(sizer.size(0).is_finite());
        assert!(stroke_width(0, 0, &config).is_finite());
    }

    #[test]
    fn stroke_width_is_monotonic() {
        let config = LayoutConfig::default();
        let max = 1000;
        let mut last = 0.0;
        for count in [0u64, 1, 10, 100, 999, 1000] {
            let width = stroke_width(count, max, &config);
            assert!(width >= last);
            assert!(width >= config.min_stroke_width && width <= config.max_stroke_width);
            last = width;
        }
    }

    #[test]
    fn anchors_are_node_centres() {
        let config = LayoutConfig::default();
        let geometry = compute_edge_geometry(
            node(0.0, 0.0, 60.0),
            node(300.0, 0.0, 100.0),
            5,
            10,
            &config,
        );
        assert_eq!((geometry.source_x, geometry.source_y), (30.0, 30.0));
        assert_eq!((geometry.target_x, geometry.target_y), (350.0, 50.0));
    }

    #[test]
    fn curvature_flattens_for_long_edges() {
        let config = LayoutConfig::default();
        let short =
            compute_edge_geometry(node(0.0, 0.0, 0.0), node(100.0, 0.0, 0.0), 1, 1, &config);
        // 0.2 * 100 = 20 off the axis.
        assert!((short.control_y - 20.0).abs() < 1e-3);
        assert!((short.control_x - 50.0).abs() < 1e-3);

        let long =
            compute_edge_geometry(node(0.0, 0.0, 0.0), node(1000.0, 0.0, 0.0), 1, 1, &config);
        // 50 / 1000 * 1000 = 50 off the axis.
        assert!((long.control_y - 50.0).abs() < 1e-3);
        let short_ratio = short.control_y / 100.0;
        let long_ratio = long.control_y / 1000.0;
        assert!(long_ratio < short_ratio);
    }

    #[test]
    fn self_loop_is_degenerate_but_finite() {
        let config = LayoutConfig::default();
        let same = node(10.0, 10.0, 60.0);
        let geometry = compute_edge_geometry(same, same, 3, 3, &config);
        assert_eq!(geometry.source_x, geometry.target_x);
        assert_eq!(geometry.control_x, geometry.source_x);
        assert_eq!(geometry.control_y, geometry.source_y);
        assert!(geometry.path_data().starts_with("M 40.00 40.00 Q"));
        assert!(geometry.distance_to(40.0, 40.0) < 1e-3);
    }

    #[test]
    fn flow_curve_controls_sit_halfway() {
        let curve = FlowCurve::new((0.0, 10.0), (200.0, 90.0), 0.5);
        assert_eq!(curve.control_a, (100.0, 10.0));
        assert_eq!(curve.control_b, (100.0, 90.0));
        assert!(curve.path_data().contains(" C 100.00 10.00, 100.00 90.00, 200.00 90.00"));
    }

    #[test]
    fn hit_distance_tracks_the_curve() {
        let config = LayoutConfig::default();
        let geometry =
            compute_edge_geometry(node(0.0, 0.0, 0.0), node(100.0, 0.0, 0.0), 1, 1, &config);
        let (mx, my) = geometry.midpoint();
        assert!(geometry.distance_to(mx, my) < 0.5);
        assert!(geometry.distance_to(50.0, -80.0) > 50.0);
    }
}
