use crate::canvas::{DetailsPanel, Scene, SceneEdge, SceneNode};
use crate::config::{CanvasConfig, FunnelConfig, LayoutConfig};
use crate::funnel::{Bucket, TimeRange};
use crate::layout::SankeyLayout;
use crate::model::{format_count, format_money};
use crate::text_metrics::{fit_label, text_width};
use crate::theme::Theme;
use anyhow::Result;
use std::path::Path;

const EMPTY_SIZE: f32 = 200.0;
const PANEL_PADDING: f32 = 14.0;

/// Draws a canvas scene: weighted curved edges under circular nodes, the whole
/// map scaled by the scene zoom, plus the details panel for the selection.
pub fn render_scene_svg(
    scene: &Scene,
    theme: &Theme,
    layout: &LayoutConfig,
    canvas: &CanvasConfig,
) -> String {
    let pad = layout.padding;
    let (offset_x, offset_y, map_width, map_height) = match scene.bounds {
        Some(bounds) => (
            pad - bounds.min_x,
            pad - bounds.min_y,
            (bounds.width() + pad * 2.0) * scene.zoom,
            (bounds.height() + pad * 2.0) * scene.zoom,
        ),
        None => (pad, pad, EMPTY_SIZE, EMPTY_SIZE),
    };
    let panel_height = scene
        .details
        .as_ref()
        .map(|panel| details_height(panel, theme, layout))
        .unwrap_or(0.0);
    let width = if scene.details.is_some() {
        map_width + canvas.details_width + pad
    } else {
        map_width
    }
    .max(EMPTY_SIZE);
    let height = map_height.max(panel_height + pad * 2.0).max(EMPTY_SIZE);

    let mut svg = String::new();
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width:.2}\" height=\"{height:.2}\" viewBox=\"0 0 {width:.2} {height:.2}\">",
    ));
    svg.push_str(&format!(
        "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        theme.background
    ));
    svg.push_str(&format!(
        "<g class=\"journey-map\" transform=\"scale({:.2}) translate({offset_x:.2} {offset_y:.2})\">",
        scene.zoom
    ));

    svg.push_str("<g class=\"edges\">");
    for edge in &scene.edges {
        svg.push_str(&edge_svg(edge, theme, layout));
    }
    svg.push_str("</g><g class=\"nodes\">");
    for node in &scene.nodes {
        svg.push_str(&node_svg(node, theme, layout));
    }
    svg.push_str("</g></g>");

    if let Some(panel) = &scene.details {
        let x = width - canvas.details_width - pad / 2.0;
        svg.push_str(&details_svg(
            panel,
            x,
            pad,
            canvas.details_width,
            panel_height,
            theme,
            layout,
        ));
    }

    svg.push_str("</svg>");
    svg
}

fn edge_svg(edge: &SceneEdge, theme: &Theme, layout: &LayoutConfig) -> String {
    let stroke = if edge.highlighted || edge.selected {
        theme.highlight_color.as_str()
    } else {
        theme.line_color.as_str()
    };
    let mut out = format!(
        "<path data-id=\"{}\" d=\"{}\" fill=\"none\" stroke=\"{stroke}\" stroke-width=\"{:.2}\" stroke-linecap=\"round\" opacity=\"{:.2}\"/>",
        escape_xml(&edge.id),
        edge.geometry.path_data(),
        edge.geometry.stroke_width,
        edge.opacity
    );
    if let Some(label) = &edge.label {
        let (x, y) = edge.geometry.midpoint();
        let font_size = theme.font_size * 0.85;
        let label_width =
            text_width(label, font_size, &theme.font_family, layout.fast_text_metrics) + 10.0;
        let label_height = font_size + 6.0;
        out.push_str(&format!(
            "<g opacity=\"{:.2}\"><rect x=\"{:.2}\" y=\"{:.2}\" width=\"{label_width:.2}\" height=\"{label_height:.2}\" rx=\"4\" ry=\"4\" fill=\"{}\" stroke=\"{}\" stroke-width=\"0.8\"/>",
            edge.opacity,
            x - label_width / 2.0,
            y - label_height / 2.0,
            theme.background,
            theme.panel_border
        ));
        out.push_str(&format!(
            "<text x=\"{x:.2}\" y=\"{:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{font_size:.2}\" fill=\"{}\">{}</text></g>",
            y + font_size * 0.35,
            escape_xml(&theme.font_family),
            theme.muted_text_color,
            escape_xml(label)
        ));
    }
    out
}

fn node_svg(node: &SceneNode, theme: &Theme, layout: &LayoutConfig) -> String {
    let (cx, cy) = node.center();
    let radius = node.size / 2.0;
    let (stroke, stroke_width) = if node.selected {
        (theme.highlight_color.as_str(), 3.0)
    } else if node.hovered {
        (theme.highlight_color.as_str(), 2.0)
    } else {
        (theme.line_color.as_str(), 1.2)
    };
    let mut out = format!(
        "<g class=\"node {}\" data-id=\"{}\"><circle cx=\"{cx:.2}\" cy=\"{cy:.2}\" r=\"{radius:.2}\" fill=\"{}\" stroke=\"{stroke}\" stroke-width=\"{stroke_width:.1}\"/>",
        node.kind.as_str(),
        escape_xml(&node.id),
        theme.node_fill(node.kind)
    );

    // Labels have to fit the chord a little above and below the centre.
    let font_size = theme.font_size;
    let max_width = node.size * 0.8;
    let label = fit_label(
        &node.label,
        max_width,
        font_size,
        &theme.font_family,
        layout.fast_text_metrics,
    );
    let line = font_size * layout.label_line_height;
    out.push_str(&format!(
        "<text x=\"{cx:.2}\" y=\"{:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{font_size:.2}\" fill=\"{}\">{}</text>",
        cy - line * 0.15,
        escape_xml(&theme.font_family),
        theme.text_color,
        escape_xml(&label)
    ));
    out.push_str(&format!(
        "<text x=\"{cx:.2}\" y=\"{:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{:.2}\" fill=\"{}\">{}</text>",
        cy + line * 0.85,
        escape_xml(&theme.font_family),
        font_size * 0.85,
        theme.muted_text_color,
        format_count(node.count)
    ));
    if node.expandable {
        let marker = if node.expanded { "\u{2212}" } else { "+" };
        let mx = cx + radius * 0.7071;
        let my = cy - radius * 0.7071;
        out.push_str(&format!(
            "<circle cx=\"{mx:.2}\" cy=\"{my:.2}\" r=\"9\" fill=\"{}\" stroke=\"{}\"/><text x=\"{mx:.2}\" y=\"{:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"13\" fill=\"{}\">{marker}</text>",
            theme.background,
            theme.line_color,
            my + 4.5,
            escape_xml(&theme.font_family),
            theme.text_color
        ));
    }
    out.push_str("</g>");
    out
}

fn details_height(panel: &DetailsPanel, theme: &Theme, layout: &LayoutConfig) -> f32 {
    let line = theme.font_size * layout.label_line_height;
    PANEL_PADDING * 2.0 + line * (panel.rows.len() as f32 + 1.5)
}

fn details_svg(
    panel: &DetailsPanel,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    theme: &Theme,
    layout: &LayoutConfig,
) -> String {
    let line = theme.font_size * layout.label_line_height;
    let inner = width - PANEL_PADDING * 2.0;
    let font = escape_xml(&theme.font_family);
    let mut out = format!(
        "<g class=\"details\"><rect x=\"{x:.2}\" y=\"{y:.2}\" width=\"{width:.2}\" height=\"{height:.2}\" rx=\"8\" ry=\"8\" fill=\"{}\" stroke=\"{}\"/>",
        theme.panel_background,
        theme.panel_border
    );
    let title = fit_label(
        &panel.title,
        inner,
        theme.font_size,
        &theme.font_family,
        layout.fast_text_metrics,
    );
    let text_x = x + PANEL_PADDING;
    let mut text_y = y + PANEL_PADDING + theme.font_size;
    out.push_str(&format!(
        "<text x=\"{text_x:.2}\" y=\"{text_y:.2}\" font-family=\"{font}\" font-size=\"{:.2}\" font-weight=\"bold\" fill=\"{}\">{}</text>",
        theme.font_size,
        theme.text_color,
        escape_xml(&title)
    ));
    text_y += line * 0.5;
    for (key, value) in &panel.rows {
        text_y += line;
        out.push_str(&format!(
            "<text x=\"{text_x:.2}\" y=\"{text_y:.2}\" font-family=\"{font}\" font-size=\"{:.2}\" fill=\"{}\">{}</text>",
            theme.font_size * 0.9,
            theme.muted_text_color,
            escape_xml(key)
        ));
        let value = fit_label(
            value,
            inner * 0.6,
            theme.font_size * 0.9,
            &theme.font_family,
            layout.fast_text_metrics,
        );
        out.push_str(&format!(
            "<text x=\"{:.2}\" y=\"{text_y:.2}\" text-anchor=\"end\" font-family=\"{font}\" font-size=\"{:.2}\" fill=\"{}\">{}</text>",
            x + width - PANEL_PADDING,
            theme.font_size * 0.9,
            theme.text_color,
            escape_xml(&value)
        ));
    }
    out.push_str("</g>");
    out
}

/// Draws the flow view: stage bars per column joined by gradient S-curves.
pub fn render_sankey_svg(sankey: &SankeyLayout, theme: &Theme, layout: &LayoutConfig) -> String {
    let pad = layout.padding;
    let width = (sankey.width + pad * 2.0).max(EMPTY_SIZE);
    let height = (sankey.height + pad * 2.0).max(EMPTY_SIZE);
    let font = escape_xml(&theme.font_family);

    let mut svg = String::new();
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width:.2}\" height=\"{height:.2}\" viewBox=\"0 0 {width:.2} {height:.2}\">",
    ));
    svg.push_str(&format!(
        "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        theme.background
    ));

    let color_of = |id: &str| {
        sankey
            .nodes
            .iter()
            .find(|node| node.id == id)
            .map(|node| theme.funnel_color(node.rank))
            .unwrap_or(theme.line_color.as_str())
    };

    svg.push_str("<defs>");
    for (idx, link) in sankey.links.iter().enumerate() {
        svg.push_str(&format!(
            "<linearGradient id=\"flow-{idx}\" gradientUnits=\"userSpaceOnUse\" x1=\"{:.2}\" y1=\"0\" x2=\"{:.2}\" y2=\"0\"><stop offset=\"0%\" stop-color=\"{}\"/><stop offset=\"100%\" stop-color=\"{}\"/></linearGradient>",
            link.curve.start.0,
            link.curve.end.0,
            color_of(&link.source),
            color_of(&link.target)
        ));
    }
    svg.push_str("</defs>");
    svg.push_str(&format!("<g transform=\"translate({pad:.2} {pad:.2})\">"));

    for (idx, link) in sankey.links.iter().enumerate() {
        svg.push_str(&format!(
            "<path data-id=\"{}\" d=\"{}\" fill=\"none\" stroke=\"url(#flow-{idx})\" stroke-width=\"{:.2}\" opacity=\"0.45\"><title>{} users, {}%</title></path>",
            escape_xml(&link.id),
            link.curve.path_data(),
            link.stroke_width,
            format_count(link.count),
            link.conversion_rate
        ));
    }

    let last_column = sankey.columns.saturating_sub(1);
    for node in &sankey.nodes {
        svg.push_str(&format!(
            "<rect data-id=\"{}\" x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" rx=\"2\" ry=\"2\" fill=\"{}\"/>",
            escape_xml(&node.id),
            node.x,
            node.y,
            node.width,
            node.height,
            theme.funnel_color(node.rank)
        ));
        let (label_x, anchor) = if node.rank == last_column && last_column > 0 {
            (node.x - 6.0, "end")
        } else {
            (node.x + node.width + 6.0, "start")
        };
        let label_y = node.y + node.height / 2.0;
        svg.push_str(&format!(
            "<text x=\"{label_x:.2}\" y=\"{:.2}\" text-anchor=\"{anchor}\" font-family=\"{font}\" font-size=\"{:.2}\" fill=\"{}\">{}</text>",
            label_y - 2.0,
            theme.font_size,
            theme.text_color,
            escape_xml(&node.label)
        ));
        svg.push_str(&format!(
            "<text x=\"{label_x:.2}\" y=\"{:.2}\" text-anchor=\"{anchor}\" font-family=\"{font}\" font-size=\"{:.2}\" fill=\"{}\">{}</text>",
            label_y + theme.font_size,
            theme.font_size * 0.85,
            theme.muted_text_color,
            format_count(node.count)
        ));
    }

    svg.push_str("</g></svg>");
    svg
}

/// Draws the merged funnel: one centred bar per bucket, widths proportional to
/// the bucket count, with the step conversion rate between bars.
pub fn render_funnel_svg(
    buckets: &[Bucket],
    range: TimeRange,
    theme: &Theme,
    funnel: &FunnelConfig,
    layout: &LayoutConfig,
) -> String {
    let pad = layout.padding;
    let font = escape_xml(&theme.font_family);
    let value_width = 120.0;
    let title_height = theme.font_size * 2.0;
    let width = pad * 2.0 + funnel.label_width + funnel.max_bar_width + value_width;
    let rows = buckets.len() as f32;
    let height = (pad * 2.0
        + title_height
        + rows * funnel.bar_height
        + (rows - 1.0).max(0.0) * funnel.bar_gap)
        .max(EMPTY_SIZE);
    let max = buckets.iter().map(|bucket| bucket.count).max().unwrap_or(0).max(1);

    let mut svg = String::new();
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width:.2}\" height=\"{height:.2}\" viewBox=\"0 0 {width:.2} {height:.2}\">",
    ));
    svg.push_str(&format!(
        "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        theme.background
    ));
    svg.push_str(&format!(
        "<text x=\"{pad:.2}\" y=\"{:.2}\" font-family=\"{font}\" font-size=\"{:.2}\" font-weight=\"bold\" fill=\"{}\">Journey funnel ({})</text>",
        pad + theme.font_size,
        theme.font_size * 1.15,
        theme.text_color,
        range.as_str()
    ));

    let bar_left = pad + funnel.label_width;
    let center_x = bar_left + funnel.max_bar_width / 2.0;
    let mut y = pad + title_height;
    for (idx, bucket) in buckets.iter().enumerate() {
        let ratio = bucket.count as f32 / max as f32;
        let bar_width = (funnel.max_bar_width * ratio).max(2.0);
        let bar_x = center_x - bar_width / 2.0;
        let text_y = y + funnel.bar_height / 2.0 + theme.font_size * 0.35;

        let label = fit_label(
            &bucket.label,
            funnel.label_width - 10.0,
            theme.font_size,
            &theme.font_family,
            layout.fast_text_metrics,
        );
        svg.push_str(&format!(
            "<text x=\"{pad:.2}\" y=\"{text_y:.2}\" font-family=\"{font}\" font-size=\"{:.2}\" fill=\"{}\">{}</text>",
            theme.font_size,
            theme.text_color,
            escape_xml(&label)
        ));
        svg.push_str(&format!(
            "<rect data-bucket=\"{}\" x=\"{bar_x:.2}\" y=\"{y:.2}\" width=\"{bar_width:.2}\" height=\"{:.2}\" rx=\"6\" ry=\"6\" fill=\"{}\"/>",
            escape_xml(&bucket.label),
            funnel.bar_height,
            theme.funnel_color(idx)
        ));
        let count = format_count(bucket.count);
        let count_width =
            text_width(&count, theme.font_size, &theme.font_family, layout.fast_text_metrics);
        let count_fits = count_width + 12.0 <= bar_width;
        let count_fill = if count_fits {
            theme.background.as_str()
        } else {
            theme.text_color.as_str()
        };
        let count_x = if count_fits { center_x } else { bar_x + bar_width + 8.0 };
        let count_anchor = if count_fits { "middle" } else { "start" };
        svg.push_str(&format!(
            "<text x=\"{count_x:.2}\" y=\"{text_y:.2}\" text-anchor=\"{count_anchor}\" font-family=\"{font}\" font-size=\"{:.2}\" font-weight=\"bold\" fill=\"{count_fill}\">{count}</text>",
            theme.font_size
        ));
        svg.push_str(&format!(
            "<text x=\"{:.2}\" y=\"{text_y:.2}\" text-anchor=\"end\" font-family=\"{font}\" font-size=\"{:.2}\" fill=\"{}\">{}</text>",
            width - pad,
            theme.font_size * 0.9,
            theme.muted_text_color,
            format_money(bucket.value)
        ));

        if let Some(next) = buckets.get(idx + 1) {
            let gap_y = y + funnel.bar_height + funnel.bar_gap / 2.0 + theme.font_size * 0.35;
            svg.push_str(&format!(
                "<text x=\"{center_x:.2}\" y=\"{gap_y:.2}\" text-anchor=\"middle\" font-family=\"{font}\" font-size=\"{:.2}\" fill=\"{}\">\u{2193} {}% ({}% drop-off)</text>",
                theme.font_size * 0.8,
                theme.muted_text_color,
                next.conversion_rate,
                bucket.drop_off
            ));
        }
        y += funnel.bar_height + funnel.bar_gap;
    }

    svg.push_str("</svg>");
    svg
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(
    svg: &str,
    output: &Path,
    render_cfg: &crate::config::RenderConfig,
    theme: &Theme,
) -> Result<()> {
    let mut opt = usvg::Options::default();
    opt.font_family = theme
        .font_family
        .split(',')
        .next()
        .map(|family| family.trim().trim_matches('"').to_string())
        .unwrap_or_else(|| "sans-serif".to_string());
    opt.fontdb_mut().load_system_fonts();
    let fallback = usvg::Size::from_wh(1200.0, 800.0)
        .ok_or_else(|| anyhow::anyhow!("Invalid fallback canvas size"))?;
    opt.default_size = usvg::Size::from_wh(render_cfg.width, render_cfg.height).unwrap_or(fallback);

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap.save_png(output)?;
    Ok(())
}

pub(crate) fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
