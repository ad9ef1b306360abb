use std::collections::HashMap;

use wasm_bindgen::JsValue;
use web_sys::CanvasRenderingContext2d;

use super::builder::FALLBACK_KIND;
use super::highlight::{Focus, HighlightState};
use super::state::RelationGraphState;
use super::types::{Graph, Link, Node, NodeId};

const NODE_RADIUS: f64 = 8.0;
const LABEL_NODE_MARGIN: f64 = NODE_RADIUS * 1.5;
const BASE_FONT_SIZE: f64 = 16.0;
const BADGE_CORNER_RADIUS: f64 = 10.0;
const ARROW_POS: f64 = 0.75;
const BACKGROUND: &str = "#1a1a2e";
const HIGHLIGHT_COLOR: &str = "orange";
const LINK_FALLBACK_COLOR: &str = "#A4A4A4";
const LINK_LABEL_BACKGROUND: &str = "#f5f5f5";
/// Alpha for everything outside the highlight set while a hover is active.
const DIM_ALPHA: f64 = 0.4;

/// How strongly a node badge is emphasized by the current hover.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Emphasis {
	Plain,
	Highlighted,
	Focused,
}

/// Screen-space badge size of a drawn node label, cached for the frame so the
/// pointer-area pass can paint the same rectangle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Badge {
	pub w: f64,
	pub h: f64,
}

/// Per-frame side table of badge dimensions keyed by node id. Cleared at the
/// start of every frame; the label pass fills it, the pointer-area pass reads
/// it. A node whose label has not been drawn yet has no entry and is skipped
/// by the pointer pass, so the ordering dependency stays explicit.
#[derive(Debug, Default)]
pub struct BadgeCache {
	dims: HashMap<NodeId, Badge>,
}

impl BadgeCache {
	pub fn begin_frame(&mut self) {
		self.dims.clear();
	}

	pub fn record(&mut self, id: NodeId, badge: Badge) {
		self.dims.insert(id, badge);
	}

	pub fn get(&self, id: NodeId) -> Option<Badge> {
		self.dims.get(&id).copied()
	}
}

/// Labels keep a constant screen-space size regardless of zoom.
pub fn node_label_font_size(scale: f64) -> f64 {
	BASE_FONT_SIZE / scale.max(0.1)
}

/// Badge rectangle wrapping a measured label with fixed padding.
pub fn badge_around(text_width: f64, font_size: f64) -> Badge {
	Badge {
		w: text_width + 4.0 + font_size * 0.5,
		h: font_size + font_size * 0.5,
	}
}

/// Quadratic control point of a curved link: the chord midpoint displaced
/// perpendicular to the link direction by `curvature * distance`.
pub fn control_point(start: (f64, f64), end: (f64, f64), curvature: f64) -> (f64, f64) {
	let (mx, my) = ((start.0 + end.0) / 2.0, (start.1 + end.1) / 2.0);
	let (dx, dy) = (end.0 - start.0, end.1 - start.1);
	let dist = (dx * dx + dy * dy).sqrt();
	if dist < f64::EPSILON {
		return (mx, my);
	}
	let angle = dy.atan2(dx);
	let offset = curvature * dist;
	(mx + offset * angle.sin(), my - offset * angle.cos())
}

/// Where a link label sits: the curve apex, displaced from the midpoint by
/// half the control-point offset.
pub fn link_label_anchor(start: (f64, f64), end: (f64, f64), curvature: f64) -> (f64, f64) {
	control_point(start, end, curvature * 0.5)
}

pub fn curve_point(start: (f64, f64), ctrl: (f64, f64), end: (f64, f64), t: f64) -> (f64, f64) {
	let u = 1.0 - t;
	(
		u * u * start.0 + 2.0 * u * t * ctrl.0 + t * t * end.0,
		u * u * start.1 + 2.0 * u * t * ctrl.1 + t * t * end.1,
	)
}

/// Unit tangent of the curve at `t`, or `None` when degenerate.
pub fn curve_tangent(
	start: (f64, f64),
	ctrl: (f64, f64),
	end: (f64, f64),
	t: f64,
) -> Option<(f64, f64)> {
	let u = 1.0 - t;
	let dx = 2.0 * u * (ctrl.0 - start.0) + 2.0 * t * (end.0 - ctrl.0);
	let dy = 2.0 * u * (ctrl.1 - start.1) + 2.0 * t * (end.1 - ctrl.1);
	let len = (dx * dx + dy * dy).sqrt();
	if len < f64::EPSILON {
		return None;
	}
	Some((dx / len, dy / len))
}

/// Font size keeping a link label narrower than the distance between its
/// endpoints minus a node-badge margin on each side. `None` means there is no
/// room for a label at all. `unit_width` is the label width at a 1px font.
pub fn link_label_font_size(scale: f64, distance: f64, unit_width: f64) -> Option<f64> {
	let max_len = distance - 2.0 * LABEL_NODE_MARGIN;
	if max_len <= 0.0 || unit_width <= 0.0 {
		return None;
	}
	Some(node_label_font_size(scale).min(max_len / unit_width))
}

pub fn point_segment_distance(px: f64, py: f64, ax: f64, ay: f64, bx: f64, by: f64) -> f64 {
	let (abx, aby) = (bx - ax, by - ay);
	let len2 = abx * abx + aby * aby;
	if len2 < f64::EPSILON {
		return (px - ax).hypot(py - ay);
	}
	let t = (((px - ax) * abx + (py - ay) * aby) / len2).clamp(0.0, 1.0);
	(px - (ax + t * abx)).hypot(py - (ay + t * aby))
}

/// Category a link inherits its color from: the `type` of its source node,
/// falling back to the shared bucket when the source cannot be found.
pub fn link_source_kind<'a>(link: &'a Link, graph: &'a Graph) -> &'a str {
	graph
		.node(link.source)
		.and_then(|n| n.kind.as_deref())
		.unwrap_or(FALLBACK_KIND)
}

pub fn render(state: &mut RelationGraphState, ctx: &CanvasRenderingContext2d) {
	ctx.set_fill_style_str(BACKGROUND);
	ctx.fill_rect(0.0, 0.0, state.width, state.height);

	ctx.save();
	let (tx, ty) = state.translation();
	let _ = ctx.translate(tx, ty);
	let _ = ctx.scale(state.transform.k, state.transform.k);

	let k = state.transform.k;
	let (graph, positions, highlight, badges, flow_time) = state.frame_parts();

	badges.begin_frame();
	draw_links(graph, positions, highlight, flow_time, k, ctx);
	for link in &graph.links {
		draw_link_label(link, endpoints(graph, positions, link), ctx, k);
	}
	let active = !highlight.is_idle();
	for (i, node) in graph.nodes.iter().enumerate() {
		let Some(&(x, y)) = positions.get(i) else {
			continue;
		};
		let emphasis = if highlight.focus() == Focus::Node(node.id) {
			Emphasis::Focused
		} else if highlight.node_highlighted(node.id) {
			Emphasis::Highlighted
		} else {
			Emphasis::Plain
		};
		if active && emphasis == Emphasis::Plain {
			ctx.set_global_alpha(DIM_ALPHA);
		}
		draw_node_label(node, x, y, ctx, k, badges, emphasis);
		ctx.set_global_alpha(1.0);
	}
	ctx.restore();
}

fn endpoints(
	graph: &Graph,
	positions: &[(f64, f64)],
	link: &Link,
) -> Option<((f64, f64), (f64, f64))> {
	let s = *positions.get(graph.node_index(link.source)?)?;
	let e = *positions.get(graph.node_index(link.target)?)?;
	Some((s, e))
}

fn draw_links(
	graph: &Graph,
	positions: &[(f64, f64)],
	highlight: &HighlightState,
	flow_time: f64,
	k: f64,
	ctx: &CanvasRenderingContext2d,
) {
	let line_width = 2.0 / k;
	let (dash, gap) = (8.0 / k, 4.0 / k);
	let dash_offset = -(flow_time * 30.0) % (dash + gap);
	let active = !highlight.is_idle();

	for (li, link) in graph.links.iter().enumerate() {
		let Some((start, end)) = endpoints(graph, positions, link) else {
			continue;
		};
		let (dx, dy) = (end.0 - start.0, end.1 - start.1);
		if (dx * dx + dy * dy).sqrt() < 0.001 {
			continue;
		}

		let highlighted = highlight.link_highlighted(li);
		if active && !highlighted {
			ctx.set_global_alpha(DIM_ALPHA);
		}
		let color = if highlighted {
			HIGHLIGHT_COLOR
		} else {
			graph
				.kind_color(link_source_kind(link, graph))
				.unwrap_or(LINK_FALLBACK_COLOR)
		};
		ctx.set_stroke_style_str(color);
		ctx.set_line_width(if highlighted {
			line_width * 1.5
		} else {
			line_width
		});
		if highlighted {
			let _ = ctx.set_line_dash(&js_sys::Array::of2(
				&JsValue::from_f64(dash),
				&JsValue::from_f64(gap),
			));
			ctx.set_line_dash_offset(dash_offset);
		}

		let ctrl = control_point(start, end, link.curvature);
		ctx.begin_path();
		ctx.move_to(start.0, start.1);
		ctx.quadratic_curve_to(ctrl.0, ctrl.1, end.0, end.1);
		ctx.stroke();
		if highlighted {
			let _ = ctx.set_line_dash(&js_sys::Array::new());
		}

		if let Some((ux, uy)) = curve_tangent(start, ctrl, end, ARROW_POS) {
			let size = if highlighted { 9.0 } else { 6.0 } / k;
			let (ax, ay) = curve_point(start, ctrl, end, ARROW_POS);
			let (bx, by) = (ax - ux * size, ay - uy * size);
			let (px, py) = (-uy * size * 0.5, ux * size * 0.5);
			ctx.set_fill_style_str(color);
			ctx.begin_path();
			ctx.move_to(ax, ay);
			ctx.line_to(bx + px, by + py);
			ctx.line_to(bx - px, by - py);
			ctx.close_path();
			ctx.fill();
		}
		ctx.set_global_alpha(1.0);
	}
}

/// Rounded label badge in the node's category color with the label centered
/// in white on top. Records the badge in the cache for the pointer pass.
pub fn draw_node_label(
	node: &Node,
	x: f64,
	y: f64,
	ctx: &CanvasRenderingContext2d,
	scale: f64,
	cache: &mut BadgeCache,
	emphasis: Emphasis,
) {
	let font_size = node_label_font_size(scale);
	ctx.set_font(&format!("{font_size}px Sans-Serif"));
	let text_width = ctx
		.measure_text(&node.label)
		.map(|m| m.width())
		.unwrap_or(0.0);
	let badge = badge_around(text_width, font_size);

	rounded_rect_path(
		ctx,
		x - badge.w / 2.0,
		y - badge.h / 2.0,
		badge.w,
		badge.h,
		BADGE_CORNER_RADIUS,
	);
	ctx.set_fill_style_str(&node.color);
	ctx.fill();
	if emphasis != Emphasis::Plain {
		ctx.set_stroke_style_str(HIGHLIGHT_COLOR);
		ctx.set_line_width(
			if emphasis == Emphasis::Focused {
				2.5
			} else {
				1.5
			} / scale,
		);
		ctx.stroke();
	}

	ctx.set_text_align("center");
	ctx.set_text_baseline("middle");
	ctx.set_fill_style_str("white");
	let _ = ctx.fill_text(&node.label, x, y);

	cache.record(node.id, badge);
}

/// Fills the cached badge rectangle in a caller-supplied pick color. A node
/// without a cached badge this frame is skipped and stays unpickable until
/// its label has been drawn.
pub fn paint_node_pointer_area(
	id: NodeId,
	x: f64,
	y: f64,
	color: &str,
	ctx: &CanvasRenderingContext2d,
	cache: &BadgeCache,
) {
	let Some(badge) = cache.get(id) else {
		return;
	};
	ctx.set_fill_style_str(color);
	ctx.fill_rect(x - badge.w / 2.0, y - badge.h / 2.0, badge.w, badge.h);
}

/// Label for a typed link, sitting on the curve apex. Returns without drawing
/// while endpoint positions are unresolved or the label has no room.
pub fn draw_link_label(
	link: &Link,
	ends: Option<((f64, f64), (f64, f64))>,
	ctx: &CanvasRenderingContext2d,
	scale: f64,
) {
	let Some(label) = link.kind.as_deref() else {
		return;
	};
	let Some((start, end)) = ends else {
		return;
	};
	let (dx, dy) = (end.0 - start.0, end.1 - start.1);
	let dist = (dx * dx + dy * dy).sqrt();
	if dist < f64::EPSILON {
		return;
	}

	ctx.set_font("1px Sans-Serif");
	let unit_width = ctx.measure_text(label).map(|m| m.width()).unwrap_or(0.0);
	let Some(font_size) = link_label_font_size(scale, dist, unit_width) else {
		return;
	};
	ctx.set_font(&format!("{font_size}px Sans-Serif"));
	let text_width = ctx.measure_text(label).map(|m| m.width()).unwrap_or(0.0);
	let (bw, bh) = (text_width + font_size * 0.2, font_size + font_size * 0.2);
	let (lx, ly) = link_label_anchor(start, end, link.curvature);

	ctx.save();
	let _ = ctx.translate(lx, ly);
	ctx.set_fill_style_str(LINK_LABEL_BACKGROUND);
	ctx.fill_rect(-bw / 2.0, -bh / 2.0, bw, bh);
	ctx.set_text_align("center");
	ctx.set_text_baseline("middle");
	ctx.set_fill_style_str("black");
	let _ = ctx.fill_text(label, 0.0, 0.0);
	ctx.restore();
}

fn rounded_rect_path(ctx: &CanvasRenderingContext2d, x: f64, y: f64, w: f64, h: f64, r: f64) {
	let r = r.min(w / 2.0).min(h / 2.0).max(0.0);
	ctx.begin_path();
	ctx.move_to(x + r, y);
	let _ = ctx.arc_to(x + w, y, x + w, y + h, r);
	let _ = ctx.arc_to(x + w, y + h, x, y + h, r);
	let _ = ctx.arc_to(x, y + h, x, y, r);
	let _ = ctx.arc_to(x, y, x + w, y, r);
	ctx.close_path();
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn label_font_size_never_grows_with_zoom() {
		let scales = [0.05, 0.1, 0.5, 1.0, 2.0, 4.0, 8.0, 16.0];
		let sizes: Vec<f64> = scales.iter().map(|&s| node_label_font_size(s)).collect();
		for pair in sizes.windows(2) {
			assert!(pair[1] <= pair[0], "font size grew: {pair:?}");
		}
	}

	#[test]
	fn badge_wraps_text_with_fixed_padding() {
		let b = badge_around(100.0, 16.0);
		assert_eq!(b.w, 100.0 + 4.0 + 8.0);
		assert_eq!(b.h, 16.0 + 8.0);
	}

	#[test]
	fn straight_link_label_sits_on_the_midpoint() {
		let anchor = link_label_anchor((0.0, 0.0), (10.0, 0.0), 0.0);
		assert_eq!(anchor, (5.0, 0.0));
	}

	#[test]
	fn curved_link_label_sits_on_the_curve_apex() {
		let start = (0.0, 0.0);
		let end = (10.0, 0.0);
		let curvature = 1.0;
		// perpendicular displacement of curvature * distance / 2
		let anchor = link_label_anchor(start, end, curvature);
		assert!((anchor.0 - 5.0).abs() < 1e-9);
		assert!((anchor.1 - -5.0).abs() < 1e-9);

		// and it really is the bezier midpoint of the drawn curve
		let ctrl = control_point(start, end, curvature);
		let apex = curve_point(start, ctrl, end, 0.5);
		assert!((anchor.0 - apex.0).abs() < 1e-9);
		assert!((anchor.1 - apex.1).abs() < 1e-9);
	}

	#[test]
	fn curve_interpolates_its_endpoints() {
		let start = (1.0, 2.0);
		let end = (9.0, -4.0);
		let ctrl = control_point(start, end, 0.7);
		assert_eq!(curve_point(start, ctrl, end, 0.0), start);
		assert_eq!(curve_point(start, ctrl, end, 1.0), end);
	}

	#[test]
	fn tangent_is_unit_length_and_none_when_degenerate() {
		let start = (0.0, 0.0);
		let end = (10.0, 0.0);
		let ctrl = control_point(start, end, 0.5);
		let (ux, uy) = curve_tangent(start, ctrl, end, 0.75).unwrap();
		assert!(((ux * ux + uy * uy).sqrt() - 1.0).abs() < 1e-9);

		assert!(curve_tangent((3.0, 3.0), (3.0, 3.0), (3.0, 3.0), 0.5).is_none());
	}

	#[test]
	fn link_label_font_size_is_capped_and_vanishes_on_short_links() {
		// long link: zoom cap wins
		let capped = link_label_font_size(2.0, 1000.0, 10.0).unwrap();
		assert!((capped - 8.0).abs() < 1e-9);
		// short link: the length cap wins
		let squeezed = link_label_font_size(0.5, LABEL_NODE_MARGIN * 2.0 + 10.0, 10.0).unwrap();
		assert!((squeezed - 1.0).abs() < 1e-9);
		// no room at all
		assert!(link_label_font_size(1.0, LABEL_NODE_MARGIN, 10.0).is_none());
	}

	#[test]
	fn segment_distance_basics() {
		assert!((point_segment_distance(5.0, 3.0, 0.0, 0.0, 10.0, 0.0) - 3.0).abs() < 1e-9);
		// beyond the ends, distance is to the nearest endpoint
		assert!((point_segment_distance(-4.0, 3.0, 0.0, 0.0, 10.0, 0.0) - 5.0).abs() < 1e-9);
		// degenerate segment
		assert!((point_segment_distance(3.0, 4.0, 0.0, 0.0, 0.0, 0.0) - 5.0).abs() < 1e-9);
	}

	#[test]
	fn badge_cache_clears_every_frame() {
		let mut cache = BadgeCache::default();
		cache.record(1, Badge { w: 20.0, h: 10.0 });
		assert!(cache.get(1).is_some());
		assert!(cache.get(2).is_none());

		cache.begin_frame();
		// stale badges never leak into the next frame's pointer pass
		assert!(cache.get(1).is_none());
	}
}
