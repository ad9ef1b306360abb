use std::f64::consts::PI;

use force_graph::{DefaultNodeIdx, EdgeData, ForceGraph, NodeData, SimulationParameters};
use log::debug;

use super::highlight::HighlightState;
use super::render::{self, BadgeCache};
use super::types::{Graph, LinkId, NodeId};

const MIN_ZOOM: f64 = 0.1;
const MAX_ZOOM: f64 = 10.0;
/// Zoom level a clicked node is brought to.
const CLICK_ZOOM: f64 = 6.0;
const CLICK_CENTER_MS: f64 = 1000.0;
const CLICK_ZOOM_MS: f64 = 2000.0;
const FIT_PADDING: f64 = 50.0;
const FIT_MS: f64 = 1000.0;
/// Screen-space tolerance for picking a link by its chord.
const LINK_HIT_DIST: f64 = 5.0;
/// Average per-node movement below which a tick counts as calm.
const SETTLE_EPS: f64 = 0.05;
const SETTLE_TICKS: u32 = 30;

/// Camera over the graph plane: the graph point at the viewport center plus
/// the zoom factor. The screen transform is derived from it.
#[derive(Clone, Copy, Debug)]
pub struct ViewTransform {
	pub cx: f64,
	pub cy: f64,
	pub k: f64,
}

impl Default for ViewTransform {
	fn default() -> Self {
		Self {
			cx: 0.0,
			cy: 0.0,
			k: 1.0,
		}
	}
}

#[derive(Clone, Debug, Default)]
pub struct DragState {
	pub active: bool,
	pub node: Option<usize>,
	pub start_x: f64,
	pub start_y: f64,
	pub node_start_x: f32,
	pub node_start_y: f32,
}

#[derive(Clone, Debug, Default)]
pub struct PanState {
	pub active: bool,
	pub start_x: f64,
	pub start_y: f64,
	pub start_cx: f64,
	pub start_cy: f64,
}

#[derive(Clone, Debug)]
struct Tween {
	from: f64,
	to: f64,
	elapsed: f64,
	duration: f64,
}

impl Tween {
	fn new(from: f64, to: f64, duration_ms: f64) -> Self {
		Self {
			from,
			to,
			elapsed: 0.0,
			duration: (duration_ms / 1000.0).max(0.0),
		}
	}

	fn advance(&mut self, dt: f64) -> f64 {
		self.elapsed += dt;
		if self.done() {
			return self.to;
		}
		let t = ease_out_cubic(self.elapsed / self.duration);
		self.from + (self.to - self.from) * t
	}

	fn done(&self) -> bool {
		self.duration <= 0.0 || self.elapsed >= self.duration
	}
}

fn ease_out_cubic(t: f64) -> f64 {
	1.0 - (1.0 - t).powi(3)
}

#[derive(Clone, Debug, Default)]
struct SettleProbe {
	calm: u32,
	fitted: bool,
}

pub struct RelationGraphState {
	pub graph: Graph,
	sim: ForceGraph<usize, ()>,
	sim_idx: Vec<DefaultNodeIdx>,
	positions: Vec<(f64, f64)>,
	pub transform: ViewTransform,
	pan_anim: Option<(Tween, Tween)>,
	zoom_anim: Option<Tween>,
	pub drag: DragState,
	pub pan: PanState,
	pub highlight: HighlightState,
	badges: BadgeCache,
	pub width: f64,
	pub height: f64,
	pub animation_running: bool,
	flow_time: f64,
	settle: SettleProbe,
}

impl RelationGraphState {
	pub fn new(graph: Graph, width: f64, height: f64) -> Self {
		let mut sim = ForceGraph::new(SimulationParameters {
			force_charge: 150.0,
			force_spring: 0.05,
			force_max: 100.0,
			node_speed: 3000.0,
			damping_factor: 0.9,
		});
		let mut sim_idx = Vec::with_capacity(graph.nodes.len());
		let count = graph.nodes.len().max(1);

		for i in 0..graph.nodes.len() {
			let angle = (i as f64) * 2.0 * PI / count as f64;
			let (x, y) = ((100.0 * angle.cos()) as f32, (100.0 * angle.sin()) as f32);
			sim_idx.push(sim.add_node(NodeData {
				x,
				y,
				mass: 10.0,
				is_anchor: false,
				user_data: i,
			}));
		}
		for link in &graph.links {
			if let (Some(s), Some(t)) = (
				graph.node_index(link.source),
				graph.node_index(link.target),
			) {
				sim.add_edge(sim_idx[s], sim_idx[t], EdgeData::default());
			}
		}
		debug!(
			"layout initialized: {} nodes, {} links",
			graph.nodes.len(),
			graph.links.len()
		);

		Self {
			graph,
			sim,
			sim_idx,
			positions: Vec::new(),
			transform: ViewTransform::default(),
			pan_anim: None,
			zoom_anim: None,
			drag: DragState::default(),
			pan: PanState::default(),
			highlight: HighlightState::default(),
			badges: BadgeCache::default(),
			width,
			height,
			animation_running: true,
			flow_time: 0.0,
			settle: SettleProbe::default(),
		}
	}

	/// Screen offset of the graph origin for the current camera.
	pub fn translation(&self) -> (f64, f64) {
		(
			self.width / 2.0 - self.transform.k * self.transform.cx,
			self.height / 2.0 - self.transform.k * self.transform.cy,
		)
	}

	pub fn screen_to_graph(&self, sx: f64, sy: f64) -> (f64, f64) {
		let (tx, ty) = self.translation();
		((sx - tx) / self.transform.k, (sy - ty) / self.transform.k)
	}

	/// Simulated position of the node at graph index `i`, once the layout has
	/// produced one.
	pub fn position(&self, i: usize) -> Option<(f64, f64)> {
		self.positions.get(i).copied()
	}

	pub fn node_position(&self, id: NodeId) -> Option<(f64, f64)> {
		self.position(self.graph.node_index(id)?)
	}

	pub(super) fn badge_cache(&self) -> &BadgeCache {
		&self.badges
	}

	pub(super) fn frame_parts(
		&mut self,
	) -> (&Graph, &[(f64, f64)], &HighlightState, &mut BadgeCache, f64) {
		(
			&self.graph,
			&self.positions,
			&self.highlight,
			&mut self.badges,
			self.flow_time,
		)
	}

	/// Link whose chord passes within a few screen pixels of the pointer.
	pub fn link_at_position(&self, sx: f64, sy: f64) -> Option<LinkId> {
		let (gx, gy) = self.screen_to_graph(sx, sy);
		let tolerance = LINK_HIT_DIST / self.transform.k;
		let mut best: Option<(LinkId, f64)> = None;
		for (li, link) in self.graph.links.iter().enumerate() {
			let (Some(s), Some(e)) = (
				self.node_position(link.source),
				self.node_position(link.target),
			) else {
				continue;
			};
			let d = render::point_segment_distance(gx, gy, s.0, s.1, e.0, e.1);
			if d <= tolerance && best.is_none_or(|(_, bd)| d < bd) {
				best = Some((li, d));
			}
		}
		best.map(|(li, _)| li)
	}

	pub fn set_node_hover(&mut self, node: Option<usize>) {
		let id = node.and_then(|i| self.graph.nodes.get(i)).map(|n| n.id);
		self.highlight.on_node_hover(&self.graph, id);
	}

	pub fn set_link_hover(&mut self, link: Option<LinkId>) {
		self.highlight.on_link_hover(&self.graph, link);
	}

	/// Clicking a node flies the camera to it: two concurrent animated
	/// operations, neither of which blocks the caller.
	pub fn on_node_click(&mut self, node: usize) {
		let Some((x, y)) = self.position(node) else {
			return;
		};
		self.center_at(x, y, CLICK_CENTER_MS);
		self.zoom(CLICK_ZOOM, CLICK_ZOOM_MS);
	}

	/// Freeze a node where the user dropped it; the simulation keeps the
	/// anchored position from then on.
	pub fn on_node_drag_end(&mut self, node: usize) {
		let Some(&idx) = self.sim_idx.get(node) else {
			return;
		};
		self.sim.visit_nodes_mut(|n| {
			if n.index() == idx {
				n.data.is_anchor = true;
			}
		});
	}

	pub fn drag_node_to(&mut self, node: usize, nx: f32, ny: f32) {
		let Some(&idx) = self.sim_idx.get(node) else {
			return;
		};
		self.sim.visit_nodes_mut(|n| {
			if n.index() == idx {
				n.data.x = nx;
				n.data.y = ny;
				n.data.is_anchor = true;
			}
		});
		if let Some(p) = self.positions.get_mut(node) {
			*p = (nx as f64, ny as f64);
		}
	}

	pub fn center_at(&mut self, gx: f64, gy: f64, duration_ms: f64) {
		self.pan_anim = Some((
			Tween::new(self.transform.cx, gx, duration_ms),
			Tween::new(self.transform.cy, gy, duration_ms),
		));
	}

	pub fn zoom(&mut self, k: f64, duration_ms: f64) {
		self.zoom_anim = Some(Tween::new(
			self.transform.k,
			k.clamp(MIN_ZOOM, MAX_ZOOM),
			duration_ms,
		));
	}

	/// Immediate zoom toward a screen point; the graph point under the
	/// pointer stays put.
	pub fn zoom_at(&mut self, sx: f64, sy: f64, factor: f64) {
		let new_k = (self.transform.k * factor).clamp(MIN_ZOOM, MAX_ZOOM);
		let (gx, gy) = self.screen_to_graph(sx, sy);
		self.transform.k = new_k;
		self.transform.cx = gx - (sx - self.width / 2.0) / new_k;
		self.transform.cy = gy - (sy - self.height / 2.0) / new_k;
	}

	/// Animate the camera so the whole graph fits the viewport with padding.
	pub fn zoom_to_fit(&mut self, duration_ms: f64) {
		let mut bounds: Option<(f64, f64, f64, f64)> = None;
		for &(x, y) in &self.positions {
			let (minx, miny, maxx, maxy) = bounds.unwrap_or((x, y, x, y));
			bounds = Some((minx.min(x), miny.min(y), maxx.max(x), maxy.max(y)));
		}
		let Some((minx, miny, maxx, maxy)) = bounds else {
			return;
		};
		let bw = (maxx - minx).max(1.0);
		let bh = (maxy - miny).max(1.0);
		let k = (((self.width - 2.0 * FIT_PADDING) / bw)
			.min((self.height - 2.0 * FIT_PADDING) / bh))
		.clamp(MIN_ZOOM, MAX_ZOOM);

		self.center_at((minx + maxx) / 2.0, (miny + maxy) / 2.0, duration_ms);
		self.zoom(k, duration_ms);
	}

	pub fn cancel_camera(&mut self) {
		self.pan_anim = None;
		self.zoom_anim = None;
	}

	pub fn tick(&mut self, dt: f32) {
		if self.animation_running {
			self.sim.update(dt);
			let moved = self.refresh_positions();
			if moved < SETTLE_EPS {
				self.settle.calm += 1;
			} else {
				self.settle.calm = 0;
			}
			if self.settle.calm >= SETTLE_TICKS && !self.settle.fitted {
				self.settle.fitted = true;
				debug!("layout settled, fitting view");
				self.zoom_to_fit(FIT_MS);
			}
		} else if self.positions.len() != self.graph.nodes.len() {
			self.refresh_positions();
		}

		self.flow_time += dt as f64;
		let dt = dt as f64;
		if let Some((ax, ay)) = self.pan_anim.as_mut() {
			self.transform.cx = ax.advance(dt);
			self.transform.cy = ay.advance(dt);
			if ax.done() && ay.done() {
				self.pan_anim = None;
			}
		}
		if let Some(z) = self.zoom_anim.as_mut() {
			self.transform.k = z.advance(dt);
			if z.done() {
				self.zoom_anim = None;
			}
		}
	}

	fn refresh_positions(&mut self) -> f64 {
		let n = self.graph.nodes.len();
		let first = self.positions.len() != n;
		if first {
			self.positions = vec![(0.0, 0.0); n];
		}
		let positions = &mut self.positions;
		let mut moved = 0.0;
		self.sim.visit_nodes(|node| {
			let i = node.data.user_data;
			let (nx, ny) = (node.x() as f64, node.y() as f64);
			if let Some(p) = positions.get_mut(i) {
				moved += (nx - p.0).abs() + (ny - p.1).abs();
				*p = (nx, ny);
			}
		});
		if first || n == 0 {
			f64::INFINITY
		} else {
			moved / n as f64
		}
	}

	pub fn resize(&mut self, width: f64, height: f64) {
		self.width = width;
		self.height = height;
	}
}

#[cfg(test)]
mod tests {
	use super::super::builder::build_graph;
	use super::super::highlight::Focus;
	use super::super::types::{Graph, RawGraph, RawLink, RawNode};
	use super::*;

	fn small_graph() -> Graph {
		let raw = RawGraph {
			nodes: (1..=3)
				.map(|id| RawNode {
					id,
					label: format!("n{id}"),
					kind: None,
				})
				.collect(),
			links: vec![
				RawLink {
					source: 1,
					target: 2,
					kind: None,
				},
				RawLink {
					source: 2,
					target: 3,
					kind: None,
				},
			],
		};
		build_graph(raw).unwrap().graph
	}

	fn run_ticks(state: &mut RelationGraphState, seconds: f64) {
		let mut t = 0.0;
		while t < seconds {
			state.tick(0.016);
			t += 0.016;
		}
	}

	#[test]
	fn positions_appear_after_the_first_tick() {
		let mut state = RelationGraphState::new(small_graph(), 800.0, 600.0);
		assert!(state.position(0).is_none());
		state.tick(0.016);
		assert_eq!(state.positions.len(), 3);
		assert!(state.position(0).is_some());
		assert!(state.position(7).is_none());
	}

	#[test]
	fn click_flies_the_camera_to_the_node() {
		let mut state = RelationGraphState::new(small_graph(), 800.0, 600.0);
		state.tick(0.016);
		state.animation_running = false;

		state.drag_node_to(1, 40.0, -25.0);
		state.on_node_click(1);
		run_ticks(&mut state, 2.5);

		assert!((state.transform.cx - 40.0).abs() < 1e-9);
		assert!((state.transform.cy - -25.0).abs() < 1e-9);
		assert!((state.transform.k - CLICK_ZOOM).abs() < 1e-9);
		assert!(state.pan_anim.is_none());
		assert!(state.zoom_anim.is_none());
	}

	#[test]
	fn camera_operations_do_not_block_each_other() {
		let mut state = RelationGraphState::new(small_graph(), 800.0, 600.0);
		state.tick(0.016);
		state.animation_running = false;

		state.center_at(100.0, 0.0, 1000.0);
		state.zoom(2.0, 2000.0);
		// halfway through the pan both tweens are live
		run_ticks(&mut state, 0.5);
		assert!(state.pan_anim.is_some());
		assert!(state.zoom_anim.is_some());
		assert!(state.transform.cx > 0.0);
		assert!(state.transform.k > 1.0);
	}

	#[test]
	fn dragged_node_stays_pinned() {
		let mut state = RelationGraphState::new(small_graph(), 800.0, 600.0);
		state.tick(0.016);

		state.drag_node_to(0, 120.0, 80.0);
		state.on_node_drag_end(0);
		run_ticks(&mut state, 1.0);

		let (x, y) = state.position(0).unwrap();
		assert!((x - 120.0).abs() < 1e-6);
		assert!((y - 80.0).abs() < 1e-6);
	}

	#[test]
	fn settled_layout_triggers_a_single_fit() {
		let raw = RawGraph {
			nodes: vec![RawNode {
				id: 1,
				label: "only".into(),
				kind: None,
			}],
			links: vec![],
		};
		let graph = build_graph(raw).unwrap().graph;
		let mut state = RelationGraphState::new(graph, 800.0, 600.0);
		state.tick(0.016);
		state.drag_node_to(0, 10.0, 10.0); // anchored, so the sim is calm

		run_ticks(&mut state, (SETTLE_TICKS as f64 + 5.0) * 0.016);
		assert!(state.settle.fitted);
		// the fit flew the camera onto the lone node
		run_ticks(&mut state, 1.5);
		assert!((state.transform.cx - 10.0).abs() < 1e-9);
		assert!((state.transform.cy - 10.0).abs() < 1e-9);
	}

	#[test]
	fn wheel_zoom_keeps_the_pointer_fixed() {
		let mut state = RelationGraphState::new(small_graph(), 800.0, 600.0);
		state.tick(0.016);
		let (sx, sy) = (250.0, 125.0);
		let before = state.screen_to_graph(sx, sy);
		state.zoom_at(sx, sy, 1.6);
		let after = state.screen_to_graph(sx, sy);
		assert!((before.0 - after.0).abs() < 1e-9);
		assert!((before.1 - after.1).abs() < 1e-9);
		assert!((state.transform.k - 1.6).abs() < 1e-9);
	}

	#[test]
	fn zoom_is_clamped() {
		let mut state = RelationGraphState::new(small_graph(), 800.0, 600.0);
		state.zoom(100.0, 0.0);
		state.tick(0.016);
		assert!((state.transform.k - MAX_ZOOM).abs() < 1e-9);
		state.zoom_at(0.0, 0.0, 1e-6);
		assert!((state.transform.k - MIN_ZOOM).abs() < 1e-9);
	}

	#[test]
	fn hover_routes_through_the_highlight_state() {
		let mut state = RelationGraphState::new(small_graph(), 800.0, 600.0);
		state.set_node_hover(Some(1));
		assert_eq!(state.highlight.focus(), Focus::Node(2));
		assert!(state.highlight.node_highlighted(1));
		assert!(state.highlight.node_highlighted(3));

		// stale indices from an outdated pick canvas resolve to idle
		state.set_node_hover(Some(99));
		assert!(state.highlight.is_idle());
	}

	#[test]
	fn link_hit_testing_respects_the_chord() {
		let mut state = RelationGraphState::new(small_graph(), 800.0, 600.0);
		state.tick(0.016);
		state.drag_node_to(0, -50.0, 0.0);
		state.drag_node_to(1, 50.0, 0.0);
		state.drag_node_to(2, 50.0, 200.0);
		state.animation_running = false;

		// screen center is graph origin at the default camera
		let (sx, sy) = (400.0, 300.0);
		assert_eq!(state.link_at_position(sx, sy), Some(0));
		assert_eq!(state.link_at_position(sx, sy - 100.0), None);
	}
}
