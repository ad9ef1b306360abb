use std::collections::HashSet;

use super::types::{Graph, LinkId, NodeId};

/// What the pointer currently rests on. Hover events fully replace the
/// derived sets, so the latest event always wins and nothing stale survives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Focus {
	#[default]
	Idle,
	Node(NodeId),
	Link(LinkId),
}

#[derive(Clone, Debug, Default)]
pub struct HighlightState {
	focus: Focus,
	nodes: HashSet<NodeId>,
	links: HashSet<LinkId>,
}

impl HighlightState {
	/// Hovering a node emphasizes it, its one-hop neighborhood, and every
	/// incident link. `None` (or an id the graph no longer knows) goes idle.
	pub fn on_node_hover(&mut self, graph: &Graph, node: Option<NodeId>) {
		self.clear();
		let Some(id) = node else {
			return;
		};
		let Some(n) = graph.node(id) else {
			return;
		};
		self.focus = Focus::Node(id);
		self.nodes.insert(id);
		self.nodes.extend(n.neighbors.iter().copied());
		self.links.extend(n.links.iter().copied());
	}

	/// Hovering a link emphasizes the link and both of its endpoints.
	pub fn on_link_hover(&mut self, graph: &Graph, link: Option<LinkId>) {
		self.clear();
		let Some(id) = link else {
			return;
		};
		let Some(l) = graph.link(id) else {
			return;
		};
		self.focus = Focus::Link(id);
		self.links.insert(id);
		self.nodes.insert(l.source);
		self.nodes.insert(l.target);
	}

	fn clear(&mut self) {
		self.focus = Focus::Idle;
		self.nodes.clear();
		self.links.clear();
	}

	pub fn focus(&self) -> Focus {
		self.focus
	}

	pub fn is_idle(&self) -> bool {
		self.focus == Focus::Idle
	}

	pub fn node_highlighted(&self, id: NodeId) -> bool {
		self.nodes.contains(&id)
	}

	pub fn link_highlighted(&self, id: LinkId) -> bool {
		self.links.contains(&id)
	}
}
