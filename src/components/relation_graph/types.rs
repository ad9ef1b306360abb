use std::collections::HashMap;

use serde::Deserialize;

/// Stable integer identity of a node, as emitted by the graph source.
pub type NodeId = i64;

/// Index of a link in [`Graph::links`]. Links carry no external id.
pub type LinkId = usize;

/// Node record as the external text-to-graph generator emits it.
#[derive(Clone, Debug, Deserialize)]
pub struct RawNode {
	pub id: NodeId,
	pub label: String,
	#[serde(default, rename = "type")]
	pub kind: Option<String>,
}

/// Link record as the external text-to-graph generator emits it.
#[derive(Clone, Debug, Deserialize)]
pub struct RawLink {
	pub source: NodeId,
	pub target: NodeId,
	#[serde(default, rename = "type")]
	pub kind: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawGraph {
	pub nodes: Vec<RawNode>,
	pub links: Vec<RawLink>,
}

#[derive(Clone, Debug)]
pub struct Node {
	pub id: NodeId,
	pub label: String,
	pub kind: Option<String>,
	pub color: String,
	/// Ids of nodes one link away, in link order. May repeat for parallel links.
	pub neighbors: Vec<NodeId>,
	/// Indices of links touching this node, in link order.
	pub links: Vec<LinkId>,
}

#[derive(Clone, Debug)]
pub struct Link {
	pub source: NodeId,
	pub target: NodeId,
	pub kind: Option<String>,
	/// Bend factor in [-1, 1]; 0 renders as a straight line.
	pub curvature: f64,
}

/// The canonical renderable graph. Immutable once built; node positions live
/// in the layout engine, never here.
#[derive(Clone, Debug, Default)]
pub struct Graph {
	pub nodes: Vec<Node>,
	pub links: Vec<Link>,
	index: HashMap<NodeId, usize>,
	kind_colors: HashMap<String, String>,
}

impl Graph {
	pub(super) fn assemble(
		nodes: Vec<Node>,
		links: Vec<Link>,
		kind_colors: HashMap<String, String>,
	) -> Self {
		let index = nodes
			.iter()
			.enumerate()
			.map(|(i, n)| (n.id, i))
			.collect();
		Self {
			nodes,
			links,
			index,
			kind_colors,
		}
	}

	pub fn node(&self, id: NodeId) -> Option<&Node> {
		self.index.get(&id).map(|&i| &self.nodes[i])
	}

	pub fn node_index(&self, id: NodeId) -> Option<usize> {
		self.index.get(&id).copied()
	}

	pub fn link(&self, id: LinkId) -> Option<&Link> {
		self.links.get(id)
	}

	/// Palette color assigned to a node category during the build.
	pub fn kind_color(&self, kind: &str) -> Option<&str> {
		self.kind_colors.get(kind).map(String::as_str)
	}
}
