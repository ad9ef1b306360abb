//! Turns raw generator output into the canonical [`Graph`]: shape validation,
//! per-link curvature, category colors, and bidirectional adjacency.

use std::collections::HashMap;

use log::warn;
use thiserror::Error;

use super::types::{Graph, Link, Node, NodeId, RawGraph};

const PALETTE: &[&str] = &[
	"#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
	"#bcbd22", "#17becf",
];

/// Category bucket for nodes without a `type`, also the fallback returned by
/// link coloring when a source node is missing.
pub const FALLBACK_KIND: &str = "other";

/// Curvature gap between parallel links sharing an endpoint pair.
const CURVATURE_STEP: f64 = 0.3;

#[derive(Debug, Error)]
pub enum GraphError {
	#[error("malformed graph data: {0}")]
	Malformed(#[from] serde_json::Error),
	#[error("duplicate node id {0}")]
	DuplicateNode(NodeId),
}

/// Why a raw link was discarded during the build.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
	MissingNode(NodeId),
	SelfLoop,
}

#[derive(Clone, Debug)]
pub struct DroppedLink {
	pub source: NodeId,
	pub target: NodeId,
	pub reason: DropReason,
}

/// A built graph plus the links that had to be discarded to get there.
#[derive(Clone, Debug, Default)]
pub struct Built {
	pub graph: Graph,
	pub dropped: Vec<DroppedLink>,
}

/// Decode generator JSON into the raw shape. Optional fields may be absent;
/// anything else that does not fit the shape aborts with `Malformed`.
pub fn parse_raw_graph(json: &str) -> Result<RawGraph, GraphError> {
	Ok(serde_json::from_str(json)?)
}

/// Build the canonical graph. Duplicate node ids abort (the id space is what
/// link resolution stands on); dangling and self-loop links are dropped,
/// logged, and reported so the rest of the graph still renders.
pub fn build_graph(raw: RawGraph) -> Result<Built, GraphError> {
	let mut id_to_idx: HashMap<NodeId, usize> = HashMap::with_capacity(raw.nodes.len());
	let mut kind_slots: HashMap<String, usize> = HashMap::new();
	let mut nodes: Vec<Node> = Vec::with_capacity(raw.nodes.len());

	for rn in raw.nodes {
		if id_to_idx.contains_key(&rn.id) {
			return Err(GraphError::DuplicateNode(rn.id));
		}
		let kind_key = rn.kind.clone().unwrap_or_else(|| FALLBACK_KIND.into());
		let next = kind_slots.len();
		let slot = *kind_slots.entry(kind_key).or_insert(next);
		id_to_idx.insert(rn.id, nodes.len());
		nodes.push(Node {
			id: rn.id,
			label: rn.label,
			kind: rn.kind,
			color: PALETTE[slot % PALETTE.len()].into(),
			neighbors: Vec::new(),
			links: Vec::new(),
		});
	}

	let mut links: Vec<Link> = Vec::with_capacity(raw.links.len());
	let mut dropped: Vec<DroppedLink> = Vec::new();
	let mut pair_counts: HashMap<(NodeId, NodeId), usize> = HashMap::new();

	for rl in raw.links {
		if rl.source == rl.target {
			discard(
				&mut dropped,
				DroppedLink {
					source: rl.source,
					target: rl.target,
					reason: DropReason::SelfLoop,
				},
			);
			continue;
		}
		let (src, tgt) = match (id_to_idx.get(&rl.source), id_to_idx.get(&rl.target)) {
			(Some(&s), Some(&t)) => (s, t),
			(missing_src, _) => {
				let missing = if missing_src.is_none() {
					rl.source
				} else {
					rl.target
				};
				discard(
					&mut dropped,
					DroppedLink {
						source: rl.source,
						target: rl.target,
						reason: DropReason::MissingNode(missing),
					},
				);
				continue;
			}
		};

		let pair = if rl.source <= rl.target {
			(rl.source, rl.target)
		} else {
			(rl.target, rl.source)
		};
		let seen = pair_counts.entry(pair).or_insert(0);
		let curvature = fan_curvature(*seen);
		*seen += 1;

		let link_id = links.len();
		nodes[src].neighbors.push(rl.target);
		nodes[tgt].neighbors.push(rl.source);
		nodes[src].links.push(link_id);
		nodes[tgt].links.push(link_id);
		links.push(Link {
			source: rl.source,
			target: rl.target,
			kind: rl.kind,
			curvature,
		});
	}

	let kind_colors = kind_slots
		.into_iter()
		.map(|(kind, slot)| (kind, PALETTE[slot % PALETTE.len()].to_owned()))
		.collect();

	Ok(Built {
		graph: Graph::assemble(nodes, links, kind_colors),
		dropped,
	})
}

fn discard(list: &mut Vec<DroppedLink>, entry: DroppedLink) {
	warn!(
		"dropping link {} -> {}: {:?}",
		entry.source, entry.target, entry.reason
	);
	list.push(entry);
}

/// Curvature for the `n`th link between one endpoint pair: the first stays
/// straight, later ones fan out on alternating sides.
fn fan_curvature(n: usize) -> f64 {
	if n == 0 {
		return 0.0;
	}
	let side = if n % 2 == 1 { 1.0 } else { -1.0 };
	let rank = n.div_ceil(2) as f64;
	(side * rank * CURVATURE_STEP).clamp(-1.0, 1.0)
}
