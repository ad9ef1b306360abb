mod builder;
mod component;
mod highlight;
mod picking;
mod render;
mod state;
mod types;

pub use builder::{Built, DropReason, DroppedLink, GraphError, build_graph, parse_raw_graph};
pub use component::RelationGraphCanvas;
pub use types::{Graph, Link, LinkId, Node, NodeId, RawGraph, RawLink, RawNode};
