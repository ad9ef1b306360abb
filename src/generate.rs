//! Graph-source interface and the generation flow. The text-to-graph
//! generator itself is an external service; this module owns the handle it is
//! driven through and the validation of what it returns.

use std::cell::Cell;

use log::info;
use thiserror::Error;

use crate::components::relation_graph::{Built, GraphError, RawGraph, build_graph, parse_raw_graph};

#[derive(Debug, Error)]
pub enum GenerateError {
	#[error("a generation request is already in flight")]
	Busy,
	#[error("graph source failed: {0}")]
	Source(String),
	#[error(transparent)]
	Graph(#[from] GraphError),
}

/// An external producer of raw graph data from free-form text.
pub trait GraphSource {
	async fn generate(&self, query: &str) -> Result<RawGraph, GenerateError>;
}

/// Caller-owned generation handle wrapping a [`GraphSource`]. Credential or
/// model changes mean building a new handle, never mutating a shared one.
/// Overlapping requests are refused: a second `generate` while one is in
/// flight fails fast with [`GenerateError::Busy`].
pub struct Generator<S> {
	source: S,
	busy: Cell<bool>,
}

impl<S: GraphSource> Generator<S> {
	pub fn new(source: S) -> Self {
		Self {
			source,
			busy: Cell::new(false),
		}
	}

	/// Run one query through the source and build the canonical graph from
	/// whatever it returns.
	pub async fn generate(&self, query: &str) -> Result<Built, GenerateError> {
		if self.busy.get() {
			return Err(GenerateError::Busy);
		}
		let _guard = BusyGuard::engage(&self.busy);

		info!("generating graph ({} chars of input)", query.len());
		let raw = self.source.generate(query).await?;
		Ok(build_graph(raw)?)
	}
}

/// Clears the busy flag when the request finishes or its future is dropped.
struct BusyGuard<'a>(&'a Cell<bool>);

impl<'a> BusyGuard<'a> {
	fn engage(flag: &'a Cell<bool>) -> Self {
		flag.set(true);
		Self(flag)
	}
}

impl Drop for BusyGuard<'_> {
	fn drop(&mut self) {
		self.0.set(false);
	}
}

/// Canned dataset standing in for the real text-to-graph service, run through
/// the same parse path its output would take.
pub struct FixtureSource;

const SAMPLE_GRAPH: &str = r#"{
	"nodes": [
		{ "id": 1, "label": "Ada Lovelace", "type": "person" },
		{ "id": 2, "label": "Charles Babbage", "type": "person" },
		{ "id": 3, "label": "Analytical Engine", "type": "machine" },
		{ "id": 4, "label": "Difference Engine", "type": "machine" },
		{ "id": 5, "label": "Note G", "type": "work" },
		{ "id": 6, "label": "Luigi Menabrea", "type": "person" },
		{ "id": 7, "label": "Bernoulli numbers", "type": "concept" },
		{ "id": 8, "label": "London", "type": "place" }
	],
	"links": [
		{ "source": 1, "target": 2, "type": "collaborated with" },
		{ "source": 2, "target": 1, "type": "corresponded with" },
		{ "source": 2, "target": 3, "type": "designed" },
		{ "source": 2, "target": 4, "type": "built" },
		{ "source": 1, "target": 5, "type": "wrote" },
		{ "source": 5, "target": 3, "type": "describes" },
		{ "source": 5, "target": 7, "type": "computes" },
		{ "source": 6, "target": 3, "type": "lectured on" },
		{ "source": 1, "target": 6, "type": "translated" },
		{ "source": 2, "target": 8, "type": "lived in" },
		{ "source": 1, "target": 8, "type": "lived in" }
	]
}"#;

impl GraphSource for FixtureSource {
	async fn generate(&self, _query: &str) -> Result<RawGraph, GenerateError> {
		parse_raw_graph(SAMPLE_GRAPH).map_err(|e| GenerateError::Source(e.to_string()))
	}
}

#[cfg(test)]
mod tests {
	use std::future::Future;
	use std::pin::{Pin, pin};
	use std::task::{Context, Poll, Waker};

	use super::*;

	fn poll_once<F: Future>(fut: &mut Pin<&mut F>) -> Poll<F::Output> {
		let mut cx = Context::from_waker(Waker::noop());
		fut.as_mut().poll(&mut cx)
	}

	/// Pending on the first poll, ready on the second.
	#[derive(Default)]
	struct PendOnce(bool);

	impl Future for PendOnce {
		type Output = ();

		fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
			if self.0 {
				Poll::Ready(())
			} else {
				self.0 = true;
				Poll::Pending
			}
		}
	}

	struct SlowSource;

	impl GraphSource for SlowSource {
		async fn generate(&self, _query: &str) -> Result<RawGraph, GenerateError> {
			PendOnce::default().await;
			Ok(RawGraph::default())
		}
	}

	#[test]
	fn fixture_builds_a_complete_graph() {
		let generator = Generator::new(FixtureSource);
		let mut fut = pin!(generator.generate("anything"));
		let Poll::Ready(Ok(built)) = poll_once(&mut fut) else {
			panic!("fixture generation should resolve immediately");
		};
		assert_eq!(built.graph.nodes.len(), 8);
		assert_eq!(built.graph.links.len(), 11);
		assert!(built.dropped.is_empty());
		// the parallel Ada/Babbage links fan apart
		assert_eq!(built.graph.links[0].curvature, 0.0);
		assert!(built.graph.links[1].curvature != 0.0);
	}

	#[test]
	fn overlapping_requests_are_refused() {
		let generator = Generator::new(SlowSource);

		let mut first = pin!(generator.generate("a"));
		assert!(poll_once(&mut first).is_pending());

		let mut second = pin!(generator.generate("b"));
		match poll_once(&mut second) {
			Poll::Ready(Err(GenerateError::Busy)) => {}
			other => panic!("expected Busy, got {other:?}"),
		}

		// the first request is unaffected and completes
		assert!(matches!(poll_once(&mut first), Poll::Ready(Ok(_))));

		// the handle is free again afterwards
		let mut third = pin!(generator.generate("c"));
		assert!(poll_once(&mut third).is_pending());
		assert!(matches!(poll_once(&mut third), Poll::Ready(Ok(_))));
	}

	#[test]
	fn dropping_an_inflight_request_frees_the_handle() {
		let generator = Generator::new(SlowSource);
		{
			let mut doomed = pin!(generator.generate("a"));
			assert!(poll_once(&mut doomed).is_pending());
		}
		let mut next = pin!(generator.generate("b"));
		assert!(poll_once(&mut next).is_pending());
	}
}
