use leptos::prelude::*;
use log::{error, warn};

use crate::components::relation_graph::{Graph, RelationGraphCanvas};
use crate::generate::{FixtureSource, Generator};

/// Default Home Page
#[component]
pub fn Home() -> impl IntoView {
	let (graph, set_graph) = signal(Graph::default());
	let (loading, set_loading) = signal(true);

	// One generation request on load; the handle refuses overlapping runs,
	// so a re-trigger while this is pending would surface as Busy.
	leptos::task::spawn_local(async move {
		let generator = Generator::new(FixtureSource);
		match generator.generate("demo dataset").await {
			Ok(built) => {
				if !built.dropped.is_empty() {
					warn!("{} links discarded during build", built.dropped.len());
				}
				set_graph.set(built.graph);
			}
			Err(e) => error!("graph generation failed: {e}"),
		}
		set_loading.set(false);
	});

	view! {
		<ErrorBoundary fallback=|errors| {
			view! {
				<h1>"Uh oh! Something went wrong!"</h1>

				<p>"Errors: "</p>
				<ul>
					{move || {
						errors
							.get()
							.into_iter()
							.map(|(_, e)| view! { <li>{e.to_string()}</li> })
							.collect_view()
					}}
				</ul>
			}
		}>

			<div class="fullscreen-graph">
				<RelationGraphCanvas data=graph fullscreen=true />
				<div class="graph-overlay">
					<h1>"Relation Graph"</h1>
					<p class="subtitle">
						"Hover nodes and links to explore connections. Click a node to fly to it. Drag to pin, scroll to zoom."
					</p>
					<Show when=move || loading.get()>
						<p class="loading">"Generating graph…"</p>
					</Show>
				</div>
			</div>
		</ErrorBoundary>
	}
}
