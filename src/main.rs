//! Binary entry point: mounts the app into the document body.

use relation_graph_canvas::{App, init_logging};

fn main() {
	init_logging();
	leptos::mount::mount_to_body(App);
}
