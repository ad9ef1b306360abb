use std::cell::RefCell;
use std::rc::Rc;

use leptos::prelude::*;
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, MouseEvent, WheelEvent, Window};

use super::picking;
use super::render;
use super::state::RelationGraphState;
use super::types::Graph;

/// Pointer travel below this many pixels between press and release counts as
/// a click rather than a drag.
const CLICK_SLOP: f64 = 4.0;

type PickLayer = Option<(HtmlCanvasElement, CanvasRenderingContext2d)>;

#[component]
pub fn RelationGraphCanvas(
	#[prop(into)] data: Signal<Graph>,
	#[prop(default = false)] fullscreen: bool,
	#[prop(default = None)] width: Option<f64>,
	#[prop(default = None)] height: Option<f64>,
) -> impl IntoView {
	let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
	let state: Rc<RefCell<Option<RelationGraphState>>> = Rc::new(RefCell::new(None));
	let pick: Rc<RefCell<PickLayer>> = Rc::new(RefCell::new(None));
	let animate: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
	let resize_cb: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
	let (state_init, pick_init, animate_init, resize_cb_init) = (
		state.clone(),
		pick.clone(),
		animate.clone(),
		resize_cb.clone(),
	);

	Effect::new(move |_| {
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		let canvas: HtmlCanvasElement = canvas.into();
		let window: Window = web_sys::window().unwrap();

		let (w, h) = if fullscreen {
			(
				window.inner_width().unwrap().as_f64().unwrap(),
				window.inner_height().unwrap().as_f64().unwrap(),
			)
		} else {
			(
				width.unwrap_or_else(|| {
					canvas
						.parent_element()
						.map(|p| p.client_width() as f64)
						.unwrap_or(800.0)
				}),
				height.unwrap_or_else(|| {
					canvas
						.parent_element()
						.map(|p| p.client_height() as f64)
						.unwrap_or(600.0)
				}),
			)
		};
		canvas.set_width(w as u32);
		canvas.set_height(h as u32);

		let ctx: CanvasRenderingContext2d = canvas
			.get_context("2d")
			.unwrap()
			.unwrap()
			.dyn_into()
			.unwrap();

		// Hidden sibling canvas for pointer picking
		let document = window.document().unwrap();
		let pick_canvas: HtmlCanvasElement = document
			.create_element("canvas")
			.unwrap()
			.dyn_into()
			.unwrap();
		pick_canvas.set_width(w as u32);
		pick_canvas.set_height(h as u32);
		let pick_ctx: CanvasRenderingContext2d = pick_canvas
			.get_context("2d")
			.unwrap()
			.unwrap()
			.dyn_into()
			.unwrap();
		*pick_init.borrow_mut() = Some((pick_canvas, pick_ctx));

		*state_init.borrow_mut() = Some(RelationGraphState::new(data.get_untracked(), w, h));

		if fullscreen {
			let (state_resize, canvas_resize, pick_resize) =
				(state_init.clone(), canvas.clone(), pick_init.clone());
			*resize_cb_init.borrow_mut() = Some(Closure::new(move || {
				let win: Window = web_sys::window().unwrap();
				let (nw, nh) = (
					win.inner_width().unwrap().as_f64().unwrap(),
					win.inner_height().unwrap().as_f64().unwrap(),
				);
				canvas_resize.set_width(nw as u32);
				canvas_resize.set_height(nh as u32);
				if let Some((ref pc, _)) = *pick_resize.borrow() {
					pc.set_width(nw as u32);
					pc.set_height(nh as u32);
				}
				if let Some(ref mut s) = *state_resize.borrow_mut() {
					s.resize(nw, nh);
				}
			}));
			if let Some(ref cb) = *resize_cb_init.borrow() {
				let _ =
					window.add_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
			}
		}

		let (state_anim, pick_anim, animate_inner) =
			(state_init.clone(), pick_init.clone(), animate_init.clone());
		*animate_init.borrow_mut() = Some(Closure::new(move || {
			if let Some(ref mut s) = *state_anim.borrow_mut() {
				s.tick(0.016);
				render::render(s, &ctx);
				if let Some((_, ref pick_ctx)) = *pick_anim.borrow() {
					picking::paint(s, pick_ctx);
				}
			}
			if let Some(ref cb) = *animate_inner.borrow() {
				let _ = web_sys::window()
					.unwrap()
					.request_animation_frame(cb.as_ref().unchecked_ref());
			}
		}));
		if let Some(ref cb) = *animate_init.borrow() {
			let _ = window.request_animation_frame(cb.as_ref().unchecked_ref());
		}
	});

	// Swap in a freshly laid-out state whenever the graph data changes
	let state_data = state.clone();
	Effect::new(move |_| {
		let graph = data.get();
		if let Some(ref mut s) = *state_data.borrow_mut() {
			let (w, h) = (s.width, s.height);
			*s = RelationGraphState::new(graph, w, h);
		}
	});

	let event_coords = move |ev: &MouseEvent| {
		let canvas: HtmlCanvasElement = canvas_ref.get().unwrap().into();
		let rect = canvas.get_bounding_client_rect();
		(
			ev.client_x() as f64 - rect.left(),
			ev.client_y() as f64 - rect.top(),
		)
	};

	let (state_md, pick_md) = (state.clone(), pick.clone());
	let on_mousedown = move |ev: MouseEvent| {
		let (x, y) = event_coords(&ev);
		let picked = pick_md
			.borrow()
			.as_ref()
			.and_then(|(_, ctx)| picking::node_at(ctx, x, y));

		if let Some(ref mut s) = *state_md.borrow_mut() {
			let picked = picked.filter(|&i| i < s.graph.nodes.len());
			if let Some(i) = picked {
				if let Some((nx, ny)) = s.position(i) {
					s.drag.active = true;
					s.drag.node = Some(i);
					s.drag.start_x = x;
					s.drag.start_y = y;
					s.drag.node_start_x = nx as f32;
					s.drag.node_start_y = ny as f32;
				}
			} else {
				s.cancel_camera();
				s.pan.active = true;
				s.pan.start_x = x;
				s.pan.start_y = y;
				s.pan.start_cx = s.transform.cx;
				s.pan.start_cy = s.transform.cy;
			}
		}
	};

	let (state_mm, pick_mm) = (state.clone(), pick.clone());
	let on_mousemove = move |ev: MouseEvent| {
		let (x, y) = event_coords(&ev);
		let picked = pick_mm
			.borrow()
			.as_ref()
			.and_then(|(_, ctx)| picking::node_at(ctx, x, y));

		if let Some(ref mut s) = *state_mm.borrow_mut() {
			// Update hover state when not dragging or panning
			if !s.drag.active && !s.pan.active {
				let hovered = picked.filter(|&i| i < s.graph.nodes.len());
				if hovered.is_some() {
					s.set_node_hover(hovered);
				} else {
					match s.link_at_position(x, y) {
						Some(li) => s.set_link_hover(Some(li)),
						None => s.set_node_hover(None),
					}
				}
			}

			if s.drag.active {
				if let Some(i) = s.drag.node {
					let (dx, dy) = (
						(x - s.drag.start_x) / s.transform.k,
						(y - s.drag.start_y) / s.transform.k,
					);
					s.drag_node_to(
						i,
						s.drag.node_start_x + dx as f32,
						s.drag.node_start_y + dy as f32,
					);
				}
			} else if s.pan.active {
				s.transform.cx = s.pan.start_cx - (x - s.pan.start_x) / s.transform.k;
				s.transform.cy = s.pan.start_cy - (y - s.pan.start_y) / s.transform.k;
			}
		}
	};

	let state_mu = state.clone();
	let on_mouseup = move |ev: MouseEvent| {
		let (x, y) = event_coords(&ev);
		if let Some(ref mut s) = *state_mu.borrow_mut() {
			if s.drag.active {
				if let Some(i) = s.drag.node {
					let travel = (x - s.drag.start_x).hypot(y - s.drag.start_y);
					if travel < CLICK_SLOP {
						s.on_node_click(i);
					} else {
						s.on_node_drag_end(i);
					}
				}
			}
			s.drag.active = false;
			s.drag.node = None;
			s.pan.active = false;
		}
	};

	let state_ml = state.clone();
	let on_mouseleave = move |_: MouseEvent| {
		if let Some(ref mut s) = *state_ml.borrow_mut() {
			s.drag.active = false;
			s.drag.node = None;
			s.pan.active = false;
			s.set_node_hover(None);
		}
	};

	let state_wh = state.clone();
	let on_wheel = move |ev: WheelEvent| {
		ev.prevent_default();
		let canvas: HtmlCanvasElement = canvas_ref.get().unwrap().into();
		let rect = canvas.get_bounding_client_rect();
		let (x, y) = (
			ev.client_x() as f64 - rect.left(),
			ev.client_y() as f64 - rect.top(),
		);

		if let Some(ref mut s) = *state_wh.borrow_mut() {
			let factor = if ev.delta_y() > 0.0 { 0.9 } else { 1.1 };
			s.cancel_camera();
			s.zoom_at(x, y, factor);
		}
	};

	view! {
		<canvas
			node_ref=canvas_ref
			class="relation-graph-canvas"
			on:mousedown=on_mousedown
			on:mousemove=on_mousemove
			on:mouseup=on_mouseup
			on:mouseleave=on_mouseleave
			on:wheel=on_wheel
			style="display: block; cursor: grab;"
		/>
	}
}
