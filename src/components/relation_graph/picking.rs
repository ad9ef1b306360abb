//! Off-screen pointer picking. Every node's badge is painted onto a hidden
//! canvas in a unique solid color; reading the pixel under the pointer maps
//! screen coordinates back to a node index.

use web_sys::CanvasRenderingContext2d;

use super::render;
use super::state::RelationGraphState;

/// Pick color for the node at position `i` in the graph's node list. Index 0
/// of the color space is reserved for the background.
pub fn pick_color(i: usize) -> String {
	let v = (i as u32 + 1) & 0x00FF_FFFF;
	format!("#{v:06x}")
}

/// Inverse of [`pick_color`]. Background pixels decode to `None`.
pub fn decode(r: u8, g: u8, b: u8) -> Option<usize> {
	let v = (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b);
	if v == 0 { None } else { Some((v - 1) as usize) }
}

/// Repaint the pick canvas for this frame. Relies on the badge cache filled
/// by the label pass; nodes without a cached badge are skipped.
pub fn paint(state: &RelationGraphState, ctx: &CanvasRenderingContext2d) {
	ctx.set_fill_style_str("#000000");
	ctx.fill_rect(0.0, 0.0, state.width, state.height);

	ctx.save();
	let (tx, ty) = state.translation();
	let _ = ctx.translate(tx, ty);
	let _ = ctx.scale(state.transform.k, state.transform.k);

	for (i, node) in state.graph.nodes.iter().enumerate() {
		let Some((x, y)) = state.position(i) else {
			continue;
		};
		render::paint_node_pointer_area(node.id, x, y, &pick_color(i), ctx, state.badge_cache());
	}
	ctx.restore();
}

/// Node index under the given screen coordinates, if any.
pub fn node_at(ctx: &CanvasRenderingContext2d, sx: f64, sy: f64) -> Option<usize> {
	let pixel = ctx.get_image_data(sx, sy, 1.0, 1.0).ok()?.data();
	decode(pixel[0], pixel[1], pixel[2])
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn colors_round_trip_through_the_pixel_encoding() {
		for i in [0usize, 1, 9, 255, 256, 65535, 1_000_000] {
			let color = pick_color(i);
			let r = u8::from_str_radix(&color[1..3], 16).unwrap();
			let g = u8::from_str_radix(&color[3..5], 16).unwrap();
			let b = u8::from_str_radix(&color[5..7], 16).unwrap();
			assert_eq!(decode(r, g, b), Some(i));
		}
	}

	#[test]
	fn first_node_is_not_the_background() {
		assert_eq!(pick_color(0), "#000001");
		assert_eq!(decode(0, 0, 0), None);
	}
}
