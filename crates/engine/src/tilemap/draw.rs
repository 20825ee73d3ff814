use crate::app::{Camera2D, Canvas, Viewport};
use crate::geometry::Vec2;

use super::gid::{unpack, TileOrientation};
use super::{TileMap, Tileset};

const WHITE: [u8; 4] = [255, 255, 255, 255];

/// Half-open range of tile cells, already clamped to the layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub x_start: u32,
    pub x_end: u32,
    pub y_start: u32,
    pub y_end: u32,
}

impl TileRange {
    pub fn is_empty(&self) -> bool {
        self.x_start >= self.x_end || self.y_start >= self.y_end
    }
}

/// One resolved tile ready to be drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileDraw {
    pub tileset: usize,
    pub local_id: u32,
    pub cell_x: u32,
    pub cell_y: u32,
    /// Top-left of the tile inside the tileset image.
    pub src: (u32, u32),
    /// Top-left of the destination cell in world pixels.
    pub dst: Vec2,
    pub orientation: TileOrientation,
}

/// Cells visible through the camera with one tile of margin on each side.
pub fn visible_tile_range(
    map: &TileMap,
    layer_index: usize,
    camera: &Camera2D,
    viewport: Viewport,
) -> Option<TileRange> {
    let layer = map.tile_layers.get(layer_index)?;
    if map.tile_width == 0 || map.tile_height == 0 {
        return None;
    }
    let zoom = camera.effective_zoom();
    let Vec2 { x: cam_x, y: cam_y } = camera.screen_to_world(Vec2::ZERO);
    let view_w = viewport.width as f32 / zoom;
    let view_h = viewport.height as f32 / zoom;
    let tw = map.tile_width as f32;
    let th = map.tile_height as f32;

    let start_x = (cam_x / tw) as i64 - 1;
    let start_y = (cam_y / th) as i64 - 1;
    let end_x = ((cam_x + view_w) / tw) as i64 + 2;
    let end_y = ((cam_y + view_h) / th) as i64 + 2;

    let range = TileRange {
        x_start: start_x.clamp(0, i64::from(layer.width)) as u32,
        x_end: end_x.clamp(0, i64::from(layer.width)) as u32,
        y_start: start_y.clamp(0, i64::from(layer.height)) as u32,
        y_end: end_y.clamp(0, i64::from(layer.height)) as u32,
    };
    Some(range)
}

/// Resolves every non-empty cell in `range`. Animated tiles are replaced by
/// their current frame. Ids outside their tileset and tilesets without
/// columns are skipped.
pub fn layer_draws(map: &TileMap, layer_index: usize, range: TileRange) -> Vec<TileDraw> {
    let Some(layer) = map.tile_layers.get(layer_index) else {
        return Vec::new();
    };
    let mut draws = Vec::new();
    if range.is_empty() {
        return draws;
    }

    for y in range.y_start..range.y_end {
        for x in range.x_start..range.x_end {
            let Some(raw) = layer.gid_at(x, y) else {
                continue;
            };
            let (gid, flags) = unpack(raw);
            let Some((tileset_index, tileset)) = map.tileset_for_gid(gid) else {
                continue;
            };
            let base_id = gid - tileset.first_gid;
            if !tileset.has_local(base_id) {
                continue;
            }
            let local_id = current_frame(tileset, base_id, map.anim_clock_ms);
            if !tileset.has_local(local_id) {
                continue;
            }
            let Some(src) = tileset.source_origin(local_id) else {
                continue;
            };
            draws.push(TileDraw {
                tileset: tileset_index,
                local_id,
                cell_x: x,
                cell_y: y,
                src,
                dst: Vec2::new(
                    x as f32 * map.tile_width as f32,
                    y as f32 * map.tile_height as f32,
                ),
                orientation: TileOrientation::from_flags(flags),
            });
        }
    }
    draws
}

fn current_frame(tileset: &Tileset, local_id: u32, clock_ms: f64) -> u32 {
    tileset
        .animation(local_id)
        .and_then(|animation| animation.frame_at(clock_ms))
        .unwrap_or(local_id)
}

/// Draws a tile layer with its opacity applied as alpha.
pub fn draw_layer(canvas: &mut Canvas<'_>, map: &TileMap, layer_index: usize, camera: &Camera2D) {
    let Some(layer) = map.tile_layers.get(layer_index) else {
        return;
    };
    let alpha = (layer.opacity.clamp(0.0, 1.0) * 255.0) as u8;
    draw_layer_tinted(canvas, map, layer_index, camera, [255, 255, 255, alpha]);
}

pub fn draw_layer_tinted(
    canvas: &mut Canvas<'_>,
    map: &TileMap,
    layer_index: usize,
    camera: &Camera2D,
    tint: [u8; 4],
) {
    let Some(layer) = map.tile_layers.get(layer_index) else {
        return;
    };
    if !layer.visible || tint[3] == 0 {
        return;
    }
    let Some(range) = visible_tile_range(map, layer_index, camera, canvas.viewport()) else {
        return;
    };

    for draw in layer_draws(map, layer_index, range) {
        let tileset = &map.tilesets[draw.tileset];
        if tileset.texture.is_none() {
            continue;
        }
        blit_tile(canvas, map, tileset, &draw, camera, tint);
    }
}

/// Draws every tile layer in map order.
pub fn draw_all(canvas: &mut Canvas<'_>, map: &TileMap, camera: &Camera2D) {
    for index in 0..map.tile_layers.len() {
        draw_layer(canvas, map, index, camera);
    }
}

fn blit_tile(
    canvas: &mut Canvas<'_>,
    map: &TileMap,
    tileset: &Tileset,
    draw: &TileDraw,
    camera: &Camera2D,
    tint: [u8; 4],
) {
    let Some(texture) = tileset.texture.as_ref() else {
        return;
    };
    let (map_tw, map_th) = (map.tile_width, map.tile_height);
    if map_tw == 0 || map_th == 0 || tileset.tile_width == 0 || tileset.tile_height == 0 {
        return;
    }

    let (origin_dx, origin_dy) = draw.orientation.footprint_origin(map_tw, map_th);
    let (foot_w, foot_h) = draw.orientation.footprint(map_tw, map_th);
    let world_origin = Vec2::new(
        draw.dst.x + origin_dx as f32,
        draw.dst.y + origin_dy as f32,
    );
    let zoom = camera.effective_zoom();
    let screen_origin = camera.world_to_screen(world_origin);

    let left = screen_origin.x.floor() as i32;
    let top = screen_origin.y.floor() as i32;
    let right = (screen_origin.x + foot_w as f32 * zoom).ceil() as i32;
    let bottom = (screen_origin.y + foot_h as f32 * zoom).ceil() as i32;
    let draw_left = left.max(0);
    let draw_top = top.max(0);
    let draw_right = right.min(canvas.width() as i32);
    let draw_bottom = bottom.min(canvas.height() as i32);
    if draw_left >= draw_right || draw_top >= draw_bottom {
        return;
    }

    for sy in draw_top..draw_bottom {
        let fy = ((sy as f32 + 0.5 - screen_origin.y) / zoom).floor();
        if fy < 0.0 || fy >= foot_h as f32 {
            continue;
        }
        for sx in draw_left..draw_right {
            let fx = ((sx as f32 + 0.5 - screen_origin.x) / zoom).floor();
            if fx < 0.0 || fx >= foot_w as f32 {
                continue;
            }
            let (u, v) = draw.orientation.sample(fx as u32, fy as u32, map_tw, map_th);
            let tex_x = draw.src.0.saturating_add(u * tileset.tile_width / map_tw);
            let tex_y = draw.src.1.saturating_add(v * tileset.tile_height / map_th);
            let Some(texel) = texture.pixel(tex_x, tex_y) else {
                continue;
            };
            canvas.blend_pixel(sx, sy, modulate(texel, tint));
        }
    }
}

fn modulate(color: [u8; 4], tint: [u8; 4]) -> [u8; 4] {
    if tint == WHITE {
        return color;
    }
    let channel = |c: u8, t: u8| ((u16::from(c) * u16::from(t)) / 255) as u8;
    [
        channel(color[0], tint[0]),
        channel(color[1], tint[1]),
        channel(color[2], tint[2]),
        channel(color[3], tint[3]),
    ]
}
