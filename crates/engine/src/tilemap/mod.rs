mod draw;
mod gid;
mod loader;
mod texture;

use std::collections::HashMap;
use std::path::PathBuf;

use thiserror::Error;

pub use draw::{
    draw_all, draw_layer, draw_layer_tinted, layer_draws, visible_tile_range, TileDraw, TileRange,
};
pub use gid::{
    pack, unpack, FlipFlags, QuarterTurn, TileOrientation, FLIP_DIAGONAL, FLIP_HORIZONTAL,
    FLIP_VERTICAL, GID_MASK,
};
pub use loader::load_map;
pub use texture::{load_tileset_texture, texture_candidates, Texture, TextureError};

pub const ELEVATION_RAMP_TYPE: &str = "elevation_ramp";

#[derive(Debug, Error)]
pub enum TileMapError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path} at {json_path}: {source}")]
    Parse {
        path: PathBuf,
        json_path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to parse tileset xml {path}: {source}")]
    Xml {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },
    #[error("tileset xml {path} is missing required attribute {attribute}")]
    XmlAttribute {
        path: PathBuf,
        attribute: &'static str,
    },
}

/// Coarse draw pass a tile layer belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RenderLayer {
    #[default]
    Ground,
    BelowPlayer,
    Player,
    AbovePlayer,
}

impl RenderLayer {
    pub const ALL: [RenderLayer; 4] = [
        RenderLayer::Ground,
        RenderLayer::BelowPlayer,
        RenderLayer::Player,
        RenderLayer::AbovePlayer,
    ];

    /// Unknown names fall back to the ground pass.
    pub fn from_property(value: &str) -> Self {
        match value {
            "ground" => RenderLayer::Ground,
            "below_player" => RenderLayer::BelowPlayer,
            "player" => RenderLayer::Player,
            "above_player" => RenderLayer::AbovePlayer,
            _ => RenderLayer::Ground,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationFrame {
    pub tile_id: u32,
    pub duration_ms: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileAnimation {
    pub frames: Vec<AnimationFrame>,
    pub total_duration_ms: u32,
}

impl TileAnimation {
    pub fn new(frames: Vec<AnimationFrame>) -> Option<Self> {
        let total_duration_ms = frames.iter().map(|frame| frame.duration_ms).sum::<u32>();
        if frames.is_empty() || total_duration_ms == 0 {
            return None;
        }
        Some(Self {
            frames,
            total_duration_ms,
        })
    }

    /// Local tile id shown at `clock_ms`, or `None` for an empty animation.
    pub fn frame_at(&self, clock_ms: f64) -> Option<u32> {
        if self.total_duration_ms == 0 {
            return self.frames.first().map(|frame| frame.tile_id);
        }
        let mut t = (clock_ms.max(0.0) as u64 % u64::from(self.total_duration_ms)) as u32;
        for frame in &self.frames {
            if t < frame.duration_ms {
                return Some(frame.tile_id);
            }
            t -= frame.duration_ms;
        }
        self.frames.last().map(|frame| frame.tile_id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Tileset {
    pub first_gid: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub columns: u32,
    pub tile_count: u32,
    pub margin: u32,
    pub spacing: u32,
    pub image_width: u32,
    pub image_height: u32,
    pub image: Option<String>,
    /// `None` when no candidate image path could be loaded.
    pub texture: Option<Texture>,
    /// Keyed by local tile id; tiles without an entry are static.
    pub animations: HashMap<u32, TileAnimation>,
}

impl Tileset {
    pub fn animation(&self, local_id: u32) -> Option<&TileAnimation> {
        self.animations.get(&local_id)
    }

    /// False for ids past `tile_count`. A tileset with no declared count
    /// accepts every id.
    pub fn has_local(&self, local_id: u32) -> bool {
        self.tile_count == 0 || local_id < self.tile_count
    }

    /// Pixel origin of a local tile inside the tileset image.
    pub fn source_origin(&self, local_id: u32) -> Option<(u32, u32)> {
        if self.columns == 0 {
            return None;
        }
        let col = local_id % self.columns;
        let row = local_id / self.columns;
        let x = col
            .checked_mul(self.tile_width.checked_add(self.spacing)?)?
            .checked_add(self.margin)?;
        let y = row
            .checked_mul(self.tile_height.checked_add(self.spacing)?)?
            .checked_add(self.margin)?;
        Some((x, y))
    }
}

#[derive(Debug, Clone)]
pub struct TileLayer {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u32>,
    pub visible: bool,
    pub opacity: f32,
    pub render_layer: RenderLayer,
    pub elevation: i32,
    pub shader: Option<String>,
}

impl TileLayer {
    pub fn gid_at(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get((y * self.width + x) as usize).copied()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapObject {
    pub id: u32,
    pub name: String,
    pub kind: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub rotation: f32,
    pub visible: bool,
    pub elevation: i32,
    pub from_elevation: i32,
    pub to_elevation: i32,
}

impl MapObject {
    pub fn rect(&self) -> crate::geometry::Rect {
        crate::geometry::Rect::new(self.x, self.y, self.width, self.height)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ObjectLayer {
    pub name: String,
    pub visible: bool,
    pub objects: Vec<MapObject>,
}

#[derive(Debug, Clone, Default)]
pub struct TileMap {
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub tilesets: Vec<Tileset>,
    pub tile_layers: Vec<TileLayer>,
    pub object_layers: Vec<ObjectLayer>,
    /// Shared animation clock in milliseconds.
    pub anim_clock_ms: f64,
}

impl TileMap {
    /// Map size in world pixels.
    pub fn pixel_size(&self) -> (f32, f32) {
        (
            (self.width * self.tile_width) as f32,
            (self.height * self.tile_height) as f32,
        )
    }

    /// Tileset owning a masked gid: the last one whose first gid does not exceed it.
    pub fn tileset_for_gid(&self, gid: u32) -> Option<(usize, &Tileset)> {
        if gid == 0 {
            return None;
        }
        self.tilesets
            .iter()
            .enumerate()
            .rev()
            .find(|(_, tileset)| tileset.first_gid <= gid)
    }

    pub fn object_layer(&self, name: &str) -> Option<&ObjectLayer> {
        self.object_layers.iter().find(|layer| layer.name == name)
    }

    pub fn find_object(&self, layer_name: &str, kind: &str) -> Option<&MapObject> {
        self.object_layer(layer_name)?
            .objects
            .iter()
            .find(|object| object.kind == kind)
    }

    /// Indices of the tile layers drawn in `pass`, in map order.
    pub fn layers_in_pass(&self, pass: RenderLayer) -> impl Iterator<Item = usize> + '_ {
        self.tile_layers
            .iter()
            .enumerate()
            .filter(move |(_, layer)| layer.render_layer == pass)
            .map(|(index, _)| index)
    }

    /// Advances the shared animation clock.
    pub fn update(&mut self, dt_seconds: f32) {
        if dt_seconds.is_finite() && dt_seconds > 0.0 {
            self.anim_clock_ms += f64::from(dt_seconds) * 1000.0;
        }
    }
}
