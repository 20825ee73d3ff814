use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{info, warn};

use super::texture::load_tileset_texture;
use super::{
    AnimationFrame, MapObject, ObjectLayer, RenderLayer, TileAnimation, TileLayer, TileMap,
    TileMapError, Tileset,
};

#[derive(Debug, Deserialize)]
struct RawMap {
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
    #[serde(default)]
    tilewidth: u32,
    #[serde(default)]
    tileheight: u32,
    #[serde(default)]
    tilesets: Vec<RawTilesetEntry>,
    #[serde(default)]
    layers: Vec<RawLayer>,
}

#[derive(Debug, Deserialize)]
struct RawTilesetEntry {
    #[serde(default)]
    firstgid: u32,
    #[serde(default)]
    source: Option<String>,
    #[serde(flatten)]
    embedded: RawTileset,
}

#[derive(Debug, Default, Deserialize)]
struct RawTileset {
    #[serde(default)]
    tilewidth: u32,
    #[serde(default)]
    tileheight: u32,
    #[serde(default)]
    columns: u32,
    #[serde(default)]
    tilecount: u32,
    #[serde(default)]
    margin: u32,
    #[serde(default)]
    spacing: u32,
    #[serde(default)]
    imagewidth: u32,
    #[serde(default)]
    imageheight: u32,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    tiles: Vec<RawTile>,
}

#[derive(Debug, Deserialize)]
struct RawTile {
    id: u32,
    #[serde(default)]
    animation: Vec<RawFrame>,
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    tileid: u32,
    duration: u32,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum RawLayer {
    #[serde(rename = "tilelayer")]
    Tile(RawTileLayer),
    #[serde(rename = "objectgroup")]
    Object(RawObjectLayer),
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct RawTileLayer {
    #[serde(default)]
    name: String,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
    #[serde(default)]
    data: Vec<u32>,
    #[serde(default = "default_true")]
    visible: bool,
    #[serde(default = "default_opacity")]
    opacity: f32,
    #[serde(default)]
    properties: Vec<RawProperty>,
}

#[derive(Debug, Deserialize)]
struct RawObjectLayer {
    #[serde(default)]
    name: String,
    #[serde(default = "default_true")]
    visible: bool,
    #[serde(default)]
    objects: Vec<RawObject>,
}

#[derive(Debug, Deserialize)]
struct RawObject {
    #[serde(default)]
    id: u32,
    #[serde(default)]
    name: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    class: Option<String>,
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
    #[serde(default)]
    width: f32,
    #[serde(default)]
    height: f32,
    #[serde(default)]
    rotation: f32,
    #[serde(default = "default_true")]
    visible: bool,
    #[serde(default)]
    properties: Vec<RawProperty>,
}

#[derive(Debug, Deserialize)]
struct RawProperty {
    name: String,
    #[serde(default)]
    value: serde_json::Value,
}

fn default_true() -> bool {
    true
}

fn default_opacity() -> f32 {
    1.0
}

fn string_property<'a>(properties: &'a [RawProperty], name: &str) -> Option<&'a str> {
    properties
        .iter()
        .find(|property| property.name == name)
        .and_then(|property| property.value.as_str())
}

fn int_property(properties: &[RawProperty], name: &str) -> Option<i32> {
    let value = &properties.iter().find(|property| property.name == name)?.value;
    match value {
        serde_json::Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|v| v as i64))
            .and_then(|v| i32::try_from(v).ok()),
        serde_json::Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Loads a map document and every tileset it references.
pub fn load_map(path: &Path) -> Result<TileMap, TileMapError> {
    let text = read_text(path)?;
    let raw: RawMap = parse_json(path, &text)?;
    let base_dir = parent_dir(path);

    let tilesets = raw
        .tilesets
        .into_iter()
        .map(|entry| resolve_tileset(entry, &base_dir))
        .collect::<Vec<_>>();

    let mut tile_layers = Vec::new();
    let mut object_layers = Vec::new();
    for layer in raw.layers {
        match layer {
            RawLayer::Tile(layer) => tile_layers.push(convert_tile_layer(layer)),
            RawLayer::Object(layer) => object_layers.push(convert_object_layer(layer)),
            RawLayer::Other => {}
        }
    }

    let map = TileMap {
        width: raw.width,
        height: raw.height,
        tile_width: raw.tilewidth,
        tile_height: raw.tileheight,
        tilesets,
        tile_layers,
        object_layers,
        ..TileMap::default()
    };
    info!(
        path = %path.display(),
        width = map.width,
        height = map.height,
        tilesets = map.tilesets.len(),
        tile_layers = map.tile_layers.len(),
        object_layers = map.object_layers.len(),
        "tilemap_loaded"
    );
    Ok(map)
}

fn read_text(path: &Path) -> Result<String, TileMapError> {
    fs::read_to_string(path).map_err(|source| TileMapError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_json<T: DeserializeOwned>(path: &Path, text: &str) -> Result<T, TileMapError> {
    let fixed = fix_json_backslashes(text);
    let mut deserializer = serde_json::Deserializer::from_str(&fixed);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|error| {
        let json_path = error.path().to_string();
        TileMapError::Parse {
            path: path.to_path_buf(),
            json_path,
            source: error.into_inner(),
        }
    })
}

/// Rewrites backslashes that do not start a valid JSON escape to `/`, so
/// Windows paths written unescaped by map editors still parse.
pub(crate) fn fix_json_backslashes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.peek().copied() {
            Some(next) if matches!(next, '"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't' | 'u') => {
                out.push('\\');
                out.push(next);
                chars.next();
            }
            _ => out.push('/'),
        }
    }
    out
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

/// Normalizes separators, strips a leading `./` and prefers the `.tsj`
/// sibling of a `.tsx` reference.
pub(crate) fn external_tileset_path(source: &str, base_dir: &Path) -> PathBuf {
    let normalized = source.replace('\\', "/");
    let trimmed = normalized.strip_prefix("./").unwrap_or(&normalized);
    let path = base_dir.join(trimmed);
    if path.extension().is_some_and(|ext| ext == "tsx") {
        path.with_extension("tsj")
    } else {
        path
    }
}

fn resolve_tileset(entry: RawTilesetEntry, map_dir: &Path) -> Tileset {
    let first_gid = entry.firstgid;
    let Some(source) = entry.source else {
        return build_tileset(first_gid, entry.embedded, map_dir);
    };

    let json_path = external_tileset_path(&source, map_dir);
    let loaded = if json_path.is_file() {
        read_text(&json_path)
            .and_then(|text| parse_json::<RawTileset>(&json_path, &text))
            .map(|raw| build_tileset(first_gid, raw, &parent_dir(&json_path)))
    } else {
        let xml_path = json_path.with_extension("tsx");
        if xml_path.is_file() {
            read_text(&xml_path)
                .and_then(|text| parse_tileset_xml(&xml_path, &text))
                .map(|raw| build_tileset(first_gid, raw, &parent_dir(&xml_path)))
        } else {
            Err(TileMapError::Read {
                path: json_path.clone(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
        }
    };

    match loaded {
        Ok(tileset) => tileset,
        Err(error) => {
            warn!(error = %error, first_gid, "external_tileset_load_failed");
            Tileset {
                first_gid,
                ..Tileset::default()
            }
        }
    }
}

fn build_tileset(first_gid: u32, raw: RawTileset, base_dir: &Path) -> Tileset {
    let mut animations = HashMap::new();
    for tile in raw.tiles {
        let frames = tile
            .animation
            .into_iter()
            .map(|frame| AnimationFrame {
                tile_id: frame.tileid,
                duration_ms: frame.duration,
            })
            .collect();
        let Some(animation) = TileAnimation::new(frames) else {
            continue;
        };
        if raw.tilecount == 0 || tile.id < raw.tilecount {
            animations.insert(tile.id, animation);
        }
    }

    let texture = raw
        .image
        .as_deref()
        .and_then(|image| load_tileset_texture(image, base_dir));

    Tileset {
        first_gid,
        tile_width: raw.tilewidth,
        tile_height: raw.tileheight,
        columns: raw.columns,
        tile_count: raw.tilecount,
        margin: raw.margin,
        spacing: raw.spacing,
        image_width: raw.imagewidth,
        image_height: raw.imageheight,
        image: raw.image,
        texture,
        animations,
    }
}

fn parse_tileset_xml(path: &Path, text: &str) -> Result<RawTileset, TileMapError> {
    let doc = Document::parse(text).map_err(|source| TileMapError::Xml {
        path: path.to_path_buf(),
        source,
    })?;
    let root = doc.root_element();
    let required = |node: Node<'_, '_>, attribute: &'static str| -> Result<u32, TileMapError> {
        node.attribute(attribute)
            .and_then(|value| value.parse().ok())
            .ok_or_else(|| TileMapError::XmlAttribute {
                path: path.to_path_buf(),
                attribute,
            })
    };
    let optional = |node: Node<'_, '_>, attribute: &str| -> u32 {
        node.attribute(attribute)
            .and_then(|value| value.parse().ok())
            .unwrap_or(0)
    };

    let mut raw = RawTileset {
        tilewidth: required(root, "tilewidth")?,
        tileheight: required(root, "tileheight")?,
        columns: required(root, "columns")?,
        tilecount: required(root, "tilecount")?,
        margin: optional(root, "margin"),
        spacing: optional(root, "spacing"),
        ..RawTileset::default()
    };

    for child in root.children().filter(|node| node.is_element()) {
        if child.has_tag_name("image") {
            raw.image = child.attribute("source").map(str::to_string);
            raw.imagewidth = optional(child, "width");
            raw.imageheight = optional(child, "height");
        } else if child.has_tag_name("tile") {
            let id = required(child, "id")?;
            let mut animation = Vec::new();
            for frames in child.children().filter(|node| node.has_tag_name("animation")) {
                for frame in frames.children().filter(|node| node.has_tag_name("frame")) {
                    animation.push(RawFrame {
                        tileid: required(frame, "tileid")?,
                        duration: required(frame, "duration")?,
                    });
                }
            }
            raw.tiles.push(RawTile { id, animation });
        }
    }
    Ok(raw)
}

fn convert_tile_layer(raw: RawTileLayer) -> TileLayer {
    let expected = raw.width as usize * raw.height as usize;
    let mut data = raw.data;
    if data.len() != expected {
        warn!(
            layer = %raw.name,
            expected,
            actual = data.len(),
            "tile_layer_data_size_mismatch"
        );
        data.resize(expected, 0);
    }
    TileLayer {
        render_layer: string_property(&raw.properties, "render_layer")
            .map(RenderLayer::from_property)
            .unwrap_or_default(),
        shader: string_property(&raw.properties, "shader").map(str::to_string),
        elevation: int_property(&raw.properties, "elevation").unwrap_or(0),
        name: raw.name,
        width: raw.width,
        height: raw.height,
        data,
        visible: raw.visible,
        opacity: raw.opacity.clamp(0.0, 1.0),
    }
}

fn convert_object_layer(raw: RawObjectLayer) -> ObjectLayer {
    ObjectLayer {
        name: raw.name,
        visible: raw.visible,
        objects: raw.objects.into_iter().map(convert_object).collect(),
    }
}

fn convert_object(raw: RawObject) -> MapObject {
    MapObject {
        elevation: int_property(&raw.properties, "elevation").unwrap_or(0),
        from_elevation: int_property(&raw.properties, "from_elevation").unwrap_or(0),
        to_elevation: int_property(&raw.properties, "to_elevation").unwrap_or(0),
        id: raw.id,
        name: raw.name,
        kind: raw.kind.or(raw.class).unwrap_or_default(),
        x: raw.x,
        y: raw.y,
        width: raw.width,
        height: raw.height,
        rotation: raw.rotation,
        visible: raw.visible,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use serde_json::json;
    use tempfile::TempDir;

    fn write_json(path: &Path, value: &serde_json::Value) {
        fs::write(path, serde_json::to_string_pretty(value).expect("json")).expect("write");
    }

    fn write_png(path: &Path) {
        RgbaImage::from_pixel(32, 32, Rgba([200, 0, 0, 255]))
            .save(path)
            .expect("save png");
    }

    fn sample_map(tilesets: serde_json::Value) -> serde_json::Value {
        json!({
            "width": 2,
            "height": 2,
            "tilewidth": 16,
            "tileheight": 16,
            "tilesets": tilesets,
            "layers": [
                {
                    "type": "tilelayer",
                    "name": "ground",
                    "width": 2,
                    "height": 2,
                    "data": [1, 2, 2147483651u32, 0],
                    "properties": [
                        { "name": "render_layer", "type": "string", "value": "above_player" },
                        { "name": "shader", "type": "string", "value": "water" },
                        { "name": "elevation", "type": "int", "value": 1 }
                    ]
                },
                { "type": "group", "name": "ignored", "layers": [] },
                {
                    "type": "objectgroup",
                    "name": "collision",
                    "objects": [
                        { "id": 1, "name": "wall", "type": "wall", "x": 0, "y": 0, "width": 16, "height": 16 },
                        {
                            "id": 2, "name": "stairs", "class": "elevation_ramp",
                            "x": 16, "y": 0, "width": 16, "height": 16, "rotation": 0,
                            "properties": [
                                { "name": "from_elevation", "type": "int", "value": 0 },
                                { "name": "to_elevation", "type": "int", "value": 1 }
                            ]
                        }
                    ]
                }
            ]
        })
    }

    #[test]
    fn loads_embedded_tileset_layers_and_properties() {
        let temp = TempDir::new().expect("tempdir");
        write_png(&temp.path().join("tiles.png"));
        let map_path = temp.path().join("map.tmj");
        write_json(
            &map_path,
            &sample_map(json!([{
                "firstgid": 1, "tilewidth": 16, "tileheight": 16, "columns": 2,
                "tilecount": 4, "image": "tiles.png", "imagewidth": 32, "imageheight": 32,
                "tiles": [{ "id": 1, "animation": [
                    { "tileid": 1, "duration": 100 }, { "tileid": 3, "duration": 100 }
                ]}]
            }])),
        );

        let map = load_map(&map_path).expect("map loads");
        assert_eq!((map.width, map.height, map.tile_width), (2, 2, 16));
        assert_eq!(map.tilesets.len(), 1);
        assert!(map.tilesets[0].texture.is_some());
        assert!(map.tilesets[0].animation(1).is_some());
        assert!(map.tilesets[0].animation(0).is_none());

        assert_eq!(map.tile_layers.len(), 1);
        let layer = &map.tile_layers[0];
        assert_eq!(layer.render_layer, RenderLayer::AbovePlayer);
        assert_eq!(layer.shader.as_deref(), Some("water"));
        assert_eq!(layer.elevation, 1);
        assert_eq!(layer.data[2], 0x8000_0003);
        assert!(layer.visible);

        let objects = &map.object_layers[0].objects;
        assert_eq!(objects[0].kind, "wall");
        assert_eq!(objects[1].kind, "elevation_ramp");
        assert_eq!((objects[1].from_elevation, objects[1].to_elevation), (0, 1));
    }

    #[test]
    fn oversized_tilecount_loads_with_sparse_animations() {
        let temp = TempDir::new().expect("tempdir");
        let map_path = temp.path().join("map.tmj");
        write_json(
            &map_path,
            &sample_map(json!([{
                "firstgid": 1, "tilewidth": 16, "tileheight": 16, "columns": 2,
                "tilecount": 4_000_000_000u32,
                "tiles": [{ "id": 3_999_999_999u32, "animation": [
                    { "tileid": 0, "duration": 50 }
                ]}]
            }])),
        );

        let map = load_map(&map_path).expect("map loads");
        let tileset = &map.tilesets[0];
        assert_eq!(tileset.tile_count, 4_000_000_000);
        assert_eq!(tileset.animations.len(), 1);
        assert!(tileset.animation(3_999_999_999).is_some());
    }

    #[test]
    fn external_tsx_reference_prefers_tsj_and_keeps_map_first_gid() {
        let temp = TempDir::new().expect("tempdir");
        let tileset_dir = temp.path().join("sets");
        fs::create_dir_all(&tileset_dir).expect("mkdir");
        write_png(&tileset_dir.join("terrain.png"));
        write_json(
            &tileset_dir.join("terrain.tsj"),
            &json!({
                "firstgid": 99, "tilewidth": 16, "tileheight": 16, "columns": 2,
                "tilecount": 4, "image": "C:\\art\\Terrain.png"
            }),
        );
        let map_path = temp.path().join("map.tmj");
        write_json(
            &map_path,
            &sample_map(json!([{ "firstgid": 5, "source": ".\\sets\\terrain.tsx" }])),
        );

        let map = load_map(&map_path).expect("map loads");
        let tileset = &map.tilesets[0];
        assert_eq!(tileset.first_gid, 5);
        assert_eq!(tileset.columns, 2);
        assert!(tileset.texture.is_some(), "bare lowercase file name fallback");
    }

    #[test]
    fn falls_back_to_tsx_xml_when_no_json_sibling() {
        let temp = TempDir::new().expect("tempdir");
        write_png(&temp.path().join("overworld.png"));
        fs::write(
            temp.path().join("overworld.tsx"),
            r#"<?xml version="1.0" encoding="UTF-8"?>
<tileset name="overworld" tilewidth="16" tileheight="16" tilecount="4" columns="2">
 <image source="../../gfx/Overworld.png" width="32" height="32"/>
 <tile id="2">
  <animation>
   <frame tileid="2" duration="100"/>
   <frame tileid="3" duration="150"/>
  </animation>
 </tile>
</tileset>"#,
        )
        .expect("write tsx");
        let map_path = temp.path().join("map.tmj");
        write_json(
            &map_path,
            &sample_map(json!([{ "firstgid": 1, "source": "overworld.tsx" }])),
        );

        let map = load_map(&map_path).expect("map loads");
        let tileset = &map.tilesets[0];
        assert_eq!(tileset.tile_count, 4);
        assert!(tileset.texture.is_some());
        let animation = tileset.animation(2).expect("animation");
        assert_eq!(animation.total_duration_ms, 250);
    }

    #[test]
    fn unreadable_external_tileset_degrades_to_empty_tileset() {
        let temp = TempDir::new().expect("tempdir");
        let map_path = temp.path().join("map.tmj");
        write_json(
            &map_path,
            &sample_map(json!([{ "firstgid": 7, "source": "missing.tsj" }])),
        );

        let map = load_map(&map_path).expect("map still loads");
        assert_eq!(map.tilesets[0].first_gid, 7);
        assert_eq!(map.tilesets[0].columns, 0);
        assert!(map.tilesets[0].texture.is_none());
    }

    #[test]
    fn malformed_map_reports_json_path() {
        let temp = TempDir::new().expect("tempdir");
        let map_path = temp.path().join("map.tmj");
        write_json(
            &map_path,
            &json!({ "width": 1, "height": 1, "layers": [
                { "type": "tilelayer", "name": "g", "width": 1, "height": 1, "data": ["x"] }
            ]}),
        );

        let error = load_map(&map_path).expect_err("bad data");
        match error {
            TileMapError::Parse { json_path, .. } => assert!(json_path.contains("layers")),
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(
            load_map(&temp.path().join("absent.tmj")),
            Err(TileMapError::Read { .. })
        ));
    }

    #[test]
    fn backslash_fix_keeps_valid_escapes() {
        assert_eq!(fix_json_backslashes(r#""a\\b""#), r#""a\\b""#);
        assert_eq!(fix_json_backslashes(r#""C:\art\Tiles.png""#), r#""C:/art/Tiles.png""#);
        assert_eq!(fix_json_backslashes(r#""line\n""#), r#""line\n""#);
    }

    #[test]
    fn external_path_normalizes_separators_and_extension() {
        let base = Path::new("maps");
        assert_eq!(
            external_tileset_path(".\\sets\\a.tsx", base),
            base.join("sets/a.tsj")
        );
        assert_eq!(external_tileset_path("b.tsj", base), base.join("b.tsj"));
    }

    #[test]
    fn short_layer_data_is_padded_with_empty_cells() {
        let layer = convert_tile_layer(RawTileLayer {
            name: "g".to_string(),
            width: 2,
            height: 2,
            data: vec![1],
            visible: true,
            opacity: 2.0,
            properties: Vec::new(),
        });
        assert_eq!(layer.data, vec![1, 0, 0, 0]);
        assert_eq!(layer.opacity, 1.0);
        assert_eq!(layer.render_layer, RenderLayer::Ground);
    }
}
