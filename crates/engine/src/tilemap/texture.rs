use std::path::{Path, PathBuf};

use image::ImageReader;
use thiserror::Error;
use tracing::{debug, warn};

/// Decoded RGBA8 tileset image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl Texture {
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let bytes = self.rgba.get(offset..offset + 4)?;
        Some([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

#[derive(Debug, Error)]
pub enum TextureError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

pub fn load_texture(path: &Path) -> Result<Texture, TextureError> {
    let reader = ImageReader::open(path).map_err(|source| TextureError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let decoded = reader.decode().map_err(|source| TextureError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    let image = decoded.to_rgba8();
    Ok(Texture {
        width: image.width(),
        height: image.height(),
        rgba: image.into_raw(),
    })
}

/// Paths tried for a tileset image, in order: as written relative to the
/// tileset directory, the bare file name, then the lowercased file name.
pub fn texture_candidates(image: &str, base_dir: &Path) -> Vec<PathBuf> {
    let normalized = image.replace('\\', "/");
    let file_name = normalized.rsplit('/').next().unwrap_or(normalized.as_str());
    let lowered = file_name.to_lowercase();

    let mut candidates = Vec::with_capacity(3);
    for candidate in [
        base_dir.join(&normalized),
        base_dir.join(file_name),
        base_dir.join(&lowered),
    ] {
        if !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    }
    candidates
}

/// Loads the first candidate that exists and decodes; `None` marks the
/// tileset as missing its texture.
pub fn load_tileset_texture(image: &str, base_dir: &Path) -> Option<Texture> {
    for candidate in texture_candidates(image, base_dir) {
        if !candidate.is_file() {
            continue;
        }
        match load_texture(&candidate) {
            Ok(texture) => {
                debug!(
                    path = %candidate.display(),
                    width = texture.width,
                    height = texture.height,
                    "tileset_texture_loaded"
                );
                return Some(texture);
            }
            Err(error) => {
                warn!(error = %error, "tileset_texture_decode_failed");
            }
        }
    }
    warn!(
        image = image,
        base_dir = %base_dir.display(),
        "tileset_texture_missing"
    );
    None
}
