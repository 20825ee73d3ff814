use crate::geometry::{Rect, Vec2};

use super::{Camera2D, Viewport};

/// RGBA8 frame buffer view with clipped drawing helpers.
pub struct Canvas<'a> {
    frame: &'a mut [u8],
    width: u32,
    height: u32,
}

impl<'a> Canvas<'a> {
    pub fn new(frame: &'a mut [u8], width: u32, height: u32) -> Self {
        Self {
            frame,
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn viewport(&self) -> Viewport {
        Viewport {
            width: self.width,
            height: self.height,
        }
    }

    pub fn clear(&mut self, color: [u8; 4]) {
        for pixel in self.frame.chunks_exact_mut(4) {
            pixel.copy_from_slice(&color);
        }
    }

    pub fn pixel(&self, x: i32, y: i32) -> Option<[u8; 4]> {
        let offset = self.byte_offset(x, y)?;
        let bytes = self.frame.get(offset..offset + 4)?;
        Some([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    pub fn write_pixel(&mut self, x: i32, y: i32, color: [u8; 4]) {
        let Some(offset) = self.byte_offset(x, y) else {
            return;
        };
        if let Some(dst) = self.frame.get_mut(offset..offset + 4) {
            dst.copy_from_slice(&color);
        }
    }

    /// Source-over blend of `color` onto the pixel at `(x, y)`.
    pub fn blend_pixel(&mut self, x: i32, y: i32, color: [u8; 4]) {
        let alpha = u32::from(color[3]);
        if alpha == 0 {
            return;
        }
        if alpha == 255 {
            self.write_pixel(x, y, color);
            return;
        }
        let Some(offset) = self.byte_offset(x, y) else {
            return;
        };
        let Some(dst) = self.frame.get_mut(offset..offset + 4) else {
            return;
        };
        let inv = 255 - alpha;
        for channel in 0..3 {
            let blended = (u32::from(color[channel]) * alpha + u32::from(dst[channel]) * inv) / 255;
            dst[channel] = blended as u8;
        }
        dst[3] = (alpha + u32::from(dst[3]) * inv / 255).min(255) as u8;
    }

    pub fn fill_rect(&mut self, x: i32, y: i32, width: i32, height: i32, color: [u8; 4]) {
        let left = x.max(0);
        let top = y.max(0);
        let right = x.saturating_add(width).min(self.width as i32);
        let bottom = y.saturating_add(height).min(self.height as i32);
        for py in top..bottom {
            for px in left..right {
                self.blend_pixel(px, py, color);
            }
        }
    }

    /// One-pixel outline covering `[x, x + width)` by `[y, y + height)`.
    pub fn outline_rect(&mut self, x: i32, y: i32, width: i32, height: i32, color: [u8; 4]) {
        if width <= 0 || height <= 0 {
            return;
        }
        let right = x + width - 1;
        let bottom = y + height - 1;
        for px in x..=right {
            self.write_pixel(px, y, color);
            self.write_pixel(px, bottom, color);
        }
        for py in y..=bottom {
            self.write_pixel(x, py, color);
            self.write_pixel(right, py, color);
        }
    }

    pub fn fill_world_rect(&mut self, rect: &Rect, camera: &Camera2D, color: [u8; 4]) {
        let (x, y, w, h) = world_rect_to_screen(rect, camera);
        self.fill_rect(x, y, w, h, color);
    }

    pub fn outline_world_rect(&mut self, rect: &Rect, camera: &Camera2D, color: [u8; 4]) {
        let (x, y, w, h) = world_rect_to_screen(rect, camera);
        self.outline_rect(x, y, w, h, color);
    }

    fn byte_offset(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        let pixel_offset = (y as usize)
            .checked_mul(self.width as usize)?
            .checked_add(x as usize)?;
        let byte_offset = pixel_offset.checked_mul(4)?;
        if byte_offset.checked_add(4)? > self.frame.len() {
            return None;
        }
        Some(byte_offset)
    }
}

fn world_rect_to_screen(rect: &Rect, camera: &Camera2D) -> (i32, i32, i32, i32) {
    let top_left = camera.world_to_screen(rect.position());
    let bottom_right = camera.world_to_screen(Vec2::new(rect.right(), rect.bottom()));
    let x = top_left.x.round() as i32;
    let y = top_left.y.round() as i32;
    (
        x,
        y,
        (bottom_right.x.round() as i32 - x).max(1),
        (bottom_right.y.round() as i32 - y).max(1),
    )
}
