use crate::geometry::Vec2;

pub const CAMERA_ZOOM_DEFAULT: f32 = 1.0;
pub const CAMERA_ZOOM_MIN: f32 = 0.5;
pub const CAMERA_ZOOM_MAX: f32 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width as f32 * 0.5, self.height as f32 * 0.5)
    }
}

/// World-space camera: `target` is drawn at screen position `offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera2D {
    pub target: Vec2,
    pub offset: Vec2,
    pub zoom: f32,
}

impl Default for Camera2D {
    fn default() -> Self {
        Self {
            target: Vec2::ZERO,
            offset: Vec2::ZERO,
            zoom: CAMERA_ZOOM_DEFAULT,
        }
    }
}

impl Camera2D {
    pub fn centered_on(target: Vec2, viewport: Viewport, zoom: f32) -> Self {
        Self {
            target,
            offset: viewport.center(),
            zoom: clamp_camera_zoom(zoom),
        }
    }

    pub fn effective_zoom(&self) -> f32 {
        clamp_camera_zoom(self.zoom)
    }

    pub fn world_to_screen(&self, world: Vec2) -> Vec2 {
        let zoom = self.effective_zoom();
        Vec2::new(
            (world.x - self.target.x) * zoom + self.offset.x,
            (world.y - self.target.y) * zoom + self.offset.y,
        )
    }

    pub fn screen_to_world(&self, screen: Vec2) -> Vec2 {
        let zoom = self.effective_zoom();
        Vec2::new(
            (screen.x - self.offset.x) / zoom + self.target.x,
            (screen.y - self.offset.y) / zoom + self.target.y,
        )
    }
}

fn clamp_camera_zoom(zoom: f32) -> f32 {
    if !zoom.is_finite() {
        return CAMERA_ZOOM_DEFAULT;
    }
    zoom.clamp(CAMERA_ZOOM_MIN, CAMERA_ZOOM_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_maps_to_offset() {
        let viewport = Viewport {
            width: 800,
            height: 600,
        };
        let camera = Camera2D::centered_on(Vec2::new(100.0, 50.0), viewport, 2.0);
        assert_eq!(camera.world_to_screen(Vec2::new(100.0, 50.0)), Vec2::new(400.0, 300.0));
        assert_eq!(camera.world_to_screen(Vec2::new(110.0, 45.0)), Vec2::new(420.0, 290.0));
    }

    #[test]
    fn screen_to_world_inverts_world_to_screen() {
        let camera = Camera2D {
            target: Vec2::new(-12.0, 30.0),
            offset: Vec2::new(160.0, 120.0),
            zoom: 1.5,
        };
        let world = Vec2::new(7.0, -3.0);
        let back = camera.screen_to_world(camera.world_to_screen(world));
        assert!((back.x - world.x).abs() < 1e-4);
        assert!((back.y - world.y).abs() < 1e-4);
    }

    #[test]
    fn zoom_is_clamped_and_non_finite_falls_back() {
        let viewport = Viewport {
            width: 64,
            height: 64,
        };
        let close = Camera2D::centered_on(Vec2::ZERO, viewport, 50.0);
        assert!((close.zoom - CAMERA_ZOOM_MAX).abs() < 0.0001);
        let far = Camera2D::centered_on(Vec2::ZERO, viewport, 0.1);
        assert!((far.zoom - CAMERA_ZOOM_MIN).abs() < 0.0001);

        let mut camera = Camera2D::default();
        camera.zoom = f32::NAN;
        assert_eq!(camera.effective_zoom(), CAMERA_ZOOM_DEFAULT);
    }
}
