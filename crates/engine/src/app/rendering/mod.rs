mod canvas;
mod renderer;
mod transform;

pub use canvas::Canvas;
pub use renderer::Renderer;
pub use transform::{Camera2D, Viewport, CAMERA_ZOOM_DEFAULT, CAMERA_ZOOM_MAX, CAMERA_ZOOM_MIN};

pub const CLEAR_COLOR: [u8; 4] = [20, 22, 28, 255];
