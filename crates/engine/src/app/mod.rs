mod input;
mod loop_runner;
mod metrics;
mod rendering;
mod scene;

pub use input::{InputAction, InputSnapshot};
pub use loop_runner::{run_app, AppError, LoopConfig};
pub use metrics::LoopMetricsSnapshot;
pub use rendering::{
    Camera2D, Canvas, Renderer, Viewport, CAMERA_ZOOM_DEFAULT, CAMERA_ZOOM_MAX, CAMERA_ZOOM_MIN,
    CLEAR_COLOR,
};
pub use scene::{
    BusWiring, Scene, SceneCommand, SceneContext, SceneId, SceneManager, SceneRegistry, TickReport,
};
