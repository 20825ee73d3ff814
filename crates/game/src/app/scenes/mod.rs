mod battle;
mod dungeon;
mod menu;
mod overworld;
mod settings;

use rpg_engine::{Camera2D, Canvas, InputSnapshot, SceneId, SceneRegistry, Vec2, Viewport};

use super::config::GameConfig;
use super::services::GameServices;

pub(crate) use battle::BattlePhase;

use battle::BattleScene;
use dungeon::DungeonScene;
use menu::MenuScene;
use overworld::{OverworldScene, OverworldSettings};
use settings::SettingsScene;

pub(crate) const PLAYER_SIZE: f32 = 16.0;
/// Entity id carried as `subject` by events about the player.
pub(crate) const PLAYER_ENTITY_ID: i32 = 1;

const PLAYER_COLOR: [u8; 4] = [240, 200, 80, 255];
const MENU_BACKGROUND: [u8; 4] = [20, 20, 40, 255];
const HIGHLIGHT_COLOR: [u8; 4] = [253, 249, 0, 255];
const IDLE_COLOR: [u8; 4] = [200, 200, 200, 255];
const FRAME_COLOR: [u8; 4] = [255, 255, 255, 255];
const TRACK_COLOR: [u8; 4] = [80, 80, 80, 255];

pub(crate) fn build_registry(config: &GameConfig, services: &GameServices) -> SceneRegistry {
    SceneRegistry::new()
        .with(SceneId::Menu, Box::new(MenuScene::default()))
        .with(
            SceneId::Overworld,
            Box::new(OverworldScene::new(
                OverworldSettings::from_config(config),
                services.clone(),
            )),
        )
        .with(
            SceneId::Dungeon1,
            Box::new(DungeonScene::new(
                config.player_speed,
                config.camera_zoom,
                services.clone(),
            )),
        )
        .with(SceneId::Settings, Box::new(SettingsScene::new(services.clone())))
        .with(SceneId::Battle, Box::new(BattleScene::new(services.clone())))
}

/// Displacement for one tick from the held direction keys. Diagonal motion
/// is normalized so it covers the same distance as straight motion.
pub(crate) fn movement_step(input: &InputSnapshot, speed: f32, dt_seconds: f32) -> (f32, f32) {
    let (x, y) = input.move_axis();
    if x == 0.0 && y == 0.0 {
        return (0.0, 0.0);
    }
    let step = speed * dt_seconds / (x * x + y * y).sqrt();
    (x * step, y * step)
}

fn follow_player(camera: &mut Camera2D, position: Vec2, viewport: Viewport, zoom: f32) {
    let half = PLAYER_SIZE * 0.5;
    *camera = Camera2D::centered_on(
        Vec2::new(position.x + half, position.y + half),
        viewport,
        zoom,
    );
}

fn cycle(index: usize, len: usize, forward: bool) -> usize {
    if len == 0 {
        return 0;
    }
    if forward {
        (index + 1) % len
    } else {
        (index + len - 1) % len
    }
}

/// Stacked option bars centred on screen, the selected one highlighted.
fn draw_option_rows(canvas: &mut Canvas<'_>, count: usize, selected: Option<usize>) {
    const ROW_WIDTH: i32 = 200;
    const ROW_HEIGHT: i32 = 24;
    const ROW_GAP: i32 = 12;

    let total = count as i32 * (ROW_HEIGHT + ROW_GAP) - ROW_GAP;
    let x = (canvas.width() as i32 - ROW_WIDTH) / 2;
    let mut y = (canvas.height() as i32 - total) / 2;
    for index in 0..count {
        let color = if selected == Some(index) {
            HIGHLIGHT_COLOR
        } else {
            IDLE_COLOR
        };
        canvas.fill_rect(x, y, ROW_WIDTH, ROW_HEIGHT, color);
        y += ROW_HEIGHT + ROW_GAP;
    }
}

/// Horizontal gauge filled to `ratio` (clamped to 0..=1).
fn draw_gauge(canvas: &mut Canvas<'_>, x: i32, y: i32, width: i32, ratio: f32, fill: [u8; 4]) {
    const GAUGE_HEIGHT: i32 = 16;
    let ratio = if ratio.is_finite() {
        ratio.clamp(0.0, 1.0)
    } else {
        0.0
    };
    canvas.fill_rect(x, y, width, GAUGE_HEIGHT, TRACK_COLOR);
    canvas.fill_rect(x, y, (width as f32 * ratio) as i32, GAUGE_HEIGHT, fill);
    canvas.outline_rect(x, y, width, GAUGE_HEIGHT, FRAME_COLOR);
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::{Path, PathBuf};

    use rpg_engine::{
        Camera2D, Event, EventBus, EventKind, InputAction, InputSnapshot, SceneContext, Viewport,
    };

    pub(crate) struct Harness {
        pub(crate) bus: EventBus,
        pub(crate) camera: Camera2D,
        pub(crate) viewport: Viewport,
        pub(crate) asset_root: PathBuf,
    }

    impl Harness {
        pub(crate) fn new(asset_root: &Path) -> Self {
            Self {
                bus: EventBus::new(),
                camera: Camera2D::default(),
                viewport: Viewport {
                    width: 64,
                    height: 64,
                },
                asset_root: asset_root.to_path_buf(),
            }
        }

        pub(crate) fn ctx(&mut self) -> SceneContext<'_> {
            SceneContext {
                bus: &mut self.bus,
                camera: &mut self.camera,
                viewport: self.viewport,
                asset_root: &self.asset_root,
            }
        }

        /// Flushes the bus and returns the dispatched events of `kind`.
        pub(crate) fn drain(&mut self, kind: EventKind) -> Vec<Event> {
            let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
            let sink = std::rc::Rc::clone(&seen);
            let id = self
                .bus
                .subscribe(kind, move |event, _| sink.borrow_mut().push(event.clone()))
                .expect("subscribe");
            self.bus.flush();
            self.bus.unsubscribe(kind, id);
            let events = seen.borrow().clone();
            events
        }
    }

    pub(crate) fn idle() -> InputSnapshot {
        InputSnapshot::empty(64, 64)
    }

    pub(crate) fn pressed(action: InputAction) -> InputSnapshot {
        idle().with_pressed(action)
    }

    pub(crate) fn held(action: InputAction) -> InputSnapshot {
        idle().with_down(action)
    }
}
