use rpg_engine::{
    Camera2D, Canvas, InputAction, InputSnapshot, Rect, Scene, SceneCommand, SceneContext, SceneId,
    Vec2,
};

use super::{follow_player, movement_step, PLAYER_COLOR, PLAYER_SIZE};
use crate::app::services::{Facing, GameServices};

const DUNGEON_BACKGROUND: [u8; 4] = [10, 10, 15, 255];
const FLOOR_COLOR: [u8; 4] = [28, 28, 36, 255];
const FLOOR_TILE: f32 = 32.0;

/// Free movement without a map or collision. Rebuilt on every entry.
pub(crate) struct DungeonScene {
    speed: f32,
    zoom: f32,
    services: GameServices,
    position: Option<Vec2>,
}

impl DungeonScene {
    pub(crate) fn new(speed: f32, zoom: f32, services: GameServices) -> Self {
        Self {
            speed,
            zoom,
            services,
            position: None,
        }
    }
}

impl Scene for DungeonScene {
    fn init(&mut self, ctx: &mut SceneContext<'_>) {
        let start = Vec2::new(
            ctx.viewport.width as f32 / 4.0,
            ctx.viewport.height as f32 / 4.0,
        );
        self.position = Some(start);
        follow_player(ctx.camera, start, ctx.viewport, self.zoom);
    }

    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        ctx: &mut SceneContext<'_>,
    ) -> SceneCommand {
        let Some(position) = self.position.as_mut() else {
            return SceneCommand::None;
        };
        if input.was_pressed(InputAction::Slot1) {
            return SceneCommand::SwitchTo(SceneId::Overworld);
        }

        let (dx, dy) = movement_step(input, self.speed, fixed_dt_seconds);
        if let Some(facing) = Facing::from_motion(dx, dy) {
            self.services.profile.borrow_mut().facing = facing;
        }
        position.x += dx;
        position.y += dy;
        follow_player(ctx.camera, *position, ctx.viewport, self.zoom);
        SceneCommand::None
    }

    fn draw(&mut self, canvas: &mut Canvas<'_>, camera: &Camera2D) {
        canvas.clear(DUNGEON_BACKGROUND);
        let Some(position) = self.position else {
            return;
        };
        // Checkerboard around the player so movement is visible.
        let origin_x = (position.x / FLOOR_TILE).floor() as i32;
        let origin_y = (position.y / FLOOR_TILE).floor() as i32;
        for ty in origin_y - 12..=origin_y + 12 {
            for tx in origin_x - 16..=origin_x + 16 {
                if (tx + ty).rem_euclid(2) == 0 {
                    let tile = Rect::new(
                        tx as f32 * FLOOR_TILE,
                        ty as f32 * FLOOR_TILE,
                        FLOOR_TILE,
                        FLOOR_TILE,
                    );
                    canvas.fill_world_rect(&tile, camera, FLOOR_COLOR);
                }
            }
        }
        let player = Rect::new(position.x, position.y, PLAYER_SIZE, PLAYER_SIZE);
        canvas.fill_world_rect(&player, camera, PLAYER_COLOR);
    }

    fn cleanup(&mut self, _ctx: &mut SceneContext<'_>) {
        self.position = None;
    }

    fn debug_title(&self) -> Option<String> {
        let position = self.position?;
        Some(format!(
            "Dungeon 1 | ({:.0}, {:.0}) | 1: overworld",
            position.x, position.y
        ))
    }
}
