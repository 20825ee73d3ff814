use rpg_engine::tilemap::draw_layer;
use rpg_engine::{
    load_map, BodyHandle, BodyKind, BodyTag, Camera2D, Canvas, CollisionWorld, ElevationRampSet,
    Event, EventKind, InputAction, InputSnapshot, RampTracker, Rect, RenderLayer, Scene,
    SceneCommand, SceneContext, SceneId, TileMap, Vec2,
};
use tracing::{info, warn};

use super::{follow_player, movement_step, PLAYER_COLOR, PLAYER_ENTITY_ID, PLAYER_SIZE};
use crate::app::config::GameConfig;
use crate::app::services::{Facing, GameServices};

pub(crate) const PLAYER_SPAWN_TYPE: &str = "player_spawn";
const FALLBACK_SPAWN: Vec2 = Vec2::new(400.0, 300.0);
const OVERWORLD_BACKGROUND: [u8; 4] = [0, 0, 0, 255];

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct OverworldSettings {
    pub(crate) map_file: String,
    pub(crate) collision_layer: String,
    pub(crate) ramp_layer: String,
    pub(crate) spawn_layer: String,
    pub(crate) player_speed: f32,
    pub(crate) camera_zoom: f32,
    pub(crate) debug_collision: bool,
}

impl OverworldSettings {
    pub(crate) fn from_config(config: &GameConfig) -> Self {
        Self {
            map_file: config.overworld_map.clone(),
            collision_layer: config.collision_layer.clone(),
            ramp_layer: config.ramp_layer.clone(),
            spawn_layer: config.spawn_layer.clone(),
            player_speed: config.player_speed,
            camera_zoom: config.camera_zoom,
            debug_collision: config.debug_collision,
        }
    }
}

struct OverworldState {
    map: Option<TileMap>,
    world: CollisionWorld,
    ramps: ElevationRampSet,
    ramp_tracker: RampTracker,
    player: Option<BodyHandle>,
    position: Vec2,
    elevation: i32,
}

impl OverworldState {
    /// Limits a step so the player box stays inside the map.
    fn clamp_step(&self, dx: f32, dy: f32) -> (f32, f32) {
        let Some(map) = &self.map else {
            return (dx, dy);
        };
        let (width, height) = map.pixel_size();
        let max_x = (width - PLAYER_SIZE).max(0.0);
        let max_y = (height - PLAYER_SIZE).max(0.0);
        let x = (self.position.x + dx).clamp(0.0, max_x);
        let y = (self.position.y + dy).clamp(0.0, max_y);
        (x - self.position.x, y - self.position.y)
    }

    fn player_rect(&self) -> Rect {
        Rect::new(self.position.x, self.position.y, PLAYER_SIZE, PLAYER_SIZE)
    }
}

/// Map exploration with collision and elevation ramps. State survives trips
/// to other scenes and is only rebuilt by a full reset.
pub(crate) struct OverworldScene {
    settings: OverworldSettings,
    services: GameServices,
    state: Option<OverworldState>,
}

impl OverworldScene {
    pub(crate) fn new(settings: OverworldSettings, services: GameServices) -> Self {
        Self {
            settings,
            services,
            state: None,
        }
    }

    fn load_state(&self, ctx: &SceneContext<'_>) -> OverworldState {
        let path = ctx.asset_root.join(&self.settings.map_file);
        let map = match load_map(&path) {
            Ok(map) => Some(map),
            Err(error) => {
                warn!(error = %error, path = %path.display(), "overworld_map_unavailable");
                None
            }
        };

        let position = match &map {
            Some(map) => match map.find_object(&self.settings.spawn_layer, PLAYER_SPAWN_TYPE) {
                Some(marker) => Vec2::new(marker.x, marker.y),
                None => {
                    let (width, height) = map.pixel_size();
                    Vec2::new(width * 0.5, height * 0.5)
                }
            },
            None => FALLBACK_SPAWN,
        };

        let mut world = CollisionWorld::new();
        world.debug_draw = self.settings.debug_collision;
        let player_rect = Rect::new(position.x, position.y, PLAYER_SIZE, PLAYER_SIZE);
        let player = match world.add_body(
            player_rect,
            BodyKind::Kinematic,
            BodyTag::Player,
            0,
            Some(PLAYER_ENTITY_ID as u64),
        ) {
            Ok(handle) => Some(handle),
            Err(error) => {
                warn!(error = %error, "player_body_unavailable");
                None
            }
        };

        let mut ramps = ElevationRampSet::new();
        if let Some(map) = &map {
            world.load_from_map(map, &self.settings.collision_layer);
            ramps.load_from_map(map, &self.settings.ramp_layer);
        }

        info!(
            x = position.x,
            y = position.y,
            bodies = world.len(),
            ramps = ramps.len(),
            "overworld_ready"
        );
        OverworldState {
            map,
            world,
            ramps,
            ramp_tracker: RampTracker::default(),
            player,
            position,
            elevation: 0,
        }
    }
}

impl Scene for OverworldScene {
    fn persistent(&self) -> bool {
        true
    }

    fn init(&mut self, ctx: &mut SceneContext<'_>) {
        self.services.profile.borrow_mut().restore_full_hp();
        let state = self.load_state(ctx);
        follow_player(
            ctx.camera,
            state.position,
            ctx.viewport,
            self.settings.camera_zoom,
        );
        self.state = Some(state);
    }

    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        ctx: &mut SceneContext<'_>,
    ) -> SceneCommand {
        let Some(state) = self.state.as_mut() else {
            return SceneCommand::None;
        };

        if input.was_pressed(InputAction::ToggleDebug) {
            state.world.debug_draw = !state.world.debug_draw;
        }
        if input.was_pressed(InputAction::Slot1) {
            return SceneCommand::SwitchTo(SceneId::Dungeon1);
        }
        if input.was_pressed(InputAction::Slot2) {
            return SceneCommand::SwitchTo(SceneId::Battle);
        }

        if let Some(map) = state.map.as_mut() {
            map.update(fixed_dt_seconds);
        }

        let (dx, dy) = movement_step(input, self.settings.player_speed, fixed_dt_seconds);
        if let Some(facing) = Facing::from_motion(dx, dy) {
            self.services.profile.borrow_mut().facing = facing;
        }

        let (dx, dy) = state.clamp_step(dx, dy);
        state.position = match state.player {
            Some(handle) => state
                .world
                .move_and_slide(handle, dx, dy)
                .unwrap_or(state.position),
            None => Vec2::new(state.position.x + dx, state.position.y + dy),
        };

        if let Some(handle) = state.player {
            if let Some(elevation) = state.ramp_tracker.apply(&state.ramps, &mut state.world, handle) {
                state.elevation = elevation;
                ctx.bus.emit_or_drop(
                    Event::new(EventKind::ZoneEnter)
                        .with_subject(PLAYER_ENTITY_ID)
                        .with_target(elevation)
                        .with_position(state.position),
                );
            }
        }

        follow_player(
            ctx.camera,
            state.position,
            ctx.viewport,
            self.settings.camera_zoom,
        );
        SceneCommand::None
    }

    fn draw(&mut self, canvas: &mut Canvas<'_>, camera: &Camera2D) {
        canvas.clear(OVERWORLD_BACKGROUND);
        let Some(state) = &self.state else {
            return;
        };
        for pass in RenderLayer::ALL {
            if let Some(map) = &state.map {
                for index in map.layers_in_pass(pass) {
                    draw_layer(canvas, map, index, camera);
                }
            }
            if pass == RenderLayer::Player {
                canvas.fill_world_rect(&state.player_rect(), camera, PLAYER_COLOR);
            }
        }
        state.world.draw_debug(canvas, camera);
    }

    fn cleanup(&mut self, _ctx: &mut SceneContext<'_>) {
        self.state = None;
    }

    fn debug_title(&self) -> Option<String> {
        let state = self.state.as_ref()?;
        let profile = self.services.profile.borrow();
        Some(format!(
            "Overworld | ({:.0}, {:.0}) elev {} | HP {}/{} | 1: dungeon 2: battle F3: collisions F6: reset",
            state.position.x,
            state.position.y,
            state.elevation,
            profile.hp,
            profile.max_hp
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use rpg_engine::EventPayload;
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::app::scenes::test_support::{held, idle, pressed, Harness};
    use crate::app::services::PLAYER_BASE_HP;

    const MAP_FILE: &str = "overworld.tmj";

    fn settings() -> OverworldSettings {
        OverworldSettings {
            map_file: MAP_FILE.to_string(),
            ..OverworldSettings::from_config(&GameConfig::default())
        }
    }

    fn write_map(dir: &Path) {
        let map = json!({
            "width": 10,
            "height": 10,
            "tilewidth": 16,
            "tileheight": 16,
            "layers": [
                {
                    "type": "objectgroup",
                    "name": "objects_collision",
                    "objects": [
                        { "id": 1, "type": "wall", "x": 48, "y": 0, "width": 16, "height": 160 },
                        {
                            "id": 2, "type": "elevation_ramp",
                            "x": 16, "y": 32, "width": 16, "height": 16,
                            "properties": [
                                { "name": "from_elevation", "type": "int", "value": 0 },
                                { "name": "to_elevation", "type": "int", "value": 1 }
                            ]
                        }
                    ]
                },
                {
                    "type": "objectgroup",
                    "name": "objects_spawn",
                    "objects": [
                        { "id": 3, "type": "player_spawn", "x": 16, "y": 16 }
                    ]
                }
            ]
        });
        fs::write(dir.join(MAP_FILE), map.to_string()).expect("write map");
    }

    fn position(scene: &OverworldScene) -> Vec2 {
        scene.state.as_ref().expect("live overworld").position
    }

    #[test]
    fn shipped_map_draws_tiles_from_its_tileset() {
        let assets = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../assets");
        let mut harness = Harness::new(&assets);
        let settings = OverworldSettings::from_config(&GameConfig::default());
        let mut scene = OverworldScene::new(settings, GameServices::new(0.5));
        scene.init(&mut harness.ctx());

        let state = scene.state.as_ref().expect("live overworld");
        let map = state.map.as_ref().expect("shipped map loads");
        assert_eq!(map.tilesets.len(), 1);
        assert!(map.tilesets[0].texture.is_some());
        assert!(map.tilesets[0].animation(2).is_some());
        assert_eq!(state.position, Vec2::new(96.0, 96.0));
        assert_eq!(state.ramps.len(), 2);

        let mut frame = vec![0u8; 64 * 64 * 4];
        let mut canvas = Canvas::new(&mut frame, 64, 64);
        scene.draw(&mut canvas, &harness.camera);
        let grass = [72, 150, 64, 255];
        assert!(frame.chunks_exact(4).any(|px| px == grass));
    }

    #[test]
    fn missing_map_spawns_at_fallback_with_full_hp() {
        let dir = TempDir::new().expect("temp dir");
        let mut harness = Harness::new(dir.path());
        let services = GameServices::new(0.5);
        services.profile.borrow_mut().set_hp(3);

        let mut scene = OverworldScene::new(settings(), services.clone());
        assert!(scene.persistent());
        scene.init(&mut harness.ctx());

        assert_eq!(position(&scene), FALLBACK_SPAWN);
        assert_eq!(services.profile.borrow().hp, PLAYER_BASE_HP);
        assert_eq!(harness.camera.target, Vec2::new(408.0, 308.0));
    }

    #[test]
    fn walls_block_and_map_edges_clamp() {
        let dir = TempDir::new().expect("temp dir");
        write_map(dir.path());
        let mut harness = Harness::new(dir.path());
        let services = GameServices::new(0.5);
        let mut scene = OverworldScene::new(settings(), services.clone());
        scene.init(&mut harness.ctx());
        assert_eq!(position(&scene), Vec2::new(16.0, 16.0));

        scene.update(0.1, &held(InputAction::MoveRight), &mut harness.ctx());
        assert_eq!(position(&scene), Vec2::new(32.0, 16.0));
        assert_eq!(services.profile.borrow().facing, Facing::Right);

        scene.update(0.1, &held(InputAction::MoveLeft), &mut harness.ctx());
        scene.update(0.1, &held(InputAction::MoveLeft), &mut harness.ctx());
        assert_eq!(position(&scene), Vec2::new(0.0, 16.0));

        scene.update(0.1, &held(InputAction::MoveUp), &mut harness.ctx());
        assert_eq!(position(&scene), Vec2::new(0.0, 0.0));
        assert_eq!(services.profile.borrow().facing, Facing::Up);
    }

    #[test]
    fn ramp_raises_elevation_once_and_announces_it() {
        let dir = TempDir::new().expect("temp dir");
        write_map(dir.path());
        let mut harness = Harness::new(dir.path());
        let mut scene = OverworldScene::new(settings(), GameServices::new(0.5));
        scene.init(&mut harness.ctx());

        scene.update(0.1, &held(InputAction::MoveDown), &mut harness.ctx());
        scene.update(0.0, &idle(), &mut harness.ctx());
        let state = scene.state.as_ref().expect("live overworld");
        assert_eq!(state.elevation, 1);

        let events = harness.drain(EventKind::ZoneEnter);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].subject, PLAYER_ENTITY_ID);
        assert_eq!(events[0].target, 1);
        assert_eq!(events[0].payload, EventPayload::None);
    }

    #[test]
    fn hotkeys_switch_scenes_and_toggle_overlay() {
        let dir = TempDir::new().expect("temp dir");
        let mut harness = Harness::new(dir.path());
        let mut scene = OverworldScene::new(settings(), GameServices::new(0.5));
        scene.init(&mut harness.ctx());

        scene.update(0.1, &pressed(InputAction::ToggleDebug), &mut harness.ctx());
        assert!(scene.state.as_ref().expect("live overworld").world.debug_draw);

        assert_eq!(
            scene.update(0.1, &pressed(InputAction::Slot1), &mut harness.ctx()),
            SceneCommand::SwitchTo(SceneId::Dungeon1)
        );
        assert_eq!(
            scene.update(0.1, &pressed(InputAction::Slot2), &mut harness.ctx()),
            SceneCommand::SwitchTo(SceneId::Battle)
        );
    }
}
