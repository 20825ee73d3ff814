//! Axis-aligned collision bodies and elevation ramps.
//!
//! Bodies interact only when both are active and share an elevation. Static
//! bodies never move; kinematic bodies move through [`CollisionWorld::move_and_slide`],
//! which resolves X fully before Y.

use thiserror::Error;
use tracing::{debug, warn};

use crate::app::{Camera2D, Canvas};
use crate::geometry::{Rect, Vec2};
use crate::tilemap::{TileMap, ELEVATION_RAMP_TYPE};

pub const COLLISION_MAX_BODIES: usize = 256;
pub const ELEVATION_MAX_RAMPS: usize = 64;

const DEBUG_STATIC_COLOR: [u8; 4] = [230, 41, 55, 255];
const DEBUG_KINEMATIC_COLOR: [u8; 4] = [0, 228, 48, 255];
const DEBUG_STATIC_ELEVATED_COLOR: [u8; 4] = [0, 121, 241, 255];
const DEBUG_KINEMATIC_ELEVATED_COLOR: [u8; 4] = [102, 191, 255, 255];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Static,
    Kinematic,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BodyTag {
    #[default]
    None,
    Wall,
    Player,
    Npc,
    Door,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionBody {
    pub rect: Rect,
    pub kind: BodyKind,
    pub tag: BodyTag,
    pub active: bool,
    pub elevation: i32,
    /// Opaque id of whatever owns the body.
    pub owner: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle(usize);

impl BodyHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CollisionError {
    #[error("collision world is full ({capacity} bodies)")]
    Full { capacity: usize },
}

#[derive(Debug, Default)]
pub struct CollisionWorld {
    bodies: Vec<CollisionBody>,
    pub debug_draw: bool,
}

impl CollisionWorld {
    pub fn new() -> Self {
        Self {
            bodies: Vec::with_capacity(COLLISION_MAX_BODIES),
            debug_draw: false,
        }
    }

    /// Number of bodies ever added, including removed ones.
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn add_body(
        &mut self,
        rect: Rect,
        kind: BodyKind,
        tag: BodyTag,
        elevation: i32,
        owner: Option<u64>,
    ) -> Result<BodyHandle, CollisionError> {
        if self.bodies.len() >= COLLISION_MAX_BODIES {
            return Err(CollisionError::Full {
                capacity: COLLISION_MAX_BODIES,
            });
        }
        let handle = BodyHandle(self.bodies.len());
        self.bodies.push(CollisionBody {
            rect,
            kind,
            tag,
            active: true,
            elevation,
            owner,
        });
        Ok(handle)
    }

    /// Marks a body inactive. Handles stay valid and are never reused.
    pub fn remove_body(&mut self, handle: BodyHandle) -> bool {
        match self.bodies.get_mut(handle.0) {
            Some(body) => {
                body.active = false;
                true
            }
            None => false,
        }
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&CollisionBody> {
        self.bodies.get(handle.0)
    }

    pub fn set_body_elevation(&mut self, handle: BodyHandle, elevation: i32) {
        if let Some(body) = self.bodies.get_mut(handle.0) {
            body.elevation = elevation;
        }
    }

    pub fn active_bodies(&self) -> impl Iterator<Item = (BodyHandle, &CollisionBody)> {
        self.bodies
            .iter()
            .enumerate()
            .filter(|(_, body)| body.active)
            .map(|(index, body)| (BodyHandle(index), body))
    }

    /// Adds a static wall for every non-ramp object in the named object
    /// layers. Rotated objects contribute the bounding box of their corners.
    pub fn load_from_map(&mut self, map: &TileMap, layer_name: &str) -> usize {
        let mut added = 0;
        let objects = map
            .object_layers
            .iter()
            .filter(|layer| layer.name == layer_name)
            .flat_map(|layer| layer.objects.iter())
            .filter(|object| object.kind != ELEVATION_RAMP_TYPE);

        for object in objects {
            let rect = object.rect().rotated_bounds(object.rotation);
            match self.add_body(rect, BodyKind::Static, BodyTag::Wall, object.elevation, None) {
                Ok(_) => added += 1,
                Err(error) => {
                    warn!(
                        error = %error,
                        layer = layer_name,
                        object_id = object.id,
                        "collision_body_dropped"
                    );
                    break;
                }
            }
        }
        debug!(layer = layer_name, bodies = added, "collision_loaded_from_map");
        added
    }

    /// Moves a kinematic body by `dx` then `dy`, clamping it flush against any
    /// active static body it ends up overlapping on each axis. Returns the
    /// resolved position, the unchanged position for inactive or static bodies,
    /// and `None` for an unknown handle.
    pub fn move_and_slide(&mut self, handle: BodyHandle, dx: f32, dy: f32) -> Option<Vec2> {
        let index = handle.0;
        let body = *self.bodies.get(index)?;
        if !body.active || body.kind == BodyKind::Static {
            return Some(body.rect.position());
        }

        let mut rect = body.rect;
        rect.x += dx;
        for other in self.blockers(index, body.elevation) {
            if rect.overlaps(&other.rect) {
                if dx > 0.0 {
                    rect.x = other.rect.x - rect.width;
                } else if dx < 0.0 {
                    rect.x = other.rect.right();
                }
            }
        }

        rect.y += dy;
        for other in self.blockers(index, body.elevation) {
            if rect.overlaps(&other.rect) {
                if dy > 0.0 {
                    rect.y = other.rect.y - rect.height;
                } else if dy < 0.0 {
                    rect.y = other.rect.bottom();
                }
            }
        }

        self.bodies[index].rect = rect;
        Some(rect.position())
    }

    fn blockers(&self, moving: usize, elevation: i32) -> impl Iterator<Item = &CollisionBody> {
        self.bodies
            .iter()
            .enumerate()
            .filter(move |(index, other)| {
                *index != moving
                    && other.active
                    && other.kind == BodyKind::Static
                    && other.elevation == elevation
            })
            .map(|(_, other)| other)
    }

    /// Outlines active bodies when `debug_draw` is on.
    pub fn draw_debug(&self, canvas: &mut Canvas<'_>, camera: &Camera2D) {
        if !self.debug_draw {
            return;
        }
        for (_, body) in self.active_bodies() {
            canvas.outline_world_rect(&body.rect, camera, debug_color(body));
        }
    }
}

fn debug_color(body: &CollisionBody) -> [u8; 4] {
    match (body.elevation == 0, body.kind) {
        (true, BodyKind::Static) => DEBUG_STATIC_COLOR,
        (true, BodyKind::Kinematic) => DEBUG_KINEMATIC_COLOR,
        (false, BodyKind::Static) => DEBUG_STATIC_ELEVATED_COLOR,
        (false, BodyKind::Kinematic) => DEBUG_KINEMATIC_ELEVATED_COLOR,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElevationRamp {
    pub rect: Rect,
    pub from_elevation: i32,
    pub to_elevation: i32,
}

#[derive(Debug, Clone, Default)]
pub struct ElevationRampSet {
    ramps: Vec<ElevationRamp>,
}

impl ElevationRampSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ramps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ramps.is_empty()
    }

    pub fn ramps(&self) -> &[ElevationRamp] {
        &self.ramps
    }

    pub fn push(&mut self, ramp: ElevationRamp) -> Result<usize, CollisionError> {
        if self.ramps.len() >= ELEVATION_MAX_RAMPS {
            return Err(CollisionError::Full {
                capacity: ELEVATION_MAX_RAMPS,
            });
        }
        self.ramps.push(ramp);
        Ok(self.ramps.len() - 1)
    }

    /// Replaces the set with the ramp objects of the named layers.
    pub fn load_from_map(&mut self, map: &TileMap, layer_name: &str) -> usize {
        self.ramps.clear();
        let ramps = map
            .object_layers
            .iter()
            .filter(|layer| layer.name == layer_name)
            .flat_map(|layer| layer.objects.iter())
            .filter(|object| object.kind == ELEVATION_RAMP_TYPE);

        for object in ramps {
            let ramp = ElevationRamp {
                rect: object.rect(),
                from_elevation: object.from_elevation,
                to_elevation: object.to_elevation,
            };
            if let Err(error) = self.push(ramp) {
                warn!(error = %error, layer = layer_name, "elevation_ramp_dropped");
                break;
            }
        }
        debug!(layer = layer_name, ramps = self.ramps.len(), "elevation_ramps_loaded");
        self.ramps.len()
    }
}

/// Fires each ramp once per entry: after a ramp fires, nothing fires again
/// until the tracked body stops overlapping that ramp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RampTracker {
    last_fired: Option<usize>,
}

impl RampTracker {
    pub fn last_fired(&self) -> Option<usize> {
        self.last_fired
    }

    /// Returns the new elevation when a ramp fires this step.
    pub fn update(&mut self, ramps: &ElevationRampSet, body: &Rect, elevation: i32) -> Option<i32> {
        if let Some(index) = self.last_fired {
            let still_inside = ramps
                .ramps()
                .get(index)
                .is_some_and(|ramp| ramp.rect.overlaps(body));
            if still_inside {
                return None;
            }
            self.last_fired = None;
        }

        let (index, ramp) = ramps
            .ramps()
            .iter()
            .enumerate()
            .find(|(_, ramp)| ramp.from_elevation == elevation && ramp.rect.overlaps(body))?;
        self.last_fired = Some(index);
        Some(ramp.to_elevation)
    }

    /// Moves the body to the elevation of any ramp that fires.
    pub fn apply(
        &mut self,
        ramps: &ElevationRampSet,
        world: &mut CollisionWorld,
        handle: BodyHandle,
    ) -> Option<i32> {
        let body = *world.body(handle)?;
        let elevation = self.update(ramps, &body.rect, body.elevation)?;
        world.set_body_elevation(handle, elevation);
        debug!(
            from = body.elevation,
            to = elevation,
            ramp = self.last_fired,
            "elevation_ramp_fired"
        );
        Some(elevation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tilemap::{MapObject, ObjectLayer};

    fn square(x: f32, y: f32) -> Rect {
        Rect::new(x, y, 16.0, 16.0)
    }

    fn object(kind: &str, rect: Rect) -> MapObject {
        MapObject {
            kind: kind.to_string(),
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            visible: true,
            ..MapObject::default()
        }
    }

    fn map_with_layer(name: &str, objects: Vec<MapObject>) -> TileMap {
        TileMap {
            object_layers: vec![ObjectLayer {
                name: name.to_string(),
                visible: true,
                objects,
            }],
            ..TileMap::default()
        }
    }

    #[test]
    fn move_and_slide_clamps_flush_against_left_edge() {
        let mut world = CollisionWorld::new();
        let mover = world
            .add_body(square(0.0, 0.0), BodyKind::Kinematic, BodyTag::Player, 0, None)
            .expect("add");
        world
            .add_body(square(10.0, 0.0), BodyKind::Static, BodyTag::Wall, 0, None)
            .expect("add");

        let position = world.move_and_slide(mover, 5.0, 0.0).expect("known body");
        assert_eq!(position, Vec2::new(-6.0, 0.0));
    }

    #[test]
    fn move_and_slide_clamps_flush_against_right_edge() {
        let mut world = CollisionWorld::new();
        world
            .add_body(square(0.0, 0.0), BodyKind::Static, BodyTag::Wall, 0, None)
            .expect("add");
        let mover = world
            .add_body(square(20.0, 0.0), BodyKind::Kinematic, BodyTag::Player, 0, None)
            .expect("add");

        let position = world.move_and_slide(mover, -5.0, 0.0).expect("known body");
        assert_eq!(position, Vec2::new(16.0, 0.0));
        assert_eq!(world.body(mover).map(|body| body.rect.x), Some(16.0));
    }

    #[test]
    fn diagonal_into_corner_resolves_x_before_y() {
        let mut world = CollisionWorld::new();
        world
            .add_body(Rect::new(20.0, 0.0, 16.0, 40.0), BodyKind::Static, BodyTag::Wall, 0, None)
            .expect("add");
        let mover = world
            .add_body(square(0.0, 0.0), BodyKind::Kinematic, BodyTag::Player, 0, None)
            .expect("add");

        // X hits the wall first, Y then slides freely along it.
        let position = world.move_and_slide(mover, 8.0, 6.0).expect("known body");
        assert_eq!(position, Vec2::new(4.0, 6.0));
    }

    #[test]
    fn bodies_on_other_elevations_or_inactive_do_not_block() {
        let mut world = CollisionWorld::new();
        let mover = world
            .add_body(square(0.0, 0.0), BodyKind::Kinematic, BodyTag::Player, 1, None)
            .expect("add");
        world
            .add_body(square(10.0, 0.0), BodyKind::Static, BodyTag::Wall, 0, None)
            .expect("add");
        let removed = world
            .add_body(square(10.0, 0.0), BodyKind::Static, BodyTag::Wall, 1, None)
            .expect("add");
        assert!(world.remove_body(removed));

        let position = world.move_and_slide(mover, 5.0, 0.0).expect("known body");
        assert_eq!(position, Vec2::new(5.0, 0.0));
        assert_eq!(world.active_bodies().count(), 2);
    }

    #[test]
    fn static_and_inactive_bodies_do_not_move() {
        let mut world = CollisionWorld::new();
        let wall = world
            .add_body(square(3.0, 4.0), BodyKind::Static, BodyTag::Wall, 0, None)
            .expect("add");
        let ghost = world
            .add_body(square(0.0, 0.0), BodyKind::Kinematic, BodyTag::Npc, 0, None)
            .expect("add");
        world.remove_body(ghost);

        assert_eq!(world.move_and_slide(wall, 10.0, 10.0), Some(Vec2::new(3.0, 4.0)));
        assert_eq!(world.move_and_slide(ghost, 10.0, 10.0), Some(Vec2::ZERO));
        assert_eq!(world.move_and_slide(BodyHandle(99), 1.0, 1.0), None);
    }

    #[test]
    fn adding_past_capacity_fails_and_keeps_count() {
        let mut world = CollisionWorld::new();
        for i in 0..COLLISION_MAX_BODIES {
            world
                .add_body(square(i as f32, 0.0), BodyKind::Static, BodyTag::Wall, 0, None)
                .expect("within capacity");
        }

        let result = world.add_body(square(0.0, 0.0), BodyKind::Static, BodyTag::Wall, 0, None);
        assert_eq!(
            result,
            Err(CollisionError::Full {
                capacity: COLLISION_MAX_BODIES
            })
        );
        assert_eq!(world.len(), COLLISION_MAX_BODIES);
    }

    #[test]
    fn load_from_map_skips_ramps_and_uses_rotated_bounds() {
        let mut rotated = object("wall", Rect::new(100.0, 50.0, 32.0, 8.0));
        rotated.rotation = 90.0;
        rotated.elevation = 2;
        let map = map_with_layer(
            "collision",
            vec![
                object("", square(0.0, 0.0)),
                object(ELEVATION_RAMP_TYPE, square(32.0, 0.0)),
                rotated,
            ],
        );
        let mut world = CollisionWorld::new();

        assert_eq!(world.load_from_map(&map, "collision"), 2);
        assert_eq!(world.load_from_map(&map, "missing"), 0);
        let bounds = world.body(BodyHandle(1)).expect("rotated body");
        assert!((bounds.rect.x - 92.0).abs() < 0.001);
        assert!((bounds.rect.height - 32.0).abs() < 0.001);
        assert_eq!(bounds.elevation, 2);
        assert_eq!(bounds.tag, BodyTag::Wall);
        assert_eq!(bounds.kind, BodyKind::Static);
    }

    #[test]
    fn load_ramps_resets_and_reads_elevations() {
        let mut ramp = object(ELEVATION_RAMP_TYPE, square(16.0, 16.0));
        ramp.from_elevation = 0;
        ramp.to_elevation = 1;
        let map = map_with_layer("collision", vec![object("wall", square(0.0, 0.0)), ramp]);

        let mut ramps = ElevationRampSet::new();
        assert_eq!(ramps.load_from_map(&map, "collision"), 1);
        assert_eq!(ramps.load_from_map(&map, "collision"), 1);
        assert_eq!(ramps.ramps()[0].to_elevation, 1);
    }

    #[test]
    fn ramp_fires_once_per_entry() {
        let mut ramps = ElevationRampSet::new();
        ramps
            .push(ElevationRamp {
                rect: Rect::new(100.0, 0.0, 32.0, 32.0),
                from_elevation: 0,
                to_elevation: 1,
            })
            .expect("push");
        let mut world = CollisionWorld::new();
        let player = world
            .add_body(square(80.0, 8.0), BodyKind::Kinematic, BodyTag::Player, 0, None)
            .expect("add");
        let mut tracker = RampTracker::default();

        assert_eq!(tracker.apply(&ramps, &mut world, player), None);

        world.move_and_slide(player, 10.0, 0.0);
        assert_eq!(tracker.apply(&ramps, &mut world, player), Some(1));
        for _ in 0..30 {
            assert_eq!(tracker.apply(&ramps, &mut world, player), None);
        }
        assert_eq!(world.body(player).map(|body| body.elevation), Some(1));

        // leave, drop back down, and re-enter
        world.move_and_slide(player, -40.0, 0.0);
        assert_eq!(tracker.apply(&ramps, &mut world, player), None);
        assert_eq!(tracker.last_fired(), None);
        world.set_body_elevation(player, 0);
        world.move_and_slide(player, 40.0, 0.0);
        assert_eq!(tracker.apply(&ramps, &mut world, player), Some(1));
    }

    #[test]
    fn ramp_ignores_bodies_on_other_elevations() {
        let mut ramps = ElevationRampSet::new();
        ramps
            .push(ElevationRamp {
                rect: square(0.0, 0.0),
                from_elevation: 1,
                to_elevation: 2,
            })
            .expect("push");
        let mut tracker = RampTracker::default();
        assert_eq!(tracker.update(&ramps, &square(4.0, 4.0), 0), None);
        assert_eq!(tracker.update(&ramps, &square(4.0, 4.0), 1), Some(2));
    }

    #[test]
    fn ramp_set_capacity_is_enforced() {
        let mut ramps = ElevationRampSet::new();
        let ramp = ElevationRamp {
            rect: square(0.0, 0.0),
            from_elevation: 0,
            to_elevation: 1,
        };
        for _ in 0..ELEVATION_MAX_RAMPS {
            ramps.push(ramp).expect("within capacity");
        }
        assert!(ramps.push(ramp).is_err());
        assert_eq!(ramps.len(), ELEVATION_MAX_RAMPS);
    }

    #[test]
    fn debug_overlay_colors_follow_kind_and_elevation() {
        let mut world = CollisionWorld::new();
        world
            .add_body(Rect::new(0.0, 0.0, 4.0, 4.0), BodyKind::Static, BodyTag::Wall, 0, None)
            .expect("add");
        world
            .add_body(Rect::new(4.0, 4.0, 4.0, 4.0), BodyKind::Kinematic, BodyTag::Player, 3, None)
            .expect("add");

        let mut frame = vec![0u8; 8 * 8 * 4];
        let camera = Camera2D::default();
        world.draw_debug(&mut Canvas::new(&mut frame, 8, 8), &camera);
        assert!(frame.iter().all(|&b| b == 0), "overlay is off by default");

        world.debug_draw = true;
        let mut canvas = Canvas::new(&mut frame, 8, 8);
        world.draw_debug(&mut canvas, &camera);
        assert_eq!(canvas.pixel(0, 0), Some(DEBUG_STATIC_COLOR));
        assert_eq!(canvas.pixel(4, 4), Some(DEBUG_KINEMATIC_ELEVATED_COLOR));
        assert_eq!(canvas.pixel(1, 1), Some([0, 0, 0, 0]));
    }
}
