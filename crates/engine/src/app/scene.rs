use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::events::{Event, EventBus};

use super::input::InputSnapshot;
use super::rendering::{Camera2D, Canvas, Viewport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SceneId {
    Menu,
    Overworld,
    Dungeon1,
    Settings,
    Battle,
}

const SCENE_COUNT: usize = 5;

impl SceneId {
    pub const ALL: [SceneId; SCENE_COUNT] = [
        SceneId::Menu,
        SceneId::Overworld,
        SceneId::Dungeon1,
        SceneId::Settings,
        SceneId::Battle,
    ];

    pub const fn index(self) -> usize {
        match self {
            SceneId::Menu => 0,
            SceneId::Overworld => 1,
            SceneId::Dungeon1 => 2,
            SceneId::Settings => 3,
            SceneId::Battle => 4,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub const fn name(self) -> &'static str {
        match self {
            SceneId::Menu => "menu",
            SceneId::Overworld => "overworld",
            SceneId::Dungeon1 => "dungeon1",
            SceneId::Settings => "settings",
            SceneId::Battle => "battle",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|id| id.name().eq_ignore_ascii_case(name.trim()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneCommand {
    None,
    SwitchTo(SceneId),
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub command: SceneCommand,
    pub transitioned: bool,
    pub events_dispatched: usize,
}

/// Shared services handed to a scene for the duration of one call.
pub struct SceneContext<'a> {
    pub bus: &'a mut EventBus,
    pub camera: &'a mut Camera2D,
    pub viewport: Viewport,
    pub asset_root: &'a Path,
}

pub trait Scene {
    /// Persistent scenes keep their state when switched away from and are
    /// only torn down by a full reset.
    fn persistent(&self) -> bool {
        false
    }
    fn init(&mut self, ctx: &mut SceneContext<'_>);
    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        ctx: &mut SceneContext<'_>,
    ) -> SceneCommand;
    fn draw(&mut self, canvas: &mut Canvas<'_>, camera: &Camera2D);
    fn cleanup(&mut self, ctx: &mut SceneContext<'_>);
    fn debug_title(&self) -> Option<String> {
        None
    }
}

/// Scene implementations keyed by id, built once at startup.
#[derive(Default)]
pub struct SceneRegistry {
    scenes: Vec<(SceneId, Box<dyn Scene>)>,
}

impl SceneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: SceneId, scene: Box<dyn Scene>) -> Self {
        self.register(id, scene);
        self
    }

    /// Registers a scene, replacing any earlier registration for `id`.
    pub fn register(&mut self, id: SceneId, scene: Box<dyn Scene>) {
        if let Some(slot) = self.scenes.iter_mut().find(|(existing, _)| *existing == id) {
            warn!(scene = id.name(), "scene_registration_replaced");
            slot.1 = scene;
        } else {
            self.scenes.push((id, scene));
        }
    }

    pub fn contains(&self, id: SceneId) -> bool {
        self.scenes.iter().any(|(existing, _)| *existing == id)
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}

struct SceneRuntime {
    scene: Box<dyn Scene>,
    is_live: bool,
}

pub type BusWiring = Box<dyn FnMut(&mut EventBus)>;

/// Drives the active scene and performs transitions.
///
/// A transition cleans up the current scene unless it is persistent, clears
/// queued events, initializes the next scene if it has no live state or is
/// not persistent, then emits `SceneEntered`.
pub struct SceneManager {
    runtimes: [Option<SceneRuntime>; SCENE_COUNT],
    current: Option<SceneId>,
    pending: Option<SceneId>,
    bus: EventBus,
    bus_wiring: Option<BusWiring>,
    camera: Camera2D,
    viewport: Viewport,
    asset_root: PathBuf,
}

impl SceneManager {
    pub fn new(
        registry: SceneRegistry,
        start_scene: SceneId,
        asset_root: PathBuf,
        viewport: Viewport,
    ) -> Self {
        let mut runtimes: [Option<SceneRuntime>; SCENE_COUNT] = std::array::from_fn(|_| None);
        for (id, scene) in registry.scenes {
            runtimes[id.index()] = Some(SceneRuntime {
                scene,
                is_live: false,
            });
        }
        Self {
            runtimes,
            current: None,
            pending: Some(start_scene),
            bus: EventBus::new(),
            bus_wiring: None,
            camera: Camera2D::default(),
            viewport,
            asset_root,
        }
    }

    /// Installs process-wide listeners now and again after every reset.
    pub fn set_bus_wiring(&mut self, mut wiring: BusWiring) {
        wiring(&mut self.bus);
        self.bus_wiring = Some(wiring);
    }

    pub fn current_scene(&self) -> Option<SceneId> {
        self.current
    }

    pub fn pending_transition(&self) -> Option<SceneId> {
        self.pending
    }

    pub fn request_transition(&mut self, next: SceneId) {
        if let Some(previous) = self.pending.replace(next) {
            debug!(
                replaced = previous.name(),
                next = next.name(),
                "scene_transition_request_replaced"
            );
        }
    }

    pub fn is_scene_live(&self, id: SceneId) -> bool {
        self.runtimes[id.index()]
            .as_ref()
            .is_some_and(|runtime| runtime.is_live)
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    pub fn camera(&self) -> &Camera2D {
        &self.camera
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// Runs one fixed step: pending transition, then scene update, then event flush.
    pub fn tick(&mut self, fixed_dt_seconds: f32, input: &InputSnapshot) -> TickReport {
        let transitioned = self.perform_transition();
        let command = self.update_active(fixed_dt_seconds, input);
        let events_dispatched = self.flush_events();
        TickReport {
            command,
            transitioned,
            events_dispatched,
        }
    }

    /// Returns true when a transition happened.
    pub fn perform_transition(&mut self) -> bool {
        let Some(next) = self.pending.take() else {
            return false;
        };
        if self.runtimes[next.index()].is_none() {
            warn!(scene = next.name(), "scene_transition_unknown_scene");
            return false;
        }

        let previous = self.current;
        if let Some(current) = previous {
            let tear_down = self.runtimes[current.index()]
                .as_ref()
                .is_some_and(|runtime| runtime.is_live && !runtime.scene.persistent());
            if tear_down {
                self.with_scene(current, |scene, ctx| scene.cleanup(ctx));
                self.set_live(current, false);
            }
        }

        let dropped = self.bus.clear();
        if dropped > 0 {
            debug!(dropped, "scene_transition_cleared_events");
        }

        self.current = Some(next);
        let needs_init = self.runtimes[next.index()]
            .as_ref()
            .is_some_and(|runtime| !runtime.is_live || !runtime.scene.persistent());
        if needs_init {
            self.with_scene(next, |scene, ctx| scene.init(ctx));
            self.set_live(next, true);
        }

        self.bus.emit_or_drop(Event::scene_entered(next));
        info!(
            from = previous.map(SceneId::name),
            to = next.name(),
            initialized = needs_init,
            "scene_transition"
        );
        true
    }

    /// Updates the current scene. `SwitchTo` is queued as the next transition.
    pub fn update_active(&mut self, fixed_dt_seconds: f32, input: &InputSnapshot) -> SceneCommand {
        let Some(current) = self.current else {
            return SceneCommand::None;
        };
        let command = self
            .with_scene(current, |scene, ctx| scene.update(fixed_dt_seconds, input, ctx))
            .unwrap_or(SceneCommand::None);
        if let SceneCommand::SwitchTo(next) = command {
            self.request_transition(next);
        }
        command
    }

    pub fn flush_events(&mut self) -> usize {
        self.bus.flush()
    }

    pub fn draw_active(&mut self, canvas: &mut Canvas<'_>) {
        let Some(current) = self.current else {
            return;
        };
        let camera = self.camera;
        if let Some(runtime) = self.runtimes[current.index()].as_mut() {
            runtime.scene.draw(canvas, &camera);
        }
    }

    pub fn debug_title_active(&self) -> Option<String> {
        let current = self.current?;
        self.runtimes[current.index()]
            .as_ref()
            .and_then(|runtime| runtime.scene.debug_title())
    }

    /// Tears down every live scene, rebuilds the event bus and its listeners,
    /// and queues `start_scene`.
    pub fn reset(&mut self, start_scene: SceneId) {
        for id in SceneId::ALL {
            if self.is_scene_live(id) {
                self.with_scene(id, |scene, ctx| scene.cleanup(ctx));
                self.set_live(id, false);
            }
        }
        self.bus = EventBus::new();
        if let Some(wiring) = self.bus_wiring.as_mut() {
            wiring(&mut self.bus);
        }
        self.camera = Camera2D::default();
        self.current = None;
        self.pending = Some(start_scene);
        info!(start = start_scene.name(), "scene_manager_reset");
    }

    pub fn shutdown_all(&mut self) {
        for id in SceneId::ALL {
            if self.is_scene_live(id) {
                self.with_scene(id, |scene, ctx| scene.cleanup(ctx));
                self.set_live(id, false);
            }
        }
        self.current = None;
    }

    fn set_live(&mut self, id: SceneId, is_live: bool) {
        if let Some(runtime) = self.runtimes[id.index()].as_mut() {
            runtime.is_live = is_live;
        }
    }

    fn with_scene<R>(
        &mut self,
        id: SceneId,
        f: impl FnOnce(&mut dyn Scene, &mut SceneContext<'_>) -> R,
    ) -> Option<R> {
        let Self {
            runtimes,
            bus,
            camera,
            viewport,
            asset_root,
            ..
        } = self;
        let runtime = runtimes[id.index()].as_mut()?;
        let mut ctx = SceneContext {
            bus,
            camera,
            viewport: *viewport,
            asset_root: asset_root.as_path(),
        };
        Some(f(runtime.scene.as_mut(), &mut ctx))
    }
}
