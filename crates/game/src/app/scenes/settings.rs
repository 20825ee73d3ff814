use rpg_engine::{
    Camera2D, Canvas, InputAction, InputSnapshot, Scene, SceneCommand, SceneContext, SceneId,
};
use tracing::info;

use super::{draw_gauge, HIGHLIGHT_COLOR, MENU_BACKGROUND};
use crate::app::services::GameServices;

/// Volume change per second while left or right is held.
const VOLUME_RATE: f32 = 0.05 * 60.0;

/// Edits a working copy of the music volume, previewed live on the music
/// director. Confirm saves it; leaving without saving restores the saved value.
pub(crate) struct SettingsScene {
    services: GameServices,
    working_volume: Option<f32>,
}

impl SettingsScene {
    pub(crate) fn new(services: GameServices) -> Self {
        Self {
            services,
            working_volume: None,
        }
    }

    fn revert_preview(&self) {
        let saved = self.services.settings.borrow().music_volume;
        self.services.music.borrow_mut().set_music_volume(saved);
    }
}

impl Scene for SettingsScene {
    fn init(&mut self, _ctx: &mut SceneContext<'_>) {
        self.working_volume = Some(self.services.settings.borrow().music_volume);
    }

    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        _ctx: &mut SceneContext<'_>,
    ) -> SceneCommand {
        let Some(mut volume) = self.working_volume else {
            return SceneCommand::None;
        };

        if input.was_pressed(InputAction::Back) {
            self.revert_preview();
            return SceneCommand::SwitchTo(SceneId::Menu);
        }

        let mut delta = 0.0;
        if input.is_down(InputAction::MoveLeft) {
            delta -= VOLUME_RATE * fixed_dt_seconds;
        }
        if input.is_down(InputAction::MoveRight) {
            delta += VOLUME_RATE * fixed_dt_seconds;
        }
        if delta != 0.0 {
            volume = (volume + delta).clamp(0.0, 1.0);
            self.working_volume = Some(volume);
            self.services.music.borrow_mut().set_music_volume(volume);
        }

        if input.was_pressed(InputAction::Confirm) {
            self.services.settings.borrow_mut().music_volume = volume;
            info!(music_volume = volume, "settings_applied");
        }
        SceneCommand::None
    }

    fn draw(&mut self, canvas: &mut Canvas<'_>, _camera: &Camera2D) {
        canvas.clear(MENU_BACKGROUND);
        let Some(volume) = self.working_volume else {
            return;
        };
        let width = 200;
        let x = (canvas.width() as i32 - width) / 2;
        let y = canvas.height() as i32 / 2;
        draw_gauge(canvas, x, y, width, volume, HIGHLIGHT_COLOR);
    }

    fn cleanup(&mut self, _ctx: &mut SceneContext<'_>) {
        self.revert_preview();
        self.working_volume = None;
    }

    fn debug_title(&self) -> Option<String> {
        let volume = self.working_volume?;
        let music = self.services.music.borrow();
        let track = match music.current_track() {
            Some(track) if music.is_looping() => format!("{track} (loop)"),
            Some(track) => track.to_string(),
            None => "no music".to_string(),
        };
        Some(format!(
            "Settings | Music volume {:.0}% | {track} | Left/Right adjust, Enter apply, Esc back",
            volume * 100.0
        ))
    }
}
