use rpg_engine::{
    Camera2D, Canvas, InputAction, InputSnapshot, Scene, SceneCommand, SceneContext, SceneId,
};

use super::{cycle, draw_option_rows, MENU_BACKGROUND};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuItem {
    Start,
    Settings,
    Quit,
}

const ITEMS: [MenuItem; 3] = [MenuItem::Start, MenuItem::Settings, MenuItem::Quit];

impl MenuItem {
    fn command(self) -> SceneCommand {
        match self {
            MenuItem::Start => SceneCommand::SwitchTo(SceneId::Overworld),
            MenuItem::Settings => SceneCommand::SwitchTo(SceneId::Settings),
            MenuItem::Quit => SceneCommand::Quit,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct MenuScene {
    selected: usize,
}

impl Scene for MenuScene {
    fn init(&mut self, _ctx: &mut SceneContext<'_>) {
        self.selected = 0;
    }

    fn update(
        &mut self,
        _fixed_dt_seconds: f32,
        input: &InputSnapshot,
        _ctx: &mut SceneContext<'_>,
    ) -> SceneCommand {
        if input.was_pressed(InputAction::Back) {
            return SceneCommand::Quit;
        }
        if input.was_pressed(InputAction::MoveUp) {
            self.selected = cycle(self.selected, ITEMS.len(), false);
        }
        if input.was_pressed(InputAction::MoveDown) {
            self.selected = cycle(self.selected, ITEMS.len(), true);
        }
        if input.was_pressed(InputAction::Confirm) {
            return ITEMS[self.selected].command();
        }
        SceneCommand::None
    }

    fn draw(&mut self, canvas: &mut Canvas<'_>, _camera: &Camera2D) {
        canvas.clear(MENU_BACKGROUND);
        draw_option_rows(canvas, ITEMS.len(), Some(self.selected));
    }

    fn cleanup(&mut self, _ctx: &mut SceneContext<'_>) {}

    fn debug_title(&self) -> Option<String> {
        Some(format!("Menu | {:?}", ITEMS[self.selected]))
    }
}
