use winit::event::ElementState;
use winit::keyboard::{KeyCode, PhysicalKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    Confirm,
    Back,
    Slot1,
    Slot2,
    ToggleDebug,
    Reset,
}

const ACTION_COUNT: usize = 10;

impl InputAction {
    const fn index(self) -> usize {
        match self {
            InputAction::MoveUp => 0,
            InputAction::MoveDown => 1,
            InputAction::MoveLeft => 2,
            InputAction::MoveRight => 3,
            InputAction::Confirm => 4,
            InputAction::Back => 5,
            InputAction::Slot1 => 6,
            InputAction::Slot2 => 7,
            InputAction::ToggleDebug => 8,
            InputAction::Reset => 9,
        }
    }

    pub fn from_physical_key(key: PhysicalKey) -> Option<Self> {
        let PhysicalKey::Code(code) = key else {
            return None;
        };
        let action = match code {
            KeyCode::KeyW | KeyCode::ArrowUp => InputAction::MoveUp,
            KeyCode::KeyS | KeyCode::ArrowDown => InputAction::MoveDown,
            KeyCode::KeyA | KeyCode::ArrowLeft => InputAction::MoveLeft,
            KeyCode::KeyD | KeyCode::ArrowRight => InputAction::MoveRight,
            KeyCode::Enter | KeyCode::NumpadEnter | KeyCode::Space => InputAction::Confirm,
            KeyCode::Escape | KeyCode::Backspace => InputAction::Back,
            KeyCode::Digit1 | KeyCode::Numpad1 => InputAction::Slot1,
            KeyCode::Digit2 | KeyCode::Numpad2 => InputAction::Slot2,
            KeyCode::F3 => InputAction::ToggleDebug,
            KeyCode::F6 => InputAction::Reset,
            _ => return None,
        };
        Some(action)
    }
}

/// Per-tick view of the keyboard: held state plus presses since the last tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputSnapshot {
    down: [bool; ACTION_COUNT],
    pressed: [bool; ACTION_COUNT],
    window_width: u32,
    window_height: u32,
}

impl InputSnapshot {
    pub fn empty(window_width: u32, window_height: u32) -> Self {
        Self {
            window_width,
            window_height,
            ..Self::default()
        }
    }

    pub fn with_down(mut self, action: InputAction) -> Self {
        self.down[action.index()] = true;
        self
    }

    /// Marks a fresh press, which also counts as held.
    pub fn with_pressed(mut self, action: InputAction) -> Self {
        self.pressed[action.index()] = true;
        self.down[action.index()] = true;
        self
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.down[action.index()]
    }

    pub fn was_pressed(&self, action: InputAction) -> bool {
        self.pressed[action.index()]
    }

    pub fn window_size(&self) -> (u32, u32) {
        (self.window_width, self.window_height)
    }

    /// Movement axis from the held direction keys, each component in -1..=1.
    pub fn move_axis(&self) -> (f32, f32) {
        let axis = |negative: InputAction, positive: InputAction| -> f32 {
            match (self.is_down(negative), self.is_down(positive)) {
                (true, false) => -1.0,
                (false, true) => 1.0,
                _ => 0.0,
            }
        };
        (
            axis(InputAction::MoveLeft, InputAction::MoveRight),
            axis(InputAction::MoveUp, InputAction::MoveDown),
        )
    }
}

#[derive(Debug, Default)]
pub(crate) struct InputCollector {
    down: [bool; ACTION_COUNT],
    pressed_edges: [bool; ACTION_COUNT],
    window_width: u32,
    window_height: u32,
}

impl InputCollector {
    pub(crate) fn new(window_width: u32, window_height: u32) -> Self {
        Self {
            window_width,
            window_height,
            ..Self::default()
        }
    }

    pub(crate) fn handle_key(&mut self, key: PhysicalKey, state: ElementState) {
        let Some(action) = InputAction::from_physical_key(key) else {
            return;
        };
        let index = action.index();
        match state {
            ElementState::Pressed => {
                if !self.down[index] {
                    self.pressed_edges[index] = true;
                }
                self.down[index] = true;
            }
            ElementState::Released => self.down[index] = false,
        }
    }

    pub(crate) fn set_window_size(&mut self, width: u32, height: u32) {
        self.window_width = width;
        self.window_height = height;
    }

    /// Releases every held key, used when the window loses focus.
    pub(crate) fn release_all(&mut self) {
        self.down = [false; ACTION_COUNT];
    }

    pub(crate) fn snapshot_for_tick(&mut self) -> InputSnapshot {
        let snapshot = InputSnapshot {
            down: self.down,
            pressed: self.pressed_edges,
            window_width: self.window_width,
            window_height: self.window_height,
        };
        self.pressed_edges = [false; ACTION_COUNT];
        snapshot
    }
}
