use std::cell::RefCell;
use std::rc::Rc;

use super::audio::MusicDirector;

pub(crate) const PLAYER_BASE_HP: i32 = 30;
pub(crate) const PLAYER_BASE_ATTACK: i32 = 5;

pub(crate) type Shared<T> = Rc<RefCell<T>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum Facing {
    #[default]
    Down,
    Right,
    Up,
    Left,
}

impl Facing {
    /// Dominant axis wins; ties go to the horizontal axis.
    pub(crate) fn from_motion(dx: f32, dy: f32) -> Option<Self> {
        if dx == 0.0 && dy == 0.0 {
            return None;
        }
        let facing = if dx.abs() >= dy.abs() {
            if dx > 0.0 {
                Facing::Right
            } else {
                Facing::Left
            }
        } else if dy > 0.0 {
            Facing::Down
        } else {
            Facing::Up
        };
        Some(facing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PlayerProfile {
    pub(crate) hp: i32,
    pub(crate) max_hp: i32,
    pub(crate) attack: i32,
    pub(crate) facing: Facing,
}

impl Default for PlayerProfile {
    fn default() -> Self {
        Self {
            hp: PLAYER_BASE_HP,
            max_hp: PLAYER_BASE_HP,
            attack: PLAYER_BASE_ATTACK,
            facing: Facing::Down,
        }
    }
}

impl PlayerProfile {
    pub(crate) fn restore_full_hp(&mut self) {
        self.hp = self.max_hp;
    }

    pub(crate) fn set_hp(&mut self, hp: i32) {
        self.hp = hp.clamp(0, self.max_hp);
    }
}

/// Saved user preferences. The settings scene previews changes on the music
/// director and only writes here when they are applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct UserSettings {
    pub(crate) music_volume: f32,
}

/// Process-wide state shared between scenes and bus listeners.
#[derive(Clone)]
pub(crate) struct GameServices {
    pub(crate) profile: Shared<PlayerProfile>,
    pub(crate) settings: Shared<UserSettings>,
    pub(crate) music: Shared<MusicDirector>,
}

impl GameServices {
    pub(crate) fn new(music_volume: f32) -> Self {
        Self {
            profile: Rc::new(RefCell::new(PlayerProfile::default())),
            settings: Rc::new(RefCell::new(UserSettings { music_volume })),
            music: Rc::new(RefCell::new(MusicDirector::new(music_volume))),
        }
    }

    /// Rebuilds the player profile and music state. Saved settings survive.
    pub(crate) fn reset(&self) {
        *self.profile.borrow_mut() = PlayerProfile::default();
        let volume = self.settings.borrow().music_volume;
        *self.music.borrow_mut() = MusicDirector::new(volume);
    }
}
