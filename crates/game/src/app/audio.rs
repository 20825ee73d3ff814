//! Music selection driven by bus events. Tracks which track and section
//! should be playing; audio output itself lives elsewhere.

use std::rc::Rc;

use rpg_engine::{EventBus, EventBusError, EventKind, EventPayload, SceneId};
use tracing::{debug, info, warn};

use super::scenes::BattlePhase;
use super::services::Shared;

pub(crate) const OVERWORLD_TRACK: &str = "overworld_bgm.mp3";
pub(crate) const BATTLE_TRACK: &str = "battle_bgm.mp3";

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct MusicSection {
    pub(crate) name: &'static str,
    pub(crate) start_seconds: f32,
    pub(crate) end_seconds: f32,
    pub(crate) looping: bool,
}

const BATTLE_SECTIONS: [MusicSection; 5] = [
    MusicSection {
        name: "intro",
        start_seconds: 0.0,
        end_seconds: 5.0,
        looping: false,
    },
    MusicSection {
        name: "battle_loop",
        start_seconds: 5.0,
        end_seconds: 45.0,
        looping: true,
    },
    MusicSection {
        name: "attack_hit",
        start_seconds: 45.0,
        end_seconds: 48.0,
        looping: false,
    },
    MusicSection {
        name: "victory",
        start_seconds: 48.0,
        end_seconds: 58.0,
        looping: false,
    },
    MusicSection {
        name: "defeat",
        start_seconds: 58.0,
        end_seconds: 68.0,
        looping: false,
    },
];

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MusicDirector {
    volume: f32,
    track: Option<String>,
    looping: bool,
    sections: Vec<MusicSection>,
    active_section: Option<usize>,
    lookup_misses: u32,
}

impl MusicDirector {
    pub(crate) fn new(volume: f32) -> Self {
        Self {
            volume: volume.clamp(0.0, 1.0),
            track: None,
            looping: false,
            sections: Vec::new(),
            active_section: None,
            lookup_misses: 0,
        }
    }

    pub(crate) fn volume(&self) -> f32 {
        self.volume
    }

    pub(crate) fn set_music_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    pub(crate) fn current_track(&self) -> Option<&str> {
        self.track.as_deref()
    }

    pub(crate) fn is_looping(&self) -> bool {
        self.looping
    }

    pub(crate) fn active_section(&self) -> Option<&MusicSection> {
        self.sections.get(self.active_section?)
    }

    #[cfg(test)]
    pub(crate) fn lookup_misses(&self) -> u32 {
        self.lookup_misses
    }

    /// Switches tracks. Requesting the current track again is a no-op.
    pub(crate) fn play_music(&mut self, track: &str, looping: bool) -> bool {
        if self.track.as_deref() == Some(track) {
            return false;
        }
        info!(from = self.track.as_deref(), to = track, looping, "music_track_changed");
        self.track = Some(track.to_string());
        self.looping = looping;
        self.sections.clear();
        self.active_section = None;
        true
    }

    pub(crate) fn define_sections(&mut self, sections: &[MusicSection]) {
        self.sections = sections.to_vec();
        self.active_section = None;
    }

    /// Returns false and counts a lookup miss when no track is playing or the
    /// section is unknown.
    pub(crate) fn play_section(&mut self, name: &str) -> bool {
        if self.track.is_none() {
            self.lookup_misses = self.lookup_misses.saturating_add(1);
            debug!(section = name, "music_section_without_track");
            return false;
        }
        match self.sections.iter().position(|section| section.name == name) {
            Some(index) => {
                let section = self.sections[index];
                self.active_section = Some(index);
                debug!(
                    section = name,
                    start_seconds = section.start_seconds,
                    end_seconds = section.end_seconds,
                    looping = section.looping,
                    "music_section_started"
                );
                true
            }
            None => {
                self.lookup_misses = self.lookup_misses.saturating_add(1);
                warn!(section = name, misses = self.lookup_misses, "music_section_not_found");
                false
            }
        }
    }

    /// Scenes without a track of their own keep whatever is playing.
    pub(crate) fn on_scene_entered(&mut self, scene: SceneId) {
        match scene {
            SceneId::Overworld => {
                self.play_music(OVERWORLD_TRACK, true);
            }
            SceneId::Battle => {
                self.play_music(BATTLE_TRACK, false);
                self.define_sections(&BATTLE_SECTIONS);
                self.play_section("intro");
            }
            SceneId::Menu | SceneId::Dungeon1 | SceneId::Settings => {}
        }
    }

    pub(crate) fn on_battle_phase_changed(&mut self, phase: u32) {
        let Some(phase) = BattlePhase::from_id(phase) else {
            warn!(phase, "battle_phase_unknown");
            return;
        };
        if let Some(section) = section_for_phase(phase) {
            self.play_section(section);
        }
    }
}

fn section_for_phase(phase: BattlePhase) -> Option<&'static str> {
    match phase {
        BattlePhase::Intro => Some("intro"),
        BattlePhase::PlayerMenu => Some("battle_loop"),
        BattlePhase::PlayerAttackAnim => Some("attack_hit"),
        BattlePhase::Win => Some("victory"),
        BattlePhase::Lose => Some("defeat"),
        BattlePhase::ResolvePlayerAttack
        | BattlePhase::EnemyAttackAnim
        | BattlePhase::ResolveEnemyAttack => None,
    }
}

/// Registers the director's listeners on `bus`.
pub(crate) fn subscribe_music(
    music: &Shared<MusicDirector>,
    bus: &mut EventBus,
) -> Result<(), EventBusError> {
    let director = Rc::clone(music);
    bus.subscribe(EventKind::SceneEntered, move |event, _| {
        if let EventPayload::Scene(scene) = event.payload {
            director.borrow_mut().on_scene_entered(scene);
        }
    })?;
    let director = Rc::clone(music);
    bus.subscribe(EventKind::BattlePhaseChanged, move |event, _| {
        if let EventPayload::Phase(phase) = event.payload {
            director.borrow_mut().on_battle_phase_changed(phase);
        }
    })?;
    Ok(())
}
