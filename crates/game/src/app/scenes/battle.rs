use rpg_engine::{
    Camera2D, Canvas, Event, InputAction, InputSnapshot, Scene, SceneCommand, SceneContext, SceneId,
};
use tracing::{debug, info};

use super::{draw_gauge, MENU_BACKGROUND, PLAYER_COLOR};
use crate::app::services::GameServices;

const TIMING_WINDOW_START: f32 = 0.75;
const TIMING_WINDOW_END: f32 = 0.92;
const TIMING_EXCELLENT_START: f32 = 0.83;

const INTRO_SECONDS: f32 = 1.5;
const RESOLVE_SECONDS: f32 = 1.2;
/// Lunge progress units per second.
const ANIM_SPEED: f32 = 1.8;

const ENEMY_BASE_HP: i32 = 20;
const ENEMY_BASE_ATTACK: i32 = 4;

const COMBATANT_SIZE: i32 = 64;
const LUNGE_GAP: f32 = 40.0;
const ENEMY_COLOR: [u8; 4] = [190, 60, 60, 255];
const HINT_COLOR: [u8; 4] = [255, 203, 0, 255];
const CURSOR_COLOR: [u8; 4] = [253, 249, 0, 255];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BattlePhase {
    Intro,
    PlayerMenu,
    PlayerAttackAnim,
    ResolvePlayerAttack,
    EnemyAttackAnim,
    ResolveEnemyAttack,
    Win,
    Lose,
}

impl BattlePhase {
    const ALL: [BattlePhase; 8] = [
        BattlePhase::Intro,
        BattlePhase::PlayerMenu,
        BattlePhase::PlayerAttackAnim,
        BattlePhase::ResolvePlayerAttack,
        BattlePhase::EnemyAttackAnim,
        BattlePhase::ResolveEnemyAttack,
        BattlePhase::Win,
        BattlePhase::Lose,
    ];

    /// Wire id carried in `BattlePhaseChanged` payloads.
    pub(crate) const fn id(self) -> u32 {
        match self {
            BattlePhase::Intro => 0,
            BattlePhase::PlayerMenu => 1,
            BattlePhase::PlayerAttackAnim => 2,
            BattlePhase::ResolvePlayerAttack => 3,
            BattlePhase::EnemyAttackAnim => 4,
            BattlePhase::ResolveEnemyAttack => 5,
            BattlePhase::Win => 6,
            BattlePhase::Lose => 7,
        }
    }

    pub(crate) fn from_id(id: u32) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }

    fn is_over(self) -> bool {
        matches!(self, BattlePhase::Win | BattlePhase::Lose)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Timing {
    Miss,
    Good,
    Excellent,
}

impl Timing {
    fn grade(progress: f32) -> Self {
        if (TIMING_EXCELLENT_START..=TIMING_WINDOW_END).contains(&progress) {
            Timing::Excellent
        } else if (TIMING_WINDOW_START..TIMING_EXCELLENT_START).contains(&progress) {
            Timing::Good
        } else {
            Timing::Miss
        }
    }

    fn label(self) -> &'static str {
        match self {
            Timing::Miss => "MISS",
            Timing::Good => "GOOD!",
            Timing::Excellent => "EXCELLENT!",
        }
    }
}

fn attack_damage(attack: i32, timing: Timing) -> i32 {
    match timing {
        Timing::Excellent => attack * 2,
        Timing::Good => (attack as f32 * 1.5) as i32,
        Timing::Miss => attack,
    }
}

/// Damage the player takes. `None` means the player chose to defend.
fn incoming_damage(raw: i32, block: Option<Timing>) -> i32 {
    match block {
        None => raw / 2,
        Some(Timing::Excellent) => raw / 2,
        Some(Timing::Good) => raw * 3 / 4,
        Some(Timing::Miss) => raw,
    }
}

fn in_timing_window(progress: f32) -> bool {
    (TIMING_WINDOW_START..=TIMING_WINDOW_END).contains(&progress)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Combatant {
    hp: i32,
    max_hp: i32,
    attack: i32,
}

impl Combatant {
    fn take_damage(&mut self, amount: i32) {
        self.hp = (self.hp - amount).max(0);
    }

    fn hp_ratio(&self) -> f32 {
        if self.max_hp <= 0 {
            return 0.0;
        }
        self.hp as f32 / self.max_hp as f32
    }

    fn hp_color(&self) -> [u8; 4] {
        let ratio = self.hp_ratio().clamp(0.0, 1.0);
        [
            (255.0 * (1.0 - ratio)) as u8,
            (255.0 * ratio) as u8,
            40,
            255,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuChoice {
    Attack,
    Defend,
}

#[derive(Debug, Clone)]
struct BattleState {
    phase: BattlePhase,
    phase_timer: f32,
    anim_progress: f32,
    timing: Option<Timing>,
    cursor: MenuChoice,
    defending: bool,
    player: Combatant,
    enemy: Combatant,
    last_outcome: Option<String>,
}

impl BattleState {
    fn enter(&mut self, phase: BattlePhase, ctx: &mut SceneContext<'_>) {
        debug!(from = ?self.phase, to = ?phase, "battle_phase_entered");
        self.phase = phase;
        self.phase_timer = 0.0;
        self.anim_progress = 0.0;
        self.timing = None;
        ctx.bus.emit_or_drop(Event::battle_phase_changed(phase.id()));
    }

    fn advance_anim(&mut self, dt: f32) {
        self.anim_progress = (self.anim_progress + ANIM_SPEED * dt).clamp(0.0, 1.0);
    }

    fn record_timing_press(&mut self, input: &InputSnapshot) {
        if self.timing.is_none() && input.was_pressed(InputAction::Confirm) {
            self.timing = Some(Timing::grade(self.anim_progress));
        }
    }
}

/// Turn-based fight against a single enemy with timed attack and block
/// presses. Rebuilt on every entry.
pub(crate) struct BattleScene {
    services: GameServices,
    state: Option<BattleState>,
}

impl BattleScene {
    pub(crate) fn new(services: GameServices) -> Self {
        Self {
            services,
            state: None,
        }
    }

    fn leave(&self, state: &BattleState) -> SceneCommand {
        self.services.profile.borrow_mut().set_hp(state.player.hp);
        info!(
            phase = ?state.phase,
            player_hp = state.player.hp,
            enemy_hp = state.enemy.hp,
            "battle_left"
        );
        SceneCommand::SwitchTo(SceneId::Overworld)
    }
}

impl Scene for BattleScene {
    fn init(&mut self, _ctx: &mut SceneContext<'_>) {
        let profile = *self.services.profile.borrow();
        // Intro music is started by the scene-entered event.
        self.state = Some(BattleState {
            phase: BattlePhase::Intro,
            phase_timer: 0.0,
            anim_progress: 0.0,
            timing: None,
            cursor: MenuChoice::Attack,
            defending: false,
            player: Combatant {
                hp: profile.hp,
                max_hp: profile.max_hp,
                attack: profile.attack,
            },
            enemy: Combatant {
                hp: ENEMY_BASE_HP,
                max_hp: ENEMY_BASE_HP,
                attack: ENEMY_BASE_ATTACK,
            },
            last_outcome: None,
        });
    }

    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        ctx: &mut SceneContext<'_>,
    ) -> SceneCommand {
        let Some(mut state) = self.state.take() else {
            return SceneCommand::None;
        };
        state.phase_timer += fixed_dt_seconds;
        let command = match state.phase {
            BattlePhase::Intro => {
                if state.phase_timer >= INTRO_SECONDS {
                    state.enter(BattlePhase::PlayerMenu, ctx);
                }
                SceneCommand::None
            }
            BattlePhase::PlayerMenu => {
                if input.was_pressed(InputAction::MoveUp) {
                    state.cursor = MenuChoice::Attack;
                }
                if input.was_pressed(InputAction::MoveDown) {
                    state.cursor = MenuChoice::Defend;
                }
                if input.was_pressed(InputAction::Back) {
                    self.leave(&state)
                } else {
                    if input.was_pressed(InputAction::Confirm) {
                        state.defending = state.cursor == MenuChoice::Defend;
                        let next = if state.defending {
                            BattlePhase::EnemyAttackAnim
                        } else {
                            BattlePhase::PlayerAttackAnim
                        };
                        state.enter(next, ctx);
                    }
                    SceneCommand::None
                }
            }
            BattlePhase::PlayerAttackAnim => {
                state.advance_anim(fixed_dt_seconds);
                state.record_timing_press(input);
                if state.anim_progress >= 1.0 {
                    let timing = state.timing.unwrap_or(Timing::Miss);
                    let damage = attack_damage(state.player.attack, timing);
                    state.enemy.take_damage(damage);
                    state.last_outcome = Some(format!("{} {damage}", timing.label()));
                    state.enter(BattlePhase::ResolvePlayerAttack, ctx);
                }
                SceneCommand::None
            }
            BattlePhase::ResolvePlayerAttack => {
                if state.phase_timer >= RESOLVE_SECONDS {
                    if state.enemy.hp <= 0 {
                        state.enter(BattlePhase::Win, ctx);
                    } else {
                        state.defending = false;
                        state.enter(BattlePhase::EnemyAttackAnim, ctx);
                    }
                }
                SceneCommand::None
            }
            BattlePhase::EnemyAttackAnim => {
                state.advance_anim(fixed_dt_seconds);
                if !state.defending {
                    state.record_timing_press(input);
                }
                if state.anim_progress >= 1.0 {
                    let block = if state.defending {
                        None
                    } else {
                        Some(state.timing.unwrap_or(Timing::Miss))
                    };
                    let damage = incoming_damage(state.enemy.attack, block);
                    state.player.take_damage(damage);
                    let label = block.map_or("BLOCKED", Timing::label);
                    state.last_outcome = Some(format!("{label} {damage}"));
                    state.enter(BattlePhase::ResolveEnemyAttack, ctx);
                }
                SceneCommand::None
            }
            BattlePhase::ResolveEnemyAttack => {
                if state.phase_timer >= RESOLVE_SECONDS {
                    let next = if state.player.hp <= 0 {
                        BattlePhase::Lose
                    } else {
                        BattlePhase::PlayerMenu
                    };
                    state.enter(next, ctx);
                }
                SceneCommand::None
            }
            BattlePhase::Win | BattlePhase::Lose => {
                if input.was_pressed(InputAction::Confirm) || input.was_pressed(InputAction::Back) {
                    self.leave(&state)
                } else {
                    SceneCommand::None
                }
            }
        };
        self.state = Some(state);
        command
    }

    fn draw(&mut self, canvas: &mut Canvas<'_>, _camera: &Camera2D) {
        canvas.clear(MENU_BACKGROUND);
        let Some(state) = &self.state else {
            return;
        };
        let (width, height) = (canvas.width() as f32, canvas.height() as f32);
        let ground = height * 0.6;
        let player_rest = width * 0.2;
        let enemy_rest = width * 0.7;

        let mut player_x = player_rest;
        let mut enemy_x = enemy_rest;
        match state.phase {
            BattlePhase::PlayerAttackAnim => {
                player_x += (enemy_rest - LUNGE_GAP - player_rest) * state.anim_progress;
            }
            BattlePhase::EnemyAttackAnim => {
                enemy_x += (player_rest + LUNGE_GAP - enemy_rest) * state.anim_progress;
            }
            _ => {}
        }

        let top = ground as i32 - COMBATANT_SIZE;
        canvas.fill_rect(player_x as i32, top, COMBATANT_SIZE, COMBATANT_SIZE, PLAYER_COLOR);
        if state.enemy.hp > 0 || !state.phase.is_over() {
            canvas.fill_rect(enemy_x as i32, top, COMBATANT_SIZE, COMBATANT_SIZE, ENEMY_COLOR);
        }

        draw_gauge(
            canvas,
            player_rest as i32,
            top - 28,
            120,
            state.player.hp_ratio(),
            state.player.hp_color(),
        );
        draw_gauge(
            canvas,
            enemy_rest as i32,
            top - 28,
            120,
            state.enemy.hp_ratio(),
            state.enemy.hp_color(),
        );

        let lunging = matches!(
            state.phase,
            BattlePhase::PlayerAttackAnim | BattlePhase::EnemyAttackAnim
        );
        if lunging && !(state.phase == BattlePhase::EnemyAttackAnim && state.defending) {
            let bar_x = (width * 0.3) as i32;
            let bar_width = (width * 0.4) as i32;
            let bar_y = (height * 0.8) as i32;
            let fill = if in_timing_window(state.anim_progress) {
                HINT_COLOR
            } else {
                PLAYER_COLOR
            };
            draw_gauge(canvas, bar_x, bar_y, bar_width, state.anim_progress, fill);
            let window_x = bar_x + (bar_width as f32 * TIMING_WINDOW_START) as i32;
            let window_width =
                (bar_width as f32 * (TIMING_WINDOW_END - TIMING_WINDOW_START)) as i32;
            canvas.outline_rect(window_x, bar_y - 2, window_width, 20, HINT_COLOR);
        }

        if state.phase == BattlePhase::PlayerMenu {
            let row = match state.cursor {
                MenuChoice::Attack => 0,
                MenuChoice::Defend => 1,
            };
            let x = (width * 0.1) as i32;
            let y = (height * 0.75) as i32 + row * 28;
            canvas.fill_rect(x, y, 12, 12, CURSOR_COLOR);
        }
    }

    fn cleanup(&mut self, _ctx: &mut SceneContext<'_>) {
        self.state = None;
    }

    fn debug_title(&self) -> Option<String> {
        let state = self.state.as_ref()?;
        let mut title = format!(
            "Battle | {:?} | Player {}/{} | Goblin {}/{}",
            state.phase, state.player.hp, state.player.max_hp, state.enemy.hp, state.enemy.max_hp
        );
        if let Some(outcome) = &state.last_outcome {
            title.push_str(" | ");
            title.push_str(outcome);
        }
        if let Some(section) = self.services.music.borrow().active_section() {
            title.push_str(" | music ");
            title.push_str(section.name);
        }
        Some(title)
    }
}
