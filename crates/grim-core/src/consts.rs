//! Combat tuning constants.
//!
//! Every knob the resolution pipeline, boss director, and reward resolver
//! use lives here so balance changes stay in one place.

use std::time::Duration;

/// Maximum party size including the leader.
pub const PARTY_MAX_SIZE: usize = 4;

/// Hard ceiling on rounds before a fight is called a draw (headless only).
pub const HEADLESS_MAX_ROUNDS: u32 = 30;

// -- Attack math ------------------------------------------------------------

/// Level contribution to base attack power: `level * LEVEL_TERM_FACTOR`.
pub const LEVEL_TERM_FACTOR: i64 = 2;

/// Weapon power above this contributes at [`WEAPON_SOFT_CAP_RATE`].
pub const WEAPON_POWER_SOFT_CAP: i64 = 100;

/// Diminishing-returns rate for weapon power above the soft cap.
pub const WEAPON_SOFT_CAP_RATE: f64 = 0.5;

/// Armor above this contributes as `cap + sqrt(excess)`.
pub const ARMOR_SOFT_CAP: i64 = 60;

/// Damage variance band applied to base power (uniform).
pub const DAMAGE_VARIANCE_MIN: f64 = 0.8;
pub const DAMAGE_VARIANCE_MAX: f64 = 1.2;

/// Critical hit multiplier on a natural 20.
pub const CRIT_MULTIPLIER: f64 = 1.5;

/// Flat power bonus for a two-handed grip.
pub const TWO_HANDED_BONUS: i64 = 10;

/// Off-hand swings land at this fraction of main-hand power.
pub const OFFHAND_EFFECTIVENESS: f64 = 0.5;

/// Extra damage taken by a Marked target, in percent.
pub const MARKED_BONUS_PCT: i64 = 25;

/// Minimum damage on any successful hit.
pub const DAMAGE_FLOOR: i64 = 1;

// -- Escape -----------------------------------------------------------------

/// Base escape chance in percent before stat bonuses.
pub const ESCAPE_BASE_CHANCE: i64 = 40;

/// Escape chance never exceeds this, no matter the stats.
pub const ESCAPE_CHANCE_CAP: i64 = 75;

// -- Monster AI -------------------------------------------------------------

/// Chance (percent) a regular monster opens with a special ability.
pub const MONSTER_ABILITY_CHANCE: u32 = 20;

/// Chance (percent) a boss opens with a special ability.
pub const BOSS_ABILITY_CHANCE: u32 = 50;

/// Target-lottery base weight every candidate starts with.
pub const LOTTERY_BASE_WEIGHT: i64 = 10;

/// Extra lottery weight while a candidate is defending.
pub const LOTTERY_DEFEND_WEIGHT: i64 = 20;

/// Scale for the low-HP "smell blood" lottery bonus.
pub const LOTTERY_BLOOD_WEIGHT: f64 = 15.0;

// -- Boss director ----------------------------------------------------------

/// Default HP fractions for phase 2 and phase 3.
pub const PHASE_2_THRESHOLD: f64 = 0.50;
pub const PHASE_3_THRESHOLD: f64 = 0.20;

/// Rounds between extra minion waves once a boss reaches phase 2.
pub const SUMMON_CADENCE: u32 = 3;

/// Minimum alignment score for the boss redemption path.
pub const REDEMPTION_MIN_ALIGNMENT: i64 = 25;

// -- Status & resources -----------------------------------------------------

/// Flat stamina regenerated at end of round (plus dexterity / 10).
pub const STAMINA_REGEN_BASE: i64 = 5;

/// Flat mana regenerated at end of round for casters (plus intelligence / 8).
pub const MANA_REGEN_BASE: i64 = 3;

// -- Rewards ----------------------------------------------------------------

/// Clamp band for the per-earner level-difference XP multiplier.
pub const XP_LEVEL_MULT_MIN: f64 = 0.25;
pub const XP_LEVEL_MULT_MAX: f64 = 2.0;

/// Per-level step of the level-difference multiplier.
pub const XP_LEVEL_MULT_STEP: f64 = 0.1;

/// Flat bonus (percent) when any allies fought alongside the earner.
pub const TEAM_BONUS_PCT: i64 = 10;

/// Team balance penalty tiers: (max level gap to highest member, multiplier).
pub const TEAM_BALANCE_TIERS: [(i32, f64); 4] =
    [(5, 1.0), (10, 0.75), (15, 0.5), (20, 0.35)];

/// Multiplier once the gap exceeds the last tier.
pub const TEAM_BALANCE_FLOOR: f64 = 0.25;

/// Drop chance (percent) for an elite ("mini-boss") monster.
pub const ELITE_DROP_CHANCE: u32 = 60;

/// Cap on the level-scaled drop chance of a regular monster.
pub const REGULAR_DROP_CHANCE_CAP: u32 = 25;

// -- Gateway ----------------------------------------------------------------

/// Ceiling on how long the driver waits for a remote participant's action.
pub const TURN_WAIT: Duration = Duration::from_secs(30);
