//! Ability and spell records.
//!
//! The engine consumes these read-only: id, cost, cooldown, target shape and
//! a declarative special-effect tag the pipeline switches on. Both player
//! abilities and monster abilities come out of the same vocabulary, so both
//! sides of a fight share one effect language. External games provide their
//! own catalog through [`AbilityCatalog`]; [`BuiltinCatalog`] carries the
//! stock class abilities and combat spells.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::status::StatusKind;

/// Stable identifier for an ability or spell.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct AbilityId(pub u32);

/// What an action costs to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cost {
    Free,
    Stamina(i64),
    Mana(i64),
}

/// Who an ability can be aimed at.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter,
)]
pub enum TargetShape {
    /// Always the actor.
    SelfOnly,
    /// One living enemy.
    SingleEnemy,
    /// Every living enemy (total damage split across them).
    AllEnemies,
    /// One living party member (including the actor).
    Ally,
}

/// Declarative effect tag; the pipeline's effect switch interprets these.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SpecialEffect {
    /// Weapon strike at `mult_pct`% of normal power.
    Strike { mult_pct: i64 },
    /// Strike with bonus damage against targets below an HP threshold.
    Execute { threshold_pct: i64, bonus_pct: i64 },
    /// Total damage at `mult_pct`% of normal power, split over all enemies.
    AreaStrike { mult_pct: i64 },
    /// Direct (unrolled) magic damage scaling with intelligence.
    MagicDamage { base: i64, int_div: i64 },
    /// Try to inflict a status; the target resists on a d20 >= `resist_dc`.
    Inflict {
        kind: StatusKind,
        rounds: u32,
        magnitude: i64,
        resist_dc: u32,
    },
    /// Restore HP: `base` plus intelligence / `int_div`.
    Heal { base: i64, int_div: i64 },
    /// Temporary attack bonus.
    BuffAttack { amount: i64, rounds: u32 },
    /// Temporary defense bonus.
    BuffDefense { amount: i64, rounds: u32 },
    /// Temporary immunity to new negative statuses.
    Ward { rounds: u32 },
    /// Strike that heals the actor for `drain_pct`% of damage dealt.
    LifeDrain { mult_pct: i64, drain_pct: i64 },
}

/// One catalog record. Static data, not serialized state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ability {
    pub id: AbilityId,
    pub name: &'static str,
    pub cost: Cost,
    /// Rounds before the ability can be used again; 0 means none.
    pub cooldown: u32,
    pub shape: TargetShape,
    pub effect: SpecialEffect,
    pub min_level: i32,
}

/// Read-only ability/spell lookup.
pub trait AbilityCatalog {
    fn lookup(&self, id: AbilityId) -> Option<&Ability>;
    fn all(&self) -> &[Ability];
}

// Stock ability ids. Grouped: warrior-style stamina abilities, then spells,
// then monster/boss abilities.
pub const POWER_STRIKE: AbilityId = AbilityId(1);
pub const SHIELD_WALL: AbilityId = AbilityId(2);
pub const BATTLE_CRY: AbilityId = AbilityId(3);
pub const THUNDERING_ROAR: AbilityId = AbilityId(4);
pub const EXECUTE: AbilityId = AbilityId(5);
pub const WHIRLWIND: AbilityId = AbilityId(6);
pub const RAGE: AbilityId = AbilityId(7);
pub const HUNTERS_MARK: AbilityId = AbilityId(8);

pub const FIREBOLT: AbilityId = AbilityId(20);
pub const FROST_LANCE: AbilityId = AbilityId(21);
pub const MENDING: AbilityId = AbilityId(22);
pub const GREATER_MENDING: AbilityId = AbilityId(23);
pub const BLESSING: AbilityId = AbilityId(24);
pub const SANCTUARY: AbilityId = AbilityId(25);
pub const SIPHON_LIFE: AbilityId = AbilityId(26);

pub const REND: AbilityId = AbilityId(40);
pub const TERRIFYING_HOWL: AbilityId = AbilityId(41);
pub const VENOM_SPIT: AbilityId = AbilityId(42);
pub const CRUSHING_BLOW: AbilityId = AbilityId(43);
pub const DEVOURING_MAW: AbilityId = AbilityId(44);
pub const EARTHSHATTER: AbilityId = AbilityId(45);
pub const DOOM_GAZE: AbilityId = AbilityId(46);

static ABILITIES: &[Ability] = &[
    Ability {
        id: POWER_STRIKE,
        name: "Power Strike",
        cost: Cost::Stamina(15),
        cooldown: 0,
        shape: TargetShape::SingleEnemy,
        effect: SpecialEffect::Strike { mult_pct: 150 },
        min_level: 1,
    },
    Ability {
        id: SHIELD_WALL,
        name: "Shield Wall",
        cost: Cost::Stamina(25),
        cooldown: 3,
        shape: TargetShape::SelfOnly,
        effect: SpecialEffect::BuffDefense {
            amount: 15,
            rounds: 3,
        },
        min_level: 3,
    },
    Ability {
        id: BATTLE_CRY,
        name: "Battle Cry",
        cost: Cost::Stamina(30),
        cooldown: 4,
        shape: TargetShape::SelfOnly,
        effect: SpecialEffect::BuffAttack {
            amount: 12,
            rounds: 3,
        },
        min_level: 5,
    },
    Ability {
        id: THUNDERING_ROAR,
        name: "Thundering Roar",
        cost: Cost::Stamina(40),
        cooldown: 5,
        shape: TargetShape::SingleEnemy,
        effect: SpecialEffect::Inflict {
            kind: StatusKind::Feared,
            rounds: 2,
            magnitude: 0,
            resist_dc: 14,
        },
        min_level: 8,
    },
    Ability {
        id: EXECUTE,
        name: "Execute",
        cost: Cost::Stamina(40),
        cooldown: 2,
        shape: TargetShape::SingleEnemy,
        effect: SpecialEffect::Execute {
            threshold_pct: 30,
            bonus_pct: 100,
        },
        min_level: 10,
    },
    Ability {
        id: WHIRLWIND,
        name: "Whirlwind",
        cost: Cost::Stamina(60),
        cooldown: 3,
        shape: TargetShape::AllEnemies,
        effect: SpecialEffect::AreaStrike { mult_pct: 180 },
        min_level: 12,
    },
    Ability {
        id: RAGE,
        name: "Rage",
        cost: Cost::Stamina(35),
        cooldown: 5,
        shape: TargetShape::SelfOnly,
        effect: SpecialEffect::Inflict {
            kind: StatusKind::Raging,
            rounds: 3,
            magnitude: 0,
            resist_dc: 0,
        },
        min_level: 4,
    },
    Ability {
        id: HUNTERS_MARK,
        name: "Hunter's Mark",
        cost: Cost::Stamina(20),
        cooldown: 2,
        shape: TargetShape::SingleEnemy,
        effect: SpecialEffect::Inflict {
            kind: StatusKind::Marked,
            rounds: 4,
            magnitude: crate::consts::MARKED_BONUS_PCT,
            resist_dc: 0,
        },
        min_level: 2,
    },
    // Spells
    Ability {
        id: FIREBOLT,
        name: "Firebolt",
        cost: Cost::Mana(12),
        cooldown: 0,
        shape: TargetShape::SingleEnemy,
        effect: SpecialEffect::MagicDamage { base: 10, int_div: 2 },
        min_level: 1,
    },
    Ability {
        id: FROST_LANCE,
        name: "Frost Lance",
        cost: Cost::Mana(18),
        cooldown: 2,
        shape: TargetShape::SingleEnemy,
        effect: SpecialEffect::Inflict {
            kind: StatusKind::Frozen,
            rounds: 1,
            magnitude: 0,
            resist_dc: 13,
        },
        min_level: 6,
    },
    Ability {
        id: MENDING,
        name: "Mending",
        cost: Cost::Mana(10),
        cooldown: 0,
        shape: TargetShape::Ally,
        effect: SpecialEffect::Heal { base: 15, int_div: 2 },
        min_level: 1,
    },
    Ability {
        id: GREATER_MENDING,
        name: "Greater Mending",
        cost: Cost::Mana(25),
        cooldown: 2,
        shape: TargetShape::Ally,
        effect: SpecialEffect::Heal { base: 40, int_div: 1 },
        min_level: 9,
    },
    Ability {
        id: BLESSING,
        name: "Blessing",
        cost: Cost::Mana(15),
        cooldown: 3,
        shape: TargetShape::Ally,
        effect: SpecialEffect::BuffAttack {
            amount: 8,
            rounds: 4,
        },
        min_level: 3,
    },
    Ability {
        id: SANCTUARY,
        name: "Sanctuary",
        cost: Cost::Mana(30),
        cooldown: 5,
        shape: TargetShape::Ally,
        effect: SpecialEffect::Ward { rounds: 3 },
        min_level: 11,
    },
    Ability {
        id: SIPHON_LIFE,
        name: "Siphon Life",
        cost: Cost::Mana(22),
        cooldown: 2,
        shape: TargetShape::SingleEnemy,
        effect: SpecialEffect::LifeDrain {
            mult_pct: 100,
            drain_pct: 50,
        },
        min_level: 7,
    },
    // Monster abilities
    Ability {
        id: REND,
        name: "Rend",
        cost: Cost::Free,
        cooldown: 2,
        shape: TargetShape::SingleEnemy,
        effect: SpecialEffect::Inflict {
            kind: StatusKind::Poisoned,
            rounds: 3,
            magnitude: 3,
            resist_dc: 12,
        },
        min_level: 1,
    },
    Ability {
        id: TERRIFYING_HOWL,
        name: "Terrifying Howl",
        cost: Cost::Free,
        cooldown: 4,
        shape: TargetShape::SingleEnemy,
        effect: SpecialEffect::Inflict {
            kind: StatusKind::Feared,
            rounds: 1,
            magnitude: 0,
            resist_dc: 13,
        },
        min_level: 3,
    },
    Ability {
        id: VENOM_SPIT,
        name: "Venom Spit",
        cost: Cost::Free,
        cooldown: 3,
        shape: TargetShape::SingleEnemy,
        effect: SpecialEffect::Inflict {
            kind: StatusKind::Poisoned,
            rounds: 4,
            magnitude: 5,
            resist_dc: 14,
        },
        min_level: 5,
    },
    Ability {
        id: CRUSHING_BLOW,
        name: "Crushing Blow",
        cost: Cost::Free,
        cooldown: 3,
        shape: TargetShape::SingleEnemy,
        effect: SpecialEffect::Strike { mult_pct: 200 },
        min_level: 5,
    },
    // Boss abilities, phase-gated by the director
    Ability {
        id: DEVOURING_MAW,
        name: "Devouring Maw",
        cost: Cost::Free,
        cooldown: 3,
        shape: TargetShape::SingleEnemy,
        effect: SpecialEffect::LifeDrain {
            mult_pct: 150,
            drain_pct: 100,
        },
        min_level: 1,
    },
    Ability {
        id: EARTHSHATTER,
        name: "Earthshatter",
        cost: Cost::Free,
        cooldown: 4,
        shape: TargetShape::AllEnemies,
        effect: SpecialEffect::AreaStrike { mult_pct: 220 },
        min_level: 1,
    },
    Ability {
        id: DOOM_GAZE,
        name: "Doom Gaze",
        cost: Cost::Free,
        cooldown: 5,
        shape: TargetShape::SingleEnemy,
        effect: SpecialEffect::Inflict {
            kind: StatusKind::Stunned,
            rounds: 2,
            magnitude: 0,
            resist_dc: 16,
        },
        min_level: 1,
    },
];

/// The stock catalog.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinCatalog;

impl AbilityCatalog for BuiltinCatalog {
    fn lookup(&self, id: AbilityId) -> Option<&Ability> {
        ABILITIES.iter().find(|a| a.id == id)
    }

    fn all(&self) -> &[Ability] {
        ABILITIES
    }
}
