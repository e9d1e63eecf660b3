//! The shared combatant model.
//!
//! Players, grouped humans, NPC allies, monsters and bosses are all the same
//! struct: one closed kind enum plus a capability bitset, so the resolution
//! pipeline never branches on "is this a player". HP is clamped to
//! `[0, max_hp]` at the only mutation points ([`Combatant::apply_damage`] /
//! [`Combatant::heal`]); a combatant at 0 HP drops out of the turn order but
//! stays in the roster for end-of-combat bookkeeping.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::errors::CombatError;
use crate::status::StatusLedger;

/// Stable identifier for a combatant within one session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct CombatantId(pub u32);

bitflags! {
    /// What a combatant is mechanically able to do.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Capabilities: u8 {
        const ATTACK      = 0b0001;
        const CAST        = 0b0010;
        const USE_ABILITY = 0b0100;
        /// Controlled by a remote human session (grouped participant).
        const REMOTE      = 0b1000;
    }
}

/// Which variant of combatant this is.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter,
)]
pub enum CombatantKind {
    /// The local human running the session.
    Leader,
    /// A remote human sharing the session.
    GroupedAlly,
    /// An AI-controlled companion.
    NpcAlly,
    /// A regular AI monster.
    Monster,
    /// A monster with phase state attached (see [`crate::boss::BossDirector`]).
    Boss,
}

impl CombatantKind {
    /// True for the party side of the roster.
    pub fn is_party(self) -> bool {
        matches!(
            self,
            CombatantKind::Leader | CombatantKind::GroupedAlly | CombatantKind::NpcAlly
        )
    }

    /// True for the monster side.
    pub fn is_monster(self) -> bool {
        matches!(self, CombatantKind::Monster | CombatantKind::Boss)
    }
}

/// Role archetype, used by the monster target lottery and ally AI.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumIter,
)]
pub enum Archetype {
    /// Front line, draws the most attention.
    Tank,
    /// Heavy melee.
    #[default]
    Bruiser,
    /// Fast, lightly armored.
    Skirmisher,
    /// Spell-focused.
    Caster,
    /// Keeps the party standing.
    Healer,
}

impl Archetype {
    /// Lottery weight contribution: tanks draw fire, casters hide behind them.
    pub fn lottery_weight(self) -> i64 {
        match self {
            Archetype::Tank => 30,
            Archetype::Bruiser => 20,
            Archetype::Skirmisher => 12,
            Archetype::Healer => 10,
            Archetype::Caster => 8,
        }
    }
}

/// Core stat block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub strength: i64,
    pub dexterity: i64,
    pub intelligence: i64,
    pub defense: i64,
    /// Armor value before the square-root soft cap.
    pub armor: i64,
}

/// One combatant: player, ally or monster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Combatant {
    pub id: CombatantId,
    pub name: String,
    pub kind: CombatantKind,
    pub caps: Capabilities,
    pub archetype: Archetype,
    pub level: i32,

    pub hp: i64,
    pub max_hp: i64,
    pub mana: i64,
    pub max_mana: i64,
    pub stamina: i64,
    pub max_stamina: i64,

    pub stats: Stats,

    /// Positive is good; gates the boss redemption path and faction effects.
    pub alignment: i64,

    /// Timed statuses, temporary bonuses and ability cooldowns.
    pub ledger: StatusLedger,

    /// Raised by the Defend action until the combatant's next turn.
    pub defending: bool,

    /// Grouped participant who retreated individually; out of the fight but
    /// still in the roster.
    pub retreated: bool,

    /// Abilities this combatant may select (players: learned; monsters:
    /// their ability table).
    pub abilities: Vec<crate::catalog::AbilityId>,

    /// Elite ("mini-boss") monsters use the high drop-chance tier.
    pub elite: bool,

    /// Base reward values, monsters only.
    pub xp_value: i64,
    pub gold_value: i64,
}

impl Combatant {
    /// A blank combatant; callers fill in what they need.
    fn base(id: CombatantId, name: &str, kind: CombatantKind, level: i32) -> Self {
        Self {
            id,
            name: name.to_string(),
            kind,
            caps: Capabilities::ATTACK,
            archetype: Archetype::default(),
            level,
            hp: 1,
            max_hp: 1,
            mana: 0,
            max_mana: 0,
            stamina: 0,
            max_stamina: 0,
            stats: Stats::default(),
            alignment: 0,
            ledger: StatusLedger::default(),
            defending: false,
            retreated: false,
            abilities: Vec::new(),
            elite: false,
            xp_value: 0,
            gold_value: 0,
        }
    }

    /// Level-scaled local human leader.
    pub fn leader(id: CombatantId, name: &str, level: i32) -> Self {
        let mut c = Self::base(id, name, CombatantKind::Leader, level);
        c.caps = Capabilities::ATTACK | Capabilities::CAST | Capabilities::USE_ABILITY;
        let l = level as i64;
        c.max_hp = 50 + l * 12;
        c.hp = c.max_hp;
        c.max_mana = 20 + l * 5;
        c.mana = c.max_mana;
        c.max_stamina = 40 + l * 6;
        c.stamina = c.max_stamina;
        c.stats = Stats {
            strength: 10 + l * 2,
            dexterity: 8 + l * 2,
            intelligence: 8 + l,
            defense: 8 + l * 2,
            armor: 5 + l,
        };
        c
    }

    /// A remote grouped human; stats mirror the leader's curve.
    pub fn grouped_ally(id: CombatantId, name: &str, level: i32) -> Self {
        let mut c = Self::leader(id, name, level);
        c.kind = CombatantKind::GroupedAlly;
        c.caps |= Capabilities::REMOTE;
        c
    }

    /// An AI companion.
    pub fn npc_ally(id: CombatantId, name: &str, level: i32, archetype: Archetype) -> Self {
        let mut c = Self::leader(id, name, level);
        c.kind = CombatantKind::NpcAlly;
        c.archetype = archetype;
        c
    }

    /// A level-scaled monster.
    pub fn monster(id: CombatantId, name: &str, level: i32) -> Self {
        let mut c = Self::base(id, name, CombatantKind::Monster, level);
        c.caps = Capabilities::ATTACK | Capabilities::USE_ABILITY;
        let l = level as i64;
        c.max_hp = 30 + l * 10;
        c.hp = c.max_hp;
        c.max_stamina = 100;
        c.stamina = 100;
        c.stats = Stats {
            strength: 8 + l * 2,
            dexterity: 6 + l,
            intelligence: 4 + l,
            defense: 6 + l,
            armor: 3 + l,
        };
        c.xp_value = 20 + l * 15;
        c.gold_value = 10 + l * 8;
        c
    }

    /// A boss-kind monster; the phase state itself lives on the session.
    pub fn boss(id: CombatantId, name: &str, level: i32) -> Self {
        let mut c = Self::monster(id, name, level);
        c.kind = CombatantKind::Boss;
        let l = level as i64;
        c.max_hp = 200 + l * 30;
        c.hp = c.max_hp;
        c.max_mana = 50 + l * 10;
        c.mana = c.max_mana;
        c.xp_value = 200 + l * 60;
        c.gold_value = 150 + l * 40;
        c
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// Alive, still present, and therefore in the turn order.
    pub fn takes_turns(&self) -> bool {
        self.is_alive() && !self.retreated
    }

    /// Current HP as a fraction of max, in [0, 1].
    pub fn hp_fraction(&self) -> f64 {
        if self.max_hp <= 0 {
            return 0.0;
        }
        (self.hp.max(0) as f64 / self.max_hp as f64).clamp(0.0, 1.0)
    }

    /// Apply damage, clamping HP at 0. Returns the damage actually taken.
    pub fn apply_damage(&mut self, amount: i64) -> i64 {
        let amount = amount.max(0);
        let taken = amount.min(self.hp);
        self.hp -= taken;
        taken
    }

    /// Heal, clamping at max HP. Returns the amount actually restored.
    pub fn heal(&mut self, amount: i64) -> i64 {
        let amount = amount.max(0);
        let restored = amount.min(self.max_hp - self.hp);
        self.hp += restored;
        restored
    }

    /// Spend stamina or fail without mutating anything.
    pub fn spend_stamina(&mut self, cost: i64) -> Result<(), CombatError> {
        if self.stamina < cost {
            return Err(CombatError::InsufficientStamina {
                have: self.stamina,
                need: cost,
            });
        }
        self.stamina -= cost;
        Ok(())
    }

    /// Spend mana or fail without mutating anything.
    pub fn spend_mana(&mut self, cost: i64) -> Result<(), CombatError> {
        if self.mana < cost {
            return Err(CombatError::InsufficientMana {
                have: self.mana,
                need: cost,
            });
        }
        self.mana -= cost;
        Ok(())
    }

    /// Regenerate stamina/mana, clamped to max.
    pub fn regenerate(&mut self, stamina: i64, mana: i64) {
        self.stamina = (self.stamina + stamina.max(0)).min(self.max_stamina);
        if self.caps.contains(Capabilities::CAST) {
            self.mana = (self.mana + mana.max(0)).min(self.max_mana);
        }
    }
}
