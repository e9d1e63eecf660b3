//! External collaborator seams.
//!
//! Equipment, factions, world events, drugs and artifacts are pure query
//! providers: given a combatant they return multipliers or flat bonuses and
//! have no side effects of their own. Persistence is invoked fire-and-forget
//! on victory. Pacing is purely presentational; correctness never depends on
//! it and tests run with the no-op default.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::combatant::Combatant;

/// How the actor's weapon is held.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumIter,
)]
pub enum Grip {
    #[default]
    OneHanded,
    /// Flat power bonus.
    TwoHanded,
    /// Off-hand swing at reduced effectiveness.
    DualWield,
}

/// Elemental enchantment on a weapon; each proc rolls independently on hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumIter)]
pub enum EnchantKind {
    /// Bonus fire damage plus a burn.
    Flame,
    /// Slows the target.
    Frost,
    /// Burns the target's mana.
    Shock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnchantProc {
    pub kind: EnchantKind,
    /// Independent trigger chance per hit, percent.
    pub chance_pct: u32,
    pub magnitude: i64,
}

/// Poison coatings applied to a weapon. Charges are counted in *combats*,
/// not rounds; the provider decrements them via
/// [`EquipmentProvider::combat_ended`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumIter)]
pub enum CoatingKind {
    /// Chance to stun on hit.
    Numbing,
    /// Weakens the target on hit.
    Withering,
    /// Grants lifesteal on hit.
    Leeching,
    /// Flat bonus damage on hit.
    Virulent,
}

/// Everything the pipeline needs to know about a combatant's gear, as an
/// opaque snapshot. The item catalog behind it is out of scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EquipmentProfile {
    /// Raw weapon power, before the soft cap.
    pub weapon_power: i64,
    /// Off-hand weapon power (dual wield only).
    pub offhand_power: i64,
    /// Raw armor value, before the square-root soft cap.
    pub armor_power: i64,
    pub grip: Grip,
    pub procs: Vec<EnchantProc>,
    pub coatings: Vec<CoatingKind>,
    /// Fraction of melee damage reflected back at attackers, percent.
    pub thorns_pct: i64,
    /// Fraction of damage dealt returned as HP, percent.
    pub lifesteal_pct: i64,
    /// Fraction of damage dealt returned as mana, percent.
    pub manasteal_pct: i64,
}

/// Opaque equipment stat provider.
pub trait EquipmentProvider {
    /// Gear snapshot for a combatant. The default is bare-handed.
    fn profile(&self, _combatant: &Combatant) -> EquipmentProfile {
        EquipmentProfile::default()
    }

    /// Called once when a combat ends so coating charges (counted in
    /// combats) can be consumed. Default: nothing to consume.
    fn combat_ended(&mut self, _combatant_name: &str) {}
}

/// Faction and alignment effects.
pub trait FactionProvider {
    /// Damage multiplier for this attacker/target pairing (e.g. bonus
    /// against "evil" archetypes).
    fn attack_multiplier(&self, _actor: &Combatant, _target: &Combatant) -> f64 {
        1.0
    }

    /// Percent of damage dealt returned as HP for "dark" alignments.
    fn life_drain_pct(&self, _actor: &Combatant) -> i64 {
        0
    }

    /// Flat escape-chance bonus (class/faction).
    fn escape_bonus(&self, _actor: &Combatant) -> i64 {
        0
    }
}

/// World-event and difficulty multipliers, plus accumulation bonuses
/// (study/library, new-game-plus) applied per earner.
pub trait WorldEventProvider {
    fn damage_multiplier(&self) -> f64 {
        1.0
    }
    fn xp_multiplier(&self) -> f64 {
        1.0
    }
    fn gold_multiplier(&self) -> f64 {
        1.0
    }
    fn accumulation_bonus(&self, _earner_name: &str) -> f64 {
        1.0
    }
}

/// Consumable/drug effects.
pub trait DrugProvider {
    /// Flat attack power bonus from active consumables.
    fn power_bonus(&self, _combatant: &Combatant) -> i64 {
        0
    }
}

/// Artifact effects.
pub trait ArtifactProvider {
    /// Flat attack power bonus from held artifacts.
    fn power_bonus(&self, _combatant: &Combatant) -> i64 {
        0
    }

    /// Whether the combatant holds the consumable relic that opens the boss
    /// redemption path.
    fn holds_redemption_relic(&self, _combatant: &Combatant) -> bool {
        false
    }
}

/// Auto-save sink. Invoked once on victory, fire-and-forget; failures are
/// logged and swallowed, never propagated into combat state.
pub trait Persistence {
    fn autosave(&mut self, _payload_json: &str) -> Result<(), String> {
        Ok(())
    }
}

/// Presentation pacing. The session calls [`Pacing::beat`] between dramatic
/// moments; ordering and correctness never depend on it.
pub trait Pacing {
    fn beat(&mut self) {}
}

/// Neutral implementation of every provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct Neutral;

impl EquipmentProvider for Neutral {}
impl FactionProvider for Neutral {}
impl WorldEventProvider for Neutral {}
impl DrugProvider for Neutral {}
impl ArtifactProvider for Neutral {}
impl Persistence for Neutral {}
impl Pacing for Neutral {}

/// The full collaborator bundle a session runs against.
pub struct Hooks {
    pub equipment: Box<dyn EquipmentProvider>,
    pub faction: Box<dyn FactionProvider>,
    pub world: Box<dyn WorldEventProvider>,
    pub drugs: Box<dyn DrugProvider>,
    pub artifacts: Box<dyn ArtifactProvider>,
    pub persistence: Box<dyn Persistence>,
    pub pacing: Box<dyn Pacing>,
}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            equipment: Box::new(Neutral),
            faction: Box::new(Neutral),
            world: Box::new(Neutral),
            drugs: Box::new(Neutral),
            artifacts: Box::new(Neutral),
            persistence: Box::new(Neutral),
            pacing: Box::new(Neutral),
        }
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Hooks { .. }")
    }
}
