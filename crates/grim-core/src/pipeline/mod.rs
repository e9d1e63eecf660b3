//! The action resolution pipeline.
//!
//! One action in, one outcome out. Attack math lives in [`attack`], the
//! catalog effect switch in [`effect`], escape attempts in [`escape`].
//! Validation rejects unaffordable or impossible actions *before* any world
//! state mutates, so the turn loop can re-prompt safely.

pub mod attack;
pub mod effect;
pub mod escape;

pub use attack::{
    AttackSummary, StrikeOpts, StrikeResult, mitigation, resolve_area_strike, resolve_attack,
    roll_to_hit, soft_capped_armor, soft_capped_weapon, strike_with_power,
};
pub use effect::{EffectOutcome, EffectTargets, use_catalog_ability};
pub use escape::{attempt_flee, escape_chance};

use crate::action::CombatAction;
use crate::catalog::{AbilityCatalog, Cost};
use crate::combatant::{Capabilities, Combatant};
use crate::errors::CombatError;
use crate::hooks::Hooks;
use crate::output::CombatOutput;
use crate::rng::CombatRng;

/// Narration perspective for the acting combatant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Voice {
    /// The actor is the local viewer: "You attack".
    SecondPerson,
    /// Anyone else: "Korr attacks".
    #[default]
    ThirdPerson,
}

/// Everything a resolution step needs besides the combatants themselves.
pub struct Resolver<'a> {
    pub rng: &'a mut CombatRng,
    pub out: &'a mut dyn CombatOutput,
    pub hooks: &'a mut Hooks,
    pub voice: Voice,
    /// Name used in third-person narration for the current actor.
    pub actor_name: &'a str,
}

impl<'a> Resolver<'a> {
    /// Sentence subject for the current actor.
    pub fn subject(&self) -> &str {
        match self.voice {
            Voice::SecondPerson => "You",
            Voice::ThirdPerson => self.actor_name,
        }
    }

    /// Pick the verb form matching the narration voice.
    pub fn verb<'v>(&self, second: &'v str, third: &'v str) -> &'v str {
        match self.voice {
            Voice::SecondPerson => second,
            Voice::ThirdPerson => third,
        }
    }

    /// Possessive form of the subject.
    pub fn possessive(&self) -> String {
        match self.voice {
            Voice::SecondPerson => "Your".to_string(),
            Voice::ThirdPerson => format!("{}'s", self.actor_name),
        }
    }
}

/// Check an action is legal and affordable for this actor, without mutating
/// anything. The session re-prompts on the reprompting errors.
pub fn validate(
    actor: &Combatant,
    action: &CombatAction,
    catalog: &dyn AbilityCatalog,
) -> Result<(), CombatError> {
    match action {
        CombatAction::Attack { .. } => {
            if !actor.caps.contains(Capabilities::ATTACK) {
                return Err(CombatError::NotCapable);
            }
            Ok(())
        }
        CombatAction::Cast { spell, .. } => {
            if !actor.caps.contains(Capabilities::CAST) {
                return Err(CombatError::NotCapable);
            }
            validate_catalog_use(actor, *spell, catalog)
        }
        CombatAction::UseAbility { ability, .. } => {
            if !actor.caps.contains(Capabilities::USE_ABILITY) {
                return Err(CombatError::NotCapable);
            }
            validate_catalog_use(actor, *ability, catalog)
        }
        CombatAction::Defend
        | CombatAction::Flee
        | CombatAction::Retreat
        | CombatAction::Pass => Ok(()),
    }
}

fn validate_catalog_use(
    actor: &Combatant,
    id: crate::catalog::AbilityId,
    catalog: &dyn AbilityCatalog,
) -> Result<(), CombatError> {
    let Some(ability) = catalog.lookup(id) else {
        return Err(CombatError::NotCapable);
    };
    if actor.level < ability.min_level {
        return Err(CombatError::NotCapable);
    }
    let remaining = actor.ledger.cooldown(id);
    if remaining > 0 {
        return Err(CombatError::OnCooldown {
            ability: ability.name.to_string(),
            rounds: remaining,
        });
    }
    match ability.cost {
        Cost::Free => Ok(()),
        Cost::Stamina(need) if actor.stamina < need => {
            Err(CombatError::InsufficientStamina {
                have: actor.stamina,
                need,
            })
        }
        Cost::Mana(need) if actor.mana < need => Err(CombatError::InsufficientMana {
            have: actor.mana,
            need,
        }),
        _ => Ok(()),
    }
}

/// Pay an ability's cost and start its cooldown. Callers must have
/// validated first; failure here still leaves the actor unmutated.
pub fn charge(actor: &mut Combatant, ability: &crate::catalog::Ability) -> Result<(), CombatError> {
    match ability.cost {
        Cost::Free => {}
        Cost::Stamina(need) => actor.spend_stamina(need)?,
        Cost::Mana(need) => actor.spend_mana(need)?,
    }
    actor.ledger.start_cooldown(ability.id, ability.cooldown);
    Ok(())
}
