//! Combat error taxonomy.
//!
//! Almost nothing here is fatal: invalid actions re-prompt, disconnects fall
//! back to a default action, stale targets become no-ops. The enum exists so
//! the turn loop can tell those cases apart and log them.

use thiserror::Error;

use crate::combatant::CombatantId;

/// Errors surfaced by action validation and turn coordination.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CombatError {
    /// Actor cannot pay the stamina cost. Recovered by re-prompting.
    #[error("not enough stamina ({have}/{need})")]
    InsufficientStamina { have: i64, need: i64 },

    /// Actor cannot pay the mana cost. Recovered by re-prompting.
    #[error("not enough mana ({have}/{need})")]
    InsufficientMana { have: i64, need: i64 },

    /// The ability is still cooling down. Recovered by re-prompting.
    #[error("ability {ability} is on cooldown for {rounds} more rounds")]
    OnCooldown { ability: String, rounds: u32 },

    /// The actor lacks the capability for this action kind (e.g. a
    /// non-caster trying to cast). Recovered by re-prompting.
    #[error("actor cannot perform this action")]
    NotCapable,

    /// Target is dead or no longer in the roster. Treated as a no-op.
    #[error("target {0:?} is dead or gone")]
    StaleTarget(CombatantId),

    /// A remote participant's wait expired or their channel closed.
    /// Recovered by substituting a default action.
    #[error("participant {name} timed out or disconnected")]
    ParticipantUnavailable { name: String },
}

impl CombatError {
    /// Errors the turn loop answers by asking the same actor again.
    /// Stale targets and disconnects are handled without a re-prompt.
    pub fn reprompts(&self) -> bool {
        matches!(
            self,
            CombatError::InsufficientStamina { .. }
                | CombatError::InsufficientMana { .. }
                | CombatError::OnCooldown { .. }
                | CombatError::NotCapable
        )
    }

    /// In-fiction line shown to the actor. Technical details stay in the log.
    pub fn fiction(&self) -> String {
        match self {
            CombatError::InsufficientStamina { .. } => {
                "You are too exhausted for that.".into()
            }
            CombatError::InsufficientMana { .. } => "Your spell fizzles.".into(),
            CombatError::OnCooldown { rounds, .. } => {
                format!("You need {rounds} more rounds to recover that move.")
            }
            CombatError::NotCapable => "You don't know how to do that.".into(),
            CombatError::StaleTarget(_) => "Your blow cuts only air.".into(),
            CombatError::ParticipantUnavailable { name } => {
                format!("{name} hesitates...")
            }
        }
    }
}
