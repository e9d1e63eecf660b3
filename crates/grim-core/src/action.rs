//! Combat actions as a closed tagged union.
//!
//! The pipeline dispatches on the kind with an exhaustive match; there is no
//! action hierarchy. Also home to [`TurnView`], the read-only snapshot handed
//! to whatever chooses an action (local prompt, remote gateway, AI policy,
//! scripted test).

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::catalog::AbilityId;
use crate::combatant::{Combatant, CombatantId};

/// Who an action is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetRef {
    SelfTarget,
    Monster(CombatantId),
    PartyMember(CombatantId),
}

/// One chosen combat action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombatAction {
    /// Basic weapon attack.
    Attack { target: CombatantId },
    /// Halve incoming damage until the actor's next turn.
    Defend,
    /// Cast a spell from the catalog (mana).
    Cast { spell: AbilityId, target: TargetRef },
    /// Use a class ability from the catalog (stamina).
    UseAbility { ability: AbilityId, target: TargetRef },
    /// Attempt a session-wide escape.
    Flee,
    /// Leave the fight individually (grouped participants only).
    Retreat,
    /// Do nothing this round.
    Pass,
}

/// Read-only snapshot of one roster entry for action selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSummary {
    pub id: CombatantId,
    pub name: String,
    pub hp: i64,
    pub max_hp: i64,
}

impl TargetSummary {
    pub fn of(c: &Combatant) -> Self {
        Self {
            id: c.id,
            name: c.name.clone(),
            hp: c.hp,
            max_hp: c.max_hp,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }
}

/// What an action chooser gets to see: the actor and both rosters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnView {
    pub actor: CombatantId,
    pub actor_name: String,
    pub round: u32,
    pub monsters: Vec<TargetSummary>,
    pub party: Vec<TargetSummary>,
}

impl TurnView {
    /// Living monster with the lowest current HP.
    pub fn weakest_monster(&self) -> Option<CombatantId> {
        self.monsters
            .iter()
            .filter(|m| m.is_alive())
            .min_by_key(|m| m.hp)
            .map(|m| m.id)
    }

    /// The safe fallback used on timeout/disconnect: basic attack on the
    /// weakest living monster, or Pass when nothing is left to hit.
    pub fn default_action(&self) -> CombatAction {
        match self.weakest_monster() {
            Some(target) => CombatAction::Attack { target },
            None => CombatAction::Pass,
        }
    }
}

/// Source of actions for a human-controlled combatant.
pub trait ActionProvider {
    fn next_action(&mut self, view: &TurnView) -> CombatAction;
}

/// Fixed action sequence; falls back to the view's default action when the
/// script runs dry. The standard test double.
#[derive(Debug, Clone, Default)]
pub struct Scripted {
    pub actions: VecDeque<CombatAction>,
}

impl Scripted {
    pub fn new<I: IntoIterator<Item = CombatAction>>(actions: I) -> Self {
        Self {
            actions: actions.into_iter().collect(),
        }
    }
}

impl ActionProvider for Scripted {
    fn next_action(&mut self, view: &TurnView) -> CombatAction {
        self.actions.pop_front().unwrap_or_else(|| view.default_action())
    }
}
