//! Timed status effects, temporary bonuses and ability cooldowns.
//!
//! Every counter here decrements exactly once per round, at the end-of-round
//! tick, never mid-round. Reaching zero removes the entry; counters are
//! never stored negative.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::catalog::AbilityId;

/// The closed set of status kinds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
    EnumIter,
)]
pub enum StatusKind {
    /// Cannot act this round.
    Stunned,
    /// Asleep; cannot act, broken by taking damage.
    Sleeping,
    /// Cowering; cannot act.
    Feared,
    /// Takes damage at the start of each round.
    Poisoned,
    /// Burning; damage at the start of each round.
    Burning,
    /// Reduced attack contribution.
    Slowed,
    /// May act against the wrong target.
    Confused,
    /// Cannot act; shatters on a hit.
    Frozen,
    /// Attackers gain a flat bonus percentage against this target.
    Marked,
    /// Increased attack power, reduced defense.
    Raging,
    /// Untargetable by the monster lottery.
    Hidden,
    /// Takes no damage.
    Invulnerable,
    /// Blessed; small attack bonus.
    Blessed,
    /// Cursed; small attack penalty.
    Cursed,
    /// Reduced strength contribution.
    Weakened,
    /// Incoming damage halved.
    Shielded,
}

impl StatusKind {
    /// Statuses that short-circuit the victim's turn entirely.
    pub fn prevents_action(self) -> bool {
        matches!(
            self,
            StatusKind::Stunned | StatusKind::Sleeping | StatusKind::Feared | StatusKind::Frozen
        )
    }

    /// Statuses a status-immunity bonus or Invulnerable blocks.
    pub fn is_negative(self) -> bool {
        matches!(
            self,
            StatusKind::Stunned
                | StatusKind::Sleeping
                | StatusKind::Feared
                | StatusKind::Poisoned
                | StatusKind::Burning
                | StatusKind::Slowed
                | StatusKind::Confused
                | StatusKind::Frozen
                | StatusKind::Marked
                | StatusKind::Cursed
                | StatusKind::Weakened
        )
    }
}

/// One active status instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEffect {
    pub kind: StatusKind,
    pub remaining_rounds: u32,
    /// Kind-specific strength (poison damage per round, mark bonus, ...).
    pub magnitude: Option<i64>,
}

/// Scalar temporary bonuses, each with its own independent counter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
    EnumIter,
)]
pub enum TempBonusKind {
    Attack,
    Defense,
    StatusImmunity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempBonus {
    pub amount: i64,
    pub remaining_rounds: u32,
}

/// What happened during a round-start tick, for narration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickEvent {
    /// Damage-over-time fired (poison, burning).
    Damage { kind: StatusKind, amount: i64 },
}

/// Per-combatant ledger of statuses, bonuses and cooldowns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusLedger {
    statuses: BTreeMap<StatusKind, StatusEffect>,
    bonuses: BTreeMap<TempBonusKind, TempBonus>,
    cooldowns: BTreeMap<AbilityId, u32>,
}

impl StatusLedger {
    /// Try to add a status. Negative statuses are blocked by Invulnerable
    /// and by an active status-immunity bonus. Re-applying keeps the longer
    /// duration and the new magnitude.
    pub fn add_status(
        &mut self,
        kind: StatusKind,
        rounds: u32,
        magnitude: Option<i64>,
    ) -> bool {
        if rounds == 0 {
            return false;
        }
        if kind.is_negative()
            && (self.has(StatusKind::Invulnerable)
                || self.bonus(TempBonusKind::StatusImmunity).is_some())
        {
            return false;
        }
        let entry = self.statuses.entry(kind).or_insert(StatusEffect {
            kind,
            remaining_rounds: 0,
            magnitude,
        });
        entry.remaining_rounds = entry.remaining_rounds.max(rounds);
        entry.magnitude = magnitude.or(entry.magnitude);
        true
    }

    pub fn has(&self, kind: StatusKind) -> bool {
        self.statuses.contains_key(&kind)
    }

    pub fn magnitude(&self, kind: StatusKind) -> Option<i64> {
        self.statuses.get(&kind).and_then(|s| s.magnitude)
    }

    pub fn remove_status(&mut self, kind: StatusKind) -> bool {
        self.statuses.remove(&kind).is_some()
    }

    /// The first active status that prevents the owner from acting.
    pub fn action_preventing(&self) -> Option<StatusKind> {
        self.statuses
            .keys()
            .copied()
            .find(|k| k.prevents_action())
    }

    pub fn active_statuses(&self) -> impl Iterator<Item = &StatusEffect> {
        self.statuses.values()
    }

    /// Grant or refresh a temporary bonus; keeps the larger amount and the
    /// longer remaining duration.
    pub fn add_bonus(&mut self, kind: TempBonusKind, amount: i64, rounds: u32) {
        if rounds == 0 {
            return;
        }
        let entry = self.bonuses.entry(kind).or_insert(TempBonus {
            amount: 0,
            remaining_rounds: 0,
        });
        entry.amount = entry.amount.max(amount);
        entry.remaining_rounds = entry.remaining_rounds.max(rounds);
    }

    pub fn bonus(&self, kind: TempBonusKind) -> Option<TempBonus> {
        self.bonuses.get(&kind).copied()
    }

    /// Bonus amount or 0 when absent.
    pub fn bonus_amount(&self, kind: TempBonusKind) -> i64 {
        self.bonuses.get(&kind).map_or(0, |b| b.amount)
    }

    /// Put an ability on cooldown. A zero-length cooldown is not recorded.
    pub fn start_cooldown(&mut self, id: AbilityId, rounds: u32) {
        if rounds > 0 {
            self.cooldowns.insert(id, rounds);
        }
    }

    /// Remaining cooldown rounds; 0 means ready.
    pub fn cooldown(&self, id: AbilityId) -> u32 {
        self.cooldowns.get(&id).copied().unwrap_or(0)
    }

    /// Start-of-round effects: damage-over-time statuses fire here. Duration
    /// counters are NOT touched; that happens in [`Self::end_of_round`].
    pub fn round_start_events(&self) -> Vec<TickEvent> {
        let mut events = Vec::new();
        for status in self.statuses.values() {
            match status.kind {
                StatusKind::Poisoned | StatusKind::Burning => {
                    events.push(TickEvent::Damage {
                        kind: status.kind,
                        amount: status.magnitude.unwrap_or(2).max(1),
                    });
                }
                _ => {}
            }
        }
        events
    }

    /// The single per-round decrement point. Every status, bonus and
    /// cooldown counter drops by one; entries reaching zero are removed.
    /// Returns the status kinds that expired, for narration.
    pub fn end_of_round(&mut self) -> Vec<StatusKind> {
        let mut expired = Vec::new();
        self.statuses.retain(|kind, status| {
            status.remaining_rounds = status.remaining_rounds.saturating_sub(1);
            if status.remaining_rounds == 0 {
                expired.push(*kind);
                false
            } else {
                true
            }
        });
        self.bonuses.retain(|_, bonus| {
            bonus.remaining_rounds = bonus.remaining_rounds.saturating_sub(1);
            bonus.remaining_rounds > 0
        });
        self.cooldowns.retain(|_, rounds| {
            *rounds = rounds.saturating_sub(1);
            *rounds > 0
        });
        expired
    }

    /// Wake-on-damage statuses (Sleeping breaks, Frozen shatters).
    pub fn on_damage_taken(&mut self) {
        self.statuses.remove(&StatusKind::Sleeping);
        self.statuses.remove(&StatusKind::Frozen);
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty() && self.bonuses.is_empty() && self.cooldowns.is_empty()
    }
}
