//! Input gateway for grouped (remote) participants.
//!
//! Each remote human sits on the far side of a transport: the gateway asks
//! it for an action with a bounded wait and pushes narration lines back out.
//! A timeout or a dead channel never stalls the round; the participant's
//! turn resolves with the safe default action and the fight moves on.

use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use crate::action::{CombatAction, TurnView};
use crate::combatant::CombatantId;
use crate::consts::TURN_WAIT;
use crate::errors::CombatError;
use crate::narrate;
use crate::output::{ColorTag, OutputLine};

/// One remote participant's wire. Implementations decide what "remote"
/// means (another thread, a socket session, a test double).
pub trait PartyTransport: Send {
    /// Push one narration line to the participant's screen. Delivery is
    /// best-effort; a dead screen is not an error.
    fn deliver(&mut self, line: &OutputLine);

    /// Block for the participant's next action, up to `timeout`.
    fn recv_action(
        &mut self,
        view: &TurnView,
        timeout: Duration,
    ) -> Result<CombatAction, CombatError>;
}

/// In-process transport over a pair of mpsc channels.
pub struct ChannelTransport {
    name: String,
    actions: Receiver<CombatAction>,
    outbox: Sender<OutputLine>,
}

/// The participant's side of a [`ChannelTransport`].
pub struct RemoteEnd {
    pub actions: Sender<CombatAction>,
    pub inbox: Receiver<OutputLine>,
}

impl ChannelTransport {
    /// Build a connected transport/remote pair.
    pub fn pair(name: &str) -> (Self, RemoteEnd) {
        let (action_tx, action_rx) = mpsc::channel();
        let (line_tx, line_rx) = mpsc::channel();
        (
            Self {
                name: name.to_string(),
                actions: action_rx,
                outbox: line_tx,
            },
            RemoteEnd {
                actions: action_tx,
                inbox: line_rx,
            },
        )
    }
}

impl PartyTransport for ChannelTransport {
    fn deliver(&mut self, line: &OutputLine) {
        // The remote end may be gone; the fight doesn't care.
        let _ = self.outbox.send(line.clone());
    }

    fn recv_action(
        &mut self,
        _view: &TurnView,
        timeout: Duration,
    ) -> Result<CombatAction, CombatError> {
        match self.actions.recv_timeout(timeout) {
            Ok(action) => Ok(action),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {
                Err(CombatError::ParticipantUnavailable {
                    name: self.name.clone(),
                })
            }
        }
    }
}

/// Multiplexes the session's turn loop across every remote participant.
pub struct InputGateway {
    participants: BTreeMap<CombatantId, Box<dyn PartyTransport>>,
    wait: Duration,
}

impl InputGateway {
    pub fn new() -> Self {
        Self::with_wait(TURN_WAIT)
    }

    /// Gateway with a custom wait ceiling (tests use milliseconds).
    pub fn with_wait(wait: Duration) -> Self {
        Self {
            participants: BTreeMap::new(),
            wait,
        }
    }

    pub fn register(&mut self, id: CombatantId, transport: Box<dyn PartyTransport>) {
        self.participants.insert(id, transport);
    }

    pub fn unregister(&mut self, id: CombatantId) {
        self.participants.remove(&id);
    }

    pub fn is_registered(&self, id: CombatantId) -> bool {
        self.participants.contains_key(&id)
    }

    /// Ask a participant for their action. Returns the action and whether it
    /// was substituted (timeout, disconnect, or participant unknown). Never
    /// blocks past the wait ceiling.
    pub fn wait_for_action(&mut self, id: CombatantId, view: &TurnView) -> (CombatAction, bool) {
        let Some(transport) = self.participants.get_mut(&id) else {
            return (view.default_action(), true);
        };
        transport.deliver(&OutputLine {
            tag: ColorTag::System,
            text: format!("Round {}: your turn.", view.round),
        });
        match transport.recv_action(view, self.wait) {
            Ok(action) => (action, false),
            Err(_) => (view.default_action(), true),
        }
    }

    /// Push one line to a single participant, if registered.
    pub fn send_to(&mut self, id: CombatantId, line: &OutputLine) {
        if let Some(transport) = self.participants.get_mut(&id) {
            transport.deliver(line);
        }
    }

    /// Push one line to every registered participant except `exclude`.
    pub fn broadcast(&mut self, line: &OutputLine, exclude: Option<CombatantId>) {
        for (id, transport) in self.participants.iter_mut() {
            if Some(*id) != exclude {
                transport.deliver(line);
            }
        }
    }

    /// Rebroadcast a captured turn to the observers: the actor saw the
    /// second-person lines already, everyone else gets them rewritten to
    /// third person.
    pub fn broadcast_captured(
        &mut self,
        captured: &[OutputLine],
        actor_name: &str,
        actor: CombatantId,
    ) {
        let texts: Vec<String> = captured.iter().map(|l| l.text.clone()).collect();
        let rewritten = narrate::rewrite_capture(&texts, actor_name);
        for (line, text) in captured.iter().zip(rewritten) {
            self.broadcast(
                &OutputLine {
                    tag: line.tag,
                    text,
                },
                Some(actor),
            );
        }
    }
}

impl Default for InputGateway {
    fn default() -> Self {
        Self::new()
    }
}
