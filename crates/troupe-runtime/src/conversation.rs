//! # Conversation State
//!
//! The turn-taking state machine layered over the coordinator.
//!
//! ```text
//! Idle ──begin──▶ AwaitingHuman ──speak / skip──▶ AwaitingSimulated
//!                      ▲  │                              │
//!                      │  └──quit──▶ Stopped             │
//!                      └──────── simulated line ─────────┘
//! ```
//!
//! `reset` returns any initialized state to `AwaitingHuman` with no rounds
//! and no last speaker.

use std::fmt;

use serde::Serialize;

use crate::errors::SessionError;

/// Index of a simulated participant in the coordinator's roster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct AgentHandle(pub usize);

/// Who spoke, resolved once at cast materialization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "agent", rename_all = "snake_case")]
pub enum Participant {
    /// The interactive human.
    Human,
    /// A generation-backed participant.
    Simulated(AgentHandle),
}

impl Participant {
    /// Whether this is the human.
    pub fn is_human(self) -> bool {
        matches!(self, Self::Human)
    }
}

/// Turn-taking phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No cast yet.
    #[default]
    Idle,
    /// Waiting for the human to speak, skip or quit.
    AwaitingHuman,
    /// Waiting for a simulated participant to be scheduled.
    AwaitingSimulated,
    /// The human quit.
    Stopped,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::AwaitingHuman => write!(f, "awaiting_human"),
            Self::AwaitingSimulated => write!(f, "awaiting_simulated"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Per-session turn state.
#[derive(Clone, Debug, Default)]
pub struct ConversationState {
    phase: Phase,
    round_count: u32,
    last_speaker: Option<Participant>,
}

impl ConversationState {
    /// Uninitialized state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether a cast has been materialized.
    pub fn is_initialized(&self) -> bool {
        self.phase != Phase::Idle
    }

    /// Lines recorded since the last reset.
    pub fn round_count(&self) -> u32 {
        self.round_count
    }

    /// Participant who spoke last.
    pub fn last_speaker(&self) -> Option<Participant> {
        self.last_speaker
    }

    /// Enter the loop after a successful cast materialization.
    pub fn begin(&mut self) {
        self.round_count = 0;
        self.last_speaker = None;
        self.phase = Self::phase_after(None);
    }

    /// Fail unless the machine is in `expected`.
    pub fn expect(&self, expected: Phase) -> Result<(), SessionError> {
        match self.phase {
            Phase::Idle => Err(SessionError::NotInitialized),
            Phase::Stopped => Err(SessionError::Stopped),
            actual if actual != expected => Err(SessionError::OutOfTurn { expected, actual }),
            _ => Ok(()),
        }
    }

    /// The human spoke.
    pub fn record_human(&mut self) -> Result<(), SessionError> {
        self.expect(Phase::AwaitingHuman)?;
        self.last_speaker = Some(Participant::Human);
        self.round_count += 1;
        self.phase = Phase::AwaitingSimulated;
        Ok(())
    }

    /// The human passed; no line, last speaker unchanged.
    pub fn skip_human(&mut self) -> Result<(), SessionError> {
        self.expect(Phase::AwaitingHuman)?;
        self.phase = Phase::AwaitingSimulated;
        Ok(())
    }

    /// The human quit.
    pub fn quit(&mut self) -> Result<(), SessionError> {
        self.expect(Phase::AwaitingHuman)?;
        self.phase = Phase::Stopped;
        Ok(())
    }

    /// A simulated participant spoke.
    pub fn record_simulated(&mut self, speaker: Participant) -> Result<(), SessionError> {
        self.expect(Phase::AwaitingSimulated)?;
        self.last_speaker = Some(speaker);
        self.round_count += 1;
        self.phase = Self::phase_after(self.last_speaker);
        Ok(())
    }

    /// Back to `AwaitingHuman` with no rounds and no last speaker.
    /// An uninitialized machine stays `Idle`.
    pub fn reset(&mut self) {
        self.round_count = 0;
        self.last_speaker = None;
        if self.is_initialized() {
            self.phase = Self::phase_after(None);
        }
    }

    /// Ask the human unless the human spoke last.
    fn phase_after(last: Option<Participant>) -> Phase {
        if last.is_some_and(Participant::is_human) {
            Phase::AwaitingSimulated
        } else {
            Phase::AwaitingHuman
        }
    }
}
