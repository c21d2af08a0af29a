//! Runtime error types.

use troupe_llm::ProviderError;

use crate::conversation::Phase;

/// Credential pool construction failure.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// The fixed token set must hold at least one token.
    #[error("credential pool needs at least one token")]
    Empty,
}

/// Cast materialization failure. No agents are built and no credentials are
/// checked out when this is returned.
#[derive(Debug, thiserror::Error)]
pub enum CastError {
    /// No cast entry contains the configured human identifier.
    #[error("cast has no entry for the human participant \"{human_name}\"")]
    MissingHuman {
        /// Configured human identifier.
        human_name: String,
    },

    /// Only the human was cast.
    #[error("cast has no simulated participants")]
    NoSimulatedParticipants,

    /// Building a generator for a participant failed.
    #[error("failed to create generator for {name}: {source}")]
    Generator {
        /// Participant name.
        name: String,
        /// Underlying provider error.
        #[source]
        source: ProviderError,
    },
}

/// Scenario building failure. Fatal to initialization.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    /// The scene description was blank.
    #[error("scene description is empty")]
    BlankDescription,

    /// The builder call failed.
    #[error("scenario generation failed: {0}")]
    Provider(#[from] ProviderError),

    /// The builder's reply contained no cast lines.
    #[error("scenario reply contained no cast")]
    NoCast,

    /// The parsed cast could not be materialized.
    #[error(transparent)]
    Cast(#[from] CastError),
}

impl ScenarioError {
    /// Error category string for logs and error payloads.
    pub fn category(&self) -> &str {
        match self {
            Self::BlankDescription => "invalid_input",
            Self::Provider(_) => "provider",
            Self::NoCast | Self::Cast(_) => "scenario",
        }
    }
}

/// Errors surfaced by the session driving surface.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No scenario has been built yet.
    #[error("script is not initialized; build a scenario first")]
    NotInitialized,

    /// The operation does not match the current turn.
    #[error("out of turn: expected {expected}, session is {actual}")]
    OutOfTurn {
        /// Phase the operation requires.
        expected: Phase,
        /// Phase the session is in.
        actual: Phase,
    },

    /// The human quit; clear or rebuild to continue.
    #[error("conversation stopped")]
    Stopped,

    /// No simulated participant can be scheduled.
    #[error("no simulated participant available to speak")]
    NoCandidates,

    /// A named speaker is the human or not in the cast.
    #[error("no simulated participant named \"{0}\"")]
    UnknownSpeaker(String),

    /// Caller input was rejected.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Scenario building failed.
    #[error(transparent)]
    Scenario(#[from] ScenarioError),

    /// The scheduling call failed; state is unchanged.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The credential set is unusable.
    #[error(transparent)]
    Pool(#[from] PoolError),
}

impl SessionError {
    /// Whether the caller may retry the same step unchanged.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Provider(e) => e.is_retryable(),
            Self::Scenario(ScenarioError::Provider(e)) => e.is_retryable(),
            Self::NoCandidates => true,
            Self::NotInitialized
            | Self::OutOfTurn { .. }
            | Self::Stopped
            | Self::InvalidInput(_)
            | Self::UnknownSpeaker(_)
            | Self::Scenario(_)
            | Self::Pool(_) => false,
        }
    }

    /// Error category string for logs and error payloads.
    pub fn category(&self) -> &str {
        match self {
            Self::NotInitialized => "not_initialized",
            Self::OutOfTurn { .. } => "out_of_turn",
            Self::Stopped => "stopped",
            Self::NoCandidates => "no_candidates",
            Self::InvalidInput(_) => "invalid_input",
            Self::UnknownSpeaker(_) => "unknown_speaker",
            Self::Scenario(e) => e.category(),
            Self::Provider(_) => "provider",
            Self::Pool(_) => "configuration",
        }
    }
}
