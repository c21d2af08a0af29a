//! # troupe-runtime
//!
//! Turn scheduling and resource allocation for a multi-party scripted dialogue.
//!
//! - **Pool**: fixed credential set, random checkout, overcommit when demand exceeds supply
//! - **Scenario**: sectioned scene / cast / plot parsing of the builder's free-text reply
//! - **Scheduling**: three-tier next-speaker extraction from free-text decisions
//! - **Agent**: one generation-backed participant with a bounded history view
//! - **Coordinator**: owns pool, roster and shared history; decides who speaks next
//! - **Conversation**: the human/simulated turn-taking state machine
//! - **Session**: the serialized driving surface and the "run N rounds" driver

#![deny(unsafe_code)]

pub mod agent;
pub mod config;
pub mod conversation;
pub mod coordinator;
pub mod errors;
pub mod pool;
pub mod prompts;
pub mod scenario;
pub mod scheduling;
pub mod session;

pub use agent::{AgentReply, ParticipantAgent};
pub use config::RuntimeConfig;
pub use conversation::{AgentHandle, ConversationState, Participant, Phase};
pub use coordinator::{CastMember, Coordinator};
pub use errors::{CastError, PoolError, ScenarioError, SessionError};
pub use pool::CredentialPool;
pub use scenario::{ScenarioDraft, parse_scenario};
pub use scheduling::extract_speaker;
pub use session::{
    AutoSkip, DEFAULT_SITUATION, HumanInput, HumanTurn, MessageExchange, NextSpeaker, RunEvent,
    RunStop, RunSummary, ScenarioOutcome, ScriptSession, SessionHandle, SessionStatus,
    SimulatedTurn, TurnOutcome,
};
