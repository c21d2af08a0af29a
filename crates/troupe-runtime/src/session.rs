//! # Script Session
//!
//! The driving surface over one coordinator and one conversation state.
//!
//! [`ScriptSession`] holds the state; [`SessionHandle`] wraps it in a single
//! `tokio::sync::Mutex` so history appends, credential checkout and state
//! transitions are serialized per session. Independent sessions share
//! nothing.
//!
//! [`SessionHandle::run_rounds`] is the bulk driver. It holds the lock only
//! while applying a turn, never while waiting for the human, so status reads
//! interleave with a running loop. It checks its cancellation token only
//! between rounds.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use troupe_core::{CredentialToken, SessionId, format_line};
use troupe_llm::GeneratorFactory;

use crate::config::RuntimeConfig;
use crate::conversation::{ConversationState, Phase};
use crate::coordinator::{CastMember, Coordinator};
use crate::errors::{PoolError, ScenarioError, SessionError};
use crate::pool::CredentialPool;

/// Situation used when the caller supplies none.
pub const DEFAULT_SITUATION: &str = "继续对话";

/// Inputs that mean "quit", compared case-insensitively.
pub const QUIT_WORDS: [&str; 4] = ["quit", "exit", "q", "退出"];

// ─────────────────────────────────────────────────────────────────────────────
// Turn and result types
// ─────────────────────────────────────────────────────────────────────────────

/// What the human does on their turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HumanTurn {
    /// Say a line.
    Speak(String),
    /// Pass to a simulated participant.
    Skip,
    /// End the conversation.
    Quit,
}

impl HumanTurn {
    /// Interpret a raw input line: blank skips, a quit word quits, anything
    /// else is spoken.
    pub fn from_input(input: &str) -> Self {
        let input = input.trim();
        if input.is_empty() {
            Self::Skip
        } else if QUIT_WORDS.iter().any(|w| input.eq_ignore_ascii_case(w)) {
            Self::Quit
        } else {
            Self::Speak(input.to_owned())
        }
    }
}

/// Result of a human turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TurnOutcome {
    /// The line was recorded.
    Spoke {
        /// Formatted history line.
        line: String,
    },
    /// The turn passed to the simulated side.
    Skipped,
    /// The conversation stopped.
    Quit,
}

/// Result of a simulated turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatedTurn {
    /// Who spoke.
    pub speaker: String,
    /// Formatted history line.
    pub line: String,
    /// Round count after this line.
    pub round: u32,
    /// Whether the line is an in-band generation error.
    pub failed: bool,
}

/// Who the conversation waits on, as reported by
/// [`ScriptSession::peek_next_speaker`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum NextSpeaker {
    /// The human's turn.
    AskUser {
        /// Configured human identifier.
        speaker: String,
    },
    /// A simulated participant was chosen but has not spoken.
    AiSpeak {
        /// Chosen participant.
        speaker: String,
    },
}

/// A human line followed by the simulated reply it prompted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageExchange {
    /// The human's formatted line.
    pub human_line: String,
    /// The simulated reply.
    pub reply: SimulatedTurn,
}

/// A freshly built scenario.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioOutcome {
    /// Scene section.
    pub scene_setting: String,
    /// Plot section.
    pub plot_summary: String,
    /// The builder's full reply.
    pub full_text: String,
    /// Materialized cast, human first.
    pub cast: Vec<CastMember>,
}

/// Snapshot of a session.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    /// Session ID.
    pub session_id: SessionId,
    /// Whether a cast is materialized.
    pub initialized: bool,
    /// Turn phase.
    pub phase: Phase,
    /// Lines recorded since the last reset.
    pub round_count: u32,
    /// Name of the last speaker.
    pub last_speaker: Option<String>,
    /// Configured human identifier.
    pub human_name: String,
    /// Scene section.
    pub scene_setting: String,
    /// Cast, human first.
    pub cast: Vec<CastMember>,
    /// Shared history length.
    pub history_len: usize,
    /// Credentials available in the pool.
    pub credentials_available: usize,
    /// Size of the credential set.
    pub credentials_total: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Bulk driver types
// ─────────────────────────────────────────────────────────────────────────────

/// Progress reported by the bulk driver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunEvent {
    /// A round began.
    RoundStarted {
        /// 1-based round number.
        round: u32,
    },
    /// A line was added to the history.
    Line {
        /// Round number.
        round: u32,
        /// Formatted line.
        line: String,
    },
    /// The simulated turn failed and the round was dropped.
    Abandoned {
        /// Round number.
        round: u32,
        /// Error text.
        reason: String,
    },
}

/// Source of human turns for the bulk driver.
#[async_trait]
pub trait HumanInput: Send {
    /// Ask the human for their turn in `round`.
    async fn next_turn(&mut self, round: u32) -> HumanTurn;

    /// Observe driver progress.
    fn on_event(&mut self, _event: &RunEvent) {}
}

/// Always skips; used for unattended runs.
#[derive(Clone, Copy, Debug, Default)]
pub struct AutoSkip;

#[async_trait]
impl HumanInput for AutoSkip {
    async fn next_turn(&mut self, _round: u32) -> HumanTurn {
        HumanTurn::Skip
    }
}

/// Why the bulk driver stopped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStop {
    /// All requested rounds ran.
    #[default]
    Completed,
    /// The human quit.
    Quit,
    /// The cancellation token fired.
    Cancelled,
    /// The session was already stopped.
    Stopped,
}

/// What a bulk run did.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// Rounds asked for.
    pub requested: u32,
    /// Rounds that ran to the end.
    pub completed: u32,
    /// Rounds whose simulated turn failed.
    pub abandoned: u32,
    /// Lines added during the run, in order.
    pub lines: Vec<String>,
    /// Why the run ended.
    pub stop: RunStop,
}

impl RunSummary {
    fn record(&mut self, input: &mut dyn HumanInput, event: RunEvent) {
        match &event {
            RunEvent::Line { line, .. } => self.lines.push(line.clone()),
            RunEvent::Abandoned { .. } => self.abandoned += 1,
            RunEvent::RoundStarted { .. } => {}
        }
        input.on_event(&event);
    }
}

enum RoundEnd {
    Continue,
    Stop(RunStop),
}

fn situation_or_default(situation: &str) -> &str {
    match situation.trim() {
        "" => DEFAULT_SITUATION,
        s => s,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ScriptSession
// ─────────────────────────────────────────────────────────────────────────────

/// One scripted conversation.
pub struct ScriptSession {
    id: SessionId,
    config: RuntimeConfig,
    credentials: Vec<CredentialToken>,
    factory: Arc<dyn GeneratorFactory>,
    coordinator: Option<Coordinator>,
    state: ConversationState,
}

impl ScriptSession {
    /// Create an uninitialized session over a non-empty credential set.
    pub fn new(
        config: RuntimeConfig,
        credentials: Vec<CredentialToken>,
        factory: Arc<dyn GeneratorFactory>,
    ) -> Result<Self, SessionError> {
        if credentials.is_empty() {
            return Err(PoolError::Empty.into());
        }
        Ok(Self {
            id: SessionId::new(),
            config,
            credentials,
            factory,
            coordinator: None,
            state: ConversationState::new(),
        })
    }

    /// Session ID.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    /// Active coordinator, if a cast is materialized.
    pub fn coordinator(&self) -> Option<&Coordinator> {
        self.coordinator.as_ref()
    }

    /// Build a scenario and materialize its cast on a fresh coordinator.
    ///
    /// The previous coordinator is torn down only once the new one is ready,
    /// so a failed build leaves the running conversation untouched.
    #[instrument(skip_all, fields(session_id = %self.id))]
    pub async fn build_scenario(&mut self, description: &str) -> Result<ScenarioOutcome, SessionError> {
        let pool = CredentialPool::new(self.credentials.clone())?;
        let mut next = Coordinator::new(self.config.clone(), pool, Arc::clone(&self.factory))
            .map_err(ScenarioError::from)?;
        let draft = next.build_scenario(description).await?;
        next.materialize_cast(&draft.cast).map_err(ScenarioError::from)?;

        if let Some(mut previous) = self.coordinator.replace(next) {
            previous.teardown();
        }
        self.state.begin();

        let cast = self.coordinator.as_ref().map(Coordinator::cast).unwrap_or_default();
        info!(cast = cast.len(), "script initialized");
        Ok(ScenarioOutcome {
            scene_setting: draft.scene_setting,
            plot_summary: draft.plot_summary,
            full_text: draft.full_text,
            cast,
        })
    }

    /// Apply the human's turn.
    pub fn advance_human(&mut self, turn: HumanTurn) -> Result<TurnOutcome, SessionError> {
        let coordinator = self.coordinator.as_mut().ok_or(SessionError::NotInitialized)?;
        match turn {
            HumanTurn::Speak(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return Err(SessionError::InvalidInput("message is empty".into()));
                }
                self.state.record_human()?;
                let line = format_line(coordinator.human_name(), text);
                coordinator.append_history(line.clone());
                debug!(session_id = %self.id, round = self.state.round_count(), "human spoke");
                Ok(TurnOutcome::Spoke { line })
            }
            HumanTurn::Skip => {
                self.state.skip_human()?;
                debug!(session_id = %self.id, "human skipped");
                Ok(TurnOutcome::Skipped)
            }
            HumanTurn::Quit => {
                self.state.quit()?;
                info!(session_id = %self.id, "human quit");
                Ok(TurnOutcome::Quit)
            }
        }
    }

    /// Schedule a simulated participant and record its line.
    ///
    /// Scheduling failures leave the state unchanged; the caller may retry.
    /// Generation failures inside the chosen agent become an error line.
    pub async fn advance_simulated(&mut self, situation: &str) -> Result<SimulatedTurn, SessionError> {
        self.simulated_turn(None, situation).await
    }

    /// Have `speaker` say the next line without consulting the scheduler.
    ///
    /// Fails with [`SessionError::UnknownSpeaker`] for the human identifier
    /// or a name outside the cast; the state is unchanged.
    pub async fn advance_simulated_as(
        &mut self,
        speaker: &str,
        situation: &str,
    ) -> Result<SimulatedTurn, SessionError> {
        self.simulated_turn(Some(speaker), situation).await
    }

    /// Who speaks next, without advancing the conversation.
    ///
    /// On the human's turn this is the human and no call is made. Otherwise
    /// the scheduler picks a simulated participant, which is reported but
    /// not asked to speak and not recorded.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub async fn peek_next_speaker(&self, situation: &str) -> Result<NextSpeaker, SessionError> {
        let coordinator = self.coordinator.as_ref().ok_or(SessionError::NotInitialized)?;
        if self.state.phase() == Phase::AwaitingHuman {
            return Ok(NextSpeaker::AskUser {
                speaker: coordinator.human_name().to_owned(),
            });
        }
        self.state.expect(Phase::AwaitingSimulated)?;

        let speaker = coordinator
            .decide_next_speaker(situation_or_default(situation), true)
            .await?
            .ok_or(SessionError::NoCandidates)?;
        Ok(NextSpeaker::AiSpeak {
            speaker: coordinator.participant_name(speaker).to_owned(),
        })
    }

    #[instrument(skip(self), fields(session_id = %self.id))]
    async fn simulated_turn(
        &mut self,
        named: Option<&str>,
        situation: &str,
    ) -> Result<SimulatedTurn, SessionError> {
        let coordinator = self.coordinator.as_mut().ok_or(SessionError::NotInitialized)?;
        self.state.expect(Phase::AwaitingSimulated)?;

        let situation = situation_or_default(situation);
        let speaker = match named.map(str::trim) {
            Some(name) => coordinator
                .simulated_by_name(name)
                .ok_or_else(|| SessionError::UnknownSpeaker(name.to_owned()))?,
            None => coordinator
                .decide_next_speaker(situation, true)
                .await?
                .ok_or(SessionError::NoCandidates)?,
        };
        let reply = coordinator
            .respond(speaker, situation)
            .await
            .ok_or(SessionError::NoCandidates)?;

        coordinator.append_history(reply.line.clone());
        self.state.record_simulated(speaker)?;
        Ok(SimulatedTurn {
            speaker: coordinator.participant_name(speaker).to_owned(),
            line: reply.line,
            round: self.state.round_count(),
            failed: reply.failed,
        })
    }

    /// Record a human line and immediately run one simulated turn that
    /// reacts to it.
    pub async fn send_message(&mut self, message: &str) -> Result<MessageExchange, SessionError> {
        let human_line = match self.advance_human(HumanTurn::Speak(message.to_owned()))? {
            TurnOutcome::Spoke { line } => line,
            TurnOutcome::Skipped | TurnOutcome::Quit => String::new(),
        };
        let situation = format!(
            "用户刚刚说：{}，这是第{}轮对话",
            message.trim(),
            self.state.round_count() + 1
        );
        let reply = self.advance_simulated(&situation).await?;
        Ok(MessageExchange { human_line, reply })
    }

    /// Shared history, oldest first.
    pub fn history(&self) -> Vec<String> {
        self.coordinator
            .as_ref()
            .map(|c| c.history().to_vec())
            .unwrap_or_default()
    }

    /// Clear every history view and reset the turn state. Cast and
    /// credentials are kept.
    pub fn clear(&mut self) {
        if let Some(coordinator) = self.coordinator.as_mut() {
            coordinator.clear_all();
        }
        self.state.reset();
        info!(session_id = %self.id, "history cleared");
    }

    /// Snapshot for status reporting.
    pub fn status(&self) -> SessionStatus {
        let coordinator = self.coordinator.as_ref();
        SessionStatus {
            session_id: self.id.clone(),
            initialized: self.state.is_initialized(),
            phase: self.state.phase(),
            round_count: self.state.round_count(),
            last_speaker: self
                .state
                .last_speaker()
                .zip(coordinator)
                .map(|(p, c)| c.participant_name(p).to_owned()),
            human_name: self.config.human_name.clone(),
            scene_setting: coordinator.map(|c| c.scene_setting().to_owned()).unwrap_or_default(),
            cast: coordinator.map(Coordinator::cast).unwrap_or_default(),
            history_len: coordinator.map_or(0, |c| c.history().len()),
            credentials_available: coordinator
                .map_or(self.credentials.len(), |c| c.pool().available_count()),
            credentials_total: self.credentials.len(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SessionHandle
// ─────────────────────────────────────────────────────────────────────────────

/// Cloneable, serialized access to one [`ScriptSession`].
#[derive(Clone)]
pub struct SessionHandle {
    id: SessionId,
    inner: Arc<Mutex<ScriptSession>>,
}

impl SessionHandle {
    /// Wrap a session.
    pub fn new(session: ScriptSession) -> Self {
        Self {
            id: session.id().clone(),
            inner: Arc::new(Mutex::new(session)),
        }
    }

    /// Session ID.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Exclusive access for multi-step operations.
    pub async fn lock(&self) -> MutexGuard<'_, ScriptSession> {
        self.inner.lock().await
    }

    /// See [`ScriptSession::build_scenario`].
    pub async fn build_scenario(&self, description: &str) -> Result<ScenarioOutcome, SessionError> {
        self.inner.lock().await.build_scenario(description).await
    }

    /// See [`ScriptSession::advance_human`].
    pub async fn advance_human(&self, turn: HumanTurn) -> Result<TurnOutcome, SessionError> {
        self.inner.lock().await.advance_human(turn)
    }

    /// See [`ScriptSession::advance_simulated`].
    pub async fn advance_simulated(&self, situation: &str) -> Result<SimulatedTurn, SessionError> {
        self.inner.lock().await.advance_simulated(situation).await
    }

    /// See [`ScriptSession::advance_simulated_as`].
    pub async fn advance_simulated_as(
        &self,
        speaker: &str,
        situation: &str,
    ) -> Result<SimulatedTurn, SessionError> {
        self.inner
            .lock()
            .await
            .advance_simulated_as(speaker, situation)
            .await
    }

    /// See [`ScriptSession::peek_next_speaker`].
    pub async fn peek_next_speaker(&self, situation: &str) -> Result<NextSpeaker, SessionError> {
        self.inner.lock().await.peek_next_speaker(situation).await
    }

    /// See [`ScriptSession::send_message`].
    pub async fn send_message(&self, message: &str) -> Result<MessageExchange, SessionError> {
        self.inner.lock().await.send_message(message).await
    }

    /// See [`ScriptSession::history`].
    pub async fn history(&self) -> Vec<String> {
        self.inner.lock().await.history()
    }

    /// See [`ScriptSession::clear`].
    pub async fn clear(&self) {
        self.inner.lock().await.clear();
    }

    /// See [`ScriptSession::status`].
    pub async fn status(&self) -> SessionStatus {
        self.inner.lock().await.status()
    }

    /// Run up to `rounds` rounds.
    ///
    /// Each round asks `input` for the human's turn when it is theirs;
    /// speaking ends the round, skipping hands the same round to a simulated
    /// participant, quitting ends the run. Failed simulated turns are logged
    /// and the run continues. A human turn the session no longer accepts
    /// (another caller quit while the human was deciding) ends the run with
    /// that error. `cancel` is checked between rounds only.
    #[instrument(skip(self, input, cancel), fields(session_id = %self.id))]
    pub async fn run_rounds(
        &self,
        rounds: u32,
        input: &mut dyn HumanInput,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, SessionError> {
        if !self.inner.lock().await.state.is_initialized() {
            return Err(SessionError::NotInitialized);
        }

        let mut summary = RunSummary {
            requested: rounds,
            ..RunSummary::default()
        };
        for round in 1..=rounds {
            if cancel.is_cancelled() {
                summary.stop = RunStop::Cancelled;
                break;
            }
            summary.record(input, RunEvent::RoundStarted { round });
            match self.play_round(round, input, &mut summary).await? {
                RoundEnd::Continue => summary.completed += 1,
                RoundEnd::Stop(stop) => {
                    summary.stop = stop;
                    break;
                }
            }
        }

        info!(
            completed = summary.completed,
            abandoned = summary.abandoned,
            stop = ?summary.stop,
            "run finished"
        );
        Ok(summary)
    }

    /// One round of the bulk driver.
    async fn play_round(
        &self,
        round: u32,
        input: &mut dyn HumanInput,
        summary: &mut RunSummary,
    ) -> Result<RoundEnd, SessionError> {
        let mut session = self.inner.lock().await;
        match session.phase() {
            Phase::Idle | Phase::Stopped => return Ok(RoundEnd::Stop(RunStop::Stopped)),
            Phase::AwaitingSimulated => {}
            Phase::AwaitingHuman => {
                drop(session);
                let turn = input.next_turn(round).await;
                session = self.inner.lock().await;
                match turn {
                    HumanTurn::Quit => {
                        let _ = session.advance_human(HumanTurn::Quit)?;
                        return Ok(RoundEnd::Stop(RunStop::Quit));
                    }
                    HumanTurn::Speak(text) => match session.advance_human(HumanTurn::Speak(text)) {
                        Ok(TurnOutcome::Spoke { line }) => {
                            summary.record(input, RunEvent::Line { round, line });
                            return Ok(RoundEnd::Continue);
                        }
                        Ok(_) => return Ok(RoundEnd::Continue),
                        Err(SessionError::InvalidInput(reason)) => {
                            warn!(round, %reason, "human line rejected, skipping");
                            let _ = session.advance_human(HumanTurn::Skip)?;
                        }
                        Err(e) => return Err(e),
                    },
                    HumanTurn::Skip => {
                        let _ = session.advance_human(HumanTurn::Skip)?;
                    }
                }
            }
        }

        let situation = format!("这是第{round}轮对话");
        match session.advance_simulated(&situation).await {
            Ok(turn) => summary.record(input, RunEvent::Line { round, line: turn.line }),
            Err(e) => {
                warn!(round, error = %e, category = e.category(), "round abandoned");
                summary.record(
                    input,
                    RunEvent::Abandoned {
                        round,
                        reason: e.to_string(),
                    },
                );
            }
        }
        Ok(RoundEnd::Continue)
    }
}
