//! # Coordinator
//!
//! Owns the credential pool, the participant roster and the shared history.
//!
//! - Builds the scenario with one generation call and parses it
//! - Materializes the cast: one agent per simulated entry, one credential each
//! - Decides who speaks next from a free-text scheduling reply
//! - Appends to the shared history and mirrors every line into each agent
//!
//! A coordinator is materialized at most once. Replacing a cast means
//! building a new coordinator and tearing the old one down.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use troupe_core::history::render_recent;
use troupe_core::{CastEntry, CredentialToken};
use troupe_llm::{Generator, GeneratorFactory, ProviderError};

use crate::agent::{AgentReply, ParticipantAgent};
use crate::config::RuntimeConfig;
use crate::conversation::{AgentHandle, Participant};
use crate::errors::{CastError, ScenarioError};
use crate::pool::CredentialPool;
use crate::prompts::decision_user_prompt;
use crate::scenario::{ScenarioDraft, parse_scenario};
use crate::scheduling::extract_speaker;

/// Cast member as reported to callers. Credentials are masked.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CastMember {
    /// Display name.
    pub name: String,
    /// Persona description.
    pub persona: String,
    /// Whether this is the human participant.
    pub human: bool,
    /// Masked credential, absent for the human.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

/// Scenario builder, scheduler and roster owner.
pub struct Coordinator {
    config: RuntimeConfig,
    factory: Arc<dyn GeneratorFactory>,
    generator: Arc<dyn Generator>,
    pool: CredentialPool,
    human: Option<CastEntry>,
    agents: Vec<ParticipantAgent>,
    scene_setting: String,
    plot_summary: String,
    history: Vec<String>,
}

impl Coordinator {
    /// Create a coordinator. Its own generator uses the pool's first
    /// credential without checking it out.
    pub fn new(
        config: RuntimeConfig,
        pool: CredentialPool,
        factory: Arc<dyn GeneratorFactory>,
    ) -> Result<Self, ProviderError> {
        let generator = factory.for_credential(pool.primary())?;
        Ok(Self {
            config,
            factory,
            generator,
            pool,
            human: None,
            agents: Vec::new(),
            scene_setting: String::new(),
            plot_summary: String::new(),
            history: Vec::new(),
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Scenario and cast
    // ─────────────────────────────────────────────────────────────────────

    /// Ask the builder for a scenario and parse it.
    ///
    /// Stores the scene and plot for agents created afterwards.
    #[instrument(skip_all, fields(description_len = description.len()))]
    pub async fn build_scenario(&mut self, description: &str) -> Result<ScenarioDraft, ScenarioError> {
        let description = description.trim();
        if description.is_empty() {
            return Err(ScenarioError::BlankDescription);
        }

        let reply = self
            .generator
            .generate(&self.config.scheduler_system, description, &self.config.generation)
            .await?;
        let draft = parse_scenario(&reply);
        if draft.cast.is_empty() {
            warn!(reply_len = reply.len(), "scenario reply has no cast section");
            return Err(ScenarioError::NoCast);
        }

        self.scene_setting.clone_from(&draft.scene_setting);
        self.plot_summary.clone_from(&draft.plot_summary);
        info!(cast = draft.cast.len(), "scenario built");
        Ok(draft)
    }

    /// Separate the human from simulated entries and create one agent per
    /// simulated entry.
    ///
    /// The human entry is the first whose name contains the configured human
    /// identifier; later entries that also contain it are dropped. On error
    /// nothing is built and the pool is left as it was.
    ///
    /// Precondition: called at most once per coordinator.
    pub fn materialize_cast(&mut self, entries: &[CastEntry]) -> Result<(), CastError> {
        debug_assert!(self.agents.is_empty(), "cast already materialized");

        let human_name = self.config.human_name.as_str();
        let mut human = None;
        let mut simulated = Vec::new();
        for entry in entries {
            if entry.is_human(human_name) {
                if human.is_none() {
                    human = Some(entry.clone());
                } else {
                    warn!(name = %entry.name, "dropping extra human cast entry");
                }
            } else {
                simulated.push(entry.clone());
            }
        }

        let Some(human) = human else {
            return Err(CastError::MissingHuman {
                human_name: human_name.to_owned(),
            });
        };
        if simulated.is_empty() {
            return Err(CastError::NoSimulatedParticipants);
        }

        let credentials = self.pool.acquire(simulated.len());
        let mut generators = Vec::with_capacity(simulated.len());
        for (entry, credential) in simulated.iter().zip(&credentials) {
            match self.factory.for_credential(credential) {
                Ok(generator) => generators.push(generator),
                Err(source) => {
                    for credential in &credentials {
                        self.pool.release(credential);
                    }
                    return Err(CastError::Generator {
                        name: entry.name.clone(),
                        source,
                    });
                }
            }
        }

        self.agents = simulated
            .into_iter()
            .zip(credentials)
            .zip(generators)
            .map(|((entry, credential), generator)| {
                ParticipantAgent::new(
                    entry,
                    credential,
                    generator,
                    self.config.history_window,
                    &self.config.character_template,
                    &self.scene_setting,
                    &self.plot_summary,
                )
            })
            .collect();
        self.human = Some(human);

        info!(
            agents = self.agents.len(),
            available = self.pool.available_count(),
            total = self.pool.total_count(),
            "cast materialized"
        );
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Scheduling
    // ─────────────────────────────────────────────────────────────────────

    /// Candidates in scheduling order: the human first, then agents in
    /// cast order.
    fn candidates(&self, exclude_human: bool) -> Vec<(Participant, &str)> {
        let human = (!exclude_human && self.human.is_some())
            .then_some((Participant::Human, self.config.human_name.as_str()));
        human
            .into_iter()
            .chain(
                self.agents
                    .iter()
                    .enumerate()
                    .map(|(i, agent)| (Participant::Simulated(AgentHandle(i)), agent.name())),
            )
            .collect()
    }

    /// Decide who speaks next.
    ///
    /// Returns `None` only when there is nobody to choose from; otherwise
    /// the free-text reply always resolves to some candidate.
    #[instrument(skip(self))]
    pub async fn decide_next_speaker(
        &self,
        situation: &str,
        exclude_human: bool,
    ) -> Result<Option<Participant>, ProviderError> {
        let candidates = self.candidates(exclude_human);
        if candidates.is_empty() {
            debug!("no candidates to schedule");
            return Ok(None);
        }

        let names: Vec<&str> = candidates.iter().map(|(_, name)| *name).collect();
        let prompt = decision_user_prompt(
            &self.scene_setting,
            &names,
            &render_recent(&self.history, self.config.history_window),
            situation,
            exclude_human.then_some(self.config.human_name.as_str()),
        );
        let reply = self
            .generator
            .generate(
                &self.config.scheduler_system,
                &prompt,
                &self.config.scheduling_params(),
            )
            .await?;

        let chosen = extract_speaker(&reply, &names).map(|idx| candidates[idx].0);
        if let Some(participant) = chosen {
            info!(speaker = self.participant_name(participant), "next speaker decided");
        }
        Ok(chosen)
    }

    /// Have a simulated participant produce its line. `None` for the human
    /// or an unknown handle.
    pub async fn respond(&self, speaker: Participant, situation: &str) -> Option<AgentReply> {
        let agent = self.agent(speaker)?;
        Some(agent.respond(situation, &self.config.generation).await)
    }

    // ─────────────────────────────────────────────────────────────────────
    // History
    // ─────────────────────────────────────────────────────────────────────

    /// Append a line to the shared history and every agent's view.
    pub fn append_history(&mut self, line: impl Into<String>) {
        let line = line.into();
        for agent in &mut self.agents {
            agent.observe(&line);
        }
        self.history.push(line);
    }

    /// Full shared history, oldest first.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Clear the shared history and every agent's view. Agents and
    /// credentials are kept.
    pub fn clear_all(&mut self) {
        self.history.clear();
        for agent in &mut self.agents {
            agent.clear_history();
        }
    }

    /// Release every credential and drop the roster.
    pub fn teardown(&mut self) {
        self.clear_all();
        self.agents.clear();
        self.human = None;
        self.pool.release_all();
        debug!("coordinator torn down");
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lookup
    // ─────────────────────────────────────────────────────────────────────

    /// Agent behind a participant; `None` for the human.
    pub fn agent(&self, participant: Participant) -> Option<&ParticipantAgent> {
        match participant {
            Participant::Human => None,
            Participant::Simulated(AgentHandle(idx)) => self.agents.get(idx),
        }
    }

    /// Simulated participant by name; `None` for the human identifier or an
    /// unknown name. Resolve once, then address the agent by handle.
    pub fn simulated_by_name(&self, name: &str) -> Option<Participant> {
        if name == self.config.human_name {
            return None;
        }
        self.agents
            .iter()
            .position(|agent| agent.name() == name)
            .map(|idx| Participant::Simulated(AgentHandle(idx)))
    }

    /// Display name of a participant.
    pub fn participant_name(&self, participant: Participant) -> &str {
        match participant {
            Participant::Human => &self.config.human_name,
            Participant::Simulated(_) => self.agent(participant).map_or("", ParticipantAgent::name),
        }
    }

    /// Simulated participants, in cast order.
    pub fn agents(&self) -> &[ParticipantAgent] {
        &self.agents
    }

    /// Configured human identifier.
    pub fn human_name(&self) -> &str {
        &self.config.human_name
    }

    /// Whether a cast has been materialized.
    pub fn is_materialized(&self) -> bool {
        self.human.is_some()
    }

    /// Scene section of the built scenario.
    pub fn scene_setting(&self) -> &str {
        &self.scene_setting
    }

    /// Plot section of the built scenario.
    pub fn plot_summary(&self) -> &str {
        &self.plot_summary
    }

    /// Credential pool.
    pub fn pool(&self) -> &CredentialPool {
        &self.pool
    }

    /// Human first, then agents, with masked credentials.
    pub fn cast(&self) -> Vec<CastMember> {
        let human = self.human.iter().map(|entry| CastMember {
            name: entry.name.clone(),
            persona: entry.persona.clone(),
            human: true,
            credential: None,
        });
        let agents = self.agents.iter().map(|agent| CastMember {
            name: agent.name().to_owned(),
            persona: agent.persona().to_owned(),
            human: false,
            credential: Some(agent.credential().masked()),
        });
        human.chain(agents).collect()
    }

    /// Credentials held by agents, in cast order.
    pub fn agent_credentials(&self) -> Vec<CredentialToken> {
        self.agents.iter().map(|a| a.credential().clone()).collect()
    }
}
