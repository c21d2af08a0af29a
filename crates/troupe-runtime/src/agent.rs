//! # Participant Agent
//!
//! One simulated cast member. Owns its credential, a generator bound to that
//! credential, a bounded view of the shared history and the scene and plot
//! strings it was created with. The system prompt is rendered once at
//! construction since none of its inputs change afterwards.

use std::sync::Arc;

use tracing::{debug, instrument, warn};
use troupe_core::{CastEntry, CredentialToken, HistoryWindow, format_line, strip_speaker_prefix};
use troupe_llm::{GenerationParams, Generator};

use crate::prompts::{character_system_prompt, character_user_prompt};

/// A generated line, or the in-band error line that replaced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentReply {
    /// Formatted `"{name}：{text}"` line.
    pub line: String,
    /// Whether generation failed and `line` carries the error.
    pub failed: bool,
}

/// A generation-backed participant.
pub struct ParticipantAgent {
    entry: CastEntry,
    credential: CredentialToken,
    generator: Arc<dyn Generator>,
    history: HistoryWindow,
    system_prompt: String,
}

impl ParticipantAgent {
    /// Create an agent for `entry` with fixed scene context.
    pub fn new(
        entry: CastEntry,
        credential: CredentialToken,
        generator: Arc<dyn Generator>,
        history_window: usize,
        template: &str,
        scene_setting: &str,
        plot_summary: &str,
    ) -> Self {
        let system_prompt = character_system_prompt(
            template,
            &entry.name,
            &entry.persona,
            scene_setting,
            plot_summary,
        );
        Self {
            entry,
            credential,
            generator,
            history: HistoryWindow::new(history_window),
            system_prompt,
        }
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.entry.name
    }

    /// Persona description.
    pub fn persona(&self) -> &str {
        &self.entry.persona
    }

    /// Credential this agent generates with.
    pub fn credential(&self) -> &CredentialToken {
        &self.credential
    }

    /// Bounded history view.
    pub fn history(&self) -> &HistoryWindow {
        &self.history
    }

    /// Rendered system prompt.
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Record a line in the bounded view.
    pub fn observe(&mut self, line: &str) {
        self.history.push(line);
    }

    /// Drop the bounded view.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Produce this agent's next line.
    ///
    /// Generation failures do not propagate: they become a visible
    /// `"{name}：[角色回应生成失败: ...]"` line so the conversation continues.
    #[instrument(skip(self, params), fields(agent = %self.entry.name))]
    pub async fn respond(&self, situation: &str, params: &GenerationParams) -> AgentReply {
        let user_prompt = character_user_prompt(&self.history.render(), situation, self.name());
        match self
            .generator
            .generate(&self.system_prompt, &user_prompt, params)
            .await
        {
            Ok(text) => {
                let text = strip_speaker_prefix(self.name(), &text);
                debug!(chars = text.chars().count(), "agent responded");
                AgentReply {
                    line: format_line(self.name(), text),
                    failed: false,
                }
            }
            Err(e) => {
                warn!(error = %e, category = e.category(), "agent response failed");
                AgentReply {
                    line: format_line(self.name(), &format!("[角色回应生成失败: {e}]")),
                    failed: true,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use troupe_llm::ProviderError;
    use troupe_llm::testing::ScriptedGenerator;

    use super::*;

    const TEMPLATE: &str = "你现在扮演角色：{character_name}\n角色信息：{character_info}\n场景背景：{scene_setting}\n剧情状况：{plot_summary}";

    fn agent(generator: Arc<ScriptedGenerator>, window: usize) -> ParticipantAgent {
        ParticipantAgent::new(
            CastEntry::new("Bob", "cheerful barista"),
            CredentialToken::new("sk-bob"),
            generator,
            window,
            TEMPLATE,
            "rainy cafe",
            "a stranger arrives",
        )
    }

    // ── Construction ─────────────────────────────────────────────────

    #[test]
    fn system_prompt_rendered_once() {
        let agent = agent(Arc::new(ScriptedGenerator::new()), 10);
        assert_eq!(
            agent.system_prompt(),
            "你现在扮演角色：Bob\n角色信息：cheerful barista\n场景背景：rainy cafe\n剧情状况：a stranger arrives"
        );
        assert_eq!(agent.credential().expose(), "sk-bob");
    }

    // ── History view ─────────────────────────────────────────────────

    #[test]
    fn observe_keeps_last_k() {
        let mut agent = agent(Arc::new(ScriptedGenerator::new()), 2);
        agent.observe("a");
        agent.observe("b");
        agent.observe("c");
        assert_eq!(agent.history().lines().collect::<Vec<_>>(), ["b", "c"]);
        agent.clear_history();
        assert!(agent.history().is_empty());
    }

    // ── respond ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn respond_formats_and_dedupes_prefix() {
        let generator = Arc::new(ScriptedGenerator::with_replies(["Bob：欢迎光临！", "要点什么？"]));
        let mut agent = agent(generator.clone(), 10);
        agent.observe("我：你好");

        let first = agent.respond("这是第1轮对话", &GenerationParams::default()).await;
        assert_eq!(first.line, "Bob：欢迎光临！");
        assert!(!first.failed);

        let second = agent.respond("继续对话", &GenerationParams::default()).await;
        assert_eq!(second.line, "Bob：要点什么？");

        let calls = generator.calls();
        assert_eq!(calls[0].system_prompt, agent.system_prompt());
        assert!(calls[0].user_prompt.contains("我：你好"));
        assert!(calls[0].user_prompt.contains("当前情况：这是第1轮对话"));
        assert!(calls[0].user_prompt.contains("请以Bob的身份回应"));
    }

    #[tokio::test]
    async fn respond_does_not_touch_history() {
        let generator = Arc::new(ScriptedGenerator::with_replies(["hi"]));
        let agent = agent(generator, 10);
        let _ = agent.respond("s", &GenerationParams::default()).await;
        assert!(agent.history().is_empty());
    }

    #[tokio::test]
    async fn failure_becomes_error_line() {
        let generator = Arc::new(ScriptedGenerator::new());
        generator.push_error(ProviderError::CredentialRejected {
            message: "invalid key".into(),
        });
        let agent = agent(generator, 10);
        let reply = agent.respond("s", &GenerationParams::default()).await;
        assert!(reply.failed);
        assert_eq!(reply.line, "Bob：[角色回应生成失败: credential rejected: invalid key]");
    }
}
