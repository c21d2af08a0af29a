//! Terminal play: human turns read line by line, progress printed to stdout.

use std::io::Write;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use troupe_runtime::{HumanInput, HumanTurn, RunEvent, RunSummary, ScenarioOutcome};

/// [`HumanInput`] backed by a line reader (stdin in the binary).
///
/// An empty line skips, a quit word or EOF quits, and cancellation while
/// waiting for input counts as quitting.
pub struct TerminalInput<R> {
    lines: Lines<R>,
    human_name: String,
    cancel: CancellationToken,
}

impl<R: AsyncBufRead + Unpin + Send> TerminalInput<R> {
    /// Read turns for `human_name` from `lines`.
    pub fn new(lines: Lines<R>, human_name: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            lines,
            human_name: human_name.into(),
            cancel,
        }
    }

    /// Read one raw line, `None` on EOF, error or cancellation.
    pub async fn read_line(&mut self) -> Option<String> {
        tokio::select! {
            () = self.cancel.cancelled() => None,
            line = self.lines.next_line() => match line {
                Ok(line) => line,
                Err(error) => {
                    warn!(%error, "failed to read input");
                    None
                }
            },
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> HumanInput for TerminalInput<R> {
    async fn next_turn(&mut self, round: u32) -> HumanTurn {
        print!("[第{round}轮] {}：", self.human_name);
        let _ = std::io::stdout().flush();
        match self.read_line().await {
            Some(text) => HumanTurn::from_input(&text),
            None => HumanTurn::Quit,
        }
    }

    fn on_event(&mut self, event: &RunEvent) {
        match event {
            RunEvent::RoundStarted { .. } => {}
            RunEvent::Line { line, .. } => println!("{line}"),
            RunEvent::Abandoned { round, reason } => {
                println!("（第{round}轮跳过：{reason}）");
            }
        }
    }
}

/// Print the scene and cast after a successful build.
pub fn print_scenario(outcome: &ScenarioOutcome) {
    println!("【场景设定】\n{}\n", outcome.scene_setting);
    println!("【主要角色】");
    for member in &outcome.cast {
        if member.human {
            println!("  - {}（你）", member.name);
        } else {
            println!("  - {}：{}", member.name, member.persona);
        }
    }
    println!("\n【剧情大纲】\n{}\n", outcome.plot_summary);
}

/// Print a one-line run summary.
pub fn print_summary(summary: &RunSummary) {
    println!(
        "\n对话结束：{}/{} 轮完成，{} 轮跳过（{:?}）",
        summary.completed, summary.requested, summary.abandoned, summary.stop
    );
}
