//! Bounded history window.
//!
//! Each participant agent keeps only the most recent `K` lines it has seen;
//! older lines are evicted on push. The window is what gets rendered into the
//! agent's prompt.

use std::collections::VecDeque;

/// The most recent `capacity` history lines, oldest first.
#[derive(Clone, Debug, Default)]
pub struct HistoryWindow {
    lines: VecDeque<String>,
    capacity: usize,
}

impl HistoryWindow {
    /// Create an empty window holding at most `capacity` lines.
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a line, evicting the oldest when full.
    pub fn push(&mut self, line: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        if self.lines.len() == self.capacity {
            let _ = self.lines.pop_front();
        }
        self.lines.push_back(line.into());
    }

    /// Lines currently in view, oldest first.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    /// Lines joined by newlines, as rendered into prompts.
    pub fn render(&self) -> String {
        self.lines().collect::<Vec<_>>().join("\n")
    }

    /// Number of lines in view.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the window is empty.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Maximum number of lines kept.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

/// Render the last `k` entries of a full history slice, newline-joined.
pub fn render_recent(history: &[String], k: usize) -> String {
    let start = history.len().saturating_sub(k);
    history[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn push_within_capacity_keeps_all() {
        let mut window = HistoryWindow::new(3);
        window.push("a");
        window.push("b");
        assert_eq!(window.lines().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn push_past_capacity_evicts_oldest() {
        let mut window = HistoryWindow::new(2);
        window.push("a");
        window.push("b");
        window.push("c");
        assert_eq!(window.lines().collect::<Vec<_>>(), vec!["b", "c"]);
    }

    #[test]
    fn zero_capacity_stays_empty() {
        let mut window = HistoryWindow::new(0);
        window.push("a");
        assert!(window.is_empty());
    }

    #[test]
    fn render_joins_with_newlines() {
        let mut window = HistoryWindow::new(5);
        window.push("我：你好");
        window.push("Bob：欢迎");
        assert_eq!(window.render(), "我：你好\nBob：欢迎");
    }

    #[test]
    fn clear_empties_window() {
        let mut window = HistoryWindow::new(2);
        window.push("a");
        window.clear();
        assert!(window.is_empty());
        assert_eq!(window.capacity(), 2);
    }

    #[test]
    fn render_recent_takes_tail() {
        let history: Vec<String> = (0..5).map(|i| i.to_string()).collect();
        assert_eq!(render_recent(&history, 2), "3\n4");
        assert_eq!(render_recent(&history, 10), "0\n1\n2\n3\n4");
        assert_eq!(render_recent(&[], 3), "");
    }

    proptest! {
        #[test]
        fn window_holds_last_k(lines in proptest::collection::vec("[a-z]{1,4}", 0..40), k in 1usize..12) {
            let mut window = HistoryWindow::new(k);
            for line in &lines {
                window.push(line.clone());
            }
            let start = lines.len().saturating_sub(k);
            let expected: Vec<&str> = lines[start..].iter().map(String::as_str).collect();
            prop_assert_eq!(window.lines().collect::<Vec<_>>(), expected);
            prop_assert!(window.len() <= k);
        }
    }
}
