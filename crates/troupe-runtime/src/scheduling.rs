//! # Next-Speaker Extraction
//!
//! Turns a free-text scheduling decision into an index into the candidate
//! list. Tiers are tried in order:
//!
//! 1. The text after `下一个说话的角色：` on its line; the first candidate
//!    (in list order) whose name is a substring of it.
//! 2. The first candidate whose name appears anywhere in the reply.
//! 3. The first candidate.
//!
//! Only an empty candidate list yields `None`.

use std::sync::LazyLock;

use regex::Regex;

/// Label the scheduler is asked to prefix its choice with.
pub const NEXT_SPEAKER_LABEL: &str = "下一个说话的角色：";

static LABELED_CHOICE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(&format!("{}(.+)", regex::escape(NEXT_SPEAKER_LABEL))));

/// Pick a candidate index from a scheduling reply.
pub fn extract_speaker<S: AsRef<str>>(reply: &str, candidates: &[S]) -> Option<usize> {
    if candidates.is_empty() {
        return None;
    }

    let labeled = LABELED_CHOICE
        .as_ref()
        .ok()
        .and_then(|re| re.captures(reply))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim());
    if let Some(choice) = labeled {
        if let Some(idx) = first_contained(choice, candidates) {
            return Some(idx);
        }
    }

    first_contained(reply, candidates).or(Some(0))
}

fn first_contained<S: AsRef<str>>(haystack: &str, candidates: &[S]) -> Option<usize> {
    candidates
        .iter()
        .position(|name| haystack.contains(name.as_ref()))
}
