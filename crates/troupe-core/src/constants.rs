//! Shared constants.

/// Identifier the human participant goes by in the cast ("me").
pub const DEFAULT_HUMAN_NAME: &str = "我";

/// Number of recent history lines used when building a prompt.
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

/// Separator between speaker name and text in a history line (full-width colon).
pub const LINE_SEPARATOR: char = '：';

/// Number of leading characters of a credential shown in status output.
pub const CREDENTIAL_VISIBLE_PREFIX: usize = 8;
