//! Markdown-style trigger detection for blank blocks.
//!
//! # Responsibility
//! - Recognize typed trigger text (`"# "`, `"- "`, `"1. "`, ...) and name
//!   the block type it converts to.
//!
//! # Invariants
//! - Only an empty -> non-empty content transition on a block whose type
//!   allows autoformat is considered.
//! - Triggers match the whole content exactly; longer text never matches.
//! - Rules are checked in fixed priority order and the first match wins.

use crate::model::block::BlockType;
use once_cell::sync::Lazy;
use regex::Regex;

static NUMBERED_TRIGGER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.\s$").expect("valid numbered trigger regex"));

#[derive(Debug, Clone, Copy)]
enum Trigger {
    Exact(&'static [&'static str]),
    Numbered,
}

impl Trigger {
    fn matches(self, content: &str) -> bool {
        match self {
            Self::Exact(candidates) => candidates.contains(&content),
            Self::Numbered => NUMBERED_TRIGGER_RE.is_match(content),
        }
    }
}

const RULES: &[(Trigger, BlockType)] = &[
    (Trigger::Exact(&["# "]), BlockType::Heading1),
    (Trigger::Exact(&["## "]), BlockType::Heading2),
    (Trigger::Exact(&["### "]), BlockType::Heading3),
    (Trigger::Exact(&["- ", "* "]), BlockType::Bullet),
    (Trigger::Numbered, BlockType::Numbered),
    (Trigger::Exact(&["[] ", "[ ] "]), BlockType::Todo),
    (Trigger::Exact(&["> "]), BlockType::Quote),
];

/// Returns the block type whose trigger equals `content`, if any.
pub fn detect_trigger(content: &str) -> Option<BlockType> {
    RULES
        .iter()
        .find(|(trigger, _)| trigger.matches(content))
        .map(|(_, block_type)| *block_type)
}

/// Stateless observer of content updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoformatDetector;

impl AutoformatDetector {
    pub fn new() -> Self {
        Self
    }

    /// Decides whether a content update should convert the block.
    ///
    /// Returns the target type; the caller then transforms the block and
    /// clears its content so the trigger text is never displayed.
    pub fn observe(
        &self,
        previous_content: &str,
        new_content: &str,
        current_type: BlockType,
    ) -> Option<BlockType> {
        if !previous_content.is_empty() || new_content.is_empty() {
            return None;
        }
        if !current_type.allows_autoformat() {
            return None;
        }
        detect_trigger(new_content)
    }
}
