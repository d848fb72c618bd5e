//! Slash-command palette for converting a blank block.
//!
//! # Responsibility
//! - Provide the fixed catalog of block-type commands.
//! - Run one transient palette session: live query filtering, selection
//!   navigation and the selection handed back to the session for applying.
//!
//! # Invariants
//! - A session only opens on a block with empty content.
//! - The selection index stays within `[0, match_count - 1]` and resets to 0
//!   whenever the filtered set changes.
//! - Selecting with no matches is a no-op; Escape and outside clicks close
//!   without effect.

use crate::model::block::{
    BlockId, BlockType, Properties, PROP_CALLOUT_TYPE, PROP_CHECKED, PROP_CHILDREN, PROP_EMOJI,
    PROP_EXPANDED, PROP_LANGUAGE, PROP_NUMBER,
};
use serde_json::Value;

const MAX_QUERY_CHARS: usize = 64;

/// One catalog entry.
#[derive(Debug, Clone, PartialEq)]
pub struct PaletteCommand {
    pub block_type: BlockType,
    pub label: &'static str,
    pub shortcut: &'static str,
    pub description: &'static str,
    /// Merged into the target block's properties on apply.
    pub properties: Option<Properties>,
    /// Replaces the target content after the transform when set.
    pub default_content: Option<&'static str>,
}

impl PaletteCommand {
    fn new(
        block_type: BlockType,
        label: &'static str,
        shortcut: &'static str,
        description: &'static str,
    ) -> Self {
        Self {
            block_type,
            label,
            shortcut,
            description,
            properties: None,
            default_content: None,
        }
    }

    fn with_property(mut self, key: &str, value: Value) -> Self {
        self.properties
            .get_or_insert_with(Properties::new)
            .insert(key.to_string(), value);
        self
    }

    fn with_default_content(mut self, content: &'static str) -> Self {
        self.default_content = Some(content);
        self
    }

    /// Case-insensitive substring match over label, shortcut and description.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        [self.label, self.shortcut, self.description]
            .iter()
            .any(|field| field.to_lowercase().contains(query.as_str()))
    }
}

/// Built-in command catalog, one entry per block type.
pub fn default_catalog() -> Vec<PaletteCommand> {
    vec![
        PaletteCommand::new(BlockType::Text, "Text", "/text", "Plain paragraph"),
        PaletteCommand::new(BlockType::Heading1, "Heading 1", "#", "Large section heading"),
        PaletteCommand::new(BlockType::Heading2, "Heading 2", "##", "Medium section heading"),
        PaletteCommand::new(BlockType::Heading3, "Heading 3", "###", "Small section heading"),
        PaletteCommand::new(BlockType::Bullet, "Bulleted list", "-", "Simple bulleted list"),
        PaletteCommand::new(BlockType::Numbered, "Numbered list", "1.", "List with numbering")
            .with_property(PROP_NUMBER, Value::from(1)),
        PaletteCommand::new(BlockType::Todo, "To-do", "[]", "Track a task with a checkbox")
            .with_property(PROP_CHECKED, Value::from(false)),
        PaletteCommand::new(BlockType::Toggle, "Toggle", ">>", "Collapsible section")
            .with_property(PROP_EXPANDED, Value::from(false))
            .with_property(PROP_CHILDREN, Value::Array(Vec::new())),
        PaletteCommand::new(BlockType::Quote, "Quote", ">", "Capture a quotation"),
        PaletteCommand::new(BlockType::Divider, "Divider", "---", "Visual separator")
            .with_default_content(""),
        PaletteCommand::new(BlockType::Code, "Code", "```", "Code snippet")
            .with_property(PROP_LANGUAGE, Value::from("plain")),
        PaletteCommand::new(BlockType::Callout, "Callout", "!", "Highlighted note")
            .with_property(PROP_EMOJI, Value::from("💡"))
            .with_property(PROP_CALLOUT_TYPE, Value::from("info")),
    ]
}

/// Screen position the host anchors the overlay to.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PaletteAnchor {
    pub x: f64,
    pub y: f64,
}

/// Keys the palette consumes while open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaletteKey {
    Up,
    Down,
    Enter,
    Escape,
}

/// Command chosen by the user, to be applied to `target`.
#[derive(Debug, Clone, PartialEq)]
pub struct PaletteSelection {
    pub target: BlockId,
    pub command: PaletteCommand,
}

/// Outcome of a key press inside the palette.
#[derive(Debug, Clone, PartialEq)]
pub enum PaletteOutcome {
    /// Palette stays open (navigation, or Enter with no matches).
    Pending,
    /// Palette closed without effect.
    Dismissed,
    /// Palette closed with a command to apply.
    Selected(PaletteSelection),
}

#[derive(Debug, Clone, PartialEq)]
struct PaletteSession {
    target: BlockId,
    anchor: PaletteAnchor,
    query: String,
    matches: Vec<usize>,
    selected: usize,
}

/// Palette state for one open document.
#[derive(Debug, Clone)]
pub struct CommandPalette {
    catalog: Vec<PaletteCommand>,
    session: Option<PaletteSession>,
}

impl Default for CommandPalette {
    fn default() -> Self {
        Self::new(default_catalog())
    }
}

impl CommandPalette {
    pub fn new(catalog: Vec<PaletteCommand>) -> Self {
        Self {
            catalog,
            session: None,
        }
    }

    pub fn catalog(&self) -> &[PaletteCommand] {
        &self.catalog
    }

    /// Opens a session for `target`. Refused unless the target is blank.
    pub fn open(&mut self, target: BlockId, target_content: &str, anchor: PaletteAnchor) -> bool {
        if !target_content.is_empty() {
            return false;
        }
        self.session = Some(PaletteSession {
            target,
            anchor,
            query: String::new(),
            matches: (0..self.catalog.len()).collect(),
            selected: 0,
        });
        true
    }

    pub fn close(&mut self) {
        self.session = None;
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn target(&self) -> Option<BlockId> {
        self.session.as_ref().map(|session| session.target)
    }

    pub fn anchor(&self) -> Option<PaletteAnchor> {
        self.session.as_ref().map(|session| session.anchor)
    }

    pub fn query(&self) -> Option<&str> {
        self.session.as_ref().map(|session| session.query.as_str())
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.session.as_ref().map(|session| session.selected)
    }

    /// Commands matching the current query, in catalog order.
    pub fn matches(&self) -> Vec<&PaletteCommand> {
        self.session
            .as_ref()
            .map(|session| {
                session
                    .matches
                    .iter()
                    .map(|index| &self.catalog[*index])
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Replaces the query and refilters.
    pub fn set_query(&mut self, query: &str) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.query = query.chars().take(MAX_QUERY_CHARS).collect();
        let matches = self
            .catalog
            .iter()
            .enumerate()
            .filter(|(_, command)| command.matches(session.query.as_str()))
            .map(|(index, _)| index)
            .collect::<Vec<_>>();
        if matches != session.matches {
            session.matches = matches;
            session.selected = 0;
        }
    }

    pub fn push_char(&mut self, ch: char) {
        if let Some(mut query) = self.query().map(str::to_string) {
            query.push(ch);
            self.set_query(query.as_str());
        }
    }

    pub fn backspace(&mut self) {
        if let Some(mut query) = self.query().map(str::to_string) {
            query.pop();
            self.set_query(query.as_str());
        }
    }

    /// Handles one navigation key. Closed palettes ignore input.
    pub fn handle_key(&mut self, key: PaletteKey) -> PaletteOutcome {
        let Some(session) = self.session.as_mut() else {
            return PaletteOutcome::Dismissed;
        };
        match key {
            PaletteKey::Up => {
                session.selected = session.selected.saturating_sub(1);
                PaletteOutcome::Pending
            }
            PaletteKey::Down => {
                let last = session.matches.len().saturating_sub(1);
                session.selected = (session.selected + 1).min(last);
                PaletteOutcome::Pending
            }
            PaletteKey::Enter => {
                let Some(index) = session.matches.get(session.selected).copied() else {
                    return PaletteOutcome::Pending;
                };
                let selection = PaletteSelection {
                    target: session.target,
                    command: self.catalog[index].clone(),
                };
                self.session = None;
                PaletteOutcome::Selected(selection)
            }
            PaletteKey::Escape => {
                self.session = None;
                PaletteOutcome::Dismissed
            }
        }
    }

    /// Any interaction outside the overlay bounds closes it.
    pub fn click_outside(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::{CommandPalette, PaletteAnchor, PaletteKey, PaletteOutcome};
    use crate::model::block::BlockType;
    use uuid::Uuid;

    fn opened() -> (CommandPalette, Uuid) {
        let mut palette = CommandPalette::default();
        let target = Uuid::new_v4();
        assert!(palette.open(target, "", PaletteAnchor { x: 10.0, y: 20.0 }));
        (palette, target)
    }

    #[test]
    fn refuses_to_open_on_non_empty_block() {
        let mut palette = CommandPalette::default();
        assert!(!palette.open(Uuid::new_v4(), "hello", PaletteAnchor::default()));
        assert!(!palette.is_open());
    }

    #[test]
    fn filter_is_case_insensitive_over_all_fields() {
        let (mut palette, _) = opened();

        palette.set_query("HEADING");
        assert_eq!(palette.matches().len(), 3);

        palette.set_query("checkbox");
        let matches = palette.matches();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].block_type, BlockType::Todo);

        palette.set_query("```");
        assert_eq!(palette.matches()[0].block_type, BlockType::Code);
    }

    #[test]
    fn selection_clamps_and_resets_on_filter_change() {
        let (mut palette, _) = opened();
        palette.set_query("heading");
        for _ in 0..10 {
            palette.handle_key(PaletteKey::Down);
        }
        assert_eq!(palette.selected_index(), Some(2));

        palette.set_query("heading 1");
        assert_eq!(palette.selected_index(), Some(0));

        palette.handle_key(PaletteKey::Up);
        assert_eq!(palette.selected_index(), Some(0));
    }

    #[test]
    fn enter_with_no_matches_is_noop() {
        let (mut palette, _) = opened();
        palette.set_query("zzzz-no-such-command");
        assert_eq!(palette.handle_key(PaletteKey::Enter), PaletteOutcome::Pending);
        assert!(palette.is_open());
    }

    #[test]
    fn enter_returns_selection_and_closes() {
        let (mut palette, target) = opened();
        palette.set_query("quote");
        match palette.handle_key(PaletteKey::Enter) {
            PaletteOutcome::Selected(selection) => {
                assert_eq!(selection.target, target);
                assert_eq!(selection.command.block_type, BlockType::Quote);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(!palette.is_open());
    }

    #[test]
    fn escape_and_outside_click_close_without_selection() {
        let (mut palette, _) = opened();
        assert_eq!(palette.handle_key(PaletteKey::Escape), PaletteOutcome::Dismissed);

        let (mut palette, _) = opened();
        palette.click_outside();
        assert!(!palette.is_open());
        assert_eq!(palette.anchor(), None);
    }
}
