//! Block domain model.
//!
//! # Responsibility
//! - Define the canonical record for one typed unit of page content.
//! - Provide typed access to the type-specific `properties` metadata.
//!
//! # Invariants
//! - `id` is stable for the block lifetime and never reused.
//! - `block_type` fully determines which `properties` keys are meaningful;
//!   unrelated keys are kept but ignored by rendering and transform logic.
//! - `indent` is always read back clamped to `0..=MAX_INDENT`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for one block inside a page document.
pub type BlockId = Uuid;

/// Identifier of the page a document belongs to.
pub type PageId = String;

/// String-keyed type-specific metadata.
pub type Properties = BTreeMap<String, Value>;

/// Maximum indentation level stored in `properties.indent`.
pub const MAX_INDENT: u8 = 3;

/// Indentation level (0-3).
pub const PROP_INDENT: &str = "indent";
/// Todo checked flag.
pub const PROP_CHECKED: &str = "checked";
/// Ordinal for numbered list items.
pub const PROP_NUMBER: &str = "number";
/// Callout emoji.
pub const PROP_EMOJI: &str = "emoji";
/// Callout kind (`info`, `warning`, ...).
pub const PROP_CALLOUT_TYPE: &str = "calloutType";
/// Opaque toggle body payload.
pub const PROP_CHILDREN: &str = "children";
/// Toggle open/closed state.
pub const PROP_EXPANDED: &str = "expanded";
/// Code block language hint.
pub const PROP_LANGUAGE: &str = "language";

/// Closed set of block kinds.
///
/// Every type can transform to every other type; `Divider` carries no
/// editable content and `Toggle` holds an opaque child body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    Text,
    Heading1,
    Heading2,
    Heading3,
    Bullet,
    Numbered,
    Todo,
    Toggle,
    Quote,
    Divider,
    Code,
    Callout,
}

impl BlockType {
    /// All block types in catalog order.
    pub const ALL: [BlockType; 12] = [
        BlockType::Text,
        BlockType::Heading1,
        BlockType::Heading2,
        BlockType::Heading3,
        BlockType::Bullet,
        BlockType::Numbered,
        BlockType::Todo,
        BlockType::Toggle,
        BlockType::Quote,
        BlockType::Divider,
        BlockType::Code,
        BlockType::Callout,
    ];

    /// Stable wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Heading1 => "heading1",
            Self::Heading2 => "heading2",
            Self::Heading3 => "heading3",
            Self::Bullet => "bullet",
            Self::Numbered => "numbered",
            Self::Todo => "todo",
            Self::Toggle => "toggle",
            Self::Quote => "quote",
            Self::Divider => "divider",
            Self::Code => "code",
            Self::Callout => "callout",
        }
    }

    /// Parses a wire name. Unknown names return `None`.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == value.trim())
    }

    /// Whether typing a trigger pattern into a blank block of this type may
    /// convert it. Only plain text blocks autoformat.
    pub fn allows_autoformat(self) -> bool {
        matches!(self, Self::Text)
    }

    /// List-like types continue themselves when a new block is split off.
    pub fn is_list(self) -> bool {
        matches!(self, Self::Bullet | Self::Numbered | Self::Todo)
    }

    /// Whether the block exposes an editable text surface.
    pub fn has_editable_content(self) -> bool {
        !matches!(self, Self::Divider)
    }
}

impl Display for BlockType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One typed unit of page content.
///
/// Serialized as `{id, type, content, properties}`; this is also the
/// persisted record shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    /// Serialized as `type` to match the persisted record shape.
    #[serde(rename = "type")]
    pub block_type: BlockType,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub properties: Properties,
}

impl Block {
    /// Creates a block with a freshly generated id and no properties.
    pub fn new(block_type: BlockType, content: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), block_type, content)
    }

    /// Creates a block with a caller-provided id.
    ///
    /// Used by load paths where identity already exists in storage.
    pub fn with_id(id: BlockId, block_type: BlockType, content: impl Into<String>) -> Self {
        Self {
            id,
            block_type,
            content: content.into(),
            properties: Properties::new(),
        }
    }

    /// The default block used to keep a document non-empty.
    pub fn default_text() -> Self {
        Self::new(BlockType::Text, "")
    }

    /// Builder-style property setter.
    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    /// Clone with a fresh id; content and properties are copied verbatim.
    pub fn duplicate(&self) -> Self {
        Self {
            id: Uuid::new_v4(),
            block_type: self.block_type,
            content: self.content.clone(),
            properties: self.properties.clone(),
        }
    }

    /// Shallow-merges a patch: content replaces, property keys overwrite.
    pub fn apply_patch(&mut self, patch: &BlockPatch) {
        if let Some(content) = &patch.content {
            self.content = content.clone();
        }
        merge_properties(&mut self.properties, &patch.properties);
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Indentation level clamped to `0..=MAX_INDENT`.
    pub fn indent(&self) -> u8 {
        self.properties
            .get(PROP_INDENT)
            .and_then(Value::as_u64)
            .map_or(0, |level| level.min(u64::from(MAX_INDENT)) as u8)
    }

    pub fn is_checked(&self) -> bool {
        self.properties
            .get(PROP_CHECKED)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Ordinal for numbered items, defaulting to 1.
    pub fn number(&self) -> u64 {
        self.properties
            .get(PROP_NUMBER)
            .and_then(Value::as_u64)
            .unwrap_or(1)
    }

    fn str_property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }

    /// Typed render descriptor for this block.
    pub fn view(&self) -> BlockView<'_> {
        BlockView::from_block(self)
    }
}

/// Partial update merged into a block by `MutationEngine::update`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockPatch {
    /// Replacement content, if any.
    pub content: Option<String>,
    /// Keys merged into existing properties.
    pub properties: Properties,
}

impl BlockPatch {
    /// Patch that only replaces content.
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            properties: Properties::new(),
        }
    }

    /// Patch that only merges properties.
    pub fn properties(properties: Properties) -> Self {
        Self {
            content: None,
            properties,
        }
    }

    /// Adds one property key to the patch.
    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.properties.is_empty()
    }
}

/// Shallow merge: each key in `extra` overwrites the same key in `target`.
pub fn merge_properties(target: &mut Properties, extra: &Properties) {
    for (key, value) in extra {
        target.insert(key.clone(), value.clone());
    }
}

/// Typed, per-variant view of a block for host renderers.
///
/// Derived on demand from `Block`; only keys meaningful to the variant are
/// surfaced.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockView<'a> {
    Text { text: &'a str, indent: u8 },
    Heading { level: u8, text: &'a str },
    Bullet { text: &'a str, indent: u8 },
    Numbered { text: &'a str, number: u64, indent: u8 },
    Todo { text: &'a str, checked: bool, indent: u8 },
    Toggle { text: &'a str, expanded: bool, body: Option<&'a Value>, indent: u8 },
    Quote { text: &'a str },
    Divider,
    Code { text: &'a str, language: Option<&'a str> },
    Callout { text: &'a str, emoji: &'a str, kind: &'a str },
}

const DEFAULT_CALLOUT_EMOJI: &str = "💡";
const DEFAULT_CALLOUT_KIND: &str = "info";

impl<'a> BlockView<'a> {
    fn from_block(block: &'a Block) -> Self {
        let text = block.content.as_str();
        let indent = block.indent();
        match block.block_type {
            BlockType::Text => Self::Text { text, indent },
            BlockType::Heading1 => Self::Heading { level: 1, text },
            BlockType::Heading2 => Self::Heading { level: 2, text },
            BlockType::Heading3 => Self::Heading { level: 3, text },
            BlockType::Bullet => Self::Bullet { text, indent },
            BlockType::Numbered => Self::Numbered {
                text,
                number: block.number(),
                indent,
            },
            BlockType::Todo => Self::Todo {
                text,
                checked: block.is_checked(),
                indent,
            },
            BlockType::Toggle => Self::Toggle {
                text,
                expanded: block
                    .properties
                    .get(PROP_EXPANDED)
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                body: block.properties.get(PROP_CHILDREN),
                indent,
            },
            BlockType::Quote => Self::Quote { text },
            BlockType::Divider => Self::Divider,
            BlockType::Code => Self::Code {
                text,
                language: block.str_property(PROP_LANGUAGE),
            },
            BlockType::Callout => Self::Callout {
                text,
                emoji: block
                    .str_property(PROP_EMOJI)
                    .unwrap_or(DEFAULT_CALLOUT_EMOJI),
                kind: block
                    .str_property(PROP_CALLOUT_TYPE)
                    .unwrap_or(DEFAULT_CALLOUT_KIND),
            },
        }
    }
}
