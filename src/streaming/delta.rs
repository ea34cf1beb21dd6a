//! Partial deltas fed into the incremental builder.
//!
//! A `PartialDelta` is the union of what one chat-completions chunk or one Responses API
//! event can carry. Every field is optional; decoders fill only what the frame contained.

use chrono::{DateTime, Utc};

use crate::types::Usage;

/// How a tool call fragment is addressed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ToolCallKey {
    /// Caller-visible index (chat completions `tool_calls[].index`).
    Index(u32),
    /// Opaque output item id (Responses API); the builder assigns the index.
    ItemId(String),
}

/// Whether a fragment continues a tool call or finalizes it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FragmentPhase {
    #[default]
    Delta,
    /// Arguments are complete (`function_call_arguments.done` / `output_item.done`).
    Done,
}

/// One slice of a tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallFragment {
    pub key: ToolCallKey,
    pub id: Option<String>,
    pub name: Option<String>,
    /// Argument slice for `Delta`, full argument snapshot (if any) for `Done`.
    pub arguments: Option<String>,
    pub phase: FragmentPhase,
}

impl ToolCallFragment {
    pub fn indexed(index: u32) -> Self {
        Self {
            key: ToolCallKey::Index(index),
            id: None,
            name: None,
            arguments: None,
            phase: FragmentPhase::Delta,
        }
    }

    pub fn item(item_id: impl Into<String>) -> Self {
        Self {
            key: ToolCallKey::ItemId(item_id.into()),
            id: None,
            name: None,
            arguments: None,
            phase: FragmentPhase::Delta,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_arguments(mut self, arguments: impl Into<String>) -> Self {
        self.arguments = Some(arguments.into());
        self
    }

    pub fn done(mut self) -> Self {
        self.phase = FragmentPhase::Done;
        self
    }
}

/// Legacy single `function_call` delta (pre-`tool_calls` chat completions).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionCallFragment {
    pub name: Option<String>,
    pub arguments: Option<String>,
}

/// Metadata scalars; each one independently optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataFragment {
    pub id: Option<String>,
    pub model: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub service_tier: Option<String>,
    pub system_fingerprint: Option<String>,
}

impl MetadataFragment {
    pub fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.model.is_none()
            && self.created.is_none()
            && self.service_tier.is_none()
            && self.system_fingerprint.is_none()
    }
}

/// One incoming fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialDelta {
    pub text: Option<String>,
    pub reasoning: Option<String>,
    pub tool_calls: Vec<ToolCallFragment>,
    pub function_call: Option<FunctionCallFragment>,
    pub finish_status: Option<String>,
    pub usage: Option<Usage>,
    pub metadata: Option<MetadataFragment>,
}

impl PartialDelta {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn reasoning(text: impl Into<String>) -> Self {
        Self {
            reasoning: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn tool_call(fragment: ToolCallFragment) -> Self {
        Self {
            tool_calls: vec![fragment],
            ..Default::default()
        }
    }

    pub fn finish(status: impl Into<String>) -> Self {
        Self {
            finish_status: Some(status.into()),
            ..Default::default()
        }
    }

    pub fn usage(usage: Usage) -> Self {
        Self {
            usage: Some(usage),
            ..Default::default()
        }
    }

    pub fn metadata(metadata: MetadataFragment) -> Self {
        Self {
            metadata: Some(metadata),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_none()
            && self.reasoning.is_none()
            && self.tool_calls.is_empty()
            && self.function_call.is_none()
            && self.finish_status.is_none()
            && self.usage.is_none()
            && self.metadata.as_ref().is_none_or(MetadataFragment::is_empty)
    }
}
