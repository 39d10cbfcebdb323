use serde::{Deserialize, Serialize};

/// Why the server stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    ToolCalls,
    Other(String),
}

impl FinishReason {
    pub fn parse(value: &str) -> Self {
        match value {
            "stop" => Self::Stop,
            "length" => Self::Length,
            "content_filter" => Self::ContentFilter,
            "tool_calls" | "function_call" => Self::ToolCalls,
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Stop => "stop",
            Self::Length => "length",
            Self::ContentFilter => "content_filter",
            Self::ToolCalls => "tool_calls",
            Self::Other(value) => value,
        }
    }
}

/// Stream event emitted by the parser after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatStreamEvent {
    /// A fragment of assistant text from `choices[0].delta.content`.
    ContentDelta { content: String },
    /// The first choice reported a `finish_reason`.
    Finished { reason: FinishReason },
    /// The `[DONE]` sentinel.
    Done,
    /// An `error` object delivered inside the stream.
    Error {
        code: Option<String>,
        message: Option<String>,
    },
}

impl ChatStreamEvent {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}
