//! Response interpreter: turns the model's raw text into a [`ModelResult`].
//!
//! Model output is untrusted. It is parsed strictly as a JSON object and the
//! `api_action` member is validated into an [`ActionDescriptor`]; anything
//! that does not fit yields [`ModelResult::ParseError`]. [`interpret`] never
//! panics and never returns an error.

use serde_json::Value;

use bb_domain::action::ActionDescriptor;

/// Reply used when the model supplies an action without a `response`.
pub const DEFAULT_REPLY: &str = "No response provided.";

/// Exactly one of these holds for every parse.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelResult {
    /// No action; the conversation continues with this question.
    FollowUp { question: String },
    /// An action to execute and the message to send once it is done.
    Completed {
        action: ActionDescriptor,
        reply_text: String,
    },
    /// The output did not match the expected shape.
    ParseError { raw_text: String, reason: String },
}

impl ModelResult {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FollowUp { .. } => "follow_up",
            Self::Completed { .. } => "completed",
            Self::ParseError { .. } => "parse_error",
        }
    }
}

/// Interpret one model reply.
///
/// | `api_action` | `response` | result                                   |
/// |--------------|------------|------------------------------------------|
/// | absent/null  | string     | `FollowUp`                               |
/// | valid        | string     | `Completed`                              |
/// | valid        | absent     | `Completed` with [`DEFAULT_REPLY`]       |
/// | invalid      | any        | `ParseError`                             |
/// | absent/null  | absent     | `ParseError`                             |
pub fn interpret(raw_text: &str) -> ModelResult {
    match parse(raw_text) {
        Ok(result) => result,
        Err(reason) => ModelResult::ParseError {
            raw_text: raw_text.to_owned(),
            reason,
        },
    }
}

fn parse(raw_text: &str) -> Result<ModelResult, String> {
    let body = strip_code_fence(raw_text.trim());
    let value: Value =
        serde_json::from_str(body).map_err(|e| format!("not a JSON document: {e}"))?;
    let obj = value
        .as_object()
        .ok_or_else(|| "top-level value is not an object".to_owned())?;

    let response = match obj.get("response") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => return Err("response must be a string".into()),
    };

    let action = match obj.get("api_action") {
        None | Some(Value::Null) => None,
        Some(v) => Some(ActionDescriptor::from_value(v).map_err(|e| e.to_string())?),
    };

    match (action, response) {
        (Some(action), reply_text) => Ok(ModelResult::Completed {
            action,
            reply_text: reply_text.unwrap_or_else(|| DEFAULT_REPLY.to_owned()),
        }),
        (None, Some(question)) => Ok(ModelResult::FollowUp { question }),
        (None, None) => Err("neither a response nor an api_action".into()),
    }
}

/// Unwrap a reply wrapped in one markdown code fence (```` ```json … ``` ````).
/// Anything else is returned unchanged.
fn strip_code_fence(text: &str) -> &str {
    let Some(inner) = text
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
    else {
        return text;
    };
    // The opening line may carry an info string such as `json`.
    match inner.find('\n') {
        Some(nl) => inner[nl + 1..].trim(),
        None => inner.trim(),
    }
}
