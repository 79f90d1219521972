//! The action descriptor: one state-changing operation against the board.
//!
//! Built from the model's `api_action` object and validated at construction,
//! so the executor never has to look fields up by key.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Method
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The closed set of operations an action may perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionMethod {
    Create,
    Read,
    Update,
    Delete,
}

impl ActionMethod {
    /// Accepts HTTP verbs (`POST`, `GET`, `PUT`, `DELETE`) or operation
    /// names (`create`, `read`, `update`, `delete`), case-insensitively.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "post" | "create" => Some(Self::Create),
            "get" | "read" => Some(Self::Read),
            "put" | "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }

    /// The HTTP verb used against the board service.
    pub fn http_verb(self) -> &'static str {
        match self {
            Self::Create => "POST",
            Self::Read => "GET",
            Self::Update => "PUT",
            Self::Delete => "DELETE",
        }
    }

    /// Whether parameters travel as a JSON body (`true`) or as query
    /// parameters (`false`).
    pub fn sends_body(self) -> bool {
        matches!(self, Self::Create | Self::Update)
    }
}

impl fmt::Display for ActionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.http_verb())
    }
}

impl<'de> Deserialize<'de> for ActionMethod {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown action method '{raw}'")))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Descriptor
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A validated board operation. Consumed once by the executor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionDescriptor {
    endpoint: String,
    method: ActionMethod,
    parameters: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url_params: Option<String>,
}

impl ActionDescriptor {
    pub fn new(endpoint: impl Into<String>, method: ActionMethod) -> Result<Self> {
        let endpoint = endpoint.into();
        validate_endpoint(&endpoint)?;
        Ok(Self {
            endpoint,
            method,
            parameters: Map::new(),
            url_params: None,
        })
    }

    pub fn with_parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Set the raw query suffix. A leading `?` is stripped; an empty
    /// string clears it.
    pub fn with_url_params(mut self, url_params: impl AsRef<str>) -> Self {
        let trimmed = url_params.as_ref().trim().trim_start_matches('?');
        self.url_params = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_owned())
        };
        self
    }

    /// Build a descriptor from the model's `api_action` JSON object.
    ///
    /// `endpoint` and `method` are required strings; `parameters` must be an
    /// object when present and `url_params` a string when present. `null`
    /// counts as absent for the optional fields.
    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| Error::InvalidAction("api_action must be an object".into()))?;

        let endpoint = match obj.get("endpoint") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim(),
            Some(Value::String(_)) => {
                return Err(Error::InvalidAction("endpoint must not be empty".into()))
            }
            Some(_) => return Err(Error::InvalidAction("endpoint must be a string".into())),
            None => return Err(Error::InvalidAction("missing endpoint".into())),
        };

        let method = match obj.get("method") {
            Some(Value::String(s)) if !s.trim().is_empty() => ActionMethod::parse(s)
                .ok_or_else(|| Error::InvalidAction(format!("unknown method '{s}'")))?,
            Some(Value::String(_)) => {
                return Err(Error::InvalidAction("method must not be empty".into()))
            }
            Some(_) => return Err(Error::InvalidAction("method must be a string".into())),
            None => return Err(Error::InvalidAction("missing method".into())),
        };

        let parameters = match obj.get("parameters") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => {
                return Err(Error::InvalidAction("parameters must be an object".into()))
            }
        };

        let mut action = Self::new(endpoint, method)?.with_parameters(parameters);
        match obj.get("url_params") {
            None | Some(Value::Null) => {}
            Some(Value::String(s)) => action = action.with_url_params(s),
            Some(_) => {
                return Err(Error::InvalidAction("url_params must be a string".into()))
            }
        }
        Ok(action)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn method(&self) -> ActionMethod {
        self.method
    }

    pub fn parameters(&self) -> &Map<String, Value> {
        &self.parameters
    }

    pub fn url_params(&self) -> Option<&str> {
        self.url_params.as_deref()
    }

    /// A copy of the parameters with `extra` merged in (overriding any key
    /// the model supplied). The descriptor itself is left untouched.
    pub fn parameters_with(&self, extra: &[(&str, &str)]) -> Map<String, Value> {
        let mut merged = self.parameters.clone();
        for (k, v) in extra {
            merged.insert((*k).to_owned(), Value::String((*v).to_owned()));
        }
        merged
    }
}

/// Endpoints are paths relative to the board API base. Anything that could
/// point the request (and its credentials) elsewhere is rejected.
fn validate_endpoint(endpoint: &str) -> Result<()> {
    if endpoint.is_empty() {
        return Err(Error::InvalidAction("endpoint must not be empty".into()));
    }
    if !endpoint.starts_with('/') {
        return Err(Error::InvalidAction(format!(
            "endpoint '{endpoint}' must start with '/'"
        )));
    }
    if endpoint.contains("://") || endpoint.contains("..") {
        return Err(Error::InvalidAction(format!(
            "endpoint '{endpoint}' must be a relative API path"
        )));
    }
    if endpoint.contains('?') || endpoint.contains('#') {
        return Err(Error::InvalidAction(format!(
            "endpoint '{endpoint}' must not carry a query; use url_params"
        )));
    }
    if endpoint.chars().any(char::is_whitespace) {
        return Err(Error::InvalidAction(format!(
            "endpoint '{endpoint}' must not contain whitespace"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn method_accepts_verbs_and_names() {
        assert_eq!(ActionMethod::parse("POST"), Some(ActionMethod::Create));
        assert_eq!(ActionMethod::parse("create"), Some(ActionMethod::Create));
        assert_eq!(ActionMethod::parse(" get "), Some(ActionMethod::Read));
        assert_eq!(ActionMethod::parse("Put"), Some(ActionMethod::Update));
        assert_eq!(ActionMethod::parse("DELETE"), Some(ActionMethod::Delete));
        assert_eq!(ActionMethod::parse("PATCH"), None);
        assert_eq!(ActionMethod::parse(""), None);
    }

    #[test]
    fn method_maps_to_http_verbs() {
        assert_eq!(ActionMethod::Create.http_verb(), "POST");
        assert_eq!(ActionMethod::Read.http_verb(), "GET");
        assert_eq!(ActionMethod::Update.http_verb(), "PUT");
        assert_eq!(ActionMethod::Delete.http_verb(), "DELETE");
        assert!(ActionMethod::Create.sends_body());
        assert!(!ActionMethod::Delete.sends_body());
    }

    #[test]
    fn method_deserializes_from_string() {
        let m: ActionMethod = serde_json::from_str(r#""put""#).unwrap();
        assert_eq!(m, ActionMethod::Update);
        assert!(serde_json::from_str::<ActionMethod>(r#""fly""#).is_err());
    }

    #[test]
    fn from_value_full_shape() {
        let v = json!({
            "endpoint": "/cards",
            "method": "POST",
            "url_params": "?idList=L1",
            "parameters": { "name": "Fix bug #123" }
        });
        let action = ActionDescriptor::from_value(&v).unwrap();
        assert_eq!(action.endpoint(), "/cards");
        assert_eq!(action.method(), ActionMethod::Create);
        assert_eq!(action.url_params(), Some("idList=L1"));
        assert_eq!(action.parameters()["name"], "Fix bug #123");
    }

    #[test]
    fn from_value_parameters_default_to_empty() {
        let v = json!({ "endpoint": "/cards/abc", "method": "DELETE" });
        let action = ActionDescriptor::from_value(&v).unwrap();
        assert!(action.parameters().is_empty());
        assert!(action.url_params().is_none());

        let v = json!({ "endpoint": "/cards/abc", "method": "DELETE", "parameters": null });
        assert!(ActionDescriptor::from_value(&v).unwrap().parameters().is_empty());
    }

    #[test]
    fn from_value_rejects_missing_or_empty_required_fields() {
        for v in [
            json!({ "method": "POST" }),
            json!({ "endpoint": "/cards" }),
            json!({ "endpoint": "", "method": "POST" }),
            json!({ "endpoint": "/cards", "method": "  " }),
            json!({ "endpoint": 7, "method": "POST" }),
            json!({ "endpoint": "/cards", "method": "PATCH" }),
            json!("POST /cards"),
        ] {
            assert!(ActionDescriptor::from_value(&v).is_err(), "accepted {v}");
        }
    }

    #[test]
    fn from_value_rejects_wrong_optional_types() {
        let v = json!({ "endpoint": "/cards", "method": "POST", "parameters": ["a"] });
        assert!(ActionDescriptor::from_value(&v).is_err());
        let v = json!({ "endpoint": "/cards", "method": "POST", "url_params": { "a": 1 } });
        assert!(ActionDescriptor::from_value(&v).is_err());
    }

    #[test]
    fn endpoint_must_stay_on_the_board_api() {
        for bad in [
            "cards",
            "https://evil.example/cards",
            "/cards?idList=1",
            "/cards#x",
            "/../admin",
            "/cards /x",
        ] {
            assert!(
                ActionDescriptor::new(bad, ActionMethod::Create).is_err(),
                "accepted {bad}"
            );
        }
        assert!(ActionDescriptor::new("/cards/abc/actions/comments", ActionMethod::Create).is_ok());
    }

    #[test]
    fn empty_url_params_clear_the_field() {
        let action = ActionDescriptor::new("/cards", ActionMethod::Create)
            .unwrap()
            .with_url_params("?");
        assert!(action.url_params().is_none());
    }

    #[test]
    fn parameters_with_leaves_descriptor_untouched() {
        let mut params = Map::new();
        params.insert("name".into(), json!("X"));
        params.insert("key".into(), json!("model-supplied"));
        let action = ActionDescriptor::new("/cards", ActionMethod::Create)
            .unwrap()
            .with_parameters(params);

        let merged = action.parameters_with(&[("key", "k"), ("token", "t")]);
        assert_eq!(merged["name"], "X");
        assert_eq!(merged["key"], "k");
        assert_eq!(merged["token"], "t");

        assert_eq!(action.parameters().len(), 2);
        assert_eq!(action.parameters()["key"], "model-supplied");
        assert!(action.parameters().get("token").is_none());
    }
}
