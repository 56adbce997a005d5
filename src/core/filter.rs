use serde_json::Value;

pub const DEFAULT_EVENT_TYPE: &str = "push";
pub const DEFAULT_TARGET_REF: &str = "refs/heads/master";

/// Outcome of running a verified event through the [`EventFilter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Trigger,
    /// Normal traffic that should not build (other branches, other events).
    Ignore(&'static str),
    /// Malformed payload from the caller.
    Reject(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefError {
    Missing,
    NotAString,
}

/// Pull the `ref` field out of a decoded payload, checking only its type.
pub fn extract_ref(decoded: &Value) -> Result<&str, RefError> {
    match decoded.get("ref") {
        None | Some(Value::Null) => Err(RefError::Missing),
        Some(Value::String(r)) => Ok(r.as_str()),
        Some(_) => Err(RefError::NotAString),
    }
}

#[derive(Debug, Clone)]
pub struct EventFilter {
    event_type: String,
    target_ref: String,
}

impl Default for EventFilter {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_TYPE, DEFAULT_TARGET_REF)
    }
}

impl EventFilter {
    pub fn new(event_type: impl Into<String>, target_ref: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            target_ref: target_ref.into(),
        }
    }

    pub fn target_ref(&self) -> &str {
        &self.target_ref
    }

    /// Decide whether an event should start a build.
    ///
    /// An absent event type does not filter; the `ref` check still applies.
    pub fn should_trigger(&self, decoded: &Value, event_type: Option<&str>) -> Decision {
        if let Some(kind) = event_type
            && kind != self.event_type
        {
            return Decision::Ignore("non-push event");
        }

        let git_ref = match extract_ref(decoded) {
            Ok(r) => r,
            Err(_) => return Decision::Reject("no ref present"),
        };

        if git_ref != self.target_ref {
            return Decision::Ignore("wrong ref");
        }

        Decision::Trigger
    }
}
