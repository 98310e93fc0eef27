use serde::Serialize;

use crate::error::Error;

/// The validity flag and message of the most recent pipeline run.
///
/// The flag and the message only ever change together: a valid state never
/// carries a message and an invalid state always carries a non-empty one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationState {
    is_valid: bool,
    error_message: Option<String>,
}

impl Default for ValidationState {
    fn default() -> Self {
        ValidationState {
            is_valid: true,
            error_message: None,
        }
    }
}

impl ValidationState {
    /// Returns `true` if no step failed.
    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    /// Returns the message of the failed step.
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Marks the state as valid again.
    pub fn reset(&mut self) {
        self.is_valid = true;
        self.error_message = None;
    }

    /// Marks the state as invalid with the given message.
    pub fn set_error(&mut self, message: impl Into<String>) {
        let mut message = message.into();
        if message.is_empty() {
            message.push_str("Unknown error");
        }
        self.is_valid = false;
        self.error_message = Some(message);
    }

    pub(crate) fn record(&mut self, err: Option<&Error>) {
        match err {
            None => self.reset(),
            Some(err) => self.set_error(err.to_string()),
        }
    }
}

/// The result of rendering a loaded template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyOutcome {
    /// `true` if the text was rendered and formatted.
    pub succeeded: bool,
    /// The message of the failed step.
    pub error_message: Option<String>,
    /// The formatted output, empty on failure.
    pub rendered_text: String,
}

impl ApplyOutcome {
    pub(crate) fn from_result(result: Result<String, Error>) -> ApplyOutcome {
        match result {
            Ok(rendered_text) => ApplyOutcome {
                succeeded: true,
                error_message: None,
                rendered_text,
            },
            Err(err) => ApplyOutcome {
                succeeded: false,
                error_message: Some(err.to_string()),
                rendered_text: String::new(),
            },
        }
    }

    /// Converts the outcome back into a result.
    pub fn into_result(self) -> Result<String, String> {
        match self.error_message {
            Some(message) if !self.succeeded => Err(message),
            _ => Ok(self.rendered_text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        let mut state = ValidationState::default();
        assert!(state.is_valid());
        assert_eq!(state.error_message(), None);

        state.set_error("boom");
        assert!(!state.is_valid());
        assert_eq!(state.error_message(), Some("boom"));

        state.set_error("");
        assert_eq!(state.error_message(), Some("Unknown error"));

        state.reset();
        assert_eq!(state, ValidationState::default());
    }
}
