//! Validate-only writes: validate the input, answer 204, never persist.
//!
//! A request enters Checking when its action is eligible, its method carries a
//! body, and the reserved flag is affirmative (query parameter or body field).
//! Passing validation moves it to Blocked; failing moves it to Rejected. Any
//! persistence attempt while Blocked is a programming error.

use crate::error::AppError;
use crate::routing::HttpMethod;
use crate::store::Record;
use serde_json::Value;
use std::collections::HashMap;

pub const DEFAULT_PARAM: &str = "validate_only";

/// Immutable per-request flag threaded into validation and dispatch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ValidateOnlyContext {
    pub validate_only: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Checking,
    Blocked,
    Rejected,
}

/// Request-scoped state; dropped with the request.
#[derive(Debug)]
pub struct ValidateOnlyState {
    enabled: bool,
    blocked: bool,
    rejected: bool,
}

impl ValidateOnlyState {
    pub fn new(ctx: ValidateOnlyContext) -> Self {
        ValidateOnlyState {
            enabled: ctx.validate_only,
            blocked: false,
            rejected: false,
        }
    }

    pub fn phase(&self) -> Phase {
        match (self.enabled, self.blocked, self.rejected) {
            (false, _, _) => Phase::Idle,
            (true, true, _) => Phase::Blocked,
            (true, false, true) => Phase::Rejected,
            (true, false, false) => Phase::Checking,
        }
    }

    /// Called right before any create/update/delete reaches the store.
    pub fn ensure_writable(&self, operation: &'static str) -> Result<(), AppError> {
        if self.blocked {
            tracing::error!(operation, "persistence attempted on a validate-only request");
            return Err(AppError::BlockedSideEffect(operation));
        }
        Ok(())
    }
}

/// Result of running validation through the interceptor.
#[derive(Debug)]
pub enum Outcome<T> {
    /// Not validate-only: continue to persistence with the validated input.
    Proceed(T),
    /// Validate-only and valid: respond 204 without persisting.
    NoContent,
}

#[derive(Clone, Debug)]
pub struct ValidateOnlyInterceptor {
    param: String,
    affirmative: Vec<String>,
}

impl Default for ValidateOnlyInterceptor {
    fn default() -> Self {
        ValidateOnlyInterceptor::new(DEFAULT_PARAM, &["true"])
    }
}

impl ValidateOnlyInterceptor {
    pub fn new(param: impl Into<String>, affirmative: &[&str]) -> Self {
        ValidateOnlyInterceptor {
            param: param.into(),
            affirmative: affirmative.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn is_affirmative(&self, value: &Value) -> bool {
        match value {
            Value::Bool(b) => *b,
            Value::String(s) => self.affirmative.iter().any(|a| a == s),
            _ => false,
        }
    }

    /// Decide whether the request is validate-only. The body flag is removed in every case.
    pub fn detect(
        &self,
        eligible: bool,
        method: HttpMethod,
        query: &HashMap<String, String>,
        body: &mut Record,
    ) -> ValidateOnlyContext {
        let body_flag = body
            .remove(&self.param)
            .map(|v| self.is_affirmative(&v))
            .unwrap_or(false);
        let query_flag = query
            .get(&self.param)
            .map(|v| self.affirmative.iter().any(|a| a == v))
            .unwrap_or(false);
        ValidateOnlyContext {
            validate_only: eligible && method.has_body() && (query_flag || body_flag),
        }
    }

    /// Feed the validation result through the state machine.
    pub fn intercept<T>(
        &self,
        state: &mut ValidateOnlyState,
        validation: Result<T, AppError>,
    ) -> Result<Outcome<T>, AppError> {
        match validation {
            Err(e) => {
                state.rejected = true;
                Err(e)
            }
            Ok(value) => {
                if state.enabled {
                    state.blocked = true;
                    tracing::debug!("validate-only request passed validation");
                    Ok(Outcome::NoContent)
                } else {
                    Ok(Outcome::Proceed(value))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FieldErrors;
    use serde_json::json;

    fn query(flag: &str) -> HashMap<String, String> {
        [("validate_only".to_string(), flag.to_string())].into_iter().collect()
    }

    #[test]
    fn detect_requires_eligible_body_method_and_flag() {
        let i = ValidateOnlyInterceptor::default();
        let mut body = Record::new();
        assert!(i.detect(true, HttpMethod::Post, &query("true"), &mut body).validate_only);
        assert!(!i.detect(false, HttpMethod::Post, &query("true"), &mut body).validate_only);
        assert!(!i.detect(true, HttpMethod::Get, &query("true"), &mut body).validate_only);
        assert!(!i.detect(true, HttpMethod::Post, &query("1"), &mut body).validate_only);
        assert!(!i.detect(true, HttpMethod::Post, &HashMap::new(), &mut body).validate_only);
    }

    #[test]
    fn body_flag_is_honoured_and_stripped() {
        let i = ValidateOnlyInterceptor::default();
        let mut body = json!({"title": "x", "validate_only": true}).as_object().cloned().unwrap();
        assert!(i.detect(true, HttpMethod::Patch, &HashMap::new(), &mut body).validate_only);
        assert!(!body.contains_key("validate_only"));

        let mut body = json!({"validate_only": true}).as_object().cloned().unwrap();
        assert!(!i.detect(false, HttpMethod::Patch, &HashMap::new(), &mut body).validate_only);
        assert!(body.is_empty());
    }

    #[test]
    fn state_machine() {
        let i = ValidateOnlyInterceptor::default();

        let mut idle = ValidateOnlyState::new(ValidateOnlyContext::default());
        assert_eq!(idle.phase(), Phase::Idle);
        assert!(matches!(i.intercept(&mut idle, Ok(1)), Ok(Outcome::Proceed(1))));
        assert!(idle.ensure_writable("create").is_ok());

        let mut checking = ValidateOnlyState::new(ValidateOnlyContext { validate_only: true });
        assert_eq!(checking.phase(), Phase::Checking);
        assert!(matches!(i.intercept(&mut checking, Ok(1)), Ok(Outcome::NoContent)));
        assert_eq!(checking.phase(), Phase::Blocked);
        assert!(matches!(
            checking.ensure_writable("create"),
            Err(AppError::BlockedSideEffect("create"))
        ));

        let mut rejected = ValidateOnlyState::new(ValidateOnlyContext { validate_only: true });
        let err: Result<i32, AppError> = Err(AppError::Validation(FieldErrors::single("title", "bad")));
        assert!(matches!(i.intercept(&mut rejected, err), Err(AppError::Validation(_))));
        assert_eq!(rejected.phase(), Phase::Rejected);
        assert!(rejected.ensure_writable("update").is_ok());
    }
}
