// Conflict classification of backend failures raised while appending events.
//
// Purpose
// - Decide whether a failed write lost a race for an (aggregate, sequence) slot or failed
//   for any other reason, without coupling the event store to one backend's vocabulary.
//
// Rules
// - Pure: the classifier only looks at the failure.
// - Fail open: anything not recognised is Unrelated and reaches the caller verbatim.

use crate::shared::infrastructure::entry_store::{
    BackendFailure, DOMAIN_EVENT_ENTRY_KEY, UNIQUE_VIOLATION,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Conflict,
    Unrelated,
}

pub trait ConflictClassifier: Send + Sync {
    fn classify(&self, failure: &BackendFailure) -> Classification;
}

impl<F> ConflictClassifier for F
where
    F: Fn(&BackendFailure) -> Classification + Send + Sync,
{
    fn classify(&self, failure: &BackendFailure) -> Classification {
        self(failure)
    }
}

/// Recognises unique-key violations by SQLSTATE, optionally narrowed to one constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueKeyViolationClassifier {
    sql_states: Vec<String>,
    constraint: Option<String>,
}

impl Default for UniqueKeyViolationClassifier {
    fn default() -> Self {
        Self {
            sql_states: vec![UNIQUE_VIOLATION.to_string()],
            constraint: Some(DOMAIN_EVENT_ENTRY_KEY.to_string()),
        }
    }
}

impl UniqueKeyViolationClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat a unique violation of any constraint as a conflict.
    pub fn any_constraint(mut self) -> Self {
        self.constraint = None;
        self
    }

    pub fn for_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraint = Some(constraint.into());
        self
    }

    /// Adds a vendor-specific code, e.g. "23000" for MySQL duplicate entries.
    pub fn with_sql_state(mut self, sql_state: impl Into<String>) -> Self {
        self.sql_states.push(sql_state.into());
        self
    }
}

impl ConflictClassifier for UniqueKeyViolationClassifier {
    fn classify(&self, failure: &BackendFailure) -> Classification {
        let state_matches = failure
            .sql_state()
            .is_some_and(|state| self.sql_states.iter().any(|s| s == state));
        let constraint_matches = match (&self.constraint, failure.constraint()) {
            (None, _) => true,
            (Some(expected), Some(actual)) => expected == actual,
            (Some(_), None) => false,
        };
        if state_matches && constraint_matches {
            Classification::Conflict
        } else {
            Classification::Unrelated
        }
    }
}
