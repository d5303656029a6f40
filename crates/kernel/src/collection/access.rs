//! Display access evaluation.

use std::collections::HashSet;

use super::types::{AccessPolicy, QueryDefinition};

/// Decides whether the caller may read a display.
pub trait AccessEvaluator: Send + Sync {
    fn is_allowed(&self, definition: &QueryDefinition, display: &str) -> bool;
}

/// Evaluates display policies against a fixed set of granted permissions.
#[derive(Debug, Clone, Default)]
pub struct PermissionAccessEvaluator {
    granted: HashSet<String>,
}

impl PermissionAccessEvaluator {
    pub fn new<I, S>(granted: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            granted: granted.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.granted.contains(permission)
    }
}

impl AccessEvaluator for PermissionAccessEvaluator {
    fn is_allowed(&self, definition: &QueryDefinition, display: &str) -> bool {
        if definition.display != display {
            return false;
        }

        match &definition.access {
            AccessPolicy::Public => true,
            AccessPolicy::Permission { permission } => self.has_permission(permission),
        }
    }
}
