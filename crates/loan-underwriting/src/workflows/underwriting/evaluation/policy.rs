use serde::{Deserialize, Serialize};

use super::super::domain::ApplicationStatus;
use super::{RuleCheck, UnderwritingRule};

/// Business decision reached once the statements could be evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnderwritingDecision {
    Accepted,
    Rejected { failed: Vec<UnderwritingRule> },
}

impl UnderwritingDecision {
    pub fn status(&self) -> ApplicationStatus {
        match self {
            UnderwritingDecision::Accepted => ApplicationStatus::Accepted,
            UnderwritingDecision::Rejected { .. } => ApplicationStatus::Rejected,
        }
    }

    pub fn summary(&self) -> String {
        match self {
            UnderwritingDecision::Accepted => "loan accepted".to_string(),
            UnderwritingDecision::Rejected { failed } => {
                let labels: Vec<&str> = failed.iter().map(|rule| rule.label()).collect();
                format!("loan rejected: failed {}", labels.join(", "))
            }
        }
    }
}

pub(crate) fn decide(checks: &[RuleCheck]) -> UnderwritingDecision {
    let failed: Vec<UnderwritingRule> = checks
        .iter()
        .filter(|check| !check.passed)
        .map(|check| check.rule)
        .collect();

    if failed.is_empty() {
        UnderwritingDecision::Accepted
    } else {
        UnderwritingDecision::Rejected { failed }
    }
}
