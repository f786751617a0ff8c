use std::sync::Arc;

use tracing::debug;

use super::domain::ProjectProgramId;
use super::stores::{QaPolicy, QaPolicyStore, QaReviewState};

/// Returns the first QA policy currently blocking certification, if any.
///
/// A policy blocks when it gates certification and either its review is not
/// complete, or no review exists at all while the policy mandates full
/// coverage.
pub(crate) fn first_blocking_policy(policies: &[QaPolicy]) -> Option<&QaPolicy> {
    policies.iter().find(|policy| {
        if !policy.gates_certification {
            return false;
        }
        match policy.review {
            Some(review) => review != QaReviewState::Complete,
            None => policy.coverage_pct >= 1.0,
        }
    })
}

/// Read-only gate consulted by both the evaluator and the state machine to
/// decide whether third-party QA sign-off is blocking certification.
/// Idempotent and side-effect free by contract.
pub struct GatingQACoordinator {
    store: Arc<dyn QaPolicyStore>,
}

impl GatingQACoordinator {
    pub fn new(store: Arc<dyn QaPolicyStore>) -> Self {
        Self { store }
    }

    pub fn is_blocking(&self, id: &ProjectProgramId) -> bool {
        let policies = self.store.policies(id);
        match first_blocking_policy(&policies) {
            Some(policy) => {
                debug!(%id, qa_company = %policy.qa_company, "gating QA requirement not met");
                true
            }
            None => false,
        }
    }
}
