pub mod catalog;
pub mod checks;

pub use catalog::{CatalogOverrides, CheckTier, RequirementCatalog, RequirementCheck};

use serde::{Deserialize, Serialize};

use super::context::{EvaluationContext, EvaluationSources};
use super::domain::ProjectProgram;

/// Outcome tier for a single requirement check. Checks that do not apply
/// return `None` instead and are omitted from the report entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementStatus {
    Pass,
    Fail,
    Warning,
}

/// What a requirement check hands back to the evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub status: RequirementStatus,
    pub message: Option<String>,
    /// Where the caller can send a user to fix the problem.
    pub remediation: Option<String>,
    pub weight: u32,
    pub total_weight: u32,
}

impl CheckOutcome {
    pub fn pass() -> Self {
        Self {
            status: RequirementStatus::Pass,
            message: None,
            remediation: None,
            weight: 1,
            total_weight: 1,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            status: RequirementStatus::Fail,
            message: Some(message.into()),
            remediation: None,
            weight: 0,
            total_weight: 1,
        }
    }

    pub fn fail_with(message: impl Into<String>, remediation: impl Into<String>) -> Self {
        Self {
            remediation: Some(remediation.into()),
            ..Self::fail(message)
        }
    }

    /// Warnings never count toward completion, matching their advisory role.
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            status: RequirementStatus::Warning,
            message: Some(message.into()),
            remediation: None,
            weight: 0,
            total_weight: 0,
        }
    }

    pub fn weighted(mut self, weight: u32, total_weight: u32) -> Self {
        self.weight = weight;
        self.total_weight = total_weight;
        self
    }
}

/// One evaluated requirement, keyed by the check's stable name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequirementResult {
    pub name: &'static str,
    pub status: RequirementStatus,
    pub message: Option<String>,
    pub remediation: Option<String>,
    pub weight: u32,
    pub total_weight: u32,
}

/// Ordered result set for one evaluation run. Owned by the caller; the
/// engine never persists these.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EligibilityReport {
    pub requirements: Vec<RequirementResult>,
    /// True iff no requirement failed. Warnings do not block.
    pub eligible: bool,
    pub fail_fast: bool,
    pub completed_requirements: u32,
    pub total_requirements: u32,
    pub completion_percent: f64,
}

impl EligibilityReport {
    pub fn get(&self, name: &str) -> Option<&RequirementResult> {
        self.requirements.iter().find(|result| result.name == name)
    }

    pub fn failing_messages(&self) -> Vec<String> {
        self.requirements
            .iter()
            .filter(|result| result.status == RequirementStatus::Fail)
            .filter_map(|result| result.message.clone())
            .collect()
    }
}

/// Runs the requirement catalog against a pairing and aggregates results.
pub struct EligibilityEvaluator {
    sources: EvaluationSources,
    catalog: RequirementCatalog,
}

impl EligibilityEvaluator {
    pub fn new(sources: EvaluationSources, catalog: RequirementCatalog) -> Self {
        Self { sources, catalog }
    }

    pub fn evaluate(&self, entity: &ProjectProgram, fail_fast: bool) -> EligibilityReport {
        self.evaluate_with(entity, fail_fast, false)
    }

    /// `skip_certification_check` re-runs the pipeline against an already
    /// certified pairing without tripping the short-circuit check.
    pub fn evaluate_with(
        &self,
        entity: &ProjectProgram,
        fail_fast: bool,
        skip_certification_check: bool,
    ) -> EligibilityReport {
        let context = EvaluationContext::snapshot(&self.sources, entity, skip_certification_check);
        let checks = self.catalog.build(&entity.program);

        let mut requirements = Vec::new();
        for check in &checks {
            // Advisory checks cannot fail, so a fail-fast run skips them
            // rather than spend time on warnings it will discard.
            if fail_fast && check.tier == CheckTier::Advisory {
                continue;
            }

            let Some(outcome) = (check.run)(entity, &context) else {
                continue;
            };

            let failed = outcome.status == RequirementStatus::Fail;
            requirements.push(RequirementResult {
                name: check.name,
                status: outcome.status,
                message: outcome.message,
                remediation: outcome.remediation,
                weight: outcome.weight,
                total_weight: outcome.total_weight,
            });

            if fail_fast && failed {
                break;
            }
        }

        let eligible = requirements
            .iter()
            .all(|result| result.status != RequirementStatus::Fail);

        let counted: Vec<&RequirementResult> = requirements
            .iter()
            .filter(|result| result.status != RequirementStatus::Warning)
            .collect();
        let completed_requirements: u32 = counted.iter().map(|result| result.weight).sum();
        let total_requirements: u32 = counted.iter().map(|result| result.total_weight).sum();
        let completion_percent = if total_requirements == 0 {
            100.0
        } else {
            100.0 * f64::from(completed_requirements) / f64::from(total_requirements)
        };

        EligibilityReport {
            requirements,
            eligible,
            fail_fast,
            completed_requirements,
            total_requirements,
            completion_percent,
        }
    }

    /// Checklist progress as a percentage of required questions answered,
    /// clamped to [0, 100]. A program with no required questions is 100%
    /// complete by definition.
    pub fn percent_complete(&self, entity: &ProjectProgram) -> f64 {
        let context = EvaluationContext::snapshot(&self.sources, entity, true);
        let total = context.total_required();
        if total == 0 {
            return 100.0;
        }
        let answered = context.answered_count;
        (100.0 * answered as f64 / total as f64).clamp(0.0, 100.0)
    }
}
