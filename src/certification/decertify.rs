//! Revokes an issued certification and unwinds everything that was derived
//! from it, reporting each unwind step in plain language.

use std::sync::Arc;

use tracing::{info, warn};

use super::domain::{
    Actor, Capability, CertificationState, CompanyType, InvariantViolation, ProjectProgram,
};
use super::stores::{AnalyticsStore, ChecklistStore, DocumentStore, PaymentStore, QaPolicyStore};

#[derive(Debug, thiserror::Error)]
pub enum DecertifyError {
    #[error("pairing is not certified")]
    NotCertified,
    #[error("{0}")]
    PermissionDenied(String),
    /// Warnings stand in the way and `force` was not given.
    #[error("decertification blocked: {}", .0.join("; "))]
    Blocked(Vec<String>),
    #[error(transparent)]
    ConflictingState(#[from] InvariantViolation),
}

/// What a decertification run did (or, in check-only mode, would do).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DecertifyReport {
    /// Human-readable unwind steps, in execution order.
    pub undone: Vec<String>,
    /// Conditions that required `force` (or would, in check-only mode).
    pub warnings: Vec<String>,
    /// False for check-only runs; the entity was not touched.
    pub performed: bool,
}

pub struct DecertificationWorkflow {
    checklist: Arc<dyn ChecklistStore>,
    qa: Arc<dyn QaPolicyStore>,
    payments: Arc<dyn PaymentStore>,
    analytics: Arc<dyn AnalyticsStore>,
    documents: Arc<dyn DocumentStore>,
}

impl DecertificationWorkflow {
    pub fn new(
        checklist: Arc<dyn ChecklistStore>,
        qa: Arc<dyn QaPolicyStore>,
        payments: Arc<dyn PaymentStore>,
        analytics: Arc<dyn AnalyticsStore>,
        documents: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            checklist,
            qa,
            payments,
            analytics,
            documents,
        }
    }

    /// Convenience wrapper asking whether a full run would succeed as-is.
    pub fn can_be_decertified(
        &self,
        entity: &ProjectProgram,
        actor: &Actor,
        force: bool,
    ) -> bool {
        let mut probe = entity.clone();
        self.decertify(&mut probe, actor, true, force).is_ok()
    }

    /// Revokes the certification. `check_only` reports what would happen
    /// without mutating anything, including blocked outcomes; `force`
    /// overrides warning conditions.
    ///
    /// Mutation only happens after every precondition has passed, so an `Err`
    /// always leaves the entity exactly as it was.
    pub fn decertify(
        &self,
        entity: &mut ProjectProgram,
        actor: &Actor,
        check_only: bool,
        force: bool,
    ) -> Result<DecertifyReport, DecertifyError> {
        if !entity.is_certified()? {
            return Err(DecertifyError::NotCertified);
        }

        self.check_permission(entity, actor)?;

        let mut warnings = Vec::new();
        if self.payments.has_incentive_records(&entity.id) {
            warnings.push(format!(
                "{} has incentive payment records attached to this certification",
                entity.id,
            ));
        }
        if entity.program.config.imported {
            warnings.push(format!(
                "{} was imported from an external registry; the source of record will not learn of this change",
                entity.id,
            ));
        }

        // A blocked outcome is reported identically in check-only mode, so
        // `can_be_decertified` agrees with what a real run would do.
        if !warnings.is_empty() && !force {
            return Err(DecertifyError::Blocked(warnings));
        }

        if check_only {
            return Ok(DecertifyReport {
                undone: vec![
                    "removed certification date".to_string(),
                    "reset state to active".to_string(),
                ],
                warnings,
                performed: false,
            });
        }

        if !warnings.is_empty() {
            warn!(%entity.id, ?warnings, "decertifying despite warnings (forced)");
        }

        let mut undone = Vec::new();

        entity.certification_date = None;
        undone.push("removed certification date".to_string());

        entity.state = if entity.program.config.verifier_mediated {
            CertificationState::PendingFinalQa
        } else {
            CertificationState::Inspection
        };
        undone.push("reset state to active".to_string());

        if self.payments.release(&entity.id) {
            undone.push("released incentive payment status".to_string());
        }
        undone.extend(self.qa.rollback_reviews(&entity.id));
        if self.analytics.unfreeze(&entity.id) {
            undone.push("analytics rollup unfrozen".to_string());
        }
        let revoked = self.documents.revoke_public_certificates(&entity.id);
        if revoked > 0 {
            undone.push(format!("revoked {revoked} public certificate documents"));
        }
        let unlocked = self.checklist.unlock_answers(&entity.id);
        if unlocked > 0 {
            undone.push(format!("unlocked {unlocked} answers"));
        }

        // An empty unwind report is invalid; callers render this list.
        if undone.is_empty() {
            undone.push("Nothing needed to be done.".to_string());
        }

        entity.version += 1;

        info!(%entity.id, steps = undone.len(), "decertified pairing");

        Ok(DecertifyReport {
            undone,
            warnings,
            performed: true,
        })
    }

    /// Superusers and holders of the decertify capability may always revoke.
    /// Otherwise, pairings owned by a rater may only be revoked by the owning
    /// company or a provider organization.
    fn check_permission(
        &self,
        entity: &ProjectProgram,
        actor: &Actor,
    ) -> Result<(), DecertifyError> {
        if actor.is_superuser {
            return Ok(());
        }
        if !actor.can(Capability::DecertifyProjects) {
            return Err(DecertifyError::PermissionDenied(
                "actor lacks the decertify capability".to_string(),
            ));
        }
        let rater_owned = entity.company.company_type == CompanyType::Rater;
        let is_owner = actor.company.id == entity.company.id;
        let is_provider = actor.company.company_type == CompanyType::Provider;
        if rater_owned && !is_owner && !is_provider {
            return Err(DecertifyError::PermissionDenied(
                "Only certification organizations or the owning company may decertify this pairing"
                    .to_string(),
            ));
        }
        Ok(())
    }
}
