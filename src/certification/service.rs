//! Application-facing facade wiring the repository, the evaluation pipeline,
//! both machine variants and the decertification workflow together.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;

use super::context::EvaluationSources;
use super::decertify::{DecertificationWorkflow, DecertifyError, DecertifyReport};
use super::domain::{Actor, CertificationState, ProjectProgram, ProjectProgramId, StateChoice};
use super::qa::GatingQACoordinator;
use super::requirements::{CatalogOverrides, EligibilityEvaluator, EligibilityReport, RequirementCatalog};
use super::state_machine::{CertificationStateMachine, MachineVariant, TransitionError};
use super::stores::{
    AnalyticsStore, DocumentStore, PaymentStore, ProjectProgramRepository, RepositoryError,
    SideEffect, SideEffectDispatcher,
};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Decertify(#[from] DecertifyError),
}

pub struct CertificationService<R: ProjectProgramRepository> {
    repository: Arc<R>,
    evaluator: Arc<EligibilityEvaluator>,
    standard: CertificationStateMachine,
    verifier: CertificationStateMachine,
    decertifier: DecertificationWorkflow,
    sources: EvaluationSources,
    dispatcher: Arc<dyn SideEffectDispatcher>,
}

impl<R: ProjectProgramRepository> CertificationService<R> {
    pub fn new(
        repository: Arc<R>,
        sources: EvaluationSources,
        payments: Arc<dyn PaymentStore>,
        analytics: Arc<dyn AnalyticsStore>,
        documents: Arc<dyn DocumentStore>,
        dispatcher: Arc<dyn SideEffectDispatcher>,
        overrides: CatalogOverrides,
    ) -> Self {
        let evaluator = Arc::new(EligibilityEvaluator::new(
            sources.clone(),
            RequirementCatalog::new(overrides),
        ));
        let qa = Arc::new(GatingQACoordinator::new(sources.qa.clone()));
        let standard = CertificationStateMachine::new(
            MachineVariant::Standard,
            evaluator.clone(),
            qa.clone(),
            sources.sampling.clone(),
        );
        let verifier = CertificationStateMachine::new(
            MachineVariant::VerifierMediated,
            evaluator.clone(),
            qa.clone(),
            sources.sampling.clone(),
        );
        let decertifier = DecertificationWorkflow::new(
            sources.checklist.clone(),
            sources.qa.clone(),
            payments,
            analytics,
            documents,
        );
        Self {
            repository,
            evaluator,
            standard,
            verifier,
            decertifier,
            sources,
            dispatcher,
        }
    }

    fn machine_for(&self, entity: &ProjectProgram) -> &CertificationStateMachine {
        if entity.program.config.verifier_mediated {
            &self.verifier
        } else {
            &self.standard
        }
    }

    fn today() -> NaiveDate {
        chrono::Local::now().date_naive()
    }

    pub fn register(&self, entity: ProjectProgram) -> Result<(), ServiceError> {
        info!(%entity.id, program = %entity.program.slug, "registering pairing");
        self.repository.insert(entity)?;
        Ok(())
    }

    pub fn get(&self, id: &ProjectProgramId) -> Result<ProjectProgram, ServiceError> {
        Ok(self
            .repository
            .fetch(id)?
            .ok_or(RepositoryError::NotFound)?)
    }

    pub fn evaluate(
        &self,
        id: &ProjectProgramId,
        fail_fast: bool,
    ) -> Result<EligibilityReport, ServiceError> {
        let entity = self.get(id)?;
        Ok(self.evaluator.evaluate(&entity, fail_fast))
    }

    pub fn is_eligible_for_certification(
        &self,
        id: &ProjectProgramId,
    ) -> Result<bool, ServiceError> {
        Ok(self.evaluate(id, true)?.eligible)
    }

    /// Full report against an already-certified pairing, for rendering what
    /// the certification was based on.
    pub fn report_eligibility_for_certification(
        &self,
        id: &ProjectProgramId,
    ) -> Result<EligibilityReport, ServiceError> {
        let entity = self.get(id)?;
        Ok(self.evaluator.evaluate_with(&entity, false, true))
    }

    /// Runs a transition against the persisted entity. The side effects are
    /// dispatched only after the commit succeeds, so a stale write never
    /// leaks notifications for a state change that did not stick.
    pub fn attempt_transition(
        &self,
        id: &ProjectProgramId,
        target: CertificationState,
        actor: &Actor,
    ) -> Result<Vec<SideEffect>, ServiceError> {
        let mut entity = self.get(id)?;
        let expected = entity.version;
        let effects =
            self.machine_for(&entity)
                .attempt_transition(&mut entity, target, actor, Self::today())?;
        self.repository.commit(entity, expected)?;
        for effect in &effects {
            self.dispatcher.dispatch(effect.clone());
        }
        Ok(effects)
    }

    /// Advances every member of the entity's sampling group together, or a
    /// singleton batch when the pairing is not sampled. All-or-nothing: the
    /// machine pre-checks every member, and the repository commits the batch
    /// atomically.
    pub fn attempt_transition_group(
        &self,
        id: &ProjectProgramId,
        target: CertificationState,
        actor: &Actor,
    ) -> Result<Vec<SideEffect>, ServiceError> {
        let seed = self.get(id)?;
        let member_ids = match self.sources.sampling.membership(id) {
            Some(membership) => self.sources.sampling.group_members(&membership.group),
            None => vec![id.clone()],
        };

        let mut entities = Vec::with_capacity(member_ids.len());
        for member_id in &member_ids {
            entities.push(self.get(member_id)?);
        }
        let expected: Vec<u64> = entities.iter().map(|entity| entity.version).collect();

        let machine = self.machine_for(&seed);
        let effects =
            machine.attempt_transition_all(&mut entities, target, actor, Self::today())?;

        let batch: Vec<(ProjectProgram, u64)> =
            entities.into_iter().zip(expected).collect();
        self.repository.commit_many(batch)?;

        for effect in &effects {
            self.dispatcher.dispatch(effect.clone());
        }
        Ok(effects)
    }

    /// Dry-run of a transition's preconditions.
    pub fn check_transition(
        &self,
        id: &ProjectProgramId,
        target: CertificationState,
        actor: &Actor,
    ) -> Result<(), ServiceError> {
        let entity = self.get(id)?;
        self.machine_for(&entity)
            .check_transition(&entity, target, actor)?;
        Ok(())
    }

    pub fn decertify(
        &self,
        id: &ProjectProgramId,
        actor: &Actor,
        check_only: bool,
        force: bool,
    ) -> Result<DecertifyReport, ServiceError> {
        let mut entity = self.get(id)?;
        let expected = entity.version;
        let report = self
            .decertifier
            .decertify(&mut entity, actor, check_only, force)?;
        if report.performed {
            self.repository.commit(entity, expected)?;
        }
        Ok(report)
    }

    pub fn can_be_decertified(
        &self,
        id: &ProjectProgramId,
        actor: &Actor,
        force: bool,
    ) -> Result<bool, ServiceError> {
        let entity = self.get(id)?;
        Ok(self.decertifier.can_be_decertified(&entity, actor, force))
    }

    /// Recomputes and stores the checklist completion percentage.
    pub fn refresh_progress(&self, id: &ProjectProgramId) -> Result<f64, ServiceError> {
        let mut entity = self.get(id)?;
        let expected = entity.version;
        let pct = self.evaluator.percent_complete(&entity);
        if (pct - entity.pct_complete).abs() > f64::EPSILON {
            entity.pct_complete = pct;
            entity.version += 1;
            self.repository.commit(entity, expected)?;
        }
        Ok(pct)
    }

    pub fn state_choices(&self, verifier_mediated: bool) -> Vec<StateChoice> {
        if verifier_mediated {
            self.verifier.state_choices()
        } else {
            self.standard.state_choices()
        }
    }
}
