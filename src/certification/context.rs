use std::sync::Arc;

use super::domain::{CompanyRef, CompanyType, ProjectProgram};
use super::stores::{
    AnnotationStore, ChecklistStore, QaPolicy, QaPolicyStore, RelationshipStore, SamplingMembership,
    SamplingStore, SimulationModel, SimulationStore, UnansweredQuestion,
};

/// Read-only handles to every collaborator the evaluation pipeline reads
/// from. Built once at composition time and shared.
#[derive(Clone)]
pub struct EvaluationSources {
    pub checklist: Arc<dyn ChecklistStore>,
    pub relationships: Arc<dyn RelationshipStore>,
    pub annotations: Arc<dyn AnnotationStore>,
    pub simulation: Arc<dyn SimulationStore>,
    pub sampling: Arc<dyn SamplingStore>,
    pub qa: Arc<dyn QaPolicyStore>,
}

/// Shared snapshot handed to every requirement check within one evaluation.
///
/// Checks must not mutate it, and it is never reused across evaluations:
/// answers, relationships and QA reviews can all change between calls.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    pub unanswered: Vec<UnansweredQuestion>,
    pub answered_count: usize,
    pub accepted_companies: Vec<CompanyRef>,
    pub unaccepted_companies: Vec<CompanyRef>,
    pub annotation_names: Vec<String>,
    pub model: Option<SimulationModel>,
    pub sampling: Option<SamplingMembership>,
    pub electric_utilities: Vec<CompanyRef>,
    pub gas_utilities: Vec<CompanyRef>,
    pub qa_policies: Vec<QaPolicy>,
    /// Set when re-running the pipeline against an already-certified pairing
    /// (e.g. rendering "what's missing" after the fact); disables the
    /// already-certified short circuit.
    pub skip_certification_check: bool,
}

impl EvaluationContext {
    pub fn snapshot(
        sources: &EvaluationSources,
        entity: &ProjectProgram,
        skip_certification_check: bool,
    ) -> Self {
        let id = &entity.id;
        Self {
            unanswered: sources.checklist.unanswered(id),
            answered_count: sources.checklist.answered_count(id),
            accepted_companies: sources.relationships.accepted_companies(id),
            unaccepted_companies: sources.relationships.unaccepted_companies(id),
            annotation_names: sources.annotations.annotation_names(id),
            model: sources.simulation.model(id),
            sampling: sources.sampling.membership(id),
            electric_utilities: sources.relationships.electric_utilities(id),
            gas_utilities: sources.relationships.gas_utilities(id),
            qa_policies: sources.qa.policies(id),
            skip_certification_check,
        }
    }

    pub fn accepted_of_type(&self, company_type: CompanyType) -> Vec<&CompanyRef> {
        self.accepted_companies
            .iter()
            .filter(|company| company.company_type == company_type)
            .collect()
    }

    pub fn unaccepted_of_type(&self, company_type: CompanyType) -> Vec<&CompanyRef> {
        self.unaccepted_companies
            .iter()
            .filter(|company| company.company_type == company_type)
            .collect()
    }

    pub fn required_unanswered(&self) -> usize {
        self.unanswered
            .iter()
            .filter(|question| !question.is_optional)
            .count()
    }

    pub fn optional_unanswered(&self) -> usize {
        self.unanswered
            .iter()
            .filter(|question| question.is_optional)
            .count()
    }

    /// Total required questions = answered + required-unanswered. The
    /// checklist store only reports remaining work, so the total is derived.
    pub fn total_required(&self) -> usize {
        self.answered_count + self.required_unanswered()
    }
}
