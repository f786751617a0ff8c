//! In-memory backend implementing every collaborator trait. Backs the demo
//! binary and the test suites; a deployment would put real storage behind the
//! same traits.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use super::domain::{CompanyRef, ProjectProgram, ProjectProgramId};
use super::stores::{
    AnalyticsStore, AnnotationStore, ChecklistStore, DocumentStore, PaymentStore,
    ProjectProgramRepository, QaPolicy, QaPolicyStore, QaReviewState, RelationshipStore,
    RepositoryError, SamplingGroupRef, SamplingMembership, SamplingStore, SideEffect,
    SideEffectDispatcher, SimulationModel, SimulationStore, UnansweredQuestion,
};

#[derive(Debug, Default, Clone)]
struct ChecklistState {
    unanswered: Vec<UnansweredQuestion>,
    answered: usize,
    confirmed_answers: usize,
}

#[derive(Debug, Default, Clone)]
struct RelationshipState {
    accepted: Vec<CompanyRef>,
    unaccepted: Vec<CompanyRef>,
    electric: Vec<CompanyRef>,
    gas: Vec<CompanyRef>,
}

#[derive(Default)]
pub struct MemoryBackend {
    pairings: Mutex<HashMap<ProjectProgramId, ProjectProgram>>,
    checklists: Mutex<HashMap<ProjectProgramId, ChecklistState>>,
    relationships: Mutex<HashMap<ProjectProgramId, RelationshipState>>,
    annotations: Mutex<HashMap<ProjectProgramId, Vec<String>>>,
    models: Mutex<HashMap<ProjectProgramId, SimulationModel>>,
    sampling: Mutex<HashMap<ProjectProgramId, SamplingMembership>>,
    qa_policies: Mutex<HashMap<ProjectProgramId, Vec<QaPolicy>>>,
    incentives: Mutex<HashSet<ProjectProgramId>>,
    frozen_rollups: Mutex<HashSet<ProjectProgramId>>,
    public_documents: Mutex<HashMap<ProjectProgramId, usize>>,
    effects: Mutex<Vec<SideEffect>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_checklist(
        &self,
        id: &ProjectProgramId,
        unanswered: Vec<UnansweredQuestion>,
        answered: usize,
    ) {
        let mut checklists = self.checklists.lock().expect("checklist mutex poisoned");
        checklists.insert(
            id.clone(),
            ChecklistState {
                unanswered,
                answered,
                confirmed_answers: 0,
            },
        );
    }

    /// Marks every answered question confirmed, as certification does.
    pub fn confirm_answers(&self, id: &ProjectProgramId) {
        let mut checklists = self.checklists.lock().expect("checklist mutex poisoned");
        if let Some(state) = checklists.get_mut(id) {
            state.confirmed_answers = state.answered;
        }
    }

    pub fn set_relationships(
        &self,
        id: &ProjectProgramId,
        accepted: Vec<CompanyRef>,
        unaccepted: Vec<CompanyRef>,
    ) {
        let mut relationships = self.relationships.lock().expect("relationship mutex poisoned");
        let state = relationships.entry(id.clone()).or_default();
        state.accepted = accepted;
        state.unaccepted = unaccepted;
    }

    pub fn set_utilities(
        &self,
        id: &ProjectProgramId,
        electric: Vec<CompanyRef>,
        gas: Vec<CompanyRef>,
    ) {
        let mut relationships = self.relationships.lock().expect("relationship mutex poisoned");
        let state = relationships.entry(id.clone()).or_default();
        state.electric = electric;
        state.gas = gas;
    }

    pub fn set_annotations(&self, id: &ProjectProgramId, names: Vec<String>) {
        self.annotations.lock().expect("annotation mutex poisoned").insert(id.clone(), names);
    }

    pub fn set_model(&self, id: &ProjectProgramId, model: SimulationModel) {
        self.models.lock().expect("model mutex poisoned").insert(id.clone(), model);
    }

    pub fn set_membership(&self, id: &ProjectProgramId, membership: SamplingMembership) {
        self.sampling.lock().expect("sampling mutex poisoned").insert(id.clone(), membership);
    }

    pub fn set_policies(&self, id: &ProjectProgramId, policies: Vec<QaPolicy>) {
        self.qa_policies.lock().expect("qa mutex poisoned").insert(id.clone(), policies);
    }

    pub fn add_incentive_record(&self, id: &ProjectProgramId) {
        self.incentives.lock().expect("incentive mutex poisoned").insert(id.clone());
    }

    pub fn freeze_rollup(&self, id: &ProjectProgramId) {
        self.frozen_rollups.lock().expect("analytics mutex poisoned").insert(id.clone());
    }

    pub fn set_public_documents(&self, id: &ProjectProgramId, count: usize) {
        self.public_documents.lock().expect("document mutex poisoned").insert(id.clone(), count);
    }

    /// Every side effect dispatched so far, in order.
    pub fn effects(&self) -> Vec<SideEffect> {
        self.effects.lock().expect("effect mutex poisoned").clone()
    }
}

impl ChecklistStore for MemoryBackend {
    fn unanswered(&self, id: &ProjectProgramId) -> Vec<UnansweredQuestion> {
        self.checklists
            .lock()
            .expect("checklist mutex poisoned")
            .get(id)
            .map(|state| state.unanswered.clone())
            .unwrap_or_default()
    }

    fn answered_count(&self, id: &ProjectProgramId) -> usize {
        self.checklists
            .lock()
            .expect("checklist mutex poisoned")
            .get(id)
            .map(|state| state.answered)
            .unwrap_or_default()
    }

    fn unlock_answers(&self, id: &ProjectProgramId) -> usize {
        let mut checklists = self.checklists.lock().expect("checklist mutex poisoned");
        match checklists.get_mut(id) {
            Some(state) => std::mem::take(&mut state.confirmed_answers),
            None => 0,
        }
    }
}

impl RelationshipStore for MemoryBackend {
    fn accepted_companies(&self, id: &ProjectProgramId) -> Vec<CompanyRef> {
        self.relationships
            .lock()
            .expect("relationship mutex poisoned")
            .get(id)
            .map(|state| state.accepted.clone())
            .unwrap_or_default()
    }

    fn unaccepted_companies(&self, id: &ProjectProgramId) -> Vec<CompanyRef> {
        self.relationships
            .lock()
            .expect("relationship mutex poisoned")
            .get(id)
            .map(|state| state.unaccepted.clone())
            .unwrap_or_default()
    }

    fn electric_utilities(&self, id: &ProjectProgramId) -> Vec<CompanyRef> {
        self.relationships
            .lock()
            .expect("relationship mutex poisoned")
            .get(id)
            .map(|state| state.electric.clone())
            .unwrap_or_default()
    }

    fn gas_utilities(&self, id: &ProjectProgramId) -> Vec<CompanyRef> {
        self.relationships
            .lock()
            .expect("relationship mutex poisoned")
            .get(id)
            .map(|state| state.gas.clone())
            .unwrap_or_default()
    }
}

impl AnnotationStore for MemoryBackend {
    fn annotation_names(&self, id: &ProjectProgramId) -> Vec<String> {
        self.annotations
            .lock()
            .expect("annotation mutex poisoned")
            .get(id)
            .cloned()
            .unwrap_or_default()
    }
}

impl SimulationStore for MemoryBackend {
    fn model(&self, id: &ProjectProgramId) -> Option<SimulationModel> {
        self.models.lock().expect("model mutex poisoned").get(id).cloned()
    }
}

impl SamplingStore for MemoryBackend {
    fn membership(&self, id: &ProjectProgramId) -> Option<SamplingMembership> {
        self.sampling.lock().expect("sampling mutex poisoned").get(id).cloned()
    }

    fn group_members(&self, group: &SamplingGroupRef) -> Vec<ProjectProgramId> {
        let mut members: Vec<ProjectProgramId> = self
            .sampling
            .lock()
            .expect("sampling mutex poisoned")
            .iter()
            .filter(|(_, membership)| membership.group == *group)
            .map(|(id, _)| id.clone())
            .collect();
        members.sort();
        members
    }
}

impl QaPolicyStore for MemoryBackend {
    fn policies(&self, id: &ProjectProgramId) -> Vec<QaPolicy> {
        self.qa_policies
            .lock()
            .expect("qa mutex poisoned")
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    fn rollback_reviews(&self, id: &ProjectProgramId) -> Vec<String> {
        let mut qa_policies = self.qa_policies.lock().expect("qa mutex poisoned");
        let Some(policies) = qa_policies.get_mut(id) else {
            return Vec::new();
        };
        let mut rolled_back = Vec::new();
        for policy in policies.iter_mut() {
            if policy.review == Some(QaReviewState::Complete) {
                policy.review = Some(QaReviewState::Received);
                rolled_back.push(format!(
                    "rolled back QA review from {} to received",
                    policy.qa_company,
                ));
            }
        }
        rolled_back
    }
}

impl PaymentStore for MemoryBackend {
    fn has_incentive_records(&self, id: &ProjectProgramId) -> bool {
        self.incentives.lock().expect("incentive mutex poisoned").contains(id)
    }

    fn release(&self, id: &ProjectProgramId) -> bool {
        self.incentives.lock().expect("incentive mutex poisoned").remove(id)
    }
}

impl AnalyticsStore for MemoryBackend {
    fn unfreeze(&self, id: &ProjectProgramId) -> bool {
        self.frozen_rollups.lock().expect("analytics mutex poisoned").remove(id)
    }
}

impl DocumentStore for MemoryBackend {
    fn revoke_public_certificates(&self, id: &ProjectProgramId) -> usize {
        self.public_documents
            .lock()
            .expect("document mutex poisoned")
            .remove(id)
            .unwrap_or_default()
    }
}

impl SideEffectDispatcher for MemoryBackend {
    fn dispatch(&self, effect: SideEffect) {
        self.effects.lock().expect("effect mutex poisoned").push(effect);
    }
}

impl ProjectProgramRepository for MemoryBackend {
    fn insert(&self, entity: ProjectProgram) -> Result<(), RepositoryError> {
        let mut pairings = self.pairings.lock().expect("pairing mutex poisoned");
        if pairings.contains_key(&entity.id) {
            return Err(RepositoryError::Conflict);
        }
        pairings.insert(entity.id.clone(), entity);
        Ok(())
    }

    fn fetch(&self, id: &ProjectProgramId) -> Result<Option<ProjectProgram>, RepositoryError> {
        Ok(self.pairings.lock().expect("pairing mutex poisoned").get(id).cloned())
    }

    fn commit(&self, entity: ProjectProgram, expected_version: u64) -> Result<(), RepositoryError> {
        let mut pairings = self.pairings.lock().expect("pairing mutex poisoned");
        let current = pairings.get(&entity.id).ok_or(RepositoryError::NotFound)?;
        if current.version != expected_version {
            return Err(RepositoryError::Stale {
                expected: expected_version,
                found: current.version,
            });
        }
        pairings.insert(entity.id.clone(), entity);
        Ok(())
    }

    fn commit_many(
        &self,
        entities: Vec<(ProjectProgram, u64)>,
    ) -> Result<(), RepositoryError> {
        let mut pairings = self.pairings.lock().expect("pairing mutex poisoned");
        for (entity, expected_version) in &entities {
            let current = pairings.get(&entity.id).ok_or(RepositoryError::NotFound)?;
            if current.version != *expected_version {
                return Err(RepositoryError::Stale {
                    expected: *expected_version,
                    found: current.version,
                });
            }
        }
        for (entity, _) in entities {
            pairings.insert(entity.id.clone(), entity);
        }
        Ok(())
    }

    fn all_ids(&self) -> Vec<ProjectProgramId> {
        let mut ids: Vec<ProjectProgramId> =
            self.pairings.lock().expect("pairing mutex poisoned").keys().cloned().collect();
        ids.sort();
        ids
    }
}
