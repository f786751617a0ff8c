//! Collaborator boundaries the engine consumes. Persistence and querying of
//! the surrounding domain entities live behind these traits so the evaluator
//! and state machine can be exercised in isolation.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::domain::{CertificationState, CompanyRef, ProjectProgram, ProjectProgramId};

/// A checklist measure still awaiting an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnansweredQuestion {
    pub measure: String,
    pub is_optional: bool,
}

pub trait ChecklistStore: Send + Sync {
    fn unanswered(&self, id: &ProjectProgramId) -> Vec<UnansweredQuestion>;
    fn answered_count(&self, id: &ProjectProgramId) -> usize;
    /// Clears the confirmed flag set at certification time; returns how many
    /// answers were unlocked. Only the decertification workflow calls this.
    fn unlock_answers(&self, id: &ProjectProgramId) -> usize;
}

pub trait RelationshipStore: Send + Sync {
    fn accepted_companies(&self, id: &ProjectProgramId) -> Vec<CompanyRef>;
    fn unaccepted_companies(&self, id: &ProjectProgramId) -> Vec<CompanyRef>;
    /// Utilities attached as the electric provider; more than one is a data
    /// conflict the catalog reports.
    fn electric_utilities(&self, id: &ProjectProgramId) -> Vec<CompanyRef>;
    fn gas_utilities(&self, id: &ProjectProgramId) -> Vec<CompanyRef>;
}

pub trait AnnotationStore: Send + Sync {
    /// Names of annotations currently present on the pairing.
    fn annotation_names(&self, id: &ProjectProgramId) -> Vec<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuelKind {
    Electric,
    NaturalGas,
}

/// Snapshot of the pairing's active energy model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationModel {
    pub has_model_file: bool,
    pub eri_score: Option<f64>,
    pub validation_errors: Vec<String>,
    pub validation_warnings: Vec<String>,
    pub fuels: BTreeSet<FuelKind>,
}

pub trait SimulationStore: Send + Sync {
    fn model(&self, id: &ProjectProgramId) -> Option<SimulationModel>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SamplingGroupRef(pub String);

/// What the engine needs to know about a pairing's sampling membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingMembership {
    pub group: SamplingGroupRef,
    pub is_test_entity: bool,
    pub group_has_test_entity: bool,
    pub uncovered_questions: usize,
}

pub trait SamplingStore: Send + Sync {
    fn membership(&self, id: &ProjectProgramId) -> Option<SamplingMembership>;
    fn group_members(&self, group: &SamplingGroupRef) -> Vec<ProjectProgramId>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QaReviewState {
    Received,
    InProgress,
    CorrectionRequired,
    Complete,
}

/// One QA requirement applicable to a pairing's program/company context,
/// with its current review (if any has started).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaPolicy {
    pub qa_company: String,
    pub gates_certification: bool,
    /// Fraction of pairings the policy must cover; 1.0 means every pairing.
    pub coverage_pct: f64,
    pub review: Option<QaReviewState>,
}

pub trait QaPolicyStore: Send + Sync {
    fn policies(&self, id: &ProjectProgramId) -> Vec<QaPolicy>;
    /// Resets reviews tied to a revoked certification back to `Received`.
    /// Returns a description per rolled-back review.
    fn rollback_reviews(&self, id: &ProjectProgramId) -> Vec<String>;
}

pub trait PaymentStore: Send + Sync {
    fn has_incentive_records(&self, id: &ProjectProgramId) -> bool;
    /// Releases any payment status attached to the certification; returns
    /// true when something was removed.
    fn release(&self, id: &ProjectProgramId) -> bool;
}

pub trait AnalyticsStore: Send + Sync {
    /// Unfreezes the computed analytics snapshot; returns true when a frozen
    /// rollup existed.
    fn unfreeze(&self, id: &ProjectProgramId) -> bool;
}

pub trait DocumentStore: Send + Sync {
    /// Revokes public visibility of certification-derived documents; returns
    /// how many documents were hidden.
    fn revoke_public_certificates(&self, id: &ProjectProgramId) -> usize;
}

/// Descriptor for work queued after a committed transition. Dispatch is
/// fire-and-forget; the state mutation is already durable when these are
/// drained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SideEffect {
    StateChangedNotice {
        entity: ProjectProgramId,
        from: CertificationState,
        to: CertificationState,
    },
    CertificationNotice {
        entity: ProjectProgramId,
    },
    RegenerateCertificateDocuments {
        entity: ProjectProgramId,
    },
    InvalidateAnalytics {
        entity: ProjectProgramId,
    },
}

pub trait SideEffectDispatcher: Send + Sync {
    fn dispatch(&self, effect: SideEffect);
}

/// Storage abstraction for the pairing itself.
pub trait ProjectProgramRepository: Send + Sync {
    fn insert(&self, entity: ProjectProgram) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &ProjectProgramId) -> Result<Option<ProjectProgram>, RepositoryError>;
    /// Commits a mutated copy. `expected_version` is the version the caller
    /// read; a mismatch means another writer interleaved and the commit is
    /// rejected without mutating anything.
    fn commit(&self, entity: ProjectProgram, expected_version: u64) -> Result<(), RepositoryError>;
    /// Commits a batch atomically: every version check must pass or no entity
    /// is written. Used for sampling groups advancing together.
    fn commit_many(
        &self,
        entities: Vec<(ProjectProgram, u64)>,
    ) -> Result<(), RepositoryError>;
    fn all_ids(&self) -> Vec<ProjectProgramId>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("pairing already exists")]
    Conflict,
    #[error("pairing not found")]
    NotFound,
    #[error("stale write: expected version {expected}, found {found}")]
    Stale { expected: u64, found: u64 },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
