//! Certification eligibility and lifecycle management for project/program
//! pairings: the requirement catalog, the eligibility evaluator, the state
//! machine governing transitions, and the decertification workflow.

pub mod context;
pub mod decertify;
pub mod domain;
pub mod memory;
pub mod qa;
pub mod requirements;
pub mod router;
pub mod service;
pub mod state_machine;
pub mod stores;

#[cfg(test)]
mod tests;

pub use context::EvaluationSources;
pub use decertify::{DecertificationWorkflow, DecertifyError, DecertifyReport};
pub use domain::{
    Actor, Capability, CertificationState, CompanyRef, CompanyType, InvariantViolation,
    ModelDataPolicy, ProgramConfig, ProgramRef, ProjectProgram, ProjectProgramId, ProjectRef,
    RelationshipRequirement, StateChoice,
};
pub use memory::MemoryBackend;
pub use qa::GatingQACoordinator;
pub use requirements::{
    CatalogOverrides, CheckTier, EligibilityEvaluator, EligibilityReport, RequirementCatalog,
    RequirementCheck, RequirementResult, RequirementStatus,
};
pub use router::certification_router;
pub use service::{CertificationService, ServiceError};
pub use state_machine::{CertificationStateMachine, MachineVariant, TransitionError};
pub use stores::{
    ProjectProgramRepository, QaPolicy, QaReviewState, RepositoryError, SamplingGroupRef,
    SamplingMembership, SideEffect, SideEffectDispatcher, SimulationModel, UnansweredQuestion,
};
