use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::certification::context::EvaluationSources;
use crate::certification::domain::{
    Actor, Capability, CertificationState, CompanyRef, CompanyType, ModelDataPolicy,
    ProgramConfig, ProgramRef, ProjectProgram, ProjectProgramId, ProjectRef,
    RelationshipRequirement,
};
use crate::certification::memory::MemoryBackend;
use crate::certification::qa::GatingQACoordinator;
use crate::certification::requirements::{
    CatalogOverrides, EligibilityEvaluator, RequirementCatalog,
};
use crate::certification::service::CertificationService;
use crate::certification::state_machine::{CertificationStateMachine, MachineVariant};
use crate::certification::stores::{QaPolicy, QaReviewState, UnansweredQuestion};

pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 14).expect("valid date")
}

pub(super) fn owner_company() -> CompanyRef {
    CompanyRef {
        id: "sponsor-1".to_string(),
        name: "Cascade Energy Alliance".to_string(),
        company_type: CompanyType::General,
    }
}

pub(super) fn rater_company() -> CompanyRef {
    CompanyRef {
        id: "rater-1".to_string(),
        name: "Summit Ratings".to_string(),
        company_type: CompanyType::Rater,
    }
}

pub(super) fn builder_company() -> CompanyRef {
    CompanyRef {
        id: "builder-1".to_string(),
        name: "Foursquare Homes".to_string(),
        company_type: CompanyType::Builder,
    }
}

pub(super) fn provider_company() -> CompanyRef {
    CompanyRef {
        id: "provider-1".to_string(),
        name: "Northwest Provider Group".to_string(),
        company_type: CompanyType::Provider,
    }
}

pub(super) fn utility_company(id: &str) -> CompanyRef {
    CompanyRef {
        id: id.to_string(),
        name: format!("{id} utility"),
        company_type: CompanyType::Utility,
    }
}

pub(super) fn program() -> ProgramRef {
    ProgramRef {
        slug: "cascade-efficiency".to_string(),
        name: "Cascade Efficiency Program".to_string(),
        owner: owner_company(),
        config: ProgramConfig::default(),
    }
}

pub(super) fn program_with(config: ProgramConfig) -> ProgramRef {
    ProgramRef {
        config,
        ..program()
    }
}

pub(super) fn verifier_program() -> ProgramRef {
    program_with(ProgramConfig {
        verifier_mediated: true,
        ..ProgramConfig::default()
    })
}

pub(super) fn simulation_config() -> ProgramConfig {
    ProgramConfig {
        model_data_policy: ModelDataPolicy::Simulation,
        ..ProgramConfig::default()
    }
}

pub(super) fn builder_relationship_config() -> ProgramConfig {
    let mut config = ProgramConfig::default();
    config.relationships.insert(
        CompanyType::Builder,
        RelationshipRequirement {
            require_assigned: true,
            require_relationship: true,
        },
    );
    config
}

pub(super) fn pairing(id: &str, program: ProgramRef) -> ProjectProgram {
    ProjectProgram::new(
        ProjectProgramId(id.to_string()),
        ProjectRef {
            id: format!("project-{id}"),
            address: "44 Juniper Ln".to_string(),
        },
        program,
        rater_company(),
    )
}

/// A pairing sitting on the certify edge with the certification date rules
/// intact.
pub(super) fn pending_pairing(id: &str, program: ProgramRef) -> ProjectProgram {
    let mut entity = pairing(id, program);
    entity.state = CertificationState::CertificationPending;
    entity
}

pub(super) fn certified_pairing(id: &str, program: ProgramRef) -> ProjectProgram {
    let mut entity = pairing(id, program);
    entity.state = CertificationState::Complete;
    entity.certification_date = Some(today());
    entity
}

pub(super) fn actor(capabilities: &[Capability]) -> Actor {
    Actor {
        user_id: "user-1".to_string(),
        company: rater_company(),
        capabilities: capabilities.iter().copied().collect(),
        is_superuser: false,
    }
}

pub(super) fn actor_for(company: CompanyRef, capabilities: &[Capability]) -> Actor {
    Actor {
        user_id: "user-2".to_string(),
        company,
        capabilities: capabilities.iter().copied().collect(),
        is_superuser: false,
    }
}

pub(super) fn superuser() -> Actor {
    Actor {
        user_id: "admin".to_string(),
        company: owner_company(),
        capabilities: BTreeSet::new(),
        is_superuser: true,
    }
}

pub(super) fn sources(backend: &Arc<MemoryBackend>) -> EvaluationSources {
    EvaluationSources {
        checklist: backend.clone(),
        relationships: backend.clone(),
        annotations: backend.clone(),
        simulation: backend.clone(),
        sampling: backend.clone(),
        qa: backend.clone(),
    }
}

pub(super) fn evaluator(backend: &Arc<MemoryBackend>) -> EligibilityEvaluator {
    EligibilityEvaluator::new(
        sources(backend),
        RequirementCatalog::new(CatalogOverrides::new()),
    )
}

pub(super) fn machine(
    backend: &Arc<MemoryBackend>,
    variant: MachineVariant,
) -> CertificationStateMachine {
    CertificationStateMachine::new(
        variant,
        Arc::new(evaluator(backend)),
        Arc::new(GatingQACoordinator::new(backend.clone())),
        backend.clone(),
    )
}

pub(super) fn build_service() -> (Arc<MemoryBackend>, CertificationService<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new());
    let service = CertificationService::new(
        backend.clone(),
        sources(&backend),
        backend.clone(),
        backend.clone(),
        backend.clone(),
        backend.clone(),
        CatalogOverrides::new(),
    );
    (backend, service)
}

pub(super) fn answered_checklist(backend: &MemoryBackend, id: &ProjectProgramId, answered: usize) {
    backend.set_checklist(id, Vec::new(), answered);
}

pub(super) fn open_question(measure: &str, optional: bool) -> UnansweredQuestion {
    UnansweredQuestion {
        measure: measure.to_string(),
        is_optional: optional,
    }
}

pub(super) fn incomplete_gating_policy() -> QaPolicy {
    QaPolicy {
        qa_company: "Pinnacle QA".to_string(),
        gates_certification: true,
        coverage_pct: 1.0,
        review: Some(QaReviewState::InProgress),
    }
}

pub(super) fn complete_gating_policy() -> QaPolicy {
    QaPolicy {
        review: Some(QaReviewState::Complete),
        ..incomplete_gating_policy()
    }
}
