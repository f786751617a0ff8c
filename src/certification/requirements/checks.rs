//! The individual requirement checks. Each returns `None` when it does not
//! apply to the pairing, keeping it out of the report entirely.

use super::CheckOutcome;
use crate::certification::context::EvaluationContext;
use crate::certification::domain::{CompanyType, ProjectProgram};
use crate::certification::qa::first_blocking_policy;

const CHECKLIST_URL: &str = "#/tabs/checklist";
const COMPANIES_EDIT_URL: &str = "#/tabs/companies";
const ANNOTATIONS_EDIT_URL: &str = "#/tabs/annotations";
const MODEL_EDIT_URL: &str = "#/tabs/model";

/// Short-circuit: a certified pairing cannot be certified again.
pub(super) fn already_certified(
    entity: &ProjectProgram,
    context: &EvaluationContext,
) -> Option<CheckOutcome> {
    if context.skip_certification_check || entity.certification_date.is_none() {
        return None;
    }
    Some(CheckOutcome::fail(
        "This program has already been certified.",
    ))
}

pub(super) fn sampling_integrity(
    _entity: &ProjectProgram,
    context: &EvaluationContext,
) -> Option<CheckOutcome> {
    let membership = context.sampling.as_ref()?;
    if !membership.group_has_test_entity {
        return Some(CheckOutcome::fail(
            "The sampling group has no designated test entity.",
        ));
    }
    Some(CheckOutcome::pass())
}

pub(super) fn required_questions_remaining(
    _entity: &ProjectProgram,
    context: &EvaluationContext,
) -> Option<CheckOutcome> {
    if context.sampling.is_some() {
        // Covered with alternate logic by the sampling-coverage check.
        return None;
    }
    let remaining = context.required_unanswered();
    if remaining == 0 {
        return Some(CheckOutcome::pass());
    }
    let message = if remaining == 1 {
        "There is 1 required checklist question remaining.".to_string()
    } else {
        format!("There are {remaining} required checklist questions remaining.")
    };
    Some(CheckOutcome::fail_with(message, CHECKLIST_URL))
}

pub(super) fn optional_questions_remaining(
    _entity: &ProjectProgram,
    context: &EvaluationContext,
) -> Option<CheckOutcome> {
    if context.sampling.is_some() {
        return None;
    }
    let remaining = context.optional_unanswered();
    if remaining == 0 {
        return Some(CheckOutcome::pass());
    }
    let message = if remaining == 1 {
        "There is 1 optional checklist question remaining.".to_string()
    } else {
        format!("There are {remaining} optional checklist questions remaining.")
    };
    Some(CheckOutcome::warning(message))
}

pub(super) fn sampling_coverage(
    _entity: &ProjectProgram,
    context: &EvaluationContext,
) -> Option<CheckOutcome> {
    let membership = context.sampling.as_ref()?;
    let uncovered = membership.uncovered_questions;
    if uncovered == 0 {
        return Some(CheckOutcome::pass());
    }
    let message = if uncovered == 1 {
        "There is 1 question not covered by the sampling group.".to_string()
    } else {
        format!("There are {uncovered} questions not covered by the sampling group.")
    };
    Some(CheckOutcome::fail(message))
}

/// Legacy programs validate only that a model file is attached.
pub(super) fn model_file(
    entity: &ProjectProgram,
    context: &EvaluationContext,
) -> Option<CheckOutcome> {
    if entity.certification_date.is_some() {
        return None;
    }
    match &context.model {
        None => Some(CheckOutcome::fail_with(
            "A model data file is required but no model is attached.",
            MODEL_EDIT_URL,
        )),
        Some(model) if !model.has_model_file => Some(CheckOutcome::fail_with(
            "The attached model is missing its data file.",
            MODEL_EDIT_URL,
        )),
        Some(_) => Some(CheckOutcome::pass()),
    }
}

/// Newer programs validate the parsed simulation data, including the
/// program's ERI window.
pub(super) fn model_data(
    entity: &ProjectProgram,
    context: &EvaluationContext,
) -> Option<CheckOutcome> {
    if entity.certification_date.is_some() {
        return None;
    }

    let Some(model) = &context.model else {
        return Some(CheckOutcome::fail_with(
            "Missing simulation data.",
            MODEL_EDIT_URL,
        ));
    };

    if !model.validation_errors.is_empty() {
        return Some(CheckOutcome::fail_with(
            format!(
                "Simulation data mismatch: {}",
                model.validation_errors.join(", ")
            ),
            MODEL_EDIT_URL,
        ));
    }

    let config = &entity.program.config;
    if config.min_eri_score > 0.0 || config.max_eri_score < 100.0 {
        let Some(eri) = model.eri_score else {
            return Some(CheckOutcome::fail_with(
                "Missing the ERI score from simulation data.",
                MODEL_EDIT_URL,
            ));
        };
        if config.min_eri_score > 0.0 && eri < config.min_eri_score {
            return Some(CheckOutcome::fail_with(
                format!("ERI score {eri} is below the program minimum."),
                MODEL_EDIT_URL,
            ));
        }
        if config.max_eri_score < 100.0 && eri > config.max_eri_score {
            return Some(CheckOutcome::fail_with(
                format!("ERI score {eri} exceeds the program maximum."),
                MODEL_EDIT_URL,
            ));
        }
    }

    Some(CheckOutcome::pass())
}

pub(super) fn model_data_warnings(
    _entity: &ProjectProgram,
    context: &EvaluationContext,
) -> Option<CheckOutcome> {
    let model = context.model.as_ref()?;
    if model.validation_warnings.is_empty() {
        return Some(CheckOutcome::pass());
    }
    Some(CheckOutcome::warning(format!(
        "Simulation data warnings: {}",
        model.validation_warnings.join(", ")
    )))
}

pub(super) fn required_annotations(
    entity: &ProjectProgram,
    context: &EvaluationContext,
) -> Option<CheckOutcome> {
    let required = &entity.program.config.required_annotations;
    if required.is_empty() {
        return None;
    }

    let missing: Vec<&String> = required
        .iter()
        .filter(|name| !context.annotation_names.contains(name))
        .collect();

    if !missing.is_empty() && entity.certification_date.is_none() {
        let present = (required.len() - missing.len()) as u32;
        let message = format!(
            "{} required annotation(s) missing: {}",
            missing.len(),
            missing
                .iter()
                .map(|name| name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        return Some(
            CheckOutcome::fail_with(message, ANNOTATIONS_EDIT_URL)
                .weighted(present, required.len() as u32),
        );
    }
    Some(CheckOutcome::pass())
}

/// Incentive-bearing programs require the program owner on the project.
pub(super) fn program_owner_attached(
    entity: &ProjectProgram,
    context: &EvaluationContext,
) -> Option<CheckOutcome> {
    let program = &entity.program;
    if program.config.incentive_total <= 0.0 {
        return Some(CheckOutcome::pass());
    }
    let attached = context
        .accepted_companies
        .iter()
        .any(|company| company.id == program.owner.id);
    if attached {
        return Some(CheckOutcome::pass());
    }
    Some(CheckOutcome::fail(format!(
        "Program incentives require {} to be attached to the project.",
        program.owner.name
    )))
}

/// Common logic for the per-company-type relationship checks.
fn company_required(
    company_type: CompanyType,
    entity: &ProjectProgram,
    context: &EvaluationContext,
) -> Option<CheckOutcome> {
    let requirement = entity.program.config.relationship(company_type);
    if !requirement.require_assigned && !requirement.require_relationship {
        return None;
    }

    let accepted = context.accepted_of_type(company_type);
    let unaccepted = context.unaccepted_of_type(company_type);

    if requirement.require_assigned && accepted.is_empty() && unaccepted.is_empty() {
        return Some(CheckOutcome::fail_with(
            format!(
                "A {} is required for {}.",
                company_type.label(),
                entity.program.name
            ),
            COMPANIES_EDIT_URL,
        ));
    }

    if requirement.require_relationship {
        if accepted.is_empty() && !unaccepted.is_empty() {
            return Some(CheckOutcome::fail_with(
                format!(
                    "The {} must accept its association with the project.",
                    company_type.label()
                ),
                COMPANIES_EDIT_URL,
            ));
        }
        return Some(CheckOutcome::pass());
    }
    None
}

macro_rules! company_check {
    ($name:ident, $company_type:expr) => {
        pub(super) fn $name(
            entity: &ProjectProgram,
            context: &EvaluationContext,
        ) -> Option<CheckOutcome> {
            company_required($company_type, entity, context)
        }
    };
}

company_check!(builder_required, CompanyType::Builder);
company_check!(provider_required, CompanyType::Provider);
company_check!(rater_required, CompanyType::Rater);
company_check!(utility_required, CompanyType::Utility);
company_check!(hvac_required, CompanyType::Hvac);
company_check!(qa_required, CompanyType::Qa);
company_check!(architect_required, CompanyType::Architect);
company_check!(developer_required, CompanyType::Developer);
company_check!(community_owner_required, CompanyType::CommunityOwner);

/// More than one utility claiming the same fuel is a data conflict that has
/// to be resolved before certification.
pub(super) fn multiple_utility_check(
    _entity: &ProjectProgram,
    context: &EvaluationContext,
) -> Option<CheckOutcome> {
    if context.electric_utilities.len() > 1 {
        return Some(CheckOutcome::fail_with(
            "Multiple Electric Provider utilities are attached to the project.",
            COMPANIES_EDIT_URL,
        ));
    }
    if context.gas_utilities.len() > 1 {
        return Some(CheckOutcome::fail_with(
            "Multiple Gas Provider utilities are attached to the project.",
            COMPANIES_EDIT_URL,
        ));
    }
    Some(CheckOutcome::pass())
}

pub(super) fn simulation_gas_utility(
    _entity: &ProjectProgram,
    context: &EvaluationContext,
) -> Option<CheckOutcome> {
    let model = context.model.as_ref()?;
    if !model
        .fuels
        .contains(&crate::certification::stores::FuelKind::NaturalGas)
    {
        return None;
    }
    if context.gas_utilities.is_empty() {
        return Some(CheckOutcome::fail_with(
            "Simulation data uses natural gas but no gas utility is specified.",
            COMPANIES_EDIT_URL,
        ));
    }
    Some(CheckOutcome::pass())
}

pub(super) fn simulation_electric_utility(
    _entity: &ProjectProgram,
    context: &EvaluationContext,
) -> Option<CheckOutcome> {
    let model = context.model.as_ref()?;
    if !model
        .fuels
        .contains(&crate::certification::stores::FuelKind::Electric)
    {
        return None;
    }
    if context.electric_utilities.is_empty() {
        return Some(CheckOutcome::fail_with(
            "Simulation data uses electricity but no electric utility is specified.",
            COMPANIES_EDIT_URL,
        ));
    }
    Some(CheckOutcome::pass())
}

pub(super) fn gating_qa(
    _entity: &ProjectProgram,
    context: &EvaluationContext,
) -> Option<CheckOutcome> {
    if context.qa_policies.is_empty() {
        return None;
    }
    if let Some(policy) = first_blocking_policy(&context.qa_policies) {
        return Some(CheckOutcome::fail(format!(
            "Gating QA review by {} is not complete.",
            policy.qa_company
        )));
    }
    Some(CheckOutcome::pass())
}

pub(super) fn rater_of_record(
    entity: &ProjectProgram,
    _context: &EvaluationContext,
) -> Option<CheckOutcome> {
    if !entity.program.config.require_rater_of_record {
        return None;
    }
    if entity.rater_of_record.is_none() {
        return Some(CheckOutcome::warning(
            "A rater of record has not been assigned.",
        ));
    }
    None
}

pub(super) fn energy_modeler(
    entity: &ProjectProgram,
    _context: &EvaluationContext,
) -> Option<CheckOutcome> {
    if !entity.program.config.require_energy_modeler {
        return None;
    }
    if entity.energy_modeler.is_none() {
        return Some(CheckOutcome::warning(
            "An energy modeler has not been assigned.",
        ));
    }
    None
}

pub(super) fn field_inspectors(
    entity: &ProjectProgram,
    _context: &EvaluationContext,
) -> Option<CheckOutcome> {
    if !entity.program.config.require_field_inspectors {
        return None;
    }
    if entity.field_inspectors.is_empty() {
        return Some(CheckOutcome::warning(
            "No field inspectors have been assigned.",
        ));
    }
    None
}
