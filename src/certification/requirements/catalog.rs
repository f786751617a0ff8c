//! Builds the ordered requirement list for a program, honoring per-program
//! override hooks registered at composition time.

use std::collections::BTreeMap;

use super::checks;
use super::CheckOutcome;
use crate::certification::context::EvaluationContext;
use crate::certification::domain::{ModelDataPolicy, ProgramRef, ProjectProgram};

pub type CheckFn = fn(&ProjectProgram, &EvaluationContext) -> Option<CheckOutcome>;

/// Blocking checks may fail the evaluation; advisory checks only ever emit
/// warnings. The catalog guarantees every advisory check sorts after every
/// blocking one, so a fail-fast run can stop without hiding a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CheckTier {
    Blocking,
    Advisory,
}

#[derive(Clone)]
pub struct RequirementCheck {
    pub name: &'static str,
    pub tier: CheckTier,
    pub run: CheckFn,
}

impl RequirementCheck {
    pub const fn blocking(name: &'static str, run: CheckFn) -> Self {
        Self {
            name,
            tier: CheckTier::Blocking,
            run,
        }
    }

    pub const fn advisory(name: &'static str, run: CheckFn) -> Self {
        Self {
            name,
            tier: CheckTier::Advisory,
            run,
        }
    }
}

pub type OverrideFn = fn(Vec<RequirementCheck>) -> Vec<RequirementCheck>;

/// Strategy table of per-program catalog amendments, keyed by program slug.
/// Registered once at startup; replaces the original's dynamic hook on the
/// program object.
#[derive(Default, Clone)]
pub struct CatalogOverrides {
    by_slug: BTreeMap<String, OverrideFn>,
}

impl CatalogOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, slug: impl Into<String>, hook: OverrideFn) {
        self.by_slug.insert(slug.into(), hook);
    }

    fn get(&self, slug: &str) -> Option<OverrideFn> {
        self.by_slug.get(slug).copied()
    }
}

#[derive(Default, Clone)]
pub struct RequirementCatalog {
    overrides: CatalogOverrides,
}

impl RequirementCatalog {
    pub fn new(overrides: CatalogOverrides) -> Self {
        Self { overrides }
    }

    /// Returns the ordered checks applicable to `program`. Overrides may
    /// append, remove or reorder, but the blocking/advisory partition is
    /// re-established afterwards so ordering stays a correctness guarantee
    /// rather than a convention.
    pub fn build(&self, program: &ProgramRef) -> Vec<RequirementCheck> {
        let mut list = base_checks(program);

        if let Some(hook) = self.overrides.get(&program.slug) {
            list = hook(list);
        }

        // Stable: relative order within each tier is preserved.
        list.sort_by_key(|check| check.tier);
        list
    }
}

/// The documented base order. Model-data checks are selected by program
/// metadata up front; legacy and simulation-backed programs never share a
/// check that has to branch at runtime.
fn base_checks(program: &ProgramRef) -> Vec<RequirementCheck> {
    let mut list = vec![
        RequirementCheck::blocking("already_certified", checks::already_certified),
        RequirementCheck::blocking("sampling_integrity", checks::sampling_integrity),
        RequirementCheck::blocking(
            "required_questions_remaining",
            checks::required_questions_remaining,
        ),
        RequirementCheck::blocking("sampling_coverage", checks::sampling_coverage),
    ];

    match program.config.model_data_policy {
        ModelDataPolicy::NotRequired => {}
        ModelDataPolicy::LegacyFile => {
            list.push(RequirementCheck::blocking("model_file", checks::model_file));
        }
        ModelDataPolicy::Simulation => {
            list.push(RequirementCheck::blocking("model_data", checks::model_data));
        }
    }

    list.extend([
        RequirementCheck::blocking("required_annotations", checks::required_annotations),
        RequirementCheck::blocking("program_owner_attached", checks::program_owner_attached),
        RequirementCheck::blocking("builder_required", checks::builder_required),
        RequirementCheck::blocking("provider_required", checks::provider_required),
        RequirementCheck::blocking("rater_required", checks::rater_required),
        RequirementCheck::blocking("utility_required", checks::utility_required),
        RequirementCheck::blocking("hvac_required", checks::hvac_required),
        RequirementCheck::blocking("qa_required", checks::qa_required),
        RequirementCheck::blocking("architect_required", checks::architect_required),
        RequirementCheck::blocking("developer_required", checks::developer_required),
        RequirementCheck::blocking(
            "community_owner_required",
            checks::community_owner_required,
        ),
        RequirementCheck::blocking("multiple_utility_check", checks::multiple_utility_check),
    ]);

    if program.config.model_data_policy == ModelDataPolicy::Simulation {
        list.extend([
            RequirementCheck::blocking("simulation_gas_utility", checks::simulation_gas_utility),
            RequirementCheck::blocking(
                "simulation_electric_utility",
                checks::simulation_electric_utility,
            ),
        ]);
    }

    list.push(RequirementCheck::blocking("gating_qa", checks::gating_qa));

    // Advisory checks last; they cannot trigger fail-fast anyway and we do
    // not want to spend time on them when fail-fast is enabled.
    list.extend([
        RequirementCheck::advisory(
            "optional_questions_remaining",
            checks::optional_questions_remaining,
        ),
        RequirementCheck::advisory("rater_of_record", checks::rater_of_record),
        RequirementCheck::advisory("energy_modeler", checks::energy_modeler),
        RequirementCheck::advisory("field_inspectors", checks::field_inspectors),
    ]);

    if program.config.model_data_policy == ModelDataPolicy::Simulation {
        list.push(RequirementCheck::advisory(
            "model_data_warnings",
            checks::model_data_warnings,
        ));
    }

    list
}
