use super::common::*;
use crate::certification::domain::ModelDataPolicy;
use crate::certification::requirements::{
    CatalogOverrides, CheckTier, RequirementCatalog, RequirementCheck,
};

fn names(checks: &[RequirementCheck]) -> Vec<&'static str> {
    checks.iter().map(|check| check.name).collect()
}

#[test]
fn base_order_starts_with_the_short_circuit() {
    let catalog = RequirementCatalog::new(CatalogOverrides::new());
    let checks = catalog.build(&program());

    assert_eq!(checks[0].name, "already_certified");
    assert_eq!(checks[1].name, "sampling_integrity");
    assert_eq!(checks[2].name, "required_questions_remaining");
}

#[test]
fn advisory_checks_always_sort_last() {
    let catalog = RequirementCatalog::new(CatalogOverrides::new());
    let checks = catalog.build(&program());

    let first_advisory = checks
        .iter()
        .position(|check| check.tier == CheckTier::Advisory)
        .expect("advisory checks exist");
    assert!(checks[first_advisory..]
        .iter()
        .all(|check| check.tier == CheckTier::Advisory));
    assert!(checks[..first_advisory]
        .iter()
        .all(|check| check.tier == CheckTier::Blocking));
}

#[test]
fn model_policy_selects_exactly_one_model_check() {
    let catalog = RequirementCatalog::new(CatalogOverrides::new());

    let plain = names(&catalog.build(&program()));
    assert!(!plain.contains(&"model_file"));
    assert!(!plain.contains(&"model_data"));

    let mut config = simulation_config();
    let simulation = names(&catalog.build(&program_with(config.clone())));
    assert!(simulation.contains(&"model_data"));
    assert!(simulation.contains(&"simulation_gas_utility"));
    assert!(simulation.contains(&"model_data_warnings"));
    assert!(!simulation.contains(&"model_file"));

    config.model_data_policy = ModelDataPolicy::LegacyFile;
    let legacy = names(&catalog.build(&program_with(config)));
    assert!(legacy.contains(&"model_file"));
    assert!(!legacy.contains(&"model_data"));
    assert!(!legacy.contains(&"simulation_gas_utility"));
}

#[test]
fn overrides_apply_per_slug_and_are_deterministic() {
    fn drop_utility_checks(checks: Vec<RequirementCheck>) -> Vec<RequirementCheck> {
        checks
            .into_iter()
            .filter(|check| check.name != "multiple_utility_check")
            .collect()
    }

    let mut overrides = CatalogOverrides::new();
    overrides.register("cascade-efficiency", drop_utility_checks);
    let catalog = RequirementCatalog::new(overrides);

    let amended = names(&catalog.build(&program()));
    assert!(!amended.contains(&"multiple_utility_check"));

    let mut other = program();
    other.slug = "some-other-program".to_string();
    let untouched = names(&catalog.build(&other));
    assert!(untouched.contains(&"multiple_utility_check"));

    // Same inputs, same order, every time.
    assert_eq!(amended, names(&catalog.build(&program())));
}

#[test]
fn override_additions_respect_the_tier_partition() {
    fn extra_warning(
        _entity: &crate::certification::domain::ProjectProgram,
        _context: &crate::certification::context::EvaluationContext,
    ) -> Option<crate::certification::requirements::CheckOutcome> {
        Some(crate::certification::requirements::CheckOutcome::warning(
            "supplemental review advised",
        ))
    }

    fn prepend_advisory(mut checks: Vec<RequirementCheck>) -> Vec<RequirementCheck> {
        checks.insert(0, RequirementCheck::advisory("supplemental_review", extra_warning));
        checks
    }

    let mut overrides = CatalogOverrides::new();
    overrides.register("cascade-efficiency", prepend_advisory);
    let catalog = RequirementCatalog::new(overrides);

    let checks = catalog.build(&program());
    // Inserted at the front, but re-sorted behind every blocking check.
    let position = checks
        .iter()
        .position(|check| check.name == "supplemental_review")
        .expect("inserted check present");
    assert!(checks[..position]
        .iter()
        .any(|check| check.tier == CheckTier::Blocking));
    assert!(checks[position..]
        .iter()
        .all(|check| check.tier == CheckTier::Advisory));
}
