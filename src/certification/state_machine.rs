//! The lifecycle state machine for project/program pairings, expressed as an
//! explicit transition table validated at construction time.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{error, info};

use super::domain::{
    Actor, Capability, CertificationState, InvariantViolation, ProjectProgram, StateChoice,
};
use super::qa::GatingQACoordinator;
use super::requirements::{EligibilityEvaluator, EligibilityReport};
use super::stores::{SamplingStore, SideEffect};

/// Machine flavor. Verifier-mediated programs route through three review
/// states instead of the inspection/QA pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineVariant {
    Standard,
    VerifierMediated,
}

/// Capability demanded by an edge. Some edges accept any of several.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityRule {
    Single(Capability),
    AnyOf(&'static [Capability]),
}

impl CapabilityRule {
    fn allows(&self, actor: &Actor) -> bool {
        match self {
            Self::Single(capability) => actor.can(*capability),
            Self::AnyOf(capabilities) => capabilities.iter().any(|c| actor.can(*c)),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Single(capability) => format!("{capability:?}"),
            Self::AnyOf(capabilities) => capabilities
                .iter()
                .map(|c| format!("{c:?}"))
                .collect::<Vec<_>>()
                .join(" or "),
        }
    }
}

/// Extra conditions attached to review and certification edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeGuard {
    None,
    /// Gating QA must not be blocking.
    QaCleared,
    /// Full certifying guard: eligibility, gating QA, sampling integrity.
    CertificationReady,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EffectKind {
    StateChanged,
    Certification,
    RegenerateDocuments,
    InvalidateAnalytics,
}

#[derive(Debug, Clone)]
pub struct TransitionRule {
    capability: CapabilityRule,
    guard: EdgeGuard,
    effects: &'static [EffectKind],
}

const PLAIN_EFFECTS: &[EffectKind] = &[EffectKind::StateChanged];
const CERTIFY_EFFECTS: &[EffectKind] = &[
    EffectKind::StateChanged,
    EffectKind::Certification,
    EffectKind::RegenerateDocuments,
    EffectKind::InvalidateAnalytics,
];

#[derive(Debug, thiserror::Error)]
pub enum TransitionError {
    #[error("no transition from {from} to {to}")]
    IllegalTransition {
        from: CertificationState,
        to: CertificationState,
    },
    #[error("actor lacks the capability for this transition ({required})")]
    PermissionDenied { required: String },
    /// Expected and user-actionable; carries the report so the caller can
    /// render what is blocking.
    #[error("certification requirements are not met")]
    EligibilityFailed(EligibilityReport),
    #[error("the sampling group has no designated test entity")]
    SamplingIncomplete,
    /// Defect class: stored data already violates the certification
    /// invariant. Logged loudly, never silently recovered.
    #[error(transparent)]
    ConflictingState(#[from] InvariantViolation),
}

pub struct CertificationStateMachine {
    variant: MachineVariant,
    table: BTreeMap<(CertificationState, CertificationState), TransitionRule>,
    evaluator: Arc<EligibilityEvaluator>,
    qa: Arc<GatingQACoordinator>,
    sampling: Arc<dyn SamplingStore>,
}

impl CertificationStateMachine {
    pub fn new(
        variant: MachineVariant,
        evaluator: Arc<EligibilityEvaluator>,
        qa: Arc<GatingQACoordinator>,
        sampling: Arc<dyn SamplingStore>,
    ) -> Self {
        let machine = Self {
            variant,
            table: build_table(variant),
            evaluator,
            qa,
            sampling,
        };
        machine.validate_table();
        machine
    }

    pub fn variant(&self) -> MachineVariant {
        self.variant
    }

    /// Startup validation: every active state must be reachable from the
    /// initial state, and every forward chain must end in `Complete`.
    /// A broken table is a programming error, not a runtime condition.
    fn validate_table(&self) {
        let mut reachable = vec![CertificationState::PendingInspection];
        let mut frontier = vec![CertificationState::PendingInspection];
        while let Some(state) = frontier.pop() {
            for ((from, to), _) in &self.table {
                if *from == state && !reachable.contains(to) {
                    reachable.push(*to);
                    frontier.push(*to);
                }
            }
        }
        for state in active_states(self.variant) {
            assert!(
                reachable.contains(state),
                "state {state:?} unreachable in {:?} transition table",
                self.variant,
            );
        }
        assert!(
            reachable.contains(&CertificationState::Complete),
            "complete state unreachable in {:?} transition table",
            self.variant,
        );
    }

    /// Legal targets from a given state, for UI rendering.
    pub fn legal_targets(&self, from: CertificationState) -> Vec<CertificationState> {
        self.table
            .keys()
            .filter(|(source, _)| *source == from)
            .map(|(_, to)| *to)
            .collect()
    }

    /// Ordered state listing with descriptions, for UI rendering only.
    pub fn state_choices(&self) -> Vec<StateChoice> {
        active_states(self.variant)
            .iter()
            .map(|state| StateChoice {
                state: *state,
                description: state.label(),
            })
            .collect()
    }

    /// Dry-run of every precondition without mutating the entity.
    pub fn check_transition(
        &self,
        entity: &ProjectProgram,
        target: CertificationState,
        actor: &Actor,
    ) -> Result<(), TransitionError> {
        let violation_check = entity.is_certified();
        if let Err(violation) = violation_check {
            error!(%entity.id, %violation, "refusing transition on corrupt pairing");
            return Err(violation.into());
        }

        let rule = self.table.get(&(entity.state, target)).ok_or(
            TransitionError::IllegalTransition {
                from: entity.state,
                to: target,
            },
        )?;

        if !rule.capability.allows(actor) {
            return Err(TransitionError::PermissionDenied {
                required: rule.capability.describe(),
            });
        }

        match rule.guard {
            EdgeGuard::None => {}
            EdgeGuard::QaCleared => {
                if self.qa.is_blocking(&entity.id) {
                    return Err(TransitionError::EligibilityFailed(
                        self.evaluator.evaluate(entity, true),
                    ));
                }
            }
            EdgeGuard::CertificationReady => {
                let report = self.evaluator.evaluate(entity, true);
                if !report.eligible {
                    return Err(TransitionError::EligibilityFailed(report));
                }
                if self.qa.is_blocking(&entity.id) {
                    return Err(TransitionError::EligibilityFailed(report));
                }
                if let Some(membership) = self.sampling.membership(&entity.id) {
                    if !membership.group_has_test_entity {
                        return Err(TransitionError::SamplingIncomplete);
                    }
                }
            }
        }

        Ok(())
    }

    /// Attempts the transition, mutating the entity on success and returning
    /// the side-effect descriptors to queue. Mutation happens before any
    /// effect is visible; on any error the entity is untouched. The caller
    /// is responsible for holding the entity's write serialization (the
    /// service commits with an optimistic version check).
    pub fn attempt_transition(
        &self,
        entity: &mut ProjectProgram,
        target: CertificationState,
        actor: &Actor,
        today: NaiveDate,
    ) -> Result<Vec<SideEffect>, TransitionError> {
        self.check_transition(entity, target, actor)?;

        let from = entity.state;
        entity.state = target;
        if target.is_complete() {
            entity.certification_date = Some(today);
        } else if from.is_complete() {
            entity.certification_date = None;
        }
        entity.version += 1;

        info!(%entity.id, %from, %target, "transitioned pairing");

        let rule = &self.table[&(from, target)];
        Ok(materialize_effects(rule.effects, entity, from, target))
    }

    /// Batch variant for sampling-linked pairings: every entity is checked
    /// before any is mutated, so the set advances together or not at all.
    pub fn attempt_transition_all(
        &self,
        entities: &mut [ProjectProgram],
        target: CertificationState,
        actor: &Actor,
        today: NaiveDate,
    ) -> Result<Vec<SideEffect>, TransitionError> {
        for entity in entities.iter() {
            self.check_transition(entity, target, actor)?;
        }
        let mut effects = Vec::new();
        for entity in entities.iter_mut() {
            effects.extend(self.attempt_transition(entity, target, actor, today)?);
        }
        Ok(effects)
    }
}

fn materialize_effects(
    kinds: &[EffectKind],
    entity: &ProjectProgram,
    from: CertificationState,
    to: CertificationState,
) -> Vec<SideEffect> {
    kinds
        .iter()
        .map(|kind| match kind {
            EffectKind::StateChanged => SideEffect::StateChangedNotice {
                entity: entity.id.clone(),
                from,
                to,
            },
            EffectKind::Certification => SideEffect::CertificationNotice {
                entity: entity.id.clone(),
            },
            EffectKind::RegenerateDocuments => SideEffect::RegenerateCertificateDocuments {
                entity: entity.id.clone(),
            },
            EffectKind::InvalidateAnalytics => SideEffect::InvalidateAnalytics {
                entity: entity.id.clone(),
            },
        })
        .collect()
}

fn active_states(variant: MachineVariant) -> &'static [CertificationState] {
    match variant {
        MachineVariant::Standard => &[
            CertificationState::PendingInspection,
            CertificationState::Inspection,
            CertificationState::QaPending,
            CertificationState::CertificationPending,
            CertificationState::Complete,
            CertificationState::Failed,
            CertificationState::Abandoned,
        ],
        MachineVariant::VerifierMediated => &[
            CertificationState::PendingInspection,
            CertificationState::PendingProjectData,
            CertificationState::PendingRoughQa,
            CertificationState::PendingFinalQa,
            CertificationState::CertificationPending,
            CertificationState::Complete,
            CertificationState::Failed,
            CertificationState::Abandoned,
        ],
    }
}

fn build_table(
    variant: MachineVariant,
) -> BTreeMap<(CertificationState, CertificationState), TransitionRule> {
    use CertificationState::*;

    let mut table = BTreeMap::new();
    let mut edge =
        |from: CertificationState, to: CertificationState, rule: TransitionRule| {
            table.insert((from, to), rule);
        };

    let advance = |rule: CapabilityRule| TransitionRule {
        capability: rule,
        guard: EdgeGuard::None,
        effects: PLAIN_EFFECTS,
    };

    match variant {
        MachineVariant::Standard => {
            edge(
                PendingInspection,
                Inspection,
                advance(CapabilityRule::Single(Capability::SubmitChecklist)),
            );
            edge(
                Inspection,
                QaPending,
                advance(CapabilityRule::AnyOf(&[
                    Capability::SubmitChecklist,
                    Capability::ManageQa,
                ])),
            );
            edge(
                QaPending,
                CertificationPending,
                TransitionRule {
                    capability: CapabilityRule::Single(Capability::ManageQa),
                    guard: EdgeGuard::QaCleared,
                    effects: PLAIN_EFFECTS,
                },
            );
        }
        MachineVariant::VerifierMediated => {
            edge(
                PendingInspection,
                PendingProjectData,
                advance(CapabilityRule::Single(Capability::SubmitChecklist)),
            );
            edge(
                PendingProjectData,
                PendingRoughQa,
                advance(CapabilityRule::Single(Capability::ManageQa)),
            );
            edge(
                PendingRoughQa,
                PendingFinalQa,
                advance(CapabilityRule::Single(Capability::ManageQa)),
            );
            edge(
                PendingFinalQa,
                CertificationPending,
                TransitionRule {
                    capability: CapabilityRule::Single(Capability::ManageQa),
                    guard: EdgeGuard::QaCleared,
                    effects: PLAIN_EFFECTS,
                },
            );
        }
    }

    edge(
        CertificationPending,
        Complete,
        TransitionRule {
            capability: CapabilityRule::Single(Capability::CertifyProjects),
            guard: EdgeGuard::CertificationReady,
            effects: CERTIFY_EFFECTS,
        },
    );

    // Failed and Abandoned are reachable from every non-terminal state and
    // support re-entry back to the initial state.
    for state in active_states(variant) {
        if state.is_complete() || state.is_retired() {
            continue;
        }
        edge(
            *state,
            Failed,
            advance(CapabilityRule::Single(Capability::ManageProjects)),
        );
        edge(
            *state,
            Abandoned,
            advance(CapabilityRule::Single(Capability::ManageProjects)),
        );
    }
    edge(
        Failed,
        PendingInspection,
        advance(CapabilityRule::Single(Capability::ManageProjects)),
    );
    edge(
        Abandoned,
        PendingInspection,
        advance(CapabilityRule::Single(Capability::ManageProjects)),
    );

    table
}
