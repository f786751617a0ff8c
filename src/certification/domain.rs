use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifier for one project/program pairing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectProgramId(pub String);

impl fmt::Display for ProjectProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle states for a project/program pairing.
///
/// The three `Pending*` review states only exist on the verifier-mediated
/// machine variant; the standard variant never enters them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificationState {
    PendingInspection,
    Inspection,
    QaPending,
    PendingProjectData,
    PendingRoughQa,
    PendingFinalQa,
    CertificationPending,
    Complete,
    Failed,
    Abandoned,
}

impl CertificationState {
    pub const fn label(self) -> &'static str {
        match self {
            Self::PendingInspection => "Pending",
            Self::Inspection => "Active",
            Self::QaPending => "Pending QA",
            Self::PendingProjectData => "Pending Project Data",
            Self::PendingRoughQa => "Pending Rough QA",
            Self::PendingFinalQa => "Pending Final QA",
            Self::CertificationPending => "Inspected",
            Self::Complete => "Certified",
            Self::Failed => "Failed",
            Self::Abandoned => "Abandoned",
        }
    }

    /// Success-terminal. `Failed`/`Abandoned` support re-entry and are not
    /// terminal in the strict sense.
    pub const fn is_complete(self) -> bool {
        matches!(self, Self::Complete)
    }

    pub const fn is_retired(self) -> bool {
        matches!(self, Self::Failed | Self::Abandoned)
    }
}

impl fmt::Display for CertificationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanyType {
    Builder,
    Provider,
    Rater,
    Utility,
    Hvac,
    Qa,
    Architect,
    Developer,
    CommunityOwner,
    General,
}

impl CompanyType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Builder => "Builder",
            Self::Provider => "Provider",
            Self::Rater => "Rater",
            Self::Utility => "Utility",
            Self::Hvac => "HVAC Contractor",
            Self::Qa => "QA Organization",
            Self::Architect => "Architect",
            Self::Developer => "Developer",
            Self::CommunityOwner => "Community Owner",
            Self::General => "General",
        }
    }

    /// The company types a program may require a relationship for.
    pub const fn relationship_checked() -> [Self; 9] {
        [
            Self::Builder,
            Self::Provider,
            Self::Rater,
            Self::Utility,
            Self::Hvac,
            Self::Qa,
            Self::Architect,
            Self::Developer,
            Self::CommunityOwner,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyRef {
    pub id: String,
    pub name: String,
    pub company_type: CompanyType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRef {
    pub id: String,
    pub address: String,
}

/// How a program sources its energy-model data. Legacy programs validate a
/// raw model file; newer programs validate parsed simulation data. The
/// catalog branches on this instead of letting both checks run and disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelDataPolicy {
    NotRequired,
    LegacyFile,
    Simulation,
}

/// Per-company-type relationship demands a program can make.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipRequirement {
    /// The company type must be attached to the project.
    pub require_assigned: bool,
    /// The attached company must also hold a relationship with the program
    /// owner's network.
    pub require_relationship: bool,
}

/// Requirement switches a program declares up front. These drive which
/// checks in the catalog participate for this program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramConfig {
    pub model_data_policy: ModelDataPolicy,
    pub required_annotations: Vec<String>,
    pub relationships: BTreeMap<CompanyType, RelationshipRequirement>,
    pub require_rater_of_record: bool,
    pub require_energy_modeler: bool,
    pub require_field_inspectors: bool,
    /// ERI window enforced when simulation data is required. The defaults
    /// (0.0, 100.0) disable the window.
    pub min_eri_score: f64,
    pub max_eri_score: f64,
    /// Combined incentive dollars; a non-zero value requires the program
    /// owner to be attached to the project.
    pub incentive_total: f64,
    /// Selects the verifier-mediated state machine variant.
    pub verifier_mediated: bool,
    /// Imported pairings carry their certification from an external registry
    /// and should not be decertified here.
    pub imported: bool,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            model_data_policy: ModelDataPolicy::NotRequired,
            required_annotations: Vec::new(),
            relationships: BTreeMap::new(),
            require_rater_of_record: false,
            require_energy_modeler: false,
            require_field_inspectors: false,
            min_eri_score: 0.0,
            max_eri_score: 100.0,
            incentive_total: 0.0,
            verifier_mediated: false,
            imported: false,
        }
    }
}

impl ProgramConfig {
    pub fn relationship(&self, company_type: CompanyType) -> RelationshipRequirement {
        self.relationships
            .get(&company_type)
            .copied()
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramRef {
    pub slug: String,
    pub name: String,
    pub owner: CompanyRef,
    pub config: ProgramConfig,
}

/// Capabilities an actor can hold; each transition edge names the rule it
/// requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    SubmitChecklist,
    ManageQa,
    CertifyProjects,
    ManageProjects,
    DecertifyProjects,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
    pub company: CompanyRef,
    pub capabilities: BTreeSet<Capability>,
    pub is_superuser: bool,
}

impl Actor {
    pub fn can(&self, capability: Capability) -> bool {
        self.is_superuser || self.capabilities.contains(&capability)
    }
}

/// Raised when stored data contradicts the certification invariant. This is
/// a defect signal, not a user-facing business failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("certification invariant violated: {0}")]
pub struct InvariantViolation(pub String);

/// One project's participation in one certification program; the unit the
/// state machine governs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectProgram {
    pub id: ProjectProgramId,
    pub project: ProjectRef,
    pub program: ProgramRef,
    pub company: CompanyRef,
    pub state: CertificationState,
    pub certification_date: Option<NaiveDate>,
    pub pct_complete: f64,
    pub rater_of_record: Option<String>,
    pub energy_modeler: Option<String>,
    pub field_inspectors: Vec<String>,
    /// Bumped on every committed mutation; the repository rejects stale
    /// writes so concurrent transitions serialize per entity.
    pub version: u64,
}

impl ProjectProgram {
    pub fn new(
        id: ProjectProgramId,
        project: ProjectRef,
        program: ProgramRef,
        company: CompanyRef,
    ) -> Self {
        Self {
            id,
            project,
            program,
            company,
            state: CertificationState::PendingInspection,
            certification_date: None,
            pct_complete: 0.0,
            rater_of_record: None,
            energy_modeler: None,
            field_inspectors: Vec::new(),
            version: 0,
        }
    }

    /// True iff the pairing is certified. A state/date mismatch means the
    /// state machine was bypassed somewhere and is reported as a violation
    /// rather than silently resolved.
    pub fn is_certified(&self) -> Result<bool, InvariantViolation> {
        let state_complete = self.state.is_complete();
        let has_date = self.certification_date.is_some();
        if state_complete != has_date {
            return Err(InvariantViolation(format!(
                "{} has state {:?} but {} certification date",
                self.id,
                self.state,
                if has_date { "a" } else { "no" },
            )));
        }
        Ok(state_complete)
    }
}

/// UI-facing state listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateChoice {
    pub state: CertificationState,
    pub description: &'static str,
}
