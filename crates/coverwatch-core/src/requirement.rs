//! Project coverage requirements and the contextual facts evaluated alongside them.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::policy::CoverageType;

/// Minimum insurance condition a project sets for one coverage type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageRequirement {
    pub coverage_type: CoverageType,
    #[serde(default)]
    pub minimum_limit: Option<u64>,
    #[serde(default)]
    pub maximum_excess: Option<u64>,
    #[serde(default)]
    pub principal_indemnity_required: bool,
    #[serde(default)]
    pub cross_liability_required: bool,
    #[serde(default)]
    pub waiver_required: bool,
    /// Force the jurisdiction rule on non-statutory cover.
    #[serde(default)]
    pub jurisdiction_must_match: Option<bool>,
}

impl CoverageRequirement {
    pub fn new(coverage_type: impl Into<CoverageType>) -> Self {
        Self {
            coverage_type: coverage_type.into(),
            minimum_limit: None,
            maximum_excess: None,
            principal_indemnity_required: false,
            cross_liability_required: false,
            waiver_required: false,
            jurisdiction_must_match: None,
        }
    }

    pub fn with_minimum_limit(mut self, limit: u64) -> Self {
        self.minimum_limit = Some(limit);
        self
    }

    pub fn with_maximum_excess(mut self, excess: u64) -> Self {
        self.maximum_excess = Some(excess);
        self
    }

    /// Whether the jurisdiction rule applies to this requirement.
    pub fn checks_jurisdiction(&self) -> bool {
        match self.jurisdiction_must_match {
            Some(explicit) => explicit,
            None => self.coverage_type.is_statutory(),
        }
    }
}

/// Facts about the project and the subcontractor that the evaluator needs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectFacts {
    pub project_end_date: Option<NaiveDate>,
    pub project_jurisdiction: Option<String>,
    /// Identifier the subcontractor registered with; compared to the certificate.
    pub expected_identifier: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequirementError {
    #[error("requirement #{index} has an empty coverage type")]
    EmptyCoverageType { index: usize },

    #[error("coverage type `{0}` is required more than once")]
    DuplicateCoverageType(CoverageType),
}

/// Check the one-requirement-per-type invariant of a project's requirement set.
///
/// The evaluator assumes this holds but never calls it; the service boundary
/// does, so that a malformed set surfaces as a validation error.
pub fn validate_requirements(requirements: &[CoverageRequirement]) -> Result<(), RequirementError> {
    let mut seen = HashSet::with_capacity(requirements.len());
    for (index, req) in requirements.iter().enumerate() {
        if req.coverage_type.is_empty() {
            return Err(RequirementError::EmptyCoverageType { index });
        }
        if !seen.insert(&req.coverage_type) {
            return Err(RequirementError::DuplicateCoverageType(
                req.coverage_type.clone(),
            ));
        }
    }
    Ok(())
}
