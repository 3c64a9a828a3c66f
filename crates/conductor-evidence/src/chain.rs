//! Builder for evidence chains.
//!
//! A chain links one requirement to its analysis, implementation, and
//! validation artifacts. The builder recomputes `chainStatus` on build, so
//! a chain's coverage always reflects the sections actually present.

use chrono::Utc;
use conductor_core::{
    AnalysisEvidence, ChainStatus, EvidenceChain, ImplementationEvidence, Requirement,
    SessionId, ValidationEvidence,
};
use uuid::Uuid;

/// Outcome of [`EvidenceChainBuilder::validate_chain_links`].
#[derive(Debug, Clone)]
pub struct ChainLinkReport {
    /// True iff no errors were found.
    pub valid: bool,
    /// Coverage the chain would have if built now.
    pub coverage_percent: u8,
    /// Problems that make the chain inconsistent.
    pub errors: Vec<String>,
    /// Gaps worth knowing about but not fatal.
    pub warnings: Vec<String>,
}

/// Fluent builder for an [`EvidenceChain`].
#[derive(Debug, Clone)]
pub struct EvidenceChainBuilder {
    chain: EvidenceChain,
}

/// Starts a chain for one task's requirement.
pub fn create_evidence_chain(
    session_id: SessionId,
    task_id: impl Into<String>,
    description: impl Into<String>,
    acceptance_criteria: Vec<String>,
) -> EvidenceChainBuilder {
    let now = Utc::now();
    let total = acceptance_criteria.len() as u32;
    EvidenceChainBuilder {
        chain: EvidenceChain {
            id: Uuid::new_v4(),
            session_id,
            created_at: now,
            updated_at: now,
            requirement: Requirement {
                task_id: task_id.into(),
                description: description.into(),
                acceptance_criteria,
            },
            analysis: None,
            implementation: None,
            validation: None,
            chain_status: ChainStatus {
                analysis_linked: false,
                implementation_linked: false,
                validation_linked: false,
                coverage_percent: 0,
                acceptance_criteria_verified: 0,
                acceptance_criteria_total: total,
            },
        },
    }
}

impl EvidenceChainBuilder {
    /// Resumes building from an existing chain (merge path).
    pub fn from_chain(chain: EvidenceChain) -> Self {
        Self { chain }
    }

    /// Links the analysis section.
    pub fn with_analysis(mut self, mut analysis: AnalysisEvidence) -> Self {
        analysis.linked_at.get_or_insert_with(Utc::now);
        self.chain.analysis = Some(analysis);
        self
    }

    /// Links the implementation section.
    pub fn with_implementation(mut self, mut implementation: ImplementationEvidence) -> Self {
        implementation.linked_at.get_or_insert_with(Utc::now);
        self.chain.implementation = Some(implementation);
        self
    }

    /// Links the validation section.
    pub fn with_validation(mut self, mut validation: ValidationEvidence) -> Self {
        validation.linked_at.get_or_insert_with(Utc::now);
        self.chain.validation = Some(validation);
        self
    }

    /// Checks the links without building.
    pub fn validate_chain_links(&self) -> ChainLinkReport {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let chain = &self.chain;

        if chain.requirement.task_id.trim().is_empty() {
            errors.push("requirement.taskId must not be empty".to_string());
        }
        if chain.requirement.acceptance_criteria.is_empty() {
            warnings.push("requirement has no acceptance criteria".to_string());
        }

        if chain.analysis.is_none() {
            warnings.push("analysis not linked".to_string());
        }
        if chain.implementation.is_none() {
            warnings.push("implementation not linked".to_string());
        }
        match &chain.validation {
            None => warnings.push("validation not linked".to_string()),
            Some(validation) => {
                if validation.tests_passed.is_none() && validation.screenshots.is_empty() {
                    warnings.push("validation carries neither test counts nor screenshots".to_string());
                }
                if let Some(links) = &validation.links_to {
                    for check in &links.verification.acceptance_criteria_verified {
                        if !chain
                            .requirement
                            .acceptance_criteria
                            .contains(&check.criterion)
                        {
                            errors.push(format!(
                                "validation verifies unknown criterion '{}'",
                                check.criterion
                            ));
                        }
                    }
                }
            }
        }

        ChainLinkReport {
            valid: errors.is_empty(),
            coverage_percent: EvidenceChain::coverage_for(chain.linked_count()),
            errors,
            warnings,
        }
    }

    /// Finalises the chain with a freshly recomputed `chainStatus`.
    pub fn build(mut self) -> EvidenceChain {
        self.chain.updated_at = Utc::now();
        self.chain.recompute_status();
        self.chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_core::{CriterionCheck, VerificationLinks, VerificationRecord};

    fn builder() -> EvidenceChainBuilder {
        create_evidence_chain(
            SessionId::generate(),
            "t1",
            "login must work",
            vec!["renders".into(), "submits".into()],
        )
    }

    #[test]
    fn test_empty_chain_has_zero_coverage() {
        let chain = builder().build();
        assert_eq!(chain.chain_status.coverage_percent, 0);
        assert!(!chain.chain_status.analysis_linked);
        assert_eq!(chain.chain_status.acceptance_criteria_total, 2);
    }

    #[test]
    fn test_coverage_steps_with_each_section() {
        let one = builder()
            .with_analysis(AnalysisEvidence::default())
            .build();
        assert_eq!(one.chain_status.coverage_percent, 33);

        let two = builder()
            .with_analysis(AnalysisEvidence::default())
            .with_implementation(ImplementationEvidence::default())
            .build();
        assert_eq!(two.chain_status.coverage_percent, 67);

        let three = builder()
            .with_analysis(AnalysisEvidence::default())
            .with_implementation(ImplementationEvidence::default())
            .with_validation(ValidationEvidence::default())
            .build();
        assert_eq!(three.chain_status.coverage_percent, 100);
        assert!(three.chain_status.validation_linked);
    }

    #[test]
    fn test_build_counts_verified_criteria() {
        let chain = builder()
            .with_validation(ValidationEvidence {
                tests_passed: Some(4),
                links_to: Some(VerificationLinks {
                    verification: VerificationRecord {
                        acceptance_criteria_verified: vec![
                            CriterionCheck {
                                criterion: "renders".into(),
                                verified: true,
                            },
                            CriterionCheck {
                                criterion: "submits".into(),
                                verified: true,
                            },
                        ],
                    },
                }),
                ..Default::default()
            })
            .build();

        assert_eq!(chain.chain_status.acceptance_criteria_verified, 2);
        assert_eq!(chain.chain_status.acceptance_criteria_total, 2);
    }

    #[test]
    fn test_linked_at_is_stamped_once() {
        let stamped = Utc::now() - chrono::Duration::days(1);
        let chain = builder()
            .with_analysis(AnalysisEvidence {
                linked_at: Some(stamped),
                ..Default::default()
            })
            .build();
        assert_eq!(chain.analysis.unwrap().linked_at, Some(stamped));
    }

    #[test]
    fn test_validate_chain_links_flags_gaps() {
        let report = builder().validate_chain_links();
        assert!(report.valid);
        assert_eq!(report.coverage_percent, 0);
        assert_eq!(report.warnings.len(), 3); // three unlinked sections

        let report = builder()
            .with_analysis(AnalysisEvidence::default())
            .validate_chain_links();
        assert_eq!(report.coverage_percent, 33);
        assert_eq!(report.warnings.len(), 2);
    }

    #[test]
    fn test_validate_chain_links_rejects_unknown_criterion() {
        let report = builder()
            .with_validation(ValidationEvidence {
                tests_passed: Some(1),
                links_to: Some(VerificationLinks {
                    verification: VerificationRecord {
                        acceptance_criteria_verified: vec![CriterionCheck {
                            criterion: "does something else".into(),
                            verified: true,
                        }],
                    },
                }),
                ..Default::default()
            })
            .validate_chain_links();

        assert!(!report.valid);
        assert!(report.errors[0].contains("unknown criterion"));
    }
}
