//! The setup wizard as an explicit finite-state machine.
//!
//! Steps run Company → Products → Competitors → ICPs → Personas → Review →
//! Done. Each transition validates its payload before advancing; a rejected
//! payload leaves the machine untouched. The whole machine serializes to
//! JSON so an interrupted session can be resumed later.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Named wizard states, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupStep {
    Company,
    Products,
    Competitors,
    Icps,
    Personas,
    Review,
    Done,
}

impl std::fmt::Display for SetupStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SetupStep::Company => "company",
            SetupStep::Products => "products",
            SetupStep::Competitors => "competitors",
            SetupStep::Icps => "icps",
            SetupStep::Personas => "personas",
            SetupStep::Review => "review",
            SetupStep::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("wizard is at step '{at}' but received input for step '{got}'")]
    StepMismatch { at: SetupStep, got: SetupStep },
    #[error("{0}")]
    Validation(String),
    #[error("cannot go back from step '{0}'")]
    CannotGoBack(SetupStep),
    #[error("setup can only be submitted from the review step (currently at '{0}')")]
    NotAtReview(SetupStep),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyDraft {
    pub name: String,
    pub industry: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDraft {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitorDraft {
    pub name: String,
    pub website: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IcpDraft {
    pub vertical: String,
    pub company_size: String,
    pub region: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaDraft {
    /// Index into the wizard's ICP list this persona belongs to.
    pub icp_index: usize,
    pub title: String,
    pub seniority: String,
    pub department: String,
}

/// Payload for one `advance` call, tagged with the step it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "step", content = "data", rename_all = "snake_case")]
pub enum StepInput {
    Company(CompanyDraft),
    Products(Vec<ProductDraft>),
    Competitors(Vec<CompetitorDraft>),
    Icps(Vec<IcpDraft>),
    Personas(Vec<PersonaDraft>),
}

impl StepInput {
    fn step(&self) -> SetupStep {
        match self {
            StepInput::Company(_) => SetupStep::Company,
            StepInput::Products(_) => SetupStep::Products,
            StepInput::Competitors(_) => SetupStep::Competitors,
            StepInput::Icps(_) => SetupStep::Icps,
            StepInput::Personas(_) => SetupStep::Personas,
        }
    }
}

/// The serializable wizard state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupWizard {
    pub step: SetupStep,
    pub company: Option<CompanyDraft>,
    pub products: Vec<ProductDraft>,
    pub competitors: Vec<CompetitorDraft>,
    pub icps: Vec<IcpDraft>,
    pub personas: Vec<PersonaDraft>,
}

impl Default for SetupWizard {
    fn default() -> Self {
        Self::new()
    }
}

impl SetupWizard {
    #[must_use]
    pub fn new() -> Self {
        Self {
            step: SetupStep::Company,
            company: None,
            products: Vec::new(),
            competitors: Vec::new(),
            icps: Vec::new(),
            personas: Vec::new(),
        }
    }

    /// Validate the payload for the current step, store it, and advance.
    ///
    /// Returns the new step. On any error the machine state is unchanged.
    ///
    /// # Errors
    ///
    /// [`WizardError::StepMismatch`] if the payload is for a different step,
    /// [`WizardError::Validation`] if the payload fails its field rules, and
    /// [`WizardError::NotAtReview`] when called at Review or Done (Review
    /// exits via submission, not `advance`).
    pub fn advance(&mut self, input: StepInput) -> Result<SetupStep, WizardError> {
        if matches!(self.step, SetupStep::Review | SetupStep::Done) {
            return Err(WizardError::NotAtReview(self.step));
        }
        if input.step() != self.step {
            return Err(WizardError::StepMismatch {
                at: self.step,
                got: input.step(),
            });
        }

        match input {
            StepInput::Company(company) => {
                validate_company(&company)?;
                self.company = Some(company);
                self.step = SetupStep::Products;
            }
            StepInput::Products(products) => {
                validate_products(&products)?;
                self.products = products;
                self.step = SetupStep::Competitors;
            }
            StepInput::Competitors(competitors) => {
                validate_competitors(&competitors)?;
                self.competitors = competitors;
                self.step = SetupStep::Icps;
            }
            StepInput::Icps(icps) => {
                validate_icps(&icps)?;
                self.icps = icps;
                self.step = SetupStep::Personas;
            }
            StepInput::Personas(personas) => {
                validate_personas(&personas, self.icps.len())?;
                self.personas = personas;
                self.step = SetupStep::Review;
            }
        }
        Ok(self.step)
    }

    /// Step back one state, keeping every draft intact.
    ///
    /// # Errors
    ///
    /// [`WizardError::CannotGoBack`] at Company (nothing before it) or Done
    /// (the session is already submitted).
    pub fn back(&mut self) -> Result<SetupStep, WizardError> {
        self.step = match self.step {
            SetupStep::Company | SetupStep::Done => {
                return Err(WizardError::CannotGoBack(self.step))
            }
            SetupStep::Products => SetupStep::Company,
            SetupStep::Competitors => SetupStep::Products,
            SetupStep::Icps => SetupStep::Competitors,
            SetupStep::Personas => SetupStep::Icps,
            SetupStep::Review => SetupStep::Personas,
        };
        Ok(self.step)
    }

    /// Finalize the wizard at Review: re-validate everything, move to Done,
    /// and hand back the plan to persist.
    ///
    /// # Errors
    ///
    /// [`WizardError::NotAtReview`] away from Review, or
    /// [`WizardError::Validation`] if a draft was left inconsistent.
    pub fn finish(&mut self) -> Result<SetupPlan, WizardError> {
        if self.step != SetupStep::Review {
            return Err(WizardError::NotAtReview(self.step));
        }
        let plan = self.build_plan()?;
        validate_plan(&plan)?;
        self.step = SetupStep::Done;
        Ok(plan)
    }

    fn build_plan(&self) -> Result<SetupPlan, WizardError> {
        let company = self
            .company
            .clone()
            .ok_or_else(|| WizardError::Validation("company step was never completed".into()))?;

        let mut icps: Vec<IcpPlan> = self
            .icps
            .iter()
            .map(|icp| IcpPlan {
                vertical: icp.vertical.clone(),
                company_size: icp.company_size.clone(),
                region: icp.region.clone(),
                personas: Vec::new(),
            })
            .collect();
        for persona in &self.personas {
            let icp = icps.get_mut(persona.icp_index).ok_or_else(|| {
                WizardError::Validation(format!(
                    "persona '{}' references icp index {} but only {} icps exist",
                    persona.title,
                    persona.icp_index,
                    self.icps.len()
                ))
            })?;
            icp.personas.push(PersonaPlan {
                title: persona.title.clone(),
                seniority: persona.seniority.clone(),
                department: persona.department.clone(),
            });
        }

        Ok(SetupPlan {
            company,
            products: self.products.clone(),
            competitors: self.competitors.clone(),
            icps,
        })
    }
}

/// A validated, submission-ready setup: the shape the persistence layer
/// writes in one transaction. Also the schema of the CLI seed YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupPlan {
    pub company: CompanyDraft,
    #[serde(default)]
    pub products: Vec<ProductDraft>,
    #[serde(default)]
    pub competitors: Vec<CompetitorDraft>,
    #[serde(default)]
    pub icps: Vec<IcpPlan>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IcpPlan {
    pub vertical: String,
    pub company_size: String,
    pub region: String,
    #[serde(default)]
    pub personas: Vec<PersonaPlan>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaPlan {
    pub title: String,
    pub seniority: String,
    pub department: String,
}

fn require_non_empty(what: &str, value: &str) -> Result<(), WizardError> {
    if value.trim().is_empty() {
        Err(WizardError::Validation(format!("{what} must be non-empty")))
    } else {
        Ok(())
    }
}

fn validate_company(company: &CompanyDraft) -> Result<(), WizardError> {
    require_non_empty("company name", &company.name)
}

fn validate_products(products: &[ProductDraft]) -> Result<(), WizardError> {
    for product in products {
        require_non_empty("product name", &product.name)?;
    }
    Ok(())
}

fn validate_competitors(competitors: &[CompetitorDraft]) -> Result<(), WizardError> {
    for competitor in competitors {
        require_non_empty("competitor name", &competitor.name)?;
    }
    Ok(())
}

fn validate_icps(icps: &[IcpDraft]) -> Result<(), WizardError> {
    for icp in icps {
        require_non_empty("icp vertical", &icp.vertical)?;
        require_non_empty("icp company_size", &icp.company_size)?;
        require_non_empty("icp region", &icp.region)?;
    }
    Ok(())
}

fn validate_personas(personas: &[PersonaDraft], icp_count: usize) -> Result<(), WizardError> {
    for persona in personas {
        require_non_empty("persona title", &persona.title)?;
        require_non_empty("persona seniority", &persona.seniority)?;
        require_non_empty("persona department", &persona.department)?;
        if persona.icp_index >= icp_count {
            return Err(WizardError::Validation(format!(
                "persona '{}' references icp index {} but only {icp_count} icps exist",
                persona.title, persona.icp_index
            )));
        }
    }
    Ok(())
}

/// Validate a full plan (used both by `finish` and by the YAML seed path so
/// both entry points share one set of rules).
pub fn validate_plan(plan: &SetupPlan) -> Result<(), WizardError> {
    validate_company(&plan.company)?;
    validate_products(&plan.products)?;
    validate_competitors(&plan.competitors)?;
    for icp in &plan.icps {
        require_non_empty("icp vertical", &icp.vertical)?;
        require_non_empty("icp company_size", &icp.company_size)?;
        require_non_empty("icp region", &icp.region)?;
        for persona in &icp.personas {
            require_non_empty("persona title", &persona.title)?;
            require_non_empty("persona seniority", &persona.seniority)?;
            require_non_empty("persona department", &persona.department)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn company() -> CompanyDraft {
        CompanyDraft {
            name: "Acme".to_string(),
            industry: Some("Analytics".to_string()),
        }
    }

    fn complete_wizard() -> SetupWizard {
        let mut wizard = SetupWizard::new();
        wizard.advance(StepInput::Company(company())).unwrap();
        wizard
            .advance(StepInput::Products(vec![ProductDraft {
                name: "Acme One".to_string(),
                description: None,
            }]))
            .unwrap();
        wizard
            .advance(StepInput::Competitors(vec![CompetitorDraft {
                name: "Globex".to_string(),
                website: Some("https://globex.example.com".to_string()),
            }]))
            .unwrap();
        wizard
            .advance(StepInput::Icps(vec![IcpDraft {
                vertical: "SaaS".to_string(),
                company_size: "51-200".to_string(),
                region: "North America".to_string(),
            }]))
            .unwrap();
        wizard
            .advance(StepInput::Personas(vec![PersonaDraft {
                icp_index: 0,
                title: "Head of Marketing".to_string(),
                seniority: "Director".to_string(),
                department: "Marketing".to_string(),
            }]))
            .unwrap();
        wizard
    }

    #[test]
    fn happy_path_walks_every_step_to_review() {
        let wizard = complete_wizard();
        assert_eq!(wizard.step, SetupStep::Review);
    }

    #[test]
    fn wrong_step_payload_is_rejected_without_state_change() {
        let mut wizard = SetupWizard::new();
        let err = wizard.advance(StepInput::Products(vec![])).unwrap_err();
        assert!(matches!(
            err,
            WizardError::StepMismatch {
                at: SetupStep::Company,
                got: SetupStep::Products
            }
        ));
        assert_eq!(wizard.step, SetupStep::Company);
    }

    #[test]
    fn empty_company_name_fails_validation_and_holds_position() {
        let mut wizard = SetupWizard::new();
        let err = wizard
            .advance(StepInput::Company(CompanyDraft {
                name: "   ".to_string(),
                industry: None,
            }))
            .unwrap_err();
        assert!(matches!(err, WizardError::Validation(_)));
        assert_eq!(wizard.step, SetupStep::Company);
        assert!(wizard.company.is_none());
    }

    #[test]
    fn persona_with_out_of_range_icp_index_is_rejected() {
        let mut wizard = SetupWizard::new();
        wizard.advance(StepInput::Company(company())).unwrap();
        wizard.advance(StepInput::Products(vec![])).unwrap();
        wizard.advance(StepInput::Competitors(vec![])).unwrap();
        wizard.advance(StepInput::Icps(vec![])).unwrap();
        let err = wizard
            .advance(StepInput::Personas(vec![PersonaDraft {
                icp_index: 0,
                title: "CTO".to_string(),
                seniority: "Executive".to_string(),
                department: "Engineering".to_string(),
            }]))
            .unwrap_err();
        assert!(matches!(err, WizardError::Validation(_)));
        assert_eq!(wizard.step, SetupStep::Personas);
    }

    #[test]
    fn back_retraces_steps_and_keeps_drafts() {
        let mut wizard = complete_wizard();
        assert_eq!(wizard.back().unwrap(), SetupStep::Personas);
        assert_eq!(wizard.back().unwrap(), SetupStep::Icps);
        assert_eq!(wizard.products.len(), 1);
        assert_eq!(wizard.personas.len(), 1);
    }

    #[test]
    fn back_is_rejected_at_the_first_step() {
        let mut wizard = SetupWizard::new();
        assert!(matches!(
            wizard.back(),
            Err(WizardError::CannotGoBack(SetupStep::Company))
        ));
    }

    #[test]
    fn finish_requires_the_review_step() {
        let mut wizard = SetupWizard::new();
        assert!(matches!(
            wizard.finish(),
            Err(WizardError::NotAtReview(SetupStep::Company))
        ));
    }

    #[test]
    fn finish_builds_a_plan_grouping_personas_under_their_icp() {
        let mut wizard = complete_wizard();
        let plan = wizard.finish().unwrap();
        assert_eq!(wizard.step, SetupStep::Done);
        assert_eq!(plan.company.name, "Acme");
        assert_eq!(plan.icps.len(), 1);
        assert_eq!(plan.icps[0].personas.len(), 1);
        assert_eq!(plan.icps[0].personas[0].title, "Head of Marketing");
    }

    #[test]
    fn finished_wizard_rejects_further_transitions() {
        let mut wizard = complete_wizard();
        wizard.finish().unwrap();
        assert!(matches!(
            wizard.advance(StepInput::Company(company())),
            Err(WizardError::NotAtReview(SetupStep::Done))
        ));
        assert!(matches!(
            wizard.back(),
            Err(WizardError::CannotGoBack(SetupStep::Done))
        ));
    }

    #[test]
    fn wizard_state_round_trips_through_json() {
        let wizard = complete_wizard();
        let json = serde_json::to_value(&wizard).expect("serialize");
        assert_eq!(json["step"], "review");
        let restored: SetupWizard = serde_json::from_value(json).expect("deserialize");
        assert_eq!(restored.step, SetupStep::Review);
        assert_eq!(restored.competitors[0].name, "Globex");
    }

    #[test]
    fn step_input_json_shape_is_tagged_by_step() {
        let input: StepInput = serde_json::from_value(serde_json::json!({
            "step": "company",
            "data": {"name": "Acme", "industry": null}
        }))
        .expect("deserialize step input");
        assert!(matches!(input, StepInput::Company(_)));
    }
}
