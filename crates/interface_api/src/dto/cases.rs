//! Dispute case DTOs
//!
//! Amounts travel as integer cents.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use core_kernel::Money;
use domain_dispute::lifecycle::allowed_actions;
use domain_dispute::{
    AnchorEventKind, Case, CaseAction, CaseDocument, Classification, ClaimRecord, ConsentStatus, ContractTerms,
    Deadline, DeadlineStatus, DisputeError, DisputePath, FacilityType, FactModel, HistoryEntry, NetworkStatus,
    PlanType, RemitRecord, Venue,
};

/// Claim, remittance and contract facts for classification or case creation
#[derive(Debug, Deserialize, Validate)]
pub struct FactsRequest {
    #[validate(nested)]
    pub claim: ClaimInput,
    #[validate(nested)]
    pub remit: RemitInput,
    #[validate(nested)]
    pub contract: Option<ContractInput>,
    #[serde(default)]
    pub negotiation: Option<NegotiationInput>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ClaimInput {
    #[validate(length(min = 1, max = 64))]
    pub claim_id: String,
    #[serde(default)]
    pub patient_ref: String,
    #[validate(length(min = 1, max = 16))]
    pub procedure_code: String,
    #[serde(default)]
    pub procedure_category: String,
    pub date_of_service: NaiveDate,
    #[validate(length(min = 1))]
    pub payer_name: String,
    pub plan_type: PlanType,
    pub network_status: NetworkStatus,
    pub facility_type: FacilityType,
    pub facility_in_network: bool,
    #[serde(default)]
    pub is_emergency: bool,
    pub notice_and_consent: ConsentStatus,
    #[validate(range(min = 0))]
    pub billed_cents: i64,
    /// Two-letter state code; empty when unknown
    #[serde(default)]
    #[validate(length(max = 2))]
    pub jurisdiction: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RemitInput {
    #[validate(range(min = 0))]
    pub allowed_cents: Option<i64>,
    #[validate(range(min = 0))]
    pub paid_cents: i64,
    pub received_on: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ContractInput {
    #[validate(range(min = 0))]
    pub contracted_rate_cents: i64,
}

/// Open negotiation progress already known at intake
#[derive(Debug, Deserialize)]
pub struct NegotiationInput {
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub agreement_reached: bool,
}

impl FactsRequest {
    /// Assembles the fact model
    pub fn into_facts(self) -> Result<FactModel, DisputeError> {
        let claim = ClaimRecord {
            claim_id: self.claim.claim_id,
            patient_ref: self.claim.patient_ref,
            procedure_code: self.claim.procedure_code,
            procedure_category: self.claim.procedure_category,
            date_of_service: self.claim.date_of_service,
            payer_name: self.claim.payer_name,
            plan_type: self.claim.plan_type,
            network_status: self.claim.network_status,
            facility_type: self.claim.facility_type,
            facility_in_network: self.claim.facility_in_network,
            is_emergency: self.claim.is_emergency,
            notice_and_consent: self.claim.notice_and_consent,
            billed: Money::usd(self.claim.billed_cents),
            jurisdiction: self.claim.jurisdiction.to_ascii_uppercase(),
        };
        let remit = RemitRecord {
            allowed: self.remit.allowed_cents.map(Money::usd),
            paid: Money::usd(self.remit.paid_cents),
            received_on: self.remit.received_on,
        };
        let contract = self.contract.map(|c| ContractTerms {
            contracted_rate: Money::usd(c.contracted_rate_cents),
        });

        let mut facts = FactModel::from_sources(claim, remit, contract)?;
        if let Some(negotiation) = self.negotiation {
            if let Some(started_at) = negotiation.started_at {
                facts = facts.with_negotiation_started(started_at);
            }
            if let Some(ended_at) = negotiation.ended_at {
                facts = facts.with_negotiation_ended(ended_at, negotiation.agreement_reached);
            }
            facts.validate()?;
        }
        Ok(facts)
    }
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub action: CaseAction,
}

#[derive(Debug, Deserialize)]
pub struct CorrectAnchorRequest {
    pub anchor: AnchorEventKind,
    pub corrected_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeadlinesQuery {
    /// Evaluate urgency at this instant instead of now
    pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct ClassificationResponse {
    pub venue: Venue,
    pub venue_name: &'static str,
    pub path: DisputePath,
    pub reasons: Vec<String>,
    pub indeterminate: bool,
}

impl From<Classification> for ClassificationResponse {
    fn from(classification: Classification) -> Self {
        Self {
            venue: classification.venue,
            venue_name: classification.venue.display_name(),
            path: classification.venue.path(),
            reasons: classification.reasons,
            indeterminate: classification.indeterminate,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CaseResponse {
    pub id: Uuid,
    pub version: u64,
    pub claim_id: String,
    pub status: String,
    pub venue: Venue,
    pub path: DisputePath,
    pub eligibility_reasons: Vec<String>,
    pub classification_indeterminate: bool,
    pub allowed_actions: Vec<CaseAction>,
    pub deadlines: Vec<Deadline>,
    pub documents: Vec<CaseDocument>,
    pub history: Vec<HistoryEntry>,
    pub appeal_reentries: u32,
    pub opened_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Case> for CaseResponse {
    fn from(case: &Case) -> Self {
        Self {
            id: case.id().into(),
            version: case.version(),
            claim_id: case.facts().claim_id().to_string(),
            status: case.status().as_str().to_string(),
            venue: case.venue(),
            path: case.path(),
            eligibility_reasons: case.eligibility_reasons().to_vec(),
            classification_indeterminate: case.is_classification_indeterminate(),
            allowed_actions: allowed_actions(case.status(), case.path()),
            deadlines: case.latest_deadlines().into_iter().cloned().collect(),
            documents: case.documents().to_vec(),
            history: case.history().to_vec(),
            appeal_reentries: case.appeal_reentries(),
            opened_at: case.opened_at(),
            updated_at: case.updated_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeadlinesResponse {
    pub case_id: Uuid,
    pub evaluated_at: DateTime<Utc>,
    pub deadlines: Vec<DeadlineStatus>,
}
