//! Eligibility classification
//!
//! Maps a [`FactModel`] to the dispute venue that applies and an ordered list
//! of human-readable reasons. Rules are evaluated in a fixed order and the
//! first one that decides the venue wins:
//!
//! ```text
//! 0. insufficient data            -> AppealOnly (indeterminate)
//! 1. in-network underpayment      -> AppealOnly
//! 2. out-of-network surprise bill -> OpenNegotiationRequired | FederalIDR | StateIDR
//! 3. everything else              -> AppealOnly
//! ```
//!
//! Classification is total: every well-formed fact model yields a result.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::facts::{ConsentStatus, FactModel, NetworkStatus, PlanType};

pub const REASON_INSUFFICIENT_DATA: &str = "insufficient data — defaulting to most conservative path";
pub const REASON_IN_NETWORK_RATE: &str = "contracted in-network rate dispute";
pub const REASON_INTERNAL_APPEAL_FIRST: &str = "internal payer appeal required before external options";
pub const REASON_NOT_ELIGIBLE: &str = "plan type and service not eligible for federal or state IDR";
pub const REASON_SETTLED: &str = "open negotiation settled by agreement; no external venue remains";
pub const REASON_NEGOTIATION_PENDING: &str = "open negotiation has not concluded";
pub const REASON_NEGOTIATION_FAILED: &str = "open negotiation concluded without agreement";

/// Forum in which a dispute is pursued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Venue {
    #[serde(rename = "FederalIDR")]
    FederalIdr,
    #[serde(rename = "StateIDR")]
    StateIdr,
    AppealOnly,
    OpenNegotiationRequired,
}

impl Venue {
    pub fn as_str(&self) -> &'static str {
        match self {
            Venue::FederalIdr => "FederalIDR",
            Venue::StateIdr => "StateIDR",
            Venue::AppealOnly => "AppealOnly",
            Venue::OpenNegotiationRequired => "OpenNegotiationRequired",
        }
    }

    /// Label used in correspondence
    pub fn display_name(&self) -> &'static str {
        match self {
            Venue::FederalIdr => "Federal Independent Dispute Resolution",
            Venue::StateIdr => "State Independent Dispute Resolution",
            Venue::AppealOnly => "Payer Appeal",
            Venue::OpenNegotiationRequired => "Open Negotiation",
        }
    }

    /// Procedural path the venue belongs to
    pub fn path(&self) -> DisputePath {
        match self {
            Venue::AppealOnly => DisputePath::Appeal,
            Venue::FederalIdr | Venue::StateIdr | Venue::OpenNegotiationRequired => DisputePath::Nsa,
        }
    }

    pub fn is_idr(&self) -> bool {
        matches!(self, Venue::FederalIdr | Venue::StateIdr)
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// No Surprises Act path or payer appeal path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisputePath {
    #[serde(rename = "NSA")]
    Nsa,
    Appeal,
}

impl fmt::Display for DisputePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisputePath::Nsa => f.write_str("NSA"),
            DisputePath::Appeal => f.write_str("Appeal"),
        }
    }
}

/// Venue determination with its explanation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub venue: Venue,
    pub reasons: Vec<String>,
    /// Set when the facts could not support a decision
    #[serde(default)]
    pub indeterminate: bool,
}

impl Classification {
    fn decided(venue: Venue, reasons: Vec<String>) -> Self {
        Self {
            venue,
            reasons,
            indeterminate: false,
        }
    }

    fn indeterminate(mut reasons: Vec<String>) -> Self {
        reasons.push(REASON_INSUFFICIENT_DATA.to_string());
        Self {
            venue: Venue::AppealOnly,
            reasons,
            indeterminate: true,
        }
    }

    pub fn path(&self) -> DisputePath {
        self.venue.path()
    }
}

/// Whether patient consent can waive surprise-billing protections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConsentWaiver {
    Waivable,
    NotWaivable,
}

/// Consent as it bears on eligibility
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectiveConsent {
    Obtained,
    NotObtained,
    NonFactor,
}

/// Declarative consent rule table keyed by procedure category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRules {
    #[serde(default)]
    pub categories: BTreeMap<String, ConsentWaiver>,
    #[serde(default = "default_waiver")]
    pub default: ConsentWaiver,
}

fn default_waiver() -> ConsentWaiver {
    ConsentWaiver::Waivable
}

impl Default for ConsentRules {
    /// Ancillary services cannot be waived by notice and consent
    fn default() -> Self {
        let categories = [
            "anesthesiology",
            "assistant-surgeon",
            "diagnostic-laboratory",
            "diagnostic-radiology",
            "emergency-medicine",
            "hospitalist",
            "intensivist",
            "neonatology",
            "pathology",
            "radiology",
        ]
        .into_iter()
        .map(|c| (c.to_string(), ConsentWaiver::NotWaivable))
        .collect();

        Self {
            categories,
            default: ConsentWaiver::Waivable,
        }
    }
}

impl ConsentRules {
    pub fn waiver_for(&self, category: &str) -> ConsentWaiver {
        self.categories
            .get(&category.to_ascii_lowercase())
            .copied()
            .unwrap_or(self.default)
    }

    /// Resolves the recorded consent status for a procedure category
    pub fn effective_consent(&self, category: &str, status: ConsentStatus) -> EffectiveConsent {
        match self.waiver_for(category) {
            ConsentWaiver::NotWaivable => EffectiveConsent::NonFactor,
            ConsentWaiver::Waivable => match status {
                ConsentStatus::Obtained => EffectiveConsent::Obtained,
                ConsentStatus::NotObtained | ConsentStatus::NotApplicable => EffectiveConsent::NotObtained,
            },
        }
    }
}

/// States operating a certified IDR program, with the plan types it covers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateIdrRegistry {
    programs: BTreeMap<String, BTreeSet<PlanType>>,
}

impl Default for StateIdrRegistry {
    fn default() -> Self {
        let fully_insured = || BTreeSet::from([PlanType::FullyInsured]);
        let programs = ["CT", "GA", "ME", "NJ", "NM", "NY", "OH", "TX", "VA", "WA"]
            .into_iter()
            .map(|state| (state.to_string(), fully_insured()))
            .collect();
        Self { programs }
    }
}

impl StateIdrRegistry {
    pub fn empty() -> Self {
        Self {
            programs: BTreeMap::new(),
        }
    }

    pub fn with_program(mut self, jurisdiction: &str, plans: impl IntoIterator<Item = PlanType>) -> Self {
        self.programs
            .entry(jurisdiction.to_ascii_uppercase())
            .or_default()
            .extend(plans);
        self
    }

    pub fn is_certified(&self, jurisdiction: &str, plan_type: PlanType) -> bool {
        self.programs
            .get(jurisdiction)
            .is_some_and(|plans| plans.contains(&plan_type))
    }
}

/// Configured eligibility classifier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityClassifier {
    #[serde(default)]
    pub consent_rules: ConsentRules,
    #[serde(default)]
    pub state_programs: StateIdrRegistry,
    /// Jurisdictions offering external review for in-network rate disputes
    #[serde(default)]
    pub in_network_external_review: BTreeSet<String>,
}

impl EligibilityClassifier {
    pub fn new(consent_rules: ConsentRules, state_programs: StateIdrRegistry) -> Self {
        Self {
            consent_rules,
            state_programs,
            in_network_external_review: BTreeSet::new(),
        }
    }

    /// Determines the venue for a fact model
    pub fn classify(&self, facts: &FactModel) -> Classification {
        let classification = match insufficiency(facts) {
            Some(gap) => Classification::indeterminate(vec![gap]),
            None => match facts.network_status() {
                NetworkStatus::InNetwork => self.classify_in_network(facts),
                NetworkStatus::OutOfNetwork => self.classify_out_of_network(facts),
            },
        };

        debug!(
            claim_id = %facts.claim_id(),
            venue = %classification.venue,
            indeterminate = classification.indeterminate,
            reasons = classification.reasons.len(),
            "Claim classified"
        );

        classification
    }

    fn classify_in_network(&self, facts: &FactModel) -> Classification {
        let mut reasons = Vec::new();
        let underpaid = facts
            .disputed_amount()
            .is_some_and(|shortfall| shortfall.is_positive());

        if underpaid {
            reasons.push(REASON_IN_NETWORK_RATE.to_string());
            if !self.in_network_external_review.contains(facts.jurisdiction()) {
                reasons.push(REASON_INTERNAL_APPEAL_FIRST.to_string());
            }
        } else {
            reasons.push("paid amount meets or exceeds the expected amount".to_string());
            reasons.push(REASON_NOT_ELIGIBLE.to_string());
        }
        Classification::decided(Venue::AppealOnly, reasons)
    }

    fn classify_out_of_network(&self, facts: &FactModel) -> Classification {
        let mut reasons = Vec::new();

        if !self.is_surprise_bill(facts, &mut reasons) {
            reasons.push(REASON_NOT_ELIGIBLE.to_string());
            return Classification::decided(Venue::AppealOnly, reasons);
        }

        let jurisdiction = facts.jurisdiction();
        let plan = facts.plan_type();
        let candidate = if self.state_programs.is_certified(jurisdiction, plan) {
            reasons.push(format!(
                "{} operates a certified state IDR program for {} plans",
                jurisdiction,
                plan.display_name()
            ));
            Venue::StateIdr
        } else {
            reasons.push(format!(
                "no certified state IDR program in {} for {} plans; federal IDR applies",
                jurisdiction,
                plan.display_name()
            ));
            Venue::FederalIdr
        };

        match facts.negotiation().ended {
            None => {
                reasons.push(REASON_NEGOTIATION_PENDING.to_string());
                Classification::decided(Venue::OpenNegotiationRequired, reasons)
            }
            Some(end) if end.agreement_reached => {
                reasons.push(REASON_SETTLED.to_string());
                Classification::decided(Venue::AppealOnly, reasons)
            }
            Some(_) => {
                reasons.push(REASON_NEGOTIATION_FAILED.to_string());
                Classification::decided(candidate, reasons)
            }
        }
    }

    /// Surprise-billing criteria; pushes the deciding reason either way
    fn is_surprise_bill(&self, facts: &FactModel, reasons: &mut Vec<String>) -> bool {
        if facts.is_emergency() {
            reasons.push("emergency service".to_string());
            return false;
        }
        if !facts.facility().in_network {
            reasons.push("service rendered at an out-of-network facility".to_string());
            return false;
        }
        let plan = facts.plan_type();
        if !plan.is_group_or_individual_commercial() {
            reasons.push(format!("{} plans are outside the surprise-billing protections", plan.display_name()));
            return false;
        }

        let category = facts.procedure_category();
        match self
            .consent_rules
            .effective_consent(category, facts.notice_and_consent())
        {
            EffectiveConsent::Obtained => {
                reasons.push(format!("notice and consent obtained for {} services", category));
                return false;
            }
            EffectiveConsent::NotObtained => {
                reasons.push("notice and consent not obtained".to_string());
            }
            EffectiveConsent::NonFactor => {
                reasons.push(format!("notice and consent cannot waive protections for {} services", category));
            }
        }

        reasons.push(format!(
            "out-of-network non-emergency service at an in-network facility under a {} plan",
            plan.display_name()
        ));
        true
    }
}

/// Rule 0: facts too thin to decide anything but the conservative path
fn insufficiency(facts: &FactModel) -> Option<String> {
    if facts.jurisdiction().is_empty() {
        return Some("jurisdiction unknown".to_string());
    }
    if facts.network_status() == NetworkStatus::InNetwork {
        match facts.expected_amount() {
            None => return Some("no contracted rate or allowed amount on file".to_string()),
            Some(expected) if expected.currency() != facts.financials().paid.currency() => {
                return Some("paid and expected amounts are in different currencies".to_string())
            }
            Some(_) => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::{FacilityType, FactModelBuilder};
    use chrono::{NaiveDate, TimeZone, Utc};
    use core_kernel::Money;

    fn surprise_bill() -> FactModelBuilder {
        FactModelBuilder::new("CLM-9")
            .patient_ref("PT-9")
            .procedure("64483", "interventional-pain")
            .date_of_service(NaiveDate::from_ymd_opt(2024, 4, 2).unwrap())
            .payer("Acme Health", PlanType::SelfFundedErisa)
            .network_status(NetworkStatus::OutOfNetwork)
            .facility(FacilityType::AmbulatorySurgicalCenter, true)
            .notice_and_consent(ConsentStatus::NotObtained)
            .billed(Money::usd(480000))
            .allowed(Money::usd(90000))
            .paid(Money::usd(90000))
            .jurisdiction("PA")
    }

    #[test]
    fn test_negotiation_pending_is_pre_venue() {
        let result = EligibilityClassifier::default().classify(&surprise_bill().build().unwrap());
        assert_eq!(result.venue, Venue::OpenNegotiationRequired);
        assert_eq!(result.path(), DisputePath::Nsa);
        assert_eq!(result.reasons.last().map(String::as_str), Some(REASON_NEGOTIATION_PENDING));
    }

    #[test]
    fn test_state_program_selects_state_idr() {
        let ended = Utc.with_ymd_and_hms(2024, 6, 3, 15, 0, 0).unwrap();
        let facts = surprise_bill()
            .payer("Empire Plan", PlanType::FullyInsured)
            .jurisdiction("NY")
            .negotiation_ended(ended, false)
            .build()
            .unwrap();
        assert_eq!(EligibilityClassifier::default().classify(&facts).venue, Venue::StateIdr);
    }

    #[test]
    fn test_settled_negotiation_leaves_appeal_only() {
        let ended = Utc.with_ymd_and_hms(2024, 6, 3, 15, 0, 0).unwrap();
        let facts = surprise_bill().negotiation_ended(ended, true).build().unwrap();
        let result = EligibilityClassifier::default().classify(&facts);
        assert_eq!(result.venue, Venue::AppealOnly);
        assert_eq!(result.reasons.last().map(String::as_str), Some(REASON_SETTLED));
    }

    #[test]
    fn test_not_applicable_consent_depends_on_category() {
        let rules = ConsentRules::default();
        assert_eq!(
            rules.effective_consent("surgery", ConsentStatus::NotApplicable),
            EffectiveConsent::NotObtained
        );
        assert_eq!(
            rules.effective_consent("Anesthesiology", ConsentStatus::Obtained),
            EffectiveConsent::NonFactor
        );
    }

    #[test]
    fn test_consent_obtained_blocks_idr() {
        let facts = surprise_bill()
            .notice_and_consent(ConsentStatus::Obtained)
            .build()
            .unwrap();
        let result = EligibilityClassifier::default().classify(&facts);
        assert_eq!(result.venue, Venue::AppealOnly);
        assert_eq!(result.reasons.last().map(String::as_str), Some(REASON_NOT_ELIGIBLE));
    }

    #[test]
    fn test_ancillary_service_ignores_consent() {
        let facts = surprise_bill()
            .procedure("01400", "anesthesiology")
            .notice_and_consent(ConsentStatus::Obtained)
            .build()
            .unwrap();
        let result = EligibilityClassifier::default().classify(&facts);
        assert_eq!(result.venue, Venue::OpenNegotiationRequired);
    }

    #[test]
    fn test_medicare_is_not_eligible() {
        let facts = surprise_bill().payer("CMS", PlanType::Medicare).build().unwrap();
        let result = EligibilityClassifier::default().classify(&facts);
        assert_eq!(result.venue, Venue::AppealOnly);
        assert!(!result.indeterminate);
    }

    #[test]
    fn test_in_network_without_expected_amount_is_indeterminate() {
        let facts = FactModelBuilder::new("CLM-10")
            .date_of_service(NaiveDate::from_ymd_opt(2024, 4, 2).unwrap())
            .payer("Acme Health", PlanType::FullyInsured)
            .network_status(NetworkStatus::InNetwork)
            .billed(Money::usd(10000))
            .paid(Money::usd(2000))
            .jurisdiction("OH")
            .build()
            .unwrap();
        let result = EligibilityClassifier::default().classify(&facts);
        assert!(result.indeterminate);
        assert_eq!(result.venue, Venue::AppealOnly);
    }

    #[test]
    fn test_missing_jurisdiction_is_indeterminate() {
        let facts = surprise_bill().jurisdiction("").build().unwrap();
        let result = EligibilityClassifier::default().classify(&facts);
        assert_eq!(result.venue, Venue::AppealOnly);
        assert!(result.indeterminate);
        assert_eq!(result.reasons.last().map(String::as_str), Some(REASON_INSUFFICIENT_DATA));
    }

    #[test]
    fn test_in_network_external_review_drops_internal_appeal_reason() {
        let facts = surprise_bill()
            .network_status(NetworkStatus::InNetwork)
            .contracted_rate(Money::usd(300000))
            .paid(Money::usd(115000))
            .jurisdiction("CA")
            .build()
            .unwrap();

        let default = EligibilityClassifier::default().classify(&facts);
        assert_eq!(default.reasons, vec![REASON_IN_NETWORK_RATE, REASON_INTERNAL_APPEAL_FIRST]);

        let mut classifier = EligibilityClassifier::default();
        classifier.in_network_external_review.insert("CA".to_string());
        assert_eq!(classifier.classify(&facts).reasons, vec![REASON_IN_NETWORK_RATE]);
    }

    #[test]
    fn test_registry_deserializes_from_map() {
        let registry: StateIdrRegistry =
            serde_json::from_str(r#"{"NM": ["fully-insured", "self-funded-erisa"]}"#).unwrap();
        assert!(registry.is_certified("NM", PlanType::SelfFundedErisa));
        assert!(!registry.is_certified("NY", PlanType::FullyInsured));
    }
}
