//! Claim fact model
//!
//! A [`FactModel`] is the immutable snapshot of everything the engine knows
//! about a disputed claim: who paid what, under which plan, for which service,
//! and where open negotiation stands. Classification, deadline anchoring and
//! correspondence binding all read from it; nothing writes to it after
//! construction except the explicit negotiation amendment, which produces a
//! new snapshot instead of mutating the old one.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{Currency, Money};

use crate::error::DisputeError;

/// Health plan funding arrangement
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PlanType {
    #[serde(rename = "self-funded-erisa", alias = "self-funded-ERISA")]
    SelfFundedErisa,
    #[serde(rename = "fully-insured")]
    FullyInsured,
    #[serde(rename = "medicare", alias = "Medicare")]
    Medicare,
    #[serde(rename = "medicaid", alias = "Medicaid")]
    Medicaid,
    #[serde(rename = "other")]
    Other,
}

impl PlanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::SelfFundedErisa => "self-funded-erisa",
            PlanType::FullyInsured => "fully-insured",
            PlanType::Medicare => "medicare",
            PlanType::Medicaid => "medicaid",
            PlanType::Other => "other",
        }
    }

    /// Returns the label used in correspondence
    pub fn display_name(&self) -> &'static str {
        match self {
            PlanType::SelfFundedErisa => "self-funded ERISA",
            PlanType::FullyInsured => "fully insured",
            PlanType::Medicare => "Medicare",
            PlanType::Medicaid => "Medicaid",
            PlanType::Other => "other",
        }
    }

    /// Plans subject to the federal surprise-billing protections
    pub fn is_group_or_individual_commercial(&self) -> bool {
        matches!(self, PlanType::SelfFundedErisa | PlanType::FullyInsured)
    }
}

impl fmt::Display for PlanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider network participation for the claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkStatus {
    InNetwork,
    OutOfNetwork,
}

impl NetworkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkStatus::InNetwork => "in-network",
            NetworkStatus::OutOfNetwork => "out-of-network",
        }
    }
}

impl fmt::Display for NetworkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Place-of-service category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FacilityType {
    Hospital,
    AmbulatorySurgicalCenter,
    FreestandingEmergency,
    PhysicianOffice,
    Other,
}

impl FacilityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FacilityType::Hospital => "hospital",
            FacilityType::AmbulatorySurgicalCenter => "ambulatory-surgical-center",
            FacilityType::FreestandingEmergency => "freestanding-emergency",
            FacilityType::PhysicianOffice => "physician-office",
            FacilityType::Other => "other",
        }
    }
}

/// Whether the patient signed the surprise-billing notice and consent form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConsentStatus {
    Obtained,
    NotObtained,
    NotApplicable,
}

impl ConsentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsentStatus::Obtained => "obtained",
            ConsentStatus::NotObtained => "not-obtained",
            ConsentStatus::NotApplicable => "not-applicable",
        }
    }
}

/// The paying health plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payer {
    pub name: String,
    pub plan_type: PlanType,
}

/// Facility where the service was rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facility {
    pub facility_type: FacilityType,
    /// Whether the facility participates in the payer's network
    pub in_network: bool,
}

/// Billed, allowed and paid amounts from the claim and its remittance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Financials {
    pub billed: Money,
    /// QPA for out-of-network claims, contracted allowable for in-network claims
    pub allowed: Option<Money>,
    pub paid: Money,
}

/// Conclusion of the open negotiation period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiationEnd {
    pub ended_at: DateTime<Utc>,
    pub agreement_reached: bool,
}

/// Open negotiation progress, the only amendable part of the facts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiationRecord {
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ended: Option<NegotiationEnd>,
}

impl NegotiationRecord {
    pub fn has_ended(&self) -> bool {
        self.ended.is_some()
    }
}

/// Immutable snapshot of a claim's financial, contractual and procedural facts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactModel {
    claim_id: String,
    patient_ref: String,
    procedure_code: String,
    procedure_category: String,
    date_of_service: NaiveDate,
    payer: Payer,
    network_status: NetworkStatus,
    facility: Facility,
    is_emergency: bool,
    notice_and_consent: ConsentStatus,
    financials: Financials,
    #[serde(default)]
    contracted_rate: Option<Money>,
    #[serde(default)]
    jurisdiction: String,
    #[serde(default)]
    remittance_received_on: Option<NaiveDate>,
    #[serde(default)]
    negotiation: NegotiationRecord,
}

impl FactModel {
    /// Assembles facts from an intake record triple
    ///
    /// # Errors
    ///
    /// Returns `DisputeError::InvalidFacts` if any amount is negative, the
    /// amounts are in different currencies, or the claim number is blank.
    pub fn from_sources(
        claim: ClaimRecord,
        remit: RemitRecord,
        contract: Option<ContractTerms>,
    ) -> Result<Self, DisputeError> {
        let mut builder = FactModelBuilder::new(claim.claim_id)
            .patient_ref(claim.patient_ref)
            .procedure(claim.procedure_code, claim.procedure_category)
            .date_of_service(claim.date_of_service)
            .payer(claim.payer_name, claim.plan_type)
            .network_status(claim.network_status)
            .facility(claim.facility_type, claim.facility_in_network)
            .emergency(claim.is_emergency)
            .notice_and_consent(claim.notice_and_consent)
            .billed(claim.billed)
            .paid(remit.paid)
            .jurisdiction(claim.jurisdiction);

        if let Some(allowed) = remit.allowed {
            builder = builder.allowed(allowed);
        }
        if let Some(received_on) = remit.received_on {
            builder = builder.remittance_received_on(received_on);
        }
        if let Some(terms) = contract {
            builder = builder.contracted_rate(terms.contracted_rate);
        }

        builder.build()
    }

    /// Checks the construction invariants on a deserialized snapshot
    pub fn validate(&self) -> Result<(), DisputeError> {
        if self.claim_id.trim().is_empty() {
            return Err(DisputeError::InvalidFacts("claim_id must not be empty".to_string()));
        }

        let currency = self.financials.billed.currency();
        let amounts = [
            ("billed", Some(self.financials.billed)),
            ("allowed", self.financials.allowed),
            ("paid", Some(self.financials.paid)),
            ("contracted_rate", self.contracted_rate),
        ];
        for (field, amount) in amounts {
            let Some(amount) = amount else { continue };
            if amount.is_negative() {
                return Err(DisputeError::InvalidFacts(format!(
                    "{} must not be negative, got {}",
                    field, amount
                )));
            }
            if amount.currency() != currency {
                return Err(DisputeError::InvalidFacts(format!(
                    "{} is in {} but billed amount is in {}",
                    field,
                    amount.currency(),
                    currency
                )));
            }
        }

        if let Some(end) = self.negotiation.ended {
            if let Some(started) = self.negotiation.started_at {
                if end.ended_at < started {
                    return Err(DisputeError::InvalidFacts(
                        "negotiation cannot end before it starts".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }

    pub fn claim_id(&self) -> &str {
        &self.claim_id
    }

    pub fn patient_ref(&self) -> &str {
        &self.patient_ref
    }

    pub fn procedure_code(&self) -> &str {
        &self.procedure_code
    }

    pub fn procedure_category(&self) -> &str {
        &self.procedure_category
    }

    pub fn date_of_service(&self) -> NaiveDate {
        self.date_of_service
    }

    pub fn payer(&self) -> &Payer {
        &self.payer
    }

    pub fn plan_type(&self) -> PlanType {
        self.payer.plan_type
    }

    pub fn network_status(&self) -> NetworkStatus {
        self.network_status
    }

    pub fn facility(&self) -> Facility {
        self.facility
    }

    pub fn is_emergency(&self) -> bool {
        self.is_emergency
    }

    pub fn notice_and_consent(&self) -> ConsentStatus {
        self.notice_and_consent
    }

    pub fn financials(&self) -> &Financials {
        &self.financials
    }

    pub fn contracted_rate(&self) -> Option<Money> {
        self.contracted_rate
    }

    /// Derived from the presence of a contracted rate
    pub fn contracted_rate_known(&self) -> bool {
        self.contracted_rate.is_some()
    }

    /// Upper-cased US state code, empty when unknown
    pub fn jurisdiction(&self) -> &str {
        &self.jurisdiction
    }

    pub fn remittance_received_on(&self) -> Option<NaiveDate> {
        self.remittance_received_on
    }

    pub fn negotiation(&self) -> &NegotiationRecord {
        &self.negotiation
    }

    pub fn currency(&self) -> Currency {
        self.financials.billed.currency()
    }

    /// Contracted rate if known, otherwise the allowed amount
    pub fn expected_amount(&self) -> Option<Money> {
        self.contracted_rate.or(self.financials.allowed)
    }

    /// Expected minus paid, floored at zero
    ///
    /// `None` when no expected amount is known or the currencies disagree.
    pub fn disputed_amount(&self) -> Option<Money> {
        let expected = self.expected_amount()?;
        self.financials.paid.shortfall_from(&expected).ok()
    }

    /// Billed minus paid, floored at zero
    pub fn unpaid_balance(&self) -> Option<Money> {
        self.financials.paid.shortfall_from(&self.financials.billed).ok()
    }

    /// Returns a new snapshot recording the start of open negotiation
    pub fn with_negotiation_started(&self, started_at: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.negotiation.started_at = Some(started_at);
        next
    }

    /// Returns a new snapshot recording the end of open negotiation
    pub fn with_negotiation_ended(&self, ended_at: DateTime<Utc>, agreement_reached: bool) -> Self {
        let mut next = self.clone();
        next.negotiation.ended = Some(NegotiationEnd {
            ended_at,
            agreement_reached,
        });
        next
    }
}

/// Claim-side intake record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub claim_id: String,
    pub patient_ref: String,
    pub procedure_code: String,
    pub procedure_category: String,
    pub date_of_service: NaiveDate,
    pub payer_name: String,
    pub plan_type: PlanType,
    pub network_status: NetworkStatus,
    pub facility_type: FacilityType,
    pub facility_in_network: bool,
    pub is_emergency: bool,
    pub notice_and_consent: ConsentStatus,
    pub billed: Money,
    #[serde(default)]
    pub jurisdiction: String,
}

/// Remittance-side intake record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemitRecord {
    #[serde(default)]
    pub allowed: Option<Money>,
    pub paid: Money,
    #[serde(default)]
    pub received_on: Option<NaiveDate>,
}

/// Contract terms for the billed procedure
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ContractTerms {
    pub contracted_rate: Money,
}

/// Builder for [`FactModel`]
#[derive(Debug, Clone)]
pub struct FactModelBuilder {
    claim_id: String,
    patient_ref: String,
    procedure_code: String,
    procedure_category: String,
    date_of_service: Option<NaiveDate>,
    payer: Option<Payer>,
    network_status: NetworkStatus,
    facility: Facility,
    is_emergency: bool,
    notice_and_consent: ConsentStatus,
    billed: Option<Money>,
    allowed: Option<Money>,
    paid: Option<Money>,
    contracted_rate: Option<Money>,
    jurisdiction: String,
    remittance_received_on: Option<NaiveDate>,
    negotiation: NegotiationRecord,
}

impl FactModelBuilder {
    /// Creates a builder for the given external claim number
    pub fn new(claim_id: impl Into<String>) -> Self {
        Self {
            claim_id: claim_id.into(),
            patient_ref: String::new(),
            procedure_code: String::new(),
            procedure_category: String::new(),
            date_of_service: None,
            payer: None,
            network_status: NetworkStatus::InNetwork,
            facility: Facility {
                facility_type: FacilityType::Other,
                in_network: false,
            },
            is_emergency: false,
            notice_and_consent: ConsentStatus::NotApplicable,
            billed: None,
            allowed: None,
            paid: None,
            contracted_rate: None,
            jurisdiction: String::new(),
            remittance_received_on: None,
            negotiation: NegotiationRecord::default(),
        }
    }

    pub fn patient_ref(mut self, patient_ref: impl Into<String>) -> Self {
        self.patient_ref = patient_ref.into();
        self
    }

    /// Sets the procedure code and its consent category
    pub fn procedure(mut self, code: impl Into<String>, category: impl Into<String>) -> Self {
        self.procedure_code = code.into();
        self.procedure_category = category.into();
        self
    }

    pub fn date_of_service(mut self, date: NaiveDate) -> Self {
        self.date_of_service = Some(date);
        self
    }

    pub fn payer(mut self, name: impl Into<String>, plan_type: PlanType) -> Self {
        self.payer = Some(Payer {
            name: name.into(),
            plan_type,
        });
        self
    }

    pub fn network_status(mut self, status: NetworkStatus) -> Self {
        self.network_status = status;
        self
    }

    pub fn facility(mut self, facility_type: FacilityType, in_network: bool) -> Self {
        self.facility = Facility {
            facility_type,
            in_network,
        };
        self
    }

    pub fn emergency(mut self, is_emergency: bool) -> Self {
        self.is_emergency = is_emergency;
        self
    }

    pub fn notice_and_consent(mut self, status: ConsentStatus) -> Self {
        self.notice_and_consent = status;
        self
    }

    pub fn billed(mut self, amount: Money) -> Self {
        self.billed = Some(amount);
        self
    }

    pub fn allowed(mut self, amount: Money) -> Self {
        self.allowed = Some(amount);
        self
    }

    pub fn paid(mut self, amount: Money) -> Self {
        self.paid = Some(amount);
        self
    }

    pub fn contracted_rate(mut self, amount: Money) -> Self {
        self.contracted_rate = Some(amount);
        self
    }

    pub fn jurisdiction(mut self, state_code: impl Into<String>) -> Self {
        self.jurisdiction = state_code.into();
        self
    }

    pub fn remittance_received_on(mut self, date: NaiveDate) -> Self {
        self.remittance_received_on = Some(date);
        self
    }

    pub fn negotiation_started(mut self, at: DateTime<Utc>) -> Self {
        self.negotiation.started_at = Some(at);
        self
    }

    pub fn negotiation_ended(mut self, at: DateTime<Utc>, agreement_reached: bool) -> Self {
        self.negotiation.ended = Some(NegotiationEnd {
            ended_at: at,
            agreement_reached,
        });
        self
    }

    /// Builds the fact model
    ///
    /// # Errors
    ///
    /// Returns error if the date of service, payer, billed or paid amount is
    /// missing, or if any invariant checked by [`FactModel::validate`] fails.
    pub fn build(self) -> Result<FactModel, DisputeError> {
        let date_of_service = self
            .date_of_service
            .ok_or_else(|| DisputeError::missing_field("date_of_service"))?;
        let payer = self.payer.ok_or_else(|| DisputeError::missing_field("payer"))?;
        let billed = self.billed.ok_or_else(|| DisputeError::missing_field("billed"))?;
        let paid = self.paid.ok_or_else(|| DisputeError::missing_field("paid"))?;

        let facts = FactModel {
            claim_id: self.claim_id.trim().to_string(),
            patient_ref: self.patient_ref,
            procedure_code: self.procedure_code,
            procedure_category: self.procedure_category.trim().to_ascii_lowercase(),
            date_of_service,
            payer,
            network_status: self.network_status,
            facility: self.facility,
            is_emergency: self.is_emergency,
            notice_and_consent: self.notice_and_consent,
            financials: Financials {
                billed,
                allowed: self.allowed,
                paid,
            },
            contracted_rate: self.contracted_rate,
            jurisdiction: self.jurisdiction.trim().to_ascii_uppercase(),
            remittance_received_on: self.remittance_received_on,
            negotiation: self.negotiation,
        };

        facts.validate()?;
        Ok(facts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in_network_builder() -> FactModelBuilder {
        FactModelBuilder::new("CLM-1001")
            .patient_ref("PT-77")
            .procedure("99214", "evaluation-management")
            .date_of_service(NaiveDate::from_ymd_opt(2024, 3, 4).unwrap())
            .payer("Acme Health", PlanType::FullyInsured)
            .network_status(NetworkStatus::InNetwork)
            .facility(FacilityType::PhysicianOffice, true)
            .billed(Money::usd(350000))
            .paid(Money::usd(115000))
            .contracted_rate(Money::usd(300000))
            .jurisdiction(" ny ")
    }

    #[test]
    fn test_builder_normalizes_jurisdiction() {
        let facts = in_network_builder().build().unwrap();
        assert_eq!(facts.jurisdiction(), "NY");
        assert!(facts.contracted_rate_known());
    }

    #[test]
    fn test_disputed_amount_uses_contracted_rate() {
        let facts = in_network_builder().allowed(Money::usd(250000)).build().unwrap();
        assert_eq!(facts.expected_amount(), Some(Money::usd(300000)));
        assert_eq!(facts.disputed_amount(), Some(Money::usd(185000)));
    }

    #[test]
    fn test_overpayment_floors_disputed_amount() {
        let facts = in_network_builder().paid(Money::usd(400000)).build().unwrap();
        assert_eq!(facts.disputed_amount(), Some(Money::usd(0)));
    }

    #[test]
    fn test_negative_amount_is_rejected() {
        let err = in_network_builder().allowed(Money::usd(-1)).build().unwrap_err();
        assert!(matches!(err, DisputeError::InvalidFacts(_)));
    }

    #[test]
    fn test_mixed_currency_is_rejected() {
        let err = in_network_builder()
            .paid(Money::from_minor(100, Currency::EUR))
            .build()
            .unwrap_err();
        assert!(matches!(err, DisputeError::InvalidFacts(_)));
    }

    #[test]
    fn test_missing_payer_is_rejected() {
        let err = FactModelBuilder::new("CLM-1")
            .date_of_service(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap())
            .billed(Money::usd(1))
            .paid(Money::usd(0))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("payer"));
    }

    #[test]
    fn test_from_sources_merges_contract_terms() {
        let claim = ClaimRecord {
            claim_id: "CLM-2002".to_string(),
            patient_ref: "PT-1".to_string(),
            procedure_code: "27447".to_string(),
            procedure_category: "Surgery".to_string(),
            date_of_service: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            payer_name: "Acme Health".to_string(),
            plan_type: PlanType::SelfFundedErisa,
            network_status: NetworkStatus::InNetwork,
            facility_type: FacilityType::Hospital,
            facility_in_network: true,
            is_emergency: false,
            notice_and_consent: ConsentStatus::NotApplicable,
            billed: Money::usd(900000),
            jurisdiction: "tx".to_string(),
        };
        let remit = RemitRecord {
            allowed: Some(Money::usd(500000)),
            paid: Money::usd(400000),
            received_on: NaiveDate::from_ymd_opt(2024, 3, 1),
        };
        let facts = FactModel::from_sources(
            claim,
            remit,
            Some(ContractTerms {
                contracted_rate: Money::usd(600000),
            }),
        )
        .unwrap();

        assert_eq!(facts.procedure_category(), "surgery");
        assert_eq!(facts.jurisdiction(), "TX");
        assert_eq!(facts.expected_amount(), Some(Money::usd(600000)));
        assert_eq!(facts.remittance_received_on(), NaiveDate::from_ymd_opt(2024, 3, 1));
    }

    #[test]
    fn test_negotiation_amendment_produces_new_snapshot() {
        let facts = in_network_builder().build().unwrap();
        let ended_at = Utc::now();
        let amended = facts.with_negotiation_ended(ended_at, false);

        assert!(!facts.negotiation().has_ended());
        assert_eq!(amended.negotiation().ended.map(|e| e.ended_at), Some(ended_at));
    }

    #[test]
    fn test_plan_type_accepts_legacy_casing() {
        let plan: PlanType = serde_json::from_str("\"self-funded-ERISA\"").unwrap();
        assert_eq!(plan, PlanType::SelfFundedErisa);
    }
}
