//! Test Data Builders
//!
//! Builder patterns for constructing fact models with sensible defaults.
//! Tests name only the fields that matter to them; the defaults describe
//! an out-of-network surprise bill still in open negotiation.

use chrono::{DateTime, NaiveDate, Utc};
use core_kernel::Money;
use domain_dispute::{ConsentStatus, FacilityType, FactModel, FactModelBuilder, NetworkStatus, PlanType};

use crate::fixtures::TemporalFixtures;

/// Builder for constructing test fact models
pub struct TestFactsBuilder {
    claim_id: String,
    procedure_category: String,
    plan_type: PlanType,
    network_status: NetworkStatus,
    facility_in_network: bool,
    is_emergency: bool,
    consent: ConsentStatus,
    billed: Money,
    allowed: Option<Money>,
    paid: Money,
    contracted_rate: Option<Money>,
    jurisdiction: String,
    remittance_received_on: Option<NaiveDate>,
    negotiation_started: Option<DateTime<Utc>>,
    negotiation_ended: Option<(DateTime<Utc>, bool)>,
}

impl Default for TestFactsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestFactsBuilder {
    /// Creates a new builder with default values
    pub fn new() -> Self {
        Self {
            claim_id: "CLM-TEST-0001".to_string(),
            procedure_category: "anesthesiology".to_string(),
            plan_type: PlanType::SelfFundedErisa,
            network_status: NetworkStatus::OutOfNetwork,
            facility_in_network: true,
            is_emergency: false,
            consent: ConsentStatus::NotObtained,
            billed: Money::usd(525_000),
            allowed: Some(Money::usd(180_000)),
            paid: Money::usd(180_000),
            contracted_rate: None,
            jurisdiction: "PA".to_string(),
            remittance_received_on: Some(TemporalFixtures::remittance_received()),
            negotiation_started: None,
            negotiation_ended: None,
        }
    }

    /// Starts from an in-network contract underpayment
    pub fn in_network() -> Self {
        Self::new()
            .with_network_status(NetworkStatus::InNetwork)
            .with_plan_type(PlanType::FullyInsured)
            .with_procedure_category("orthopedic-surgery")
            .with_consent(ConsentStatus::NotApplicable)
            .with_contracted_rate(Money::usd(300_000))
            .with_paid(Money::usd(115_000))
    }

    pub fn with_claim_id(mut self, claim_id: &str) -> Self {
        self.claim_id = claim_id.to_string();
        self
    }

    pub fn with_procedure_category(mut self, category: &str) -> Self {
        self.procedure_category = category.to_string();
        self
    }

    pub fn with_plan_type(mut self, plan_type: PlanType) -> Self {
        self.plan_type = plan_type;
        self
    }

    pub fn with_network_status(mut self, status: NetworkStatus) -> Self {
        self.network_status = status;
        self
    }

    pub fn with_facility_in_network(mut self, in_network: bool) -> Self {
        self.facility_in_network = in_network;
        self
    }

    pub fn with_emergency(mut self, is_emergency: bool) -> Self {
        self.is_emergency = is_emergency;
        self
    }

    pub fn with_consent(mut self, consent: ConsentStatus) -> Self {
        self.consent = consent;
        self
    }

    pub fn with_billed(mut self, billed: Money) -> Self {
        self.billed = billed;
        self
    }

    pub fn with_allowed(mut self, allowed: Option<Money>) -> Self {
        self.allowed = allowed;
        self
    }

    pub fn with_paid(mut self, paid: Money) -> Self {
        self.paid = paid;
        self
    }

    pub fn with_contracted_rate(mut self, rate: Money) -> Self {
        self.contracted_rate = Some(rate);
        self
    }

    pub fn with_jurisdiction(mut self, jurisdiction: &str) -> Self {
        self.jurisdiction = jurisdiction.to_string();
        self
    }

    pub fn with_remittance_received_on(mut self, date: Option<NaiveDate>) -> Self {
        self.remittance_received_on = date;
        self
    }

    pub fn with_negotiation_started(mut self, at: DateTime<Utc>) -> Self {
        self.negotiation_started = Some(at);
        self
    }

    /// Records the end of open negotiation and whether it settled
    pub fn with_negotiation_ended(mut self, at: DateTime<Utc>, agreement_reached: bool) -> Self {
        self.negotiation_ended = Some((at, agreement_reached));
        self
    }

    /// Builds the fact model
    ///
    /// # Panics
    ///
    /// Panics if the configured values violate a fact model invariant
    pub fn build(self) -> FactModel {
        let mut builder = FactModelBuilder::new(self.claim_id)
            .patient_ref("PT-TEST")
            .procedure("99999", self.procedure_category)
            .date_of_service(TemporalFixtures::date_of_service())
            .payer("Test Payer", self.plan_type)
            .network_status(self.network_status)
            .facility(FacilityType::Hospital, self.facility_in_network)
            .emergency(self.is_emergency)
            .notice_and_consent(self.consent)
            .billed(self.billed)
            .paid(self.paid)
            .jurisdiction(self.jurisdiction);

        if let Some(allowed) = self.allowed {
            builder = builder.allowed(allowed);
        }
        if let Some(rate) = self.contracted_rate {
            builder = builder.contracted_rate(rate);
        }
        if let Some(date) = self.remittance_received_on {
            builder = builder.remittance_received_on(date);
        }
        if let Some(at) = self.negotiation_started {
            builder = builder.negotiation_started(at);
        }
        if let Some((at, agreement)) = self.negotiation_ended {
            builder = builder.negotiation_ended(at, agreement);
        }

        builder.build().expect("test facts must satisfy fact model invariants")
    }
}
