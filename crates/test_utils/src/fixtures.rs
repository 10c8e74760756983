//! Test Fixtures
//!
//! Pre-built claims, timestamps and actors shared by the test suites.
//! The fact fixtures follow the canonical acceptance scenarios: a surprise
//! bill still in open negotiation, the same bill after negotiation failed,
//! and an in-network contract underpayment.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use core_kernel::{Money, Timezone};
use domain_dispute::{
    Actor, ConsentStatus, DisputeEngine, EngineConfig, FacilityType, FactModel, FactModelBuilder,
    InMemoryCaseStore, NetworkStatus, PlanType,
};

/// Fixed timestamps used across the suites
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// Practice timezone of the default configuration
    pub fn timezone() -> Timezone {
        Timezone::new(chrono_tz::America::New_York)
    }

    /// Monday, March 4th 2024
    pub fn date_of_service() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
    }

    /// Day the remittance advice arrived
    pub fn remittance_received() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()
    }

    /// When the case is opened
    pub fn case_opened_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 10, 14, 0, 0).unwrap()
    }

    /// Monday, April 15th 2024, 10:00 in New York
    pub fn negotiation_started_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 15, 14, 0, 0).unwrap()
    }

    /// Monday, May 20th 2024, 11:00 in New York
    pub fn negotiation_ended_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 20, 15, 0, 0).unwrap()
    }

    /// Four business days after the negotiation end
    pub fn idr_filing_due_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 24).unwrap()
    }

    /// Thirty business days after the negotiation start, skipping Memorial Day
    pub fn open_negotiation_period_end_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 28).unwrap()
    }

    /// 180 calendar days after the remittance date
    pub fn appeal_filing_due_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, 28).unwrap()
    }

    /// Builds a UTC timestamp from its parts
    pub fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, hour, minute, 0).unwrap()
    }
}

/// Canonical fact models
pub struct FactFixtures;

impl FactFixtures {
    /// Out-of-network anesthesia at an in-network hospital under a
    /// self-funded ERISA plan, consent not obtained, negotiation open
    pub fn scenario_a() -> FactModel {
        Self::surprise_bill("CLM-2024-0001").build().unwrap()
    }

    /// Scenario A after open negotiation ended without agreement
    pub fn scenario_b() -> FactModel {
        Self::surprise_bill("CLM-2024-0002")
            .negotiation_started(TemporalFixtures::negotiation_started_at())
            .negotiation_ended(TemporalFixtures::negotiation_ended_at(), false)
            .build()
            .unwrap()
    }

    /// In-network claim paid $1,150.00 against a $3,000.00 contracted rate
    pub fn scenario_c() -> FactModel {
        FactModelBuilder::new("CLM-2024-0003")
            .patient_ref("PT-30418")
            .procedure("27447", "orthopedic-surgery")
            .date_of_service(TemporalFixtures::date_of_service())
            .payer("Keystone Mutual", PlanType::FullyInsured)
            .network_status(NetworkStatus::InNetwork)
            .facility(FacilityType::Hospital, true)
            .billed(Money::usd(420_000))
            .allowed(Money::usd(150_000))
            .paid(Money::usd(115_000))
            .contracted_rate(Money::usd(300_000))
            .jurisdiction("PA")
            .remittance_received_on(TemporalFixtures::remittance_received())
            .build()
            .unwrap()
    }

    /// Out-of-network surprise bill in a state with a certified program
    pub fn state_program_surprise_bill() -> FactModel {
        FactModelBuilder::new("CLM-2024-0004")
            .patient_ref("PT-55102")
            .procedure("00790", "anesthesiology")
            .date_of_service(TemporalFixtures::date_of_service())
            .payer("Empire Group Health", PlanType::FullyInsured)
            .network_status(NetworkStatus::OutOfNetwork)
            .facility(FacilityType::Hospital, true)
            .notice_and_consent(ConsentStatus::NotObtained)
            .billed(Money::usd(480_000))
            .allowed(Money::usd(160_000))
            .paid(Money::usd(160_000))
            .jurisdiction("NY")
            .remittance_received_on(TemporalFixtures::remittance_received())
            .negotiation_ended(TemporalFixtures::negotiation_ended_at(), false)
            .build()
            .unwrap()
    }

    /// Facts with no jurisdiction on file
    pub fn missing_jurisdiction() -> FactModel {
        Self::surprise_bill("CLM-2024-0005").jurisdiction("").build().unwrap()
    }

    /// Builder preloaded with the scenario A surprise bill
    pub fn surprise_bill(claim_id: &str) -> FactModelBuilder {
        FactModelBuilder::new(claim_id)
            .patient_ref("PT-88213")
            .procedure("00790", "anesthesiology")
            .date_of_service(TemporalFixtures::date_of_service())
            .payer("Acme Benefits Trust", PlanType::SelfFundedErisa)
            .network_status(NetworkStatus::OutOfNetwork)
            .facility(FacilityType::Hospital, true)
            .emergency(false)
            .notice_and_consent(ConsentStatus::NotObtained)
            .billed(Money::usd(525_000))
            .allowed(Money::usd(180_000))
            .paid(Money::usd(180_000))
            .jurisdiction("PA")
            .remittance_received_on(TemporalFixtures::remittance_received())
    }
}

/// Actors issuing commands
pub struct ActorFixtures;

impl ActorFixtures {
    /// Billing specialist without reopen rights
    pub fn biller() -> Actor {
        Actor::new("biller-17")
    }

    /// Supervisor allowed to reopen closed cases
    pub fn supervisor() -> Actor {
        Actor::new("supervisor-2").with_reopen_authorization()
    }
}

/// Engines wired to an in-memory store
pub struct EngineFixtures;

impl EngineFixtures {
    /// Engine with the default configuration
    pub fn engine() -> (Arc<InMemoryCaseStore>, DisputeEngine) {
        Self::engine_with(EngineConfig::default())
    }

    /// Engine with a custom configuration
    pub fn engine_with(config: EngineConfig) -> (Arc<InMemoryCaseStore>, DisputeEngine) {
        let store = Arc::new(InMemoryCaseStore::new());
        let engine = DisputeEngine::new(store.clone(), config);
        (store, engine)
    }
}
