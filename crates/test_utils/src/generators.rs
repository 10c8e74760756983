//! Property-Based Test Generators
//!
//! Provides proptest strategies for generating random test data
//! that maintains domain invariants.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use core_kernel::Money;
use domain_dispute::{
    CaseAction, CaseStatus, ConsentStatus, FacilityType, FactModel, FactModelBuilder, NetworkStatus, PlanType,
};
use proptest::prelude::*;

/// Strategy for generating USD amounts up to $50,000.00
pub fn usd_money_strategy() -> impl Strategy<Value = Money> {
    (0i64..5_000_000i64).prop_map(Money::usd)
}

/// Strategy for generating plan types
pub fn plan_type_strategy() -> impl Strategy<Value = PlanType> {
    prop_oneof![
        Just(PlanType::SelfFundedErisa),
        Just(PlanType::FullyInsured),
        Just(PlanType::Medicare),
        Just(PlanType::Medicaid),
        Just(PlanType::Other),
    ]
}

pub fn network_status_strategy() -> impl Strategy<Value = NetworkStatus> {
    prop_oneof![Just(NetworkStatus::InNetwork), Just(NetworkStatus::OutOfNetwork)]
}

pub fn consent_strategy() -> impl Strategy<Value = ConsentStatus> {
    prop_oneof![
        Just(ConsentStatus::Obtained),
        Just(ConsentStatus::NotObtained),
        Just(ConsentStatus::NotApplicable),
    ]
}

/// Procedure categories, some of which cannot be waived by consent
pub fn procedure_category_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("anesthesiology"),
        Just("radiology"),
        Just("pathology"),
        Just("orthopedic-surgery"),
        Just("interventional-pain"),
        Just("evaluation-management"),
    ]
}

/// Jurisdictions with and without state programs, plus unknown
pub fn jurisdiction_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("PA"), Just("NY"), Just("TX"), Just("FL"), Just("CA"), Just("")]
}

/// Strategy for generating dates of service in 2023-2025
pub fn service_date_strategy() -> impl Strategy<Value = NaiveDate> {
    (0i64..1095i64).prop_map(|offset| {
        NaiveDate::from_ymd_opt(2023, 1, 1).unwrap() + Duration::days(offset)
    })
}

/// Strategy for generating UTC instants in 2023-2025 with minute precision
pub fn timestamp_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..(1095 * 24 * 60)).prop_map(|minutes| {
        Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
    })
}

pub fn case_action_strategy() -> impl Strategy<Value = CaseAction> {
    proptest::sample::select(CaseAction::all().to_vec())
}

pub fn case_status_strategy() -> impl Strategy<Value = CaseStatus> {
    proptest::sample::select(CaseStatus::all().to_vec())
}

/// Negotiation outcome: not ended, ended without agreement, settled
pub fn negotiation_outcome_strategy() -> impl Strategy<Value = Option<bool>> {
    prop_oneof![Just(None), Just(Some(false)), Just(Some(true))]
}

/// Strategy for generating valid fact models across the classifier's inputs
pub fn fact_model_strategy() -> impl Strategy<Value = FactModel> {
    (
        (
            plan_type_strategy(),
            network_status_strategy(),
            any::<bool>(),
            any::<bool>(),
            consent_strategy(),
            procedure_category_strategy(),
        ),
        (
            usd_money_strategy(),
            proptest::option::of(usd_money_strategy()),
            usd_money_strategy(),
            proptest::option::of(usd_money_strategy()),
        ),
        jurisdiction_strategy(),
        service_date_strategy(),
        negotiation_outcome_strategy(),
    )
        .prop_map(
            |(
                (plan, network, facility_in_network, emergency, consent, category),
                (billed, allowed, paid, contracted),
                jurisdiction,
                date_of_service,
                outcome,
            )| {
                let mut builder = FactModelBuilder::new("CLM-PROP")
                    .patient_ref("PT-PROP")
                    .procedure("99999", category)
                    .date_of_service(date_of_service)
                    .payer("Generated Payer", plan)
                    .network_status(network)
                    .facility(FacilityType::Hospital, facility_in_network)
                    .emergency(emergency)
                    .notice_and_consent(consent)
                    .billed(billed)
                    .paid(paid)
                    .jurisdiction(jurisdiction)
                    .remittance_received_on(date_of_service + Duration::days(30));
                if let Some(allowed) = allowed {
                    builder = builder.allowed(allowed);
                }
                if let Some(rate) = contracted {
                    builder = builder.contracted_rate(rate);
                }
                if let Some(agreement) = outcome {
                    let ended_on = date_of_service + Duration::days(90);
                    let ended = Utc.from_utc_datetime(&ended_on.and_hms_opt(15, 0, 0).unwrap());
                    builder = builder.negotiation_ended(ended, agreement);
                }
                builder.build().unwrap()
            },
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn generated_facts_satisfy_invariants(facts in fact_model_strategy()) {
            prop_assert!(facts.validate().is_ok());
            prop_assert!(!facts.financials().paid.is_negative());
        }

        #[test]
        fn generated_timestamps_are_in_range(ts in timestamp_strategy()) {
            prop_assert!(ts >= Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap());
            prop_assert!(ts < Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
        }
    }
}
