//! Eligibility Classifier Tests
//!
//! Venue determination across the surprise-billing criteria, the state
//! program registry, negotiation outcomes and the conservative fallback.
//!
//! # Test Organization
//!
//! - `acceptance` - The canonical venue scenarios
//! - `surprise_billing` - Each criterion that disqualifies a federal/state venue
//! - `consent_rules` - Declarative consent waiver table
//! - `fallback` - Insufficient data never drops a case

use core_kernel::Money;
use domain_dispute::classifier::{
    REASON_INSUFFICIENT_DATA, REASON_INTERNAL_APPEAL_FIRST, REASON_IN_NETWORK_RATE, REASON_NEGOTIATION_FAILED,
    REASON_NEGOTIATION_PENDING, REASON_NOT_ELIGIBLE, REASON_SETTLED,
};
use domain_dispute::{
    ConsentRules, ConsentStatus, ConsentWaiver, DisputePath, EligibilityClassifier, NetworkStatus, PlanType,
    StateIdrRegistry, Venue,
};
use test_utils::{FactFixtures, TemporalFixtures, TestFactsBuilder};

fn classifier() -> EligibilityClassifier {
    EligibilityClassifier::default()
}

// ============================================================================
// ACCEPTANCE SCENARIOS
// ============================================================================

mod acceptance {
    use super::*;

    #[test]
    fn test_scenario_a_requires_open_negotiation() {
        let classification = classifier().classify(&FactFixtures::scenario_a());

        assert_eq!(classification.venue, Venue::OpenNegotiationRequired);
        assert_eq!(classification.path(), DisputePath::Nsa);
        assert!(!classification.indeterminate);
        assert_eq!(
            classification.reasons.last().map(String::as_str),
            Some(REASON_NEGOTIATION_PENDING)
        );
    }

    #[test]
    fn test_scenario_b_routes_to_federal_idr() {
        let classification = classifier().classify(&FactFixtures::scenario_b());

        assert_eq!(classification.venue, Venue::FederalIdr);
        assert!(classification.reasons.iter().any(|r| r.contains("federal IDR applies")));
        assert!(classification.reasons.iter().any(|r| r == REASON_NEGOTIATION_FAILED));
    }

    #[test]
    fn test_scenario_c_is_appeal_only() {
        let classification = classifier().classify(&FactFixtures::scenario_c());

        assert_eq!(classification.venue, Venue::AppealOnly);
        assert_eq!(classification.path(), DisputePath::Appeal);
        assert_eq!(
            classification.reasons,
            vec![REASON_IN_NETWORK_RATE.to_string(), REASON_INTERNAL_APPEAL_FIRST.to_string()]
        );
    }

    #[test]
    fn test_certified_state_program_routes_to_state_idr() {
        let classification = classifier().classify(&FactFixtures::state_program_surprise_bill());

        assert_eq!(classification.venue, Venue::StateIdr);
        assert!(classification.reasons.iter().any(|r| r.starts_with("NY operates a certified state IDR program")));
    }

    #[test]
    fn test_state_program_only_covers_listed_plan_types() {
        let facts = TestFactsBuilder::new()
            .with_jurisdiction("NY")
            .with_plan_type(PlanType::SelfFundedErisa)
            .with_negotiation_ended(TemporalFixtures::negotiation_ended_at(), false)
            .build();

        assert_eq!(classifier().classify(&facts).venue, Venue::FederalIdr);
    }

    #[test]
    fn test_custom_registry_is_honoured() {
        let classifier = EligibilityClassifier::new(
            ConsentRules::default(),
            StateIdrRegistry::empty().with_program("pa", [PlanType::SelfFundedErisa]),
        );

        assert_eq!(classifier.classify(&FactFixtures::scenario_b()).venue, Venue::StateIdr);
    }

    #[test]
    fn test_negotiation_settled_by_agreement_is_appeal_only() {
        let facts = TestFactsBuilder::new()
            .with_negotiation_ended(TemporalFixtures::negotiation_ended_at(), true)
            .build();
        let classification = classifier().classify(&facts);

        assert_eq!(classification.venue, Venue::AppealOnly);
        assert!(classification.reasons.iter().any(|r| r == REASON_SETTLED));
    }
}

// ============================================================================
// SURPRISE BILLING CRITERIA
// ============================================================================

mod surprise_billing {
    use super::*;

    fn assert_not_eligible(facts: &domain_dispute::FactModel) {
        let classification = classifier().classify(facts);
        assert_eq!(classification.venue, Venue::AppealOnly);
        assert!(!classification.indeterminate);
        assert!(classification.reasons.iter().any(|r| r == REASON_NOT_ELIGIBLE));
    }

    #[test]
    fn test_emergency_service_is_not_routed_to_idr() {
        assert_not_eligible(&TestFactsBuilder::new().with_emergency(true).build());
    }

    #[test]
    fn test_out_of_network_facility_is_not_routed_to_idr() {
        assert_not_eligible(&TestFactsBuilder::new().with_facility_in_network(false).build());
    }

    #[test]
    fn test_public_plans_are_not_routed_to_idr() {
        for plan in [PlanType::Medicare, PlanType::Medicaid, PlanType::Other] {
            assert_not_eligible(&TestFactsBuilder::new().with_plan_type(plan).build());
        }
    }

    #[test]
    fn test_obtained_consent_waives_waivable_category() {
        let facts = TestFactsBuilder::new()
            .with_procedure_category("orthopedic-surgery")
            .with_consent(ConsentStatus::Obtained)
            .build();
        assert_not_eligible(&facts);
    }

    #[test]
    fn test_obtained_consent_cannot_waive_ancillary_category() {
        let facts = TestFactsBuilder::new()
            .with_procedure_category("anesthesiology")
            .with_consent(ConsentStatus::Obtained)
            .build();

        assert_eq!(classifier().classify(&facts).venue, Venue::OpenNegotiationRequired);
    }

    #[test]
    fn test_in_network_paid_in_full_is_not_eligible() {
        let facts = TestFactsBuilder::in_network().with_paid(Money::usd(300_000)).build();
        let classification = classifier().classify(&facts);

        assert_eq!(classification.venue, Venue::AppealOnly);
        assert!(classification.reasons.iter().any(|r| r == REASON_NOT_ELIGIBLE));
    }

    #[test]
    fn test_external_review_jurisdiction_skips_internal_appeal_reason() {
        let mut classifier = classifier();
        classifier.in_network_external_review.insert("PA".to_string());
        let classification = classifier.classify(&FactFixtures::scenario_c());

        assert_eq!(classification.reasons, vec![REASON_IN_NETWORK_RATE.to_string()]);
    }
}

// ============================================================================
// CONSENT RULES
// ============================================================================

mod consent_rules {
    use super::*;

    #[test]
    fn test_not_applicable_counts_as_not_obtained_when_category_is_waivable() {
        let facts = TestFactsBuilder::new()
            .with_procedure_category("orthopedic-surgery")
            .with_consent(ConsentStatus::NotApplicable)
            .build();

        assert_eq!(classifier().classify(&facts).venue, Venue::OpenNegotiationRequired);
    }

    #[test]
    fn test_new_category_is_configuration_only() {
        let mut rules = ConsentRules::default();
        rules
            .categories
            .insert("robotic-surgery".to_string(), ConsentWaiver::NotWaivable);
        let classifier = EligibilityClassifier::new(rules, StateIdrRegistry::default());

        let facts = TestFactsBuilder::new()
            .with_procedure_category("Robotic-Surgery")
            .with_consent(ConsentStatus::Obtained)
            .build();

        assert_eq!(classifier.classify(&facts).venue, Venue::OpenNegotiationRequired);
    }

    #[test]
    fn test_rules_deserialize_from_configuration() {
        let rules: ConsentRules =
            serde_json::from_str(r#"{"categories": {"pathology": "not-waivable"}, "default": "waivable"}"#).unwrap();

        assert_eq!(rules.waiver_for("pathology"), ConsentWaiver::NotWaivable);
        assert_eq!(rules.waiver_for("dermatology"), ConsentWaiver::Waivable);
    }
}

// ============================================================================
// CONSERVATIVE FALLBACK
// ============================================================================

mod fallback {
    use super::*;

    #[test]
    fn test_missing_jurisdiction_is_indeterminate() {
        let classification = classifier().classify(&FactFixtures::missing_jurisdiction());

        assert_eq!(classification.venue, Venue::AppealOnly);
        assert!(classification.indeterminate);
        assert_eq!(
            classification.reasons.last().map(String::as_str),
            Some(REASON_INSUFFICIENT_DATA)
        );
    }

    #[test]
    fn test_in_network_without_expected_amount_is_indeterminate() {
        let facts = TestFactsBuilder::new()
            .with_network_status(NetworkStatus::InNetwork)
            .with_allowed(None)
            .build();
        let classification = classifier().classify(&facts);

        assert!(classification.indeterminate);
        assert_eq!(classification.venue, Venue::AppealOnly);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let facts = FactFixtures::scenario_b();
        assert_eq!(classifier().classify(&facts), classifier().classify(&facts));
    }
}
