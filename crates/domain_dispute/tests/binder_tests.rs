//! Document Binder Tests
//!
//! Binding templates against live cases: value formatting, completeness
//! checks, and repeatability.

use domain_dispute::binder::APPEAL_LETTER;
use domain_dispute::{
    BindError, Case, CaseAction, CaseLifecycle, DocumentBinder, EngineConfig, Template, TemplateLibrary,
};
use test_utils::{assert_no_placeholders, ActorFixtures, FactFixtures, TemporalFixtures};

fn opened(facts: domain_dispute::FactModel) -> Case {
    CaseLifecycle::new(&EngineConfig::default())
        .open(facts, TemporalFixtures::case_opened_at())
        .unwrap()
}

fn drafted_appeal() -> Case {
    let config = EngineConfig::default();
    let case = opened(FactFixtures::scenario_c());
    CaseLifecycle::new(&config)
        .transition(
            &case,
            CaseAction::DraftAppeal,
            &ActorFixtures::biller(),
            TemporalFixtures::utc(2024, 4, 11, 13, 30),
        )
        .unwrap()
}

fn binder() -> DocumentBinder {
    DocumentBinder::new(TemporalFixtures::timezone())
}

#[test]
fn test_scenario_c_disputed_amount() {
    let case = drafted_appeal();
    let library = TemplateLibrary::default();
    let template = library.get(APPEAL_LETTER).unwrap();

    let bound = binder().bind(template, case.facts(), &case).unwrap();

    assert_eq!(case.facts().disputed_amount(), Some(core_kernel::Money::usd(185_000)));
    assert_eq!(bound.resolved["DisputedAmount"], "$1,850.00");
    assert_eq!(bound.resolved["ExpectedAmount"], "$3,000.00");
    assert_eq!(bound.resolved["PaidAmount"], "$1,150.00");
    assert_eq!(bound.resolved["DateOfService"], "March 4, 2024");
    assert_eq!(bound.resolved["BoundDate"], "April 11, 2024");
    assert_no_placeholders(&bound.text);
}

#[test]
fn test_binding_is_repeatable() {
    let case = drafted_appeal();
    let library = TemplateLibrary::default();
    let template = library.get(APPEAL_LETTER).unwrap();

    let first = binder().bind(template, case.facts(), &case).unwrap();
    let second = binder().bind(template, case.facts(), &case).unwrap();

    assert_eq!(first, second);
    assert_eq!(case.documents().last().unwrap().payload, first);
}

#[test]
fn test_letter_cannot_bind_before_deadline_exists() {
    let case = opened(FactFixtures::scenario_c());
    let library = TemplateLibrary::default();

    let err = binder()
        .bind(library.get(APPEAL_LETTER).unwrap(), case.facts(), &case)
        .unwrap_err();

    assert_eq!(
        err,
        BindError {
            template_key: APPEAL_LETTER.to_string(),
            missing_variables: vec!["AppealFilingDeadline".to_string()],
        }
    );
}

#[test]
fn test_missing_variables_listed_once_body_first() {
    let case = opened(FactFixtures::scenario_a());
    let template = Template::new(
        "custom",
        &["DenialDate", "ContractedRate", "ClaimId"],
        "{ContractedRate} for {ClaimId}; again {ContractedRate}",
    );

    let err = binder().bind(&template, case.facts(), &case).unwrap_err();

    assert_eq!(err.missing_variables, vec!["ContractedRate", "DenialDate"]);
    assert_eq!(
        err.to_string(),
        "Template 'custom' has unresolved variables: ContractedRate, DenialDate"
    );
}

#[test]
fn test_literal_braces_survive_binding() {
    let case = opened(FactFixtures::scenario_a());
    let template = Template::new("literal", &[], "Ref {ClaimId} {see attached} {");

    let bound = binder().bind(&template, case.facts(), &case).unwrap();

    assert_eq!(bound.text, "Ref CLM-2024-0001 {see attached} {");
}

#[test]
fn test_case_and_anchor_variables_resolve() {
    let case = opened(FactFixtures::scenario_b());
    let map = binder().resolution_map(case.facts(), &case);

    assert_eq!(map["Venue"], "Federal Independent Dispute Resolution");
    assert_eq!(map["VenueCode"], "FederalIDR");
    assert_eq!(map["CaseStatus"], "New");
    assert_eq!(map["CaseId"], case.id().to_string());
    assert_eq!(map["NegotiationEndDate"], "May 20, 2024");
    assert_eq!(map["PaymentDeterminationDate"], "April 1, 2024");
    assert_eq!(map["Jurisdiction"], "PA");
    assert!(!map.contains_key("ContractedRate"));
}
