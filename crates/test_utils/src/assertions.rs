//! Custom Test Assertions
//!
//! Assertion helpers for cases, deadlines and bound documents that give
//! more meaningful failure messages than standard assertions.

use chrono::NaiveDate;
use core_kernel::Timezone;
use domain_dispute::{Case, Deadline};

/// Asserts that two case values are identical in every persisted field
///
/// # Arguments
///
/// * `before` - The case before the rejected command
/// * `after` - The case observed afterwards
///
/// # Panics
///
/// Panics if the serialized forms differ
pub fn assert_case_unchanged(before: &Case, after: &Case) {
    let before_json = serde_json::to_value(before).expect("case serializes");
    let after_json = serde_json::to_value(after).expect("case serializes");
    assert_eq!(
        before_json, after_json,
        "Case {} changed although the command was rejected",
        before.id()
    );
}

/// Asserts that bound text contains no `{Variable}` placeholders
///
/// # Panics
///
/// Panics with the offending text if a placeholder survived binding
pub fn assert_no_placeholders(text: &str) {
    assert!(
        !domain_dispute::binder::has_placeholders(text),
        "Bound text still contains placeholders:\n{}",
        text
    );
}

/// Asserts that a deadline falls due at the end of a local calendar day
///
/// # Arguments
///
/// * `deadline` - The deadline to check
/// * `timezone` - Practice timezone the date is expressed in
/// * `expected` - Local due date
///
/// # Panics
///
/// Panics if the due instant is not 23:59:59.999 local time on `expected`
pub fn assert_deadline_due_on(deadline: &Deadline, timezone: Timezone, expected: NaiveDate) {
    assert_eq!(
        deadline.due_at,
        timezone.end_of_day(expected),
        "{} due {} but expected end of {} in {}",
        deadline.kind,
        deadline.due_at,
        expected,
        timezone.name()
    );
}

/// Asserts that one of the case's eligibility reasons contains `fragment`
pub fn assert_reason_contains(case: &Case, fragment: &str) {
    assert!(
        case.eligibility_reasons().iter().any(|r| r.contains(fragment)),
        "No eligibility reason contains '{}': {:?}",
        fragment,
        case.eligibility_reasons()
    );
}

/// Asserts that the case history replays to the current status
///
/// # Panics
///
/// Panics if consecutive history entries do not chain, or the last entry
/// does not end at the case's current status
pub fn assert_history_consistent(case: &Case) {
    for pair in case.history().windows(2) {
        assert_eq!(
            pair[0].to_state, pair[1].from_state,
            "History breaks between {:?} and {:?}",
            pair[0], pair[1]
        );
    }
    if let Some(last) = case.history().last() {
        assert_eq!(last.to_state, case.status(), "History does not end at the current status");
    }
}
