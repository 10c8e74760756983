//! Deadline Calculator Tests
//!
//! Business and calendar counting, timezone normalization across DST
//! changes, and configured holiday calendars.

use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use core_kernel::Timezone;
use domain_dispute::{
    AnchorEventKind, CalendarMode, DeadlineCalculator, DeadlineKind, DeadlineRule, Holiday, HolidayCalendar,
    HolidayProvider,
};
use test_utils::TemporalFixtures;

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn idr_filing_rule() -> DeadlineRule {
    DeadlineRule::new(
        DeadlineKind::IdrFilingDeadline,
        AnchorEventKind::NegotiationEnded,
        4,
        CalendarMode::Business,
    )
}

// ============================================================================
// BUSINESS DAY COUNTING
// ============================================================================

#[test]
fn test_idr_filing_deadline_counts_four_business_days() {
    let holidays = HolidayCalendar::us_federal(2024..=2024);
    let calculator = DeadlineCalculator::new(TemporalFixtures::timezone(), &holidays);

    let due = calculator.compute_due_date(TemporalFixtures::negotiation_ended_at(), &idr_filing_rule());

    assert_eq!(due, TemporalFixtures::timezone().end_of_day(TemporalFixtures::idr_filing_due_date()));
}

#[test]
fn test_open_negotiation_period_skips_memorial_day() {
    let holidays = HolidayCalendar::us_federal(2024..=2024);
    let calculator = DeadlineCalculator::new(TemporalFixtures::timezone(), &holidays);

    let due = calculator.due_date(ymd(2024, 4, 15), 30, CalendarMode::Business);

    assert_eq!(due, TemporalFixtures::open_negotiation_period_end_date());
}

#[test]
fn test_business_days_over_thanksgiving() {
    let holidays = HolidayCalendar::us_federal(2024..=2024);
    let calculator = DeadlineCalculator::new(TemporalFixtures::timezone(), &holidays);

    // Wednesday before Thanksgiving: Thu is a holiday, Fri/Mon/Tue count
    assert_eq!(calculator.due_date(ymd(2024, 11, 27), 3, CalendarMode::Business), ymd(2024, 12, 3));
}

#[test]
fn test_zero_offset_is_same_day_even_on_weekend() {
    let holidays = HolidayCalendar::default();
    let calculator = DeadlineCalculator::new(Timezone::default(), &holidays);

    assert_eq!(calculator.due_date(ymd(2024, 6, 29), 0, CalendarMode::Business), ymd(2024, 6, 29));
}

#[test]
fn test_configured_holidays_are_honoured() {
    let json = r#"[
        {"date": "2024-05-21", "name": "Practice closure"},
        {"date": "2024-05-22", "name": "Practice closure"}
    ]"#;
    let closures: HolidayCalendar = serde_json::from_str(json).unwrap();
    let holidays = HolidayCalendar::us_federal(2024..=2024).merged(&closures);
    let calculator = DeadlineCalculator::new(TemporalFixtures::timezone(), &holidays);

    let due = calculator.compute_due_date(TemporalFixtures::negotiation_ended_at(), &idr_filing_rule());

    // Tue/Wed closed and Memorial Day skipped: Thu 23, Fri 24, Tue 28, Wed 29
    assert_eq!(TemporalFixtures::timezone().local_date(due), ymd(2024, 5, 29));
    assert_eq!(holidays.name_of(ymd(2024, 5, 21)), Some("Practice closure"));
}

#[test]
fn test_any_holiday_provider_can_be_plugged_in() {
    let closures: BTreeSet<NaiveDate> = [ymd(2024, 5, 21)].into_iter().collect();
    assert!(closures.is_holiday(ymd(2024, 5, 21)));

    let calculator = DeadlineCalculator::new(TemporalFixtures::timezone(), &closures);
    assert!(!calculator.is_business_day(ymd(2024, 5, 21)));
    assert!(calculator.is_business_day(ymd(2024, 5, 27)));
}

#[test]
fn test_calendar_dedupes_by_date() {
    let calendar = HolidayCalendar::new(vec![
        Holiday {
            date: ymd(2024, 7, 4),
            name: "Independence Day".to_string(),
        },
        Holiday {
            date: ymd(2024, 7, 4),
            name: "Duplicate".to_string(),
        },
    ]);
    assert_eq!(calendar.holidays().len(), 1);
}

// ============================================================================
// TIMEZONE NORMALIZATION
// ============================================================================

#[test]
fn test_calendar_offset_across_spring_forward() {
    let holidays = HolidayCalendar::default();
    let tz = TemporalFixtures::timezone();
    let calculator = DeadlineCalculator::new(tz, &holidays);
    let rule = DeadlineRule::new(
        DeadlineKind::AppealFilingDeadline,
        AnchorEventKind::PaymentDetermination,
        30,
        CalendarMode::Calendar,
    );

    // EST anchor, EDT due date
    let anchor = Utc.with_ymd_and_hms(2024, 3, 1, 17, 0, 0).unwrap();
    let due = calculator.compute_due_date(anchor, &rule);

    assert_eq!(due, Utc.with_ymd_and_hms(2024, 4, 1, 3, 59, 59).unwrap() + Duration::milliseconds(999));
}

#[test]
fn test_late_evening_anchor_counts_from_local_date() {
    let holidays = HolidayCalendar::default();
    let calculator = DeadlineCalculator::new(TemporalFixtures::timezone(), &holidays);
    let rule = DeadlineRule::new(
        DeadlineKind::NextLevelAppealDeadline,
        AnchorEventKind::DenialReceived,
        1,
        CalendarMode::Calendar,
    );

    // 01:30 UTC on the 2nd is still the 1st in New York
    let anchor = Utc.with_ymd_and_hms(2024, 7, 2, 1, 30, 0).unwrap();
    let due = calculator.compute_due_date(anchor, &rule);

    assert_eq!(TemporalFixtures::timezone().local_date(due), ymd(2024, 7, 2));
}

#[test]
fn test_same_rule_in_another_practice_timezone() {
    let holidays = HolidayCalendar::default();
    let tz = Timezone::new(chrono_tz::America::Los_Angeles);
    let calculator = DeadlineCalculator::new(tz, &holidays);

    let anchor = Utc.with_ymd_and_hms(2024, 7, 2, 5, 0, 0).unwrap();
    let due = calculator.compute_due_date(anchor, &idr_filing_rule());

    // Anchor is July 1st in Los Angeles; 4 business days with no holidays
    assert_eq!(tz.local_date(due), ymd(2024, 7, 5));
    assert_eq!(due, tz.end_of_day(ymd(2024, 7, 5)));
}

#[test]
fn test_computation_is_deterministic() {
    let holidays = HolidayCalendar::us_federal(2024..=2025);
    let calculator = DeadlineCalculator::new(TemporalFixtures::timezone(), &holidays);
    let anchor = TemporalFixtures::negotiation_ended_at();

    let first = calculator.compute_due_date(anchor, &idr_filing_rule());
    let second = calculator.compute_due_date(anchor, &idr_filing_rule());
    assert_eq!(first, second);
}
