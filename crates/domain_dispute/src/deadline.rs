//! Regulatory deadline computation
//!
//! A deadline is an anchor event plus an offset counted in the practice's
//! local days, either plain calendar days or business days that skip weekends
//! and holidays. The due instant is the last millisecond of the due date in
//! the practice timezone.
//!
//! Computed deadlines are records, not live formulas: each one carries a frozen
//! copy of the rule that produced it and the configuration version in force,
//! so reloading the rule table never changes a deadline already attached to a
//! case.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::RangeInclusive;

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};

use core_kernel::{DeadlineId, Timezone};

use crate::lifecycle::CaseStatus;

/// Default window for flagging a deadline as urgent
pub const DEFAULT_URGENT_THRESHOLD_DAYS: i64 = 7;

/// How an offset is counted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarMode {
    Calendar,
    Business,
}

/// Whether a missing anchor blocks the transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeadlineRequirement {
    #[default]
    Statutory,
    Informational,
}

/// Timestamped events deadlines are counted from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AnchorEventKind {
    CaseOpened,
    DateOfService,
    PaymentDetermination,
    NegotiationStarted,
    NegotiationEnded,
    #[serde(rename = "IDRInitiated")]
    IdrInitiated,
    AppealSubmitted,
    DenialReceived,
}

impl AnchorEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnchorEventKind::CaseOpened => "CaseOpened",
            AnchorEventKind::DateOfService => "DateOfService",
            AnchorEventKind::PaymentDetermination => "PaymentDetermination",
            AnchorEventKind::NegotiationStarted => "NegotiationStarted",
            AnchorEventKind::NegotiationEnded => "NegotiationEnded",
            AnchorEventKind::IdrInitiated => "IDRInitiated",
            AnchorEventKind::AppealSubmitted => "AppealSubmitted",
            AnchorEventKind::DenialReceived => "DenialReceived",
        }
    }

    /// Template variable holding this anchor's local date
    pub fn date_variable(&self) -> &'static str {
        match self {
            AnchorEventKind::CaseOpened => "CaseOpenedDate",
            AnchorEventKind::DateOfService => "ServiceDate",
            AnchorEventKind::PaymentDetermination => "PaymentDeterminationDate",
            AnchorEventKind::NegotiationStarted => "NegotiationStartDate",
            AnchorEventKind::NegotiationEnded => "NegotiationEndDate",
            AnchorEventKind::IdrInitiated => "IDRInitiatedDate",
            AnchorEventKind::AppealSubmitted => "AppealSubmittedDate",
            AnchorEventKind::DenialReceived => "DenialDate",
        }
    }

    pub fn all() -> [AnchorEventKind; 8] {
        [
            AnchorEventKind::CaseOpened,
            AnchorEventKind::DateOfService,
            AnchorEventKind::PaymentDetermination,
            AnchorEventKind::NegotiationStarted,
            AnchorEventKind::NegotiationEnded,
            AnchorEventKind::IdrInitiated,
            AnchorEventKind::AppealSubmitted,
            AnchorEventKind::DenialReceived,
        ]
    }
}

impl fmt::Display for AnchorEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deadlines the engine tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DeadlineKind {
    OpenNegotiationInitiation,
    OpenNegotiationPeriodEnd,
    #[serde(rename = "IDRFilingDeadline")]
    IdrFilingDeadline,
    #[serde(rename = "IDREntitySelection")]
    IdrEntitySelection,
    AppealFilingDeadline,
    AppealDecisionExpected,
    NextLevelAppealDeadline,
}

impl DeadlineKind {
    /// Wire name, also the template variable for the due date
    pub fn as_str(&self) -> &'static str {
        match self {
            DeadlineKind::OpenNegotiationInitiation => "OpenNegotiationInitiation",
            DeadlineKind::OpenNegotiationPeriodEnd => "OpenNegotiationPeriodEnd",
            DeadlineKind::IdrFilingDeadline => "IDRFilingDeadline",
            DeadlineKind::IdrEntitySelection => "IDREntitySelection",
            DeadlineKind::AppealFilingDeadline => "AppealFilingDeadline",
            DeadlineKind::AppealDecisionExpected => "AppealDecisionExpected",
            DeadlineKind::NextLevelAppealDeadline => "NextLevelAppealDeadline",
        }
    }
}

impl fmt::Display for DeadlineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rule from the configured deadline table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlineRule {
    pub kind: DeadlineKind,
    pub anchor: AnchorEventKind,
    pub offset_days: u32,
    pub calendar: CalendarMode,
    #[serde(default)]
    pub requirement: DeadlineRequirement,
}

impl DeadlineRule {
    pub fn new(kind: DeadlineKind, anchor: AnchorEventKind, offset_days: u32, calendar: CalendarMode) -> Self {
        Self {
            kind,
            anchor,
            offset_days,
            calendar,
            requirement: DeadlineRequirement::Statutory,
        }
    }

    pub fn informational(mut self) -> Self {
        self.requirement = DeadlineRequirement::Informational;
        self
    }
}

/// The anchor a deadline was computed from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorRef {
    pub anchor: AnchorEventKind,
    pub anchored_at: DateTime<Utc>,
}

/// A computed deadline attached to a case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deadline {
    pub id: DeadlineId,
    pub kind: DeadlineKind,
    pub due_at: DateTime<Utc>,
    pub computed_from: AnchorRef,
    /// Frozen copy of the rule in force at computation time
    pub rule: DeadlineRule,
    pub rule_set_version: String,
    /// Case state whose entry produced this deadline
    pub attached_to: CaseStatus,
    pub computed_at: DateTime<Utc>,
    /// Earlier record for the same kind replaced by an anchor correction
    #[serde(default)]
    pub supersedes: Option<DeadlineId>,
}

impl Deadline {
    /// Whole days from `now` until the deadline, negative once overdue
    pub fn days_until(&self, now: DateTime<Utc>) -> i64 {
        (self.due_at - now).num_days()
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        now > self.due_at
    }

    pub fn is_urgent(&self, now: DateTime<Utc>, threshold_days: i64) -> bool {
        self.days_until(now) <= threshold_days
    }

    /// Urgency view relative to `now`
    pub fn status_at(&self, now: DateTime<Utc>, threshold_days: i64) -> DeadlineStatus {
        DeadlineStatus {
            deadline_id: self.id,
            kind: self.kind,
            due_at: self.due_at,
            anchor: self.computed_from.anchor,
            days_until: self.days_until(now),
            is_urgent: self.is_urgent(now, threshold_days),
            is_overdue: self.is_overdue(now),
        }
    }
}

/// Derived urgency for display and alerting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlineStatus {
    pub deadline_id: DeadlineId,
    pub kind: DeadlineKind,
    pub due_at: DateTime<Utc>,
    pub anchor: AnchorEventKind,
    pub days_until: i64,
    pub is_urgent: bool,
    pub is_overdue: bool,
}

/// Source of non-working days
pub trait HolidayProvider: Send + Sync {
    fn is_holiday(&self, date: NaiveDate) -> bool;
}

/// A named non-working day
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Holiday {
    pub date: NaiveDate,
    pub name: String,
}

/// Sorted set of holidays loaded from configuration or generated
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Holiday>", into = "Vec<Holiday>")]
pub struct HolidayCalendar {
    holidays: Vec<Holiday>,
}

impl From<Vec<Holiday>> for HolidayCalendar {
    fn from(mut holidays: Vec<Holiday>) -> Self {
        holidays.sort();
        holidays.dedup_by_key(|h| h.date);
        Self { holidays }
    }
}

impl From<HolidayCalendar> for Vec<Holiday> {
    fn from(calendar: HolidayCalendar) -> Self {
        calendar.holidays
    }
}

impl HolidayCalendar {
    pub fn new(holidays: Vec<Holiday>) -> Self {
        Self::from(holidays)
    }

    /// US federal holidays with Saturday→Friday and Sunday→Monday observance
    pub fn us_federal(years: RangeInclusive<i32>) -> Self {
        let mut holidays = Vec::new();
        for year in years {
            holidays.extend(us_federal_holidays(year));
        }
        Self::from(holidays)
    }

    /// Combines two calendars
    pub fn merged(&self, other: &HolidayCalendar) -> Self {
        let mut holidays = self.holidays.clone();
        holidays.extend(other.holidays.iter().cloned());
        Self::from(holidays)
    }

    pub fn holidays(&self) -> &[Holiday] {
        &self.holidays
    }

    pub fn name_of(&self, date: NaiveDate) -> Option<&str> {
        self.holidays
            .binary_search_by_key(&date, |h| h.date)
            .ok()
            .map(|idx| self.holidays[idx].name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.holidays.is_empty()
    }
}

impl HolidayProvider for HolidayCalendar {
    fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.binary_search_by_key(&date, |h| h.date).is_ok()
    }
}

/// Fixed set of dates, handy for ad-hoc closures
impl HolidayProvider for BTreeSet<NaiveDate> {
    fn is_holiday(&self, date: NaiveDate) -> bool {
        self.contains(&date)
    }
}

fn us_federal_holidays(year: i32) -> Vec<Holiday> {
    let mut out = Vec::with_capacity(11);
    let mut fixed = |month: u32, day: u32, name: &str| {
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            out.push(Holiday {
                date: observed(date),
                name: name.to_string(),
            });
        }
    };
    fixed(1, 1, "New Year's Day");
    if year >= 2021 {
        fixed(6, 19, "Juneteenth National Independence Day");
    }
    fixed(7, 4, "Independence Day");
    fixed(11, 11, "Veterans Day");
    fixed(12, 25, "Christmas Day");

    let floating = [
        (1, Weekday::Mon, 3, "Martin Luther King Jr. Day"),
        (2, Weekday::Mon, 3, "Washington's Birthday"),
        (9, Weekday::Mon, 1, "Labor Day"),
        (10, Weekday::Mon, 2, "Columbus Day"),
        (11, Weekday::Thu, 4, "Thanksgiving Day"),
    ];
    for (month, weekday, n, name) in floating {
        if let Some(date) = NaiveDate::from_weekday_of_month_opt(year, month, weekday, n) {
            out.push(Holiday {
                date,
                name: name.to_string(),
            });
        }
    }

    let memorial = NaiveDate::from_weekday_of_month_opt(year, 5, Weekday::Mon, 5)
        .or_else(|| NaiveDate::from_weekday_of_month_opt(year, 5, Weekday::Mon, 4));
    if let Some(date) = memorial {
        out.push(Holiday {
            date,
            name: "Memorial Day".to_string(),
        });
    }

    out
}

fn observed(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date.pred_opt().unwrap_or(date),
        Weekday::Sun => date.succ_opt().unwrap_or(date),
        _ => date,
    }
}

/// Computes due instants in the practice timezone
pub struct DeadlineCalculator<'a> {
    timezone: Timezone,
    holidays: &'a dyn HolidayProvider,
}

impl<'a> DeadlineCalculator<'a> {
    pub fn new(timezone: Timezone, holidays: &'a dyn HolidayProvider) -> Self {
        Self { timezone, holidays }
    }

    pub fn timezone(&self) -> Timezone {
        self.timezone
    }

    /// Due instant for a rule anchored at `anchor_at`
    ///
    /// Counting starts from the anchor's local date; the result is the end of
    /// the due date in the practice timezone, expressed in UTC.
    pub fn compute_due_date(&self, anchor_at: DateTime<Utc>, rule: &DeadlineRule) -> DateTime<Utc> {
        let start = self.timezone.local_date(anchor_at);
        let due = self.due_date(start, rule.offset_days, rule.calendar);
        self.timezone.end_of_day(due)
    }

    /// Local due date for an offset from `start`
    pub fn due_date(&self, start: NaiveDate, offset_days: u32, mode: CalendarMode) -> NaiveDate {
        match mode {
            CalendarMode::Calendar => start
                .checked_add_days(Days::new(u64::from(offset_days)))
                .unwrap_or(NaiveDate::MAX),
            CalendarMode::Business => {
                let mut date = start;
                let mut remaining = offset_days;
                while remaining > 0 {
                    match date.succ_opt() {
                        Some(next) => date = next,
                        None => break,
                    }
                    if self.is_business_day(date) {
                        remaining -= 1;
                    }
                }
                date
            }
        }
    }

    pub fn is_business_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.holidays.is_holiday(date)
    }
}
