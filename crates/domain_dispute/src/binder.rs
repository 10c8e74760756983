//! Correspondence binding
//!
//! Templates are opaque text with `{VariableName}` placeholders. Binding
//! builds a resolution map from the case's facts and state, substitutes every
//! placeholder it can, and reports every variable it could not resolve in
//! one error rather than stopping at the first gap. Binding has no side
//! effects: the same template, facts and case always produce the same
//! document.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{Money, Timezone};

use crate::case::Case;
use crate::error::BindError;
use crate::facts::FactModel;

pub const APPEAL_LETTER: &str = "appeal_letter";
pub const OPEN_NEGOTIATION_NOTICE: &str = "open_negotiation_notice";
pub const IDR_INITIATION_NOTICE: &str = "idr_initiation_notice";

/// A correspondence template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub key: String,
    #[serde(default)]
    pub required_variables: Vec<String>,
    pub body: String,
}

impl Template {
    pub fn new(key: impl Into<String>, required_variables: &[&str], body: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            required_variables: required_variables.iter().map(|v| v.to_string()).collect(),
            body: body.into(),
        }
    }

    /// Placeholder names in order of first appearance
    pub fn placeholders(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for span in placeholder_spans(&self.body) {
            if !names.iter().any(|n| n == span.name) {
                names.push(span.name.to_string());
            }
        }
        names
    }
}

/// A bound document ready to hand to a renderer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundDocument {
    pub template_key: String,
    pub text: String,
    /// Values used for the substitution
    pub resolved: BTreeMap<String, String>,
    pub bound_at: DateTime<Utc>,
}

/// Templates keyed by template key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Template>", into = "Vec<Template>")]
pub struct TemplateLibrary {
    templates: BTreeMap<String, Template>,
}

impl From<Vec<Template>> for TemplateLibrary {
    fn from(templates: Vec<Template>) -> Self {
        Self {
            templates: templates.into_iter().map(|t| (t.key.clone(), t)).collect(),
        }
    }
}

impl From<TemplateLibrary> for Vec<Template> {
    fn from(library: TemplateLibrary) -> Self {
        library.templates.into_values().collect()
    }
}

impl Default for TemplateLibrary {
    fn default() -> Self {
        Self::from(vec![
            Template::new(
                APPEAL_LETTER,
                &[
                    "ClaimId",
                    "PatientRef",
                    "PayerName",
                    "DateOfService",
                    "ProcedureCode",
                    "PaidAmount",
                    "ExpectedAmount",
                    "DisputedAmount",
                    "AppealFilingDeadline",
                ],
                "{BoundDate}\n\n\
                 {PayerName}\n\
                 Appeals Department\n\n\
                 Re: Request for reconsideration of claim {ClaimId}\n\
                 Patient reference: {PatientRef}\n\
                 Date of service: {DateOfService}\n\
                 Procedure: {ProcedureCode}\n\n\
                 We are writing to appeal the payment of {PaidAmount} issued on this claim. \
                 The expected reimbursement for this service is {ExpectedAmount}, leaving an \
                 underpayment of {DisputedAmount}.\n\n\
                 Please reprocess the claim and remit the outstanding balance. This appeal is \
                 submitted ahead of the filing deadline of {AppealFilingDeadline}.\n\n\
                 Case reference: {CaseId}\n",
            ),
            Template::new(
                OPEN_NEGOTIATION_NOTICE,
                &[
                    "ClaimId",
                    "PayerName",
                    "DateOfService",
                    "ProcedureCode",
                    "BilledAmount",
                    "PaidAmount",
                    "NegotiationStartDate",
                    "OpenNegotiationPeriodEnd",
                ],
                "OPEN NEGOTIATION NOTICE\n\n\
                 Date: {BoundDate}\n\
                 To: {PayerName}\n\
                 Claim: {ClaimId}\n\
                 Date of service: {DateOfService}\n\
                 Service code: {ProcedureCode}\n\
                 Plan type: {PlanType}\n\n\
                 The provider initiates the open negotiation period for the item or service \
                 above under the No Surprises Act. Billed amount: {BilledAmount}. Initial \
                 payment: {PaidAmount}.\n\n\
                 Negotiation opened on {NegotiationStartDate} and the open negotiation period \
                 ends on {OpenNegotiationPeriodEnd}.\n\n\
                 Case reference: {CaseId}\n",
            ),
            Template::new(
                IDR_INITIATION_NOTICE,
                &[
                    "ClaimId",
                    "PayerName",
                    "Venue",
                    "Jurisdiction",
                    "DateOfService",
                    "ProcedureCode",
                    "AllowedAmount",
                    "PaidAmount",
                    "NegotiationEndDate",
                    "IDRFilingDeadline",
                ],
                "NOTICE OF IDR INITIATION\n\n\
                 Date: {BoundDate}\n\
                 To: {PayerName}\n\
                 Forum: {Venue} ({Jurisdiction})\n\
                 Claim: {ClaimId}\n\
                 Date of service: {DateOfService}\n\
                 Service code: {ProcedureCode}\n\
                 Qualifying payment amount: {AllowedAmount}\n\
                 Initial payment: {PaidAmount}\n\n\
                 Open negotiation concluded on {NegotiationEndDate} without agreement. The \
                 provider will initiate independent dispute resolution no later than \
                 {IDRFilingDeadline}.\n\n\
                 Case reference: {CaseId}\n",
            ),
        ])
    }
}

impl TemplateLibrary {
    pub fn empty() -> Self {
        Self {
            templates: BTreeMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Template> {
        self.templates.get(key)
    }

    /// Adds or replaces a template
    pub fn insert(&mut self, template: Template) {
        self.templates.insert(template.key.clone(), template);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.templates.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }
}

/// Resolves templates against a case in the practice timezone
#[derive(Debug, Clone, Copy)]
pub struct DocumentBinder {
    timezone: Timezone,
}

impl DocumentBinder {
    pub fn new(timezone: Timezone) -> Self {
        Self { timezone }
    }

    /// Binds a template
    ///
    /// # Errors
    ///
    /// Returns `BindError` listing every placeholder and required variable
    /// without a value, deduplicated, body placeholders first.
    pub fn bind(&self, template: &Template, facts: &FactModel, case: &Case) -> Result<BoundDocument, BindError> {
        let resolved = self.resolution_map(facts, case);
        let mut missing: Vec<String> = Vec::new();
        let mut note_missing = |name: &str| {
            if !missing.iter().any(|m| m == name) {
                missing.push(name.to_string());
            }
        };

        let body = &template.body;
        let mut text = String::with_capacity(body.len());
        let mut cursor = 0;
        for span in placeholder_spans(body) {
            text.push_str(&body[cursor..span.start]);
            match resolved.get(span.name) {
                Some(value) => text.push_str(value),
                None => note_missing(span.name),
            }
            cursor = span.end;
        }
        text.push_str(&body[cursor..]);

        for required in &template.required_variables {
            if !resolved.contains_key(required) {
                note_missing(required.as_str());
            }
        }

        if !missing.is_empty() {
            return Err(BindError {
                template_key: template.key.clone(),
                missing_variables: missing,
            });
        }

        Ok(BoundDocument {
            template_key: template.key.clone(),
            text,
            resolved,
            bound_at: case.updated_at(),
        })
    }

    /// Every variable resolvable for this case
    pub fn resolution_map(&self, facts: &FactModel, case: &Case) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        let mut text = |key: &str, value: &str| {
            if !value.trim().is_empty() {
                map.insert(key.to_string(), value.to_string());
            }
        };

        text("ClaimId", facts.claim_id());
        text("PatientRef", facts.patient_ref());
        text("ProcedureCode", facts.procedure_code());
        text("ProcedureCategory", facts.procedure_category());
        text("PayerName", facts.payer().name.as_str());
        text("PlanType", facts.plan_type().display_name());
        text("NetworkStatus", facts.network_status().as_str());
        text("FacilityType", facts.facility().facility_type.as_str());
        text("Jurisdiction", facts.jurisdiction());
        text("CaseId", case.id().to_string().as_str());
        text("Venue", case.venue().display_name());
        text("VenueCode", case.venue().as_str());
        text("CaseStatus", case.status().as_str());
        text("EligibilityReasons", case.eligibility_reasons().join("; ").as_str());

        let mut money = |key: &str, value: Option<Money>| {
            if let Some(amount) = value {
                map.insert(key.to_string(), amount.to_string());
            }
        };
        money("BilledAmount", Some(facts.financials().billed));
        money("PaidAmount", Some(facts.financials().paid));
        money("AllowedAmount", facts.financials().allowed);
        money("ContractedRate", facts.contracted_rate());
        money("ExpectedAmount", facts.expected_amount());
        money("DisputedAmount", facts.disputed_amount());
        money("UnpaidBalance", facts.unpaid_balance());

        map.insert("DateOfService".to_string(), format_date(facts.date_of_service()));
        if let Some(received_on) = facts.remittance_received_on() {
            map.insert("RemittanceDate".to_string(), format_date(received_on));
        }
        map.insert("OpenedDate".to_string(), self.local_date(case.opened_at()));
        map.insert("BoundDate".to_string(), self.local_date(case.updated_at()));

        for (anchor, at) in case.anchors() {
            map.insert(anchor.date_variable().to_string(), self.local_date(*at));
        }
        for deadline in case.latest_deadlines() {
            map.insert(deadline.kind.as_str().to_string(), self.local_date(deadline.due_at));
        }

        map
    }

    fn local_date(&self, at: DateTime<Utc>) -> String {
        format_date(self.timezone.local_date(at))
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

struct PlaceholderSpan<'a> {
    start: usize,
    end: usize,
    name: &'a str,
}

/// `{Name}` occurrences; braces around anything else are literal text
fn placeholder_spans(body: &str) -> Vec<PlaceholderSpan<'_>> {
    let bytes = body.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            if let Some(len) = body[i + 1..].find('}') {
                let name = &body[i + 1..i + 1 + len];
                if is_variable_name(name) {
                    spans.push(PlaceholderSpan {
                        start: i,
                        end: i + len + 2,
                        name,
                    });
                    i += len + 2;
                    continue;
                }
            }
        }
        i += 1;
    }
    spans
}

fn is_variable_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => chars.all(|c| c.is_ascii_alphanumeric() || c == '_'),
        _ => false,
    }
}

/// True if `text` still contains a `{Name}` placeholder
pub fn has_placeholders(text: &str) -> bool {
    !placeholder_spans(text).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_in_order_without_duplicates() {
        let template = Template::new("t", &[], "{A} and {B}, then {A} again; {not a var} {} {C_2}");
        assert_eq!(template.placeholders(), vec!["A", "B", "C_2"]);
    }

    #[test]
    fn test_unbalanced_braces_are_literal() {
        assert!(!has_placeholders("payment of {"));
        assert!(!has_placeholders("json {\"a\": 1}"));
        assert!(has_placeholders("{{ClaimId}"));
    }

    #[test]
    fn test_default_library_declares_its_placeholders() {
        let library = TemplateLibrary::default();
        for key in [APPEAL_LETTER, OPEN_NEGOTIATION_NOTICE, IDR_INITIATION_NOTICE] {
            let template = library.get(key).unwrap();
            for required in &template.required_variables {
                assert!(
                    template.placeholders().contains(required),
                    "{} requires {} but never uses it",
                    key,
                    required
                );
            }
        }
    }

    #[test]
    fn test_library_serde_is_a_list() {
        let json = r#"[{"key": "fax_cover", "body": "To {PayerName}"}]"#;
        let library: TemplateLibrary = serde_json::from_str(json).unwrap();
        assert!(library.contains("fax_cover"));
        assert!(library.get("fax_cover").unwrap().required_variables.is_empty());
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date(NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()), "March 4, 2024");
    }
}
