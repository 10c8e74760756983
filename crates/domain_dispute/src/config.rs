//! Engine configuration
//!
//! Deadline rules, document bindings, templates, holidays and the
//! eligibility registries are data. Every field has a default so a
//! configuration file only needs to carry what it overrides.

use serde::{Deserialize, Serialize};

use core_kernel::Timezone;

use crate::binder::{TemplateLibrary, APPEAL_LETTER, IDR_INITIATION_NOTICE, OPEN_NEGOTIATION_NOTICE};
use crate::classifier::{DisputePath, EligibilityClassifier};
use crate::deadline::{
    AnchorEventKind, CalendarMode, DeadlineKind, DeadlineRule, HolidayCalendar, DEFAULT_URGENT_THRESHOLD_DAYS,
};
use crate::error::DisputeError;
use crate::lifecycle::CaseStatus;

/// Deadline rule attached to a status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDeadlineRule {
    pub on_enter: CaseStatus,
    /// Restricts the rule to one path; both paths when absent
    #[serde(default)]
    pub path: Option<DisputePath>,
    pub rule: DeadlineRule,
}

/// Template bound when a case enters a status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentBinding {
    pub on_enter: CaseStatus,
    #[serde(default)]
    pub path: Option<DisputePath>,
    pub template_key: String,
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Recorded on every computed deadline
    pub version: String,
    pub timezone: Timezone,
    pub urgent_threshold_days: i64,
    pub max_appeal_reentries: u32,
    pub classifier: EligibilityClassifier,
    pub deadline_rules: Vec<StateDeadlineRule>,
    pub document_bindings: Vec<DocumentBinding>,
    pub templates: TemplateLibrary,
    pub holidays: HolidayCalendar,
}

impl Default for EngineConfig {
    fn default() -> Self {
        use AnchorEventKind as Anchor;
        use CalendarMode::{Business, Calendar};
        use DeadlineKind as Kind;

        let nsa = Some(DisputePath::Nsa);
        let appeal = Some(DisputePath::Appeal);
        let on = |on_enter, path, rule| StateDeadlineRule { on_enter, path, rule };

        let deadline_rules = vec![
            on(
                CaseStatus::New,
                nsa,
                DeadlineRule::new(Kind::OpenNegotiationInitiation, Anchor::PaymentDetermination, 30, Business)
                    .informational(),
            ),
            on(
                CaseStatus::InNegotiation,
                nsa,
                DeadlineRule::new(Kind::OpenNegotiationPeriodEnd, Anchor::NegotiationStarted, 30, Business),
            ),
            on(
                CaseStatus::ReadyForIdr,
                nsa,
                DeadlineRule::new(Kind::IdrFilingDeadline, Anchor::NegotiationEnded, 4, Business),
            ),
            on(
                CaseStatus::IdrFiled,
                nsa,
                DeadlineRule::new(Kind::IdrEntitySelection, Anchor::IdrInitiated, 3, Business).informational(),
            ),
            on(
                CaseStatus::AppealDrafted,
                appeal,
                DeadlineRule::new(Kind::AppealFilingDeadline, Anchor::PaymentDetermination, 180, Calendar),
            ),
            on(
                CaseStatus::AppealSubmitted,
                appeal,
                DeadlineRule::new(Kind::AppealDecisionExpected, Anchor::AppealSubmitted, 30, Calendar)
                    .informational(),
            ),
            on(
                CaseStatus::Denied,
                appeal,
                DeadlineRule::new(Kind::NextLevelAppealDeadline, Anchor::DenialReceived, 60, Calendar),
            ),
        ];

        let binding = |on_enter, path, key: &str| DocumentBinding {
            on_enter,
            path,
            template_key: key.to_string(),
        };
        let document_bindings = vec![
            binding(CaseStatus::InNegotiation, nsa, OPEN_NEGOTIATION_NOTICE),
            binding(CaseStatus::ReadyForIdr, nsa, IDR_INITIATION_NOTICE),
            binding(CaseStatus::AppealDrafted, appeal, APPEAL_LETTER),
        ];

        Self {
            version: "default".to_string(),
            timezone: Timezone::new(chrono_tz::America::New_York),
            urgent_threshold_days: DEFAULT_URGENT_THRESHOLD_DAYS,
            max_appeal_reentries: 2,
            classifier: EligibilityClassifier::default(),
            deadline_rules,
            document_bindings,
            templates: TemplateLibrary::default(),
            holidays: HolidayCalendar::us_federal(2020..=2035),
        }
    }
}

impl EngineConfig {
    /// Parses a JSON configuration document
    pub fn from_json(json: &str) -> Result<Self, DisputeError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| DisputeError::InvalidConfiguration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-references between bindings and templates
    pub fn validate(&self) -> Result<(), DisputeError> {
        if self.version.trim().is_empty() {
            return Err(DisputeError::InvalidConfiguration("version must not be empty".to_string()));
        }
        if self.urgent_threshold_days < 0 {
            return Err(DisputeError::InvalidConfiguration(
                "urgent_threshold_days must not be negative".to_string(),
            ));
        }
        for binding in &self.document_bindings {
            if !self.templates.contains(&binding.template_key) {
                return Err(DisputeError::InvalidConfiguration(format!(
                    "binding for {} references unknown template '{}'",
                    binding.on_enter, binding.template_key
                )));
            }
        }
        for state_rule in &self.deadline_rules {
            if state_rule.on_enter.is_closed() {
                return Err(DisputeError::InvalidConfiguration(format!(
                    "deadline {} cannot attach to Closed",
                    state_rule.rule.kind
                )));
            }
        }
        Ok(())
    }

    /// Deadline rules that fire on entering `status` on `path`
    pub fn deadline_rules_for(&self, status: CaseStatus, path: DisputePath) -> impl Iterator<Item = &DeadlineRule> {
        self.deadline_rules
            .iter()
            .filter(move |r| r.on_enter == status && r.path.map_or(true, |p| p == path))
            .map(|r| &r.rule)
    }

    /// Template keys bound on entering `status` on `path`
    pub fn document_bindings_for(&self, status: CaseStatus, path: DisputePath) -> impl Iterator<Item = &str> {
        self.document_bindings
            .iter()
            .filter(move |b| b.on_enter == status && b.path.map_or(true, |p| p == path))
            .map(|b| b.template_key.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_appeal_reentries, 2);
        assert_eq!(config.urgent_threshold_days, 7);
    }

    #[test]
    fn test_rules_filtered_by_path() {
        let config = EngineConfig::default();
        let nsa: Vec<_> = config.deadline_rules_for(CaseStatus::New, DisputePath::Nsa).collect();
        let appeal: Vec<_> = config.deadline_rules_for(CaseStatus::New, DisputePath::Appeal).collect();
        assert_eq!(nsa.len(), 1);
        assert!(appeal.is_empty());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EngineConfig::from_json(
            r#"{"version": "2024.2", "timezone": "America/Chicago", "max_appeal_reentries": 1}"#,
        )
        .unwrap();
        assert_eq!(config.version, "2024.2");
        assert_eq!(config.timezone.name(), "America/Chicago");
        assert_eq!(config.max_appeal_reentries, 1);
        assert_eq!(config.deadline_rules, EngineConfig::default().deadline_rules);
    }

    #[test]
    fn test_binding_to_unknown_template_is_rejected() {
        let mut config = EngineConfig::default();
        config.document_bindings.push(DocumentBinding {
            on_enter: CaseStatus::IdrFiled,
            path: None,
            template_key: "missing".to_string(),
        });
        assert!(matches!(config.validate(), Err(DisputeError::InvalidConfiguration(_))));
    }
}
