//! Settings upgrade applied once at load.
//!
//! Repairs documents written by older versions or edited by hand so the rest
//! of the runtime can rely on every rule having a filter and a destination.

use tracing::info;

use crate::schema::{
    DEFAULT_MESSAGE_FILTER_QUERY, DistributionRule, FilterCondition, SyncConfig,
    default_file_path_template, default_note_path_template,
};

/// What [`upgrade`] changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UpgradeReport {
    /// `cache_cleanup_at_startup` was set; the caller should clear the
    /// user session cache.
    pub cache_cleanup_requested: bool,
    pub default_rule_added: bool,
    pub rules_repaired: usize,
}

impl UpgradeReport {
    /// The document differs from what was loaded and should be saved.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.cache_cleanup_requested || self.default_rule_added || self.rules_repaired > 0
    }
}

/// Repair `config` in place.
pub fn upgrade(config: &mut SyncConfig) -> UpgradeReport {
    let mut report = UpgradeReport::default();

    if config.cache_cleanup_at_startup {
        config.cache_cleanup_at_startup = false;
        report.cache_cleanup_requested = true;
    }

    if config.message_distribution_rules.is_empty() {
        config
            .message_distribution_rules
            .push(DistributionRule::default());
        report.default_rule_added = true;
    }

    for rule in &mut config.message_distribution_rules {
        let mut repaired = false;
        if !rule.has_filter() {
            rule.message_filter_query = DEFAULT_MESSAGE_FILTER_QUERY.into();
            rule.message_filter_conditions = vec![FilterCondition::default()];
            repaired = true;
        }
        if !rule.has_destination() {
            rule.note_path_template = default_note_path_template();
            rule.file_path_template = default_file_path_template();
            repaired = true;
        }
        if repaired {
            report.rules_repaired += 1;
        }
    }

    if report.changed() {
        info!(
            rules_repaired = report.rules_repaired,
            default_rule_added = report.default_rule_added,
            "settings upgraded"
        );
    }
    report
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_needs_no_upgrade() {
        let mut cfg = SyncConfig::default();
        let report = upgrade(&mut cfg);
        assert!(!report.changed());
        assert_eq!(cfg, SyncConfig::default());
    }

    #[test]
    fn empty_rules_get_a_default_rule() {
        let mut cfg = SyncConfig {
            message_distribution_rules: Vec::new(),
            ..Default::default()
        };
        let report = upgrade(&mut cfg);
        assert!(report.default_rule_added);
        assert_eq!(cfg.message_distribution_rules, vec![DistributionRule::default()]);
    }

    #[test]
    fn rule_without_filter_is_repaired() {
        let mut cfg = SyncConfig {
            message_distribution_rules: vec![DistributionRule {
                message_filter_query: String::new(),
                message_filter_conditions: Vec::new(),
                note_path_template: "Inbox/{{content:20}}.md".into(),
                file_path_template: String::new(),
                template_file_path: String::new(),
            }],
            ..Default::default()
        };
        let report = upgrade(&mut cfg);
        assert_eq!(report.rules_repaired, 1);
        let rule = &cfg.message_distribution_rules[0];
        assert_eq!(rule.message_filter_query, DEFAULT_MESSAGE_FILTER_QUERY);
        assert_eq!(rule.message_filter_conditions.len(), 1);
        // destination was valid and stays untouched
        assert_eq!(rule.note_path_template, "Inbox/{{content:20}}.md");
        assert!(rule.file_path_template.is_empty());
    }

    #[test]
    fn rule_without_destination_gets_default_paths() {
        let mut cfg = SyncConfig {
            message_distribution_rules: vec![DistributionRule {
                note_path_template: String::new(),
                file_path_template: String::new(),
                template_file_path: String::new(),
                ..Default::default()
            }],
            ..Default::default()
        };
        upgrade(&mut cfg);
        let rule = &cfg.message_distribution_rules[0];
        assert_eq!(rule.note_path_template, default_note_path_template());
        assert_eq!(rule.file_path_template, default_file_path_template());
    }

    #[test]
    fn template_file_alone_is_a_valid_destination() {
        let mut cfg = SyncConfig {
            message_distribution_rules: vec![DistributionRule {
                note_path_template: String::new(),
                file_path_template: String::new(),
                template_file_path: "Templates/telegram.md".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(!upgrade(&mut cfg).changed());
    }

    #[test]
    fn cache_cleanup_flag_is_consumed() {
        let mut cfg = SyncConfig {
            cache_cleanup_at_startup: true,
            ..Default::default()
        };
        let report = upgrade(&mut cfg);
        assert!(report.cache_cleanup_requested);
        assert!(report.changed());
        assert!(!cfg.cache_cleanup_at_startup);
    }
}
