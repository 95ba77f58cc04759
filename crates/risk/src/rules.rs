// In crates/risk/src/rules.rs

use crate::types::RuleDefaults;
use core_types::{GroupRule, RiskRuleSet, RuleSource};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Drawdown figures per product type, in percent.
struct TypeRule {
    name: &'static str,
    daily: Decimal,
    total: Decimal,
    target: Decimal,
}

const TYPE_RULES: [TypeRule; 10] = [
    TypeRule { name: "lite_instant", daily: dec!(3), total: dec!(6), target: dec!(0) },
    TypeRule { name: "lite_1_step", daily: dec!(3), total: dec!(6), target: dec!(9) },
    TypeRule { name: "lite_2_step_phase_1", daily: dec!(3), total: dec!(6), target: dec!(9) },
    TypeRule { name: "lite_2_step_phase_2", daily: dec!(3), total: dec!(6), target: dec!(6) },
    TypeRule { name: "lite_funded", daily: dec!(3), total: dec!(6), target: dec!(0) },
    TypeRule { name: "prime_instant", daily: dec!(4), total: dec!(7), target: dec!(0) },
    TypeRule { name: "prime_1_step", daily: dec!(4), total: dec!(10), target: dec!(9) },
    TypeRule { name: "prime_2_step_phase_1", daily: dec!(4), total: dec!(10), target: dec!(9) },
    TypeRule { name: "prime_2_step_phase_2", daily: dec!(4), total: dec!(10), target: dec!(6) },
    TypeRule { name: "prime_funded", daily: dec!(4), total: dec!(7), target: dec!(0) },
];

/// Canonical form of a venue group label: doubled path separators collapsed,
/// trimmed, lowercase.
pub fn normalize_group(label: &str) -> String {
    label.replace("\\\\", "\\").trim().to_lowercase()
}

/// A validated snapshot of the per-group rule table.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rows: Vec<(String, GroupRule)>,
}

impl RuleTable {
    /// Builds the lookup table. Rows with percentages outside `0..=100` are
    /// dropped so resolution falls through to the next source.
    pub fn new(rows: Vec<GroupRule>) -> Self {
        let rows = rows
            .into_iter()
            .filter(|row| {
                let valid = is_valid_row(row);
                if !valid {
                    tracing::warn!(group = %row.group_name, "Ignoring risk group with out-of-range percentages.");
                }
                valid
            })
            .map(|row| (normalize_group(&row.group_name), row))
            .filter(|(key, _)| !key.is_empty())
            .collect();
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn exact(&self, group: &str) -> Option<&GroupRule> {
        self.rows.iter().find(|(key, _)| key == group).map(|(_, row)| row)
    }

    /// Longest key that contains, or is contained in, the group.
    fn containing(&self, group: &str) -> Option<&GroupRule> {
        self.rows
            .iter()
            .filter(|(key, _)| group.contains(key.as_str()) || key.contains(group))
            .max_by_key(|(key, _)| key.len())
            .map(|(_, row)| row)
    }
}

fn is_valid_row(row: &GroupRule) -> bool {
    [
        row.max_total_loss_percent,
        row.max_daily_loss_percent,
        row.profit_target_percent,
        row.max_single_win_percent,
        row.max_single_loss_percent,
    ]
    .into_iter()
    .flatten()
    .all(|p| p >= Decimal::ZERO && p <= Decimal::ONE_HUNDRED)
}

fn type_rule(account_type: &str) -> Option<&'static TypeRule> {
    let by_name = |name: &str| TYPE_RULES.iter().find(|r| r.name == name);
    if let Some(rule) = by_name(account_type) {
        return Some(rule);
    }

    let family = if account_type.contains("lite") { "lite" } else { "prime" };
    let product = if account_type.contains("instant") {
        "instant"
    } else if account_type.contains("1_step") || account_type.contains("evaluation") {
        "1_step"
    } else if account_type.contains("phase_1") || account_type == "phase 1" {
        "2_step_phase_1"
    } else if account_type.contains("phase_2") || account_type == "phase 2" {
        "2_step_phase_2"
    } else if account_type.contains("funded") {
        "funded"
    } else {
        return None;
    };
    by_name(&format!("{family}_{product}"))
}

fn is_competition(group: &str, account_type: &str) -> bool {
    account_type.contains("competition") || group.contains("competition") || group.ends_with("\\comp")
}

fn is_instant(group: &str, account_type: &str) -> bool {
    account_type.contains("instant") || group.contains("instant")
}

/// Resolves the effective rules for one account.
///
/// # Arguments
///
/// * `group`: The venue group label, if the account has one.
/// * `account_type`: The product type, e.g. `prime_2_step_phase_1`.
/// * `table`: Snapshot of the per-group rule table.
/// * `defaults`: Configured fallbacks.
///
/// # Returns
///
/// The rule set and the source that decided its drawdown limits. Drawdown
/// comes from the first source that has it: exact group row, containing group
/// row, account type, hard defaults.
pub fn resolve(
    group: Option<&str>,
    account_type: &str,
    table: &RuleTable,
    defaults: &RuleDefaults,
) -> RiskRuleSet {
    let group = group.map(normalize_group).unwrap_or_default();
    let account_type = account_type.trim().to_lowercase();

    let (row, source) = if group.is_empty() {
        (None, None)
    } else if let Some(row) = table.exact(&group) {
        (Some(row), Some(RuleSource::GroupExact))
    } else if let Some(row) = table.containing(&group) {
        (Some(row), Some(RuleSource::GroupContains))
    } else {
        (None, None)
    };

    let typed = type_rule(&account_type);
    let competition = is_competition(&group, &account_type);

    let (type_total, type_daily) = if competition {
        (
            Some(defaults.competition_total_loss_percent),
            Some(defaults.competition_daily_loss_percent),
        )
    } else {
        (typed.map(|r| r.total), typed.map(|r| r.daily))
    };

    let row_total = row.and_then(|r| r.max_total_loss_percent);
    let row_daily = row.and_then(|r| r.max_daily_loss_percent);

    let source = match source {
        Some(s) if row_total.is_some() || row_daily.is_some() => s,
        _ if type_total.is_some() => RuleSource::AccountType,
        _ => RuleSource::Default,
    };

    let max_total_loss_percent = row_total.or(type_total).unwrap_or(defaults.total_loss_percent);
    let max_daily_loss_percent = row_daily.or(type_daily).unwrap_or(defaults.daily_loss_percent);

    let instant = is_instant(&group, &account_type);
    let max_single_loss_percent = row
        .and_then(|r| r.max_single_loss_percent)
        .unwrap_or(if instant || account_type.contains("funded") { dec!(1) } else { Decimal::ZERO });

    RiskRuleSet {
        max_total_loss_percent,
        max_daily_loss_percent,
        profit_target_percent: profit_target(&group, &account_type, row, typed),
        allow_martingale: row.and_then(|r| r.allow_martingale).unwrap_or(defaults.allow_martingale),
        allow_hedging: row.and_then(|r| r.allow_hedging).unwrap_or(defaults.allow_hedging),
        min_trade_duration_seconds: row
            .and_then(|r| r.min_trade_duration_seconds)
            .unwrap_or(defaults.min_trade_duration_seconds),
        max_single_win_percent: row
            .and_then(|r| r.max_single_win_percent)
            .unwrap_or(defaults.max_single_win_percent),
        consistency_enabled: row.and_then(|r| r.consistency_enabled).unwrap_or(instant),
        max_single_loss_percent,
        source,
    }
}

fn profit_target(
    group: &str,
    account_type: &str,
    row: Option<&GroupRule>,
    typed: Option<&TypeRule>,
) -> Decimal {
    const NO_TARGET: [&str; 4] = ["funded", "master", "instant", "competition"];
    if NO_TARGET
        .iter()
        .any(|k| account_type.contains(k) || group.contains(k))
    {
        return Decimal::ZERO;
    }

    let phase_two = ["phase 2", "step 2", "phase_2", "step_2"]
        .iter()
        .any(|k| account_type.contains(k));
    if phase_two {
        let standard_or_pro = ["demo\\s\\2", "2-sf", "demo\\sf\\2", "2-pro"]
            .iter()
            .any(|k| group.contains(k));
        return if standard_or_pro { dec!(6) } else { dec!(5) };
    }

    if let Some(target) = row.and_then(|r| r.profit_target_percent) {
        return target;
    }
    if let Some(rule) = typed {
        return rule.target;
    }
    dec!(8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, total: Decimal, daily: Decimal) -> GroupRule {
        GroupRule {
            group_name: name.to_string(),
            max_total_loss_percent: Some(total),
            max_daily_loss_percent: Some(daily),
            ..Default::default()
        }
    }

    #[test]
    fn normalizes_doubled_separators_and_case() {
        assert_eq!(normalize_group("  Demo\\\\S\\\\1-SF "), "demo\\s\\1-sf");
    }

    #[test]
    fn exact_group_match_wins() {
        let table = RuleTable::new(vec![row("demo\\S\\1-SF", dec!(8), dec!(4))]);
        let rules = resolve(Some("DEMO\\\\S\\\\1-SF"), "prime_1_step", &table, &RuleDefaults::default());
        assert_eq!(rules.source, RuleSource::GroupExact);
        assert_eq!(rules.max_total_loss_percent, dec!(8));
        assert_eq!(rules.max_daily_loss_percent, dec!(4));
    }

    #[test]
    fn containment_match_is_second() {
        let table = RuleTable::new(vec![row("demo\\s\\2-sf", dec!(9), dec!(4.5))]);
        let rules = resolve(Some("real\\demo\\S\\2-SF\\usd"), "", &table, &RuleDefaults::default());
        assert_eq!(rules.source, RuleSource::GroupContains);
        assert_eq!(rules.max_total_loss_percent, dec!(9));
    }

    #[test]
    fn falls_back_to_account_type_then_defaults() {
        let table = RuleTable::default();
        let typed = resolve(Some("unknown\\group"), "lite_2_step_phase_1", &table, &RuleDefaults::default());
        assert_eq!(typed.source, RuleSource::AccountType);
        assert_eq!(typed.max_total_loss_percent, dec!(6));
        assert_eq!(typed.max_daily_loss_percent, dec!(3));
        assert_eq!(typed.profit_target_percent, dec!(9));

        let legacy = resolve(None, "evaluation", &table, &RuleDefaults::default());
        assert_eq!(legacy.max_total_loss_percent, dec!(10));
        assert_eq!(legacy.max_daily_loss_percent, dec!(4));

        let unknown = resolve(None, "mystery", &table, &RuleDefaults::default());
        assert_eq!(unknown.source, RuleSource::Default);
        assert_eq!(unknown.max_total_loss_percent, dec!(10));
        assert_eq!(unknown.max_daily_loss_percent, dec!(5));
        assert_eq!(unknown.profit_target_percent, dec!(8));
    }

    #[test]
    fn competition_accounts_get_their_own_drawdown() {
        let rules = resolve(None, "competition", &RuleTable::default(), &RuleDefaults::default());
        assert_eq!(rules.source, RuleSource::AccountType);
        assert_eq!(rules.max_total_loss_percent, dec!(20));
        assert_eq!(rules.max_daily_loss_percent, dec!(10));
        assert_eq!(rules.profit_target_percent, Decimal::ZERO);
    }

    #[test]
    fn null_row_columns_fall_back_per_column() {
        let partial = GroupRule {
            group_name: "demo\\x".into(),
            max_total_loss_percent: Some(dec!(12)),
            allow_hedging: Some(false),
            ..Default::default()
        };
        let rules = resolve(Some("demo\\x"), "", &RuleTable::new(vec![partial]), &RuleDefaults::default());
        assert_eq!(rules.max_total_loss_percent, dec!(12));
        assert_eq!(rules.max_daily_loss_percent, dec!(5));
        assert!(!rules.allow_hedging);
        assert!(rules.allow_martingale);
        assert_eq!(rules.min_trade_duration_seconds, 120);
    }

    #[test]
    fn invalid_rows_are_ignored() {
        let table = RuleTable::new(vec![row("demo\\bad", dec!(150), dec!(5))]);
        assert!(table.is_empty());
        let rules = resolve(Some("demo\\bad"), "", &table, &RuleDefaults::default());
        assert_eq!(rules.source, RuleSource::Default);
    }

    #[test]
    fn phase_two_targets_depend_on_group() {
        let table = RuleTable::default();
        let d = RuleDefaults::default();
        assert_eq!(resolve(Some("demo\\S\\2-SF"), "prime_2_step_phase_2", &table, &d).profit_target_percent, dec!(6));
        assert_eq!(resolve(Some("demo\\other"), "prime_2_step_phase_2", &table, &d).profit_target_percent, dec!(5));
        assert_eq!(resolve(None, "prime_instant", &table, &d).profit_target_percent, Decimal::ZERO);
    }

    #[test]
    fn instant_accounts_enable_consistency_and_single_loss_limit() {
        let rules = resolve(None, "prime_instant", &RuleTable::default(), &RuleDefaults::default());
        assert!(rules.consistency_enabled);
        assert_eq!(rules.max_single_loss_percent, dec!(1));

        let eval = resolve(None, "prime_1_step", &RuleTable::default(), &RuleDefaults::default());
        assert!(!eval.consistency_enabled);
        assert_eq!(eval.max_single_loss_percent, Decimal::ZERO);
    }
}
