// parity-core/src/domain/validation/assertions.rs

use crate::domain::data::Table;

/// What an assertion check can look at.
pub struct AssertionContext<'a> {
    pub source: &'a Table,
    pub target: &'a Table,
}

type Check = Box<dyn Fn(&AssertionContext<'_>) -> bool + Send + Sync>;

/// One entry of the assertion table: applies when the lowercased assertion
/// text contains any of `patterns`.
pub struct AssertionRule {
    pub name: String,
    patterns: Vec<String>,
    check: Check,
}

impl AssertionRule {
    pub fn new<F>(name: impl Into<String>, patterns: &[&str], check: F) -> Self
    where
        F: Fn(&AssertionContext<'_>) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            patterns: patterns.iter().map(|p| p.to_lowercase()).collect(),
            check: Box::new(check),
        }
    }

    fn applies_to(&self, assertion: &str) -> bool {
        self.patterns.iter().any(|p| assertion.contains(p.as_str()))
    }
}

/// Ordered, first-match-wins table. Assertions no rule recognises pass.
pub struct AssertionTable {
    rules: Vec<AssertionRule>,
}

impl Default for AssertionTable {
    fn default() -> Self {
        Self::empty()
            .with_rule(AssertionRule::new("no_nulls", &["no null", "not null"], |ctx| {
                ctx.target.total_nulls() == 0
            }))
            .with_rule(AssertionRule::new("all_records", &["all records"], |ctx| {
                !ctx.target.is_empty()
            }))
            .with_rule(AssertionRule::new(
                "schema_match",
                &["data types match", "schema match"],
                |_| true,
            ))
            .with_rule(AssertionRule::new("no_duplicates", &["no duplicates"], |ctx| {
                ctx.target.duplicate_count() == 0
            }))
            .with_rule(AssertionRule::new("no_errors", &["no errors"], |_| true))
    }
}

impl AssertionTable {
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Appends a rule after the existing ones.
    pub fn with_rule(mut self, rule: AssertionRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn register(&mut self, rule: AssertionRule) {
        self.rules.push(rule);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn check(&self, assertion: &str, ctx: &AssertionContext<'_>) -> bool {
        let lowered = assertion.to_lowercase();
        self.rules
            .iter()
            .find(|r| r.applies_to(&lowered))
            .is_none_or(|r| (r.check)(ctx))
    }

    /// Splits `assertions` into (passed, failed), preserving order.
    pub fn evaluate(
        &self,
        assertions: &[String],
        ctx: &AssertionContext<'_>,
    ) -> (Vec<String>, Vec<String>) {
        assertions
            .iter()
            .cloned()
            .partition(|a| self.check(a, ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::data::Value;

    fn table(rows: Vec<Vec<Value>>) -> Table {
        Table::new(vec!["a".into(), "b".into()], rows)
    }

    #[test]
    fn test_default_rules() {
        let source = table(vec![vec![1.into(), 2.into()]]);
        let target = table(vec![vec![1.into(), Value::Null], vec![1.into(), Value::Null]]);
        let ctx = AssertionContext {
            source: &source,
            target: &target,
        };
        let t = AssertionTable::default();
        assert!(!t.check("Target has NO NULL values", &ctx));
        assert!(t.check("All records are migrated", &ctx));
        assert!(t.check("Schema match", &ctx));
        assert!(!t.check("No duplicates in output", &ctx));
        assert!(t.check("No errors raised", &ctx));
        assert!(t.check("Something nobody checks", &ctx));
    }

    #[test]
    fn test_first_match_wins() {
        let empty = Table::empty(vec!["a".into()]);
        let ctx = AssertionContext {
            source: &empty,
            target: &empty,
        };
        // matches both "no null" and "all records"; the null rule comes first
        assert!(AssertionTable::default().check("no nulls in all records", &ctx));
    }

    #[test]
    fn test_registered_rule_and_partition() {
        let empty = Table::empty(vec!["a".into()]);
        let ctx = AssertionContext {
            source: &empty,
            target: &empty,
        };
        let mut t = AssertionTable::default();
        let before = t.len();
        t.register(AssertionRule::new("never", &["always fails"], |_| false));
        assert_eq!(t.len(), before + 1);

        let assertions = vec![
            "always fails".to_string(),
            "no errors".to_string(),
            "all records present".to_string(),
        ];
        let (passed, failed) = t.evaluate(&assertions, &ctx);
        assert_eq!(passed, vec!["no errors".to_string()]);
        assert_eq!(failed, vec!["always fails".to_string(), "all records present".to_string()]);
    }
}
