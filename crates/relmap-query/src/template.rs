//! Named-placeholder statement templates.
//!
//! `#{name}` (name in `[A-Za-z0-9_-]*`) becomes a positional `?`; every
//! other character is copied through untouched.

use std::sync::LazyLock;

use regex::Regex;
use relmap_core::error::ParamError;
use relmap_core::{Error, ParamSource, Result, Value};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#\{([A-Za-z0-9_-]*)\}").expect("placeholder pattern compiles"));

/// A template rewritten to positional placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    /// Original template text
    source: String,
    /// SQL with every placeholder replaced by `?`
    sql: String,
    /// Placeholder names in order of appearance, repeats included
    names: Vec<String>,
}

impl Template {
    /// Rewrite `template` in one left-to-right pass.
    pub fn parse(template: &str) -> Self {
        let mut sql = String::with_capacity(template.len());
        let mut names = Vec::new();
        let mut last = 0;

        for caps in PLACEHOLDER.captures_iter(template) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            sql.push_str(&template[last..whole.start()]);
            sql.push('?');
            names.push(caps.get(1).map_or("", |m| m.as_str()).to_string());
            last = whole.end();
        }
        sql.push_str(&template[last..]);

        Self {
            source: template.to_string(),
            sql,
            names,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn has_placeholders(&self) -> bool {
        !self.names.is_empty()
    }

    /// Resolve every placeholder against `source`, in order.
    ///
    /// Fails on the first unknown name.
    #[allow(clippy::result_large_err)]
    pub fn bind<P: ParamSource + ?Sized>(&self, source: &P) -> Result<Vec<Value>> {
        self.names
            .iter()
            .map(|name| {
                source.resolve(name).ok_or_else(|| {
                    Error::Param(ParamError {
                        name: name.clone(),
                        statement: self.source.clone(),
                    })
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_rewrites_in_order() {
        let t = Template::parse("UPDATE user SET name = #{name} WHERE id = #{user-id} AND v = #{name}");
        assert_eq!(t.sql(), "UPDATE user SET name = ? WHERE id = ? AND v = ?");
        assert_eq!(t.names(), ["name", "user-id", "name"]);
    }

    #[test]
    fn test_non_matching_text_is_literal() {
        let t = Template::parse("SELECT '#{a b}', '#name', '{x}' FROM t WHERE x = #{}");
        assert_eq!(t.sql(), "SELECT '#{a b}', '#name', '{x}' FROM t WHERE x = ?");
        assert_eq!(t.names(), [""]);
    }

    #[test]
    fn test_no_placeholders() {
        let t = Template::parse("DELETE FROM log");
        assert!(!t.has_placeholders());
        assert_eq!(t.sql(), "DELETE FROM log");
        assert!(t.bind(&HashMap::<String, Value>::new()).unwrap().is_empty());
    }

    #[test]
    fn test_bind_missing_name() {
        let t = Template::parse("UPDATE t SET a = #{a} WHERE b = #{b}");
        let mut params = HashMap::new();
        params.insert("a".to_string(), Value::Int(1));
        let err = t.bind(&params).unwrap_err();
        match err {
            Error::Param(p) => {
                assert_eq!(p.name, "b");
                assert_eq!(p.statement, "UPDATE t SET a = #{a} WHERE b = #{b}");
            }
            other => panic!("expected param error, got {other:?}"),
        }
    }
}
