//! WHERE, ORDER BY, GROUP BY, and OFFSET/FETCH clause objects.

use crate::error::{DbResult, Error};
use crate::ident::bracket;
use crate::value::Value;

/// WHERE clause: raw predicate strings AND-joined in input order.
///
/// Predicates come either from the caller directly (may contain `?`
/// placeholders, with args supplied at execute time) or from a filter mapping
/// via [`WhereClause::from_filters`].
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    pub clauses: Vec<String>,
}

impl WhereClause {
    pub fn new(clauses: Vec<String>) -> Self {
        Self { clauses }
    }

    /// Build predicates from a column→value filter mapping, in the mapping's
    /// input order. A sentinel-NULL value renders `[col] IS NULL`; any other
    /// value renders `[col] = '<literal>'` by straight substitution — callers
    /// of raw filter maps must pre-sanitize values.
    pub fn from_filters(filters: &[(String, Value)]) -> Self {
        let clauses = filters
            .iter()
            .map(|(col, value)| {
                if value.is_null_sentinel() {
                    format!("{} IS NULL", bracket(col))
                } else {
                    format!("{} = '{}'", bracket(col), value.literal())
                }
            })
            .collect();
        Self { clauses }
    }

    pub fn validate(&self) -> DbResult<()> {
        if self.clauses.is_empty() {
            return Err(Error::handled("WHERE requires at least one predicate."));
        }
        Ok(())
    }

    pub(crate) fn fragment(&self) -> String {
        format!("WHERE {}", self.clauses.join(" AND "))
    }
}

/// ORDER BY clause: comma-joined columns, ascending unless `desc`.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub columns: Vec<String>,
    pub desc: bool,
}

impl OrderBy {
    pub fn new(columns: Vec<String>, desc: bool) -> Self {
        Self { columns, desc }
    }

    pub fn validate(&self) -> DbResult<()> {
        if self.columns.is_empty() {
            return Err(Error::handled("ORDER BY requires at least one column."));
        }
        Ok(())
    }

    pub(crate) fn fragment(&self) -> String {
        let cols = self.columns.join(", ");
        if self.desc {
            format!("ORDER BY {cols} DESC")
        } else {
            format!("ORDER BY {cols}")
        }
    }
}

/// GROUP BY clause: comma-joined columns.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupBy {
    pub columns: Vec<String>,
}

impl GroupBy {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    pub fn validate(&self) -> DbResult<()> {
        if self.columns.is_empty() {
            return Err(Error::handled("GROUP BY requires at least one column."));
        }
        Ok(())
    }

    pub(crate) fn fragment(&self) -> String {
        format!("GROUP BY {}", self.columns.join(", "))
    }
}

/// `OFFSET n ROWS`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Offset {
    pub rows: i64,
}

impl Offset {
    pub(crate) fn fragment(&self) -> String {
        format!("OFFSET {} ROWS", self.rows)
    }
}

/// `FETCH NEXT n ROWS ONLY`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetch {
    pub rows: i64,
}

impl Fetch {
    pub(crate) fn fragment(&self) -> String {
        format!("FETCH NEXT {} ROWS ONLY", self.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_join_in_input_order() {
        let w = WhereClause::from_filters(&[
            ("Status".into(), Value::from("Active")),
            ("Comment".into(), Value::from("")),
            ("PlantAutoID".into(), Value::Int(3)),
        ]);
        assert_eq!(
            w.fragment(),
            "WHERE [Status] = 'Active' AND [Comment] IS NULL AND [PlantAutoID] = '3'"
        );
    }

    #[test]
    fn null_variants_all_render_is_null() {
        for v in [Value::Null, Value::from(""), Value::from("NULL")] {
            let w = WhereClause::from_filters(&[("Comment".into(), v)]);
            assert_eq!(w.fragment(), "WHERE [Comment] IS NULL");
        }
    }

    #[test]
    fn raw_clauses_pass_through() {
        let w = WhereClause::new(vec!["s.[name] = ?".into(), "t.[name] = ?".into()]);
        assert_eq!(w.fragment(), "WHERE s.[name] = ? AND t.[name] = ?");
    }

    #[test]
    fn empty_where_is_invalid() {
        assert!(WhereClause::new(vec![]).validate().is_err());
    }

    #[test]
    fn order_by_desc() {
        let o = OrderBy::new(vec!["Name".into(), "Status".into()], true);
        assert_eq!(o.fragment(), "ORDER BY Name, Status DESC");
        let o = OrderBy::new(vec!["Name".into()], false);
        assert_eq!(o.fragment(), "ORDER BY Name");
    }

    #[test]
    fn offset_fetch() {
        assert_eq!(Offset { rows: 40 }.fragment(), "OFFSET 40 ROWS");
        assert_eq!(Fetch { rows: 20 }.fragment(), "FETCH NEXT 20 ROWS ONLY");
    }
}
