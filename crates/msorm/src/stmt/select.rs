//! SELECT, FROM, and JOIN clause objects.

use crate::error::{DbResult, Error};
use crate::ident::TableName;
use crate::stmt::JoinKind;

/// SELECT clause: column list (default `*`), optional DISTINCT and TOP(n).
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub columns: Vec<String>,
    pub distinct: bool,
    pub top: Option<u32>,
}

impl Select {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            distinct: false,
            top: None,
        }
    }

    /// Mixed aliased/unaliased column lists are ambiguous next to a JOIN:
    /// once any column carries a qualifier separator, all must.
    pub fn validate(&self) -> DbResult<()> {
        let any_aliased = self.columns.iter().any(|c| c.contains('.'));
        if any_aliased && self.columns.iter().any(|c| !c.contains('.')) {
            return Err(Error::handled("All columns must be aliased."));
        }
        Ok(())
    }

    pub(crate) fn fragment(&self) -> String {
        let mut out = String::from("SELECT");
        if self.distinct {
            out.push_str(" DISTINCT");
        }
        if let Some(n) = self.top {
            out.push_str(&format!(" TOP {n}"));
        }
        out.push(' ');
        if self.columns.is_empty() {
            out.push('*');
        } else {
            out.push_str(&self.columns.join(", "));
        }
        out
    }
}

/// FROM clause: table plus optional alias.
#[derive(Debug, Clone, PartialEq)]
pub struct FromClause {
    pub table: TableName,
    pub alias: Option<String>,
}

impl FromClause {
    pub fn new(table: &str, alias: Option<&str>) -> Self {
        Self {
            table: TableName::parse(table),
            alias: alias.map(str::to_string),
        }
    }

    pub(crate) fn fragment(&self) -> String {
        match &self.alias {
            Some(alias) => format!("FROM {} AS {}", self.table.qualified(), alias),
            None => format!("FROM {}", self.table.qualified()),
        }
    }
}

/// JOIN clause. The ON predicate is resolved before construction, either
/// supplied explicitly or inferred from the foreign-key catalog at append
/// time (see [`crate::query::Query::join_fk`]).
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub child: TableName,
    pub parent: TableName,
    pub child_alias: String,
    pub parent_alias: String,
    pub on: String,
    pub kind: JoinKind,
}

impl Join {
    pub fn new(
        child: TableName,
        parent: TableName,
        child_alias: Option<&str>,
        parent_alias: Option<&str>,
        on: String,
        kind: JoinKind,
    ) -> Self {
        let child_alias = child_alias
            .map(str::to_string)
            .unwrap_or_else(|| child.default_alias());
        let parent_alias = parent_alias
            .map(str::to_string)
            .unwrap_or_else(|| parent.default_alias());
        Self {
            child,
            parent,
            child_alias,
            parent_alias,
            on,
            kind,
        }
    }

    pub(crate) fn fragment(&self) -> String {
        format!(
            "{} JOIN {} AS {} ON {}",
            self.kind.keyword(),
            self.child.qualified(),
            self.child_alias,
            self.on
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stmt::Statement;

    #[test]
    fn select_defaults_to_star() {
        assert_eq!(Select::new(vec![]).fragment(), "SELECT *");
    }

    #[test]
    fn select_distinct_top() {
        let mut s = Select::new(vec!["Name".into(), "Status".into()]);
        s.distinct = true;
        s.top = Some(5);
        assert_eq!(s.fragment(), "SELECT DISTINCT TOP 5 Name, Status");
    }

    #[test]
    fn select_mixed_aliasing_is_rejected() {
        let s = Select::new(vec!["a.Name".into(), "Status".into()]);
        let err = s.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Handled failure: All columns must be aliased."
        );
    }

    #[test]
    fn select_uniform_aliasing_passes() {
        let s = Select::new(vec!["a.Name".into(), "a.Status".into()]);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn invalid_select_never_renders() {
        let s = Statement::Select(Select::new(vec!["a.Name".into(), "Status".into()]));
        assert!(s.render().is_err());
    }

    #[test]
    fn from_with_alias() {
        assert_eq!(
            FromClause::new("Asset.Asset", Some("a")).fragment(),
            "FROM [Asset].[Asset] AS a"
        );
        assert_eq!(
            FromClause::new("INFORMATION_SCHEMA.COLUMNS", None).fragment(),
            "FROM [INFORMATION_SCHEMA].[COLUMNS]"
        );
    }

    #[test]
    fn join_uses_default_aliases() {
        let join = Join::new(
            TableName::parse("Asset.Card"),
            TableName::parse("Asset.Rack"),
            None,
            None,
            "[c].[RackAutoID] = [r].[RackAutoID]".into(),
            JoinKind::Inner,
        );
        assert_eq!(
            join.fragment(),
            "INNER JOIN [Asset].[Card] AS [c] ON [c].[RackAutoID] = [r].[RackAutoID]"
        );
    }

    #[test]
    fn join_kind_keywords() {
        let join = Join::new(
            TableName::parse("B"),
            TableName::parse("A"),
            Some("b"),
            Some("a"),
            "b.x = a.x".into(),
            JoinKind::Left,
        );
        assert!(join.fragment().starts_with("LEFT JOIN"));
    }
}
