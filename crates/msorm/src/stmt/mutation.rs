//! INSERT, UPDATE, SET, and DELETE clause objects.

use crate::error::{DbResult, Error};
use crate::ident::{TableName, bracket};
use crate::value::Value;

/// INSERT clause with bracket-quoted column list and positional placeholders.
///
/// Sentinel-NULL values render the literal `NULL` inline and contribute no
/// positional argument. The optional OUTPUT clause returns a generated column
/// (typically the surrogate identifier) from the insert itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub table: TableName,
    pub values: Vec<(String, Value)>,
    pub output: Option<String>,
}

impl Insert {
    pub fn new(table: &str, values: Vec<(String, Value)>, output: Option<&str>) -> Self {
        Self {
            table: TableName::parse(table),
            values,
            output: output.map(str::to_string),
        }
    }

    pub fn validate(&self) -> DbResult<()> {
        if self.values.is_empty() {
            return Err(Error::handled("INSERT requires at least one value."));
        }
        Ok(())
    }

    pub(crate) fn fragment(&self) -> String {
        let columns = self
            .values
            .iter()
            .map(|(col, _)| bracket(col))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = self
            .values
            .iter()
            .map(|(_, v)| if v.is_null_sentinel() { "NULL" } else { "?" })
            .collect::<Vec<_>>()
            .join(", ");
        let output = match &self.output {
            Some(col) => format!(" OUTPUT INSERTED.{}", bracket(col)),
            None => String::new(),
        };
        format!(
            "INSERT INTO {} ({}){} VALUES ({})",
            self.table.qualified(),
            columns,
            output,
            placeholders
        )
    }

    pub(crate) fn args(&self) -> Vec<Value> {
        self.values
            .iter()
            .filter(|(_, v)| !v.is_null_sentinel())
            .map(|(_, v)| v.clone())
            .collect()
    }
}

/// `UPDATE [schema].[table]` — must be followed by a SET and a WHERE. The
/// builder does not enforce the WHERE; avoiding a full-table update is
/// documented caller responsibility.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub table: TableName,
}

impl Update {
    pub fn new(table: &str) -> Self {
        Self {
            table: TableName::parse(table),
        }
    }

    pub(crate) fn fragment(&self) -> String {
        format!("UPDATE {}", self.table.qualified())
    }
}

/// SET clause with the same placeholder and inline-NULL rules as INSERT.
#[derive(Debug, Clone, PartialEq)]
pub struct SetClause {
    pub values: Vec<(String, Value)>,
}

impl SetClause {
    pub fn new(values: Vec<(String, Value)>) -> Self {
        Self { values }
    }

    pub fn validate(&self) -> DbResult<()> {
        if self.values.is_empty() {
            return Err(Error::handled("SET requires at least one assignment."));
        }
        Ok(())
    }

    pub(crate) fn fragment(&self) -> String {
        let assignments = self
            .values
            .iter()
            .map(|(col, v)| {
                if v.is_null_sentinel() {
                    format!("{} = NULL", bracket(col))
                } else {
                    format!("{} = ?", bracket(col))
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("SET {assignments}")
    }

    pub(crate) fn args(&self) -> Vec<Value> {
        self.values
            .iter()
            .filter(|(_, v)| !v.is_null_sentinel())
            .map(|(_, v)| v.clone())
            .collect()
    }
}

/// `DELETE FROM [schema].[table]` — same WHERE caveat as [`Update`].
#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    pub table: TableName,
}

impl Delete {
    pub fn new(table: &str) -> Self {
        Self {
            table: TableName::parse(table),
        }
    }

    pub(crate) fn fragment(&self) -> String {
        format!("DELETE FROM {}", self.table.qualified())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_inlines_sentinel_nulls() {
        let ins = Insert::new(
            "Asset.Asset",
            vec![
                ("Name".into(), Value::from("X")),
                ("Comment".into(), Value::from("")),
            ],
            None,
        );
        assert_eq!(
            ins.fragment(),
            "INSERT INTO [Asset].[Asset] ([Name], [Comment]) VALUES (?, NULL)"
        );
        assert_eq!(ins.args(), vec![Value::from("X")]);
    }

    #[test]
    fn insert_with_output_clause() {
        let ins = Insert::new(
            "Asset.Asset",
            vec![("Name".into(), Value::from("X"))],
            Some("AssetAutoID"),
        );
        assert_eq!(
            ins.fragment(),
            "INSERT INTO [Asset].[Asset] ([Name]) OUTPUT INSERTED.[AssetAutoID] VALUES (?)"
        );
    }

    #[test]
    fn insert_strips_caller_brackets() {
        let ins = Insert::new(
            "Asset.Asset",
            vec![("[Name]".into(), Value::from("X"))],
            None,
        );
        assert!(ins.fragment().contains("([Name])"));
    }

    #[test]
    fn empty_insert_is_invalid() {
        assert!(Insert::new("T", vec![], None).validate().is_err());
    }

    #[test]
    fn set_mixes_placeholders_and_nulls() {
        let set = SetClause::new(vec![
            ("Status".into(), Value::from("Active")),
            ("Comment".into(), Value::Null),
        ]);
        assert_eq!(set.fragment(), "SET [Status] = ?, [Comment] = NULL");
        assert_eq!(set.args(), vec![Value::from("Active")]);
    }

    #[test]
    fn update_and_delete_fragments() {
        assert_eq!(Update::new("Asset.Asset").fragment(), "UPDATE [Asset].[Asset]");
        assert_eq!(
            Delete::new("Asset.Asset").fragment(),
            "DELETE FROM [Asset].[Asset]"
        );
    }
}
