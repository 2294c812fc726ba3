//! Identifier quoting and table-name handling.
//!
//! Rendered SQL bracket-quotes every identifier (`[name]`), and
//! schema-qualified names render as `[schema].[table]`. Inputs may arrive
//! already bracketed or quoted; they are normalized before re-quoting so the
//! output convention is uniform.

use serde::{Deserialize, Serialize};

/// Characters stripped from caller-supplied identifiers before quoting.
pub const BRACKET_STRIP: &[char] = &['[', ']', '"', '\''];

/// Default schema when a table name carries no qualifier.
pub const SCHEMA_DEFAULT: &str = "dbo";

/// Strip surrounding bracket/quote characters from an identifier.
pub fn strip(name: &str) -> String {
    name.trim_matches(BRACKET_STRIP).to_string()
}

/// Bracket-quote a bare identifier: `Name` → `[Name]`.
pub fn bracket(name: &str) -> String {
    format!("[{}]", strip(name))
}

/// Render a schema-qualified name: `[schema].[table]`.
pub fn qualify(schema: &str, name: &str) -> String {
    format!("{}.{}", bracket(schema), bracket(name))
}

/// A parsed schema-qualified table reference.
///
/// This is the lightweight name carried inside clause objects; the metadata
/// layer's [`crate::table::Table`] wraps one together with a database and a
/// column cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableName {
    pub schema: String,
    pub name: String,
}

impl TableName {
    /// Parse `table` or `schema.table`, stripping any bracket quoting.
    /// An unqualified name lands in the default schema.
    pub fn parse(raw: &str) -> Self {
        match raw.split_once('.') {
            Some((schema, name)) => Self {
                schema: strip(schema),
                name: strip(name),
            },
            None => Self {
                schema: SCHEMA_DEFAULT.to_string(),
                name: strip(raw),
            },
        }
    }

    /// `[schema].[table]`
    pub fn qualified(&self) -> String {
        qualify(&self.schema, &self.name)
    }

    /// `schema.table` without quoting, for diagnostics and visited-set keys.
    pub fn dotted(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    /// Default join alias: bracketed lowercase first letter of the bare name.
    pub fn default_alias(&self) -> String {
        let initial = self
            .name
            .chars()
            .next()
            .map(|c| c.to_ascii_lowercase())
            .unwrap_or('t');
        format!("[{initial}]")
    }
}

impl std::fmt::Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.qualified())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_unqualified_defaults_to_dbo() {
        let t = TableName::parse("Asset");
        assert_eq!(t.schema, "dbo");
        assert_eq!(t.qualified(), "[dbo].[Asset]");
    }

    #[test]
    fn parse_qualified() {
        let t = TableName::parse("Asset.Asset");
        assert_eq!(t.schema, "Asset");
        assert_eq!(t.qualified(), "[Asset].[Asset]");
    }

    #[test]
    fn parse_strips_existing_quoting() {
        let t = TableName::parse("[dbo].[Asset]");
        assert_eq!(t.qualified(), "[dbo].[Asset]");
        let t = TableName::parse("\"INFORMATION_SCHEMA\".COLUMNS");
        assert_eq!(t.qualified(), "[INFORMATION_SCHEMA].[COLUMNS]");
    }

    #[test]
    fn default_alias_is_bracketed_initial() {
        assert_eq!(TableName::parse("Asset.Asset").default_alias(), "[a]");
        assert_eq!(TableName::parse("Pump").default_alias(), "[p]");
    }

    #[test]
    fn bracket_normalizes() {
        assert_eq!(bracket("Name"), "[Name]");
        assert_eq!(bracket("[Name]"), "[Name]");
        assert_eq!(qualify("dbo", "Asset"), "[dbo].[Asset]");
    }
}
