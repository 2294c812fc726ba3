//! Schema metadata reflection.
//!
//! [`Database`], [`Table`], and [`Column`] are lazy views over the engine's
//! catalog. Nothing is read until asked for; a table's column list (with its
//! extended properties) is fetched in two batched round trips and memoized for
//! the lifetime of the [`Table`] value. Identifier roles are convention-driven
//! through extended properties: `IsAutoID` marks the surrogate identifier,
//! `IsPrimaryID` the business identifier.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::debug;

use crate::error::{DbResult, Error};
use crate::exec::{DataSet, Executor};
use crate::ident::{TableName, bracket};
use crate::query::Query;
use crate::stmt::JoinKind;
use crate::value::Value;

/// Extended property flagging the surrogate-identifier column.
pub const PROP_IS_AUTO_ID: &str = "IsAutoID";
/// Extended property flagging the business-identifier column.
pub const PROP_IS_PRIMARY_ID: &str = "IsPrimaryID";
/// Table-level extended property marking a one-to-many detail table.
pub const PROP_IS_ONE_TO_MANY: &str = "IsOneToMany";

const COLUMN_PROPS_VIEW: &str = "dbo.vColumnExtendedProperties";
const TABLE_PROPS_VIEW: &str = "dbo.vTableExtendedProperties";

/// A named database. Purely a routing key for the execution boundary plus a
/// factory for [`Table`] handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Database {
    name: String,
}

impl Database {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// A lazy handle on `table` (or `schema.table`) in this database.
    pub fn table(&self, table: &str) -> Table {
        Table::from_parts(TableName::parse(table), self.clone())
    }

    /// All base tables, as `schema.table` strings.
    pub fn tables(&self, exec: &impl Executor) -> DbResult<Vec<String>> {
        let q = Query::new()
            .select(&["TABLE_SCHEMA", "TABLE_NAME"])
            .from("INFORMATION_SCHEMA.TABLES")
            .where_clauses(&["TABLE_TYPE = ?"])
            .order_by(&["TABLE_SCHEMA", "TABLE_NAME"], false);
        let data = q
            .execute(&[Value::from("BASE TABLE")], &self.name, exec)?
            .into_rows()?;
        let mut out = Vec::with_capacity(data.len());
        for row in 0..data.len() {
            let schema = data.get(row, "TABLE_SCHEMA").and_then(Value::as_str);
            let table = data.get(row, "TABLE_NAME").and_then(Value::as_str);
            if let (Some(s), Some(t)) = (schema, table) {
                out.push(format!("{s}.{t}"));
            }
        }
        Ok(out)
    }
}

/// One column of a reflected table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    table: TableName,
    database: String,
    pub name: String,
    pub data_type: String,
    pub character_max: i64,
    pub non_null: bool,
    pub extended_properties: BTreeMap<String, String>,
}

impl Column {
    /// Fallback length when the catalog reports none for a character type.
    pub const DEFAULT_CHARACTER_MAX: i64 = 50;

    pub fn is_auto_id(&self) -> bool {
        self.extended_properties.contains_key(PROP_IS_AUTO_ID)
    }

    pub fn is_primary_id(&self) -> bool {
        self.extended_properties.contains_key(PROP_IS_PRIMARY_ID)
    }

    /// Whether the engine computes this column's value (catalog probe).
    pub fn is_computed(&self, exec: &impl Executor) -> DbResult<bool> {
        let probe = format!(
            "COLUMNPROPERTY(OBJECT_ID('{}'), '{}', 'IsComputed') AS Computed",
            self.table.dotted(),
            self.name
        );
        let q = Query::new().select(&[probe.as_str()]);
        let data = q.execute(&[], &self.database, exec)?.into_rows()?;
        Ok(data.get(0, "Computed").is_some_and(Value::is_truthy))
    }

    /// The `schema.table` this column references through a foreign key, if
    /// any. `None` means the column is not a foreign key.
    pub fn fk_reference(&self, exec: &impl Executor) -> DbResult<Option<String>> {
        let q = fk_catalog_query(&[
            "fs.[name] = ?",
            "ft.[name] = ?",
            "fc.[name] = ?",
        ]);
        let args = [
            Value::from(self.table.schema.as_str()),
            Value::from(self.table.name.as_str()),
            Value::from(self.name.as_str()),
        ];
        let data = q.execute(&args, &self.database, exec)?.into_rows()?;
        if data.is_empty() {
            return Ok(None);
        }
        let schema = data.get(0, "pk_schema").and_then(Value::as_str).unwrap_or("");
        let table = data.get(0, "pk_table").and_then(Value::as_str).unwrap_or("");
        Ok(Some(format!("{schema}.{table}")))
    }

    pub fn is_foreign_key(&self, exec: &impl Executor) -> DbResult<bool> {
        Ok(self.fk_reference(exec)?.is_some())
    }
}

/// A lazy, memoizing view over one table's catalog entries.
#[derive(Debug)]
pub struct Table {
    name: TableName,
    database: Database,
    columns: RefCell<Option<Vec<Column>>>,
    computed_id: RefCell<Option<Option<String>>>,
}

impl Table {
    pub fn new(table: &str, database: Database) -> Self {
        Self::from_parts(TableName::parse(table), database)
    }

    pub(crate) fn from_parts(name: TableName, database: Database) -> Self {
        Self {
            name,
            database,
            columns: RefCell::new(None),
            computed_id: RefCell::new(None),
        }
    }

    /// Bare table name without schema.
    pub fn name(&self) -> &str {
        &self.name.name
    }

    pub fn schema(&self) -> &str {
        &self.name.schema
    }

    /// `[schema].[table]`
    pub fn full_name(&self) -> String {
        self.name.qualified()
    }

    /// `schema.table` without quoting.
    pub fn dotted(&self) -> String {
        self.name.dotted()
    }

    pub fn table_name(&self) -> &TableName {
        &self.name
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    /// The reflected column list, fetched once and memoized. Two round trips
    /// on first access: the column catalog, then the batched column extended
    /// properties.
    pub fn columns(&self, exec: &impl Executor) -> DbResult<Vec<Column>> {
        if let Some(cached) = self.columns.borrow().as_ref() {
            return Ok(cached.clone());
        }

        let q = Query::new()
            .select(&[
                "COLUMN_NAME",
                "DATA_TYPE",
                "CHARACTER_MAXIMUM_LENGTH",
                "IS_NULLABLE",
            ])
            .from("INFORMATION_SCHEMA.COLUMNS")
            .where_clauses(&["TABLE_SCHEMA = ?", "TABLE_NAME = ?"])
            .order_by(&["ORDINAL_POSITION"], false);
        let args = [
            Value::from(self.name.schema.as_str()),
            Value::from(self.name.name.as_str()),
        ];
        let catalog = q
            .execute(&args, self.database.name(), exec)?
            .into_rows()?;

        let props = self.column_extended_properties(exec)?;

        let mut columns = Vec::with_capacity(catalog.len());
        for row in 0..catalog.len() {
            let name = catalog
                .get(row, "COLUMN_NAME")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            let data_type = catalog
                .get(row, "DATA_TYPE")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            let character_max = catalog
                .get(row, "CHARACTER_MAXIMUM_LENGTH")
                .and_then(Value::as_i64)
                .unwrap_or(Column::DEFAULT_CHARACTER_MAX);
            let non_null = catalog
                .get(row, "IS_NULLABLE")
                .and_then(Value::as_str)
                .is_some_and(|v| v.eq_ignore_ascii_case("NO"));
            let extended_properties = props.get(&name).cloned().unwrap_or_default();
            columns.push(Column {
                table: self.name.clone(),
                database: self.database.name().to_string(),
                name,
                data_type,
                character_max,
                non_null,
                extended_properties,
            });
        }
        debug!(table = %self.dotted(), columns = columns.len(), "reflected columns");
        *self.columns.borrow_mut() = Some(columns.clone());
        Ok(columns)
    }

    fn column_extended_properties(
        &self,
        exec: &impl Executor,
    ) -> DbResult<BTreeMap<String, BTreeMap<String, String>>> {
        let q = Query::new()
            .select(&[
                "ColumnName",
                "ExtendedPropertyName",
                "ExtendedPropertyValue",
            ])
            .from(COLUMN_PROPS_VIEW)
            .where_clauses(&["TableSchema = ?", "TableName = ?"]);
        let args = [
            Value::from(self.name.schema.as_str()),
            Value::from(self.name.name.as_str()),
        ];
        let data = q
            .execute(&args, self.database.name(), exec)?
            .into_rows()?;
        let mut props: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        for row in 0..data.len() {
            let column = data.get(row, "ColumnName").and_then(Value::as_str);
            let name = data.get(row, "ExtendedPropertyName").and_then(Value::as_str);
            let value = data
                .get(row, "ExtendedPropertyValue")
                .map(Value::literal)
                .unwrap_or_default();
            if let (Some(column), Some(name)) = (column, name) {
                props
                    .entry(column.to_string())
                    .or_default()
                    .insert(name.to_string(), value);
            }
        }
        Ok(props)
    }

    /// Table-level extended properties.
    pub fn extended_properties(
        &self,
        exec: &impl Executor,
    ) -> DbResult<BTreeMap<String, String>> {
        let q = Query::new()
            .select(&["ExtendedPropertyName", "ExtendedPropertyValue"])
            .from(TABLE_PROPS_VIEW)
            .where_clauses(&["TableSchema = ?", "TableName = ?"]);
        let args = [
            Value::from(self.name.schema.as_str()),
            Value::from(self.name.name.as_str()),
        ];
        let data = q
            .execute(&args, self.database.name(), exec)?
            .into_rows()?;
        let mut props = BTreeMap::new();
        for row in 0..data.len() {
            let name = data.get(row, "ExtendedPropertyName").and_then(Value::as_str);
            let value = data
                .get(row, "ExtendedPropertyValue")
                .map(Value::literal)
                .unwrap_or_default();
            if let Some(name) = name {
                props.insert(name.to_string(), value);
            }
        }
        Ok(props)
    }

    /// Whether the table is flagged as a one-to-many detail table.
    pub fn is_one_to_many(&self, exec: &impl Executor) -> DbResult<bool> {
        Ok(self
            .extended_properties(exec)?
            .contains_key(PROP_IS_ONE_TO_MANY))
    }

    /// Ordered column names.
    pub fn column_headers(&self, exec: &impl Executor) -> DbResult<Vec<String>> {
        Ok(self.columns(exec)?.into_iter().map(|c| c.name).collect())
    }

    /// Names of NOT NULL columns.
    pub fn non_null_column_headers(&self, exec: &impl Executor) -> DbResult<Vec<String>> {
        Ok(self
            .columns(exec)?
            .into_iter()
            .filter(|c| c.non_null)
            .map(|c| c.name)
            .collect())
    }

    /// The surrogate-identifier column name. Exactly one column must carry
    /// the flag for identity-based operations to work.
    pub fn auto_id_column(&self, exec: &impl Executor) -> DbResult<String> {
        self.columns(exec)?
            .into_iter()
            .find(Column::is_auto_id)
            .map(|c| c.name)
            .ok_or_else(|| {
                Error::not_found(format!(
                    "No surrogate-identifier column is flagged on {}",
                    self.full_name()
                ))
            })
    }

    /// The business-identifier column name.
    pub fn primary_id_column(&self, exec: &impl Executor) -> DbResult<String> {
        self.columns(exec)?
            .into_iter()
            .find(Column::is_primary_id)
            .map(|c| c.name)
            .ok_or_else(|| {
                Error::not_found(format!(
                    "No business-identifier column is flagged on {}",
                    self.full_name()
                ))
            })
    }

    /// The first engine-computed column, if any. Memoized; probing costs one
    /// catalog round trip per column on first access.
    pub fn computed_id_column(&self, exec: &impl Executor) -> DbResult<Option<String>> {
        if let Some(cached) = self.computed_id.borrow().as_ref() {
            return Ok(cached.clone());
        }
        let mut found = None;
        for column in self.columns(exec)? {
            if column.is_computed(exec)? {
                found = Some(column.name);
                break;
            }
        }
        *self.computed_id.borrow_mut() = Some(found.clone());
        Ok(found)
    }

    /// Non-primary-key unique indices, keyed by index name, each with the
    /// columns it covers in aggregate order.
    pub fn unique_indices(
        &self,
        exec: &impl Executor,
    ) -> DbResult<BTreeMap<String, Vec<Column>>> {
        let q = Query::new()
            .select(&[
                "i.[name] AS [Index]",
                "STRING_AGG(c.[name], ', ') AS [Column]",
            ])
            .from_as("sys.schemas", "s")
            .join_on(JoinKind::Inner, "sys.tables", Some("t"), "t.schema_id = s.schema_id")
            .join_on(JoinKind::Inner, "sys.columns", Some("c"), "c.object_id = t.object_id")
            .join_on(
                JoinKind::Inner,
                "sys.indexes",
                Some("i"),
                "i.object_id = t.object_id AND i.is_primary_key = 0 AND i.is_unique = 1",
            )
            .join_on(
                JoinKind::Inner,
                "sys.index_columns",
                Some("ic"),
                "ic.object_id = t.object_id AND ic.index_id = i.index_id AND ic.column_id = c.column_id",
            )
            .where_clauses(&["s.[name] = ?", "t.[name] = ?"])
            .group_by(&["i.[name]"]);
        let args = [
            Value::from(self.name.schema.as_str()),
            Value::from(self.name.name.as_str()),
        ];
        let data = q
            .execute(&args, self.database.name(), exec)?
            .into_rows()?;

        let columns = self.columns(exec)?;
        let mut indices = BTreeMap::new();
        for row in 0..data.len() {
            let index = data.get(row, "Index").and_then(Value::as_str);
            let agg = data.get(row, "Column").and_then(Value::as_str);
            if let (Some(index), Some(agg)) = (index, agg) {
                let members = agg
                    .split(", ")
                    .filter_map(|name| columns.iter().find(|c| c.name == name).cloned())
                    .collect();
                indices.insert(index.to_string(), members);
            }
        }
        Ok(indices)
    }

    /// Every row of the table.
    pub fn all_rows(&self, exec: &impl Executor) -> DbResult<DataSet> {
        Query::new()
            .select(&[])
            .from(&self.dotted())
            .execute(&[], self.database.name(), exec)?
            .into_rows()
    }

    /// Total row count.
    pub fn row_count(&self, exec: &impl Executor) -> DbResult<i64> {
        let q = Query::new()
            .select(&["COUNT(*) AS [Count]"])
            .from(&self.dotted());
        let data = q.execute(&[], self.database.name(), exec)?.into_rows()?;
        data.get(0, "Count")
            .and_then(Value::as_i64)
            .ok_or_else(|| Error::decode(format!("COUNT(*) on {} returned no count", self.full_name())))
    }

    /// A row handle bound to a known surrogate identifier. No round trip.
    pub fn get_row(&self, auto_id: impl Into<Value>) -> crate::row::Row<'_> {
        crate::row::Row::by_id(self, auto_id)
    }

    /// Row handles for every row matching the filter map.
    pub fn find_rows(
        &self,
        filters: &[(String, Value)],
        exec: &impl Executor,
    ) -> DbResult<Vec<crate::row::Row<'_>>> {
        let auto = self.auto_id_column(exec)?;
        let q = Query::new()
            .select(&[auto.as_str()])
            .from(&self.dotted())
            .where_filters(filters);
        let data = q.execute(&[], self.database.name(), exec)?.into_rows()?;
        let mut rows = Vec::with_capacity(data.len());
        for row in 0..data.len() {
            if let Some(id) = data.get(row, &auto) {
                rows.push(crate::row::Row::by_id(self, id.clone()));
            }
        }
        Ok(rows)
    }

    /// Translate a surrogate identifier to the business identifier.
    pub fn primary_id_for_auto_id(
        &self,
        auto_id: &Value,
        exec: &impl Executor,
    ) -> DbResult<Value> {
        let auto = self.auto_id_column(exec)?;
        let primary = self.primary_id_column(exec)?;
        let clause = format!("{} = ?", bracket(&auto));
        let q = Query::new()
            .select(&[primary.as_str()])
            .from(&self.dotted())
            .where_clauses(&[clause.as_str()]);
        let data = q
            .execute(&[auto_id.clone()], self.database.name(), exec)?
            .into_rows()?;
        data.get(0, &primary).cloned().ok_or_else(|| {
            Error::not_found(format!(
                "No row in {} has {} = {}",
                self.full_name(),
                auto,
                auto_id
            ))
        })
    }

    fn referencing_links(&self, exec: &impl Executor) -> DbResult<Vec<FkLink>> {
        let q = fk_catalog_query(&["ps.[name] = ?", "pt.[name] = ?"]);
        let args = [
            Value::from(self.name.schema.as_str()),
            Value::from(self.name.name.as_str()),
        ];
        let data = q
            .execute(&args, self.database.name(), exec)?
            .into_rows()?;
        Ok(fk_links(&data)
            .into_iter()
            .map(|(child, _parent)| child)
            .collect())
    }

    /// Tables holding a foreign key into this table, as `schema.table`
    /// strings, deduplicated.
    pub fn children(&self, exec: &impl Executor) -> DbResult<Vec<String>> {
        let mut seen = BTreeSet::new();
        for link in self.referencing_links(exec)? {
            seen.insert(link.table.dotted());
        }
        Ok(seen.into_iter().collect())
    }

    /// Tables this table's foreign keys reference, as `schema.table`
    /// strings, deduplicated.
    pub fn parents(&self, exec: &impl Executor) -> DbResult<Vec<String>> {
        let q = fk_catalog_query(&["fs.[name] = ?", "ft.[name] = ?"]);
        let args = [
            Value::from(self.name.schema.as_str()),
            Value::from(self.name.name.as_str()),
        ];
        let data = q
            .execute(&args, self.database.name(), exec)?
            .into_rows()?;
        let mut seen = BTreeSet::new();
        for (_child, parent) in fk_links(&data) {
            seen.insert(parent.dotted());
        }
        Ok(seen.into_iter().collect())
    }

    /// Preview what a cascading delete of one row would remove, without
    /// mutating anything. Walks foreign keys depth-first; a table already on
    /// the current path is skipped, so FK cycles terminate.
    pub fn delete_impact(
        &self,
        auto_id: &Value,
        exec: &impl Executor,
    ) -> DbResult<DeleteImpact> {
        let mut visited = BTreeSet::new();
        self.impact_for_ids(vec![auto_id.clone()], exec, &mut visited)
    }

    fn impact_for_ids(
        &self,
        ids: Vec<Value>,
        exec: &impl Executor,
        visited: &mut BTreeSet<String>,
    ) -> DbResult<DeleteImpact> {
        visited.insert(self.dotted());
        let mut node = DeleteImpact {
            table: self.dotted(),
            row_ids: ids,
            children: Vec::new(),
        };
        for link in self.referencing_links(exec)? {
            if visited.contains(&link.table.dotted()) {
                continue;
            }
            let child = Table::from_parts(link.table.clone(), self.database.clone());
            let child_auto = child.auto_id_column(exec)?;
            let clause = format!("{} = ?", bracket(&link.column));
            let mut child_ids = Vec::new();
            for id in node.row_ids.clone() {
                let q = Query::new()
                    .select(&[child_auto.as_str()])
                    .from(&child.dotted())
                    .where_clauses(&[clause.as_str()]);
                let data = q
                    .execute(&[id], self.database.name(), exec)?
                    .into_rows()?;
                for row in 0..data.len() {
                    if let Some(v) = data.get(row, &child_auto) {
                        child_ids.push(v.clone());
                    }
                }
            }
            if child_ids.is_empty() {
                continue;
            }
            node.children.push(child.impact_for_ids(child_ids, exec, visited)?);
        }
        Ok(node)
    }
}

/// One node of a cascading-delete preview tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeleteImpact {
    /// `schema.table`
    pub table: String,
    /// Surrogate identifiers of the rows that would be removed here.
    pub row_ids: Vec<Value>,
    pub children: Vec<DeleteImpact>,
}

impl DeleteImpact {
    /// Total rows removed across the whole tree, the root row included.
    pub fn rows_affected(&self) -> u64 {
        self.row_ids.len() as u64
            + self
                .children
                .iter()
                .map(DeleteImpact::rows_affected)
                .sum::<u64>()
    }

    /// Indented text rendering for confirmation prompts.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        self.describe_into(&mut out, 0);
        out
    }

    fn describe_into(&self, out: &mut String, depth: usize) {
        let noun = if self.row_ids.len() == 1 { "row" } else { "rows" };
        out.push_str(&"  ".repeat(depth));
        out.push_str(&format!("{}: {} {}\n", self.table, self.row_ids.len(), noun));
        for child in &self.children {
            child.describe_into(out, depth + 1);
        }
    }
}

struct FkLink {
    table: TableName,
    column: String,
}

/// The shared foreign-key catalog query. Selects the referencing side
/// (`fk_*`) and referenced side (`pk_*`) of every single-column foreign key
/// matching `extra_where`; args are bound by the caller at execute time.
pub(crate) fn fk_catalog_query(extra_where: &[&str]) -> Query {
    Query::new()
        .select(&[
            "fs.[name] AS [fk_schema]",
            "ft.[name] AS [fk_table]",
            "fc.[name] AS [fk_column]",
            "ps.[name] AS [pk_schema]",
            "pt.[name] AS [pk_table]",
            "pc.[name] AS [pk_column]",
        ])
        .from_as("sys.foreign_key_columns", "fkc")
        .join_on(
            JoinKind::Inner,
            "sys.tables",
            Some("ft"),
            "ft.object_id = fkc.parent_object_id",
        )
        .join_on(
            JoinKind::Inner,
            "sys.schemas",
            Some("fs"),
            "fs.schema_id = ft.schema_id",
        )
        .join_on(
            JoinKind::Inner,
            "sys.columns",
            Some("fc"),
            "fc.object_id = fkc.parent_object_id AND fc.column_id = fkc.parent_column_id",
        )
        .join_on(
            JoinKind::Inner,
            "sys.tables",
            Some("pt"),
            "pt.object_id = fkc.referenced_object_id",
        )
        .join_on(
            JoinKind::Inner,
            "sys.schemas",
            Some("ps"),
            "ps.schema_id = pt.schema_id",
        )
        .join_on(
            JoinKind::Inner,
            "sys.columns",
            Some("pc"),
            "pc.object_id = fkc.referenced_object_id AND pc.column_id = fkc.referenced_column_id",
        )
        .where_clauses(extra_where)
}

fn fk_links(data: &DataSet) -> Vec<(FkLink, TableName)> {
    let mut links = Vec::with_capacity(data.len());
    for row in 0..data.len() {
        let get = |col: &str| {
            data.get(row, col)
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string()
        };
        links.push((
            FkLink {
                table: TableName {
                    schema: get("fk_schema"),
                    name: get("fk_table"),
                },
                column: get("fk_column"),
            },
            TableName {
                schema: get("pk_schema"),
                name: get("pk_table"),
            },
        ));
    }
    links
}

/// Infer the ON predicate joining `child` to `parent` from the foreign-key
/// catalog. Exactly one foreign key may link the pair, in either direction;
/// the FK column always sits on the referencing table's side of the
/// predicate regardless of which table was named first.
pub(crate) fn infer_on(
    child: &TableName,
    parent: &TableName,
    child_alias: &str,
    parent_alias: &str,
    database: &str,
    exec: &impl Executor,
) -> DbResult<String> {
    let q = fk_catalog_query(&[
        "((fs.[name] = ? AND ft.[name] = ? AND ps.[name] = ? AND pt.[name] = ?) \
          OR (fs.[name] = ? AND ft.[name] = ? AND ps.[name] = ? AND pt.[name] = ?))",
    ]);
    let args = [
        Value::from(child.schema.as_str()),
        Value::from(child.name.as_str()),
        Value::from(parent.schema.as_str()),
        Value::from(parent.name.as_str()),
        Value::from(parent.schema.as_str()),
        Value::from(parent.name.as_str()),
        Value::from(child.schema.as_str()),
        Value::from(child.name.as_str()),
    ];
    let data = q.execute(&args, database, exec)?.into_rows()?;
    if data.is_empty() {
        return Err(Error::handled(format!(
            "No foreign-key relationship links {} and {}; supply an explicit ON clause.",
            child.dotted(),
            parent.dotted()
        )));
    }
    if data.len() > 1 {
        return Err(Error::handled(format!(
            "Multiple foreign-key paths link {} and {}; supply an explicit ON clause.",
            child.dotted(),
            parent.dotted()
        )));
    }

    let (link, referenced) = fk_links(&data).remove(0);
    let pk_column = data
        .get(0, "pk_column")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    // Orient by which side of the call the referencing table landed on.
    let (left_col, right_col) = if link.table.name == child.name && link.table.schema == child.schema
    {
        (link.column, pk_column)
    } else if referenced.name == child.name && referenced.schema == child.schema {
        (pk_column, link.column)
    } else {
        return Err(Error::handled(format!(
            "Foreign key between {} and {} does not match the joined tables.",
            link.table.dotted(),
            referenced.dotted()
        )));
    };
    Ok(format!(
        "{}.{} = {}.{}",
        child_alias,
        bracket(&left_col),
        parent_alias,
        bracket(&right_col)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockExecutor, ds};

    fn card_rack_catalog() -> (Vec<&'static str>, Vec<Value>) {
        (
            vec!["fk_schema", "fk_table", "fk_column", "pk_schema", "pk_table", "pk_column"],
            vec![
                Value::from("Asset"),
                Value::from("Card"),
                Value::from("RackAssetAutoID"),
                Value::from("Asset"),
                Value::from("Rack"),
                Value::from("RackAutoID"),
            ],
        )
    }

    fn script_columns(exec: &MockExecutor) {
        exec.reply_rows(ds(
            &["COLUMN_NAME", "DATA_TYPE", "CHARACTER_MAXIMUM_LENGTH", "IS_NULLABLE"],
            vec![
                vec![Value::from("RackAutoID"), Value::from("int"), Value::Null, Value::from("NO")],
                vec![Value::from("RackID"), Value::from("varchar"), Value::Int(100), Value::from("NO")],
                vec![Value::from("Comment"), Value::from("varchar"), Value::Null, Value::from("YES")],
            ],
        ));
        exec.reply_rows(ds(
            &["ColumnName", "ExtendedPropertyName", "ExtendedPropertyValue"],
            vec![
                vec![Value::from("RackAutoID"), Value::from("IsAutoID"), Value::from("1")],
                vec![Value::from("RackID"), Value::from("IsPrimaryID"), Value::from("1")],
            ],
        ));
    }

    #[test]
    fn columns_reflect_catalog_and_properties() {
        let exec = MockExecutor::new();
        script_columns(&exec);
        let table = Database::new("PRT_DB").table("Asset.Rack");
        let cols = table.columns(&exec).unwrap();
        assert_eq!(cols.len(), 3);
        assert!(cols[0].is_auto_id());
        assert!(cols[1].is_primary_id());
        assert!(cols[1].non_null);
        assert_eq!(cols[1].character_max, 100);
        // No reported length falls back to the default.
        assert_eq!(cols[2].character_max, Column::DEFAULT_CHARACTER_MAX);
        assert!(!cols[2].non_null);

        // Second access hits the memo, not the executor.
        let calls_before = exec.call_count();
        table.columns(&exec).unwrap();
        assert_eq!(exec.call_count(), calls_before);
    }

    #[test]
    fn identifier_roles_resolve_by_convention() {
        let exec = MockExecutor::new();
        script_columns(&exec);
        let table = Database::new("PRT_DB").table("Asset.Rack");
        assert_eq!(table.auto_id_column(&exec).unwrap(), "RackAutoID");
        assert_eq!(table.primary_id_column(&exec).unwrap(), "RackID");
    }

    #[test]
    fn missing_identifier_flag_is_not_found() {
        let exec = MockExecutor::new();
        exec.reply_rows(ds(
            &["COLUMN_NAME", "DATA_TYPE", "CHARACTER_MAXIMUM_LENGTH", "IS_NULLABLE"],
            vec![vec![Value::from("Name"), Value::from("varchar"), Value::Int(50), Value::from("NO")]],
        ));
        exec.reply_rows(ds(
            &["ColumnName", "ExtendedPropertyName", "ExtendedPropertyValue"],
            vec![],
        ));
        let table = Database::new("PRT_DB").table("Asset.Rack");
        let err = table.auto_id_column(&exec).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn unique_indices_split_aggregated_columns() {
        let exec = MockExecutor::new();
        exec.reply_rows(ds(
            &["Index", "Column"],
            vec![vec![Value::from("UQ_Rack_RackID"), Value::from("RackID, Comment")]],
        ));
        script_columns(&exec);
        let table = Database::new("PRT_DB").table("Asset.Rack");
        let indices = table.unique_indices(&exec).unwrap();
        let members = &indices["UQ_Rack_RackID"];
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].name, "RackID");
        assert_eq!(members[1].name, "Comment");
    }

    #[test]
    fn fk_reference_reads_the_referenced_table() {
        let exec = MockExecutor::new();
        script_columns(&exec);
        let table = Database::new("PRT_DB").table("Asset.Card");
        let cols = table.columns(&exec).unwrap();
        let (headers, row) = card_rack_catalog();
        exec.reply_rows(ds(&headers, vec![row]));
        assert_eq!(
            cols[0].fk_reference(&exec).unwrap(),
            Some("Asset.Rack".to_string())
        );

        exec.reply_rows(ds(&headers, vec![]));
        assert_eq!(cols[1].fk_reference(&exec).unwrap(), None);
    }

    #[test]
    fn delete_impact_walks_referencing_tables() {
        let exec = MockExecutor::new();
        let rack = Database::new("PRT_DB").table("Asset.Rack");

        let (fk_headers, fk_row) = card_rack_catalog();
        // Rack's referencing links: one, from Card.
        exec.reply_rows(ds(&fk_headers, vec![fk_row]));
        // Card's column reflection.
        exec.reply_rows(ds(
            &["COLUMN_NAME", "DATA_TYPE", "CHARACTER_MAXIMUM_LENGTH", "IS_NULLABLE"],
            vec![
                vec![Value::from("CardAutoID"), Value::from("int"), Value::Null, Value::from("NO")],
                vec![Value::from("RackAssetAutoID"), Value::from("int"), Value::Null, Value::from("NO")],
            ],
        ));
        exec.reply_rows(ds(
            &["ColumnName", "ExtendedPropertyName", "ExtendedPropertyValue"],
            vec![vec![Value::from("CardAutoID"), Value::from("IsAutoID"), Value::from("1")]],
        ));
        // Card rows referencing Rack 7.
        exec.reply_rows(ds(
            &["CardAutoID"],
            vec![vec![Value::Int(31)], vec![Value::Int(32)]],
        ));
        // Card's own referencing links: none.
        exec.reply_rows(ds(&fk_headers, vec![]));

        let impact = rack.delete_impact(&Value::Int(7), &exec).unwrap();
        assert_eq!(impact.table, "Asset.Rack");
        assert_eq!(impact.row_ids, vec![Value::Int(7)]);
        assert_eq!(impact.children.len(), 1);
        assert_eq!(impact.children[0].row_ids, vec![Value::Int(31), Value::Int(32)]);
        assert_eq!(impact.rows_affected(), 3);
        assert_eq!(
            impact.describe(),
            "Asset.Rack: 1 row\n  Asset.Card: 2 rows\n"
        );
    }

    #[test]
    fn delete_impact_terminates_on_fk_cycles() {
        let exec = MockExecutor::new();
        let rack = Database::new("PRT_DB").table("Asset.Rack");

        let fk_headers = ["fk_schema", "fk_table", "fk_column", "pk_schema", "pk_table", "pk_column"];
        // Rack referenced by Card.
        exec.reply_rows(ds(
            &fk_headers,
            vec![vec![
                Value::from("Asset"),
                Value::from("Card"),
                Value::from("RackAssetAutoID"),
                Value::from("Asset"),
                Value::from("Rack"),
                Value::from("RackAutoID"),
            ]],
        ));
        exec.reply_rows(ds(
            &["COLUMN_NAME", "DATA_TYPE", "CHARACTER_MAXIMUM_LENGTH", "IS_NULLABLE"],
            vec![vec![Value::from("CardAutoID"), Value::from("int"), Value::Null, Value::from("NO")]],
        ));
        exec.reply_rows(ds(
            &["ColumnName", "ExtendedPropertyName", "ExtendedPropertyValue"],
            vec![vec![Value::from("CardAutoID"), Value::from("IsAutoID"), Value::from("1")]],
        ));
        exec.reply_rows(ds(&["CardAutoID"], vec![vec![Value::Int(31)]]));
        // Card referenced by Rack, closing the cycle; the walk must skip it.
        exec.reply_rows(ds(
            &fk_headers,
            vec![vec![
                Value::from("Asset"),
                Value::from("Rack"),
                Value::from("PrimaryCardAutoID"),
                Value::from("Asset"),
                Value::from("Card"),
                Value::from("CardAutoID"),
            ]],
        ));

        let impact = rack.delete_impact(&Value::Int(7), &exec).unwrap();
        assert_eq!(impact.children.len(), 1);
        assert!(impact.children[0].children.is_empty());
    }

    #[test]
    fn row_count_reads_the_single_cell() {
        let exec = MockExecutor::new();
        exec.reply_rows(ds(&["Count"], vec![vec![Value::Int(42)]]));
        let table = Database::new("PRT_DB").table("Asset.Rack");
        assert_eq!(table.row_count(&exec).unwrap(), 42);
        let calls = exec.calls();
        assert_eq!(
            calls[0].statement,
            "SELECT COUNT(*) AS [Count] FROM [Asset].[Rack]"
        );
    }

    #[test]
    fn database_lists_base_tables() {
        let exec = MockExecutor::new();
        exec.reply_rows(ds(
            &["TABLE_SCHEMA", "TABLE_NAME"],
            vec![
                vec![Value::from("Asset"), Value::from("Card")],
                vec![Value::from("Asset"), Value::from("Rack")],
            ],
        ));
        let db = Database::new("PRT_DB");
        assert_eq!(db.tables(&exec).unwrap(), vec!["Asset.Card", "Asset.Rack"]);
    }
}
