//! Row handles and row-level CRUD.
//!
//! A [`Row`] is a handle on at most one physical row of a [`Table`],
//! identified either by a known surrogate identifier or by a filter map that
//! resolves lazily on first use. The handle moves through an identity state
//! machine: unresolved, resolved, missing, deleted. Writes always key on the
//! surrogate identifier; the filter map is only ever used to find it.

use std::cell::RefCell;

use tracing::debug;

use crate::error::{DbResult, Error};
use crate::exec::Executor;
use crate::ident::bracket;
use crate::query::Query;
use crate::table::Table;
use crate::validate::{Outcome, ValidationHandler};
use crate::value::Value;

/// Columns the engine or the base-table conventions populate; exempt from
/// required-field validation on writes.
const SYSTEM_COLUMNS: &[&str] = &["DateCreated", "isBaseTable", "isDisabled"];

/// Columns never included in INSERT/SET value lists, beyond the surrogate
/// and computed identifiers.
const NON_WRITABLE_COLUMNS: &[&str] = &["isBaseTable", "DateCreated"];

#[derive(Debug, Clone, PartialEq)]
enum Identity {
    /// Filters supplied, surrogate identifier not yet looked up.
    Unresolved,
    /// Surrogate identifier known.
    Resolved(Value),
    /// Lookup ran and matched nothing.
    Missing,
    /// The row was deleted through this handle.
    Deleted,
}

/// A handle on at most one physical row.
#[derive(Debug)]
pub struct Row<'t> {
    table: &'t Table,
    filters: Vec<(String, Value)>,
    identity: RefCell<Identity>,
}

impl<'t> Row<'t> {
    /// Bind to a known surrogate identifier. No round trip.
    pub fn by_id(table: &'t Table, auto_id: impl Into<Value>) -> Self {
        Self {
            table,
            filters: Vec::new(),
            identity: RefCell::new(Identity::Resolved(auto_id.into())),
        }
    }

    /// Bind to whatever single row matches `filters`; the surrogate
    /// identifier resolves lazily on first use.
    pub fn matching(table: &'t Table, filters: Vec<(String, Value)>) -> Self {
        Self {
            table,
            filters,
            identity: RefCell::new(Identity::Unresolved),
        }
    }

    pub fn table(&self) -> &'t Table {
        self.table
    }

    /// The row's surrogate identifier, resolving through the filter map if
    /// needed. `None` means the filters match no row (or the handle was
    /// deleted).
    ///
    /// # Panics
    ///
    /// Panics if the handle was constructed with neither an identifier nor
    /// any filters; such a handle cannot name a row and the construction
    /// site is the bug.
    pub fn auto_id(&self, exec: &impl Executor) -> DbResult<Option<Value>> {
        match self.identity.borrow().clone() {
            Identity::Resolved(id) => return Ok(Some(id)),
            Identity::Missing | Identity::Deleted => return Ok(None),
            Identity::Unresolved => {}
        }
        assert!(
            !self.filters.is_empty(),
            "row handle has neither an identifier nor filters"
        );

        let auto = self.table.auto_id_column(exec)?;
        let clauses: Vec<String> = self
            .filters
            .iter()
            .map(|(col, _)| format!("{} = ?", bracket(col)))
            .collect();
        let clause_refs: Vec<&str> = clauses.iter().map(String::as_str).collect();
        let args: Vec<Value> = self.filters.iter().map(|(_, v)| v.clone()).collect();
        let q = Query::new()
            .select(&[auto.as_str()])
            .from(&self.table.dotted())
            .where_clauses(&clause_refs);
        let data = q
            .execute(&args, self.table.database().name(), exec)?
            .into_rows()?;

        match data.get(0, &auto).cloned() {
            Some(id) => {
                *self.identity.borrow_mut() = Identity::Resolved(id.clone());
                Ok(Some(id))
            }
            None => {
                *self.identity.borrow_mut() = Identity::Missing;
                Ok(None)
            }
        }
    }

    /// Whether the handle currently names a physical row.
    pub fn exists(&self, exec: &impl Executor) -> DbResult<bool> {
        Ok(self.auto_id(exec)?.is_some())
    }

    /// The row's full column→value map in column order. A handle that names
    /// no row reads as all-NULL, so callers can render a blank form without
    /// special-casing.
    pub fn values(&self, exec: &impl Executor) -> DbResult<Vec<(String, Value)>> {
        let Some(id) = self.auto_id(exec)? else {
            return self.empty_values(exec);
        };
        let auto = self.table.auto_id_column(exec)?;
        let clause = format!("{} = ?", bracket(&auto));
        let q = Query::new()
            .select(&[])
            .from(&self.table.dotted())
            .where_clauses(&[clause.as_str()]);
        let data = q
            .execute(&[id], self.table.database().name(), exec)?
            .into_rows()?;
        if data.is_empty() {
            return self.empty_values(exec);
        }
        Ok(data.row_map(0))
    }

    fn empty_values(&self, exec: &impl Executor) -> DbResult<Vec<(String, Value)>> {
        Ok(self
            .table
            .column_headers(exec)?
            .into_iter()
            .map(|col| (col, Value::Null))
            .collect())
    }

    /// The row's business identifier.
    pub fn primary_id(&self, exec: &impl Executor) -> DbResult<Value> {
        let Some(id) = self.auto_id(exec)? else {
            return Err(Error::not_found(format!(
                "No row in {} matches this handle",
                self.table.full_name()
            )));
        };
        self.table.primary_id_for_auto_id(&id, exec)
    }

    /// Every NOT NULL column outside the exemption set must arrive with a
    /// non-sentinel value; the error names all offenders at once.
    fn check_required(
        &self,
        values: &[(String, Value)],
        exec: &impl Executor,
    ) -> DbResult<()> {
        let auto = self.table.auto_id_column(exec)?;
        let missing: Vec<String> = self
            .table
            .non_null_column_headers(exec)?
            .into_iter()
            .filter(|col| col != &auto && !SYSTEM_COLUMNS.contains(&col.as_str()))
            .filter(|col| {
                values
                    .iter()
                    .find(|(name, _)| name == col)
                    .is_none_or(|(_, v)| v.is_null_sentinel())
            })
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::handled(format!(
                "{} requires values for: {}",
                self.table.full_name(),
                missing.join(", ")
            )))
        }
    }

    /// Drop columns callers may not write: the surrogate identifier, any
    /// engine-computed column, and the base-table bookkeeping columns.
    fn writable_values(
        &self,
        values: &[(String, Value)],
        exec: &impl Executor,
    ) -> DbResult<Vec<(String, Value)>> {
        let auto = self.table.auto_id_column(exec)?;
        let computed = self.table.computed_id_column(exec)?;
        Ok(values
            .iter()
            .filter(|(col, _)| {
                col != &auto
                    && Some(col) != computed.as_ref()
                    && !NON_WRITABLE_COLUMNS.contains(&col.as_str())
            })
            .cloned()
            .collect())
    }

    /// Insert a new row and bind this handle to it, returning the generated
    /// surrogate identifier. One round trip: the INSERT carries an OUTPUT
    /// clause returning the identifier, so there is no re-select race.
    ///
    /// A handle that already names a row is a handled failure, detected
    /// before anything executes.
    pub fn create(
        &self,
        values: &[(String, Value)],
        exec: &impl Executor,
    ) -> DbResult<Value> {
        match *self.identity.borrow() {
            Identity::Resolved(_) => {
                return Err(Error::handled(format!(
                    "Row already exists in {}",
                    self.table.full_name()
                )));
            }
            Identity::Deleted => {
                return Err(Error::handled(format!(
                    "Row was already deleted from {}",
                    self.table.full_name()
                )));
            }
            Identity::Unresolved | Identity::Missing => {}
        }
        if !self.filters.is_empty() && self.auto_id(exec)?.is_some() {
            return Err(Error::handled(format!(
                "Row already exists in {}",
                self.table.full_name()
            )));
        }

        self.check_required(values, exec)?;
        let inserts = self.writable_values(values, exec)?;
        if inserts.is_empty() {
            return Err(Error::handled(format!(
                "No writable values were supplied for {}",
                self.table.full_name()
            )));
        }

        let auto = self.table.auto_id_column(exec)?;
        let q = Query::new().insert(&self.table.dotted(), inserts, Some(&auto));
        let data = q
            .execute(&[], self.table.database().name(), exec)?
            .into_rows()?;
        let id = data.get(0, &auto).cloned().ok_or_else(|| {
            Error::decode(format!("INSERT into {} returned no {}", self.table.full_name(), auto))
        })?;
        debug!(table = %self.table.dotted(), id = %id, "created row");
        *self.identity.borrow_mut() = Identity::Resolved(id.clone());
        Ok(id)
    }

    /// Update this row's columns, keyed on the surrogate identifier. Returns
    /// the affected-row count.
    pub fn update(
        &self,
        values: &[(String, Value)],
        exec: &impl Executor,
    ) -> DbResult<u64> {
        if *self.identity.borrow() == Identity::Deleted {
            return Err(Error::handled(format!(
                "Row was already deleted from {}",
                self.table.full_name()
            )));
        }
        let Some(id) = self.auto_id(exec)? else {
            return Err(Error::not_found(format!(
                "No row in {} matches this handle",
                self.table.full_name()
            )));
        };

        self.check_required(values, exec)?;
        let updates = self.writable_values(values, exec)?;
        if updates.is_empty() {
            return Err(Error::handled(format!(
                "No writable values were supplied for {}",
                self.table.full_name()
            )));
        }

        let auto = self.table.auto_id_column(exec)?;
        let clause = format!("{} = ?", bracket(&auto));
        let q = Query::new()
            .update(&self.table.dotted())
            .set(updates)
            .where_clauses(&[clause.as_str()]);
        let affected = q
            .execute(&[id], self.table.database().name(), exec)?
            .into_affected()?;
        debug!(table = %self.table.dotted(), affected, "updated row");
        Ok(affected)
    }

    /// Delete this row, keyed on the surrogate identifier. The handle moves
    /// to the deleted state and refuses further writes.
    pub fn delete(&self, exec: &impl Executor) -> DbResult<u64> {
        if *self.identity.borrow() == Identity::Deleted {
            return Err(Error::handled(format!(
                "Row was already deleted from {}",
                self.table.full_name()
            )));
        }
        let Some(id) = self.auto_id(exec)? else {
            return Err(Error::not_found(format!(
                "No row in {} matches this handle",
                self.table.full_name()
            )));
        };

        let auto = self.table.auto_id_column(exec)?;
        let clause = format!("{} = ?", bracket(&auto));
        let q = Query::new()
            .delete(&self.table.dotted())
            .where_clauses(&[clause.as_str()]);
        let affected = q
            .execute(&[id], self.table.database().name(), exec)?
            .into_affected()?;
        debug!(table = %self.table.dotted(), affected, "deleted row");
        *self.identity.borrow_mut() = Identity::Deleted;
        Ok(affected)
    }

    /// [`Row::create`] behind soft validation: warnings come back as a
    /// pending outcome unless `force` overrides them.
    pub fn create_checked(
        &self,
        values: &[(String, Value)],
        handler: &ValidationHandler,
        force: bool,
        exec: &impl Executor,
    ) -> DbResult<Outcome<Value>> {
        let warnings = handler.validate(self.table, values, exec)?;
        if !force && !warnings.is_empty() {
            return Ok(Outcome::Pending(warnings));
        }
        Ok(Outcome::Done(self.create(values, exec)?))
    }

    /// [`Row::update`] behind soft validation.
    pub fn update_checked(
        &self,
        values: &[(String, Value)],
        handler: &ValidationHandler,
        force: bool,
        exec: &impl Executor,
    ) -> DbResult<Outcome<u64>> {
        let warnings = handler.validate(self.table, values, exec)?;
        if !force && !warnings.is_empty() {
            return Ok(Outcome::Pending(warnings));
        }
        Ok(Outcome::Done(self.update(values, exec)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::Expect;
    use crate::table::Database;
    use crate::test_support::{MockExecutor, ds};

    fn script_rack_columns(exec: &MockExecutor) {
        exec.reply_rows(ds(
            &["COLUMN_NAME", "DATA_TYPE", "CHARACTER_MAXIMUM_LENGTH", "IS_NULLABLE"],
            vec![
                vec![Value::from("RackAutoID"), Value::from("int"), Value::Null, Value::from("NO")],
                vec![Value::from("RackID"), Value::from("varchar"), Value::Int(100), Value::from("NO")],
                vec![Value::from("DateCreated"), Value::from("datetime"), Value::Null, Value::from("NO")],
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

    fn script_no_computed_columns(exec: &MockExecutor, count: usize) {
        for _ in 0..count {
            exec.reply_rows(ds(&["Computed"], vec![vec![Value::Int(0)]]));
        }
    }

    #[test]
    fn create_on_an_existing_row_fails_before_executing() {
        let exec = MockExecutor::new();
        let table = Database::new("PRT_DB").table("Asset.Rack");
        let row = table.get_row(7);
        let err = row
            .create(&[("RackID".into(), Value::from("R-1"))], &exec)
            .unwrap_err();
        assert!(err.is_handled());
        assert!(err.to_string().contains("already exists"));
        assert_eq!(exec.call_count(), 0);
    }

    #[test]
    fn create_inserts_with_output_and_binds_the_identity() {
        let exec = MockExecutor::new();
        let table = Database::new("PRT_DB").table("Asset.Rack");
        script_rack_columns(&exec);
        // Computed-column probes, one per column, none computed.
        script_no_computed_columns(&exec, 4);
        exec.reply_rows(ds(&["RackAutoID"], vec![vec![Value::Int(12)]]));

        let row = Row::matching(&table, vec![]);
        let id = row
            .create(
                &[
                    ("RackID".into(), Value::from("R-1")),
                    ("Comment".into(), Value::from("")),
                ],
                &exec,
            )
            .unwrap();
        assert_eq!(id, Value::Int(12));

        let calls = exec.calls();
        let insert = calls.last().unwrap();
        assert_eq!(
            insert.statement,
            "INSERT INTO [Asset].[Rack] ([RackID], [Comment]) \
             OUTPUT INSERTED.[RackAutoID] VALUES (?, NULL)"
        );
        assert_eq!(insert.args, vec![Value::from("R-1")]);
        assert_eq!(insert.expect, Expect::ResultSet);

        // The handle is now resolved; a second create fails without executing.
        let before = exec.call_count();
        assert!(row.create(&[("RackID".into(), Value::from("R-2"))], &exec).is_err());
        assert_eq!(exec.call_count(), before);
    }

    #[test]
    fn create_names_every_missing_required_field() {
        let exec = MockExecutor::new();
        let table = Database::new("PRT_DB").table("Asset.Rack");
        script_rack_columns(&exec);

        let row = Row::matching(&table, vec![]);
        // RackID absent entirely; DateCreated is exempt as a system column.
        let err = row
            .create(&[("Comment".into(), Value::from("x"))], &exec)
            .unwrap_err();
        assert!(err.is_handled());
        assert!(err.to_string().contains("RackID"));
        assert!(!err.to_string().contains("DateCreated"));

        // A sentinel NULL counts as missing too.
        let err = row
            .create(&[("RackID".into(), Value::from("null"))], &exec)
            .unwrap_err();
        assert!(err.to_string().contains("RackID"));
    }

    #[test]
    fn filters_resolve_lazily_and_memoize() {
        let exec = MockExecutor::new();
        let table = Database::new("PRT_DB").table("Asset.Rack");
        script_rack_columns(&exec);
        exec.reply_rows(ds(&["RackAutoID"], vec![vec![Value::Int(9)]]));

        let row = Row::matching(&table, vec![("RackID".into(), Value::from("R-9"))]);
        assert_eq!(row.auto_id(&exec).unwrap(), Some(Value::Int(9)));

        let calls = exec.calls();
        let lookup = &calls[2];
        assert_eq!(
            lookup.statement,
            "SELECT RackAutoID FROM [Asset].[Rack] WHERE [RackID] = ?"
        );
        assert_eq!(lookup.args, vec![Value::from("R-9")]);

        // Resolution is memoized.
        let before = exec.call_count();
        assert_eq!(row.auto_id(&exec).unwrap(), Some(Value::Int(9)));
        assert_eq!(exec.call_count(), before);
    }

    #[test]
    fn unmatched_filters_read_as_missing() {
        let exec = MockExecutor::new();
        let table = Database::new("PRT_DB").table("Asset.Rack");
        script_rack_columns(&exec);
        exec.reply_rows(ds(&["RackAutoID"], vec![]));

        let row = Row::matching(&table, vec![("RackID".into(), Value::from("nope"))]);
        assert!(!row.exists(&exec).unwrap());

        // And values() renders the blank form.
        let values = row.values(&exec).unwrap();
        assert_eq!(values.len(), 4);
        assert!(values.iter().all(|(_, v)| *v == Value::Null));

        // Updating it is a not-found failure.
        let err = row
            .update(&[("RackID".into(), Value::from("R-1"))], &exec)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn update_keys_on_the_surrogate_identifier() {
        let exec = MockExecutor::new();
        let table = Database::new("PRT_DB").table("Asset.Rack");
        script_rack_columns(&exec);
        script_no_computed_columns(&exec, 4);
        exec.reply_affected(1);

        let row = table.get_row(7);
        let affected = row
            .update(
                &[
                    ("RackID".into(), Value::from("R-7")),
                    ("DateCreated".into(), Value::from("2026-01-01 00:00:00")),
                ],
                &exec,
            )
            .unwrap();
        assert_eq!(affected, 1);

        let update = exec.calls().last().unwrap().clone();
        // DateCreated is filtered out of the SET list.
        assert_eq!(
            update.statement,
            "UPDATE [Asset].[Rack] SET [RackID] = ? WHERE [RackAutoID] = ?"
        );
        assert_eq!(update.args, vec![Value::from("R-7"), Value::Int(7)]);
        assert_eq!(update.expect, Expect::RowsAffected);
    }

    #[test]
    fn delete_moves_the_handle_to_deleted() {
        let exec = MockExecutor::new();
        let table = Database::new("PRT_DB").table("Asset.Rack");
        script_rack_columns(&exec);
        exec.reply_affected(1);

        let row = table.get_row(7);
        assert_eq!(row.delete(&exec).unwrap(), 1);
        let delete = exec.calls().last().unwrap().clone();
        assert_eq!(
            delete.statement,
            "DELETE FROM [Asset].[Rack] WHERE [RackAutoID] = ?"
        );

        let err = row.delete(&exec).unwrap_err();
        assert!(err.to_string().contains("already deleted"));
        let err = row
            .update(&[("RackID".into(), Value::from("R-1"))], &exec)
            .unwrap_err();
        assert!(err.is_handled());
    }
}
