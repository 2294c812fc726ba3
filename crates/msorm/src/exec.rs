//! The execution boundary.
//!
//! The core never manages connections, transactions, or drivers. Everything it
//! runs goes through one injected [`Executor`] capability, synchronously, with
//! a fully rendered statement string and an ordered argument list matching the
//! statement's `?` placeholders left to right.

use crate::value::Value;
use serde::{Deserialize, Serialize};

/// What a dispatched statement is expected to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expect {
    /// Tabular data (SELECT, or INSERT with an OUTPUT clause).
    ResultSet,
    /// An affected-row count (INSERT/UPDATE/DELETE).
    RowsAffected,
}

/// The successful outcome of an execution-boundary call.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecOutcome {
    Rows(DataSet),
    Affected(u64),
}

impl ExecOutcome {
    /// Unwrap a tabular outcome, or a decode error naming the mismatch.
    pub fn into_rows(self) -> Result<DataSet, crate::error::Error> {
        match self {
            ExecOutcome::Rows(ds) => Ok(ds),
            ExecOutcome::Affected(n) => Err(crate::error::Error::decode(format!(
                "expected a result set, got {n} rows affected"
            ))),
        }
    }

    /// Unwrap a rows-affected outcome, or a decode error naming the mismatch.
    pub fn into_affected(self) -> Result<u64, crate::error::Error> {
        match self {
            ExecOutcome::Affected(n) => Ok(n),
            ExecOutcome::Rows(_) => Err(crate::error::Error::decode(
                "expected a rows-affected count, got a result set",
            )),
        }
    }
}

/// The single capability the environment must supply.
///
/// Implementations own connection management entirely. An `Err` return is
/// converted to [`crate::error::Error::Unhandled`] at the one call site in
/// [`crate::query::Query::execute`]; the core never retries.
pub trait Executor {
    /// Run a rendered statement against the named database.
    fn run(
        &self,
        statement: &str,
        args: &[Value],
        database: &str,
        expect: Expect,
    ) -> Result<ExecOutcome, String>;
}

impl<E: Executor + ?Sized> Executor for &E {
    fn run(
        &self,
        statement: &str,
        args: &[Value],
        database: &str,
        expect: Expect,
    ) -> Result<ExecOutcome, String> {
        (**self).run(statement, args, database, expect)
    }
}

/// A tabular result set: ordered column headers plus rows of scalars.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl DataSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// An empty result set with the given headers.
    pub fn empty(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column header, if present.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Look up a cell by row index and column name.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)
    }

    /// Convert one row to an ordered column→value mapping, preserving the
    /// result set's column order. Missing trailing cells read as NULL.
    pub fn row_map(&self, row: usize) -> Vec<(String, Value)> {
        let cells = self.rows.get(row);
        self.columns
            .iter()
            .enumerate()
            .map(|(i, col)| {
                let value = cells
                    .and_then(|r| r.get(i))
                    .cloned()
                    .unwrap_or(Value::Null);
                (col.clone(), value)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_map_preserves_column_order() {
        let ds = DataSet::new(
            vec!["B".into(), "A".into(), "C".into()],
            vec![vec![Value::Int(1), Value::Int(2), Value::Int(3)]],
        );
        let map = ds.row_map(0);
        let headers: Vec<&str> = map.iter().map(|(c, _)| c.as_str()).collect();
        assert_eq!(headers, vec!["B", "A", "C"]);
        assert_eq!(map[1].1, Value::Int(2));
    }

    #[test]
    fn row_map_pads_missing_cells_with_null() {
        let ds = DataSet::new(
            vec!["A".into(), "B".into()],
            vec![vec![Value::Int(1)]],
        );
        assert_eq!(ds.row_map(0)[1].1, Value::Null);
        // Out-of-range row reads as all NULL.
        assert!(ds.row_map(9).iter().all(|(_, v)| *v == Value::Null));
    }

    #[test]
    fn get_by_header() {
        let ds = DataSet::new(
            vec!["AssetAutoID".into()],
            vec![vec![Value::Int(17)]],
        );
        assert_eq!(ds.get(0, "AssetAutoID"), Some(&Value::Int(17)));
        assert_eq!(ds.get(0, "Missing"), None);
    }
}
