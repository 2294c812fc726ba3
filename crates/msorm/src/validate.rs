//! Soft validation.
//!
//! Hard failures are [`crate::error::Error`] values and stop an operation
//! outright. Soft findings are [`Warning`]s: advisory, accumulated rather
//! than short-circuited, and overridable. A write guarded by a
//! [`ValidationHandler`] runs every registered check, folds the findings into
//! one [`WarningGroup`], and either proceeds (no findings, or the caller
//! forces through) or returns the group as a pending [`Outcome`] for the
//! caller to confirm.

use std::ops::Add;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::DbResult;
use crate::exec::Executor;
use crate::ident::bracket;
use crate::query::Query;
use crate::table::Table;
use crate::value::Value;

/// One advisory finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub message: String,
}

impl Warning {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// An ordered accumulation of warnings.
///
/// Groups combine with `+`, preserving insertion order, so folding findings
/// from many checks is associative: grouping does not change the result.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WarningGroup {
    pub warnings: Vec<Warning>,
}

impl WarningGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    /// One message per line, for confirmation prompts.
    pub fn summary(&self) -> String {
        self.warnings
            .iter()
            .map(|w| w.message.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Add for WarningGroup {
    type Output = WarningGroup;

    fn add(mut self, rhs: WarningGroup) -> WarningGroup {
        self.warnings.extend(rhs.warnings);
        self
    }
}

impl Add<Warning> for WarningGroup {
    type Output = WarningGroup;

    fn add(mut self, rhs: Warning) -> WarningGroup {
        self.warnings.push(rhs);
        self
    }
}

impl Add for Warning {
    type Output = WarningGroup;

    fn add(self, rhs: Warning) -> WarningGroup {
        WarningGroup {
            warnings: vec![self, rhs],
        }
    }
}

impl From<Warning> for WarningGroup {
    fn from(warning: Warning) -> Self {
        Self {
            warnings: vec![warning],
        }
    }
}

impl FromIterator<Warning> for WarningGroup {
    fn from_iter<I: IntoIterator<Item = Warning>>(iter: I) -> Self {
        Self {
            warnings: iter.into_iter().collect(),
        }
    }
}

/// The result of a soft-validated operation: either it ran, or it is pending
/// on the caller confirming the accumulated warnings (re-issue with force).
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Done(T),
    Pending(WarningGroup),
}

impl<T> Outcome<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done(_))
    }

    /// The completed value, discarding a pending outcome.
    pub fn done(self) -> Option<T> {
        match self {
            Outcome::Done(v) => Some(v),
            Outcome::Pending(_) => None,
        }
    }

    /// The pending warnings, if the operation did not run.
    pub fn pending(self) -> Option<WarningGroup> {
        match self {
            Outcome::Done(_) => None,
            Outcome::Pending(w) => Some(w),
        }
    }
}

/// One advisory check over a proposed write. Checks may consult the catalog
/// or the data through the execution boundary; they must not mutate.
pub trait SoftCheck {
    /// A short name for diagnostics.
    fn name(&self) -> &str;

    /// Inspect the proposed values and return any findings.
    fn check(
        &self,
        table: &Table,
        values: &[(String, Value)],
        exec: &dyn Executor,
    ) -> DbResult<WarningGroup>;
}

/// An ordered pipeline of soft checks.
///
/// All checks always run; findings accumulate across the pipeline rather
/// than short-circuiting, so the caller sees every advisory at once. A hard
/// error from any check still aborts immediately.
#[derive(Default)]
pub struct ValidationHandler {
    checks: Vec<Box<dyn SoftCheck>>,
}

impl ValidationHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, check: Box<dyn SoftCheck>) -> Self {
        self.checks.push(check);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Run every check in registration order and fold the findings.
    pub fn validate(
        &self,
        table: &Table,
        values: &[(String, Value)],
        exec: &impl Executor,
    ) -> DbResult<WarningGroup> {
        let mut findings = WarningGroup::new();
        for check in &self.checks {
            let group = check.check(table, values, exec as &dyn Executor)?;
            if !group.is_empty() {
                debug!(check = check.name(), findings = group.len(), "soft check flagged");
            }
            findings = findings + group;
        }
        Ok(findings)
    }
}

/// Warns when a proposed column value is already present in another row,
/// for columns that are unique by convention rather than by constraint.
pub struct OccupiedValueCheck {
    pub column: String,
}

impl OccupiedValueCheck {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl SoftCheck for OccupiedValueCheck {
    fn name(&self) -> &str {
        "occupied-value"
    }

    fn check(
        &self,
        table: &Table,
        values: &[(String, Value)],
        exec: &dyn Executor,
    ) -> DbResult<WarningGroup> {
        let Some((_, value)) = values.iter().find(|(col, _)| col == &self.column) else {
            return Ok(WarningGroup::new());
        };
        if value.is_null_sentinel() {
            return Ok(WarningGroup::new());
        }
        let clause = format!("{} = ?", bracket(&self.column));
        let q = Query::new()
            .select(&["COUNT(*) AS [Count]"])
            .from(&table.dotted())
            .where_clauses(&[clause.as_str()]);
        let data = q
            .execute(&[value.clone()], table.database().name(), &exec)?
            .into_rows()?;
        let count = data.get(0, "Count").and_then(Value::as_i64).unwrap_or(0);
        if count > 0 {
            Ok(Warning::new(format!(
                "{} = {} is already present in {} ({} existing {}).",
                self.column,
                value,
                table.full_name(),
                count,
                if count == 1 { "row" } else { "rows" }
            ))
            .into())
        } else {
            Ok(WarningGroup::new())
        }
    }
}

/// Warns when a trigger column holds a given value but a dependent column
/// arrived empty. Catalog-free.
pub struct ConditionalFieldCheck {
    pub trigger_column: String,
    pub trigger_value: Value,
    pub dependent_column: String,
}

impl ConditionalFieldCheck {
    pub fn new(
        trigger_column: impl Into<String>,
        trigger_value: Value,
        dependent_column: impl Into<String>,
    ) -> Self {
        Self {
            trigger_column: trigger_column.into(),
            trigger_value,
            dependent_column: dependent_column.into(),
        }
    }
}

impl SoftCheck for ConditionalFieldCheck {
    fn name(&self) -> &str {
        "conditional-field"
    }

    fn check(
        &self,
        table: &Table,
        values: &[(String, Value)],
        _exec: &dyn Executor,
    ) -> DbResult<WarningGroup> {
        let triggered = values
            .iter()
            .any(|(col, v)| col == &self.trigger_column && *v == self.trigger_value);
        if !triggered {
            return Ok(WarningGroup::new());
        }
        let dependent_empty = values
            .iter()
            .find(|(col, _)| col == &self.dependent_column)
            .is_none_or(|(_, v)| v.is_null_sentinel());
        if dependent_empty {
            Ok(Warning::new(format!(
                "{} is expected when {} is {} on {}.",
                self.dependent_column,
                self.trigger_column,
                self.trigger_value,
                table.full_name()
            ))
            .into())
        } else {
            Ok(WarningGroup::new())
        }
    }
}
