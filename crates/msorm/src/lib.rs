//! # msorm
//!
//! A schema-reflecting SQL statement builder and row-level CRUD layer for
//! MSSQL-dialect databases.
//!
//! The crate has three layers:
//!
//! - **Statements** ([`stmt`], [`Query`]): composable clause objects rendered
//!   to bracket-quoted, `?`-parameterized SQL. A [`Query`] is an ordered
//!   clause list; it validates as a whole, renders idempotently, and executes
//!   through an injected boundary.
//! - **Metadata** ([`Database`], [`Table`], [`Column`]): lazy, memoizing
//!   reflection over the engine's catalog. Identifier roles are discovered
//!   through extended-property conventions (`IsAutoID`, `IsPrimaryID`).
//! - **Rows** ([`Row`]): handles on single physical rows with create, update,
//!   and delete keyed on the surrogate identifier, plus soft validation
//!   ([`validate`]) that accumulates overridable warnings instead of failing.
//!
//! The crate never owns a connection. Every round trip goes through the one
//! injected [`Executor`] capability, synchronously, so the core stays
//! engine-agnostic and trivially testable.
//!
//! ```no_run
//! use msorm::{Executor, Query, Value};
//!
//! fn list_page(exec: &impl Executor) -> msorm::DbResult<()> {
//!     let q = Query::new()
//!         .select(&[])
//!         .from("Asset.Rack")
//!         .paginate(&["RackAutoID"], 20, 1);
//!     let data = q.execute(&[], "PRT_DB", exec)?.into_rows()?;
//!     for row in 0..data.len() {
//!         let _name = data.get(row, "RackID").cloned().unwrap_or(Value::Null);
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod exec;
pub mod ident;
pub mod query;
pub mod row;
pub mod stmt;
pub mod table;
pub mod validate;
pub mod value;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{DbResult, Error};
pub use exec::{DataSet, ExecOutcome, Executor, Expect};
pub use ident::TableName;
pub use query::Query;
pub use row::Row;
pub use stmt::{JoinKind, Statement};
pub use table::{Column, Database, DeleteImpact, Table};
pub use validate::{Outcome, SoftCheck, ValidationHandler, Warning, WarningGroup};
pub use value::Value;
