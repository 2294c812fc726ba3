//! Statement clause objects.
//!
//! A [`Statement`] is a tagged variant over all clause kinds the builder
//! emits. Each variant validates itself and renders to a clause fragment;
//! a variant never renders once its own validation has failed. Clauses that
//! carry values (INSERT, SET) also contribute positional arguments, in input
//! order, skipping sentinel-NULL values which render inline.

mod filter;
mod mutation;
mod select;

pub use filter::{Fetch, GroupBy, Offset, OrderBy, WhereClause};
pub use mutation::{Delete, Insert, SetClause, Update};
pub use select::{FromClause, Join, Select};

use crate::error::DbResult;
use crate::value::Value;

/// Join kind, rendered as the leading keyword of the JOIN clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Outer,
}

impl JoinKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER",
            JoinKind::Left => "LEFT",
            JoinKind::Right => "RIGHT",
            JoinKind::Outer => "OUTER",
        }
    }
}

/// One SQL clause, self-validating and independently renderable.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(Select),
    From(FromClause),
    Join(Join),
    Where(WhereClause),
    OrderBy(OrderBy),
    GroupBy(GroupBy),
    Offset(Offset),
    Fetch(Fetch),
    Insert(Insert),
    Update(Update),
    Set(SetClause),
    Delete(Delete),
}

impl Statement {
    /// Validate this clause in isolation.
    pub fn validate(&self) -> DbResult<()> {
        match self {
            Statement::Select(s) => s.validate(),
            Statement::Where(s) => s.validate(),
            Statement::Insert(s) => s.validate(),
            Statement::Set(s) => s.validate(),
            Statement::OrderBy(s) => s.validate(),
            Statement::GroupBy(s) => s.validate(),
            // The remaining clauses have no invalid shapes once constructed.
            Statement::From(_)
            | Statement::Join(_)
            | Statement::Offset(_)
            | Statement::Fetch(_)
            | Statement::Update(_)
            | Statement::Delete(_) => Ok(()),
        }
    }

    /// Render the clause fragment. Validation failures surface here and the
    /// fragment is never produced.
    pub fn render(&self) -> DbResult<String> {
        self.validate()?;
        Ok(match self {
            Statement::Select(s) => s.fragment(),
            Statement::From(s) => s.fragment(),
            Statement::Join(s) => s.fragment(),
            Statement::Where(s) => s.fragment(),
            Statement::OrderBy(s) => s.fragment(),
            Statement::GroupBy(s) => s.fragment(),
            Statement::Offset(s) => s.fragment(),
            Statement::Fetch(s) => s.fragment(),
            Statement::Insert(s) => s.fragment(),
            Statement::Update(s) => s.fragment(),
            Statement::Set(s) => s.fragment(),
            Statement::Delete(s) => s.fragment(),
        })
    }

    /// Positional arguments this clause contributes, left to right.
    pub fn args(&self) -> Vec<Value> {
        match self {
            Statement::Insert(s) => s.args(),
            Statement::Set(s) => s.args(),
            _ => Vec::new(),
        }
    }

    /// Whether this clause kind may open a query (the base statement).
    pub fn is_base(&self) -> bool {
        matches!(
            self,
            Statement::Select(_)
                | Statement::Insert(_)
                | Statement::Update(_)
                | Statement::Delete(_)
        )
    }

    /// Whether this clause kind mutates rows when it is the base statement.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Statement::Insert(_) | Statement::Update(_) | Statement::Delete(_)
        )
    }
}
