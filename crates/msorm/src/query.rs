//! Ordered-clause query composition and execution.
//!
//! A [`Query`] is an ordered sequence of [`Statement`]s, appended through a
//! fluent API. The first statement (the base statement) must be SELECT,
//! INSERT, UPDATE, or DELETE and decides whether execution expects a result
//! set or a rows-affected count. Validation is the logical AND of every
//! member's own validation, first failure wins; nothing renders and nothing
//! executes past a failed validation.

use crate::error::{DbResult, Error};
use crate::exec::{ExecOutcome, Expect, Executor};
use crate::ident::TableName;
use crate::stmt::{
    Delete, Fetch, FromClause, GroupBy, Insert, Join, JoinKind, Offset, OrderBy, Select, SetClause,
    Statement, Update, WhereClause,
};
use crate::table::{Database, Table, infer_on};
use crate::value::Value;
use tracing::{debug, warn};

/// An ordered collection of statements, rendered and executed as one.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    statements: Vec<Statement>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// The composed statements, in append order.
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// The base statement, which determines execution semantics.
    pub fn base(&self) -> Option<&Statement> {
        self.statements.first()
    }

    fn from_table(&self) -> Option<&TableName> {
        self.statements.iter().find_map(|s| match s {
            Statement::From(f) => Some(&f.table),
            _ => None,
        })
    }

    // ==================== Fluent appends ====================

    /// Append `SELECT <columns>`; an empty list selects `*`.
    pub fn select(mut self, columns: &[&str]) -> Self {
        self.statements.push(Statement::Select(Select::new(
            columns.iter().map(|s| s.to_string()).collect(),
        )));
        self
    }

    /// Append `SELECT DISTINCT <columns>`.
    pub fn select_distinct(mut self, columns: &[&str]) -> Self {
        let mut sel = Select::new(columns.iter().map(|s| s.to_string()).collect());
        sel.distinct = true;
        self.statements.push(Statement::Select(sel));
        self
    }

    /// Append `SELECT TOP <n> <columns>`.
    pub fn select_top(mut self, n: u32, columns: &[&str]) -> Self {
        let mut sel = Select::new(columns.iter().map(|s| s.to_string()).collect());
        sel.top = Some(n);
        self.statements.push(Statement::Select(sel));
        self
    }

    /// Append `FROM <table>`.
    pub fn from(mut self, table: &str) -> Self {
        self.statements
            .push(Statement::From(FromClause::new(table, None)));
        self
    }

    /// Append `FROM <table> AS <alias>`.
    pub fn from_as(mut self, table: &str, alias: &str) -> Self {
        self.statements
            .push(Statement::From(FromClause::new(table, Some(alias))));
        self
    }

    /// Append a JOIN with an explicit ON predicate. The parent defaults to
    /// the current FROM table.
    pub fn join_on(mut self, kind: JoinKind, child: &str, child_alias: Option<&str>, on: &str) -> Self {
        let child_t = TableName::parse(child);
        let parent_t = self.from_table().cloned().unwrap_or_else(|| child_t.clone());
        self.statements.push(Statement::Join(Join::new(
            child_t,
            parent_t,
            child_alias,
            None,
            on.to_string(),
            kind,
        )));
        self
    }

    /// Append a JOIN whose ON predicate is inferred from the foreign-key
    /// catalog for the child/parent pair. The parent defaults to the current
    /// FROM table. Exactly one single-column foreign key must link the pair:
    /// absence and ambiguity both fail with a handled error asking for an
    /// explicit ON clause.
    #[allow(clippy::too_many_arguments)]
    pub fn join_fk(
        mut self,
        kind: JoinKind,
        child: &str,
        parent: Option<&str>,
        child_alias: Option<&str>,
        parent_alias: Option<&str>,
        database: &str,
        exec: &impl Executor,
    ) -> DbResult<Self> {
        let child_t = TableName::parse(child);
        let parent_t = match parent {
            Some(p) => TableName::parse(p),
            None => self.from_table().cloned().ok_or_else(|| {
                Error::handled("JOIN without an explicit parent requires a FROM table.")
            })?,
        };
        let child_alias_s = child_alias
            .map(str::to_string)
            .unwrap_or_else(|| child_t.default_alias());
        let parent_alias_s = parent_alias
            .map(str::to_string)
            .unwrap_or_else(|| parent_t.default_alias());
        let on = infer_on(&child_t, &parent_t, &child_alias_s, &parent_alias_s, database, exec)?;
        self.statements.push(Statement::Join(Join::new(
            child_t,
            parent_t,
            Some(&child_alias_s),
            Some(&parent_alias_s),
            on,
            kind,
        )));
        Ok(self)
    }

    /// Append a WHERE built from raw predicate strings (AND-joined; may
    /// contain `?` placeholders bound by args supplied at execute time).
    pub fn where_clauses(mut self, clauses: &[&str]) -> Self {
        self.statements.push(Statement::Where(WhereClause::new(
            clauses.iter().map(|s| s.to_string()).collect(),
        )));
        self
    }

    /// Append a WHERE built from a column→value filter mapping.
    pub fn where_filters(mut self, filters: &[(String, Value)]) -> Self {
        self.statements
            .push(Statement::Where(WhereClause::from_filters(filters)));
        self
    }

    /// Append `ORDER BY <columns> [DESC]`.
    pub fn order_by(mut self, columns: &[&str], desc: bool) -> Self {
        self.statements.push(Statement::OrderBy(OrderBy::new(
            columns.iter().map(|s| s.to_string()).collect(),
            desc,
        )));
        self
    }

    /// Append `GROUP BY <columns>`.
    pub fn group_by(mut self, columns: &[&str]) -> Self {
        self.statements.push(Statement::GroupBy(GroupBy::new(
            columns.iter().map(|s| s.to_string()).collect(),
        )));
        self
    }

    /// Append `OFFSET <rows> ROWS`.
    pub fn offset(mut self, rows: i64) -> Self {
        self.statements.push(Statement::Offset(Offset { rows }));
        self
    }

    /// Append `FETCH NEXT <rows> ROWS ONLY`.
    pub fn fetch(mut self, rows: i64) -> Self {
        self.statements.push(Statement::Fetch(Fetch { rows }));
        self
    }

    /// Append an INSERT with an optional OUTPUT column.
    pub fn insert(mut self, table: &str, values: Vec<(String, Value)>, output: Option<&str>) -> Self {
        self.statements
            .push(Statement::Insert(Insert::new(table, values, output)));
        self
    }

    /// Append `UPDATE <table>`. Must be followed by a SET; omitting a WHERE
    /// mutates every row — that guard is the caller's responsibility.
    pub fn update(mut self, table: &str) -> Self {
        self.statements.push(Statement::Update(Update::new(table)));
        self
    }

    /// Append a SET clause.
    pub fn set(mut self, values: Vec<(String, Value)>) -> Self {
        self.statements.push(Statement::Set(SetClause::new(values)));
        self
    }

    /// Append `DELETE FROM <table>`. Same WHERE caveat as [`Query::update`].
    pub fn delete(mut self, table: &str) -> Self {
        self.statements.push(Statement::Delete(Delete::new(table)));
        self
    }

    // ==================== Pagination ====================

    /// Deterministic pagination with an explicit order: ORDER BY + OFFSET +
    /// FETCH. `current_page` is 1-based; page and size clamp to >= 1.
    pub fn paginate(self, order_columns: &[&str], rows_per_page: i64, current_page: i64) -> Self {
        let page = current_page.max(1);
        let size = rows_per_page.max(1);
        self.order_by(order_columns, false)
            .offset((page - 1) * size)
            .fetch(size)
    }

    /// Pagination ordered by the base table's surrogate-identifier column
    /// ascending, resolved through the schema metadata layer, so paging is
    /// deterministic even when the caller names no order column.
    pub fn paginate_by_id(
        self,
        rows_per_page: i64,
        current_page: i64,
        database: &str,
        exec: &impl Executor,
    ) -> DbResult<Self> {
        let from = self
            .from_table()
            .cloned()
            .ok_or_else(|| Error::handled("Pagination requires a FROM table."))?;
        let table = Table::from_parts(from, Database::new(database));
        let order = table.auto_id_column(exec)?;
        Ok(self.paginate(&[order.as_str()], rows_per_page, current_page))
    }

    // ==================== Validation & rendering ====================

    /// Validate the whole query: a valid base statement, then every member
    /// statement in order, first failure wins.
    pub fn validate(&self) -> DbResult<()> {
        let Some(base) = self.statements.first() else {
            return Err(Error::handled("Query has no statements."));
        };
        if !base.is_base() {
            return Err(Error::handled(
                "Query must begin with SELECT, INSERT, UPDATE, or DELETE.",
            ));
        }
        for statement in &self.statements {
            statement.validate()?;
        }
        Ok(())
    }

    /// Render the statement text and the positional arguments contributed by
    /// value-carrying clauses, in append order. Rendering is idempotent: the
    /// same fully constructed query renders byte-identically every time.
    pub fn render(&self) -> DbResult<(String, Vec<Value>)> {
        self.validate()?;
        let mut fragments = Vec::with_capacity(self.statements.len());
        let mut args = Vec::new();
        for statement in &self.statements {
            fragments.push(statement.render()?);
            args.extend(statement.args());
        }
        let text = fragments.join(" ");
        debug!(statement = %text, args = args.len(), "rendered query");
        Ok((text, args))
    }

    /// What the composed statement returns when executed: mutations expect a
    /// rows-affected count, except an INSERT carrying an OUTPUT clause, which
    /// returns the generated-identifier row instead.
    pub fn expect(&self) -> Expect {
        match self.statements.first() {
            Some(Statement::Insert(ins)) if ins.output.is_some() => Expect::ResultSet,
            Some(s) if s.is_mutation() => Expect::RowsAffected,
            _ => Expect::ResultSet,
        }
    }

    /// Replace each `?` left to right with the quoted argument literal.
    /// Diagnostic use only — execution always receives the placeholder form
    /// with a separate argument list.
    pub fn substitute_args(statement: &str, args: &[Value]) -> String {
        let mut out = String::with_capacity(statement.len());
        let mut remaining = args.iter();
        for ch in statement.chars() {
            if ch == '?' {
                if let Some(arg) = remaining.next() {
                    out.push('\'');
                    out.push_str(&arg.literal());
                    out.push('\'');
                    continue;
                }
            }
            out.push(ch);
        }
        out
    }

    /// Render and dispatch through the execution boundary.
    ///
    /// The final argument list is the rendered args (INSERT/SET values)
    /// followed by `extra_args` for any raw `?` predicates, matching the
    /// placeholders left to right. Any execution-time failure is caught here
    /// and converted to [`Error::Unhandled`] carrying the substituted text.
    pub fn execute(
        &self,
        extra_args: &[Value],
        database: &str,
        exec: &impl Executor,
    ) -> DbResult<ExecOutcome> {
        let (text, mut args) = self.render()?;
        args.extend_from_slice(extra_args);
        match exec.run(&text, &args, database, self.expect()) {
            Ok(outcome) => Ok(outcome),
            Err(message) => {
                let substituted = Self::substitute_args(&text, &args);
                warn!(statement = %substituted, database, %message, "execution failed");
                Err(Error::unhandled(
                    format!("Query against {database} could not compile: {message}"),
                    substituted,
                ))
            }
        }
    }
}
