//! Scripted execution boundary for unit tests.

use std::cell::RefCell;
use std::collections::VecDeque;

use crate::exec::{DataSet, ExecOutcome, Executor, Expect};
use crate::value::Value;

/// One call recorded at the execution boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub statement: String,
    pub args: Vec<Value>,
    pub database: String,
    pub expect: Expect,
}

/// An [`Executor`] that records every call and replays scripted replies in
/// FIFO order. Running past the script fails the call, which surfaces as an
/// unhandled error in whatever operation made the round trip.
#[derive(Default)]
pub struct MockExecutor {
    replies: RefCell<VecDeque<Result<ExecOutcome, String>>>,
    calls: RefCell<Vec<RecordedCall>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a tabular reply.
    pub fn reply_rows(&self, data: DataSet) {
        self.replies
            .borrow_mut()
            .push_back(Ok(ExecOutcome::Rows(data)));
    }

    /// Script a rows-affected reply.
    pub fn reply_affected(&self, affected: u64) {
        self.replies
            .borrow_mut()
            .push_back(Ok(ExecOutcome::Affected(affected)));
    }

    /// Script an engine failure.
    pub fn reply_error(&self, message: &str) {
        self.replies
            .borrow_mut()
            .push_back(Err(message.to_string()));
    }

    /// Everything dispatched so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl Executor for MockExecutor {
    fn run(
        &self,
        statement: &str,
        args: &[Value],
        database: &str,
        expect: Expect,
    ) -> Result<ExecOutcome, String> {
        self.calls.borrow_mut().push(RecordedCall {
            statement: statement.to_string(),
            args: args.to_vec(),
            database: database.to_string(),
            expect,
        });
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err("no scripted reply remains".to_string()))
    }
}

/// Shorthand for building a [`DataSet`] from string headers and value rows.
pub fn ds(columns: &[&str], rows: Vec<Vec<Value>>) -> DataSet {
    DataSet::new(columns.iter().map(|c| c.to_string()).collect(), rows)
}
