use enum_dispatch::enum_dispatch;
use thiserror::Error;

pub mod accounts;
pub mod transaction;


use transaction::Transaction;

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("input is missing required column `{column}`")]
    MissingColumn { column: &'static str },
    #[error("unsupported input format for {0}")]
    UnsupportedFormat(String),
    #[error("{location}: date `{value}` does not match format `{format}`")]
    InvalidDate { value: String, format: String, location: String },
    #[error("decimal separator must be `.` or `,`, not `{0}`")]
    UnsupportedDecimalSeparator(char),
    #[error("row {row}: posting has no enclosing transaction")]
    OrphanPosting { row: u64 },
    #[error("invalid amount `{value}` in {location}")]
    InvalidAmount { value: String, location: String },
    #[error("transaction {transaction}: unknown account `{account}`")]
    UnknownAccount { account: String, transaction: String },
    #[error("account `{account}` references unknown parent `{parent}`")]
    UnknownParent { account: String, parent: String },
    #[error("account `{0}` is defined more than once")]
    DuplicateAccount(String),
    #[error("account `{0}` is its own ancestor")]
    AccountCycle(String),
    #[error("transaction {0} has no postings")]
    EmptyTransaction(String),
    #[error("malformed GnuCash XML: {0}")]
    MalformedXml(String),
    #[error("compressed GnuCash books are not supported, save the book as uncompressed XML")]
    CompressedBook,
    #[error("cannot open {path}: {source}")]
    Open { path: String, source: std::io::Error },
    #[error("cannot replace {path}: {source}")]
    Persist { path: String, source: std::io::Error },
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Csv(#[from] csv::Error),
}

/// A pull-based source of transactions read from one export file.
#[enum_dispatch]
pub trait TransactionSource {
    /// Returns the next complete transaction, or `None` once the input is exhausted.
    fn next_transaction(&mut self) -> Result<Option<Transaction>, ConversionError>;
}
