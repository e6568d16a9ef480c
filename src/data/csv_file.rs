use std::io::Read;

use chrono::NaiveDate;
use csv::{DeserializeRecordsIntoIter, StringRecord};
use log::debug;
use serde::Deserialize;

use crate::accounting::transaction::{parse_amount, Transaction};
use crate::accounting::{ConversionError, TransactionSource};
use crate::config::TranscodeOptions;

const DATE: &str = "Date";
const TRANSACTION_ID: &str = "Transaction ID";
const DESCRIPTION: &str = "Description";
const COMMODITY: &str = "Commodity/Currency";
const ACCOUNT: &str = "Full Account Name";
const AMOUNT: &str = "Amount Num";
// GnuCash desktop spells the amount header with a trailing dot.
const AMOUNT_DESKTOP: &str = "Amount Num.";

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Transaction ID", default)]
    transaction_id: Option<String>,
    #[serde(rename = "Description")]
    description: String,
    #[serde(rename = "Commodity/Currency")]
    commodity: String,
    #[serde(rename = "Full Account Name")]
    account: String,
    #[serde(rename = "Amount Num")]
    amount: String,
}

/// How the rows of one transaction are told apart from the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// A non-empty `Transaction ID` different from the current one.
    TransactionId,
    /// Exports without ids: a non-empty `Date` starts a transaction.
    Date,
}

/// Checks the header row and normalizes the amount column name so rows can be
/// deserialized into [`CsvRow`].
fn map_headers(headers: &StringRecord) -> Result<(StringRecord, Boundary), ConversionError> {
    for column in [DATE, DESCRIPTION, COMMODITY, ACCOUNT] {
        if !headers.iter().any(|header| header == column) {
            return Err(ConversionError::MissingColumn { column });
        }
    }

    let has_amount = headers.iter().any(|header| header == AMOUNT);
    let has_desktop_amount = headers.iter().any(|header| header == AMOUNT_DESKTOP);
    let headers = match (has_amount, has_desktop_amount) {
        (true, _) => headers.clone(),
        (false, true) => headers
            .iter()
            .map(|header| if header == AMOUNT_DESKTOP { AMOUNT } else { header })
            .collect(),
        (false, false) => return Err(ConversionError::MissingColumn { column: AMOUNT }),
    };

    let boundary = if headers.iter().any(|header| header == TRANSACTION_ID) {
        Boundary::TransactionId
    } else {
        Boundary::Date
    };

    Ok((headers, boundary))
}

/// Transactions of a GnuCash CSV export. Every row is one posting; rows are
/// grouped into transactions according to [`Boundary`].
pub struct CsvFile {
    rows: DeserializeRecordsIntoIter<Box<dyn Read>, CsvRow>,
    boundary: Boundary,
    date_format: String,
    decimal_separator: char,
    line: u64,
    current_id: Option<String>,
    pending: Option<Transaction>,
}

impl CsvFile {
    pub fn new(
        input: Box<dyn Read>,
        options: &TranscodeOptions,
    ) -> Result<CsvFile, ConversionError> {
        options.check()?;
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(input);
        let (headers, boundary) = map_headers(reader.headers()?)?;
        reader.set_headers(headers);
        debug!("csv export uses {:?} transaction boundaries", boundary);

        Ok(CsvFile {
            rows: reader.into_deserialize(),
            boundary,
            date_format: options.date_format.clone(),
            decimal_separator: options.decimal_separator,
            line: 1,
            current_id: None,
            pending: None,
        })
    }

    pub fn boundary(&self) -> Boundary {
        self.boundary
    }

    fn starts_transaction(&self, row: &CsvRow) -> bool {
        match self.boundary {
            Boundary::TransactionId => row
                .transaction_id
                .as_deref()
                .is_some_and(|id| !id.is_empty() && Some(id) != self.current_id.as_deref()),
            Boundary::Date => !row.date.is_empty(),
        }
    }

    fn open_transaction(&mut self, row: &CsvRow) -> Result<Transaction, ConversionError> {
        let date = NaiveDate::parse_from_str(&row.date, &self.date_format).map_err(|_| {
            ConversionError::InvalidDate {
                value: row.date.clone(),
                format: self.date_format.clone(),
                location: format!("row {}", self.line),
            }
        })?;

        if let Some(id) = &row.transaction_id {
            self.current_id = Some(id.clone());
        }

        Ok(Transaction::new(date, &row.description, &row.commodity))
    }
}

impl TransactionSource for CsvFile {
    fn next_transaction(&mut self) -> Result<Option<Transaction>, ConversionError> {
        loop {
            // Physical line where the next record starts; quoted fields may span lines.
            self.line = self.rows.reader().position().line();
            let row = match self.rows.next() {
                Some(row) => row?,
                None => break,
            };
            let location = format!("row {}", self.line);
            let amount = parse_amount(&row.amount, self.decimal_separator, &location)?;

            if self.starts_transaction(&row) {
                let mut transaction = self.open_transaction(&row)?;
                transaction.add_posting(&row.account, amount);
                if let Some(complete) = self.pending.replace(transaction) {
                    return Ok(Some(complete));
                }
            } else {
                match self.pending.as_mut() {
                    Some(transaction) => transaction.add_posting(&row.account, amount),
                    None => return Err(ConversionError::OrphanPosting { row: self.line }),
                }
            }
        }

        Ok(self.pending.take())
    }
}
