use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read};

use chrono::NaiveDate;
use log::debug;
use quick_xml::events::Event;
use quick_xml::Reader;
use rust_decimal::Decimal;

use crate::accounting::accounts::{AccountNode, AccountTree};
use crate::accounting::transaction::Transaction;
use crate::accounting::{ConversionError, TransactionSource};
use crate::config::TranscodeOptions;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const BOOK_ROOT: &[u8] = b"gnc-v2";
const TEMPLATES: &[u8] = b"gnc:template-transactions";
const POSTED_DATE_FORMAT: &str = "%Y-%m-%d";
// Highest scale a `Decimal` can carry.
const MAX_SCALE: u32 = 28;

#[derive(Debug, Default)]
struct RawAccount {
    id: String,
    name: String,
    parent: Option<String>,
}

impl RawAccount {
    fn finish(self) -> Result<AccountNode, ConversionError> {
        if self.id.is_empty() {
            return Err(ConversionError::MalformedXml(format!("account `{}` has no id", self.name)));
        }
        Ok(AccountNode::new(&self.id, &self.name, self.parent.as_deref()))
    }
}

#[derive(Debug, Default)]
struct RawSplit {
    value: String,
    account: String,
}

#[derive(Debug, Default)]
struct RawTransaction {
    id: String,
    currency: String,
    posted: String,
    description: String,
    splits: Vec<RawSplit>,
}

fn ends_with(path: &[Vec<u8>], suffix: &[&[u8]]) -> bool {
    path.len() >= suffix.len()
        && path[path.len() - suffix.len()..]
            .iter()
            .zip(suffix)
            .all(|(element, expected)| element.as_slice() == *expected)
}

fn capture(
    path: &[Vec<u8>],
    text: &str,
    account: Option<&mut RawAccount>,
    transaction: Option<&mut RawTransaction>,
) {
    if let Some(account) = account {
        let field = if ends_with(path, &[b"gnc:account", b"act:name"]) {
            &mut account.name
        } else if ends_with(path, &[b"gnc:account", b"act:id"]) {
            &mut account.id
        } else if ends_with(path, &[b"gnc:account", b"act:parent"]) {
            account.parent.get_or_insert_with(String::new)
        } else {
            return;
        };
        field.push_str(text);
    } else if let Some(transaction) = transaction {
        let field = if ends_with(path, &[b"gnc:transaction", b"trn:id"]) {
            &mut transaction.id
        } else if ends_with(path, &[b"gnc:transaction", b"trn:currency", b"cmdty:id"]) {
            &mut transaction.currency
        } else if ends_with(path, &[b"gnc:transaction", b"trn:date-posted", b"ts:date"]) {
            &mut transaction.posted
        } else if ends_with(path, &[b"gnc:transaction", b"trn:description"]) {
            &mut transaction.description
        } else if ends_with(path, &[b"trn:split", b"split:value"]) {
            match transaction.splits.last_mut() {
                Some(split) => &mut split.value,
                None => return,
            }
        } else if ends_with(path, &[b"trn:split", b"split:account"]) {
            match transaction.splits.last_mut() {
                Some(split) => &mut split.account,
                None => return,
            }
        } else {
            return;
        };
        field.push_str(text);
    }
}

/// First pass over the book: collects account nodes and raw transactions in
/// document order, ignoring scheduled-transaction templates.
fn read_book<R: BufRead>(
    input: R,
) -> Result<(Vec<AccountNode>, Vec<RawTransaction>), ConversionError> {
    let mut reader = Reader::from_reader(input);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut account: Option<RawAccount> = None;
    let mut transaction: Option<RawTransaction> = None;
    let mut accounts = Vec::new();
    let mut transactions = Vec::new();

    loop {
        let in_templates = path.iter().any(|element| element.as_slice() == TEMPLATES);
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = e.name().as_ref().to_vec();
                if path.is_empty() && name != BOOK_ROOT {
                    return Err(ConversionError::MalformedXml(format!(
                        "expected <{}> document, found <{}>",
                        String::from_utf8_lossy(BOOK_ROOT),
                        String::from_utf8_lossy(&name)
                    )));
                }
                if !in_templates {
                    match name.as_slice() {
                        b"gnc:account" => account = Some(RawAccount::default()),
                        b"gnc:transaction" => transaction = Some(RawTransaction::default()),
                        b"trn:split" => {
                            if let Some(transaction) = transaction.as_mut() {
                                transaction.splits.push(RawSplit::default());
                            }
                        },
                        _ => {},
                    }
                }
                path.push(name);
            },
            Ok(Event::End(e)) => {
                path.pop();
                if !in_templates {
                    match e.name().as_ref() {
                        b"gnc:account" => {
                            if let Some(done) = account.take() {
                                accounts.push(done.finish()?);
                            }
                        },
                        b"gnc:transaction" => {
                            if let Some(done) = transaction.take() {
                                transactions.push(done);
                            }
                        },
                        _ => {},
                    }
                }
            },
            Ok(Event::Text(e)) => {
                if !in_templates {
                    let text = e
                        .unescape()
                        .map_err(|err| ConversionError::MalformedXml(err.to_string()))?;
                    capture(&path, &text, account.as_mut(), transaction.as_mut());
                }
            },
            Ok(Event::Eof) => break,
            Err(err) => {
                return Err(ConversionError::MalformedXml(format!(
                    "at byte {}: {}",
                    reader.buffer_position(),
                    err
                )))
            },
            _ => {},
        }
        buf.clear();
    }

    if !path.is_empty() {
        return Err(ConversionError::MalformedXml("unexpected end of document".to_string()));
    }

    Ok((accounts, transactions))
}

fn power_of_ten(mut denominator: i64) -> Option<u32> {
    let mut scale = 0;
    while denominator % 10 == 0 {
        denominator /= 10;
        scale += 1;
    }
    (denominator == 1 && scale <= MAX_SCALE).then_some(scale)
}

/// GnuCash stores amounts as rationals, e.g. `-1234/100`.
pub fn parse_fraction(value: &str, transaction: &str) -> Result<Decimal, ConversionError> {
    let invalid = || ConversionError::InvalidAmount {
        value: value.to_string(),
        location: format!("transaction {}", transaction),
    };

    let (numerator, denominator) = value.split_once('/').unwrap_or((value, "1"));
    let numerator: i64 = numerator.trim().parse().map_err(|_| invalid())?;
    let denominator: i64 = denominator.trim().parse().map_err(|_| invalid())?;
    if denominator <= 0 {
        return Err(invalid());
    }

    match power_of_ten(denominator) {
        Some(scale) => Ok(Decimal::new(numerator, scale)),
        None => Decimal::from(numerator)
            .checked_div(Decimal::from(denominator))
            .map(|amount| amount.normalize())
            .ok_or_else(invalid),
    }
}

/// `ts:date` carries a time and zone, e.g. `2020-01-05 10:59:00 +0100`; only the day is kept.
fn parse_posted(value: &str, transaction: &str) -> Result<NaiveDate, ConversionError> {
    let day = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(day, POSTED_DATE_FORMAT).map_err(|_| ConversionError::InvalidDate {
        value: value.to_string(),
        format: POSTED_DATE_FORMAT.to_string(),
        location: format!("transaction {}", transaction),
    })
}

/// Transactions of an uncompressed GnuCash XML book.
///
/// The whole book is parsed when the source is opened: every account and
/// every raw transaction is held in memory before the first transaction is
/// produced, since splits refer to accounts that may be defined anywhere.
pub struct XmlBook {
    accounts: AccountTree,
    pending: VecDeque<RawTransaction>,
}

impl XmlBook {
    pub fn new(
        input: Box<dyn Read>,
        options: &TranscodeOptions,
    ) -> Result<XmlBook, ConversionError> {
        let mut input = BufReader::new(input);
        if input.fill_buf()?.starts_with(&GZIP_MAGIC) {
            return Err(ConversionError::CompressedBook);
        }

        let (accounts, transactions) = read_book(input)?;
        let accounts = AccountTree::build(accounts, &options.account_separator)?;
        debug!(
            "xml book has {} accounts and {} transactions",
            accounts.len(),
            transactions.len()
        );

        Ok(XmlBook {
            accounts,
            pending: transactions.into(),
        })
    }

    pub fn accounts(&self) -> &AccountTree {
        &self.accounts
    }
}

impl TransactionSource for XmlBook {
    fn next_transaction(&mut self) -> Result<Option<Transaction>, ConversionError> {
        let Some(raw) = self.pending.pop_front() else {
            return Ok(None);
        };

        if raw.splits.is_empty() {
            return Err(ConversionError::EmptyTransaction(raw.id));
        }
        if raw.currency.is_empty() {
            let message = format!("transaction {} has no currency", raw.id);
            return Err(ConversionError::MalformedXml(message));
        }

        let date = parse_posted(&raw.posted, &raw.id)?;
        let mut transaction = Transaction::new(date, &raw.description, &raw.currency);
        for split in &raw.splits {
            let account = self
                .accounts
                .qualified_name(&split.account)
                .ok_or_else(|| ConversionError::UnknownAccount {
                    account: split.account.clone(),
                    transaction: raw.id.clone(),
                })?;
            transaction.add_posting(account, parse_fraction(&split.value, &raw.id)?);
        }

        Ok(Some(transaction))
    }
}
