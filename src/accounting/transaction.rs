use std::fmt;

use chrono::NaiveDate;
use getset::{CopyGetters, Getters};
use rust_decimal::Decimal;

use super::ConversionError;

const ACCOUNT_JOINER: char = '-';
const COMMODITY_SEPARATOR: char = ':';
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Strips GnuCash decorations from an account path so it is usable as a ledger account.
pub fn format_account(name: &str) -> String {
    name.chars()
        .filter(|c| *c != ',')
        .map(|c| if c == ' ' { ACCOUNT_JOINER } else { c })
        .collect()
}

/// Removes grouping from an integer part such as `1,234,567`. Every group after
/// the first must be exactly three digits.
fn ungroup(integer: &str, grouping: char) -> Option<String> {
    let mut groups = integer.split(grouping);
    let mut digits = groups.next()?.to_string();
    for group in groups {
        let leading = digits.trim_start_matches('-');
        if leading.is_empty() || group.len() != 3 || !group.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.push_str(group);
    }
    Some(digits)
}

/// Parses a GnuCash amount written with `decimal_separator` (`.` or `,`).
///
/// GnuCash desktop writes negative numbers in parentheses, e.g. `(1,234.50)`.
/// Thousands grouping with `,` is only recognized when the decimal separator
/// is `.`; any other mix of separators is rejected.
pub fn parse_amount(
    raw: &str,
    decimal_separator: char,
    location: &str,
) -> Result<Decimal, ConversionError> {
    let invalid = || ConversionError::InvalidAmount {
        value: raw.to_string(),
        location: location.to_string(),
    };

    let trimmed = raw.trim();
    let (negative, body) = match trimmed.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (true, inner.trim()),
        None => (false, trimmed),
    };

    let (integer, fraction) = match body.split_once(decimal_separator) {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (body, None),
    };
    if fraction.is_some_and(|fraction| fraction.contains(['.', ','])) {
        return Err(invalid());
    }

    let integer = match decimal_separator {
        '.' => ungroup(integer, ',').ok_or_else(invalid)?,
        ',' if !integer.contains('.') => integer.to_string(),
        _ => return Err(invalid()),
    };

    let mut normalized = String::with_capacity(body.len() + 1);
    if negative {
        normalized.push('-');
    }
    normalized.push_str(&integer);
    if let Some(fraction) = fraction {
        normalized.push('.');
        normalized.push_str(fraction);
    }

    normalized.parse::<Decimal>().map_err(|_| invalid())
}

pub fn currency_from_commodity(commodity: &str) -> &str {
    commodity.rsplit(COMMODITY_SEPARATOR).next().unwrap_or(commodity)
}

fn escape_description(description: &str) -> String {
    description.replace('\\', "\\\\").replace('"', "\\\"")
}

#[derive(Debug, Clone, PartialEq, Getters, CopyGetters)]
pub struct Posting {
    #[getset(get = "pub")]
    account: String,
    #[getset(get_copy = "pub")]
    amount: Decimal,
    #[getset(get = "pub")]
    currency: String,
}

impl fmt::Display for Posting {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "  {}        {} {}", self.account, self.amount, self.currency)
    }
}

#[derive(Debug, Clone, PartialEq, Getters, CopyGetters)]
pub struct Transaction {
    #[getset(get_copy = "pub")]
    date: NaiveDate,
    #[getset(get = "pub")]
    description: String,
    #[getset(get = "pub")]
    currency: String,
    #[getset(get = "pub")]
    postings: Vec<Posting>,
}

impl Transaction {
    /// `commodity` may be namespaced (`CURRENCY:USD`); only the code is kept.
    pub fn new(date: NaiveDate, description: &str, commodity: &str) -> Transaction {
        Transaction {
            date,
            description: description.to_string(),
            currency: currency_from_commodity(commodity).to_string(),
            postings: Vec::new(),
        }
    }

    /// Adds a posting in the transaction's currency. `account` is formatted on the way in.
    pub fn add_posting(&mut self, account: &str, amount: Decimal) {
        self.postings.push(Posting {
            account: format_account(account),
            amount,
            currency: self.currency.clone(),
        });
    }

    pub fn header(&self) -> String {
        format!(
            "{} * \"{}\"",
            self.date.format(DATE_FORMAT),
            escape_description(&self.description)
        )
    }

    /// The header line followed by one line per posting, without line terminators.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.postings.len() + 1);
        lines.push(self.header());
        lines.extend(self.postings.iter().map(|posting| posting.to_string()));
        lines
    }
}
