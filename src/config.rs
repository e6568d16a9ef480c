use std::path::{Path, PathBuf};

use clap::ValueEnum;

use crate::accounting::ConversionError;

pub const DEFAULT_TEMPLATE: &str = "template.beancount";
pub const DEFAULT_OUTPUT: &str = "output.beancount";
pub const DEFAULT_VIEWER: &str = "fava";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InputFormat {
    /// GnuCash "Export Transactions to CSV"
    Csv,
    /// Uncompressed GnuCash XML book
    Xml,
}

impl InputFormat {
    pub fn from_path(path: &Path) -> Result<InputFormat, ConversionError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("csv") => Ok(InputFormat::Csv),
            Some("gnca") | Some("gnucash") | Some("xml") => Ok(InputFormat::Xml),
            _ => Err(ConversionError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Knobs of the transformation itself, independent of where files live.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeOptions {
    /// `chrono` format of the `Date` column in CSV exports.
    pub date_format: String,
    /// Decimal separator of CSV amounts, `.` or `,` depending on the GnuCash locale.
    pub decimal_separator: char,
    /// Joins account names when flattening the XML account tree.
    pub account_separator: String,
}

impl TranscodeOptions {
    pub fn check(&self) -> Result<(), ConversionError> {
        match self.decimal_separator {
            '.' | ',' => Ok(()),
            other => Err(ConversionError::UnsupportedDecimalSeparator(other)),
        }
    }
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        TranscodeOptions {
            date_format: "%Y-%m-%d".to_string(),
            decimal_separator: '.',
            account_separator: "-".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub input: PathBuf,
    pub template: PathBuf,
    pub output: PathBuf,
    /// Overrides the format inferred from the input extension.
    pub format: Option<InputFormat>,
    pub options: TranscodeOptions,
    pub serve: bool,
    pub viewer: String,
}

impl Config {
    pub fn new(input: impl Into<PathBuf>) -> Config {
        Config {
            input: input.into(),
            template: PathBuf::from(DEFAULT_TEMPLATE),
            output: PathBuf::from(DEFAULT_OUTPUT),
            format: None,
            options: TranscodeOptions::default(),
            serve: false,
            viewer: DEFAULT_VIEWER.to_string(),
        }
    }

    pub fn input_format(&self) -> Result<InputFormat, ConversionError> {
        match self.format {
            Some(format) => Ok(format),
            None => InputFormat::from_path(&self.input),
        }
    }
}
