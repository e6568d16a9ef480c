use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use enum_dispatch::enum_dispatch;
use log::{debug, info};
use tempfile::NamedTempFile;

use crate::accounting::transaction::Transaction;
use crate::accounting::{ConversionError, TransactionSource};
use crate::config::{Config, InputFormat, TranscodeOptions};

pub mod csv_file;
pub mod xml_book;

use csv_file::CsvFile;
use xml_book::XmlBook;

#[enum_dispatch(TransactionSource)]
pub enum Source {
    CsvFile,
    XmlBook,
}

impl Source {
    pub fn open(
        format: InputFormat,
        input: Box<dyn Read>,
        options: &TranscodeOptions,
    ) -> Result<Source, ConversionError> {
        match format {
            InputFormat::Csv => Ok(Source::CsvFile(CsvFile::new(input, options)?)),
            InputFormat::Xml => Ok(Source::XmlBook(XmlBook::new(input, options)?)),
        }
    }
}

/// Pulls transactions out of a [`Source`] until it is exhausted or fails once.
pub struct Entries {
    source: Source,
    done: bool,
}

impl Entries {
    pub fn new(source: Source) -> Entries {
        Entries { source, done: false }
    }
}

impl Iterator for Entries {
    type Item = Result<Transaction, ConversionError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.source.next_transaction() {
            Ok(Some(transaction)) => Some(Ok(transaction)),
            Ok(None) => {
                self.done = true;
                None
            },
            Err(err) => {
                self.done = true;
                Some(Err(err))
            },
        }
    }
}

/// The ledger text for `entries`, one item per line, without terminators.
pub fn ledger_lines<I>(entries: I) -> impl Iterator<Item = Result<String, ConversionError>>
where
    I: IntoIterator<Item = Result<Transaction, ConversionError>>,
{
    entries.into_iter().flat_map(|entry| match entry {
        Ok(transaction) => transaction.lines().into_iter().map(Ok).collect::<Vec<_>>(),
        Err(err) => vec![Err(err)],
    })
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub transactions: usize,
    pub postings: usize,
}

/// Copies `template` verbatim to `output`, then appends the ledger entries.
pub fn write_ledger<T: Read, W: Write>(
    template: &mut T,
    entries: Entries,
    output: &mut W,
) -> Result<Summary, ConversionError> {
    io::copy(template, output)?;

    let mut summary = Summary::default();
    let counted = entries.inspect(|entry| {
        if let Ok(transaction) = entry {
            debug!("writing {}", transaction.header());
            summary.transactions += 1;
            summary.postings += transaction.postings().len();
        }
    });
    for line in ledger_lines(counted) {
        writeln!(output, "{}", line?)?;
    }

    Ok(summary)
}

fn open(path: &Path) -> Result<File, ConversionError> {
    File::open(path).map_err(|source| ConversionError::Open {
        path: path.display().to_string(),
        source,
    })
}

/// A temporary file next to `output`, so the final rename stays on one filesystem.
fn staging_file(output: &Path) -> Result<NamedTempFile, ConversionError> {
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    NamedTempFile::new_in(dir).map_err(|source| ConversionError::Open {
        path: output.display().to_string(),
        source,
    })
}

/// Converts `config.input` into `config.output`.
///
/// The ledger is written to a staging file that replaces `config.output` only
/// once every entry was written, so a failed run leaves the previous output
/// untouched. All files are closed when this returns, on success or error.
pub fn convert(config: &Config) -> Result<Summary, ConversionError> {
    let format = config.input_format()?;
    info!("converting {} as {:?}", config.input.display(), format);

    let input = open(&config.input)?;
    let mut template = open(&config.template)?;
    let source = Source::open(format, Box::new(BufReader::new(input)), &config.options)?;

    let mut output = BufWriter::new(staging_file(&config.output)?);
    let summary = write_ledger(&mut template, Entries::new(source), &mut output)?;
    let staged = output.into_inner().map_err(|err| err.into_error())?;
    staged.as_file().sync_all()?;
    staged.persist(&config.output).map_err(|err| ConversionError::Persist {
        path: config.output.display().to_string(),
        source: err.error,
    })?;

    info!(
        "wrote {} transactions with {} postings to {}",
        summary.transactions,
        summary.postings,
        config.output.display()
    );

    Ok(summary)
}
