use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::warn;

use gnucash_beancount::config::{self, Config, InputFormat, TranscodeOptions};
use gnucash_beancount::data;
use gnucash_beancount::viewer::ViewerCapability;

#[derive(Parser, Debug)]
#[command(
    name = "gnucash-beancount",
    version,
    about = "Convert GnuCash exports into a Beancount ledger"
)]
struct Cli {
    /// GnuCash CSV export or uncompressed XML book
    input: PathBuf,

    /// File copied verbatim at the top of the output
    #[arg(
        short,
        long,
        env = "GNUCASH_BEANCOUNT_TEMPLATE",
        default_value = config::DEFAULT_TEMPLATE
    )]
    template: PathBuf,

    #[arg(short, long, env = "GNUCASH_BEANCOUNT_OUTPUT", default_value = config::DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Input format, inferred from the extension when omitted
    #[arg(short, long, value_enum)]
    format: Option<InputFormat>,

    /// Format of the CSV `Date` column
    #[arg(long, default_value = "%Y-%m-%d")]
    date_format: String,

    /// Decimal separator of CSV amounts, `.` or `,`
    #[arg(long, default_value_t = '.')]
    decimal_separator: char,

    /// Joins account names of an XML book
    #[arg(long, default_value = "-")]
    account_separator: String,

    /// Open the result in the viewer once written
    #[arg(long)]
    serve: bool,

    #[arg(long, default_value = config::DEFAULT_VIEWER)]
    viewer: String,
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        Config {
            input: cli.input,
            template: cli.template,
            output: cli.output,
            format: cli.format,
            options: TranscodeOptions {
                date_format: cli.date_format,
                decimal_separator: cli.decimal_separator,
                account_separator: cli.account_separator,
            },
            serve: cli.serve,
            viewer: cli.viewer,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config: Config = Cli::parse().into();
    let viewer = ViewerCapability::detect(&config.viewer);
    if config.serve && !viewer.is_available() {
        warn!("{} is not installed, the ledger will only be written", config.viewer);
    }

    data::convert(&config)
        .with_context(|| format!("failed to convert {}", config.input.display()))?;

    if config.serve && viewer.is_available() {
        if let Err(err) = viewer.serve(&config.output) {
            warn!("viewer failed, err={}", err);
        }
    }

    Ok(())
}
