use std::fs;
use std::path::Path;

use anyhow::Result;
use pretty_assertions::assert_eq;

use gnucash_beancount::accounting::ConversionError;
use gnucash_beancount::config::{Config, InputFormat};
use gnucash_beancount::data::{self, Entries, Source, Summary};

const TEMPLATE: &str = "option \"title\" \"Household\"\noption \"operating_currency\" \"USD\"\n\n";

const EXPORT: &str = "\
Date,Transaction ID,Number,Description,Notes,Commodity/Currency,Void Reason,Action,Memo,Full Account Name,Account Name,Amount With Sym,Amount Num.,Reconcile,Reconcile Date,Rate/Price
2024-01-05,a1,,Groceries,,CURRENCY:USD,,,,\"Expenses:Food, Groceries\",Groceries,$42.10,42.10,n,,1.00
2024-01-05,a1,,Groceries,,CURRENCY:USD,,,,Assets:Current Assets:Checking Account,Checking Account,($42.10),(42.10),n,,1.00
2024-01-31,b2,,Paycheck,,CURRENCY:USD,,,,Assets:Current Assets:Checking Account,Checking Account,\"$2,500.00\",\"2,500.00\",c,,1.00
2024-01-31,b2,,Paycheck,,CURRENCY:USD,,,,Income:Salary,Salary,\"($2,000.00)\",\"(2,000.00)\",n,,1.00
2024-01-31,b2,,Paycheck,,CURRENCY:USD,,,,Expenses:Taxes,Taxes,$500.00,500.00,n,,1.00
";

const BOOK: &str = r#"<?xml version="1.0" encoding="utf-8" ?>
<gnc-v2 xmlns:gnc="http://www.gnucash.org/XML/gnc" xmlns:act="http://www.gnucash.org/XML/act" xmlns:trn="http://www.gnucash.org/XML/trn" xmlns:split="http://www.gnucash.org/XML/split" xmlns:cmdty="http://www.gnucash.org/XML/cmdty" xmlns:ts="http://www.gnucash.org/XML/ts">
<gnc:book version="2.0.0">
<gnc:account version="2.0.0"><act:name>Root</act:name><act:id type="guid">r</act:id><act:type>ROOT</act:type></gnc:account>
<gnc:account version="2.0.0"><act:name>Assets</act:name><act:id type="guid">a</act:id><act:parent type="guid">r</act:parent></gnc:account>
<gnc:account version="2.0.0"><act:name>Bank</act:name><act:id type="guid">b</act:id><act:parent type="guid">a</act:parent></gnc:account>
<gnc:account version="2.0.0"><act:name>Equity</act:name><act:id type="guid">e</act:id><act:parent type="guid">r</act:parent></gnc:account>
<gnc:transaction version="2.0.0">
  <trn:id type="guid">t1</trn:id>
  <trn:currency><cmdty:space>CURRENCY</cmdty:space><cmdty:id>EUR</cmdty:id></trn:currency>
  <trn:date-posted><ts:date>2023-12-31 00:00:00 +0000</ts:date></trn:date-posted>
  <trn:description>Opening balance</trn:description>
  <trn:splits>
    <trn:split><split:value>150000/100</split:value><split:account type="guid">b</split:account></trn:split>
    <trn:split><split:value>-150000/100</split:value><split:account type="guid">e</split:account></trn:split>
  </trn:splits>
</gnc:transaction>
</gnc:book>
</gnc-v2>
"#;

fn config(dir: &Path, input: &str, contents: &str) -> Result<Config> {
    let input = dir.join(input);
    fs::write(&input, contents)?;
    let template = dir.join("template.beancount");
    fs::write(&template, TEMPLATE)?;

    let mut config = Config::new(input);
    config.template = template;
    config.output = dir.join("output.beancount");
    Ok(config)
}

#[test]
fn test_csv_export() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = config(dir.path(), "export.csv", EXPORT)?;

    let summary = data::convert(&config)?;
    assert_eq!(summary, Summary { transactions: 2, postings: 5 });

    let output = fs::read_to_string(&config.output)?;
    assert!(output.starts_with(TEMPLATE));
    assert_eq!(
        &output[TEMPLATE.len()..],
        "2024-01-05 * \"Groceries\"\n\
         \x20 Expenses:Food-Groceries        42.10 USD\n\
         \x20 Assets:Current-Assets:Checking-Account        -42.10 USD\n\
         2024-01-31 * \"Paycheck\"\n\
         \x20 Assets:Current-Assets:Checking-Account        2500.00 USD\n\
         \x20 Income:Salary        -2000.00 USD\n\
         \x20 Expenses:Taxes        500.00 USD\n"
    );

    // One line per transaction plus one per posting row.
    assert_eq!(output[TEMPLATE.len()..].lines().count(), 2 + 5);

    Ok(())
}

#[test]
fn test_xml_book() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = config(dir.path(), "books.gnucash", BOOK)?;

    let summary = data::convert(&config)?;
    assert_eq!(summary, Summary { transactions: 1, postings: 2 });

    let output = fs::read_to_string(&config.output)?;
    assert_eq!(
        output,
        format!(
            "{}2023-12-31 * \"Opening balance\"\n\
             \x20 Assets-Bank        1500.00 EUR\n\
             \x20 Equity        -1500.00 EUR\n",
            TEMPLATE
        )
    );

    Ok(())
}

#[test]
fn test_template_bytes_are_untouched() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut config = config(dir.path(), "export.csv", EXPORT)?;
    let template = "; no trailing newline \u{00e9}\r\n2024-01-01 open Assets:Bank";
    fs::write(&config.template, template)?;
    config.output = dir.path().join("ledger.beancount");

    data::convert(&config)?;

    let output = fs::read(&config.output)?;
    assert!(output.starts_with(template.as_bytes()));

    Ok(())
}

#[test]
fn test_missing_column_leaves_no_output() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let header = "Date,Description,Commodity/Currency,Full Account Name\n";
    let config = config(dir.path(), "export.csv", header)?;

    let err = data::convert(&config).unwrap_err();
    assert!(matches!(err, ConversionError::MissingColumn { column: "Amount Num" }));
    assert!(!config.output.exists());

    Ok(())
}

#[test]
fn test_missing_template() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut config = config(dir.path(), "export.csv", EXPORT)?;
    config.template = dir.path().join("absent.beancount");

    let err = data::convert(&config).unwrap_err();
    assert!(matches!(
        err,
        ConversionError::Open { ref path, .. } if path.ends_with("absent.beancount")
    ));

    Ok(())
}

#[test]
fn test_failed_conversion_keeps_previous_output() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let csv = "Date,Transaction ID,Description,Commodity/Currency,Full Account Name,Amount Num\n\
               2024-01-05,t1,Ok,CURRENCY:USD,Assets:Bank,1.00\n\
               2024-01-05,t1,Ok,CURRENCY:USD,Income:Gifts,-1.00\n\
               2024-01-06,t2,Bad,CURRENCY:USD,Assets:Bank,lots\n";
    let config = config(dir.path(), "export.csv", csv)?;
    fs::write(&config.output, "PREVIOUS GOOD LEDGER\n")?;

    let err = data::convert(&config).unwrap_err();
    assert!(matches!(err, ConversionError::InvalidAmount { ref value, .. } if value == "lots"));
    assert_eq!(fs::read_to_string(&config.output)?, "PREVIOUS GOOD LEDGER\n");

    // Only the input, the template and the untouched output remain.
    assert_eq!(fs::read_dir(dir.path())?.count(), 3);

    Ok(())
}

#[test]
fn test_comma_decimal_export() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let csv = "Date,Transaction ID,Description,Commodity/Currency,Full Account Name,Amount Num\n\
               2024-02-01,t1,Bakery,CURRENCY:EUR,Expenses:Food,\"12,34\"\n\
               2024-02-01,t1,Bakery,CURRENCY:EUR,Assets:Cash,\"(12,34)\"\n";
    let mut config = config(dir.path(), "export.csv", csv)?;
    config.options.decimal_separator = ',';

    data::convert(&config)?;

    let output = fs::read_to_string(&config.output)?;
    assert_eq!(
        &output[TEMPLATE.len()..],
        "2024-02-01 * \"Bakery\"\n\
         \x20 Expenses:Food        12.34 EUR\n\
         \x20 Assets:Cash        -12.34 EUR\n"
    );

    Ok(())
}

#[test]
fn test_error_stops_entries() -> Result<()> {
    let csv = "Date,Transaction ID,Description,Commodity/Currency,Full Account Name,Amount Num\n\
               2024-01-05,t1,Ok,CURRENCY:USD,Assets:Bank,1.00\n\
               2024-01-06,t2,Bad,CURRENCY:USD,Assets:Bank,lots\n\
               2024-01-07,t3,Never,CURRENCY:USD,Assets:Bank,1.00\n";
    let source = Source::open(InputFormat::Csv, Box::new(csv.as_bytes()), &Default::default())?;
    let results: Vec<_> = Entries::new(source).collect();

    assert_eq!(results.len(), 1);
    assert!(matches!(results[0], Err(ConversionError::InvalidAmount { .. })));

    Ok(())
}

#[test]
fn test_ledger_lines_are_lazy_and_finite() -> Result<()> {
    let input = Box::new(EXPORT.as_bytes());
    let source = Source::open(InputFormat::Csv, input, &Default::default())?;
    let mut lines = data::ledger_lines(Entries::new(source));

    assert_eq!(lines.next().transpose()?, Some("2024-01-05 * \"Groceries\"".to_string()));
    assert_eq!(lines.count(), 6);

    Ok(())
}
