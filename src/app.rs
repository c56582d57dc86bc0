use std::fmt::Display;
use std::str::FromStr;

use asx_tax::accounting::reports::FinancialYear;
use asx_tax::{Action, MatchingPolicy, TaxError};
use chrono::NaiveDate;
use clap::{AppSettings, Arg, ArgMatches, SubCommand};
use rust_decimal::Decimal;

pub enum Command {
    Import {
        path: String,
    },
    Add {
        action: Action,
        symbol: String,
        quantity: u64,
        price: Decimal,
        fee: Option<Decimal>,
        date: Option<NaiveDate>,
    },
    Parcels {
        all: bool,
    },
    Cgt {
        year: FinancialYear,
        carried_loss: Option<Decimal>,
    },
    CgtPreview {
        symbol: String,
        quantity: u64,
        price: Decimal,
        fee: Option<Decimal>,
        date: Option<NaiveDate>,
    },
    CgtSuggest {
        symbol: String,
        price: Decimal,
        target: Option<Decimal>,
        as_of: Option<NaiveDate>,
    },
    Unrealized {
        as_of: Option<NaiveDate>,
    },
    Positions,
    Summary,
    Prices {
        api: bool,
        force: bool,
    },
    Dividend {
        symbol: String,
        paid_on: NaiveDate,
        amount: Decimal,
        franked_pct: Option<Decimal>,
    },
    Franking {
        year: FinancialYear,
        income: Decimal,
    },
    Export {
        output: String,
        year: Option<FinancialYear>,
    },
}

pub struct App {
    conf_path: String,
    db_path: Option<String>,
    method: Option<MatchingPolicy>,
    command: Command,
}

impl App {
    pub fn new() -> Result<App, TaxError> {
        let matches = cli().get_matches();
        App::from_matches(&matches)
    }

    #[cfg(test)]
    pub fn from_args<I, T>(args: I) -> Result<App, TaxError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let matches = cli()
            .get_matches_from_safe(args)
            .map_err(|e| TaxError::InvalidInput(e.message))?;
        App::from_matches(&matches)
    }

    fn from_matches(matches: &ArgMatches) -> Result<App, TaxError> {
        let command = match matches.subcommand() {
            ("import", Some(m)) => Command::Import {
                path: required::<String>(m, "csv")?,
            },
            ("add", Some(m)) => Command::Add {
                action: required(m, "action")?,
                symbol: required(m, "symbol")?,
                quantity: required(m, "quantity")?,
                price: required(m, "price")?,
                fee: optional(m, "fee")?,
                date: optional(m, "date")?,
            },
            ("parcels", Some(m)) => Command::Parcels {
                all: m.is_present("all"),
            },
            ("cgt", Some(m)) => match m.subcommand() {
                ("preview", Some(p)) => Command::CgtPreview {
                    symbol: required::<String>(p, "symbol")?.trim().to_uppercase(),
                    quantity: required(p, "quantity")?,
                    price: required(p, "price")?,
                    fee: optional(p, "fee")?,
                    date: optional(p, "date")?,
                },
                ("suggest", Some(s)) => Command::CgtSuggest {
                    symbol: required::<String>(s, "symbol")?.trim().to_uppercase(),
                    price: required(s, "price")?,
                    target: optional(s, "target")?,
                    as_of: optional(s, "as_of")?,
                },
                _ => Command::Cgt {
                    year: required(m, "year")?,
                    carried_loss: optional(m, "carried_loss")?,
                },
            },
            ("unrealized", Some(m)) => Command::Unrealized {
                as_of: optional(m, "as_of")?,
            },
            ("positions", Some(_)) => Command::Positions,
            ("summary", Some(_)) => Command::Summary,
            ("prices", Some(m)) => Command::Prices {
                api: m.is_present("api"),
                force: m.is_present("force"),
            },
            ("dividend", Some(m)) => Command::Dividend {
                symbol: required::<String>(m, "symbol")?.trim().to_uppercase(),
                paid_on: required(m, "date")?,
                amount: required(m, "amount")?,
                franked_pct: optional(m, "franked")?,
            },
            ("franking", Some(m)) => Command::Franking {
                year: required(m, "year")?,
                income: optional(m, "income")?.unwrap_or(Decimal::ZERO),
            },
            ("export", Some(m)) => Command::Export {
                output: required(m, "output")?,
                year: optional(m, "year")?,
            },
            (other, _) => {
                return Err(TaxError::InvalidInput(format!("unknown command '{}'", other)));
            }
        };

        Ok(App {
            conf_path: matches.value_of("config_path").unwrap_or("config.yaml").to_string(),
            db_path: matches.value_of("db_path").map(str::to_string),
            method: optional(matches, "method")?,
            command,
        })
    }

    pub fn get_config_path(&self) -> &str { &self.conf_path }
    pub fn get_db_path(&self) -> Option<&str> { self.db_path.as_deref() }
    pub fn get_method(&self) -> Option<MatchingPolicy> { self.method }
    pub fn get_command(&self) -> &Command { &self.command }
}

fn optional<T>(matches: &ArgMatches, name: &str) -> Result<Option<T>, TaxError>
where
    T: FromStr,
    T::Err: Display,
{
    matches
        .value_of(name)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| TaxError::InvalidInput(format!("--{} '{}': {}", name, raw, e)))
        })
        .transpose()
}

fn required<T>(matches: &ArgMatches, name: &str) -> Result<T, TaxError>
where
    T: FromStr,
    T::Err: Display,
{
    optional(matches, name)?.ok_or_else(|| TaxError::InvalidInput(format!("missing {}", name)))
}

fn cli() -> clap::App<'static, 'static> {
    let year = Arg::with_name("year")
        .short("y")
        .long("year")
        .takes_value(true)
        .help("Financial year, e.g. 2024-2025, 2024-25 or FY2025");

    clap::App::new("asx-tax")
        .version("0.1.0")
        .about("Tracks ASX share parcels and works out capital gains tax")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(Arg::with_name("config_path")
            .short("c")
            .long("config")
            .takes_value(true)
            .global(true)
            .help("Config file"))
        .arg(Arg::with_name("db_path")
            .long("db")
            .takes_value(true)
            .global(true)
            .help("Portfolio database, overrides the config"))
        .arg(Arg::with_name("method")
            .short("m")
            .long("method")
            .takes_value(true)
            .global(true)
            .possible_values(&["FIFO", "LIFO", "fifo", "lifo"])
            .help("Parcel matching policy, overrides the config"))
        .subcommand(SubCommand::with_name("import")
            .about("Imports a CSV transaction statement")
            .arg(Arg::with_name("csv")
                .required(true)
                .index(1)
                .help("Statement with columns Date,Stock,Action,Quantity,Price[,Fees][,Status]")))
        .subcommand(SubCommand::with_name("add")
            .about("Records a single trade")
            .arg(Arg::with_name("action").required(true).index(1).possible_values(&["buy", "sell"]))
            .arg(Arg::with_name("symbol").required(true).index(2))
            .arg(Arg::with_name("quantity").required(true).index(3))
            .arg(Arg::with_name("price").required(true).index(4))
            .arg(Arg::with_name("fee")
                .long("fee")
                .takes_value(true)
                .help("Brokerage paid, defaults to the configured schedule"))
            .arg(Arg::with_name("date")
                .long("date")
                .takes_value(true)
                .help("Trade date (YYYY-MM-DD), defaults to today")))
        .subcommand(SubCommand::with_name("parcels")
            .about("Lists tax parcels")
            .arg(Arg::with_name("all")
                .long("all")
                .help("Include closed parcels")))
        .subcommand(SubCommand::with_name("cgt")
            .about("Capital gains report for a financial year")
            .setting(AppSettings::SubcommandsNegateReqs)
            .arg(year.clone().required(true))
            .arg(Arg::with_name("carried_loss")
                .long("carried-loss")
                .takes_value(true)
                .help("Loss brought forward, derived from earlier years when omitted"))
            .subcommand(SubCommand::with_name("preview")
                .about("Shows the capital gain a sale would realise, without recording it")
                .arg(Arg::with_name("symbol").required(true).index(1))
                .arg(Arg::with_name("quantity").required(true).index(2))
                .arg(Arg::with_name("price").required(true).index(3))
                .arg(Arg::with_name("fee")
                    .long("fee")
                    .takes_value(true)
                    .help("Brokerage, defaults to the configured schedule"))
                .arg(Arg::with_name("date")
                    .long("date")
                    .takes_value(true)
                    .help("Sale date (YYYY-MM-DD), defaults to today")))
            .subcommand(SubCommand::with_name("suggest")
                .about("Ranks open parcels by the taxable gain of selling them")
                .arg(Arg::with_name("symbol").required(true).index(1))
                .arg(Arg::with_name("price").required(true).index(2))
                .arg(Arg::with_name("target")
                    .long("target")
                    .takes_value(true)
                    .help("Taxable gain to aim for"))
                .arg(Arg::with_name("as_of")
                    .long("as-of")
                    .takes_value(true)
                    .help("Sale date (YYYY-MM-DD), defaults to today"))))
        .subcommand(SubCommand::with_name("unrealized")
            .about("Unrealized gains on open parcels at stored prices")
            .arg(Arg::with_name("as_of")
                .long("as-of")
                .takes_value(true)
                .help("Valuation date (YYYY-MM-DD), defaults to today")))
        .subcommand(SubCommand::with_name("positions")
            .about("Holdings per symbol"))
        .subcommand(SubCommand::with_name("summary")
            .about("Cash balance, holdings value and return at stored prices"))
        .subcommand(SubCommand::with_name("prices")
            .about("Shows current prices for held symbols")
            .arg(Arg::with_name("api")
                .long("api")
                .help("Fetch from the quote API instead of stored prices only"))
            .arg(Arg::with_name("force")
                .long("force")
                .requires("api")
                .help("Ignore today's stored quotes and the daily call budget")))
        .subcommand(SubCommand::with_name("dividend")
            .about("Records a cash dividend")
            .arg(Arg::with_name("symbol").required(true).index(1))
            .arg(Arg::with_name("date").required(true).index(2))
            .arg(Arg::with_name("amount").required(true).index(3))
            .arg(Arg::with_name("franked")
                .long("franked")
                .takes_value(true)
                .help("Franked percentage, defaults to the symbol's typical level")))
        .subcommand(SubCommand::with_name("franking")
            .about("Franking credit summary for a financial year")
            .arg(year.clone().required(true))
            .arg(Arg::with_name("income")
                .long("income")
                .takes_value(true)
                .help("Taxable income excluding dividends")))
        .subcommand(SubCommand::with_name("export")
            .about("Writes CGT events to a CSV file")
            .arg(Arg::with_name("output")
                .short("o")
                .long("output")
                .takes_value(true)
                .required(true))
            .arg(year))
}
