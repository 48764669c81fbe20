use crate::controller::{FormController, Phase};
use crate::optimizer::HttpOptimizer;
use crate::render::{DisplayBlock, NumberLocale, Renderer};
use crate::tui::App;

use clap::{arg, Arg, ArgAction, ArgMatches, Command};
use colored::Colorize;
use eyre::WrapErr;
use serde::Deserialize;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

mod controller;
mod error;
mod optimizer;
mod render;
mod ticker;
mod tui;
mod validator;

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
struct Config {
    optimizer_url: String,
    horizons: Vec<String>,
    default_horizon: String,
    locale: String,
    request_timeout_secs: Option<u64>,
    log_level: String,
    log_file: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            optimizer_url: "http://127.0.0.1:5000".to_string(),
            horizons: vec!["short".to_string(), "medium".to_string(), "long".to_string()],
            default_horizon: "medium".to_string(),
            locale: "en-US".to_string(),
            request_timeout_secs: None,
            log_level: "warn".to_string(),
            log_file: None,
        }
    }
}

impl Config {
    fn number_locale(&self) -> NumberLocale {
        self.locale.parse().unwrap_or_else(|e: String| {
            warn!("{e}, falling back to en-US");
            NumberLocale::default()
        })
    }

    fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

fn cli() -> Command {
    Command::new("portfolio_optimizer")
        .about("Request optimized stock portfolios from a remote optimizer")
        .arg_required_else_help(true)
        .arg(arg!(--url <URL> "Optimizer base URL, overrides the config file").global(true))
        .subcommand(Command::new("config").about("Print the path to the config file"))
        .subcommand(Command::new("form").about("Fill in the optimization form interactively"))
        .subcommand(
            Command::new("optimize")
                .about("Submit one optimization request and print the result")
                .arg(arg!(--capital <AMOUNT> "Capital to invest").required(true))
                .arg(
                    Arg::new("desired_return")
                        .long("return")
                        .value_name("PERCENT")
                        .help("Desired annual return in percent")
                        .required(true),
                )
                .arg(arg!(--horizon <HORIZON> "Investment horizon, e.g. short, medium or long"))
                .arg(
                    arg!(<TICKERS> ... "Ticker symbols, at least two")
                        .required(false)
                        .action(ArgAction::Append),
                ),
        )
}

fn init_logging(cfg: &Config, interactive: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));

    let writer = match (&cfg.log_file, interactive) {
        (Some(path), _) => match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
        {
            Ok(file) => BoxMakeWriter::new(std::sync::Mutex::new(file)),
            Err(e) => {
                eprintln!("Could not open log file {path}: {e}");
                BoxMakeWriter::new(std::io::sink)
            }
        },
        (None, true) => BoxMakeWriter::new(std::io::sink),
        (None, false) => BoxMakeWriter::new(std::io::stderr),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(cfg.log_file.is_none() && !interactive)
        .init();
}

/// `--url` is global, so it can be read from the subcommand's matches.
fn build_optimizer(cfg: &Config, matches: &ArgMatches) -> eyre::Result<HttpOptimizer> {
    let url = matches
        .get_one::<String>("url")
        .cloned()
        .unwrap_or_else(|| cfg.optimizer_url.clone());
    let optimizer = HttpOptimizer::new(&url, cfg.request_timeout())
        .wrap_err("failed to create HTTP client")?;
    info!(endpoint = optimizer.endpoint(), "using optimizer");
    Ok(optimizer)
}

fn print_blocks(blocks: &[DisplayBlock]) {
    use comfy_table::{
        presets::UTF8_FULL, Attribute, Cell, CellAlignment, ContentArrangement, Table,
    };

    for block in blocks {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_width(80);

        table.set_header(vec![
            Cell::new(block.title.as_str()).add_attribute(Attribute::Bold),
            Cell::new(""),
        ]);
        for line in &block.lines {
            table.add_row(vec![
                Cell::new(line.label.as_str()).add_attribute(Attribute::Bold),
                Cell::new(line.value.as_str()).set_alignment(CellAlignment::Right),
            ]);
        }
        println!("{table}");
    }
}

fn new_form(cfg: &Config) -> FormController {
    let locale = cfg.number_locale();
    info!(%locale, "formatting numbers");
    let form = FormController::new(Renderer::new(locale));

    let mut ui_state = form.subscribe();
    tokio::spawn(async move {
        while ui_state.changed().await.is_ok() {
            let state = *ui_state.borrow_and_update();
            debug!(loading = state.loading, label = state.button_label(), "submit control updated");
        }
    });
    form
}

async fn run_optimize(cfg: &Config, sub: &ArgMatches) -> eyre::Result<bool> {
    let optimizer = build_optimizer(cfg, sub)?;
    let mut form = new_form(cfg);

    if let Some(capital) = sub.get_one::<String>("capital") {
        form.set_capital(capital);
    }
    if let Some(desired_return) = sub.get_one::<String>("desired_return") {
        form.set_desired_return(desired_return);
    }
    let horizon = sub
        .get_one::<String>("horizon")
        .cloned()
        .unwrap_or_else(|| cfg.default_horizon.clone());
    if !cfg.horizons.is_empty() && !cfg.horizons.contains(&horizon) {
        warn!(
            horizon = %horizon,
            known = ?cfg.horizons,
            "horizon is not one of the configured choices"
        );
    }
    form.set_horizon(&horizon);

    if let Some(tickers) = sub.get_many::<String>("TICKERS") {
        for raw in tickers {
            if let Err(e) = form.add_ticker(raw) {
                eprintln!("{} {raw}: {e}", "Skipping ticker".yellow());
            }
        }
    }

    for advisory in [form.capital_advisory(), form.return_advisory()].into_iter().flatten() {
        eprintln!("{} {advisory}", "Note:".yellow());
    }

    match form.submit(&optimizer).await {
        Phase::ResultsShown(blocks) => {
            print_blocks(blocks);
            Ok(true)
        }
        Phase::ErrorShown(message) => {
            eprintln!("{}", "Error".red().bold());
            for line in message.lines() {
                eprintln!("{}", line.red());
            }
            Ok(false)
        }
        Phase::Idle | Phase::Submitting => Ok(false),
    }
}

async fn run_form(cfg: &Config, matches: &ArgMatches) -> eyre::Result<()> {
    let optimizer = build_optimizer(cfg, matches)?;
    let app = App::new(new_form(cfg), cfg.horizons.clone(), &cfg.default_horizon);
    tui::run_tui(app, &optimizer).await
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cfg: Config =
        confy::load("portfolio_optimizer", "config").wrap_err("failed to load configuration")?;

    let matches = cli().get_matches();

    match matches.subcommand() {
        Some(("config", _)) => {
            let path = confy::get_configuration_file_path("portfolio_optimizer", "config")
                .wrap_err("failed to locate configuration file")?;
            println!("Your config file is located here: \n{}", path.display());
        }
        Some(("optimize", sub)) => {
            init_logging(&cfg, false);
            if !run_optimize(&cfg, sub).await? {
                std::process::exit(1);
            }
        }
        Some(("form", sub)) => {
            init_logging(&cfg, true);
            run_form(&cfg, sub).await?;
        }
        _ => {
            cli().print_help()?;
        }
    }
    Ok(())
}
