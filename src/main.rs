mod config;
mod country;
mod flag;
mod format;
mod logging;
mod remote;
mod search;
mod ui;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use reqwest::blocking::Client;

use config::Config;
use remote::{http, CountrySource, FileSource, HttpSource};

#[derive(Parser, Debug)]
#[command(name = "countrydex", version, about = "Browse the REST Countries directory")]
struct Cli {
    /// Use an alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Read the country list from a local JSON file instead of the network
    #[arg(long, global = true, value_name = "PATH")]
    source: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print countries whose name contains TERM (name, region, population)
    Query(QueryArgs),
    /// Print the details of one country
    Show(ShowArgs),
}

#[derive(Args, Debug)]
struct QueryArgs {
    /// Case-insensitive substring of the common name
    term: String,
}

#[derive(Args, Debug)]
struct ShowArgs {
    /// Exact common name, ignoring case
    name: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = match logging::init() {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("warning: file logging disabled: {err:#}");
            None
        }
    };

    let config = config::load(cli.config.as_deref())?;
    if let Some(path) = &config.config_path {
        tracing::info!(path = %path.display(), "loaded configuration");
    }

    let client = http::build_client(config.request_timeout).context("failed to build HTTP client")?;
    let source = country_source(&cli, &config, client.clone());

    match cli.command {
        Some(Command::Query(args)) => handle_query(args, source.as_ref()),
        Some(Command::Show(args)) => handle_show(args, source.as_ref()),
        None => {
            let flag_client = config.ui.overlay.flag_images.then_some(client);
            let mut app = ui::app::App::new(&config, source, flag_client);
            app.run()
        }
    }
}

fn country_source(cli: &Cli, config: &Config, client: Client) -> Box<dyn CountrySource> {
    match &cli.source {
        Some(path) => Box::new(FileSource::new(path.clone())),
        None => Box::new(HttpSource::new(config.endpoint.clone(), client)),
    }
}

fn load_countries(source: &dyn CountrySource) -> Result<Vec<country::CountryRecord>> {
    source
        .load_all()
        .with_context(|| format!("failed to load countries from {}", source.describe()))
}

fn handle_query(args: QueryArgs, source: &dyn CountrySource) -> Result<()> {
    let countries = load_countries(source)?;
    let results = search::filter_records(&countries, &args.term);

    if results.is_empty() {
        println!("No matches for \"{}\"", args.term);
    } else {
        let noun = if results.len() == 1 { "country" } else { "countries" };
        println!("Found {} {} matching \"{}\"", results.len(), noun, args.term);
    }

    // name<TAB>region<TAB>population
    for record in results {
        println!(
            "{}\t{}\t{}",
            record.common_name(),
            record.region_text(),
            record.population
        );
    }

    Ok(())
}

fn handle_show(args: ShowArgs, source: &dyn CountrySource) -> Result<()> {
    let countries = load_countries(source)?;
    let Some(record) = search::find_by_name(&countries, &args.name) else {
        bail!("no country named \"{}\"", args.name);
    };

    let lines = record.detail_lines();
    let label_width = lines.iter().map(|line| line.label.len() + 1).max().unwrap_or(0);
    for line in lines {
        println!(
            "{:<width$} {}",
            format!("{}:", line.label),
            line.value,
            width = label_width
        );
    }

    Ok(())
}
