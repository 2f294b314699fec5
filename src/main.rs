use std::path::PathBuf;

use anyhow::Context;
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dca::api::{self, AppState, BacktestArgs, BacktestReport, build_request};
use dca::core::format_currency;

#[derive(Parser, Debug)]
#[command(
    name = "dca",
    version,
    about = "Dollar-cost averaging backtests over stored daily closing prices"
)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "DCA_DATA_DIR",
        default_value = ".",
        help = "Directory holding companies.json and stock_data/"
    )]
    data_dir: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the browser calculator and its JSON API
    Serve {
        #[arg(long, env = "DCA_PORT", default_value_t = 8080)]
        port: u16,
    },
    /// Run one backtest and print the results
    Backtest {
        #[command(flatten)]
        args: BacktestArgs,
        #[arg(long, help = "Print the full report as JSON")]
        json: bool,
    },
    /// List companies in the catalog
    Companies {
        #[arg(long)]
        search: Option<String>,
        #[arg(long, help = "Industry to keep, or \"all\"")]
        industry: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dca=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let state = AppState::load(&cli.data_dir)
        .with_context(|| format!("loading data from {}", cli.data_dir.display()))?;

    match cli.command {
        Command::Serve { port } => api::run_http_server(state, port)
            .await
            .context("HTTP server stopped")?,
        Command::Backtest { args, json } => {
            let request = build_request(args, Local::now().date_naive())
                .map_err(anyhow::Error::msg)?;
            let report = api::run_backtest(&state, request).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
        Command::Companies { search, industry } => {
            for listing in state
                .catalog
                .listings(search.as_deref(), industry.as_deref())
            {
                println!(
                    "{:<8} {}  [{} | {}]",
                    listing.symbol,
                    listing.company.display_name(),
                    listing.company.sector,
                    listing.company.industry
                );
            }
        }
    }

    Ok(())
}

fn print_report(report: &BacktestReport) {
    println!(
        "{} ({})  {} to {}",
        report.display_name, report.symbol, report.start_date, report.end_date
    );
    println!();
    println!(
        "{:<12} {:>10} {:>16} {:>16} {:>12}",
        "date", "price", "invested", "value", "fees"
    );
    for event in &report.events {
        println!(
            "{:<12} {:>10.2} {:>16} {:>16} {:>12}",
            event.date.to_string(),
            event.price,
            format_currency(event.total_investment),
            format_currency(event.current_value),
            format_currency(event.total_fees)
        );
    }

    let f = &report.formatted;
    println!();
    println!("Total investment   {}", f.total_investment);
    println!("Current value      {}", f.current_value);
    println!("Profit / loss      {}", f.profit_loss);
    println!("Total return       {}", f.total_return);
    println!("Annualized return  {}", f.annualized_return);
    println!("Total fees         {}", f.total_fees);
}
