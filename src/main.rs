use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use siss_tariffs::{
    catalog::{LinkCatalog, TariffCatalog},
    config::Config,
    history::{JsonStore, Store, PDF_LINKS, TARIFFS},
    pipeline::{self, Pipeline},
};
use std::path::PathBuf;
use tokio::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Watch the SISS tariff listing and extract the current tariff PDFs.
#[derive(Parser, Debug)]
#[command(name = "siss_tariffs", version)]
struct Cli {
    /// YAML config file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// One refresh: scrape, download changed PDFs, extract, store.
    Run {
        /// Ignore the unchanged-page shortcut.
        #[arg(long)]
        force: bool,
    },
    /// Refresh on the configured interval until Ctrl-C.
    Watch,
    /// Only refresh the link catalog.
    Scrape {
        #[arg(long)]
        force: bool,
    },
    /// Extract local PDFs (files or directories) into JSON files.
    Parse {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        #[arg(short, long, default_value = "data/json")]
        out: PathBuf,
    },
    /// Print the stored tariff for one locality.
    Lookup {
        region: String,
        company: String,
        locality: String,
    },
    /// List stored regions, companies of a region, or localities of a company.
    List {
        region: Option<String>,
        company: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    // ─── 2) config & state ───────────────────────────────────────────
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let store = JsonStore::new(config.state_dir())?;
    info!(data_dir = %config.data_dir.display(), "startup");

    // ─── 3) dispatch ─────────────────────────────────────────────────
    let start = Instant::now();
    match cli.command {
        Command::Run { force } => {
            let summary = Pipeline::new(config, store)?.run_once(force).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Watch => {
            let period = config.interval();
            Pipeline::new(config, store)?.watch(period).await?;
        }
        Command::Scrape { force } => match Pipeline::new(config, store)?.scrape(force).await? {
            Some((_, links)) => info!(links = links.len(), "link catalog refreshed"),
            None => info!("listing unchanged"),
        },
        Command::Parse { paths, out } => {
            let mut files = Vec::new();
            for p in paths {
                if p.is_dir() {
                    files.extend(pipeline::list_pdfs(&p)?);
                } else {
                    files.push(p);
                }
            }
            let summary = pipeline::parse_local(&files, &out).await?;
            info!(parsed = summary.parsed, failed = summary.failed, out = %out.display(), "parse done");
        }
        Command::Lookup {
            region,
            company,
            locality,
        } => {
            let tariffs: TariffCatalog = store.load(TARIFFS)?.unwrap_or_default();
            match tariffs.lookup(&region, &company, &locality) {
                Some(entry) => println!("{}", serde_json::to_string_pretty(entry)?),
                None => {
                    warn!(%region, %company, %locality, "no stored tariff for locality");
                    std::process::exit(1);
                }
            }
        }
        Command::List { region, company } => {
            let links: LinkCatalog = store
                .load(PDF_LINKS)
                .context("loading link catalog")?
                .unwrap_or_default();
            let names: Vec<&str> = match (&region, &company) {
                (Some(r), Some(c)) => links.localities(r, c).collect(),
                (Some(r), None) => links.companies(r).collect(),
                _ => links.regions().collect(),
            };
            for name in names {
                println!("{}", name);
            }
        }
    }

    info!(elapsed = ?start.elapsed(), "done");
    Ok(())
}
