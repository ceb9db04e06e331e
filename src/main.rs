use anyhow::{Context, Result};
use book_acquire::auth::Credentials;
use book_acquire::config::{find_config_file, get_config, load_config, AuthConfig, Config};
use book_acquire::{Acquirer, BookRecord, CatalogRegistry, RawQuery};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Book Acquire - find books with verified download links in public catalogs
#[derive(Parser, Debug)]
#[command(name = "book-acquire")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Find books with verified download links in public catalogs", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (-v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short)]
    quiet: bool,

    /// Output format
    #[arg(long, short, value_enum, global = true, default_value_t = OutputFormat::Auto)]
    output: OutputFormat,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Request timeout in seconds (overrides the config file)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Table if stdout is a terminal, JSON otherwise
    Auto,
    /// Table format (human-readable)
    Table,
    /// JSON format (machine-readable)
    Json,
    /// One line per book
    Plain,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search a catalog and verify download links
    #[command(alias = "s")]
    Search {
        /// Book title
        #[arg(long, short)]
        title: Option<String>,

        /// Author name
        #[arg(long, short)]
        author: Option<String>,

        /// Language code (e.g. spa, eng)
        #[arg(long, short)]
        language: Option<String>,

        /// Maximum number of books
        #[arg(long, short = 'n', default_value_t = 10)]
        limit: i64,

        /// Catalog to search (overrides the config file)
        #[arg(long, short)]
        catalog: Option<String>,

        /// Preferred formats, most preferred first (e.g. txt,pdf)
        #[arg(long, value_delimiter = ',')]
        formats: Option<Vec<String>>,
    },

    /// List the available catalogs
    Catalogs,

    /// Write a configuration file with every default spelled out
    InitConfig {
        /// Destination (defaults to ./book-acquire.toml)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = if let Some(config_path) = &cli.config {
        load_config(config_path)
            .with_context(|| format!("Failed to load {}", config_path.display()))?
    } else if let Some(config_path) = find_config_file() {
        load_config(&config_path)
            .with_context(|| format!("Failed to load {}", config_path.display()))?
    } else {
        get_config()?
    };

    init_tracing(&cli, &config);

    if let Some(timeout) = cli.timeout {
        config.http.request_timeout_secs = timeout;
    }

    match cli.command {
        Commands::Search {
            title,
            author,
            language,
            limit,
            catalog,
            formats,
        } => {
            if let Some(catalog) = catalog {
                config.search.catalog = catalog;
            }
            if let Some(formats) = formats {
                config.formats.priority = formats
                    .into_iter()
                    .map(|f| f.trim().to_lowercase())
                    .filter(|f| !f.is_empty())
                    .collect();
            }

            let credentials = credentials(&config.auth, |key| std::env::var(key).ok());

            let raw = RawQuery {
                title,
                author,
                language,
                limit,
            };

            let acquirer = Acquirer::from_config(config)?;
            let books = acquirer.acquire(&raw, credentials.as_ref()).await?;

            if books.is_empty() && !cli.quiet {
                eprintln!("No downloadable books found");
            }
            output_books(&books, cli.output)?;
        }

        Commands::Catalogs => {
            let registry = CatalogRegistry::new(&config.catalogs);

            for id in registry.ids() {
                if let Some(catalog) = registry.get(id) {
                    let marker = if id == config.search.catalog { " (default)" } else { "" };
                    println!("{:<12} {}{}", id, catalog.name(), marker);
                }
            }
        }

        Commands::InitConfig { path, force } => {
            let path = path.unwrap_or_else(|| PathBuf::from("book-acquire.toml"));
            if path.exists() && !force {
                anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
            }

            Config::default().save(&path)?;
            if !cli.quiet {
                println!("Wrote {}", path.display());
            }
        }
    }

    Ok(())
}

/// Account from the config file, falling back to `BOOK_ACQUIRE_USERNAME` and
/// `BOOK_ACQUIRE_PASSWORD` for whichever half is missing
fn credentials(auth: &AuthConfig, env: impl Fn(&str) -> Option<String>) -> Option<Credentials> {
    let username = auth.username.clone().or_else(|| env("BOOK_ACQUIRE_USERNAME"))?;
    let password = auth.password.clone().or_else(|| env("BOOK_ACQUIRE_PASSWORD"))?;
    Some(Credentials::new(username, password))
}

fn init_tracing(cli: &Cli, config: &Config) {
    let level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => config.logging.level.as_str(),
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("book_acquire={}", level)),
    );

    // Logs go to stderr so JSON results on stdout stay parseable
    if config.logging.format.as_deref() == Some("json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn output_books(books: &[BookRecord], format: OutputFormat) -> Result<()> {
    let actual_format = match format {
        OutputFormat::Auto if std::io::stdout().is_terminal() => OutputFormat::Table,
        OutputFormat::Auto => OutputFormat::Json,
        other => other,
    };

    match actual_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(books)?);
        }
        OutputFormat::Plain => {
            for book in books {
                println!(
                    "{} - {} [{}]",
                    book.title,
                    book.author.as_deref().unwrap_or("unknown"),
                    book.chosen_format
                );
                println!("  {}", book.verified_url);
            }
        }
        OutputFormat::Table | OutputFormat::Auto => {
            use comfy_table::{Attribute, Cell, Table};
            let mut table = Table::new();
            table.load_preset(comfy_table::presets::UTF8_FULL);
            table.set_header(vec!["Title", "Author", "Year", "Downloads", "Format", "URL"]);

            for book in books {
                table.add_row(vec![
                    Cell::new(truncate(&book.title, 50)).add_attribute(Attribute::Bold),
                    Cell::new(truncate(book.author.as_deref().unwrap_or(""), 30)),
                    Cell::new(book.year.map(|y| y.to_string()).unwrap_or_default()),
                    Cell::new(book.downloads),
                    Cell::new(&book.chosen_format),
                    Cell::new(&book.verified_url),
                ]);
            }
            println!("{table}");
        }
    }

    Ok(())
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}
