use tabledash::charts::ChartChoices;
use tabledash::config::{secs_to_duration, AppConfig};
use tabledash::dashboard::{run_dashboard, DashboardOptions};
use tabledash::error::DashboardError;
use tabledash::inference::TypeInferencer;
use tabledash::ingestion::{
    load_path, prepare_records, source_name_for, ImportOptions, ImportStatus, Importer, LoadedFile,
};
use tabledash::model::{display_value, ColumnStats, SourceProfile};
use tabledash::storage::{open_store, redact_url, DashboardStore};

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tabledash")]
#[command(about = "Import CSV/Excel files and explore them in an auto-charted dashboard")]
#[command(version)]
struct Args {
    /// Database URL (overrides DATABASE_URL)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the dashboard tables and indexes
    Setup,
    /// Load a file and print its column analysis without importing it
    Profile {
        file: PathBuf,
    },
    /// Import a CSV or Excel file, one record at a time
    Import {
        file: PathBuf,

        /// Data source name (default: the file name without extension)
        #[arg(long)]
        source_name: Option<String>,

        /// Delay between inserts in seconds (prompted for when omitted)
        #[arg(long)]
        delay: Option<f64>,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// List imported data sources
    Sources,
    /// Show the dashboard for a data source
    Dashboard {
        /// Data source (default: the first by name)
        #[arg(long)]
        source: Option<String>,

        /// Maximum number of recent records to load
        #[arg(long)]
        limit: Option<usize>,

        /// Refresh interval in seconds
        #[arg(long)]
        refresh: Option<f64>,

        /// Render once and exit
        #[arg(long)]
        once: bool,

        /// Print the dashboard as JSON
        #[arg(long)]
        json: bool,

        /// Bar chart: group by this column
        #[arg(long)]
        group_by: Option<String>,

        /// Bar chart: measure column
        #[arg(long)]
        measure: Option<String>,

        /// Pie chart: distribution column
        #[arg(long)]
        distribution: Option<String>,

        /// Time series: date column (`_timestamp` for ingestion time)
        #[arg(long)]
        date_column: Option<String>,

        /// Time series: value column
        #[arg(long)]
        value_column: Option<String>,
    },
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let mut config = AppConfig::from_env()?;
    if let Some(url) = args.database_url {
        config.database_url = url;
    }

    match args.command {
        Commands::Setup => run_setup(&config),
        Commands::Profile { file } => run_profile(&config, &file),
        Commands::Import {
            file,
            source_name,
            delay,
            yes,
        } => run_import(&config, &file, source_name, delay, yes),
        Commands::Sources => run_sources(&config),
        Commands::Dashboard {
            source,
            limit,
            refresh,
            once,
            json,
            group_by,
            measure,
            distribution,
            date_column,
            value_column,
        } => {
            let options = DashboardOptions {
                source,
                record_limit: limit.unwrap_or(config.record_limit),
                refresh_interval: match refresh {
                    Some(secs) => secs_to_duration(secs)?,
                    None => config.refresh_interval,
                },
                once,
                json,
                display_threshold: config.display_threshold,
                choices: ChartChoices {
                    bar_category: group_by,
                    bar_value: measure,
                    pie_column: distribution,
                    time_column: date_column,
                    time_value: value_column,
                },
            };
            run_dashboard_command(&config, &options)
        }
    }
}

fn connect(config: &AppConfig) -> Result<Box<dyn DashboardStore>> {
    info!("Connecting to {}", redact_url(&config.database_url));
    let store = open_store(&config.database_url)?;
    store.ensure_schema()?;
    Ok(store)
}

fn run_setup(config: &AppConfig) -> Result<()> {
    println!("=== Dashboard Database Setup ===");
    println!("Database: {}", redact_url(&config.database_url));

    let outcome = open_store(&config.database_url).and_then(|store| {
        store.ensure_schema()?;
        Ok(store.backend_name())
    });

    match outcome {
        Ok(backend) => {
            println!("Database setup completed successfully ({})", backend);
            Ok(())
        }
        Err(e) => {
            error!("Database setup failed: {}", e);
            eprintln!("Database setup failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn load_file(path: &Path) -> Result<LoadedFile> {
    match load_path(path) {
        Ok(loaded) => {
            if let Some(encoding) = loaded.encoding {
                println!("Loaded CSV with {} encoding", encoding);
            }
            println!(
                "Successfully loaded {} rows with {} columns",
                loaded.table.height(),
                loaded.table.width()
            );
            println!("Columns: {:?}", loaded.table.columns);
            Ok(loaded)
        }
        Err(e) => {
            eprintln!("Error loading file: {}", e);
            print_hints(&e);
            Err(e.into())
        }
    }
}

fn print_hints(e: &DashboardError) {
    let hints = e.hints();
    if hints.is_empty() {
        return;
    }
    eprintln!("\nTroubleshooting tips:");
    for (i, hint) in hints.iter().enumerate() {
        eprintln!("{}. {}", i + 1, hint);
    }
}

fn print_analysis(profile: &SourceProfile) {
    println!("\n=== Data Structure Analysis ===");
    for column in &profile.columns {
        println!("\nColumn: {}", column.name);
        println!("  Type: {}", column.data_type());
        println!(
            "  Non-null: {}/{} ({:.1}%)",
            column.non_null_count,
            column.total_count,
            100.0 - column.null_percentage()
        );
        println!("  Unique values: {}", column.unique_count);

        match &column.stats {
            ColumnStats::Numeric { min, max, mean } => {
                println!("  Range: {:.2} to {:.2}", min, max);
                println!("  Average: {:.2}", mean);
            }
            ColumnStats::Text { .. } => {
                let top: Vec<&str> = column.top_values(3).iter().map(|v| v.value.as_str()).collect();
                println!("  Top values: {:?}", top);
            }
            ColumnStats::Datetime => {}
        }
    }
}

fn run_profile(config: &AppConfig, file: &Path) -> Result<()> {
    let loaded = load_file(file)?;
    let inferencer = TypeInferencer::new(config.import_threshold);

    let columns = loaded
        .table
        .columns
        .iter()
        .enumerate()
        .map(|(idx, name)| inferencer.infer(name, loaded.table.column_values(idx)))
        .collect();
    print_analysis(&SourceProfile::new(source_name_for(file), columns));
    Ok(())
}

fn prompt(message: &str) -> Result<String> {
    print!("{}", message);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn prompt_delay(default: Duration) -> Result<Duration> {
    let answer = prompt(&format!(
        "\nEnter delay between insertions in seconds (default: {}): ",
        default.as_secs_f64()
    ))?;
    if answer.is_empty() {
        return Ok(default);
    }
    match answer.parse::<f64>().map_err(|_| ()).and_then(|s| secs_to_duration(s).map_err(|_| ())) {
        Ok(delay) => Ok(delay),
        Err(()) => {
            println!("Invalid delay {:?}, using {} seconds", answer, default.as_secs_f64());
            Ok(default)
        }
    }
}

fn run_import(
    config: &AppConfig,
    file: &Path,
    source_name: Option<String>,
    delay: Option<f64>,
    yes: bool,
) -> Result<()> {
    let loaded = load_file(file)?;
    let source_name = source_name.unwrap_or_else(|| source_name_for(file));

    let store = connect(config)?;
    let importer = Importer::new(store.as_ref())
        .with_inferencer(TypeInferencer::new(config.import_threshold));

    let profile = importer.analyze(&source_name, &loaded.table);
    print_analysis(&profile);

    println!("\nFirst 5 rows of your data:");
    for row in loaded.table.head(5) {
        let cells: Vec<String> = row.iter().map(display_value).collect();
        println!("  {}", cells.join(" | "));
    }

    let records = prepare_records(&loaded.table, &source_name);
    println!("\n=== Preparing Data for Storage ===");
    println!("Prepared {} records for storage", records.len());
    println!("\nData source name: {}", source_name);

    let delay = match delay {
        Some(secs) => secs_to_duration(secs)?,
        None if yes => config.insert_delay,
        None => prompt_delay(config.insert_delay)?,
    };

    if !yes {
        let confirm = prompt(&format!(
            "\nReady to insert {} records with {} second intervals. Continue? (y/N): ",
            records.len(),
            delay.as_secs_f64()
        ))?;
        if !confirm.eq_ignore_ascii_case("y") {
            println!("Operation cancelled.");
            return Ok(());
        }
    }

    println!(
        "Starting to insert {} records with {} second intervals...",
        records.len(),
        delay.as_secs_f64()
    );
    println!("Press Ctrl+C to stop.");

    let options = ImportOptions { delay };
    let report = importer.import_prepared(&profile, &records, &options, &mut |progress| {
        match progress.outcome {
            Ok(_) => println!("Inserted record {}/{}: {}", progress.index + 1, progress.total, source_name),
            Err(message) => println!("Error inserting record {}: {}", progress.index + 1, message),
        }
    });

    if let Some(e) = &report.profile_error {
        println!("Error storing metadata: {}", e);
    }

    match report.status {
        ImportStatus::Success => {
            println!("\nSuccessfully imported data from '{}'!", source_name);
            println!("You can now start the dashboard to view your data.");
            Ok(())
        }
        ImportStatus::Partial => {
            println!(
                "\nImported {}/{} records into '{}' ({} failed)",
                report.records_inserted,
                report.records_total,
                source_name,
                report.failures.len()
            );
            Ok(())
        }
        ImportStatus::Failed => Err(anyhow::anyhow!(
            "Import of '{}' failed: no records were inserted",
            source_name
        )),
    }
}

fn run_sources(config: &AppConfig) -> Result<()> {
    let store = connect(config)?;
    let sources = store.list_sources()?;

    if sources.is_empty() {
        println!("No data sources found.");
        println!("Import your data using: tabledash import your_file.csv");
    }
    for source in sources {
        println!("{}", source);
    }
    Ok(())
}

fn run_dashboard_command(config: &AppConfig, options: &DashboardOptions) -> Result<()> {
    let store = connect(config)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    run_dashboard(store.as_ref(), options, &mut out)?;
    Ok(())
}
