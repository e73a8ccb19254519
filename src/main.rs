use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use osm_etl::config::{FailurePolicy, PipelineConfig, DEFAULT_LOCALITY_PREFIX};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "osm-etl")]
#[command(about = "Convert OpenStreetMap XML extracts into relational CSV tables")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Shape, validate and write an extract into five CSV tables
    Process(ProcessArgs),
    /// Report data-quality findings without writing anything
    Audit(AuditArgs),
}

#[derive(Args)]
struct ProcessArgs {
    /// Path to the OSM extract (.osm or .osm.bz2)
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory for the CSV tables
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Override the nodes table path
    #[arg(long)]
    nodes_path: Option<PathBuf>,

    /// Override the node tags table path
    #[arg(long)]
    node_tags_path: Option<PathBuf>,

    /// Override the ways table path
    #[arg(long)]
    ways_path: Option<PathBuf>,

    /// Override the way nodes table path
    #[arg(long)]
    way_nodes_path: Option<PathBuf>,

    /// Override the way tags table path
    #[arg(long)]
    way_tags_path: Option<PathBuf>,

    /// Validate every record before writing it
    #[arg(long)]
    validate: bool,

    /// JSON schema document to validate against (defaults to the built-in one)
    #[arg(long, requires = "validate")]
    schema: Option<PathBuf>,

    /// What to do with an element that fails validation
    #[arg(long, value_enum, default_value_t = FailurePolicy::Abort)]
    on_validation_failure: FailurePolicy,

    /// Truncate ZIP+4 postcodes to five digits
    #[arg(long)]
    clean_postcodes: bool,

    /// Treat "St." like "St" when expanding street suffixes
    #[arg(long)]
    strip_street_periods: bool,

    /// Limit number of top-level elements to process (for testing)
    #[arg(long)]
    limit: Option<u64>,

    /// Dry run - don't write output files
    #[arg(long)]
    dry_run: bool,
}

#[derive(Args)]
struct AuditArgs {
    /// Path to the OSM extract (.osm or .osm.bz2)
    #[arg(short, long)]
    input: PathBuf,

    /// Leading digits of postcodes that belong to the mapped area
    #[arg(long, default_value = DEFAULT_LOCALITY_PREFIX)]
    locality_prefix: String,
}

impl ProcessArgs {
    fn into_config(self) -> PipelineConfig {
        let mut config = PipelineConfig::new(self.input, &self.output);
        let outputs = &mut config.outputs;
        for (slot, custom) in [
            (&mut outputs.nodes, self.nodes_path),
            (&mut outputs.node_tags, self.node_tags_path),
            (&mut outputs.ways, self.ways_path),
            (&mut outputs.way_nodes, self.way_nodes_path),
            (&mut outputs.way_tags, self.way_tags_path),
        ] {
            if let Some(path) = custom {
                *slot = path;
            }
        }

        config.validate = self.validate;
        config.schema_path = self.schema;
        config.on_validation_failure = self.on_validation_failure;
        config.clean_postcodes = self.clean_postcodes;
        config.strip_street_periods = self.strip_street_periods;
        config.limit = self.limit;
        config.dry_run = self.dry_run;
        config
    }
}

fn run_process(args: ProcessArgs) -> Result<()> {
    let config = args.into_config();

    let start = Instant::now();
    let stats = osm_etl::pipeline::run_pipeline(&config)?;
    let duration = start.elapsed();

    println!();
    println!("=== Summary ===");
    println!("Processing time:    {:.2}s", duration.as_secs_f64());
    println!();
    stats.print_summary();
    if config.dry_run {
        println!("(dry run, no files written)");
    }

    Ok(())
}

fn run_audit(args: AuditArgs) -> Result<()> {
    let start = Instant::now();
    let report = osm_etl::audit::audit_file(&args.input, &args.locality_prefix)?;
    info!(
        duration_secs = start.elapsed().as_secs_f64(),
        "Audit finished"
    );

    println!();
    report.print();
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    let result = match cli.command {
        Commands::Process(args) => run_process(args),
        Commands::Audit(args) => run_audit(args),
    };

    match result {
        Ok(()) => {
            info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
