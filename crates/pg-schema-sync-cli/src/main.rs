//! pg-schema-sync CLI - reconcile PostgreSQL tables with YAML definitions.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use pg_schema_sync::{
    run_in_transaction, Config, Executor, PgExecutor, PgPool, PostgresDialect, SchemaError,
    SchemaOp, SchemaPlan, SchemaSync, TableDefinition,
};
use serde::Serialize;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "pg-schema-sync")]
#[command(about = "Reconcile PostgreSQL tables with declarative definitions")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the DDL needed to reach the configured definitions, without running it
    Plan {
        /// Only this table
        #[arg(long)]
        table: Option<String>,
    },

    /// Run the DDL needed to reach the configured definitions
    Apply {
        /// Only this table
        #[arg(long)]
        table: Option<String>,
    },

    /// Print the live definition of a table
    Inspect {
        /// Table name, resolved through the search path
        table: String,
    },

    /// Test the database connection
    HealthCheck,
}

#[derive(Serialize)]
struct PlanReport<'a> {
    table: &'a str,
    ops: &'a [SchemaOp],
    statements: Vec<String>,
}

#[derive(Serialize)]
struct HealthReport {
    healthy: bool,
    latency_ms: u64,
    server_version: Option<String>,
    error: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), SchemaError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format).map_err(SchemaError::Config)?;

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    let sync = SchemaSync::new(Arc::new(PostgresDialect::new()));

    match cli.command {
        Commands::Plan { table } => {
            let tables = select_tables(&config, table.as_deref())?;
            let pool = PgPool::connect(&config.database).await?;
            let client = pool.get().await?;
            let exec = PgExecutor::new(&**client);

            let mut plans = Vec::with_capacity(tables.len());
            for desired in tables {
                plans.push(sync.plan(&exec, desired).await?);
            }
            print_plans(&sync, &plans, cli.output_json, "Planned")?;
        }

        Commands::Apply { table } => {
            let tables = select_tables(&config, table.as_deref())?;
            let pool = PgPool::connect(&config.database).await?;
            let client = pool.get().await?;
            let exec = PgExecutor::new(&**client);

            let plans = if config.sync.transaction {
                run_in_transaction(&exec, || reconcile_all(&sync, &exec, &tables)).await?
            } else {
                reconcile_all(&sync, &exec, &tables).await?
            };
            print_plans(&sync, &plans, cli.output_json, "Applied")?;
        }

        Commands::Inspect { table } => {
            let pool = PgPool::connect(&config.database).await?;
            let client = pool.get().await?;
            let live = sync.load(&PgExecutor::new(&**client), &table).await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&live)?);
            } else {
                print!("{}", serde_yaml::to_string(&live)?);
            }
        }

        Commands::HealthCheck => {
            let report = health_check(&config).await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  PostgreSQL ({}): {} ({}ms)",
                    config.database.display_string(),
                    if report.healthy { "OK" } else { "FAILED" },
                    report.latency_ms
                );
                if let Some(ref version) = report.server_version {
                    println!("    Version: {}", version);
                }
                if let Some(ref err) = report.error {
                    println!("    Error: {}", err);
                }
            }

            if !report.healthy {
                return Err(SchemaError::pool("health check failed", "health-check"));
            }
        }
    }

    Ok(())
}

fn select_tables<'a>(config: &'a Config, only: Option<&str>) -> Result<Vec<&'a TableDefinition>, SchemaError> {
    match only {
        Some(name) => config
            .table(name)
            .map(|t| vec![t])
            .ok_or_else(|| SchemaError::Config(format!("table {} is not defined in the configuration", name))),
        None => Ok(config.tables.iter().collect()),
    }
}

async fn reconcile_all(
    sync: &SchemaSync,
    exec: &dyn Executor,
    tables: &[&TableDefinition],
) -> Result<Vec<SchemaPlan>, SchemaError> {
    let mut plans = Vec::with_capacity(tables.len());
    for desired in tables {
        plans.push(sync.reconcile(exec, desired).await?);
    }
    Ok(plans)
}

fn print_plans(
    sync: &SchemaSync,
    plans: &[SchemaPlan],
    json: bool,
    verb: &str,
) -> Result<(), SchemaError> {
    let mut reports = Vec::with_capacity(plans.len());
    for plan in plans {
        reports.push(PlanReport {
            table: &plan.table,
            ops: &plan.ops,
            statements: plan.statements(sync.dialect())?,
        });
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    for report in &reports {
        if report.ops.is_empty() {
            println!("{}: up to date", report.table);
            continue;
        }
        println!("{}: {} {} operations", report.table, verb, report.ops.len());
        for (op, sql) in report.ops.iter().zip(&report.statements) {
            println!("  {}", op);
            println!("    {};", sql);
        }
    }
    Ok(())
}

async fn health_check(config: &Config) -> HealthReport {
    let pool = match PgPool::connect(&config.database).await {
        Ok(pool) => pool,
        Err(e) => {
            return HealthReport {
                healthy: false,
                latency_ms: 0,
                server_version: None,
                error: Some(e.to_string()),
            }
        }
    };

    let latency = pool.ping().await;
    let version = pool.server_version().await;
    match (latency, version) {
        (Ok(latency), Ok(version)) => HealthReport {
            healthy: true,
            latency_ms: latency.as_millis() as u64,
            server_version: Some(version),
            error: None,
        },
        (Err(e), _) | (_, Err(e)) => HealthReport {
            healthy: false,
            latency_ms: 0,
            server_version: None,
            error: Some(e.to_string()),
        },
    }
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => return Err(format!("Invalid verbosity '{}'. Valid values: debug, info, warn, error", other)),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    let result = match format {
        "json" => subscriber.json().try_init(),
        "text" => subscriber.try_init(),
        other => return Err(format!("Invalid log format '{}'. Valid values: text, json", other)),
    };
    result.map_err(|e| e.to_string())
}
