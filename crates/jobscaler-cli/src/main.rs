use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use jobscaler_core::db;
use jobscaler_core::{Config, Result};

#[derive(Parser)]
#[command(name = "jobscaler")]
#[command(about = "Per-job-type autoscaling controller for a message-driven worker fleet")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true, help = "Set log level")]
    log_level: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the scaling controller and the read/report API together
    Server,

    /// Database operations
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },

    /// Print configuration assembled from the environment
    Config,
}

#[derive(Subcommand, Debug)]
pub enum DbCommands {
    /// Run pending migrations
    Migrate,

    /// Show applied migrations and audit table sizes
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = cli.log_level.as_deref().unwrap_or("info");
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    match cli.command {
        Commands::Server => {
            info!("starting jobscaler v{}", jobscaler_core::VERSION);

            let bootstrapped = jobscaler_core::bootstrap().await?;
            let controller = bootstrapped.controller.clone();

            tokio::spawn(async move {
                controller.run().await;
            });

            jobscaler_api::run(&bootstrapped).await?;
        }

        Commands::Db { command } => {
            let config = Config::from_env()?;
            let pool = db::create_pool(&config.database).await?;
            let migrator = db::migrate::Migrator::new(pool);

            match command {
                DbCommands::Migrate => {
                    println!("{}", "Running database migrations...".yellow());
                    match migrator.migrate().await {
                        Ok(_) => println!("{}", "done.".green()),
                        Err(e) => {
                            eprintln!("{}", format!("migration failed: {e}").red());
                            std::process::exit(1);
                        }
                    }
                }
                DbCommands::Status => match migrator.status().await {
                    Ok(status) => {
                        println!("{}", "Database Status".bold().underline());
                        println!("  Host:                  {}:{}", config.database.host, config.database.port);
                        println!("  Database:              {}", config.database.database);
                        println!("  Applied migrations:    {}", status.applied_migrations);
                        println!("  Job audit records:     {}", status.job_audit_count);
                        println!("  Message audit records: {}", status.message_audit_count);
                    }
                    Err(e) => {
                        eprintln!("{}", format!("failed to get status: {e}").red());
                        std::process::exit(1);
                    }
                },
            }
        }

        Commands::Config => {
            let config = Config::from_env()?;
            println!("{}", serde_json::to_string_pretty(&config).unwrap());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse() {
        let cli = Cli::parse_from(["jobscaler", "server"]);
        assert!(matches!(cli.command, Commands::Server));
    }

    #[test]
    fn test_cli_db_migrate_parse() {
        let cli = Cli::parse_from(["jobscaler", "db", "migrate"]);
        assert!(matches!(
            cli.command,
            Commands::Db { command: DbCommands::Migrate }
        ));
    }
}
