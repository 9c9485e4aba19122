//! db-ask - Ask a SQL warehouse questions in plain language.

use db_ask::cli::{Cli, OutputFormat};
use db_ask::config::{Config, ConnectionConfig};
use db_ask::db::{self, DatabaseClient, MockDatabaseClient};
use db_ask::error::{AskError, Result};
use db_ask::llm::{create_client, resolve_provider};
use db_ask::logging::{self, LogTarget};
use db_ask::pipeline::{PipelineOutcome, Session};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Could not load .env: {e}");
        }
    }

    let cli = Cli::parse_args();
    let target = if cli.log_file {
        LogTarget::File(logging::get_log_path())
    } else {
        LogTarget::Stderr
    };
    logging::init(target, cli.verbose);

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            error!(transient = e.is_transient(), "{}: {}", e.category(), e);
            eprintln!("{}: {}", e.category(), e);
            if e.is_transient() {
                eprintln!("This may be temporary; try again shortly.");
            }
            std::process::exit(1);
        }
    }
}

/// Returns whether every question was answered.
async fn run(cli: Cli) -> Result<bool> {
    let format = cli.parse_output_format()?;

    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;
    cli.apply_overrides(&mut config);

    let connection_name = cli.connection_name().unwrap_or("default").to_string();
    let database: Box<dyn DatabaseClient> = if cli.mock_db {
        info!("Using the demo warehouse");
        Box::new(MockDatabaseClient::real_estate())
    } else {
        let connection = resolve_connection(&cli, &config)?.ok_or_else(|| {
            AskError::config(
                "No database connection configured. Use --url, --connection or --mock-db.",
            )
        })?;
        info!("Connection: {}", connection.display_string());
        db::connect(&connection, &config.pipeline).await?
    };

    let provider = resolve_provider(&config.llm)?;
    info!(provider = %provider, "Using LLM provider");
    let llm = create_client(provider, &config.llm)?;

    let mut session = Session::new(llm, provider, database, &config.pipeline)
        .with_connection_name(connection_name);

    let all_answered = match cli.question() {
        Some(question) => answer(&mut session, &question, format, cli.show_log).await?,
        None => {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            let mut all_answered = true;
            while let Some(line) = lines
                .next_line()
                .await
                .map_err(|e| AskError::internal(format!("Failed to read stdin: {e}")))?
            {
                let question = line.trim();
                if question.is_empty() {
                    continue;
                }
                if question == "/reset" {
                    session.reset();
                    continue;
                }
                all_answered &= answer(&mut session, question, format, cli.show_log).await?;
            }
            all_answered
        }
    };

    session.close().await?;
    Ok(all_answered)
}

/// Answers one question and prints the outcome.
async fn answer(
    session: &mut Session,
    question: &str,
    format: OutputFormat,
    show_log: bool,
) -> Result<bool> {
    let logged_before = session.log().entries().len();
    let outcome = session.ask(question).await;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&outcome)
                .map_err(|e| AskError::internal(format!("Failed to serialize outcome: {e}")))?;
            println!("{json}");
        }
        OutputFormat::Table => match &outcome {
            PipelineOutcome::Success { table, .. } => println!("{}\n", table.render_text()),
            PipelineOutcome::Failure {
                kind,
                message,
                technical,
                ..
            } => {
                warn!(kind = %kind, technical = %technical, "Question not answered");
                eprintln!("Error: {message}\n");
            }
        },
    }

    if show_log {
        for entry in session.log().entries().iter().skip(logged_before) {
            eprintln!("  {entry}");
        }
    }

    Ok(outcome.is_success())
}

/// Resolves the final connection configuration from CLI args, config file, and environment.
///
/// Precedence: CLI arguments, then the named connection, then the default
/// connection from the config file. Environment variables fill the gaps.
fn resolve_connection(cli: &Cli, config: &Config) -> Result<Option<ConnectionConfig>> {
    let mut connection = cli.to_connection_config()?;

    if connection.is_none() {
        if let Some(name) = cli.connection_name() {
            connection = config.get_connection(Some(name)).cloned();
            if connection.is_none() {
                return Err(AskError::config(format!(
                    "Connection '{}' not found in config file",
                    name
                )));
            }
        }
    }

    if connection.is_none() {
        connection = config.get_connection(None).cloned();
    }

    if let Some(ref mut conn) = connection {
        conn.apply_env_defaults();
        cli.apply_connection_overrides(conn);
    }

    Ok(connection)
}
