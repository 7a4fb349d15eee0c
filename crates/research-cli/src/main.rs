//! Submit a meeting research request and follow its progress in the terminal.

mod render;

use std::process::ExitCode;

use anyhow::Context as _;
use chrono::{NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand};
use research_stream::observability::init_observability;
use research_stream::prelude::*;

use crate::render::{OutputFormat, Renderer};

#[derive(Parser, Debug)]
#[command(name = "research-cli", version, about)]
struct Cli {
    /// Base URL of the workflow service (overrides RESEARCH_API_URL).
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    output: OutputFormat,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Research the meetings found in the calendar on a date.
    Auto {
        /// Day to look up (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Emails to leave out, separated by commas or semicolons.
        #[arg(long, default_value = "")]
        exclude_emails: String,
    },
    /// Research a company and attendees entered by hand.
    Manual {
        #[arg(long)]
        company: String,
        /// Attendee names, separated by commas or semicolons.
        #[arg(long, default_value = "")]
        attendees: String,
    },
}

impl Mode {
    fn into_request(self) -> ResearchRequest {
        match self {
            Mode::Auto {
                date,
                exclude_emails,
            } => {
                let day = date.unwrap_or_else(|| Utc::now().date_naive());
                ResearchRequest::automatic(
                    day.and_time(NaiveTime::MIN).and_utc(),
                    split_list(&exclude_emails),
                )
            }
            Mode::Manual { company, attendees } => {
                ResearchRequest::manual(company, split_list(&attendees))
            }
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    research_stream::config::load_dotenv();
    init_observability("warn");
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config = ClientConfig::from_env().context("invalid configuration")?;
    if let Some(url) = cli.api_url {
        config = config.base_url(url);
    }
    let client = ResearchClient::from_config(config).context("failed to build client")?;

    let mut run = client
        .submit(cli.mode.into_request())
        .await
        .context("failed to submit request")?;
    tracing::info!(request_id = %run.request_id(), "request submitted");

    let abort = run.abort_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            abort.abort();
        }
    });

    let mut renderer = Renderer::new(std::io::stdout().lock(), cli.output);
    while let Some(state) = run.next_state().await {
        renderer.render(&state).context("failed to write output")?;
    }
    let state = run.finish().await?;
    Ok(exit_code(&state))
}

fn exit_code(state: &StreamState) -> ExitCode {
    match state.phase {
        Phase::SettledOk if state.final_result.is_some() => ExitCode::SUCCESS,
        Phase::SettledOk => ExitCode::from(2),
        _ => ExitCode::FAILURE,
    }
}
