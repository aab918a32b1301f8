mod cli;
mod generate;

use cli::{CliError, CliOptions};
use generate::{Outcome, run_generation};
use studio_core::load_dotenv;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() {
    let options = match CliOptions::parse(std::env::args().skip(1)) {
        Ok(options) => options,
        Err(CliError::HelpRequested) => {
            print_usage();
            std::process::exit(0);
        }
        Err(err) => {
            eprintln!("error: {err}");
            eprintln!();
            print_usage();
            std::process::exit(2);
        }
    };

    if let Err(err) = load_dotenv() {
        eprintln!("{err}");
        std::process::exit(2);
    }
    init_tracing(options.json_logs);

    let token = CancellationToken::new();
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("interrupt received, cancelling generation");
            ctrl_c_token.cancel();
        }
    });

    let outcome = match run_generation(&options, &token).await {
        Ok(outcome) => outcome,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(2);
        }
    };

    match &outcome {
        Outcome::Generated(response) => {
            match serde_json::to_string_pretty(&response.output) {
                Ok(rendered) => println!("{rendered}"),
                Err(_) => println!("{}", response.output),
            }
            if let Some(usage) = &response.usage {
                eprintln!(
                    "model={} tokens={} (prompt {}, completion {})",
                    response.model,
                    usage.total_tokens,
                    usage.prompt_tokens,
                    usage.completion_tokens
                );
            }
        }
        Outcome::Failed(notice) => eprintln!("{}", notice.message),
    }

    std::process::exit(outcome.exit_code());
}

fn init_tracing(json_logs: bool) {
    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "copy_gen=info,studio_core=info".to_string());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json_logs {
        builder.json().flatten_event(true).init();
    } else {
        builder.init();
    }
}

fn print_usage() {
    eprintln!(
        "Usage: cargo run -p copy-gen -- --product <description> [--shop <id>] [--max-attempts <n>] [--json-logs]\n\
         \n\
         Generates a listing title, tags and description through OpenRouter.\n\
         \n\
         Environment:\n\
         - OPENROUTER_API_KEY (required), OPENROUTER_MODEL, OPENROUTER_TIMEOUT_MS\n\
         - RETRY_MAX_ATTEMPTS, RETRY_INITIAL_DELAY_MS, RETRY_BACKOFF_MULTIPLIER, RETRY_MAX_DELAY_MS\n\
         - BILLING_ERROR_STATUSES, BILLING_ERROR_CODES, BILLING_ERROR_MESSAGE_MARKERS\n\
         \n\
         Exit codes: 0 generated, 1 billing/quota problem, 2 other failure, 130 cancelled"
    );
}
