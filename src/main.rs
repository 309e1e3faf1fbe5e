use chrono::Utc;
use clap::Parser;
use dotenv::dotenv;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::IsTerminal;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use github_file_finding::{
    Args, CancelToken, FindError, Finder, GitHubClient, Output, OutputOptions,
};

const EXIT_FAILURE: u8 = 1;
const EXIT_CANCELED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(FindError::Canceled) => ExitCode::from(EXIT_CANCELED),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

async fn run(args: Args) -> Result<(), FindError> {
    let opts = args.search_options(Utc::now())?;
    let client_opts = args.client_options()?;

    let colorize = args.color.enabled(std::io::stdout().is_terminal());
    colored::control::set_override(colorize);
    let output_opts = OutputOptions {
        colorize,
        hyperlinks: args.hyperlink.enabled(colorize),
        host: client_opts.host.clone(),
    };

    let mut output = Output::stdio(output_opts);
    if args.progress {
        output = output.with_progress(progress_bar());
    }

    let client = GitHubClient::new(client_opts)?;
    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Interrupted, canceling search");
            on_interrupt.cancel();
        }
    });

    let finder = Finder::new(Arc::new(client), Arc::new(output), cancel);
    let summary = finder.find(&opts).await?;
    debug!(
        "Done: {} repositories, {} failed, {} matches",
        summary.repositories, summary.failed, summary.matches
    );
    Ok(())
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr());
    match ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {wide_msg}")
    {
        Ok(style) => pb.set_style(style.progress_chars("=>-")),
        Err(e) => warn!("Invalid progress template: {}", e),
    }
    pb.set_message("repositories");
    pb
}
