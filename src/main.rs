use std::io::Read;
use std::path::Path;

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use redline::cli::{Cli, CliCommand};
use redline::config::Config;
use redline::error::{Error, Result};
use redline::git::Git;
use redline::overlay::{OverlayLauncher, OverlaySettings, SystemEnvironment};
use redline::plan::PlanReview;
use redline::prompts::PromptEngine;
use redline::review::{GitReview, ReviewOutcome};
use redline::self_test;

fn init_logging() {
    let filter = EnvFilter::try_from_env("REDLINE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_logging();

    let config = match Config::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    debug!(?config, "config loaded");

    if cli.self_test {
        let prompts = PromptEngine::new(Some(config.prompts_dir.clone()));
        let checks = self_test::run_checks(&SystemEnvironment, &prompts);
        for check in &checks {
            println!("{check}");
        }
        std::process::exit(if self_test::all_passed(&checks) { 0 } else { 1 });
    }

    let Some(command) = cli.command else {
        eprintln!("error: specify a command (plan, review) or --self-test");
        std::process::exit(1);
    };

    match run(command, &config).await {
        Ok(()) => {}
        Err(Error::Interrupted) => {
            eprint!("\r\x1b[K");
            std::process::exit(130);
        }
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

async fn run(command: CliCommand, config: &Config) -> Result<()> {
    let launcher = OverlayLauncher::new(SystemEnvironment, OverlaySettings::from_config(config));

    match command {
        CliCommand::Plan { plan_file } => {
            let prompts = PromptEngine::new(Some(config.prompts_dir.clone()));
            let review = PlanReview {
                launcher: &launcher,
                prompts: &prompts,
                context_lines: config.context_lines,
            };

            match plan_file {
                Some(path) => {
                    if let Some(diff) = review.run_file(Path::new(&path)).await? {
                        print!("{diff}");
                    }
                }
                None => {
                    let mut input = String::new();
                    if let Err(e) = std::io::stdin().read_to_string(&mut input) {
                        debug!("failed to read hook event from stdin: {e}");
                        input.clear();
                    }
                    println!("{}", review.run_hook(&input).await?);
                }
            }
        }
        CliCommand::Review { base_ref, clean } => {
            let git = Git::new(std::env::current_dir()?);
            let review = GitReview {
                git: &git,
                launcher: &launcher,
                review_root: &config.review_root,
            };

            if clean {
                let repo = review.repo();
                if repo.remove()? {
                    eprintln!("removed {}", repo.dir().display());
                } else {
                    eprintln!("no review repo to clean");
                }
                return Ok(());
            }

            match review.run(base_ref.as_deref()).await? {
                ReviewOutcome::NothingToReview => eprintln!("no changes to review"),
                ReviewOutcome::Unchanged => info!("review closed without annotations"),
                ReviewOutcome::Annotated(annotations) => println!("{annotations}"),
            }
        }
    }

    Ok(())
}
