//! gitweave command line.
//!
//! Runs one workflow against the enclosing repository and prints the result
//! as JSON.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::io::{IsTerminal, Read};
use std::path::PathBuf;

use gitweave::application::bisect::parse_progress;
use gitweave::application::review::fetch_threads;
use gitweave::application::{SyncOptions, SyncPipeline, load_todo};
use gitweave::infra::app_config::{AppConfig, load_config};
use gitweave::infra::diff::collect_markers_from_text;
use gitweave::infra::git::Git;
use gitweave::infra::process::Gateway;
use gitweave::infra::repo::detect_git_repo;
use gitweave::infra::vcs::github::{Gh, parse_pr_ref};

#[derive(Parser, Debug)]
#[command(name = "gitweave")]
#[command(version)]
#[command(about = "Structured git and GitHub workflows", long_about = None)]
struct Args {
    /// Repository to run in (defaults to the one enclosing the current directory)
    #[arg(short = 'C', long, global = true)]
    repo: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse a unified diff into file and hunk markers
    Markers {
        /// Diff against this rev instead of reading stdin
        rev: Option<String>,

        /// Lines rendered above the diff
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },

    /// Show the review threads of a pull request
    Threads {
        /// PR reference (owner/repo#number or URL)
        pr_ref: String,
    },

    /// Print the rebase instruction list for base..HEAD
    Todo {
        /// Base to rebase onto
        base: String,
    },

    /// Read `git bisect` output from stdin and report the first bad commit
    FirstBad,

    /// Fetch, pull and push
    Sync {
        /// Branch to sync (defaults to the current branch's upstream)
        #[arg(long)]
        branch: Option<String>,

        /// Pull with --rebase
        #[arg(long)]
        rebase: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = load_config();
    let gateway = Gateway::system();
    let git = git_for(&config, args.repo.or_else(detect_git_repo));

    match args.command {
        Commands::Markers { rev, offset } => {
            let diff = match rev {
                Some(rev) => run_git_diff(&gateway, &git, Some(&rev)).await?,
                None => match try_read_stdin()? {
                    Some(diff) => diff,
                    None => run_git_diff(&gateway, &git, None).await?,
                },
            };
            print_json(&collect_markers_from_text(&diff, offset))?;
        }
        Commands::Threads { pr_ref } => {
            let pr = parse_pr_ref(&pr_ref).with_context(|| {
                format!("Invalid PR reference '{pr_ref}'. Expected owner/repo#number or URL.")
            })?;
            let gh = Gh::new(config.gh_program());
            let threads = fetch_threads(&gateway, &gh, &pr)
                .await
                .with_context(|| format!("Failed to load review comments for {pr}"))?;
            print_json(&threads)?;
        }
        Commands::Todo { base } => {
            let todo = load_todo(&gateway, &git, &base).await?;
            if todo.is_empty() {
                bail!("No commits between {base} and HEAD");
            }
            print!("{}", todo.build());
        }
        Commands::FirstBad => {
            let output = try_read_stdin()?.context("Pipe `git bisect` output into stdin")?;
            print_json(&parse_progress(&output))?;
        }
        Commands::Sync { branch, rebase } => {
            let options = SyncOptions {
                branch,
                pull_rebase: rebase || config.pull_rebase,
                ..SyncOptions::from(&config)
            };
            let mut pipeline = SyncPipeline::new(git, options);
            let outcome = pipeline
                .run(&gateway, |step| {
                    if let Ok(line) = serde_json::to_string(step) {
                        println!("{line}");
                    }
                })
                .await;
            print_json(&outcome)?;
            if !outcome.is_success() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn git_for(config: &AppConfig, repo: Option<PathBuf>) -> Git {
    let mut git = Git::new(config.git_program());
    if let Some(editor) = &config.rebase_editor {
        git = git.with_editor(editor.clone());
    }
    match repo {
        Some(root) => git.in_dir(root),
        None => git,
    }
}

async fn run_git_diff(gateway: &Gateway, git: &Git, rev: Option<&str>) -> Result<String> {
    let output = gateway
        .run(git.diff(rev))
        .await?
        .into_checked()
        .context("git diff failed")?;
    Ok(output.stdout)
}

/// Stdin contents when something was piped in.
fn try_read_stdin() -> Result<Option<String>> {
    if std::io::stdin().is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    std::io::stdin()
        .read_to_string(&mut buffer)
        .context("Failed to read from stdin")?;
    Ok((!buffer.is_empty()).then_some(buffer))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}
