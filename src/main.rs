#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! # retos
//!
//! Command line front end for the challenge grader. Challenges are read from
//! a JSON file or looked up in the configured store; attempts are saved to
//! Supabase when `SUPABASE_URL` and `SUPABASE_ANON_KEY` are set, and kept in
//! memory otherwise.

use std::path::Path;

use anyhow::{Context, Result, bail};
use bpaf::*;
use colored::Colorize;
use dotenvy::dotenv;
use retos::{
    AttemptStore, Backend, Challenge, ChallengeId, ChallengeSession, Grader, MemoryStore,
    RhaiSynthesizer, StoreError, config,
    grade::{GradeResult, LineKind},
    progress,
};
use tabled::{
    Table, Tabled,
    settings::{Panel, Style},
};
use tracing::{Level, metadata::LevelFilter};
use tracing_subscriber::{fmt, prelude::*, util::SubscriberInitExt};

/// Top-level CLI commands.
#[derive(Debug, Clone)]
enum Cmd {
    /// Grade a source file against a challenge
    Run(String, String),
    /// Show the source a session would start from
    Show(String),
    /// Check a challenge file for malformed test cases
    Check(String),
    /// List the current user's attempts
    History,
    /// Rank users by challenges solved
    Ranking,
}

/// Parse the command line arguments and return a `Cmd` enum
fn options() -> Cmd {
    /// parses a challenge file path or id
    fn c() -> impl Parser<String> {
        positional("CHALLENGE").help("Path to a challenge JSON file, or a challenge id")
    }

    /// parses the path of the source to grade
    fn s() -> impl Parser<String> {
        positional("SOURCE").help("Path to the file holding your solution")
    }

    /// parses a challenge file path
    fn f() -> impl Parser<String> {
        positional("FILE").help("Path to a challenge JSON file")
    }

    let run = construct!(Cmd::Run(c(), s()))
        .to_options()
        .command("run")
        .help("Run your solution against the challenge's test cases");

    let show = construct!(Cmd::Show(c()))
        .to_options()
        .command("show")
        .help("Print the challenge and the code you would start from");

    let check = construct!(Cmd::Check(f()))
        .to_options()
        .command("check")
        .help("Check a challenge file for malformed test cases");

    let history = pure(Cmd::History)
        .to_options()
        .command("history")
        .help("List your previous attempts");

    let ranking = pure(Cmd::Ranking)
        .to_options()
        .command("ranking")
        .help("Show users ranked by challenges solved");

    let cmd = construct!([run, show, check, history, ranking]);

    cmd.to_options()
        .descr("Grader for small coding challenges")
        .run()
}

/// Picks the configured store, falling back to an in-memory one.
fn backend() -> Backend {
    match config::supabase_store() {
        Some(store) => Backend::Supabase(store),
        None => {
            tracing::warn!(
                "SUPABASE_URL and SUPABASE_ANON_KEY are not set; attempts are kept in memory only."
            );
            Backend::Memory(MemoryStore::new())
        }
    }
}

/// Reads a challenge definition from a JSON file.
fn read_challenge_file(path: &Path) -> Result<Challenge> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Could not read challenge file: {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Could not parse challenge file: {}", path.display()))
}

/// Resolves `arg` to a challenge: a JSON file if such a path exists, a store
/// lookup otherwise. The id is tried as text first, then as an integer.
async fn resolve_challenge(store: &Backend, arg: &str) -> Result<Challenge> {
    let path = Path::new(arg);
    if path.is_file() {
        return read_challenge_file(path);
    }

    for id in ChallengeId::lookup_candidates(arg) {
        match store.fetch_challenge(&id).await {
            Ok(challenge) => return Ok(challenge),
            Err(StoreError::NotFound(_)) => continue,
            Err(err) => return Err(err).with_context(|| format!("Could not load challenge {id}")),
        }
    }

    bail!("No challenge has the id `{arg}`")
}

/// Opens a session for the configured user on `arg`.
async fn open_session(arg: &str) -> Result<ChallengeSession<Backend>> {
    let store = backend();
    let challenge = resolve_challenge(&store, arg).await?;
    let grader = Grader::new(RhaiSynthesizer::from_config());
    Ok(ChallengeSession::open(store, grader, config::user_id(), challenge).await)
}

/// Prints the lines of a grade result, coloured by kind.
fn print_result(result: &GradeResult) {
    for line in result.lines() {
        let line = match LineKind::classify(&line) {
            LineKind::Pass => line.green(),
            LineKind::Fail => line.red(),
            LineKind::MalformedCase => line.magenta(),
            LineKind::RuntimeError | LineKind::SynthesisFailure => line.yellow(),
            LineKind::Unknown => line.normal(),
        };
        println!("{line}");
    }
    for warning in result.warnings() {
        eprintln!("{}", warning.yellow());
    }
}

/// Row of the history table.
#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "Challenge")]
    /// Challenge id
    challenge: String,
    #[tabled(rename = "When")]
    /// Storage timestamp
    when:      String,
    #[tabled(rename = "Passed")]
    /// Passing lines out of all lines
    passed:    String,
    #[tabled(rename = "Solved")]
    /// Solved marker
    solved:    String,
}

/// Row of the ranking table.
#[derive(Tabled)]
struct RankingRow {
    #[tabled(rename = "#")]
    /// Position
    position:  usize,
    #[tabled(rename = "User")]
    /// User id
    user:      String,
    #[tabled(rename = "Completed")]
    /// Distinct challenges solved
    completed: usize,
    #[tabled(rename = "Last solved")]
    /// Storage timestamp of the latest solve
    last:      String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let fmt = fmt::layer()
        .without_time()
        .with_file(false)
        .with_line_number(false);
    let filter_layer = LevelFilter::from_level(Level::INFO);
    tracing_subscriber::registry()
        .with(fmt)
        .with(filter_layer)
        .init();

    config::ensure_initialized()?;

    match options() {
        Cmd::Run(challenge, source_path) => {
            let source = std::fs::read_to_string(&source_path)
                .with_context(|| format!("Could not read source file: {source_path}"))?;
            let mut session = open_session(&challenge).await?;

            if session.is_solved() {
                println!("{}", "✅ You already solved this challenge:".green());
                println!("{}", session.source());
                return Ok(());
            }

            session.edit(source)?;
            let result = session.run().await?;
            print_result(&result);

            if result.solved() {
                println!("{}", "✅ Challenge solved!".green().bold());
            }
        }
        Cmd::Show(challenge) => {
            let session = open_session(&challenge).await?;
            let challenge = session.challenge();
            println!("{}", challenge.title.bold());
            if !challenge.description.is_empty() {
                println!("{}\n", challenge.description);
            }
            if session.is_solved() {
                println!("{}", "✅ You already solved this challenge.".green());
            }
            println!("{}", session.source());
        }
        Cmd::Check(file) => {
            let challenge = read_challenge_file(Path::new(&file))?;
            let problems = challenge.problems();
            if challenge.test_cases.is_empty() {
                eprintln!("{}", "Challenge has no test cases; any callable solves it.".yellow());
            }
            if problems.is_empty() {
                println!("{} test cases look fine.", challenge.test_cases.len());
            } else {
                for (index, problem) in problems {
                    println!("{}", format!("Case {index}: {problem}").magenta());
                }
            }
        }
        Cmd::History => {
            let store = backend();
            let user = config::user_id();
            let records = store.list_attempts(Some(&user)).await?;
            let rows = progress::history(&records, &user)
                .into_iter()
                .map(|entry| HistoryRow {
                    challenge: entry.challenge_id.to_string(),
                    when:      entry.created_at.unwrap_or_else(|| "-".to_string()),
                    passed:    format!("{}/{}", entry.passed, entry.total),
                    solved:    if entry.solved { "✅".to_string() } else { String::new() },
                })
                .collect::<Vec<_>>();

            let challenges = store.list_challenges().await?;
            let summary = progress::progress(&records, &user, &challenges);
            println!(
                "{}",
                Table::new(rows)
                    .with(Panel::header(format!("Attempts by {user}")))
                    .with(Panel::footer(format!(
                        "Solved {}/{} ({:.0}%)",
                        summary.solved,
                        summary.total,
                        summary.percent()
                    )))
                    .with(Style::modern())
            );
        }
        Cmd::Ranking => {
            let store = backend();
            let rows = store
                .fetch_ranking()
                .await
                .context("Could not load the ranking")?
                .into_iter()
                .enumerate()
                .map(|(i, entry)| RankingRow {
                    position:  i + 1,
                    user:      entry.display_name(),
                    completed: entry.completed,
                    last:      entry.last_solved_at.unwrap_or_else(|| "-".to_string()),
                })
                .collect::<Vec<_>>();

            if rows.is_empty() {
                println!("Nobody has solved a challenge yet.");
            } else {
                println!(
                    "{}",
                    Table::new(rows)
                        .with(Panel::header("Ranking"))
                        .with(Style::modern())
                );
            }
        }
    }

    Ok(())
}
