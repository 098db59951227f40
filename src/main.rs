//! Snapshots URLs on [archive.today](https://archive.today) and lists past
//! snapshots.

#![warn(
    clippy::all,
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_import_braces,
    unused_qualifications
)]

use std::{io, time::Duration};

use anyhow::{anyhow, Context, Result};
use archive_today::{
    config::{
        ARCHIVE_DOMAIN_ENV_VAR, DEFAULT_ARCHIVE_DOMAIN, DEFAULT_WIP_MAX_ATTEMPTS,
        MAX_POLLS_ENV_VAR, USER_AGENT_ENV_VAR,
    },
    ArchiveToday, Memento, RandomUserAgent, RenewPolicy, ReqwestTransport, Snapshot,
    SnapshotOptions, TimemapOptions, WipPollPolicy,
};
use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use env_logger::Env;

#[derive(Parser, Debug)]
#[clap(
    name = "archivetoday",
    about = "Asks archive.today to snapshot a URL, or lists past snapshots of it.",
    args_conflicts_with_subcommands = true
)]
struct CliArgs {
    /// URL to snapshot.
    #[clap()]
    url: Vec<String>,
    /// Only outputs the URL.
    #[clap(short, long)]
    quiet: bool,
    /// Asks archive.today to re-archive the link. Ignored if the link was
    /// archived too recently (roughly within the past hour).
    #[clap(short, long)]
    renew: bool,
    /// Doesn't wait for archiving to complete, and instead returns the URL
    /// (that will work shortly) as soon as possible.
    #[clap(short = 'c', long)]
    incomplete: bool,
    /// Gives up waiting for archiving after this many checks (0 waits
    /// forever).
    #[clap(long, env = MAX_POLLS_ENV_VAR, default_value_t = DEFAULT_WIP_MAX_ATTEMPTS)]
    max_polls: u32,
    /// Seconds between checks while waiting for archiving.
    #[clap(long, default_value_t = 1)]
    poll_interval: u64,
    #[clap(flatten)]
    connection: ConnectionArgs,
    /// Prints results as JSON.
    #[clap(long, global = true)]
    json: bool,
    /// Shows trace messages, including potentially sensitive HTTP data.
    #[clap(long, global = true)]
    trace: bool,
    #[clap(subcommand)]
    cmd: Option<CliCommand>,
}

#[derive(Debug, clap::Args)]
struct ConnectionArgs {
    /// Mirror to use (such as https://archive.vn). archive.today usually
    /// assigns a mirror itself.
    #[clap(long, env = ARCHIVE_DOMAIN_ENV_VAR, default_value = DEFAULT_ARCHIVE_DOMAIN)]
    domain: String,
    /// User agent override. Defaults to a random desktop browser. Without a
    /// browser-like user agent, renewing won't work.
    #[clap(long, env = USER_AGENT_ENV_VAR)]
    user_agent: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum CliCommand {
    /// Lists past snapshots of a URL.
    Timemap(TimemapSubcommand),
    /// Generates shell completions.
    #[clap(subcommand)]
    Completions(CompletionsSubcommand),
}

#[derive(Debug, clap::Args)]
struct TimemapSubcommand {
    /// URL to look up. Matched exactly except for the scheme.
    #[clap()]
    url: Vec<String>,
    #[clap(flatten)]
    connection: ConnectionArgs,
}

#[derive(Debug, Clone, clap::Subcommand)]
enum CompletionsSubcommand {
    Bash,
    Zsh,
}

fn joined_url(words: &[String]) -> Result<String> {
    let url = words.join(" ");
    if url.is_empty() {
        return Err(anyhow!("missing URL, see --help"));
    }
    Ok(url)
}

fn print_snapshot(
    snapshot: &Snapshot,
    quiet: bool,
    json: bool,
    out: &mut impl io::Write,
) -> Result<()> {
    if json {
        serde_json::to_writer_pretty(&mut *out, snapshot)?;
        writeln!(out)?;
        return Ok(());
    }
    if quiet {
        writeln!(out, "{}", snapshot.url)?;
        return Ok(());
    }

    writeln!(out)?;
    writeln!(out, "Snapshot: {}", snapshot.url)?;
    if let Some(wip) = &snapshot.wip {
        writeln!(out, "WIP: {}", wip)?;
    }
    if let Some(cached_date) = &snapshot.cached_date {
        writeln!(out, "Originally saved at {}", cached_date)?;
        writeln!(out)?;
        writeln!(
            out,
            "- Re-invoke this command with the --renew flag to ask archive.today to archive the present version of your link."
        )?;
    }
    Ok(())
}

fn print_mementos(mementos: &[Memento], json: bool, out: &mut impl io::Write) -> Result<()> {
    if json {
        serde_json::to_writer_pretty(&mut *out, mementos)?;
        writeln!(out)?;
        return Ok(());
    }
    for memento in mementos {
        writeln!(out, "{}: {}", memento.date, memento.url)?;
    }
    Ok(())
}

async fn run_snapshot(args: &CliArgs, archive: &ArchiveToday<'_>) -> Result<()> {
    let url = joined_url(&args.url)?;
    if !args.quiet && !args.json {
        println!("Snapshotting {}...", url);
    }

    let snapshot = archive
        .snapshot(&SnapshotOptions {
            url: &url,
            archive_domain: Some(args.connection.domain.as_str()),
            user_agent: args.connection.user_agent.as_deref(),
            renew: RenewPolicy::from(args.renew),
            complete: !args.incomplete,
            wip_poll: WipPollPolicy {
                interval: Duration::from_secs(args.poll_interval),
                max_attempts: (args.max_polls > 0).then(|| args.max_polls),
            },
        })
        .await
        .with_context(|| format!("failed to snapshot {}", url))?;

    print_snapshot(&snapshot, args.quiet, args.json, &mut io::stdout())
}

/// Returns `false` if the URL has never been archived.
async fn run_timemap_subcommand(
    cmd: &TimemapSubcommand,
    json: bool,
    archive: &ArchiveToday<'_>,
) -> Result<bool> {
    let url = joined_url(&cmd.url)?;
    let mementos = archive
        .timemap(&TimemapOptions {
            url: &url,
            archive_domain: Some(cmd.connection.domain.as_str()),
            user_agent: cmd.connection.user_agent.as_deref(),
        })
        .await
        .with_context(|| format!("failed to retrieve timemap for {}", url))?;

    if mementos.is_empty() {
        eprintln!("{} has not been archived yet.", url);
        return Ok(false);
    }
    print_mementos(&mementos, json, &mut io::stdout())?;
    Ok(true)
}

fn run_completions_subcommand(cmd: &CompletionsSubcommand, buf: &mut impl io::Write) {
    let shell = match cmd {
        CompletionsSubcommand::Bash => Shell::Bash,
        CompletionsSubcommand::Zsh => Shell::Zsh,
    };
    clap_complete::generate(shell, &mut CliArgs::command(), "archivetoday", buf);
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let default_log_level = if args.trace { "trace" } else { "info" };
    let mut log_builder =
        env_logger::Builder::from_env(Env::default().default_filter_or(default_log_level));
    if args.trace {
        log_builder.filter_module("reqwest", log::LevelFilter::Trace);
    }
    log_builder.init();

    let transport = ReqwestTransport::new(args.trace)?;
    let archive = ArchiveToday::new(&transport, &RandomUserAgent);

    match &args.cmd {
        None => run_snapshot(&args, &archive).await?,
        Some(CliCommand::Timemap(cmd)) => {
            if !run_timemap_subcommand(cmd, args.json, &archive).await? {
                std::process::exit(1);
            }
        }
        Some(CliCommand::Completions(cmd)) => run_completions_subcommand(cmd, &mut io::stdout()),
    }

    Ok(())
}
