mod cache;
mod config;
mod interceptor;
mod net;
mod notify;
mod pages;
mod queue;
mod store;
mod sync;
mod worker;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use sync::SyncTrigger;
use worker::Worker;

#[derive(Parser, Debug)]
#[command(name = "faro")]
#[command(about = "Offline resilience runtime: response caches, a durable mutation queue, background sync")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/faro/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Precache the shell manifest into the current shell namespace
  Install,
  /// Prune stale cache namespaces and claim open pages
  Activate,
  /// Drain pending mutations (manual retry entry point)
  Sync {
    /// Restrict the drain to one sync tag (e.g. sync-login)
    #[arg(short, long)]
    tag: Option<String>,
  },
  /// Full lifecycle: install, activate, then drain everything
  Run,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let (writer, _guard) = tracing_appender::non_blocking(std::io::stderr());
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(writer)
    .init();

  let args = Args::parse();

  let config = config::Config::load(args.config.as_deref())?;
  let worker = Worker::open(config)?;

  match args.command {
    Command::Install => worker.install().await?,
    Command::Activate => worker.activate().await?,
    Command::Sync { tag } => {
      let trigger = match tag.as_deref() {
        Some(tag) => {
          SyncTrigger::from_tag(tag).ok_or_else(|| eyre!("Unknown sync tag: {}", tag))?
        }
        None => SyncTrigger::All,
      };
      report(&worker.sync(trigger).await?);
    }
    Command::Run => {
      worker.install().await?;
      worker.activate().await?;
      report(&worker.sync(SyncTrigger::All).await?);
    }
  }

  Ok(())
}

fn report(report: &sync::DrainReport) {
  println!("{}", render_report(report));
}

fn render_report(report: &sync::DrainReport) -> String {
  if report.skipped {
    // Otherwise a lost single-flight race reads like an empty queue
    return "skipped: a drain is already in progress".to_string();
  }
  format!(
    "{} delivered, {} retained, {} dead",
    report.delivered, report.retained, report.dead
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use sync::DrainReport;

  #[test]
  fn drain_reports_render_their_tallies() {
    let report = DrainReport {
      delivered: 2,
      retained: 1,
      dead: 0,
      skipped: false,
    };
    assert_eq!(render_report(&report), "2 delivered, 1 retained, 0 dead");
  }

  #[test]
  fn skipped_drains_say_so() {
    let report = DrainReport {
      skipped: true,
      ..DrainReport::default()
    };
    assert_eq!(render_report(&report), "skipped: a drain is already in progress");
  }
}
