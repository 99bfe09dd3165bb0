use crate::commands::{run_cascade, run_check_window, CascadeArgs, CheckWindowArgs};
use crate::demo::{run_demo, DemoArgs};
use clap::{Parser, Subcommand};
use nijobs_offers::config::AppConfig;
use nijobs_offers::error::AppError;
use nijobs_offers::telemetry;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "nijobs-offers",
    about = "Inspect and exercise offer admission and visibility rules from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Walk through admission, moderation, and archiving on an in-memory store (default command)
    Demo(DemoArgs),
    /// Evaluate whether a company may publish another offer during a window
    CheckWindow(CheckWindowArgs),
    /// Apply a company moderation cascade to a JSON snapshot
    Cascade(CascadeArgs),
}

pub(crate) fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let policy = config.offers.policy();
    info!(
        environment = ?config.environment,
        max_concurrent = policy.max_concurrent(),
        max_lifetime_months = policy.max_lifetime_months(),
        "configuration loaded"
    );

    let command = cli
        .command
        .unwrap_or_else(|| Command::Demo(DemoArgs::default()));

    match command {
        Command::Demo(args) => run_demo(args, policy),
        Command::CheckWindow(args) => run_check_window(args, policy),
        Command::Cascade(args) => run_cascade(args, policy),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_check_window_arguments() {
        let cli = Cli::try_parse_from([
            "nijobs-offers",
            "check-window",
            "--snapshot",
            "snapshot.json",
            "--company",
            "acme",
            "--start",
            "2025-01-08",
            "--end",
            "2025-01-15T12:00:00Z",
        ])
        .expect("arguments parse");

        match cli.command {
            Some(Command::CheckWindow(args)) => {
                assert_eq!(args.company, "acme");
                assert!(args.exclude.is_none());
                assert!(args.start < args.end);
            }
            other => panic!("expected check-window, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_cascade_event() {
        let result = Cli::try_parse_from([
            "nijobs-offers",
            "cascade",
            "--snapshot",
            "snapshot.json",
            "--company",
            "acme",
            "--event",
            "suspended",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn defaults_to_demo() {
        let cli = Cli::try_parse_from(["nijobs-offers"]).expect("arguments parse");
        assert!(cli.command.is_none());
    }
}
