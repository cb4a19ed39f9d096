//! CLI probe for `linkzy_core`.
//!
//! # Responsibility
//! - Verify core linkage (`ping`, `version`).
//! - Derive a pair key and print the default config for local debugging.

use clap::{Parser, Subcommand};
use linkzy_core::{derive_pair_key, CoreConfig, UserId};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "linkzy_cli")]
#[command(about = "Linkzy core probe")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the core library links (default)
    Ping,
    /// Print the shared scope key of two users
    PairKey {
        /// First user id
        first: String,
        /// Second user id
        second: String,
    },
    /// Print the default `linkzy.toml`
    DefaultConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli.command.unwrap_or(Command::Ping)) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<String, String> {
    match command {
        Command::Ping => Ok(format!(
            "linkzy_core ping={} version={}",
            linkzy_core::ping(),
            linkzy_core::core_version()
        )),
        Command::PairKey { first, second } => {
            let first = UserId::parse(&first).map_err(|err| format!("first uid: {err}"))?;
            let second = UserId::parse(&second).map_err(|err| format!("second uid: {err}"))?;
            Ok(derive_pair_key(&first, &second).to_string())
        }
        Command::DefaultConfig => CoreConfig::default()
            .to_toml()
            .map_err(|err| err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::{run, Cli, Command};
    use clap::Parser;

    fn run_args(args: &[&str]) -> Result<String, String> {
        let cli = Cli::try_parse_from(std::iter::once("linkzy_cli").chain(args.iter().copied()))
            .map_err(|err| err.to_string())?;
        run(cli.command.unwrap_or(Command::Ping))
    }

    #[test]
    fn no_arguments_pings() {
        let output = run_args(&[]).unwrap();
        assert!(output.starts_with("linkzy_core ping="));
        assert_eq!(output, run_args(&["ping"]).unwrap());
    }

    #[test]
    fn pair_key_is_order_independent() {
        assert_eq!(run_args(&["pair-key", "u2", "u1"]).unwrap(), "u1_u2");
        assert_eq!(run_args(&["pair-key", "u1", "u2"]).unwrap(), "u1_u2");
    }

    #[test]
    fn invalid_uid_and_unknown_command_fail() {
        assert!(run_args(&["pair-key", "a_b", "c"]).is_err());
        assert!(run_args(&["pair-key", "a"]).is_err());
        assert!(run_args(&["bogus"]).is_err());
    }

    #[test]
    fn default_config_mentions_every_section() {
        let text = run_args(&["default-config"]).unwrap();
        for section in ["[storage]", "[logging]", "[editor]"] {
            assert!(text.contains(section), "{section}");
        }
    }
}
