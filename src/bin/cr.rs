// src/bin/cr.rs

use anyhow::Result;
use clap::Parser;
use colorizer::cli::Cli;
use colorizer::constants::{DEFAULT_OPTIONS, FAULT_EXIT_CODE, OPTIONS_ENV_VAR};
use colorizer::core::options::Options;
use colorizer::error::ColorizerError;
use colorizer::system::session::{self, SessionConfig};
use colorizer::t;
use std::env;
use std::io;

/// The main entry point of `cr`.
/// It sets up logging, resolves options, runs the session, and performs centralized error
/// handling: any failure of `cr` itself becomes one diagnostic line and exit code 255.
fn main() {
    env_logger::init();

    match run_cli(Cli::parse()) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            let code = e
                .downcast_ref::<ColorizerError>()
                .map_or(-2, ColorizerError::code);
            eprintln!("({}) {}", code, e);
            std::process::exit(FAULT_EXIT_CODE);
        }
    }
}

fn run_cli(cli: Cli) -> Result<i32> {
    log::debug!("CLI args parsed: {:?}", cli);

    if cli.args.is_empty() {
        println!("{}", Cli::help_text());
        return Ok(0);
    }

    let env_options = env::var_os(OPTIONS_ENV_VAR).map(|value| value.to_string_lossy().into_owned());
    let config = resolve_config(env_options, &cli.args)?;
    log::debug!("Resolved session: {:?}", config);

    Ok(session::run(&config)?)
}

/// Applies `CR_OPTS` (or its default) and the leading command-line options.
/// When `CR_OPTS` is unset, the default is also exported to the child.
fn resolve_config(env_options: Option<String>, args: &[String]) -> Result<SessionConfig, ColorizerError> {
    let mut options = Options::default();
    let mut child_env = Vec::new();

    let env_string = env_options.unwrap_or_else(|| {
        child_env.push((OPTIONS_ENV_VAR.to_string(), DEFAULT_OPTIONS.to_string()));
        DEFAULT_OPTIONS.to_string()
    });
    for problem in options.apply_env_string(&env_string) {
        log::warn!("{}: {}", OPTIONS_ENV_VAR, problem);
    }

    let (command, problems) = options.apply_args(args);
    for problem in problems {
        log::warn!("{}", problem);
    }

    if command.is_empty() {
        return Err(ColorizerError::Launch {
            context: t!("config.error.no_command").to_string(),
            api: "spawn",
            source: io::Error::new(io::ErrorKind::InvalidInput, "empty command line"),
        });
    }

    let mut config = SessionConfig::new(options, command.to_vec());
    config.child_env = child_env;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use colorizer::core::color::Attr;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_default_options_color_stderr_red_and_reach_the_child() {
        let config = resolve_config(None, &args(&["make", "all"])).unwrap();
        assert_eq!(config.options.stderr_color, Attr::new(0x04));
        assert_eq!(config.command, ["make", "all"]);
        assert_eq!(
            config.child_env,
            [(OPTIONS_ENV_VAR.to_string(), DEFAULT_OPTIONS.to_string())]
        );
    }

    #[test]
    fn test_env_options_replace_the_default() {
        let config = resolve_config(Some("-o$0A -l".to_string()), &args(&["-e12", "prog"])).unwrap();
        assert_eq!(config.options.stdout_color, Attr::new(0x0A));
        assert_eq!(config.options.stderr_color, Attr::new(12));
        assert!(config.options.line_mode);
        assert!(config.child_env.is_empty());
    }

    #[test]
    fn test_options_without_command_is_a_launch_error() {
        let err = resolve_config(None, &args(&["-l", "-s"])).unwrap_err();
        assert!(matches!(err, ColorizerError::Launch { .. }));
        assert_eq!(err.code(), -2);
    }
}
