//! Command-line capture for `cr`. Options and the command are parsed by hand afterwards, so
//! clap only collects the raw arguments and renders the help.

use crate::core::color::Attr;
use crate::core::options::Options;
use crate::core::terminal::{AnsiTerminal, TerminalPort};
use crate::system::relay::write_lines;
use clap::{CommandFactory, Parser};

/// Option sets shown in the usage examples, each with the output it produces.
const EXAMPLES: &[&str] = &["-o$05 -e$89", "-o$05 -e$89 -l", "-o$05 -e$89 -l -s"];

/// Builds the dynamic, color-aware full help string at runtime.
fn build_help_string() -> &'static str {
    // A mini-renderer for the semantic help template: tags become escape sequences.
    let use_colors = colored::control::SHOULD_COLORIZE.should_colorize();

    let template = t!("cli.help.template");

    let title = if use_colors { "\x1b[1;33m" } else { "" }; // Bold Yellow
    let hl = if use_colors { "\x1b[1;36m" } else { "" }; // Bold Cyan
    let cmd = if use_colors { "\x1b[36m" } else { "" }; // Cyan
    let err = if use_colors { "\x1b[91m" } else { "" }; // Bright Red
    let dim = if use_colors { "\x1b[2m" } else { "" }; // Dim
    let reset = if use_colors { "\x1b[0m" } else { "" };

    let mut formatted_string = template
        .replace("<title>", title)
        .replace("</title>", reset)
        .replace("<hl>", hl)
        .replace("</hl>", reset)
        .replace("<cmd>", cmd)
        .replace("</cmd>", reset)
        .replace("<err>", err)
        .replace("</err>", reset)
        .replace("<dim>", dim)
        .replace("</dim>", reset);

    formatted_string.push('\n');
    formatted_string.push_str(&render_examples(use_colors));

    Box::leak(formatted_string.into_boxed_str())
}

/// Renders each usage example followed by sample output written the way `cr` would write it:
/// two stdout lines and one stderr line.
pub fn render_examples(colorize: bool) -> String {
    let sample_line = t!("help.examples.line");
    let mut rendered = format!("{}\n", t!("help.examples.header"));

    for example in EXAMPLES {
        let mut options = Options::default();
        let tokens = shlex::split(example).unwrap_or_default();
        let (_, problems) = options.apply_args(&tokens);
        debug_assert!(problems.is_empty());

        let mut terminal = AnsiTerminal::new(Vec::new(), Attr::DEFAULT, colorize);
        let stdout_sample = format!("    {sample_line}1\r\n    {sample_line}2\r\n");
        let stderr_sample = format!("    {sample_line}3\r\n");
        let written = write_lines(&mut terminal, stdout_sample.as_bytes(), &options.stdout_style())
            .and_then(|()| write_lines(&mut terminal, stderr_sample.as_bytes(), &options.stderr_style()))
            .and_then(|()| terminal.reset());
        if let Err(e) = written {
            log::debug!("Could not render usage example '{}': {}", example, e);
            continue;
        }

        rendered.push_str(&format!("\n  cr {example} <command>\n"));
        rendered.push_str(&String::from_utf8_lossy(&terminal.into_inner()));
    }
    rendered
}

/// cr: run a console command with its stdout and stderr in separate colors.
#[derive(Parser, Debug)]
#[command(
    help_template = { build_help_string() },
    disable_help_flag = true,
    disable_version_flag = true,
    disable_help_subcommand = true
)]
pub struct Cli {
    /// The options for `cr` followed by the command and its arguments. Everything is kept
    /// verbatim, since the command's own flags must reach it untouched.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

impl Cli {
    /// The full help text, escape sequences included when colors are enabled.
    pub fn help_text() -> String {
        Self::command().render_help().ansi().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_flags_are_not_interpreted_by_clap() {
        let cli = Cli::try_parse_from(["cr", "-o$05", "ls", "-la", "--help", "-V"]).unwrap();
        assert_eq!(cli.args, ["-o$05", "ls", "-la", "--help", "-V"]);
    }

    #[test]
    fn test_no_arguments_parse_to_empty_list() {
        let cli = Cli::try_parse_from(["cr"]).unwrap();
        assert!(cli.args.is_empty());
    }

    #[test]
    fn test_plain_examples_list_every_option_set() {
        let rendered = render_examples(false);
        for example in EXAMPLES {
            assert!(rendered.contains(&format!("cr {} <command>", example)));
        }
        assert!(!rendered.contains('\x1b'));
        let line = t!("help.examples.line");
        assert!(rendered.contains(&format!("    {}3\r\n", line)));
    }

    #[test]
    fn test_colored_examples_use_the_example_attributes() {
        let rendered = render_examples(true);
        // -o$05: magenta text on the default background.
        assert!(rendered.contains("\x1b[0;35;49m"));
        // -e$89: bright blue on gray.
        assert!(rendered.contains("\x1b[0;94;100m"));
    }

    #[test]
    fn test_help_text_mentions_environment_variable() {
        assert!(Cli::help_text().contains("CR_OPTS"));
    }
}
