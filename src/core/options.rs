// src/core/options.rs

use crate::core::color::Attr;
use crate::error::ColorizerError;

/// How one output stream is written to the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputStyle {
    /// Attribute the stream's text is written in.
    pub color: Attr,
    /// Extend the stream color to the end of every line.
    pub line_mode: bool,
    /// Leave the clear after a burst's final line terminator in the default color.
    pub skip_last_eol: bool,
}

/// Settings gathered from `CR_OPTS` and the leading command-line options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Options {
    /// `-o`: attribute for the child's stdout.
    pub stdout_color: Attr,
    /// `-e`: attribute for the child's stderr.
    pub stderr_color: Attr,
    /// `-l`: color whole lines.
    pub line_mode: bool,
    /// `-s`: leave the line after a trailing terminator uncolored.
    pub skip_last_eol: bool,
}

/// What to do when the parser meets a token that is not an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operands {
    /// Skip it and keep parsing (`CR_OPTS`).
    Skip,
    /// Stop; the token starts the command (command line).
    Stop,
}

impl Options {
    /// Applies an option string such as the value of `CR_OPTS`.
    /// Tokens that are not options are ignored. Returns the problems found, all non-fatal.
    pub fn apply_env_string(&mut self, value: &str) -> Vec<ColorizerError> {
        let Some(tokens) = shlex::split(value) else {
            return vec![ColorizerError::Config(format!(
                "{} '{}'",
                t!("config.warn.bad_value"),
                value
            ))];
        };
        let (_, errors) = self.apply_tokens(&tokens, Operands::Skip);
        errors
    }

    /// Applies the leading options of `args` and returns the command that follows them.
    /// Parsing stops at the first token that is not an option, or right after `--`.
    pub fn apply_args<'a>(&mut self, args: &'a [String]) -> (&'a [String], Vec<ColorizerError>) {
        let (consumed, errors) = self.apply_tokens(args, Operands::Stop);
        (args.get(consumed..).unwrap_or_default(), errors)
    }

    /// How the stdout relay writes.
    pub fn stdout_style(&self) -> OutputStyle {
        self.style(self.stdout_color)
    }

    /// How the stderr relay writes.
    pub fn stderr_style(&self) -> OutputStyle {
        self.style(self.stderr_color)
    }

    fn style(&self, color: Attr) -> OutputStyle {
        OutputStyle {
            color,
            line_mode: self.line_mode,
            skip_last_eol: self.skip_last_eol,
        }
    }

    /// getopt-style scan with the option string `e:lo:s`. Returns how many tokens were consumed.
    fn apply_tokens(&mut self, tokens: &[String], operands: Operands) -> (usize, Vec<ColorizerError>) {
        let mut errors = Vec::new();
        let mut index = 0;

        while let Some(token) = tokens.get(index) {
            if token == "--" {
                index += 1;
                break;
            }

            let cluster = match token.strip_prefix('-') {
                Some(cluster) if !cluster.is_empty() => cluster,
                _ => match operands {
                    Operands::Stop => break,
                    Operands::Skip => {
                        index += 1;
                        continue;
                    }
                },
            };
            index += 1;

            for (position, flag) in cluster.char_indices() {
                match flag {
                    'l' => self.line_mode = true,
                    's' => self.skip_last_eol = true,
                    'e' | 'o' => {
                        let attached = cluster.get(position + flag.len_utf8()..).unwrap_or_default();
                        let value = if !attached.is_empty() {
                            Some(attached)
                        } else if let Some(next) = tokens.get(index) {
                            index += 1;
                            Some(next.as_str())
                        } else {
                            None
                        };

                        match value.map(Attr::parse) {
                            Some(Ok(color)) if flag == 'e' => self.stderr_color = color,
                            Some(Ok(color)) => self.stdout_color = color,
                            Some(Err(e)) => errors.push(e),
                            None => errors.push(ColorizerError::Config(format!(
                                "{} '-{}'",
                                t!("config.warn.missing_value"),
                                flag
                            ))),
                        }
                        // The value takes the rest of the cluster.
                        break;
                    }
                    other => errors.push(ColorizerError::Config(format!(
                        "{} '-{}'",
                        t!("config.warn.unknown_option"),
                        other
                    ))),
                }
            }
        }

        (index, errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_hex_colors_and_line_mode() {
        let mut options = Options::default();
        let argv = args(&["-o$89", "-e$05", "-l", "cmd", "/c", "dir"]);
        let (command, errors) = options.apply_args(&argv);

        assert!(errors.is_empty());
        assert_eq!(options.stdout_color, Attr::new(0x89));
        assert_eq!(options.stderr_color, Attr::new(0x05));
        assert!(options.line_mode);
        assert!(!options.skip_last_eol);
        assert_eq!(command, &argv[3..]);
    }

    #[test]
    fn test_decimal_color() {
        let mut options = Options::default();
        let argv = args(&["-o137", "prog"]);
        let (command, _) = options.apply_args(&argv);
        assert_eq!(options.stdout_color, Attr::new(0x89));
        assert_eq!(command, ["prog"]);
    }

    #[test]
    fn test_clustered_flags_and_separate_value() {
        let mut options = Options::default();
        let argv = args(&["-lse", "12", "prog", "-o5"]);
        let (command, errors) = options.apply_args(&argv);

        assert!(errors.is_empty());
        assert!(options.line_mode);
        assert!(options.skip_last_eol);
        assert_eq!(options.stderr_color, Attr::new(12));
        // Options after the command belong to the command.
        assert_eq!(command, ["prog", "-o5"]);
        assert_eq!(options.stdout_color, Attr::DEFAULT);
    }

    #[test]
    fn test_double_dash_ends_options() {
        let mut options = Options::default();
        let argv = args(&["-l", "--", "-s", "x"]);
        let (command, _) = options.apply_args(&argv);
        assert!(options.line_mode);
        assert!(!options.skip_last_eol);
        assert_eq!(command, ["-s", "x"]);
    }

    #[test]
    fn test_unknown_options_and_bad_values_are_reported_and_ignored() {
        let mut options = Options::default();
        let argv = args(&["-x", "-onope", "-l", "prog"]);
        let (command, errors) = options.apply_args(&argv);

        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| matches!(e, ColorizerError::Config(_))));
        assert!(errors[0].to_string().contains("-x"));
        assert_eq!(options.stdout_color, Attr::DEFAULT);
        assert!(options.line_mode);
        assert_eq!(command, ["prog"]);
    }

    #[test]
    fn test_missing_value_at_end() {
        let mut options = Options::default();
        let argv = args(&["-e"]);
        let (command, errors) = options.apply_args(&argv);
        assert!(command.is_empty());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code(), -1);
    }

    #[test]
    fn test_env_string_skips_operands() {
        let mut options = Options::default();
        let errors = options.apply_env_string("stray -e4 'also stray' -s");
        assert!(errors.is_empty());
        assert_eq!(options.stderr_color, Attr::new(0x04));
        assert!(options.skip_last_eol);
    }

    #[test]
    fn test_command_line_overrides_env_string() {
        let mut options = Options::default();
        options.apply_env_string("-e4 -o$0A");
        let argv = args(&["-e$0E", "prog"]);
        options.apply_args(&argv);
        assert_eq!(options.stderr_color, Attr::new(0x0E));
        assert_eq!(options.stdout_color, Attr::new(0x0A));
    }

    #[test]
    fn test_unbalanced_quotes_in_env_string() {
        let mut options = Options::default();
        let errors = options.apply_env_string("-e4 'open");
        assert_eq!(errors.len(), 1);
        assert_eq!(options, Options::default());
    }

    #[test]
    fn test_styles_share_the_line_flags() {
        let options = Options {
            stdout_color: Attr::new(0x02),
            stderr_color: Attr::new(0x04),
            line_mode: true,
            skip_last_eol: true,
        };
        assert_eq!(options.stdout_style().color, Attr::new(0x02));
        assert_eq!(options.stderr_style().color, Attr::new(0x04));
        assert!(options.stderr_style().line_mode);
        assert!(options.stdout_style().skip_last_eol);
    }
}
