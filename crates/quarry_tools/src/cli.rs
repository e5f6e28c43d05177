//! CLI interface for quarry

use clap::{ArgAction, Args, Parser, Subcommand};
use quarry::ops::GraphFormat;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "quarry")]
#[command(about = "Analyze ANTLR-style grammars, parse samples, and generate parsers")]
#[command(version)]
pub struct Cli {
    /// Raise the log level (-v debug, -vv trace); `RUST_LOG` overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Report format
    #[arg(short, long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check a grammar and summarize its rules
    Validate {
        /// Grammar file (`-` for stdin)
        grammar: PathBuf,
    },

    /// Parse a sample and print its tree
    Parse {
        grammar: PathBuf,

        #[command(flatten)]
        sample: SampleArgs,

        /// Parser rule to start from
        #[arg(short = 'r', long)]
        start_rule: Option<String>,

        /// List the tokens of the sample
        #[arg(long)]
        tokens: bool,

        /// Print an indented outline instead of the LISP form
        #[arg(long)]
        outline: bool,

        #[command(flatten)]
        recognizer: RecognizerArgs,
    },

    /// Report LL(1) conflicts between alternatives
    Ambiguity {
        grammar: PathBuf,

        /// Also parse a sample and report decisions it matched more than one way
        #[command(flatten)]
        sample: OptionalSampleArgs,

        /// Parser rule the sample starts from
        #[arg(short = 'r', long)]
        start_rule: Option<String>,
    },

    /// Classify left-recursive rules
    LeftRecursion { grammar: PathBuf },

    /// Print FIRST and FOLLOW sets
    FirstFollow {
        grammar: PathBuf,

        /// Only show this rule
        #[arg(short = 'r', long)]
        rule: Option<String>,
    },

    /// Render the rule call graph
    CallGraph {
        grammar: PathBuf,

        /// dot, mermaid or both
        #[arg(short, long, default_value = "both")]
        graph: GraphFormat,
    },

    /// Render the automaton of one rule
    Atn {
        grammar: PathBuf,

        /// Rule to render (default: the start rule)
        #[arg(short = 'r', long)]
        rule: Option<String>,

        /// dot, mermaid or both
        #[arg(short, long, default_value = "dot")]
        graph: GraphFormat,
    },

    /// Generate a parser for a target language
    Compile {
        grammar: PathBuf,

        /// Target language or alias
        #[arg(short, long, default_value = "rust")]
        target: String,

        /// Write files here instead of printing them
        #[arg(short = 'd', long)]
        out_dir: Option<PathBuf>,

        /// Module or package name
        #[arg(short, long)]
        module: Option<String>,

        /// Skip the listener
        #[arg(long)]
        no_listener: bool,

        /// Also emit a visitor
        #[arg(long)]
        visitor: bool,
    },

    /// Parse a sample with counters attached
    Profile {
        grammar: PathBuf,

        #[command(flatten)]
        sample: SampleArgs,

        /// Parser rule to start from
        #[arg(short = 'r', long)]
        start_rule: Option<String>,
    },

    /// List code generation targets
    Targets,
}

/// Where the sample input comes from
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct SampleArgs {
    /// File holding the sample (`-` for stdin)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Sample given inline
    #[arg(short = 'e', long)]
    pub text: Option<String>,
}

#[derive(Args, Debug)]
#[group(required = false, multiple = false)]
pub struct OptionalSampleArgs {
    /// File holding the sample (`-` for stdin)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Sample given inline
    #[arg(short = 'e', long)]
    pub text: Option<String>,
}

#[derive(Args, Debug)]
pub struct RecognizerArgs {
    /// Accept input left over after the start rule
    #[arg(long)]
    pub allow_trailing: bool,

    /// Disable backtracking over conflicting alternatives
    #[arg(long)]
    pub no_speculation: bool,

    /// Maximum rule nesting
    #[arg(long)]
    pub max_depth: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {s}. Supported: text, json")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command_with_inline_text() {
        let cli = Cli::try_parse_from([
            "quarry", "-vv", "parse", "calc.g4", "-e", "1 + 2", "--start-rule", "expr", "--tokens",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.output, OutputFormat::Text);
        let Commands::Parse {
            grammar,
            sample,
            start_rule,
            tokens,
            outline,
            recognizer,
        } = cli.command
        else {
            panic!("expected parse");
        };
        assert_eq!(grammar, PathBuf::from("calc.g4"));
        assert_eq!(sample.text.as_deref(), Some("1 + 2"));
        assert!(sample.input.is_none());
        assert_eq!(start_rule.as_deref(), Some("expr"));
        assert!(tokens);
        assert!(!outline);
        assert!(!recognizer.allow_trailing);
    }

    #[test]
    fn test_sample_source_is_required_and_exclusive() {
        assert!(Cli::try_parse_from(["quarry", "profile", "calc.g4"]).is_err());
        assert!(Cli::try_parse_from(["quarry", "profile", "calc.g4", "-i", "a.txt", "-e", "1"]).is_err());
    }

    #[test]
    fn test_graph_and_output_formats() {
        let cli = Cli::try_parse_from(["quarry", "call-graph", "g.g4", "--graph", "mermaid", "-o", "json"]).unwrap();
        assert_eq!(cli.output, OutputFormat::Json);
        assert!(matches!(
            cli.command,
            Commands::CallGraph {
                graph: GraphFormat::Mermaid,
                ..
            }
        ));
        assert!(Cli::try_parse_from(["quarry", "atn", "g.g4", "--graph", "png"]).is_err());
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_ambiguity_sample_is_optional() {
        let cli = Cli::try_parse_from(["quarry", "ambiguity", "g.g4"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Ambiguity {
                sample: OptionalSampleArgs { input: None, text: None },
                start_rule: None,
                ..
            }
        ));
        let cli = Cli::try_parse_from(["quarry", "ambiguity", "g.g4", "-e", "a", "-r", "x"]).unwrap();
        let Commands::Ambiguity { sample, start_rule, .. } = cli.command else {
            panic!("expected ambiguity");
        };
        assert_eq!(sample.text.as_deref(), Some("a"));
        assert_eq!(start_rule.as_deref(), Some("x"));
        assert!(Cli::try_parse_from(["quarry", "ambiguity", "g.g4", "-i", "a.txt", "-e", "a"]).is_err());
    }

    #[test]
    fn test_profile_start_rule() {
        let cli = Cli::try_parse_from(["quarry", "profile", "g.g4", "-e", "1", "--start-rule", "expr"]).unwrap();
        let Commands::Profile { start_rule, .. } = cli.command else {
            panic!("expected profile");
        };
        assert_eq!(start_rule.as_deref(), Some("expr"));
    }

    #[test]
    fn test_compile_defaults() {
        let cli = Cli::try_parse_from(["quarry", "compile", "g.g4"]).unwrap();
        let Commands::Compile {
            target,
            out_dir,
            no_listener,
            visitor,
            ..
        } = cli.command
        else {
            panic!("expected compile");
        };
        assert_eq!(target, "rust");
        assert!(out_dir.is_none());
        assert!(!no_listener);
        assert!(!visitor);
    }
}
