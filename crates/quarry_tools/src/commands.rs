//! Subcommand dispatch

use crate::cli::{Cli, Commands, OptionalSampleArgs, OutputFormat, RecognizerArgs, SampleArgs};
use crate::render;
use miette::{IntoDiagnostic, NamedSource, Report, WrapErr};
use quarry::error::RecognizeError;
use quarry::ops::{ParseOptions, Session, SessionConfig};
use quarry::{CodegenOptions, Error, RecognizerConfig};
use serde::Serialize;
use std::fmt::Write;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Text read from a file or stdin, with the name used in diagnostics
#[derive(Debug, Clone)]
pub struct Input {
    pub name: String,
    pub text: String,
}

impl Input {
    /// Read `path`; `-` reads stdin
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read.
    pub fn load(path: &Path) -> miette::Result<Self> {
        if path.as_os_str() == "-" {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .into_diagnostic()
                .wrap_err("reading stdin")?;
            return Ok(Self {
                name: "<stdin>".to_string(),
                text,
            });
        }
        let text = std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("reading {}", path.display()))?;
        Ok(Self {
            name: path.display().to_string(),
            text,
        })
    }

    fn inline(text: &str) -> Self {
        Self {
            name: "<inline>".to_string(),
            text: text.to_string(),
        }
    }

    fn sample_from(input: Option<&Path>, text: Option<&str>) -> miette::Result<Option<Self>> {
        match (input, text) {
            (_, Some(text)) => Ok(Some(Self::inline(text))),
            (Some(path), None) => Self::load(path).map(Some),
            (None, None) => Ok(None),
        }
    }

    fn sample(args: &SampleArgs) -> miette::Result<Self> {
        Self::sample_from(args.input.as_deref(), args.text.as_deref())?
            .ok_or_else(|| miette::miette!("no sample given; pass --input or --text"))
    }

    fn optional_sample(args: &OptionalSampleArgs) -> miette::Result<Option<Self>> {
        Self::sample_from(args.input.as_deref(), args.text.as_deref())
    }

    fn named_source(&self) -> NamedSource<String> {
        NamedSource::new(&self.name, self.text.clone())
    }
}

/// Attach the text an error's span points into
fn diagnose(err: Error, grammar: &Input, sample: Option<&Input>) -> Report {
    let source = match &err {
        Error::Grammar(_) => Some(grammar),
        Error::Lex(_) | Error::Recognize(RecognizeError::Parse(_) | RecognizeError::DepthLimit { .. }) => sample,
        _ => None,
    };
    let kind = err.kind();
    let report = Report::new(err).wrap_err(kind);
    match source {
        Some(input) => report.with_source_code(input.named_source()),
        None => report,
    }
}

fn emit<T: Serialize>(format: OutputFormat, report: &T, text: impl FnOnce(&T) -> String) -> miette::Result<String> {
    match format {
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(report).into_diagnostic()?;
            json.push('\n');
            Ok(json)
        }
        OutputFormat::Text => Ok(text(report)),
    }
}

fn recognizer_config(args: &RecognizerArgs) -> RecognizerConfig {
    let mut config = RecognizerConfig::default()
        .with_require_eof(!args.allow_trailing)
        .with_speculation(!args.no_speculation);
    if let Some(depth) = args.max_depth {
        config = config.with_max_depth(depth);
    }
    config
}

fn write_files(report: &quarry::ops::CompileReport, dir: &Path) -> miette::Result<()> {
    for file in &report.files {
        let path: PathBuf = dir.join(&file.path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .into_diagnostic()
                .wrap_err_with(|| format!("creating {}", parent.display()))?;
        }
        std::fs::write(&path, &file.contents)
            .into_diagnostic()
            .wrap_err_with(|| format!("writing {}", path.display()))?;
        debug!(path = %path.display(), bytes = file.contents.len(), "wrote generated file");
    }
    Ok(())
}

/// Run the selected subcommand and return what to print
///
/// # Errors
///
/// Returns a diagnostic carrying the offending source for grammar, lexer and
/// parser errors, and plain context for I/O failures.
pub fn run(cli: &Cli) -> miette::Result<String> {
    let format = cli.output;
    match &cli.command {
        Commands::Targets => {
            let session = Session::default();
            let mut out = String::new();
            for target in session.registry().targets() {
                let Ok(backend) = session.registry().get(target) else {
                    continue;
                };
                let caps = backend.capabilities();
                let kind = if caps.full_parser { "parser" } else { "tables" };
                let _ = write!(out, "{:<12} {:<12} {kind}", caps.name, caps.language);
                if !backend.aliases().is_empty() {
                    let _ = write!(out, "  (aliases: {})", backend.aliases().join(", "));
                }
                out.push('\n');
            }
            Ok(out)
        }

        Commands::Validate { grammar } => {
            let grammar = Input::load(grammar)?;
            let report = Session::default()
                .validate_grammar(&grammar.text)
                .map_err(|e| diagnose(e, &grammar, None))?;
            info!(grammar = %report.grammar_name, warnings = report.warnings.len(), "validated");
            emit(format, &report, render::validation)
        }

        Commands::Parse {
            grammar,
            sample,
            start_rule,
            tokens,
            outline,
            recognizer,
        } => {
            let grammar = Input::load(grammar)?;
            let sample = Input::sample(sample)?;
            let session = Session::new(SessionConfig::default().with_recognizer(recognizer_config(recognizer)));
            let mut options = ParseOptions::default().with_tokens(*tokens);
            if let Some(rule) = start_rule {
                options = options.with_start_rule(rule.clone());
            }
            let report = session
                .parse_sample(&grammar.text, &sample.text, &options)
                .map_err(|e| diagnose(e, &grammar, Some(&sample)))?;
            let parsed = if *outline && format == OutputFormat::Text {
                Some(quarry::parse_grammar(&grammar.text).map_err(|e| diagnose(e.into(), &grammar, None))?)
            } else {
                None
            };
            emit(format, &report, |r| render::parse(r, parsed.as_ref()))
        }

        Commands::Ambiguity {
            grammar,
            sample,
            start_rule,
        } => {
            let grammar = Input::load(grammar)?;
            let session = Session::default();
            match Input::optional_sample(sample)? {
                Some(sample) => {
                    let report = session
                        .detect_ambiguity_in_sample(&grammar.text, &sample.text, start_rule.as_deref())
                        .map_err(|e| diagnose(e, &grammar, Some(&sample)))?;
                    info!(ambiguous = report.sample_ambiguities.len(), "checked sample");
                    emit(format, &report, render::ambiguity)
                }
                None => {
                    let report = session
                        .detect_ambiguity(&grammar.text)
                        .map_err(|e| diagnose(e, &grammar, None))?;
                    emit(format, report.as_ref(), render::ambiguity)
                }
            }
        }

        Commands::LeftRecursion { grammar } => {
            let grammar = Input::load(grammar)?;
            let report = Session::default()
                .analyze_left_recursion(&grammar.text)
                .map_err(|e| diagnose(e, &grammar, None))?;
            emit(format, report.as_ref(), render::left_recursion)
        }

        Commands::FirstFollow { grammar, rule } => {
            let grammar = Input::load(grammar)?;
            let report = Session::default()
                .analyze_first_follow(&grammar.text)
                .map_err(|e| diagnose(e, &grammar, None))?;
            if let Some(name) = rule
                && report.rule(name).is_none()
            {
                let names = report.rules.iter().map(|r| r.rule_name.as_str());
                let suggestion = quarry::error::diagnostics::did_you_mean(name, names);
                return Err(diagnose(
                    Error::UnknownRule {
                        name: name.clone(),
                        suggestion,
                    },
                    &grammar,
                    None,
                ));
            }
            emit(format, report.as_ref(), |r| render::first_follow(r, rule.as_deref()))
        }

        Commands::CallGraph { grammar, graph } => {
            let grammar = Input::load(grammar)?;
            let report = Session::default()
                .analyze_call_graph(&grammar.text, *graph)
                .map_err(|e| diagnose(e, &grammar, None))?;
            emit(format, report.as_ref(), render::call_graph)
        }

        Commands::Atn { grammar, rule, graph } => {
            let grammar = Input::load(grammar)?;
            let report = Session::default()
                .visualize_atn(&grammar.text, rule.as_deref())
                .map_err(|e| diagnose(e, &grammar, None))?;
            emit(format, &report, |r| render::atn(r, *graph))
        }

        Commands::Compile {
            grammar,
            target,
            out_dir,
            module,
            no_listener,
            visitor,
        } => {
            let grammar = Input::load(grammar)?;
            let options = CodegenOptions {
                generate_listener: !no_listener,
                generate_visitor: *visitor,
                module_name: module.clone(),
            };
            let session = Session::new(SessionConfig::default().with_codegen(options));
            let report = session
                .compile_grammar_multi_target(&grammar.text, target)
                .map_err(|e| diagnose(e, &grammar, None))?;
            info!(target = %report.target, files = report.file_count, bytes = report.total_bytes, "generated");
            match out_dir {
                Some(dir) => {
                    write_files(&report, dir)?;
                    emit(format, &report, |r| render::compile_summary(r, dir))
                }
                None => emit(format, &report, render::compile),
            }
        }

        Commands::Profile {
            grammar,
            sample,
            start_rule,
        } => {
            let grammar = Input::load(grammar)?;
            let sample = Input::sample(sample)?;
            let report = Session::default()
                .profile_grammar(&grammar.text, &sample.text, start_rule.as_deref())
                .map_err(|e| diagnose(e, &grammar, Some(&sample)))?;
            emit(format, &report, render::profile)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    const ROUTES: &str = "grammar Routes;\nfile : route* EOF ;\nroute : 'route' METHOD PATH ';' ;\n\
                          METHOD : 'GET' | 'POST' ;\nPATH : '/' [a-z/]* ;\nWS : [ \\n]+ -> skip ;\n";

    fn grammar_file(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("quarry_tools_{}_{name}.g4", std::process::id()));
        std::fs::write(&path, ROUTES).unwrap();
        path
    }

    fn run_args(args: &[&str]) -> miette::Result<String> {
        run(&Cli::try_parse_from(args).unwrap())
    }

    #[test]
    fn test_parse_prints_tree() {
        let path = grammar_file("parse");
        let out = run_args(&["quarry", "parse", path.to_str().unwrap(), "-e", "route GET /users;"]).unwrap();
        assert!(out.starts_with("(file (route route GET /users ;) <EOF>)\n"));
    }

    #[test]
    fn test_parse_error_keeps_kind() {
        let path = grammar_file("error");
        let err = run_args(&["quarry", "parse", path.to_str().unwrap(), "-e", "GET /users;"]).unwrap_err();
        assert_eq!(err.to_string(), "ParseError");
        assert!(format!("{err:?}").contains("'route'"));
    }

    #[test]
    fn test_json_output_is_camel_case() {
        let path = grammar_file("json");
        let out = run_args(&["quarry", "-o", "json", "validate", path.to_str().unwrap()]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["grammarName"], "Routes");
        assert_eq!(value["success"], true);
    }

    #[test]
    fn test_unknown_first_follow_rule_suggests() {
        let path = grammar_file("ff");
        let err = run_args(&["quarry", "first-follow", path.to_str().unwrap(), "-r", "rout"]).unwrap_err();
        assert_eq!(err.to_string(), "UnknownRuleError");
    }

    #[test]
    fn test_compile_writes_files() {
        let path = grammar_file("compile");
        let dir = std::env::temp_dir().join(format!("quarry_tools_out_{}", std::process::id()));
        let out = run_args(&[
            "quarry",
            "compile",
            path.to_str().unwrap(),
            "-t",
            "py",
            "-d",
            dir.to_str().unwrap(),
        ])
        .unwrap();
        assert!(out.contains("python tables for Routes"));
        assert!(dir.join("routes_tables.py").exists());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_profile_from_start_rule() {
        let path = grammar_file("profile");
        let out = run_args(&["quarry", "profile", path.to_str().unwrap(), "-e", "route GET /a;", "-r", "route"]).unwrap();
        assert!(out.contains("route"));
        let json = run_args(&[
            "quarry",
            "-o",
            "json",
            "profile",
            path.to_str().unwrap(),
            "-e",
            "route GET /a;",
            "-r",
            "route",
        ])
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["startRule"], "route");
        assert_eq!(value["parseTree"], "(route route GET /a ;)");
    }

    #[test]
    fn test_ambiguity_with_sample() {
        let path = grammar_file("ambiguity");
        let out = run_args(&["quarry", "-o", "json", "ambiguity", path.to_str().unwrap(), "-e", "route GET /a;"]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["sampleChecked"], true);
        assert_eq!(value["ambiguityDetected"], false);
    }

    #[test]
    fn test_targets_lists_rust() {
        let out = run_args(&["quarry", "targets"]).unwrap();
        assert!(out.lines().any(|l| l.starts_with("rust ")));
        assert_eq!(out.lines().count(), 7);
    }
}
