#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use directive::reference_impl::{ReferenceEvaluator, ReferenceExpander, ReferenceLexer};
use directive::{Dialect, DirectiveConfig, DirectiveProcessor, PreprocessError};

/// Run a file through the directive dispatcher using the bundled
/// reference lexer/expander/evaluator.
#[derive(Parser, Debug)]
#[command(name = "directive-cli", version, about)]
struct Cli {
    /// Input file to process; "-" or omitted reads stdin.
    input: Option<PathBuf>,

    /// Write output to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Predefine NAME, optionally with =VALUE.
    #[arg(short = 'D', long = "define", value_name = "NAME[=VALUE]")]
    defines: Vec<String>,

    /// Undefine NAME before processing.
    #[arg(short = 'U', long = "undef", value_name = "NAME")]
    undefs: Vec<String>,

    /// C dialect to diagnose against.
    #[arg(long, value_enum, default_value = "c99")]
    dialect: DialectArg,

    /// Enable pedantic diagnostics.
    #[arg(long)]
    pedantic: bool,

    /// Macro/directive recursion limit.
    #[arg(long, default_value_t = 200)]
    recursion_limit: usize,

    /// Emit a structured JSON report instead of plain text.
    #[cfg(feature = "json")]
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum DialectArg {
    Traditional,
    C89,
    C99,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Traditional => Dialect::Traditional,
            DialectArg::C89 => Dialect::C89,
            DialectArg::C99 => Dialect::C99,
        }
    }
}

#[cfg(feature = "json")]
#[derive(serde::Serialize)]
struct JsonReport {
    ok: bool,
    output: Option<String>,
    warnings: Vec<String>,
    error: Option<String>,
}

fn parse_define(spec: &str) -> (String, Option<String>) {
    match spec.split_once('=') {
        Some((name, value)) => (name.to_string(), Some(value.to_string())),
        None => (spec.to_string(), None),
    }
}

fn read_input(path: Option<&PathBuf>) -> Result<(String, String)> {
    match path {
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("reading stdin")?;
            Ok(("<stdin>".to_string(), buf))
        }
        Some(p) if p.as_os_str() == "-" => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("reading stdin")?;
            Ok(("<stdin>".to_string(), buf))
        }
        Some(p) => {
            let text = fs::read_to_string(p)
                .with_context(|| format!("reading {}", p.display()))?;
            Ok((p.display().to_string(), text))
        }
    }
}

fn build_config(cli: &Cli) -> DirectiveConfig {
    let mut config = DirectiveConfig::new()
        .with_dialect(cli.dialect.into())
        .with_pedantic(cli.pedantic)
        .with_recursion_limit(cli.recursion_limit);
    for spec in &cli.defines {
        let (name, value) = parse_define(spec);
        config = config.with_define(name, value);
    }
    for name in &cli.undefs {
        config = config.with_undef(name.clone());
    }
    config
}

fn render_diagnostic(err: &PreprocessError, use_color: bool) -> String {
    let text = format!("{err}");
    if use_color {
        text.red().to_string()
    } else {
        text
    }
}

fn run(cli: &Cli) -> Result<(bool, String)> {
    let (file, source) = read_input(cli.input.as_ref())?;
    let config = build_config(cli);
    let mut processor = DirectiveProcessor::new(
        config,
        ReferenceLexer,
        ReferenceExpander::new(),
        ReferenceEvaluator,
    );

    let use_color = cli.output.is_none() && atty::is(atty::Stream::Stdout);

    match processor.process(&file, &source) {
        Ok(output) => {
            for warning in processor.warnings() {
                eprintln!("{}", render_diagnostic(warning, atty::is(atty::Stream::Stderr)));
            }
            #[cfg(feature = "json")]
            if cli.json {
                let report = JsonReport {
                    ok: true,
                    output: Some(output.clone()),
                    warnings: processor.warnings().iter().map(|w| format!("{w}")).collect(),
                    error: None,
                };
                return Ok((true, serde_json::to_string_pretty(&report)?));
            }
            Ok((true, output))
        }
        Err(e) => {
            #[cfg(feature = "json")]
            if cli.json {
                let report = JsonReport {
                    ok: false,
                    output: None,
                    warnings: processor.warnings().iter().map(|w| format!("{w}")).collect(),
                    error: Some(format!("{e}")),
                };
                return Ok((false, serde_json::to_string_pretty(&report)?));
            }
            Ok((false, render_diagnostic(&e, use_color)))
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let (ok, text) = match run(&cli) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("directive-cli: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let write_result = match &cli.output {
        Some(path) => fs::write(path, &text).with_context(|| format!("writing {}", path.display())),
        None if ok => {
            let mut stdout = io::stdout();
            writeln!(stdout, "{text}").context("writing stdout")
        }
        None => {
            eprintln!("{text}");
            Ok(())
        }
    };

    if let Err(e) = write_result {
        eprintln!("directive-cli: {e:#}");
        return ExitCode::FAILURE;
    }

    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
