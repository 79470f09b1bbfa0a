//! reparser CLI - run a JSON rule file over text
//!
//! Usage:
//!   rpcli [OPTIONS] <COMMAND>
//!
//! Commands:
//!   parse     Print the fragments of a text
//!   check     Compile a rule file and list its tokens
//!   stats     Show fragment statistics

mod rules;

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Parser as _, Subcommand};
use reparser_core::{AttrValue, ConfigError, Fragment, Parser};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, Level};

use crate::rules::{RuleFile, RulesError};

#[derive(Debug, clap::Parser)]
#[command(name = "rpcli", version, about = "Regex-driven inline markup parser")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the fragments of a text
    Parse {
        /// JSON rule file
        #[arg(short, long)]
        rules: PathBuf,
        /// Output in JSON format
        #[arg(short, long)]
        json: bool,
        /// Input file; stdin when omitted or `-`
        file: Option<PathBuf>,
    },
    /// Compile a rule file and list its tokens
    Check {
        #[arg(short, long)]
        rules: PathBuf,
        /// Also print the composite pattern
        #[arg(long)]
        pattern: bool,
    },
    /// Show fragment statistics
    Stats {
        #[arg(short, long)]
        rules: PathBuf,
        #[arg(short, long)]
        json: bool,
        file: Option<PathBuf>,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Rules(#[from] RulesError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to read '{path}': {source}")]
    Input {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to write JSON: {0}")]
    Json(#[from] serde_json::Error),
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli.command) {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(command: Command) -> Result<(), CliError> {
    match command {
        Command::Parse { rules, json, file } => {
            let parser = load_parser(&rules)?;
            let input = read_input(file.as_deref())?;
            cmd_parse(&parser, &input, json)
        }
        Command::Check { rules, pattern } => {
            let parser = load_parser(&rules)?;
            cmd_check(&parser, pattern);
            Ok(())
        }
        Command::Stats { rules, json, file } => {
            let parser = load_parser(&rules)?;
            let input = read_input(file.as_deref())?;
            cmd_stats(&parser, &input, json)
        }
    }
}

fn load_parser(path: &Path) -> Result<Parser, CliError> {
    let rules = RuleFile::load(path)?;
    let parser = Parser::with_options(rules.token_definitions()?, rules.options())?;
    info!(
        rules = %path.display(),
        tokens = rules.tokens.len(),
        "loaded rule file"
    );
    Ok(parser)
}

fn read_input(file: Option<&Path>) -> Result<String, CliError> {
    match file {
        Some(path) if path != Path::new("-") => {
            fs::read_to_string(path).map_err(|source| CliError::Input {
                path: path.display().to_string(),
                source,
            })
        }
        _ => {
            let mut input = String::new();
            io::stdin()
                .read_to_string(&mut input)
                .map_err(|source| CliError::Input {
                    path: "<stdin>".to_string(),
                    source,
                })?;
            Ok(input)
        }
    }
}

// =============================================================================
// Parse Command
// =============================================================================

fn cmd_parse(parser: &Parser, input: &str, json: bool) -> Result<(), CliError> {
    if json {
        let fragments = parser.parse_to_vec(input)?;
        let out: Vec<_> = fragments.iter().map(JsonFragment::from).collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    for fragment in parser.parse(input)? {
        let fragment = fragment?;
        println!("{}", format_fragment(&fragment));
    }
    Ok(())
}

fn format_fragment(fragment: &Fragment) -> String {
    let mut line = format!(
        "{:>5}..{:<5} {:?}",
        fragment.span.start, fragment.span.end, fragment.text
    );
    for (key, value) in &fragment.attributes {
        line.push_str(&format!(" {}={}", key, value));
    }
    line
}

// =============================================================================
// Check Command
// =============================================================================

fn cmd_check(parser: &Parser, show_pattern: bool) {
    println!("Valid: {} token(s)", parser.tokens().count());
    for token in parser.tokens() {
        let kind = if token.is_paired() { "paired" } else { "single" };
        let mut line = format!("  {:<16} {}", token.name, kind);
        if token.skip {
            line.push_str(" skip");
        }
        if !token.attributes.is_empty() {
            let keys: Vec<_> = token.attributes.keys().map(String::as_str).collect();
            line.push_str(&format!(" [{}]", keys.join(", ")));
        }
        println!("{}", line);
    }

    if show_pattern {
        println!();
        println!("{}", parser.pattern());
    }
}

// =============================================================================
// Stats Command
// =============================================================================

fn cmd_stats(parser: &Parser, input: &str, json: bool) -> Result<(), CliError> {
    let mut fragments = parser.parse(input)?;
    let mut stats = FragmentStats {
        input_bytes: fragments.source().len(),
        ..FragmentStats::default()
    };
    for fragment in fragments.by_ref() {
        stats.add(&fragment?);
    }
    stats.unclosed = fragments.depth();

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Fragment Statistics");
    println!("-------------------");
    println!("Input bytes:    {}", stats.input_bytes);
    println!("Fragments:      {}", stats.fragments);
    println!("  Plain:        {}", stats.plain);
    println!("  Styled:       {}", stats.fragments - stats.plain);
    println!("Output chars:   {}", stats.output_chars);
    println!("Unclosed:       {}", stats.unclosed);
    if !stats.attributes.is_empty() {
        println!();
        println!("Attributes:");
        for (key, count) in &stats.attributes {
            println!("  {:<14}{}", key, count);
        }
    }
    Ok(())
}

#[derive(Debug, Default, Serialize)]
struct FragmentStats {
    input_bytes: usize,
    fragments: usize,
    plain: usize,
    output_chars: usize,
    unclosed: usize,
    attributes: BTreeMap<String, usize>,
}

impl FragmentStats {
    fn add(&mut self, fragment: &Fragment) {
        self.fragments += 1;
        self.output_chars += fragment.text.chars().count();
        if fragment.is_plain() {
            self.plain += 1;
        }
        for key in fragment.attributes.keys() {
            *self.attributes.entry(key.clone()).or_default() += 1;
        }
    }
}

// =============================================================================
// JSON Output
// =============================================================================

#[derive(Serialize)]
struct JsonFragment<'a> {
    text: &'a str,
    attributes: BTreeMap<&'a str, serde_json::Value>,
    span: [usize; 2],
}

impl<'a> From<&'a Fragment> for JsonFragment<'a> {
    fn from(fragment: &'a Fragment) -> Self {
        Self {
            text: &fragment.text,
            attributes: fragment
                .attributes
                .iter()
                .map(|(k, v)| (k.as_str(), attr_to_json(v)))
                .collect(),
            span: [fragment.span.start, fragment.span.end],
        }
    }
}

fn attr_to_json(value: &AttrValue) -> serde_json::Value {
    match value {
        AttrValue::Str(s) => serde_json::Value::String(s.clone()),
        AttrValue::Bool(b) => serde_json::Value::Bool(*b),
        AttrValue::Int(n) => serde_json::Value::from(*n),
        AttrValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        AttrValue::List(items) => serde_json::Value::Array(items.iter().map(attr_to_json).collect()),
    }
}
