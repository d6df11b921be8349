//! abnf - validate documents against an ABNF grammar
//!
//! Usage: abnf [OPTIONS] <GRAMMAR> <START_RULE> <INPUT>...
//!
//! GRAMMAR and each INPUT are file names, or literals when preceded by `!`.
//! A directory INPUT validates every file inside it, in name order.
//!
//! Exit status: 0 when every document is valid, 1 when any document is
//! invalid, 2 when the grammar or an input cannot be loaded.

use clap::Parser;
use rustabnf::{check_document, CorpusReport, Grammar, GrammarOptions, ValidatorOptions};
use std::fs;
use std::path::Path;
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "abnf")]
#[command(about = "Validate documents against an ABNF (RFC 5234) grammar")]
struct Args {
    /// Grammar file, or `!` followed by the grammar text
    grammar: String,

    /// Rule every document must match
    #[arg(required_unless_present = "dump_rules")]
    start_rule: Option<String>,

    /// Documents: files, directories, or `!` followed by the text
    #[arg(required_unless_present = "dump_rules")]
    inputs: Vec<String>,

    /// Read the grammar from the first fenced code block with this info string
    #[arg(long, value_name = "LANG")]
    fenced: Option<String>,

    /// Print the parse tree of each valid document as XML
    #[arg(long)]
    tree: bool,

    /// Print the loaded rules as ABNF and exit
    #[arg(long)]
    dump_rules: bool,

    /// Do not fall back to the RFC 5234 core rules
    #[arg(long)]
    no_core_rules: bool,

    /// Deepest rule nesting allowed while matching
    #[arg(long, value_name = "N")]
    max_depth: Option<usize>,

    /// Print timing information
    #[arg(long)]
    timing: bool,

    /// Raise the log level (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log level: off, error, warn, info, debug or trace
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args);

    match run(&args) {
        Ok(code) => code,
        Err(message) => {
            eprintln!("error: {}", message);
            ExitCode::from(2)
        }
    }
}

fn init_logging(args: &Args) {
    let level = match &args.log_level {
        Some(name) => log::LevelFilter::from_str(name).unwrap_or_else(|_| {
            eprintln!("warning: unknown log level '{}', using warn", name);
            log::LevelFilter::Warn
        }),
        None => match args.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        },
    };

    let _ = simplelog::TermLogger::init(
        level,
        simplelog::ConfigBuilder::new()
            .set_time_format_custom(&[])
            .build(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    );
}

fn run(args: &Args) -> Result<ExitCode, String> {
    let start = Instant::now();

    let source = read_arg(&args.grammar)?;
    let grammar_text = match &args.fenced {
        Some(lang) => extract_fenced(&source, lang)
            .ok_or_else(|| format!("no ```{} block in {}", lang, args.grammar))?,
        None => source,
    };

    let options = GrammarOptions::new().with_core_rules(!args.no_core_rules);
    let grammar =
        Grammar::load(&grammar_text, &options).map_err(|e| format!("invalid grammar: {}", e))?;

    if args.timing {
        eprintln!("Grammar loaded in {:?} ({} rules)", start.elapsed(), grammar.len());
    }

    if args.dump_rules {
        print!("{}", grammar);
        return Ok(ExitCode::SUCCESS);
    }

    let start_rule = args
        .start_rule
        .as_deref()
        .ok_or_else(|| "missing START_RULE".to_string())?;
    let mut validator_options = ValidatorOptions::new();
    if let Some(max_depth) = args.max_depth {
        validator_options = validator_options.with_max_depth(max_depth);
    }
    let validator = grammar
        .get_with(start_rule, validator_options)
        .map_err(|e| e.to_string())?;

    let documents = collect_inputs(&args.inputs)?;

    let mut report = CorpusReport::new();
    for (name, text) in &documents {
        let outcome = check_document(&validator, name.as_str(), text);

        println!("{}", outcome);
        if args.tree && outcome.passed() {
            if let Ok(tree) = validator.parse_all(text) {
                println!("{}", tree.to_xml(text));
            }
        }
        if args.timing {
            eprintln!("{} validated in {:?}", name, outcome.elapsed);
        }

        report.push(outcome);
    }

    println!("{}", report);
    if args.timing {
        eprintln!("Total time: {:?}", start.elapsed());
    }

    Ok(if report.all_passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn read_arg(arg: &str) -> Result<String, String> {
    match arg.strip_prefix('!') {
        Some(literal) => Ok(literal.to_string()),
        None => fs::read_to_string(arg).map_err(|e| format!("cannot read {}: {}", arg, e)),
    }
}

/// Named documents for every INPUT argument, in argument order
fn collect_inputs(inputs: &[String]) -> Result<Vec<(String, String)>, String> {
    let mut documents = Vec::new();

    for (i, input) in inputs.iter().enumerate() {
        if let Some(literal) = input.strip_prefix('!') {
            documents.push((format!("<literal {}>", i + 1), literal.to_string()));
            continue;
        }

        let path = Path::new(input);
        if path.is_dir() {
            let entries = fs::read_dir(path).map_err(|e| format!("cannot read {}: {}", input, e))?;
            let mut files = Vec::new();
            for entry in entries {
                let entry = entry.map_err(|e| format!("cannot read {}: {}", input, e))?;
                if entry.path().is_file() {
                    files.push(entry.path());
                }
            }
            files.sort();

            for file in files {
                let name = file.display().to_string();
                let text = read_arg(&name)?;
                documents.push((name, text));
            }
        } else {
            documents.push((input.clone(), read_arg(input)?));
        }
    }

    Ok(documents)
}

/// Body of the first fenced code block whose info string is `lang`
fn extract_fenced(markdown: &str, lang: &str) -> Option<String> {
    let mut body: Option<String> = None;

    for line in markdown.lines() {
        let trimmed = line.trim_start();
        match body.as_mut() {
            None => {
                if let Some(info) = trimmed.strip_prefix("```") {
                    if info.trim().eq_ignore_ascii_case(lang) {
                        body = Some(String::new());
                    }
                }
            }
            Some(text) => {
                if trimmed.starts_with("```") {
                    return body;
                }
                text.push_str(line);
                text.push('\n');
            }
        }
    }

    // Unterminated block: take the rest of the file
    body
}
