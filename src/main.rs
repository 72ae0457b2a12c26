use gradle_props::config::{Dialect, DslConfig};
use gradle_props::error::DslError;
use gradle_props::json::{snapshot, to_json, JsonStyle};
use gradle_props::BuildModel;

use std::io::{self, Read};
use std::path::PathBuf;
use std::process::exit;
use tracing_subscriber::EnvFilter;

enum Mode {
    Snapshot,
    Print,
    Check,
}

struct Args {
    config: Option<PathBuf>,
    mode: Mode,
    file: Option<PathBuf>,
}

fn print_help() {
    println!("USAGE:");
    println!("    gradle-props [--config <file.toml>] [--print | --check] [build.gradle]");
    println!();
    println!("Reads stdin when no build file is given.");
    println!();
    println!("OPTIONS:");
    println!("    --config <file>    Printing options (dialect, indent_width).");
    println!("    --print            Print the normalized build file.");
    println!("    --check            Report unresolved and cyclic references.");
    println!("    -h, --help         Show this help message.");
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        config: None,
        mode: Mode::Snapshot,
        file: None,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let path = iter.next().ok_or("--config needs a file")?;
                args.config = Some(PathBuf::from(path));
            }
            "--print" => args.mode = Mode::Print,
            "--check" => args.mode = Mode::Check,
            "-h" | "--help" => {
                print_help();
                exit(0);
            }
            other if other.starts_with('-') => return Err(format!("unknown option {}", other)),
            other => args.file = Some(PathBuf::from(other)),
        }
    }
    Ok(args)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{}", message);
            exit(2);
        }
    };

    let mut config = match &args.config {
        Some(path) => match DslConfig::load(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("{}", err);
                exit(2);
            }
        },
        None => DslConfig::default(),
    };

    let input = match &args.file {
        Some(path) => {
            if args.config.is_none() {
                config.dialect = Dialect::from_path(path);
            }
            std::fs::read_to_string(path)
        }
        None => {
            let mut input = String::new();
            io::stdin().read_to_string(&mut input).map(|_| input)
        }
    };
    let input = match input {
        Ok(input) => input,
        Err(err) => {
            eprintln!("failed to read input: {}", err);
            exit(2);
        }
    };

    let model = match BuildModel::with_config(&input, config) {
        Ok(model) => model,
        Err(err) => {
            report(&input, &err);
            exit(1);
        }
    };

    match args.mode {
        Mode::Print => {
            if let Err(err) = model.apply() {
                eprintln!("{}", err);
                exit(1);
            }
            print!("{}", model.text());
        }
        Mode::Check => {
            let errors = model.validate_references();
            for err in &errors {
                eprintln!("{}: {} ({})", err.path.join("."), err.message, err.code);
            }
            if !errors.is_empty() {
                exit(1);
            }
        }
        Mode::Snapshot => {
            let json = snapshot(&model)
                .map_err(|err| err.to_string())
                .and_then(|props| to_json(&props, JsonStyle::Pretty).map_err(|err| err.to_string()));
            match json {
                Ok(json) => println!("{}", json),
                Err(err) => {
                    eprintln!("{}", err);
                    exit(1);
                }
            }
        }
    }
}

/// Print the offending line with the error span underlined.
fn report(input: &str, err: &DslError) {
    let lines: Vec<&str> = input.lines().collect();
    let begin = err.span.begin;
    let end = err.span.end;
    let line_text = lines.get(begin.line).unwrap_or(&"");

    eprintln!("ERROR AT LINE {}:", begin.line + 1);
    eprintln!("{}", line_text);

    let start_col = begin.column;
    let end_col = if begin.line == end.line && end.column > begin.column {
        end.column
    } else if start_col < line_text.len() {
        // Point error or spans multiple lines: underline to end of line
        line_text.len()
    } else {
        start_col + 1
    };

    let mut underline = " ".repeat(start_col);
    underline.push('^');
    if end_col > start_col + 1 {
        underline.push_str(&"_".repeat(end_col - start_col - 1));
    }

    eprintln!("{}", underline);
    eprintln!("{}", err.message);
}
