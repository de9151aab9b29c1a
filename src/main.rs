//! Numgrid - replays spreadsheet edit commands against a reactive sheet

mod command;
mod error;

use anyhow::Context;
use directories::ProjectDirs;
use log::{LevelFilter, Metadata, Record};
use numgrid_core::{Document, SheetConfig};
use std::env;
use std::io::Write;
use std::path::PathBuf;

use crate::command::{execute, parse_command};

fn print_usage() {
    eprintln!("Usage: numgrid [OPTIONS] [FILE]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  [FILE]                    Sheet to load (.json)");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --command <CMD>       Run one command (can be repeated)");
    eprintln!("  -s, --script <FILE>       Run commands from a file, one per line");
    eprintln!("  -o, --output <FILE>       Save the sheet as JSON when done");
    eprintln!("  --config <FILE>           Load sheet settings from a TOML file");
    eprintln!("  --no-config               Ignore the user config.toml");
    eprintln!("  -v, --verbose             Log to stderr");
    eprintln!("  -h, --help                Print help");
}

struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

#[derive(Default)]
struct Options {
    file_path: Option<PathBuf>,
    output_file: Option<PathBuf>,
    config_file: Option<PathBuf>,
    no_config: bool,
    commands: Vec<(usize, String)>,
    scripts: Vec<PathBuf>,
}

fn load_config(options: &Options) -> anyhow::Result<SheetConfig> {
    if let Some(path) = &options.config_file {
        return SheetConfig::load(path)
            .with_context(|| format!("reading config {}", path.display()));
    }
    if options.no_config {
        return Ok(SheetConfig::default());
    }
    let Some(proj) = ProjectDirs::from("", "", "numgrid") else {
        return Ok(SheetConfig::default());
    };
    let path = proj.config_dir().join("config.toml");
    if !path.exists() {
        return Ok(SheetConfig::default());
    }
    log::debug!("using config {}", path.display());
    SheetConfig::load(&path).with_context(|| format!("reading config {}", path.display()))
}

fn run(options: Options) -> anyhow::Result<()> {
    let config = load_config(&options)?;
    let mut doc = Document::with_config(config);
    if let Some(path) = &options.file_path {
        doc.load_file(path)
            .with_context(|| format!("loading {}", path.display()))?;
    }

    let mut lines = options.commands;
    for script in &options.scripts {
        let text = std::fs::read_to_string(script)
            .with_context(|| format!("reading script {}", script.display()))?;
        lines.extend(text.lines().enumerate().map(|(i, l)| (i + 1, l.to_string())));
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for (line, text) in &lines {
        let Some(command) = parse_command(text, *line)? else {
            continue;
        };
        execute(&mut doc, &command, &mut out)
            .with_context(|| format!("line {}: {}", line, text.trim()))?;
    }
    out.flush()?;

    if let Some(path) = &options.output_file {
        doc.save_file(path)
            .with_context(|| format!("saving {}", path.display()))?;
        eprintln!("Saved to {}", path.display());
    }
    Ok(())
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let mut options = Options::default();
    let mut verbose = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_usage();
                return;
            }
            "-c" | "--command" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --command requires a value");
                    std::process::exit(1);
                }
                let n = options.commands.len() + 1;
                options.commands.push((n, args[i].to_string()));
            }
            "-s" | "--script" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --script requires a file path");
                    std::process::exit(1);
                }
                options.scripts.push(PathBuf::from(&args[i]));
            }
            "-o" | "--output" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --output requires a file path");
                    std::process::exit(1);
                }
                options.output_file = Some(PathBuf::from(&args[i]));
            }
            "--config" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --config requires a file path");
                    std::process::exit(1);
                }
                options.config_file = Some(PathBuf::from(&args[i]));
            }
            "--no-config" => options.no_config = true,
            "-v" | "--verbose" => verbose = true,
            arg if arg.starts_with('-') => {
                eprintln!("Error: Unknown option: {}", arg);
                print_usage();
                std::process::exit(1);
            }
            _ => {
                if options.file_path.is_none() {
                    options.file_path = Some(PathBuf::from(&args[i]));
                } else {
                    eprintln!("Error: Unexpected argument: {}", args[i]);
                    print_usage();
                    std::process::exit(1);
                }
            }
        }
        i += 1;
    }

    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(if verbose { LevelFilter::Debug } else { LevelFilter::Off });
    }

    if let Err(e) = run(options) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
