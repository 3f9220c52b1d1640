mod debug_report;

use clap::{Parser, Subcommand};
use cubist::decode::{Decoder, RuleTable};
use cubist::{Config, Error, decode_line, extract_corpus};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(version, about = "Hierarchical rule extraction and cube-pruning chart decoding.")]
struct Cli {
    /// TOML configuration; built-in defaults when omitted.
    #[arg(long, short = 'c', value_name = "FILE", global = true)]
    config: Option<PathBuf>,
    /// Print a run report to stderr.
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
    /// Force ANSI color in the report.
    #[arg(long, global = true, conflicts_with = "no_color")]
    color: bool,
    /// Disable ANSI color in the report.
    #[arg(long, global = true)]
    no_color: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Extract rules from a word-aligned corpus and write them to stdout.
    Extract {
        /// Source sentences, one per line.
        #[arg(long, value_name = "FILE")]
        source: PathBuf,
        /// Target sentences, one per line.
        #[arg(long, value_name = "FILE")]
        target: PathBuf,
        /// Alignments in `i-j` notation, one sentence per line.
        #[arg(long, value_name = "FILE")]
        align: PathBuf,
    },
    /// Translate sentences read from stdin, one per line.
    Decode {
        /// Rule stream written by `extract`.
        #[arg(long, value_name = "FILE")]
        rules: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> cubist::Result<()> {
    let config = match &cli.config {
        Some(path) => cubist::config::load(path)?,
        None => Config::default(),
    };
    let color = !cli.no_color && (cli.color || io::stderr().is_terminal());

    match &cli.command {
        Command::Extract { source, target, align } => {
            let res = extract_corpus(open(source)?, open(target)?, open(align)?, &config.extract)?;

            let mut out = BufWriter::new(io::stdout().lock());
            res.registry.write_rules(&mut out)?;
            out.flush()?;

            if cli.verbose {
                debug_report::print_extract(&res.metrics, res.registry.merged_len(), color);
            }
        }
        Command::Decode { rules } => {
            let table = RuleTable::read(open(rules)?, &config.decode, &config.weight)?;
            let decoder = Decoder::new(&table, &config.decode, &config.weight);

            let mut out = BufWriter::new(io::stdout().lock());
            for (i, line) in io::stdin().lock().lines().enumerate() {
                let line = line?;
                match decode_line(&decoder, &line) {
                    Ok(res) => {
                        writeln!(out, "{}", res.translation)?;
                        if cli.verbose {
                            debug_report::print_decode(&res, color);
                        }
                    }
                    Err(err) if err.is_sentence_scoped() => {
                        tracing::warn!(line = i + 1, error = %err, "skipping sentence");
                        writeln!(out)?;
                    }
                    Err(err) => return Err(err),
                }
            }
            out.flush()?;
        }
    }

    Ok(())
}

fn open(path: &Path) -> cubist::Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|err| Error::Io(io::Error::new(err.kind(), format!("{}: {err}", path.display()))))
}
