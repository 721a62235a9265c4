use std::fs;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};

use sable::ast_printer::AstPrinter;
use sable::error::SableError;
use sable::interpreter::Interpreter;
use sable::parser::Parser;
use sable::resolver::Resolver;
use sable::scanner::Scanner;
use sable::token::Token;

#[derive(ClapParser, Debug)]
#[command(version, about = "Sable language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenize a source file, printing each token
    Tokenize {
        filename: PathBuf,

        /// Emit the token list as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse a source file and print its syntax tree
    Parse {
        filename: PathBuf,

        /// Emit the syntax tree as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a source file as a Sable program
    Run { filename: PathBuf },
}

/// Read a source file into a `String`, validating UTF-8.
fn read_file(filename: &PathBuf) -> Result<String> {
    info!("Reading file: {:?}", filename);

    let buf = fs::read(filename).context(format!("Failed to open file {:?}", filename))?;

    info!("Read {} bytes from {:?}", buf.len(), filename);

    let source = String::from_utf8(buf).map_err(SableError::from)?;

    Ok(source)
}

/// Scan the whole source, separating good tokens from lex errors so one run
/// reports every bad character.
fn scan(source: &str) -> (Vec<Token<'_>>, Vec<SableError>) {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for result in Scanner::new(source) {
        match result {
            Ok(token) => {
                debug!("Scanned token: {}", token);

                tokens.push(token);
            }

            Err(e) => errors.push(e),
        }
    }

    (tokens, errors)
}

fn init_logger() -> Result<()> {
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    // Write records to the file with module path and source line, stripping
    // the crate prefix.
    Builder::new()
        .format(|buf, record| {
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("sable::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));

            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug) // default Debug, override with RUST_LOG
        .init();

    info!("Logger initialized, writing to app.log");

    Ok(())
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    if args.log {
        init_logger()?;
    } else {
        // Minimal logger to avoid "no logger" errors.
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    match args.command {
        Commands::Tokenize { filename, json } => {
            info!("Running Tokenize subcommand");

            let source = read_file(&filename)?;
            let (tokens, errors) = scan(&source);

            for e in &errors {
                eprintln!("{}", e);
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&tokens)?);
            } else {
                for token in &tokens {
                    println!("{}", token);
                }
            }

            if !errors.is_empty() {
                debug!("Tokenization failed, exiting with code 65");

                std::process::exit(65);
            }

            info!("Tokenization completed successfully");
        }

        Commands::Parse { filename, json } => {
            info!("Running Parse subcommand");

            let source = read_file(&filename)?;
            let (tokens, lex_errors) = scan(&source);

            for e in &lex_errors {
                eprintln!("{}", e);
            }

            match Parser::new(&tokens).parse() {
                Ok(statements) => {
                    if !lex_errors.is_empty() {
                        std::process::exit(65);
                    }

                    if json {
                        println!("{}", serde_json::to_string_pretty(&statements)?);
                    } else {
                        println!("{}", AstPrinter.print_program(&statements));
                    }
                }

                Err(errors) => {
                    for e in &errors {
                        eprintln!("{}", e);
                    }

                    std::process::exit(65);
                }
            }

            info!("Parse subcommand completed");
        }

        Commands::Run { filename } => {
            info!("Running Run subcommand");

            let source = read_file(&filename)?;
            let (tokens, lex_errors) = scan(&source);

            for e in &lex_errors {
                eprintln!("{}", e);
            }

            let statements = match Parser::new(&tokens).parse() {
                Ok(statements) => statements,

                Err(parse_errors) => {
                    for e in &parse_errors {
                        eprintln!("{}", e);
                    }

                    std::process::exit(65);
                }
            };

            if !lex_errors.is_empty() {
                std::process::exit(65);
            }

            info!("Parsed {} statements", statements.len());

            let mut interpreter = Interpreter::new();

            // Any resolution error skips execution entirely.
            if let Err(resolve_errors) = Resolver::new(&mut interpreter).resolve(&statements) {
                for e in &resolve_errors {
                    eprintln!("{}", e);
                }

                std::process::exit(65);
            }

            if let Err(e) = interpreter.interpret(&statements) {
                eprintln!("{}", e);

                std::process::exit(70);
            }

            info!("Program executed successfully");
        }
    }

    Ok(())
}
