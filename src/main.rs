use std::io::{self, Read};
use std::path::PathBuf;

use clap::{Parser as ClapParser, Subcommand};
use datakit_pipeline::cli::{self, CheckOptions, CheckResult, CliError};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(ClapParser)]
#[command(name = "datakit-pl")]
#[command(about = "Run pipeline scripts that parse and re-tag telemetry records")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a script and run it over input lines
    Check {
        /// Path to the pipeline script
        script: PathBuf,

        /// Input text, one record per line (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<String>,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,

        /// Only compile the script, don't run it
        #[arg(long)]
        syntax_only: bool,

        /// Engine configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// List built-in functions, or describe one
    Funcs {
        name: Option<String>,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check {
            script,
            input,
            pretty,
            syntax_only,
            config,
        } => run_check(CheckOptions {
            script,
            input,
            pretty,
            syntax_only,
            config,
        }),
        Commands::Funcs { name } => run_funcs(name),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run_check(mut options: CheckOptions) -> Result<(), CliError> {
    if options.input.is_none() && !options.syntax_only && !atty::is(atty::Stream::Stdin) {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        options.input = Some(buffer);
    }

    match cli::execute_check(&options)? {
        CheckResult::SyntaxValid => println!("Syntax is valid"),
        CheckResult::Records(records) => {
            let mut failed = false;
            for record in records {
                if record.dropped {
                    println!("(dropped) {}", record.output);
                } else {
                    println!("{}", record.output);
                }
                if let Some(error) = record.error {
                    eprintln!("error: {}", error);
                    failed = true;
                }
            }
            if failed {
                std::process::exit(2);
            }
        }
    }
    Ok(())
}

fn run_funcs(name: Option<String>) -> Result<(), CliError> {
    let engine = datakit_pipeline::Engine::new();
    match name {
        Some(name) => print!("{}", cli::function_doc(engine.functions(), &name)?),
        None => print!("{}", cli::functions_overview(engine.functions())),
    }
    Ok(())
}
