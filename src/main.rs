//! CLI entry point for `mailsift`.

use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};

use mailsift::config::Config;
use mailsift::export::output::DirectoryOutput;
use mailsift::task::{self, InputFile, TaskResult};

#[derive(Parser)]
#[command(
    name = "mailsift",
    version,
    about = "Extract timeline metadata and attachments from EML and MBOX files"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse email files into a CSV per file plus extracted attachments
    Run {
        /// Input files (.eml or .mbox)
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Output directory
        #[arg(short, long, env = "MAILSIFT_OUTPUT")]
        output: PathBuf,
        /// Print the task result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = mailsift::config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Run {
            inputs,
            output,
            json,
        } => cmd_run(&inputs, &output, json, &config),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with an env filter, a stderr layer and, when possible, a
/// log file in the configured log directory.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = mailsift::config::log_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mailsift.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Run the extraction task over `inputs` and report the produced files.
fn cmd_run(inputs: &[PathBuf], output: &Path, json: bool, config: &Config) -> anyhow::Result<()> {
    let inputs: Vec<InputFile> = inputs.iter().map(|p| InputFile::from_path(p)).collect();
    let out = DirectoryOutput::new(output)?;

    let result = task::run(&inputs, &out, config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result_table(&result);
    }
    Ok(())
}

fn print_result_table(result: &TaskResult) {
    println!(
        "  {} input(s) processed, {} skipped, {} message(s), {} attachment(s)",
        result.meta.inputs_processed,
        result.meta.inputs_skipped,
        result.meta.messages,
        result.meta.attachments
    );
    println!();
    println!("  TYPE   PATH");
    println!("  {}", "-".repeat(60));
    for file in &result.output_files {
        println!("  {:<6} {}", file.data_type, file.path.display());
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailsift", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}
