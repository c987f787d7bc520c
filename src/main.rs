mod cmd;

use clap::{Parser, Subcommand};
use khmer_ner::envconfig::Settings;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "khmer-ner")]
#[command(version)]
#[command(about = "Named entity recognition for Khmer text", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API
    Serve,
    /// Tag a single text
    Predict {
        text: String,
        #[arg(long)]
        json: bool,
    },
    /// Print the word segmentation of a text
    Segment { text: String },
    /// Show the configured model files and their tensors
    Inspect,
    /// Write a random model bundle with the expected layout
    Scaffold {
        #[arg(short, long)]
        out: PathBuf,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

fn init_logging(level: &str) {
    let level = level.parse::<tracing::Level>().unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    init_logging(&settings.log_level);

    let result = match cli.command {
        Commands::Serve => cmd::serve(settings).await,
        Commands::Predict { text, json } => cmd::predict(settings, &text, json).await,
        Commands::Segment { text } => cmd::segment(&settings, &text),
        Commands::Inspect => cmd::inspect(&settings),
        Commands::Scaffold { out, seed } => cmd::scaffold(&out, seed),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}
