//! CLI argument definitions

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "llmbridge")]
#[command(
    author,
    version,
    about = "Completions and embeddings over interchangeable LLM providers"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "cli")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show which providers the current environment resolves to
    Providers,

    /// Embed texts
    Embed(EmbedArgs),

    /// Send a prompt to the completion provider
    Complete(CompleteArgs),
}

#[derive(Args)]
pub struct EmbedArgs {
    /// Texts to embed
    #[arg(required = true)]
    pub texts: Vec<String>,

    /// Texts per provider request (0 = default)
    #[arg(short, long, default_value = "50")]
    pub batch_size: usize,
}

#[derive(Args)]
pub struct CompleteArgs {
    /// Prompt text
    pub prompt: String,

    /// System instruction
    #[arg(short, long)]
    pub system: Option<String>,

    /// Return only the JSON object found in the reply
    #[arg(long)]
    pub json: bool,

    /// Print the reply as it arrives
    #[arg(long, conflicts_with = "json")]
    pub stream: bool,

    /// Maximum tokens to generate (overrides LLM_MAX_TOKENS)
    #[arg(long)]
    pub max_tokens: Option<u32>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Cli,
    Json,
}
