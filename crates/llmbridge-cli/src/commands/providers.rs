//! Providers command

use crate::app::OutputFormat;
use anyhow::Result;
use llmbridge_core::{
    embedding_dimension, resolve_completion_target, resolve_embedding_provider, BridgeConfig,
};

pub async fn run(config: &BridgeConfig, format: OutputFormat) -> Result<()> {
    let embedding = resolve_embedding_provider(&config.credentials());
    let dimensions = embedding_dimension(embedding);
    let completion = resolve_completion_target(config);
    let validation = config.validate();

    match format {
        OutputFormat::Json => {
            let report = serde_json::json!({
                "embedding": {
                    "provider": embedding.as_str(),
                    "dimensions": dimensions,
                },
                "completion": {
                    "provider": completion.provider,
                    "model": completion.model,
                    "supported": config.supported_llm_providers,
                },
                "valid": validation.is_ok(),
                "error": validation.as_ref().err().map(|e| e.to_string()),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Cli => {
            println!("Embedding:");
            println!("  Provider:      {}", embedding);
            println!("  Dimensions:    {}", dimensions);
            println!();
            println!("Completion:");
            println!("  Provider:      {}", completion.provider);
            println!(
                "  Model:         {}",
                completion.model.as_deref().unwrap_or("(adapter default)")
            );
            println!(
                "  Supported:     {}",
                config.supported_llm_providers.join(", ")
            );
            println!();
            match validation {
                Ok(()) => println!("Configuration:   ok"),
                Err(e) => println!("Configuration:   {}", e),
            }
        }
    }
    Ok(())
}
