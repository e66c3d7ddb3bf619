//! Embed command

use crate::app::{EmbedArgs, OutputFormat};
use anyhow::Result;
use llmbridge_core::{BatchEmbedDriver, BridgeConfig, Embedder, EmbeddingClient, RetryPolicy};

pub async fn run(
    args: EmbedArgs,
    config: &BridgeConfig,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let client = EmbeddingClient::from_config(config);
    let provider = client.resolved_provider();
    let model_name = client.model_name().to_string();

    let policy = RetryPolicy::default().with_batch_size(args.batch_size);
    let driver = BatchEmbedDriver::with_policy(client, policy);
    let batch = driver.embed_all(&args.texts).await;

    match format {
        OutputFormat::Json => {
            let degraded: Vec<[usize; 2]> = batch
                .degraded
                .iter()
                .map(|range| [range.start, range.end])
                .collect();
            let report = serde_json::json!({
                "provider": provider.as_str(),
                "model": model_name,
                "dimensions": batch.dimensions,
                "count": batch.len(),
                "degraded": degraded,
                "vectors": batch.vectors,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Cli => {
            println!(
                "Embedded {} texts with {} ({}, {} dimensions)",
                batch.len(),
                model_name,
                provider,
                batch.dimensions
            );

            for range in &batch.degraded {
                println!(
                    "  Warning: rows {}..{} could not be embedded and are zero vectors",
                    range.start, range.end
                );
            }

            if verbose {
                for (text, vector) in args.texts.iter().zip(&batch.vectors) {
                    let preview: Vec<String> =
                        vector.iter().take(4).map(|x| format!("{:.4}", x)).collect();
                    println!("  {:<30} [{}, ...]", truncate(text, 30), preview.join(", "));
                }
            }
        }
    }
    Ok(())
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars - 3).collect();
        format!("{}...", head)
    }
}
