//! Complete command

use crate::app::{CompleteArgs, OutputFormat};
use anyhow::Result;
use futures::StreamExt;
use llmbridge_core::{build_messages, resolve_completion_target, BridgeConfig, CompletionClient};
use std::io::Write;

pub async fn run(args: CompleteArgs, mut config: BridgeConfig, format: OutputFormat) -> Result<()> {
    if let Some(max_tokens) = args.max_tokens {
        config.max_tokens = max_tokens;
    }
    let target = resolve_completion_target(&config);
    let client = CompletionClient::new(config);

    let text = if args.stream {
        let messages = build_messages(&args.prompt, args.system.as_deref(), &[]);
        let mut deltas = client.stream(&messages).await?;
        let mut text = String::new();
        let mut stdout = std::io::stdout();

        while let Some(delta) = deltas.next().await {
            let delta = delta?;
            if format == OutputFormat::Cli {
                write!(stdout, "{}", delta)?;
                stdout.flush()?;
            }
            text.push_str(&delta);
        }
        if format == OutputFormat::Cli {
            writeln!(stdout)?;
            return Ok(());
        }
        text
    } else {
        client
            .complete(&args.prompt, args.system.as_deref(), &[], args.json)
            .await?
    };

    match format {
        OutputFormat::Json => {
            let report = serde_json::json!({
                "provider": target.provider,
                "model": target.model,
                "text": text,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Cli => println!("{}", text),
    }
    Ok(())
}
