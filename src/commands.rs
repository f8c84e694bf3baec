use anyhow::{Context, Result};
use console::style;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::mcp::{McpServer, register_tools};
use crate::provider::OpenAiClient;
use crate::rag::{Answer, RagService, UploadReceipt};

/// Start the MCP server on stdio, serving sessions until the client disconnects
#[inline]
pub async fn serve_mcp(config: &Config) -> Result<()> {
    info!("Starting MCP server on stdio");

    // Verify provider connectivity before accepting uploads
    let client = Arc::new(
        OpenAiClient::from_env(&config.provider).context("Failed to create provider client")?,
    );
    let health_client = Arc::clone(&client);
    let health = tokio::task::spawn_blocking(move || health_client.health_check())
        .await
        .context("Provider health check panicked")?;
    match health {
        Ok(()) => info!(
            "✅ Provider reachable at {} (embeddings: {}, chat: {})",
            config.provider.base_url, config.provider.embedding_model, config.provider.chat_model
        ),
        Err(e) => warn!(
            "⚠️  Provider at {} is not responding: {}. Uploads may fail.",
            config.provider.base_url, e
        ),
    }

    let service = Arc::new(
        RagService::with_provider(config, client).context("Failed to create RAG service")?,
    );
    let sweeper = service.sessions().spawn_sweeper();

    let server = Arc::new(McpServer::new(
        "session-rag".to_string(),
        env!("CARGO_PKG_VERSION").to_string(),
    ));
    register_tools(&server, &service).await;

    let result = server.serve_stdio().await;

    if let Some(handle) = sweeper {
        handle.abort();
    }
    info!(
        "MCP server stopped with {} live sessions",
        service.sessions().len().await
    );
    result
}

/// Upload `file`, answer a single question and discard the session
#[inline]
pub async fn ask_once(config: &Config, file: &Path, question: &str) -> Result<()> {
    let service = RagService::from_config(config).context("Failed to create RAG service")?;
    let receipt = upload_with_spinner(&service, file).await?;

    let answer = service
        .answer(&receipt.session_id, question)
        .await
        .context("Failed to answer question")?;
    print_answer(&answer);

    service.end_session(&receipt.session_id).await?;
    Ok(())
}

/// Upload `file` and answer questions from the terminal until an empty line or `exit`
#[inline]
pub async fn chat(config: &Config, file: &Path) -> Result<()> {
    let service = RagService::from_config(config).context("Failed to create RAG service")?;
    let receipt = upload_with_spinner(&service, file).await?;

    eprintln!(
        "{}",
        style("Ask questions about the document. Enter an empty line or 'exit' to quit.").dim()
    );

    loop {
        let question: String = Input::new()
            .with_prompt(style("Question").bold().to_string())
            .allow_empty(true)
            .interact_text()?;
        let question = question.trim();
        if question.is_empty() || question.eq_ignore_ascii_case("exit") {
            break;
        }

        match service.answer(&receipt.session_id, question).await {
            Ok(answer) => print_answer(&answer),
            Err(e) => eprintln!("{} {}", style("Error:").red().bold(), e),
        }
    }

    service.end_session(&receipt.session_id).await?;
    eprintln!("{}", style("Session ended.").dim());
    Ok(())
}

async fn upload_with_spinner(service: &RagService, file: &Path) -> Result<UploadReceipt> {
    let bar = if console::user_attended_stderr() {
        ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} {msg}").expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    };
    bar.set_message(format!("Indexing {}", file.display()));
    bar.enable_steady_tick(Duration::from_millis(100));

    let result = service.upload_path(file, None).await;
    bar.finish_and_clear();

    let receipt =
        result.with_context(|| format!("Failed to upload document: {}", file.display()))?;
    eprintln!(
        "{} {} ({} chunks)",
        style("✓").green(),
        receipt.status,
        style(receipt.chunk_count).cyan()
    );
    Ok(receipt)
}

fn print_answer(answer: &Answer) {
    println!("{}", answer.answer);
    eprintln!(
        "{}",
        style(format!("({} context chunks)", answer.context.len())).dim()
    );
}
