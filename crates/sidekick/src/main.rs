//! Interactive chat with a local model that can call the built-in tools.

#[macro_use]
extern crate tracing;

use std::io::Write as _;
use std::time::Duration;

use anyhow::Context as _;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use serde_json::Value;
use sidekick::{Config, SessionBuilder};
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt};
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::sleep;

const BAR_CHAR: &str = "▎";

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env().context("failed to read configuration")?;
    info!("using {} at {}", config.model, config.ollama_url);

    let (tool_tx, mut tool_rx) = mpsc::unbounded_channel();

    let mut session = SessionBuilder::from_config(&config)
        .with_context(|| {
            format!("cannot open project root {}", config.root.display())
        })?
        .on_tool_call(move |req| {
            let args = Value::Object(req.arguments.clone());
            tool_tx.send((req.name.clone(), args)).ok();
        })
        .build()?;

    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .expect("valid progress template")
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

    println!(
        "{}",
        "Sidekick is ready. Type 'exit' or 'quit' to leave.".dimmed()
    );

    let mut stdin = io::BufReader::new(io::stdin());
    loop {
        print!("You: ");
        std::io::stdout().flush()?;

        let Some(line) = read_line(&mut stdin).await else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit")
        {
            println!("Goodbye!");
            break;
        }

        let turn = session.send_message(line);
        tokio::pin!(turn);

        let mut progress_bar = None;
        let result = loop {
            // Create a new progress bar if it has been finished.
            progress_bar
                .get_or_insert_with(|| {
                    let progress_bar = ProgressBar::new_spinner();
                    progress_bar.set_style(progress_style.clone());
                    progress_bar.set_message("🤔 Thinking...");
                    progress_bar
                })
                .inc(1);

            select! {
                result = &mut turn => break result,
                Some((name, args)) = tool_rx.recv() => {
                    // Finish the progress bar before printing anything else.
                    if let Some(progress_bar) = progress_bar.take() {
                        progress_bar.finish_and_clear();
                    }
                    println!(
                        "{}{}",
                        BAR_CHAR.dimmed(),
                        format!("Calling tool '{name}' with args {args}")
                            .dimmed()
                    );
                }
                _ = sleep(Duration::from_millis(100)) => {}
            }
        };

        if let Some(progress_bar) = progress_bar {
            progress_bar.finish_and_clear();
        }

        match result {
            Ok(turn) => {
                println!("{} {}", "Agent:".bright_cyan().bold(), turn.text.cyan());
            }
            Err(err) => {
                println!("{}", format!("Error: {err}").red());
            }
        }
    }
    Ok(())
}

async fn read_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> Option<String> {
    let mut line = String::new();

    match reader.read_line(&mut line).await {
        Ok(count) => {
            if count == 0 {
                return None;
            }
            Some(line)
        }
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_line_keeps_buffered_lines() {
        let mut input: &[u8] = b"hello\nexit\n";
        assert_eq!(read_line(&mut input).await.as_deref(), Some("hello\n"));
        assert_eq!(read_line(&mut input).await.as_deref(), Some("exit\n"));
        assert_eq!(read_line(&mut input).await, None);
    }
}
