//! Toolhost CLI binary entry point.

use std::io::Write;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use toolhost::agent_loop::{TurnEvent, TurnRunner};
use toolhost::cli::{self, Cli, SlashCommand, HELP_TEXT};
use toolhost::config::{Credentials, McpConfig};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(args: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let settings = args.settings(Credentials::from_env());
    let config = McpConfig::load(args.config.as_deref())?;

    let registry = Arc::new(toolhost::mcp::connect_servers(&config).await?);
    let provider = match toolhost::provider::create_provider(&settings) {
        Ok(provider) => provider,
        Err(e) => {
            registry.close_all().await;
            return Err(e.into());
        }
    };

    let sink = Arc::new(|event: TurnEvent| {
        if let Some(line) = cli::render_event(&event) {
            println!("{line}");
        }
    });
    let mut runner = TurnRunner::from_registry(provider, Arc::clone(&registry), settings)
        .await
        .with_event_sink(sink);

    println!(
        "Using {} ({}) with {} tools. Type /help for commands.",
        runner.provider().name(),
        runner.provider().model_id(),
        runner.tools().len()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\nYou: ");
        let _ = std::io::stdout().flush();

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        let prompt = line.trim();
        if prompt.is_empty() {
            continue;
        }

        match SlashCommand::parse(prompt) {
            Some(Ok(SlashCommand::Quit)) => break,
            Some(Ok(SlashCommand::Help)) => println!("{HELP_TEXT}"),
            Some(Ok(SlashCommand::Tools)) => println!("{}", cli::render_tools(runner.tools())),
            Some(Ok(SlashCommand::Servers)) => println!("{}", cli::render_servers(&config)),
            Some(Ok(SlashCommand::History)) => {
                println!("{}", cli::render_history(runner.history().messages()))
            }
            Some(Ok(SlashCommand::Clear)) => {
                runner.clear_history();
                println!("History cleared.");
            }
            Some(Err(message)) => println!("{message}"),
            None => {
                let cancel = CancellationToken::new();
                let turn = runner.run_turn(prompt, &cancel);
                tokio::pin!(turn);
                // Errors are reported through the event sink; the session continues.
                let _ = loop {
                    tokio::select! {
                        result = &mut turn => break result,
                        _ = tokio::signal::ctrl_c() => cancel.cancel(),
                    }
                };
            }
        }
    }

    info!("Shutting down tool servers");
    registry.close_all().await;
    println!("Goodbye!");
    Ok(())
}
