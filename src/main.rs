use anyhow::{Context, Result};
use clap::Parser;
use filerag::router::is_exit;
use filerag::{Assistant, Config};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "filerag")]
#[command(about = "Ask questions about your PDF and text files, one file at a time")]
#[command(version)]
struct Cli {
    /// Path to config file (default: ./config.toml, or $FILERAG_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Process a single input line, print the reply and exit
    #[arg(long, value_name = "INPUT")]
    once: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    // Logs go to stderr; default level stays quiet so the conversation is readable
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", config.filerag.log_level.as_str()),
    )
    .init();

    let assistant = Assistant::from_config(&config).context("Failed to initialise assistant")?;

    for report in assistant.recover().await {
        log::info!("Finished interrupted deletion of {} ({})", report.filename, report.file_id);
    }

    if let Some(input) = cli.once {
        println!("{}", assistant.process_input(&input).await);
        return Ok(());
    }

    run_repl(&assistant).await
}

async fn run_repl(assistant: &Assistant) -> Result<()> {
    println!("RAG Assistant initialized! Type 'hi' or 'help' to see what I can do.");
    println!("\n{}", "=".repeat(60));
    println!("RAG Assistant - Conversational Mode");
    println!("{}", "=".repeat(60));
    println!("Type 'exit' to quit, 'help' for assistance\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("You: ");
        std::io::stdout().flush().context("Failed to flush stdout")?;

        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = tokio::signal::ctrl_c() => {
                println!("\nGoodbye!");
                return Ok(());
            }
        };

        let input = match line {
            Ok(Some(line)) => line,
            // EOF
            Ok(None) => {
                println!("\nGoodbye!");
                return Ok(());
            }
            Err(e) => return Err(e).context("Failed to read from stdin"),
        };

        let input = input.trim();
        if is_exit(input) {
            println!("Goodbye!");
            return Ok(());
        }
        if input.is_empty() {
            continue;
        }

        let reply = tokio::select! {
            reply = assistant.process_input(input) => reply,
            _ = tokio::signal::ctrl_c() => {
                println!("\nGoodbye!");
                return Ok(());
            }
        };
        println!("Assistant: {}\n", reply);
    }
}
