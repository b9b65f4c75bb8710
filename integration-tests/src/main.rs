//! End-to-end scenario runner for the work-item MCP server.
//!
//! Exercises [`mcp_protocol::dispatcher::ToolDispatcher`] directly over an
//! in-process store — no spawned binary, no socket — so every testable
//! property and concrete scenario runs as a single fast in-memory pass.

mod harness;
mod scenarios;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "work-item-integration-tests")]
struct Args {
    /// Only run scenarios whose name contains this substring.
    #[arg(short, long)]
    filter: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let all = scenarios::all();
    let selected: Vec<_> = all
        .into_iter()
        .filter(|(name, _)| args.filter.as_deref().map(|f| name.contains(f)).unwrap_or(true))
        .collect();

    let mut passed = 0;
    let mut failed = 0;
    for (name, fut) in selected {
        match fut.await {
            Ok(()) => {
                println!("PASS  {name}");
                passed += 1;
            }
            Err(e) => {
                println!("FAIL  {name}\n      {e}");
                failed += 1;
            }
        }
    }

    println!("\n{passed} passed, {failed} failed");
    if failed > 0 {
        std::process::exit(1);
    }
}
