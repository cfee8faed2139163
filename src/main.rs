//! `adde` - agent-driven development executor.
//!
//! A tool-oriented CLI that lets a code-generating agent provision isolated
//! Docker sandboxes, inject and execute generated code under resource caps,
//! build images from staged contexts, and read structured execution logs.
//! Each invocation performs exactly one tool operation and prints one line
//! of result JSON on stdout; diagnostics go to stderr.

use std::io::Read;
use std::time::Duration;

use clap::Parser;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod executor;

use executor::types::*;

/// Hard ceiling for a single tool invocation.
const INVOCATION_TIMEOUT: Duration = Duration::from_secs(10 * 60);

const USAGE: &str = "usage: adde <tool> [json_payload]
  tool: pull_image | create_runtime_env | execute_code_block | get_container_logs | cleanup_env | prepare_build_context | build_image_from_context | build_image_from_path | list_agent_images | delete_image | prune_build_cache
  json_payload: JSON object for the tool, or omit to read from stdin";

#[derive(Parser)]
#[command(name = "adde")]
#[command(
    author,
    version,
    about = "Agent-driven development executor - sandboxed code execution tools over Docker"
)]
struct Cli {
    /// Tool name, e.g. execute_code_block
    tool: Option<String>,

    /// JSON payload for the tool; omitted = read from stdin
    payload: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("adde=debug")
    } else {
        EnvFilter::new("adde=info")
    };

    // stdout is reserved for result JSON.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let Some(tool) = cli.tool else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };

    let payload = match cli.payload {
        Some(payload) => payload,
        None => {
            let mut buf = String::new();
            if let Err(e) = std::io::stdin().read_to_string(&mut buf) {
                eprintln!("adde: read stdin: {e}");
                std::process::exit(1);
            }
            buf
        }
    };

    let code = match tokio::time::timeout(INVOCATION_TIMEOUT, run_tool(&tool, &payload)).await {
        Ok(code) => code,
        Err(_) => {
            eprintln!(
                "adde: invocation timed out after {} seconds",
                INVOCATION_TIMEOUT.as_secs()
            );
            1
        }
    };
    std::process::exit(code);
}

async fn run_tool(tool: &str, payload: &str) -> i32 {
    // prepare_build_context is pure filesystem staging; it must work without
    // a reachable daemon.
    if tool == "prepare_build_context" {
        let Some(p) = parse_payload::<PrepareBuildContextParams>(payload) else {
            return 1;
        };
        let result = executor::context::prepare_build_context(p);
        return emit(&result, result.error.is_some());
    }

    if !is_known_tool(tool) {
        eprintln!("adde: unknown tool {tool:?}");
        return 2;
    }

    let docker = match executor::connect() {
        Ok(docker) => docker,
        Err(e) => {
            eprintln!("adde: {e}");
            return 1;
        }
    };

    match tool {
        "pull_image" => {
            let Some(p) = parse_payload::<PullImageParams>(payload) else {
                return 1;
            };
            let result = executor::pull::pull_image(&docker, p).await;
            emit(&result, result.error.is_some())
        }
        "create_runtime_env" => {
            let Some(p) = parse_payload::<CreateRuntimeEnvParams>(payload) else {
                return 1;
            };
            let result = executor::create::create_runtime_env(&docker, p).await;
            emit(&result, result.error.is_some())
        }
        "execute_code_block" => {
            let Some(p) = parse_payload::<ExecuteCodeBlockParams>(payload) else {
                return 1;
            };
            let result = executor::execute::execute_code_block(&docker, p).await;
            emit(&result, result.error.is_some())
        }
        "get_container_logs" => {
            let Some(p) = parse_payload::<GetContainerLogsParams>(payload) else {
                return 1;
            };
            let result = executor::logs::get_container_logs(&docker, p).await;
            emit(&result, result.error.is_some())
        }
        "cleanup_env" => {
            let Some(p) = parse_payload::<CleanupEnvParams>(payload) else {
                return 1;
            };
            let result = executor::cleanup::cleanup_env(&docker, p).await;
            emit(&result, result.error.is_some())
        }
        "build_image_from_context" => {
            let Some(p) = parse_payload::<BuildImageFromContextParams>(payload) else {
                return 1;
            };
            let result = executor::build::build_image_from_context(&docker, p).await;
            emit(&result, result.is_err())
        }
        "build_image_from_path" => {
            let Some(p) = parse_payload::<BuildImageFromPathParams>(payload) else {
                return 1;
            };
            let result = executor::build::build_image_from_path(&docker, p).await;
            emit(&result, result.is_err())
        }
        "list_agent_images" => {
            let Some(p) = parse_payload::<ListAgentImagesParams>(payload) else {
                return 1;
            };
            let result = executor::images::list_agent_images(&docker, p).await;
            emit(&result, result.error.is_some())
        }
        "delete_image" => {
            let Some(p) = parse_payload::<DeleteImageParams>(payload) else {
                return 1;
            };
            let result = executor::images::delete_image(&docker, p).await;
            emit(&result, result.error.is_some())
        }
        "prune_build_cache" => {
            let Some(p) = parse_payload::<PruneBuildCacheParams>(payload) else {
                return 1;
            };
            let result = executor::images::prune_build_cache(&docker, p).await;
            emit(&result, result.error.is_some())
        }
        _ => unreachable!("tool validated above"),
    }
}

fn is_known_tool(tool: &str) -> bool {
    matches!(
        tool,
        "pull_image"
            | "create_runtime_env"
            | "execute_code_block"
            | "get_container_logs"
            | "cleanup_env"
            | "prepare_build_context"
            | "build_image_from_context"
            | "build_image_from_path"
            | "list_agent_images"
            | "delete_image"
            | "prune_build_cache"
    )
}

/// Parses the tool payload; on failure prints a diagnostic to stderr and a
/// single-field error JSON to stdout so callers always get a machine-readable
/// body.
fn parse_payload<T: DeserializeOwned>(payload: &str) -> Option<T> {
    match serde_json::from_str(payload) {
        Ok(p) => Some(p),
        Err(e) => {
            eprintln!("adde: invalid payload: {e}");
            println!("{}", serde_json::json!({ "error": e.to_string() }));
            None
        }
    }
}

/// Prints the result envelope as a single JSON line and returns the exit
/// code implied by it.
fn emit<T: Serialize>(result: &T, failed: bool) -> i32 {
    match serde_json::to_string(result) {
        Ok(json) => {
            println!("{json}");
            i32::from(failed)
        }
        Err(e) => {
            eprintln!("adde: encode: {e}");
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PUBLISHED_TOOLS: [&str; 11] = [
        "pull_image",
        "create_runtime_env",
        "execute_code_block",
        "get_container_logs",
        "cleanup_env",
        "prepare_build_context",
        "build_image_from_context",
        "build_image_from_path",
        "list_agent_images",
        "delete_image",
        "prune_build_cache",
    ];

    #[test]
    fn test_all_published_tools_are_known() {
        for tool in PUBLISHED_TOOLS {
            assert!(is_known_tool(tool), "{tool} should be known");
        }
    }

    #[test]
    fn test_unknown_tools_are_rejected() {
        assert!(!is_known_tool("no_such_tool"));
        assert!(!is_known_tool(""));
        assert!(!is_known_tool("pull"));
    }

    #[test]
    fn test_usage_lists_every_tool() {
        for tool in PUBLISHED_TOOLS {
            assert!(USAGE.contains(tool), "usage should mention {tool}");
        }
    }
}
