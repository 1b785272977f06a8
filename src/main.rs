use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use flouri::agent::log::SessionLog;
use flouri::agent::{ToolOptions, ToolRuntime};
use flouri::completions::CompletionRegistry;
use flouri::config::{default_config_path, Config};
use flouri::config_manager::ConfigManager;
use flouri::manager::ToolManager;
use flouri::session::Session;
use flouri::skills::SkillRegistry;

fn print_help() {
    println!(
        "\
flouri v{}

Skills and tools for a conversational shell assistant.

USAGE:
    flouri [OPTIONS] <COMMAND>

COMMANDS:
    tools                    List enabled tools
    available                List every known tool with its description
    enable <TOOL>            Enable the skill providing TOOL
    disable <TOOL>           Disable the skill providing TOOL
    call <TOOL> [JSON]       Run one tool with JSON arguments (default: {{}})
    complete <LINE>          Print completions for a partial command line

OPTIONS:
    -c, --config <PATH>      Configuration file [default: {}]
        --tools <A,B,..>     Expose exactly these tools, ignoring saved state
        --no-log             Do not write a conversation log for `call`
    -h, --help               Print this help message and exit
    -V, --version            Print version and exit

ENVIRONMENT VARIABLES:
    Variables are referenced in the config file via ${{VAR_NAME}} syntax.

    RUST_LOG                 Log level filter for tracing
                             (e.g. debug, flouri=debug,warn)

EXAMPLES:
    flouri tools
    flouri enable ros2_topic_list
    flouri call execute_bash '{{\"command\": \"ls -la\"}}'
    flouri complete 'ros2 topic ec'
    RUST_LOG=debug flouri call get_tool_call_stats",
        env!("CARGO_PKG_VERSION"),
        default_config_path().display(),
    );
}

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    tools: Option<Vec<String>>,
    no_log: bool,
    command: Vec<String>,
}

fn parse_args(mut raw: impl Iterator<Item = String>) -> Result<Args> {
    let mut args = Args::default();
    while let Some(arg) = raw.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = raw.next().ok_or_else(|| anyhow!("{arg} needs a path"))?;
                args.config = Some(PathBuf::from(path));
            }
            "--tools" => {
                let list = raw.next().ok_or_else(|| anyhow!("--tools needs a list"))?;
                args.tools = Some(
                    list.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect(),
                );
            }
            "--no-log" => args.no_log = true,
            _ => {
                args.command.push(arg);
                args.command.extend(raw.by_ref());
            }
        }
    }
    Ok(args)
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Handle --help / --version before anything else
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("flouri v{}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => {}
        }
    }

    // Logs go to stderr so stdout stays parseable JSON
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("flouri=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    let config = Arc::new(Config::load_or_default(args.config.as_deref())?);

    // A broken builtin table is a programming error: refuse to start
    let registry = Arc::new(SkillRegistry::builtin().context("invalid skill registry")?);
    let store = Arc::new(ConfigManager::new(&config.paths.state_file));
    info!(
        "{} skills, {} tools; state in {}",
        registry.skills().len(),
        registry.tool_count(),
        store.path().display()
    );
    let manager = ToolManager::new(registry, store);

    let Some((command, rest)) = args.command.split_first() else {
        print_help();
        return Ok(());
    };

    match (command.as_str(), rest) {
        ("tools", []) => print_json(&manager.list_enabled_tools())?,
        ("available", []) => print_json(&manager.get_available_tools())?,
        ("enable", [tool]) => print_json(&manager.enable_tool(tool))?,
        ("disable", [tool]) => print_json(&manager.disable_tool(tool))?,
        ("call", [tool, params @ ..]) => {
            let params: Value = match params {
                [] => Value::Null,
                [json] => serde_json::from_str(json)
                    .with_context(|| format!("invalid JSON arguments: {json}"))?,
                _ => bail!("call takes a tool name and one JSON argument"),
            };

            let options = ToolOptions {
                enabled_tools: args.tools,
                ..Default::default()
            };
            let session = Session::from_current_dir()?;
            let mut runtime = ToolRuntime::new(manager, config.clone(), session, options);
            if !args.no_log {
                match SessionLog::create(&config.paths.logs_dir) {
                    Ok(log) => runtime = runtime.with_log(log.with_name(&config.agent.name)),
                    Err(e) => warn!("Conversation log disabled: {e}"),
                }
            }

            print_json(&runtime.call(tool, params).await)?;
        }
        ("complete", words) if !words.is_empty() => {
            let line = words.join(" ");
            let completions = CompletionRegistry::builtin(&config.ros2).complete(&line).await;
            for completion in completions {
                println!("{}", completion.text);
            }
        }
        _ => bail!("unknown or incomplete command: {} (see --help)", args.command.join(" ")),
    }
    Ok(())
}
