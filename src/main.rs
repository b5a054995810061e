// SPDX-License-Identifier: MIT

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use stateful_agent::adk::agent::{AgentEvent, GenerateParams, StatefulAgent};
use stateful_agent::adk::model::anthropic::AnthropicModel;
use stateful_agent::adk::model::openai::OpenAIModel;
use stateful_agent::adk::model::{Message, Model};
use stateful_agent::builtin;
use stateful_agent::workflow::deriver::{derive_context, format_state_history, get_available_transitions};
use stateful_agent::workflow::history::pending_approvals;
use stateful_agent::workflow::registry;
use stateful_agent::AgentError;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List registered workflows
    Workflows,
    /// Show the state derived from a saved history
    Inspect {
        #[arg(short, long)]
        workflow: String,

        /// JSON file holding the message history
        #[arg(long)]
        history: PathBuf,
    },
    /// List the outgoing transitions of a state in evaluation order
    Transitions {
        #[arg(short, long)]
        workflow: String,

        #[arg(short, long)]
        state: String,
    },
    /// Run one round and append its messages to the history file
    Run {
        #[arg(short, long)]
        workflow: String,

        /// JSON file holding the message history; created when missing
        #[arg(long)]
        history: Option<PathBuf>,

        /// User message for this round
        #[arg(short, long)]
        prompt: Option<String>,

        /// Approve a pending call by id
        #[arg(long)]
        approve: Vec<String>,

        /// Deny a pending call by id
        #[arg(long)]
        deny: Vec<String>,

        /// Reason recorded with denials
        #[arg(long)]
        reason: Option<String>,

        /// The model to use (defaults to MODEL_NAME)
        #[arg(short, long)]
        model: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    let registry = registry::init_global(
        builtin::default_registry().map_err(|e| anyhow!("failed to load built-in workflows: {}", e))?,
    )
    .map_err(|_| anyhow!("workflow registry already initialized"))?;

    match args.command {
        Commands::Workflows => {
            for id in registry.get_available_workflows() {
                let entry = registry.get_workflow(id)?;
                println!(
                    "{:<12} initial={:<10} {}",
                    id, entry.definition.initial_state, entry.definition.description
                );
            }
        }
        Commands::Inspect { workflow, history } => {
            let entry = registry.get_workflow(&workflow)?;
            let messages = read_history(&history)?;
            let context = derive_context(&entry.definition, &messages);

            println!("State:    {}", context.current_state);
            println!("Step:     {}", context.step_number);
            println!("Complete: {}", context.is_complete);
            if !context.state_history.is_empty() {
                println!("Transitions:\n{}", format_state_history(&context.state_history));
            }
            for pending in pending_approvals(&messages) {
                println!(
                    "Pending approval: {} {} {}",
                    pending.call_id, pending.tool_name, pending.args
                );
            }
        }
        Commands::Transitions { workflow, state } => {
            let entry = registry.get_workflow(&workflow)?;
            if entry.definition.state(&state).is_none() {
                return Err(AgentError::UnknownState { workflow, state }.into());
            }
            for transition in get_available_transitions(&entry.definition, &state) {
                println!("{}", transition);
            }
        }
        Commands::Run {
            workflow,
            history,
            prompt,
            approve,
            deny,
            reason,
            model,
        } => {
            let mut messages = match &history {
                Some(path) if path.exists() => read_history(path)?,
                _ => Vec::new(),
            };
            for call_id in approve {
                messages.push(Message::approval(call_id, true, None));
            }
            for call_id in deny {
                messages.push(Message::approval(call_id, false, reason.clone()));
            }

            let model = create_model(model)?;
            let agent = StatefulAgent::new(registry, model);

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_interrupt.cancel();
                }
            });

            let (tx, mut rx) = mpsc::channel(32);
            let printer = tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    print_event(&event);
                }
            });

            let mut params = GenerateParams::new(workflow)
                .with_messages(messages.clone())
                .with_cancel(cancel);
            params.prompt = prompt;

            let result = agent.generate_stream(params, tx).await;
            printer.await.ok();
            let result = match result {
                Ok(result) => result,
                Err(e) => {
                    // Approved tools already ran; keep their results so a rerun does not repeat them
                    if let (Some(path), false) = (&history, e.resolved_messages().is_empty()) {
                        messages.extend(e.resolved_messages().iter().cloned());
                        write_history(path, &messages)?;
                        log::warn!("Resolved approvals written to {}", path.display());
                    }
                    return Err(e.into());
                }
            };

            println!("{}", serde_json::to_string_pretty(&result)?);

            if let Some(path) = history {
                messages.extend(result.response_messages);
                write_history(&path, &messages)?;
                log::info!("History written to {}", path.display());
            }
        }
    }

    Ok(())
}

fn create_model(model_name: Option<String>) -> Result<Arc<dyn Model>> {
    let model_name = model_name
        .or_else(|| std::env::var("MODEL_NAME").ok())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    // Infer provider
    let provider = std::env::var("MODEL_PROVIDER").unwrap_or_else(|_| {
        if model_name.starts_with("gpt") {
            "OpenAI".to_string()
        } else {
            "Anthropic".to_string()
        }
    });

    log::info!("Using provider: {} with model: {}", provider, model_name);

    let model: Arc<dyn Model> = match provider.as_str() {
        "OpenAI" | "openai" => Arc::new(OpenAIModel::new(model_name)?),
        "Anthropic" | "anthropic" => Arc::new(AnthropicModel::new(model_name)?),
        other => return Err(anyhow!("unknown model provider '{}'", other)),
    };
    Ok(model)
}

fn print_event(event: &AgentEvent) {
    match event {
        AgentEvent::Text(text) => eprintln!("[text] {}", text),
        AgentEvent::ToolCall { call_id, name, args } => {
            eprintln!("[tool call] {} {} {}", call_id, name, args)
        }
        AgentEvent::ToolResult(entry) => eprintln!(
            "[tool result] {} {}",
            entry.call_id,
            serde_json::to_string(entry).unwrap_or_default()
        ),
        AgentEvent::ApprovalRequested(pending) => eprintln!(
            "[approval needed] {} {} (rerun with --approve {} or --deny {})",
            pending.call_id, pending.tool_name, pending.call_id, pending.call_id
        ),
        AgentEvent::Transition(record) => eprintln!("[transition] {}", record),
        AgentEvent::Finish {
            current_state,
            step_number,
            is_complete,
        } => eprintln!(
            "[finish] state={} step={} complete={}",
            current_state, step_number, is_complete
        ),
        AgentEvent::Error(e) => eprintln!("[error] {}", e),
    }
}

fn read_history(path: &Path) -> Result<Vec<Message>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

fn write_history(path: &Path, messages: &[Message]) -> Result<()> {
    let content = serde_json::to_string_pretty(messages)?;
    fs::write(path, content).with_context(|| format!("writing {}", path.display()))
}
