use clap::{ArgAction, Parser, Subcommand};
use palaver_agent::{
    AgentConfig, AgentEngine, GraphState, ThreadSnapshot, ToolRegistry, WindowPolicy,
};
use palaver_checkpoint::{CheckpointStore, FsCheckpointStore};
use palaver_llm::{OpenAiCompatConfig, OpenAiCompatModel};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "palaver-cli")]
#[command(about = "Interactive host for Palaver agent threads")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send a message to a thread, starting or resuming it.
    Chat(ChatArgs),
    /// Inspect the latest committed state of a thread.
    State(StateArgs),
    /// Delete a thread and its checkpoint lineage.
    Delete(ThreadArgs),
}

#[derive(clap::Args, Debug)]
struct ChatArgs {
    #[arg(long)]
    thread: String,
    message: String,
    /// Run to completion without printing incremental events.
    #[arg(long, action = ArgAction::SetTrue)]
    sync: bool,
    /// With --sync, print the final output as a structured JSON object.
    #[arg(long, action = ArgAction::SetTrue)]
    structured: bool,
    #[arg(long)]
    store_dir: Option<PathBuf>,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    system_prompt: Option<String>,
    #[arg(long)]
    custom_prompt: Option<String>,
    #[arg(long)]
    recursion_limit: Option<usize>,
    #[arg(long, value_enum)]
    window_policy: Option<WindowPolicyArg>,
}

#[derive(clap::Args, Debug)]
struct StateArgs {
    #[arg(long)]
    thread: String,
    #[arg(long)]
    store_dir: Option<PathBuf>,
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(clap::Args, Debug)]
struct ThreadArgs {
    #[arg(long)]
    thread: String,
    #[arg(long)]
    store_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum WindowPolicyArg {
    RecentExchange,
    HeadTail,
}

impl From<WindowPolicyArg> for WindowPolicy {
    fn from(arg: WindowPolicyArg) -> Self {
        match arg {
            WindowPolicyArg::RecentExchange => WindowPolicy::RecentExchange,
            WindowPolicyArg::HeadTail => WindowPolicy::HeadTail,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Chat(args) => chat_command(args).await,
        Commands::State(args) => state_command(args).await,
        Commands::Delete(args) => delete_command(args).await,
    };

    match result {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(1)
        }
    }
}

async fn chat_command(args: ChatArgs) -> Result<ExitCode, String> {
    let store = open_store(args.store_dir.as_ref())?;
    let tools = ToolRegistry::default();

    let model_name = match args.model.clone() {
        Some(model) => model,
        None => require_env("OPENAI_MODEL")?,
    };
    let provider_config = OpenAiCompatConfig {
        base_url: std::env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
        api_key: require_env("OPENAI_API_KEY")?,
        model: model_name.clone(),
        tools: tools
            .definitions()
            .iter()
            .map(|definition| definition.to_provider_schema())
            .collect(),
    };
    let model = OpenAiCompatModel::new(provider_config).map_err(|error| error.to_string())?;

    let config = AgentConfig {
        model_name,
        user_id: std::env::var("PALAVER_USER_ID").ok(),
        system_prompt: args.system_prompt,
        custom_prompt: args.custom_prompt,
        recursion_limit: args
            .recursion_limit
            .unwrap_or(palaver_agent::DEFAULT_RECURSION_LIMIT),
        window_policy: args.window_policy.map(WindowPolicy::from),
        ..AgentConfig::default()
    };
    let engine = Arc::new(
        AgentEngine::new(config, Arc::new(model), Arc::new(store), tools, None)
            .map_err(|error| error.to_string())?,
    );

    let snapshot = if args.sync {
        engine
            .start_or_resume_sync(&args.thread, args.message)
            .await
            .map_err(|error| error.to_string())?
    } else {
        let mut handle = engine.start_or_resume(args.thread.clone(), args.message);
        while let Some(event) = handle.events.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(error) => eprintln!("error: unprintable event: {error}"),
            }
        }
        handle.join().await.map_err(|error| error.to_string())?
    };

    if args.sync {
        if args.structured {
            if let Some(output) = snapshot.structured_final_output() {
                println!("{output}");
            }
        } else if let Some(output) = snapshot.final_output() {
            println!("{output}");
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn state_command(args: StateArgs) -> Result<ExitCode, String> {
    let store = open_store(args.store_dir.as_ref())?;
    let thread = args.thread.clone();
    let latest = store
        .get_latest(&thread)
        .await
        .map_err(|error| error.to_string())?;

    let Some(checkpoint) = latest else {
        println!("thread: {thread}");
        println!("state: <unseen>");
        return Ok(ExitCode::SUCCESS);
    };
    let snapshot =
        ThreadSnapshot::decode(&checkpoint.payload).map_err(|error| error.to_string())?;

    if args.json {
        let json = serde_json::to_string_pretty(&snapshot).map_err(|error| error.to_string())?;
        println!("{json}");
    } else {
        println!("thread: {thread}");
        println!("checkpoint_id: {}", checkpoint.checkpoint_id);
        println!(
            "parent_checkpoint_id: {}",
            checkpoint.parent_checkpoint_id.as_deref().unwrap_or("<none>")
        );
        println!("next_state: {}", state_label(&snapshot));
        println!("messages: {}", snapshot.messages.len());
        if let Some(output) = snapshot.final_output() {
            println!("final_output: {output}");
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn delete_command(args: ThreadArgs) -> Result<ExitCode, String> {
    let store = open_store(args.store_dir.as_ref())?;
    let deleted = store
        .delete(&args.thread)
        .await
        .map_err(|error| error.to_string())?;
    println!(
        "{}",
        if deleted {
            "deleted"
        } else {
            "nothing to delete"
        }
    );
    Ok(ExitCode::SUCCESS)
}

fn open_store(store_dir: Option<&PathBuf>) -> Result<FsCheckpointStore, String> {
    let root = store_dir
        .cloned()
        .unwrap_or_else(|| PathBuf::from(".palaver"));
    FsCheckpointStore::new(root).map_err(|error| error.to_string())
}

fn require_env(name: &str) -> Result<String, String> {
    std::env::var(name).map_err(|_| format!("environment variable {name} is required"))
}

fn state_label(snapshot: &ThreadSnapshot) -> &'static str {
    match snapshot.next_state {
        GraphState::Start => "start",
        GraphState::Assistant => "assistant",
        GraphState::ToolDispatch => "tool_dispatch",
        GraphState::End => "end",
    }
}
