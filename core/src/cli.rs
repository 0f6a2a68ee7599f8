use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tokio::sync::Notify;
use tokio::task::LocalSet;
use tracing::{debug, info};

use crate::blocks::load_graph;
use crate::config::Config;
use crate::interpreter::{
    Compiler, CompilerOptions, PlaybackEngine, PlaybackOptions, StepOutcome,
    UnrecognizedBlockPolicy,
};
use crate::types::{Command, InstructionId, Program, Speed};

#[derive(Parser)]
#[command(name = "blockdrive")]
#[command(about = "Blockdrive - compile and play back block programs", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile a saved workspace and print the program as JSON
    Compile {
        /// Workspace file (flat block graph or Blockly serialization)
        file: PathBuf,

        /// What to do with blocks that are not actions
        #[arg(short = 'p', long = "policy", value_enum)]
        policy: Option<PolicyArg>,
    },

    /// Play a saved workspace in real time, printing every command
    Run {
        /// Workspace file (flat block graph or Blockly serialization)
        file: PathBuf,

        /// Playback speed multiplier (must be one of the configured options)
        #[arg(short = 's', long = "speed")]
        speed: Option<f64>,

        /// Step through the program one instruction at a time instead of
        /// playing on a timer
        #[arg(long)]
        step: bool,
    },

    /// List the playback speed options
    Speeds,

    /// Print the effective configuration as TOML
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    Skip,
    Wait,
}

impl From<PolicyArg> for UnrecognizedBlockPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Skip => UnrecognizedBlockPolicy::Skip,
            PolicyArg::Wait => UnrecognizedBlockPolicy::Wait,
        }
    }
}

/// Run the CLI by parsing process arguments
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli).await
}

/// Run the CLI with provided arguments
pub async fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::parse_from(args);
    run_cli_with_args(cli).await
}

/// Internal function that handles CLI commands
async fn run_cli_with_args(cli: Cli) -> Result<()> {
    let policy = match &cli.command {
        Commands::Compile { policy, .. } => policy.map(UnrecognizedBlockPolicy::from),
        _ => None,
    };

    // Load and validate configuration before executing any command
    let config = Config::builder()
        .config_path(cli.config.map(PathBuf::from))
        .unrecognized_blocks(policy)
        .build()
        .context("Failed to load configuration")?;

    match cli.command {
        Commands::Compile { file, .. } => {
            let program = compile_file(&file, config.compiler_options())?;
            println!(
                "{}",
                serde_json::to_string_pretty(&program).context("Failed to serialize program")?
            );
        }

        Commands::Run { file, speed, step } => {
            let program = compile_file(&file, config.compiler_options())?;
            let mut options = config.playback_options()?;
            if let Some(speed) = speed {
                options.speed = select_speed(&config, speed)?;
            }

            info!(
                instructions = program.len(),
                speed = %options.speed,
                "Running {}",
                file.display()
            );

            let print: Rc<dyn Fn(String)> = Rc::new(|line: String| println!("{}", line));
            LocalSet::new()
                .run_until(run_program(program, options, step, print))
                .await;
        }

        Commands::Speeds => {
            for line in speed_lines(&config)? {
                println!("{}", line);
            }
        }

        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

/* ===================== Commands ===================== */

/// Read a workspace file and compile its chain
pub fn compile_file(path: &Path, options: CompilerOptions) -> Result<Program> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read workspace file {}", path.display()))?;
    let graph = load_graph(&json)
        .with_context(|| format!("Failed to load block graph from {}", path.display()))?;

    let program = Compiler::new(options)
        .compile(graph.start_node())
        .with_context(|| format!("Failed to compile {}", path.display()))?;

    debug!(instructions = program.len(), "Compiled {}", path.display());
    Ok(program)
}

/// Accept `multiplier` only if it is one of the configured speed options
pub fn select_speed(config: &Config, multiplier: f64) -> Result<Speed> {
    let speed = Speed::new(multiplier)?;
    if !config.speed_options()?.contains(&speed) {
        bail!(
            "Speed {} is not available (options: {})",
            speed,
            speed_list(&config.speed_options()?)
        );
    }
    Ok(speed)
}

fn speed_list(speeds: &[Speed]) -> String {
    speeds
        .iter()
        .map(|speed| speed.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// One line per speed option, the default marked with `*`
pub fn speed_lines(config: &Config) -> Result<Vec<String>> {
    let default = config.default_speed()?;
    Ok(config
        .speed_options()?
        .into_iter()
        .map(|speed| {
            let marker = if speed == default { "*" } else { " " };
            format!("{} {}", marker, speed)
        })
        .collect())
}

pub fn describe_emit(command: &Command) -> String {
    format!("emit      {}", command)
}

pub fn describe_highlight(id: Option<&InstructionId>) -> String {
    match id {
        Some(id) => format!("highlight {}", id),
        None => "highlight -".to_string(),
    }
}

/// Play `program` to the end, sending a line per callback to `print`.
///
/// Must run inside a `LocalSet` when `step` is false.
pub async fn run_program(
    program: Program,
    options: PlaybackOptions,
    step: bool,
    print: Rc<dyn Fn(String)>,
) {
    let finished = Rc::new(Notify::new());

    let on_emit = Rc::clone(&print);
    let on_highlight = Rc::clone(&print);
    let done = Rc::clone(&finished);
    let engine = PlaybackEngine::builder()
        .options(options)
        .program(program)
        .emit(move |command| on_emit(describe_emit(command)))
        .highlight(move |id| {
            on_highlight(describe_highlight(id));
            if id.is_none() {
                done.notify_one();
            }
        })
        .build();

    if step {
        while let StepOutcome::Emitted(_) = engine.step() {}
        return;
    }

    engine.play();
    if engine.is_running() {
        finished.notified().await;
    }
    debug!("Playback finished");
}
