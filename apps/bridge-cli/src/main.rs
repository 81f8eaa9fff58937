use anyhow::{Context, Result};
use bridge_protocol::{Exchange, FileExchange};
use clap::{Parser, Subcommand, ValueEnum};
use safety_guard::LimitPolicy;
use sim_controller::{build_controller, ControllerConfig, RobotKind};
use std::path::PathBuf;
use tool_server::{create_file_tool_server, ServerConfig};
use tracing::info;

mod repl;

#[derive(Parser, Debug)]
#[command(
    name = "simbridge",
    version,
    about = "Simulator command/status bridge",
    disable_help_subcommand = true
)]
struct Cli {
    /// Parent directory of the per-robot exchange directories
    #[arg(long, global = true)]
    data_root: Option<PathBuf>,

    /// Robot instance name (exchange directory under the data root)
    #[arg(long, global = true)]
    robot: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Kind {
    Drone,
    Humanoid,
}

impl From<Kind> for RobotKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Drone => RobotKind::Drone,
            Kind::Humanoid => RobotKind::Humanoid,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Policy {
    Reject,
    Clamp,
}

impl From<Policy> for LimitPolicy {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::Reject => LimitPolicy::Reject,
            Policy::Clamp => LimitPolicy::Clamp,
        }
    }
}

#[derive(clap::Args, Debug, Clone)]
struct SimArgs {
    /// Controller config YAML
    #[arg(long)]
    config: Option<PathBuf>,
    /// Robot kind, when no config file is given
    #[arg(long, value_enum, default_value_t = Kind::Drone)]
    kind: Kind,
    /// Out-of-range handling for motion commands
    #[arg(long, value_enum)]
    policy: Option<Policy>,
    /// Directory of .motion files (humanoid)
    #[arg(long)]
    motions_dir: Option<PathBuf>,
    /// Stop after this many ticks
    #[arg(long)]
    ticks: Option<u64>,
}

#[derive(clap::Args, Debug, Clone)]
struct ServeArgs {
    /// Tool server config YAML
    #[arg(long)]
    server_config: Option<PathBuf>,
    /// Status poll interval in milliseconds
    #[arg(long)]
    poll_ms: Option<u64>,
    /// Status polls per call before timing out
    #[arg(long)]
    max_attempts: Option<u32>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a headless controller with a kinematic robot
    Sim(SimArgs),
    /// Interactive tool prompt against a running controller
    Serve(ServeArgs),
    /// Headless controller and tool prompt in one process
    Run {
        #[command(flatten)]
        sim: SimArgs,
        #[command(flatten)]
        serve: ServeArgs,
    },
    /// Call one tool and print the JSON reply
    Call {
        /// Tool name (see get_capabilities)
        tool: String,
        /// Arguments as a JSON object
        #[arg(long)]
        args: Option<String>,
        #[command(flatten)]
        serve: ServeArgs,
    },
    /// Print the current status record
    Status,
    /// Remove the exchange files of a robot
    Clean,
    /// Parse a .motion file and print its frames
    MotionInfo {
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    setup_tracing();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Sim(sim) => {
            let config = controller_config(&cli, sim)?;
            runtime()?.block_on(run_sim(config, sim.ticks))
        }
        Commands::Serve(serve) => {
            let config = server_config(&cli, serve)?;
            runtime()?.block_on(repl::run(create_file_tool_server(config)?))
        }
        Commands::Run { sim, serve } => {
            let ctl = controller_config(&cli, sim)?;
            let mut srv = server_config(&cli, serve)?;
            srv.data_root = ctl.data_root.clone();
            srv.robot_name = ctl.robot_name.clone();
            if srv.motions_dir.is_none() {
                srv.motions_dir = ctl.motions_dir.clone();
            }
            runtime()?.block_on(run_combined(ctl, sim.ticks, srv))
        }
        Commands::Call { tool, args, serve } => {
            let config = server_config(&cli, serve)?;
            let args = match args {
                Some(raw) => serde_json::from_str(raw).context("parsing --args as JSON")?,
                None => serde_json::Value::Null,
            };
            runtime()?.block_on(call_once(config, tool, args))
        }
        Commands::Status => show_status(&exchange_for(&cli)),
        Commands::Clean => {
            let exchange = exchange_for(&cli);
            exchange.cleanup()?;
            println!("removed exchange files in {}", exchange.dir().display());
            Ok(())
        }
        Commands::MotionInfo { file } => motion_info(file),
    }
}

fn setup_tracing() {
    // Best-effort; avoid panics if already set
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting tokio runtime")
}

fn controller_config(cli: &Cli, args: &SimArgs) -> Result<ControllerConfig> {
    let mut config = match &args.config {
        Some(path) => ControllerConfig::load(path)?,
        None => ControllerConfig::for_kind(args.kind.into()),
    };
    if let Some(root) = &cli.data_root {
        config.data_root = root.clone();
    }
    if let Some(name) = &cli.robot {
        config.robot_name = name.clone();
    }
    if let Some(policy) = args.policy {
        config.limit_policy = policy.into();
    }
    if let Some(dir) = &args.motions_dir {
        config.motions_dir = Some(dir.clone());
    }
    config.validate()?;
    Ok(config)
}

fn server_config(cli: &Cli, args: &ServeArgs) -> Result<ServerConfig> {
    let mut config = match &args.server_config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(root) = &cli.data_root {
        config.data_root = root.clone();
    }
    if let Some(name) = &cli.robot {
        config.robot_name = name.clone();
    }
    if let Some(ms) = args.poll_ms {
        config.poll_interval_ms = ms;
    }
    if let Some(n) = args.max_attempts {
        config.max_attempts = n;
    }
    config.validate()?;
    Ok(config)
}

fn exchange_for(cli: &Cli) -> FileExchange {
    let root = cli.data_root.clone().unwrap_or_else(|| PathBuf::from("data"));
    let name = cli.robot.as_deref().unwrap_or(RobotKind::Drone.default_name());
    FileExchange::for_robot(root, name)
}

async fn run_sim(config: ControllerConfig, max_ticks: Option<u64>) -> Result<()> {
    let exchange = FileExchange::new(config.exchange_dir());
    let mut controller = build_controller(&config, exchange)?;
    controller.discard_stale_command()?;
    info!(
        robot = %config.robot_name,
        kind = ?config.robot_kind,
        dir = %config.exchange_dir().display(),
        timestep_ms = config.timestep_ms,
        "controller started"
    );

    let dt = config.timestep().as_secs_f64();
    let mut interval = tokio::time::interval(config.timestep());
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut sim_time = 0.0;
    let mut ticks = 0u64;
    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = &mut ctrl_c => break,
        }
        sim_time += dt;
        controller.step(sim_time);
        ticks += 1;
        if max_ticks.is_some_and(|max| ticks >= max) {
            break;
        }
    }

    info!(ticks, sim_time, "controller stopped");
    tracing::debug!(metrics = %controller.metrics().encode_text(), "final metrics");
    Ok(())
}

async fn run_combined(
    controller: ControllerConfig,
    max_ticks: Option<u64>,
    server: ServerConfig,
) -> Result<()> {
    let sim = tokio::spawn(run_sim(controller, max_ticks));
    let tools = create_file_tool_server(server)?;
    let result = repl::run(tools).await;
    sim.abort();
    result
}

async fn call_once(config: ServerConfig, tool: &str, args: serde_json::Value) -> Result<()> {
    let server = create_file_tool_server(config)?;
    let reply = server.call(tool, args).await?;
    println!("{}", serde_json::to_string_pretty(&reply)?);
    Ok(())
}

fn show_status(exchange: &FileExchange) -> Result<()> {
    match exchange.read_status()? {
        Some(status) => println!("{}", serde_json::to_string_pretty(&status)?),
        None => println!("no status in {}", exchange.dir().display()),
    }
    Ok(())
}

fn motion_info(path: &std::path::Path) -> Result<()> {
    let motion = motion_playback::load_motion_file(path)?;
    println!(
        "{}: {} motors, {} frames, {:.3} s",
        motion.name,
        motion.motors.len(),
        motion.frames.len(),
        motion.duration()
    );
    println!("motors: {}", motion.motors.join(", "));
    for frame in &motion.frames {
        let set = frame.positions.iter().filter(|p| p.is_some()).count();
        println!("  {:>8.3} s  {:<12} {} values", frame.time, frame.pose_name, set);
    }
    Ok(())
}
