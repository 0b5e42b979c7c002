use clap::{Parser, Subcommand};
use flowgate::config::{self, Config};
use flowgate::server;
use flowgate::telemetry::init_logging;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "flowgate")]
#[command(about = "OpenFlow 1.3 controller: VLAN learning switch with inter-VLAN gateways")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Run the controller (default)
    Run {
        /// Path to flowgate.toml; the built-in lab layout when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the listen address
        #[arg(short, long)]
        listen: Option<SocketAddr>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Check a configuration file
    Validate {
        #[arg(short, long, default_value = "flowgate.toml")]
        config: PathBuf,
    },
    /// Print the effective configuration as TOML
    Show {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Config { action }) => match action {
            ConfigAction::Validate { config } => cmd_config_validate(&config),
            ConfigAction::Show { config } => cmd_config_show(config.as_deref()),
        },
        Some(Commands::Run { config, listen }) => cmd_run(config.as_deref(), listen),
        None => cmd_run(None, None),
    };

    if let Err(e) = result {
        eprintln!("[ERROR] {}", e);
        std::process::exit(1);
    }
}

fn cmd_run(config_path: Option<&Path>, listen: Option<SocketAddr>) -> Result<(), String> {
    use tokio::runtime::Runtime;

    let mut cfg = load(config_path)?;
    if let Some(listen) = listen {
        cfg.controller.listen = listen;
    }

    init_logging(Some(&cfg.logging));
    match config_path {
        Some(path) => info!("Loaded {}", path.display()),
        None => info!("No configuration file given, using the built-in lab layout"),
    }

    let validation = config::validate(&cfg);
    for warning in &validation.warnings {
        warn!("{}", warning);
    }
    if validation.has_errors() {
        for e in &validation.errors {
            error!("{}", e);
        }
        return Err(format!(
            "configuration has {} error(s)",
            validation.errors.len()
        ));
    }

    let rt = Runtime::new().map_err(|e| format!("Failed to create runtime: {}", e))?;
    rt.block_on(async move {
        tokio::select! {
            result = server::run(&cfg) => result.map_err(|e| e.to_string()),
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                Ok(())
            }
        }
    })
}

fn cmd_config_validate(config_path: &Path) -> Result<(), String> {
    println!("Validating {}...", config_path.display());

    let cfg = load(Some(config_path))?;
    let validation = config::validate(&cfg);
    validation.print_diagnostics();

    if validation.has_errors() {
        return Err("Validation failed".to_string());
    }

    println!(
        "Configuration OK: {} switch(es), {} gateway(s)",
        cfg.switches.len(),
        cfg.gateways.len()
    );
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<(), String> {
    let cfg = load(config_path)?;
    let rendered = config::to_toml(&cfg).map_err(|e| e.to_string())?;
    print!("{}", rendered);
    Ok(())
}

fn load(config_path: Option<&Path>) -> Result<Config, String> {
    config::load_or_default(config_path).map_err(|e| match config_path {
        Some(path) => format!("Failed to load {}: {}", path.display(), e),
        None => e.to_string(),
    })
}
