use clap::Parser;
use std::path::PathBuf;

/// Host Agent - routes chat messages to specialized downstream agents
#[derive(Parser, Debug, Clone)]
#[command(name = "host-agent", version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, env = "HOST_AGENT_CONFIG", default_value = "host-agent.toml")]
    pub config: PathBuf,

    /// Server host address
    #[arg(long, env = "HOST_AGENT_HOST")]
    pub host: Option<String>,

    /// Server port
    #[arg(long, env = "HOST_AGENT_PORT")]
    pub port: Option<u16>,

    /// Seconds between background agent health checks (0 disables)
    #[arg(long, env = "HOST_AGENT_HEALTH_INTERVAL")]
    pub health_interval: Option<u64>,
}
