use clap::{Parser, Subcommand};
use framelens_proxy::UpstreamConfig;

#[derive(Parser)]
#[command(name = "framelens-proxy", about = "Caption proxy in front of a hosted vision model")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Serve POST /api/analyze-frame.
    Serve {
        /// Port to listen on (all interfaces).
        #[arg(long, env = "PORT", default_value_t = 5000)]
        port: u16,

        #[command(flatten)]
        upstream: UpstreamConfig,
    },
    /// Send one text-only request upstream and print the reply.
    Check {
        #[command(flatten)]
        upstream: UpstreamConfig,
    },
}
