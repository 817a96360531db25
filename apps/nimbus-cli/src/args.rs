use clap::{Parser, Subcommand};

use crate::logging::LogFormat;

/// Demo CLI driving the Nimbus control-plane core against the in-memory
/// test-support store. Not a production entry point: the real store,
/// HTTP surface, and supervisor are outside this crate's scope.
#[derive(Debug, Parser)]
#[clap(version, about)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,

    /// Log output format.
    #[clap(long, env = "NIMBUS_LOG_FORMAT", default_value = "full")]
    pub log_format: LogFormat,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Runs the create -> fail -> retry -> stable walk from the happy-path
    /// scenario and prints the resulting event stream.
    Demo(DemoArgs),
}

#[derive(Debug, Parser)]
pub struct DemoArgs {
    /// Request id to attribute the demo's lock acquisitions to. A random
    /// one is generated when omitted.
    #[clap(long, env = "NIMBUS_REQUEST_ID")]
    pub request_id: Option<String>,

    /// Owner id recorded on the created installation.
    #[clap(long, env = "NIMBUS_OWNER_ID", default_value = "demo-owner")]
    pub owner_id: String,

    /// DNS name recorded on the created installation.
    #[clap(long, env = "NIMBUS_DNS", default_value = "demo.example.com")]
    pub dns: String,
}
