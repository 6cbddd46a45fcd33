//! This is a stresstest binary which runs weighted request mixes against a querysim server.
//!
//! See the [`Config`] for the structure of the YAML configuration file.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

use std::path::PathBuf;

use anyhow::Context;
use argh::FromArgs;
use stresstest::config::Config;
use stresstest::http::HttpRemote;

/// Stresstester for the querysim workload server
#[derive(Debug, FromArgs)]
pub struct Args {
    /// path to the yaml configuration file
    #[argh(option, short = 'c')]
    pub config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Args = argh::from_env();

    let config_file = std::fs::File::open(args.config).context("failed to open config file")?;
    let config: Config =
        serde_yaml::from_reader(config_file).context("failed to parse config YAML")?;

    let remote = HttpRemote::new(&config.remote);
    let workloads = config
        .workloads
        .into_iter()
        .map(|w| w.into_workload())
        .collect::<anyhow::Result<Vec<_>>>()?;

    stresstest::run(remote, workloads, config.duration).await
}
