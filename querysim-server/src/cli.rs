use std::path::PathBuf;

use anyhow::Result;
use argh::FromArgs;
use bytesize::ByteSize;
use querysim_service::ProfileName;

use crate::config::Config;
use crate::{healthcheck, observability, web};

/// Simulated database workload server.
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c')]
    pub config: Option<PathBuf>,

    #[argh(subcommand)]
    pub command: Command,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Command {
    Run(RunCommand),
    Healthcheck(HealthcheckCommand),
    Profiles(ProfilesCommand),
    Version(VersionCommand),
}

/// run the querysim web server
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "run")]
struct RunCommand {}

/// perform a healthcheck against the running querysim web server
///
/// This command checks if the querysim server is available on the configured host and port. This
/// is used for Docker healthchecks.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "healthcheck")]
struct HealthcheckCommand {}

/// print the catalog of workload profiles
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "profiles")]
struct ProfilesCommand {}

/// print the querysim server version
#[derive(Default, Debug, FromArgs)]
#[argh(subcommand, name = "version")]
struct VersionCommand {}

/// Bootstrap the runtime and execute the CLI command.
pub fn execute() -> Result<()> {
    let args: Args = argh::from_env();

    match args.command {
        Command::Version(_) => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Command::Profiles(_) => {
            print_profiles();
            return Ok(());
        }
        Command::Run(_) | Command::Healthcheck(_) => (),
    }

    let config = Config::load(args.config.as_deref())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("querysim-rt")
        .enable_all()
        .worker_threads(config.runtime.worker_threads.max(1))
        .max_blocking_threads(config.runtime.max_blocking_threads.max(1))
        .build()?;
    let _runtime_guard = runtime.enter();

    observability::init_tracing(&config);
    tracing::debug!(?config);

    runtime.block_on(async move {
        match args.command {
            Command::Run(RunCommand {}) => web::server(config).await,
            Command::Healthcheck(HealthcheckCommand {}) => healthcheck::healthcheck(config).await,
            Command::Profiles(ProfilesCommand {}) | Command::Version(VersionCommand {}) => {
                unreachable!()
            }
        }
    })
}

fn print_profiles() {
    println!(
        "{:<16} {:>16} {:>16} {:>22}",
        "PROFILE", "IO", "CPU", "MEMORY"
    );

    for name in ProfileName::ALL {
        let profile = name.profile();
        let io = format!("{:?}-{:?}", profile.io().min(), profile.io().max());
        let cpu = format!("{:?}-{:?}", profile.cpu().min(), profile.cpu().max());
        let memory = format!(
            "{}-{}",
            ByteSize(profile.memory().min()),
            ByteSize(profile.memory().max())
        );
        println!("{:<16} {io:>16} {cpu:>16} {memory:>22}", name.as_str());
    }
}
