use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use vlancheck::config::{
    self, DEFAULT_TARGET_DEVICE, DEFAULT_VLAN_COMMAND, EXPECTED_VLANS_ENV, FailurePolicy,
    RetryPolicy, RunConfig,
};
use vlancheck::device::{Device, SshDevice};
use vlancheck::runner::{RunReport, TestRunner};
use vlancheck::testbed::Testbed;

#[derive(Parser)]
#[command(name = "vlancheck")]
#[command(about = "Verify expected VLANs are present on network switches", long_about = None)]
#[command(version)]
struct Cli {
    /// Expected VLAN ids; falls back to $EXPECTED_VLANS, then 11,12,13
    vlans: Vec<String>,

    /// Path to the testbed inventory
    #[arg(short, long, default_value = "testbed.yaml")]
    testbed: PathBuf,

    /// Device whose VLAN table is verified
    #[arg(short, long, default_value = DEFAULT_TARGET_DEVICE)]
    device: String,

    /// Command used to list VLANs
    #[arg(long, default_value = DEFAULT_VLAN_COMMAND)]
    command: String,

    /// Connection attempts per device
    #[arg(long, default_value_t = 3)]
    max_attempts: u32,

    /// Seconds between connection attempts
    #[arg(long, default_value_t = 5)]
    retry_delay: u64,

    /// Seconds allowed per connection attempt
    #[arg(long, default_value_t = 60)]
    connect_timeout: u64,

    /// Seconds allowed per command execution
    #[arg(long, default_value_t = 60)]
    command_timeout: u64,

    /// Skip a device that exhausts its retries instead of failing the run
    #[arg(long)]
    isolate_failures: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(report) => {
            if report.passed {
                println!("vlancheck: all expected VLANs present");
                ExitCode::SUCCESS
            } else {
                if let Some(failure) = &report.failure {
                    eprintln!("vlancheck: {failure}");
                }
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            eprintln!("vlancheck: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<RunReport> {
    let env_value = std::env::var(EXPECTED_VLANS_ENV).ok();
    let expected = config::resolve_expected_vlans(cli.vlans, env_value.as_deref())?;

    let testbed = Testbed::load(&cli.testbed)?;

    let run_config = RunConfig {
        target_device: cli.device,
        command: cli.command,
        expected,
        retry: RetryPolicy {
            max_attempts: cli.max_attempts,
            retry_delay: Duration::from_secs(cli.retry_delay),
        },
        failure_policy: if cli.isolate_failures {
            FailurePolicy::IsolateDevice
        } else {
            FailurePolicy::FailRun
        },
        connect_timeout: Duration::from_secs(cli.connect_timeout),
        command_timeout: Duration::from_secs(cli.command_timeout),
    };

    let devices: Vec<Box<dyn Device>> = testbed
        .devices
        .iter()
        .map(|(name, spec)| {
            Box::new(SshDevice::new(
                name.clone(),
                spec.clone(),
                run_config.connect_timeout,
                run_config.command_timeout,
            )) as Box<dyn Device>
        })
        .collect();

    let mut runner = TestRunner::new(run_config);
    Ok(runner.run(devices).await)
}
