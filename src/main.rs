//! CLI Entry Point for lexium-motor
//!
//! Drives one Lexium MDrive controller from the command line:
//! - `run` polls the axis on the two-rate scheduler and prints status changes
//! - one-shot motion commands (`move`, `jog`, `home`, `stop`, ...) issued
//!   between scheduler polls, which then wake the scheduler
//! - `ports` lists serial ports visible to this machine
//!
//! # Usage
//!
//! ```bash
//! lexium-motor --config config/lexium.toml run
//! lexium-motor move 51200 --max 20000 --accel 50000 --wait
//! LEXIUM_CONTROLLER__TARGET=ts-b34-nw08:2101 lexium-motor status --json
//! ```

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use lexium_motor::config::{AppConfig, DEFAULT_CONFIG_PATH};
use lexium_motor::logging::{self, OutputFormat};
use motor_core::driver::{DeviceComponents, DriverFactory};
use motor_core::poller::FORCED_FAST_POLLS;
use motor_core::{AxisPoller, AxisStatus, MotorAxis, MotorResult, MoveProfile};
use motor_driver_lexium::LexiumFactory;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

#[derive(Parser)]
#[command(name = "lexium-motor")]
#[command(about = "Control a Schneider Lexium MDrive motor controller", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override the controller target (serial path or host:port)
    #[arg(long)]
    target: Option<String>,

    /// Override the configured log format
    #[arg(long, value_enum)]
    log_format: Option<OutputFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the axis until Ctrl-C, printing every status change
    Run,

    /// Run one poll cycle and print the axis status
    Status {
        /// Print the status as JSON
        #[arg(long)]
        json: bool,
    },

    /// Move to an absolute position (or by a relative distance)
    Move {
        /// Target position in device units
        #[arg(allow_negative_numbers = true)]
        position: f64,

        /// Treat the position as a distance from the current position
        #[arg(long)]
        relative: bool,

        #[command(flatten)]
        profile: ProfileArgs,

        /// Poll until the move completes
        #[arg(long)]
        wait: bool,
    },

    /// Run at constant velocity until stopped (negative velocity runs in reverse)
    Jog {
        #[command(flatten)]
        profile: ProfileArgs,
    },

    /// Search for the home switch
    Home {
        /// Search in the positive direction
        #[arg(long)]
        forward: bool,

        #[command(flatten)]
        profile: ProfileArgs,

        /// Poll until homing completes
        #[arg(long)]
        wait: bool,
    },

    /// Decelerate to a stop
    Stop {
        /// Deceleration, 0 keeps the current ramp
        #[arg(long, default_value_t = 0.0)]
        accel: f64,
    },

    /// Redefine the current position without moving
    SetPosition {
        /// New position in device units
        #[arg(allow_negative_numbers = true)]
        position: f64,
    },

    /// Persist controller settings to nonvolatile memory
    Save,

    /// List serial ports
    Ports,
}

#[derive(Args)]
struct ProfileArgs {
    /// Base velocity, 0 leaves it unchanged
    #[arg(long, default_value_t = 0.0)]
    base: f64,

    /// Top velocity
    #[arg(long, allow_negative_numbers = true)]
    max: f64,

    /// Acceleration, 0 leaves it unchanged
    #[arg(long, default_value_t = 0.0)]
    accel: f64,
}

impl From<ProfileArgs> for MoveProfile {
    fn from(args: ProfileArgs) -> Self {
        MoveProfile::new(args.base, args.max, args.accel)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Ports = cli.command {
        return list_ports();
    }

    let mut config = AppConfig::load_from(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    if let Some(target) = cli.target {
        config.controller.target = target;
    }
    if let Some(format) = cli.log_format {
        config.application.log_format = format;
    }
    config.validate()?;
    logging::init_from_config(&config).map_err(anyhow::Error::msg)?;

    let factory = LexiumFactory;
    let driver_config =
        toml::Value::try_from(&config.controller).context("Failed to encode controller config")?;
    let components = factory.build(driver_config).await?;
    info!(
        app = %config.application.name,
        motor = %config.controller.motor_port_name,
        driver = factory.name(),
        "Controller ready"
    );

    let axis = components.axis.clone();
    match cli.command {
        Commands::Run => run(components).await,
        Commands::Status { json } => {
            axis.poll().await?;
            print_status(&axis.status(), json)
        }
        Commands::Move {
            position,
            relative,
            profile,
            wait,
        } => {
            let profile = MoveProfile::from(profile);
            motion(&components, wait, move |axis| async move {
                axis.move_to(position, relative, profile).await
            })
            .await
        }
        Commands::Jog { profile } => {
            let profile = MoveProfile::from(profile);
            motion(&components, false, move |axis| async move {
                axis.move_velocity(profile).await
            })
            .await
        }
        Commands::Home {
            forward,
            profile,
            wait,
        } => {
            let profile = MoveProfile::from(profile);
            motion(&components, wait, move |axis| async move {
                axis.home(profile, forward).await
            })
            .await
        }
        Commands::Stop { accel } => {
            motion(&components, false, move |axis| async move { axis.stop(accel).await }).await
        }
        Commands::SetPosition { position } => {
            motion(&components, false, move |axis| async move {
                axis.set_position(position).await
            })
            .await
        }
        Commands::Save => {
            axis.save_to_nvm().await?;
            println!("Settings saved to nonvolatile memory");
            Ok(())
        }
        Commands::Ports => list_ports(),
    }
}

/// Poll on the scheduler and print status changes until Ctrl-C.
async fn run(components: DeviceComponents) -> Result<()> {
    let mut updates = components.axis.subscribe();
    let poller = AxisPoller::spawn(components.axis.clone(), components.poll_periods);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut last: Option<AxisStatus> = None;
    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = updates.borrow_and_update().clone();
                if last.as_ref() != Some(&status) {
                    print_status(&status, false)?;
                    last = Some(status);
                }
            }
            result = &mut shutdown => {
                result.context("Failed to listen for Ctrl-C")?;
                info!("Shutting down");
                break;
            }
        }
    }

    poller.shutdown().await;
    Ok(())
}

/// Issue a command between scheduler polls and print the status the next
/// poll reports. With `wait`, keep printing until the axis reports done.
async fn motion<F, Fut>(components: &DeviceComponents, wait: bool, command: F) -> Result<()>
where
    F: FnOnce(Arc<dyn MotorAxis>) -> Fut,
    Fut: Future<Output = MotorResult<()>>,
{
    let poller = AxisPoller::spawn(components.axis.clone(), components.poll_periods);
    let mut updates = components.axis.subscribe();

    let outcome = poller.command(command).await;
    // Skip the status published by the command itself
    updates.borrow_and_update();

    let result = match outcome {
        Ok(()) => follow_motion(&mut updates, wait).await,
        Err(e) => Err(e.into()),
    };
    poller.shutdown().await;
    result
}

async fn follow_motion(updates: &mut watch::Receiver<AxisStatus>, wait: bool) -> Result<()> {
    let mut polls = 0;
    loop {
        updates
            .changed()
            .await
            .context("Axis status channel closed")?;
        let status = updates.borrow_and_update().clone();
        polls += 1;

        if !wait {
            return print_status(&status, false);
        }
        if status.comms_error() {
            print_status(&status, false)?;
            bail!("Lost communication with the controller");
        }
        // Polls forced by the wake may land before the controller reports motion
        if status.done && polls > FORCED_FAST_POLLS {
            return print_status(&status, false);
        }
        if status.moving {
            print_status(&status, false)?;
        }
    }
}

fn print_status(status: &AxisStatus, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(status)?);
        return Ok(());
    }

    println!(
        "position={:.0} moving={} done={} home={} high_limit={} low_limit={} problem={} comms={:?}",
        status.position,
        status.moving,
        status.done,
        status.at_home,
        status.high_limit,
        status.low_limit,
        status.problem,
        status.comms,
    );
    if let Some(code) = status.last_error_code {
        println!("last error code: {}", code);
    }
    Ok(())
}

fn list_ports() -> Result<()> {
    let ports = serialport::available_ports().context("Failed to enumerate serial ports")?;
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        println!("{}", port.port_name);
    }
    Ok(())
}
