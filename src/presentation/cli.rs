//! Command line interface.
//!
//! Maps flags and subcommands onto facade calls. Every command that talks to
//! a fan connects, authenticates, runs and then disconnects, also on failure.

use crate::domain::models::{DeviceMode, FanSpeedSettings, SilentHours};
use crate::domain::settings::{Settings, SettingsService};
use crate::infrastructure::bluetooth::connection::{BleConnection, ConnectionConfig};
use crate::infrastructure::bluetooth::protocol::Protocol;
use crate::infrastructure::bluetooth::scanner::{get_adapter, BleScanner};
use crate::infrastructure::bluetooth::transport::GattTransport;
use crate::infrastructure::bluetooth::FanService;
use crate::presentation::monitor::{self, PollPolicy, StopReason};
use crate::presentation::report::{self, CharacteristicRow};
use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Boost speed used when none is given.
const DEFAULT_BOOST_SPEED: u16 = 2250;
/// Humidity and light speeds written alongside a new trickle speed.
const TRICKLE_HUMIDITY_SPEED: i32 = 2250;
const TRICKLE_LIGHT_SPEED: i32 = 975;
/// Pause before reading back a changed setting.
const SETTLE_DELAY: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(name = "calima")]
#[command(about = "Command control and monitoring tool for PAX Calima fans")]
#[command(version)]
pub struct Cli {
    /// Fan MAC address
    #[arg(short = 'm', long = "mac", visible_alias = "address", global = true)]
    pub address: Option<String>,

    /// Fan pin code
    #[arg(short, long, global = true)]
    pub pin: Option<String>,

    /// Firmware protocol generation
    #[arg(long, value_enum, global = true)]
    pub protocol: Option<ProtocolArg>,

    /// Settings file to use instead of the per-user one
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print reports as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Store address and pin in the settings file after connecting
    #[arg(long, global = true)]
    pub remember: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Scan and list all nearby fans
    List {
        /// Scan duration in seconds
        #[arg(short, long)]
        duration: Option<u64>,
    },
    /// Dump every characteristic with its properties and value
    Scan,
    /// Print every setting, then poll the live state (default)
    Info,
    /// Poll the live state
    Monitor {
        /// Seconds between polls
        #[arg(short, long)]
        interval: Option<u64>,
        /// Stop after this many transport failures in a row
        #[arg(long)]
        max_failures: Option<u32>,
    },
    /// Enable boost mode for SECONDS seconds
    Boost {
        seconds: u16,
        #[arg(short, long, default_value_t = DEFAULT_BOOST_SPEED)]
        speed: u16,
    },
    /// Stop boost mode
    BoostOff,
    /// Set the trickle speed. The fan runs at least this fast all the time.
    Trickle {
        #[arg(allow_negative_numbers = true)]
        speed: i32,
    },
    /// Set humidity, light and trickle speeds
    FanSpeeds {
        #[arg(allow_negative_numbers = true)]
        humidity: i32,
        #[arg(allow_negative_numbers = true)]
        light: i32,
        #[arg(allow_negative_numbers = true)]
        trickle: i32,
    },
    /// Set the fan clock to the local time
    SetTime,
    /// Set the silent hours window, e.g. `silent-hours 22:00 06:30`
    SilentHours {
        #[arg(required_unless_present = "off")]
        start: Option<ClockTime>,
        #[arg(required_unless_present = "off")]
        end: Option<ClockTime>,
        /// Disable silent hours
        #[arg(long)]
        off: bool,
    },
    /// Set humidity and light sensitivity, 0 (off) to 3
    Sensitivity { humidity: u8, light: u8 },
    /// Set light sensor delayed start and running time in minutes
    LightSensor { delayed_start: u8, running_time: u8 },
    /// Set automatic airing: 0 off, 1 = 30 min, 2 = 60 min, 3 = 90 min
    AutomaticCycles { setting: u8 },
    /// Set trickle ventilation day masks
    TrickleDays { weekdays: u8, weekends: u8 },
    /// Set the operating mode
    Mode {
        #[arg(value_enum)]
        mode: ModeArg,
    },
    /// Rename the fan
    Alias { name: String },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolArg {
    Current,
    Legacy,
}

impl From<ProtocolArg> for Protocol {
    fn from(arg: ProtocolArg) -> Self {
        match arg {
            ProtocolArg::Current => Protocol::Current,
            ProtocolArg::Legacy => Protocol::Legacy,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    Multi,
    DraftShutter,
    WallSwitchExtendedRuntime,
    WallSwitchNoExtendedRuntime,
    HeatDistribution,
}

impl From<ModeArg> for DeviceMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Multi => DeviceMode::MultiMode,
            ModeArg::DraftShutter => DeviceMode::DraftShutterMode,
            ModeArg::WallSwitchExtendedRuntime => DeviceMode::WallSwitchExtendedRuntimeMode,
            ModeArg::WallSwitchNoExtendedRuntime => DeviceMode::WallSwitchNoExtendedRuntimeMode,
            ModeArg::HeatDistribution => DeviceMode::HeatDistributionMode,
        }
    }
}

/// `HH:MM` on the command line. Ranges are checked by the facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTime {
    pub hour: u8,
    pub minute: u8,
}

impl FromStr for ClockTime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hour, minute) = s
            .split_once(':')
            .ok_or_else(|| format!("expected HH:MM, got '{}'", s))?;
        let parse = |part: &str| {
            part.parse::<u8>()
                .map_err(|e| format!("invalid time '{}': {}", s, e))
        };
        Ok(Self {
            hour: parse(hour)?,
            minute: parse(minute)?,
        })
    }
}

/// Output and pacing options for executing a command on a connected fan.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub json: bool,
    pub settle_delay: Duration,
    pub poll: PollPolicy,
}

/// Run the parsed command line against the configured fan.
pub async fn run(cli: Cli, settings: &mut SettingsService) -> anyhow::Result<()> {
    let command = cli.command.clone().unwrap_or(Command::Info);
    let config = settings.get().clone();

    if let Command::List { duration } = command {
        let duration = duration.unwrap_or(config.ble.scan_duration_secs);
        let adapter = get_adapter().await?;
        let scanner = BleScanner::new(adapter, config.device.address_prefix.clone());
        let devices = scanner.scan(Duration::from_secs(duration)).await?;
        return report::print_all(&devices, cli.json);
    }

    let (address, pin) = credentials(&cli, &config)?;
    let protocol = cli
        .protocol
        .map(Protocol::from)
        .unwrap_or(config.device.protocol);

    let mut fan = open(&address, &pin, protocol, &config).await?;
    if cli.remember {
        if let Err(e) = settings.remember_device(&address, &pin) {
            warn!("Could not save device settings: {}", e);
        }
    }

    let mut poll = PollPolicy::from(&config.monitor);
    if let Command::Monitor {
        interval,
        max_failures,
    } = &command
    {
        if let Some(secs) = interval {
            poll.interval = Duration::from_secs(*secs);
        }
        if let Some(max) = max_failures {
            poll.max_consecutive_failures = *max;
        }
    }
    let options = RunOptions {
        json: cli.json,
        settle_delay: SETTLE_DELAY,
        poll,
    };

    let result = execute(&mut fan, &command, &options).await;
    if let Err(e) = fan.disconnect().await {
        warn!("Disconnect failed: {}", e);
    }
    result
}

/// Address and pin from the command line, falling back to the settings file.
fn credentials(cli: &Cli, settings: &Settings) -> anyhow::Result<(String, String)> {
    let address = cli.address.clone().or_else(|| settings.device.address.clone());
    let pin = cli.pin.clone().or_else(|| settings.device.pin.clone());
    match (address, pin) {
        (Some(address), Some(pin)) => Ok((address, pin)),
        _ => bail!("You need to set both mac address and pincode to connect (see --help)"),
    }
}

async fn open(
    address: &str,
    pin: &str,
    protocol: Protocol,
    settings: &Settings,
) -> anyhow::Result<FanService<BleConnection>> {
    if protocol == Protocol::Legacy {
        warn!("Legacy firmware is addressed by handle, which this Bluetooth backend cannot do");
    }

    let adapter = get_adapter().await?;
    let scanner = BleScanner::new(adapter, settings.device.address_prefix.clone());
    let config = ConnectionConfig {
        scan_duration_secs: settings.ble.scan_duration_secs,
        connect_timeout_secs: settings.ble.connect_timeout_secs,
    };
    let connection = BleConnection::connect(&scanner, address, &config)
        .await
        .with_context(|| format!("Could not connect to {}", address))?;

    FanService::connect(connection, protocol, pin)
        .await
        .context("Could not authenticate")
}

/// Run one command against an authenticated fan. The fan stays connected.
pub async fn execute<T: GattTransport>(
    fan: &mut FanService<T>,
    command: &Command,
    options: &RunOptions,
) -> anyhow::Result<()> {
    let json = options.json;

    match command {
        Command::List { .. } => bail!("list does not use a connection"),
        Command::Scan => {
            let reports = fan.scan_characteristics().await?;
            let rows: Vec<CharacteristicRow> =
                reports.iter().map(CharacteristicRow::from).collect();
            report::print_all(&rows, json)?;
        }
        Command::Info => {
            let device = report::collect(fan).await?;
            report::print(&device, json)?;
            poll(fan, options).await?;
        }
        Command::Monitor { .. } => poll(fan, options).await?,
        Command::Boost { seconds, speed } => {
            info!("Setting boost mode for {} seconds", seconds);
            fan.set_boost_mode(true, *speed, *seconds).await?;
            tokio::time::sleep(options.settle_delay).await;
            report::print(&fan.get_boost_mode().await?, json)?;
        }
        Command::BoostOff => {
            fan.set_boost_mode(false, 0, 0).await?;
            report::print(&fan.get_boost_mode().await?, json)?;
        }
        Command::Trickle { speed } => {
            info!("Setting trickle speed to {}", speed);
            let speeds =
                FanSpeedSettings::new(TRICKLE_HUMIDITY_SPEED, TRICKLE_LIGHT_SPEED, *speed)?;
            fan.set_fan_speed_settings(&speeds).await?;
            tokio::time::sleep(options.settle_delay).await;
            report::print(&fan.get_fan_speed_settings().await?, json)?;
        }
        Command::FanSpeeds {
            humidity,
            light,
            trickle,
        } => {
            let speeds = FanSpeedSettings::new(*humidity, *light, *trickle)?;
            fan.set_fan_speed_settings(&speeds).await?;
            report::print(&fan.get_fan_speed_settings().await?, json)?;
        }
        Command::SetTime => {
            fan.set_time_to_now().await?;
            report::print(&fan.get_time().await?, json)?;
        }
        Command::SilentHours { start, end, off } => {
            let start = start.unwrap_or(ClockTime { hour: 0, minute: 0 });
            let end = end.unwrap_or(ClockTime { hour: 0, minute: 0 });
            let hours = SilentHours {
                enabled: !off,
                start_hour: start.hour,
                start_minute: start.minute,
                end_hour: end.hour,
                end_minute: end.minute,
            };
            fan.set_silent_hours(&hours).await?;
            report::print(&fan.get_silent_hours().await?, json)?;
        }
        Command::Sensitivity { humidity, light } => {
            fan.set_sensors_sensitivity(*humidity, *light).await?;
            report::print(&fan.get_sensors_sensitivity().await?, json)?;
        }
        Command::LightSensor {
            delayed_start,
            running_time,
        } => {
            fan.set_light_sensor_settings(*delayed_start, *running_time)
                .await?;
            report::print(&fan.get_light_sensor_settings().await?, json)?;
        }
        Command::AutomaticCycles { setting } => {
            fan.set_automatic_cycles(*setting).await?;
            report::print(&fan.get_automatic_cycles().await?, json)?;
        }
        Command::TrickleDays { weekdays, weekends } => {
            fan.set_trickle_days(*weekdays, *weekends).await?;
            report::print(&fan.get_trickle_days().await?, json)?;
        }
        Command::Mode { mode } => {
            fan.set_mode(DeviceMode::from(*mode)).await?;
            report::print(&fan.get_mode().await?, json)?;
        }
        Command::Alias { name } => {
            fan.set_alias(name).await?;
            println!("{}", fan.get_alias().await?);
        }
    }
    Ok(())
}

/// Print the live state until Ctrl-C or the connection gives out.
async fn poll<T: GattTransport>(
    fan: &mut FanService<T>,
    options: &RunOptions,
) -> anyhow::Result<()> {
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Could not listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    let reason = monitor::watch(fan, &options.poll, shutdown, |state| {
        if let Err(e) = report::print(state, options.json) {
            warn!("Could not print state: {}", e);
        }
    })
    .await;

    match reason {
        StopReason::Shutdown => Ok(()),
        StopReason::TransportFailures(n) => bail!("Lost the fan after {} failed reads", n),
    }
}
