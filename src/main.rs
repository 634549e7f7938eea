use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use color_eyre::Result;
use color_eyre::eyre::eyre;
use serde::Serialize;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use sysvigil::config::{Config, ConfigError, LoggingConfig, RefreshInterval, load_config_or_default};
use sysvigil::format::{fit_unicode, format_bytes, format_uptime};
use sysvigil::query::{QuerySpec, SortColumn};
use sysvigil::system::history::Metric;
use sysvigil::system::kill::{self, Signal};
use sysvigil::system::process::ProcessRecord;
use sysvigil::system::session::SessionRecord;
use sysvigil::system::snapshot::{HostInfo, MetricSample, TickState};
use sysvigil::{Monitor, MonitorOptions};

#[derive(Parser)]
#[command(
    name = "sysvigil",
    version,
    about = "Live CPU, memory, process and session monitor"
)]
struct Cli {
    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Refresh interval in seconds: 1, 2, 5 or 10
    #[arg(long)]
    interval: Option<u64>,

    /// Stop after this many ticks (0 runs until interrupted)
    #[arg(long, default_value_t = 0)]
    ticks: u64,

    /// Only show processes whose name contains this text
    #[arg(long)]
    filter: Option<String>,

    /// Include processes owned by other users
    #[arg(long, default_value_t = false)]
    all: bool,

    /// Sort column: pid, name, user, status, cpu, memory, command
    #[arg(long)]
    sort: Option<String>,

    /// Sort ascending instead of descending
    #[arg(long, default_value_t = false)]
    asc: bool,

    /// Maximum number of process rows per tick
    #[arg(long, default_value_t = 20)]
    limit: usize,

    /// Print logged-in sessions
    #[arg(long, default_value_t = false)]
    sessions: bool,

    /// Emit one JSON object per tick instead of a table
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Terminate this PID and exit
    #[arg(long)]
    kill: Option<u32>,

    /// With --kill, send SIGKILL instead of SIGTERM
    #[arg(long, default_value_t = false, requires = "kill")]
    force: bool,

    /// Log output format
    #[arg(long)]
    log_format: Option<LogFormat>,

    /// Log level or filter directive (RUST_LOG takes precedence)
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormat {
    /// Human-readable text format.
    Text,
    /// Machine-readable JSON format.
    Json,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let (config, fallback) = load_config_for_cli(&cli)?;
    init_logging(&config.logging)?;
    if let Some(err) = fallback {
        tracing::warn!(%err, "falling back to default config");
    }

    if let Some(pid) = cli.kill {
        let signal = if cli.force { Signal::Kill } else { Signal::Term };
        let done = kill::terminate_with(pid, signal)?;
        println!("Sent {} to PID {}", done.signal.name(), done.pid);
        return Ok(());
    }

    let spec = QuerySpec {
        name_filter: cli.filter.clone().unwrap_or_default(),
        include_system_processes: cli.all || config.general.include_system_processes,
        sort_column: SortColumn::from_str_config(
            cli.sort.as_deref().unwrap_or(&config.general.default_sort),
        ),
        sort_ascending: cli.asc || config.general.sort_ascending,
    };

    let mut options = MonitorOptions::from_config(&config);
    options.collect_sessions = options.collect_sessions || cli.sessions;
    let monitor = Monitor::start(options);
    let mut updates = monitor.subscribe();
    let mut shown = 0u64;

    while updates.changed().await.is_ok() {
        let tick = updates.borrow_and_update().clone();
        let rows = monitor.query(&spec);
        if cli.json {
            print_json(&tick, &rows, &cli)?;
        } else {
            print_table(&tick, &rows, &spec, &cli, monitor.invoking_user());
        }

        shown += 1;
        if cli.ticks != 0 && shown >= cli.ticks {
            break;
        }
    }

    monitor.shutdown().await;
    Ok(())
}

/// Also returns why the config file was ignored, to be logged once the
/// subscriber is installed.
fn load_config_for_cli(cli: &Cli) -> Result<(Config, Option<ConfigError>)> {
    let (mut config, fallback) = load_config_or_default(cli.config.as_deref());

    if let Some(secs) = cli.interval {
        // Validate up front so a bad flag is an error, not a silent default.
        let interval = RefreshInterval::try_from(secs)?;
        config.general.refresh_interval_secs = interval.secs();
    }
    if let Some(ref format) = cli.log_format {
        config.logging.format = match format {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
        }
        .to_string();
    }
    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }

    Ok((config, fallback))
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .map_err(|e| eyre!("invalid log level `{}`: {e}", logging.level))?;

    match logging.format.as_str() {
        "json" => tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .try_init()?,
        "text" => tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .try_init()?,
        other => return Err(eyre!("unknown log format `{other}` (expected text or json)")),
    }
    Ok(())
}

#[derive(Serialize)]
struct TickReport<'a> {
    sequence: u64,
    sample: &'a MetricSample,
    host: &'a HostInfo,
    processes: &'a [ProcessRecord],
    #[serde(skip_serializing_if = "Option::is_none")]
    sessions: Option<&'a [SessionRecord]>,
}

fn print_json(tick: &TickState, rows: &[ProcessRecord], cli: &Cli) -> Result<()> {
    let report = TickReport {
        sequence: tick.sequence,
        sample: &tick.sample,
        host: &tick.host,
        processes: &rows[..rows.len().min(cli.limit)],
        sessions: cli.sessions.then_some(&tick.sessions[..]),
    };
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}

fn cpu_line(tick: &TickState) -> String {
    let host = &tick.host;
    let sample = &tick.sample;
    let cores = match host.physical_cores {
        Some(physical) => format!("{physical} physical / {} logical", host.logical_cores),
        None => format!("{} cores", host.logical_cores),
    };
    let freq = sample
        .cpu_frequency_mhz
        .map(|mhz| format!(" @ {mhz} MHz"))
        .unwrap_or_default();
    let max = host
        .cpu_max_frequency_mhz
        .map(|mhz| format!(" (max {mhz} MHz)"))
        .unwrap_or_default();
    format!(
        "CPU {:5.1}%  {} ({cores}){freq}{max}  [{} samples]",
        sample.cpu_percent,
        host.cpu_model,
        tick.history.get(Metric::Cpu).len(),
    )
}

fn print_table(tick: &TickState, rows: &[ProcessRecord], spec: &QuerySpec, cli: &Cli, user: &str) {
    let host = &tick.host;
    let sample = &tick.sample;
    let [one, five, fifteen] = host.load_average;

    println!(
        "{}  {}  up {}  load {one:.2} {five:.2} {fifteen:.2}",
        host.hostname.as_deref().unwrap_or("?"),
        host.kernel_version.as_deref().unwrap_or("?"),
        format_uptime(host.uptime_secs),
    );
    println!("{}", cpu_line(tick));
    println!(
        "Mem {:5.1}%  {} / {}  available {}  swap {} / {}",
        sample.memory_percent,
        format_bytes(sample.memory_used_bytes),
        format_bytes(sample.memory_total_bytes),
        format_bytes(sample.memory_available_bytes),
        format_bytes(sample.swap_used_bytes),
        format_bytes(sample.swap_total_bytes),
    );

    let scope = if spec.include_system_processes {
        "all users".to_string()
    } else {
        format!("user {user}")
    };
    println!(
        "{} of {} processes ({scope}, by {} {})",
        rows.len(),
        tick.snapshot.len(),
        spec.sort_column.label(),
        if spec.sort_ascending { "asc" } else { "desc" },
    );
    println!(
        "{:>7} {} {} {:>6} {:>6} {:>9}  {} COMMAND",
        "PID",
        fit_unicode("USER", 10),
        fit_unicode("STATUS", 8),
        "CPU%",
        "MEM%",
        "RSS",
        fit_unicode("NAME", 16),
    );
    for record in rows.iter().take(cli.limit) {
        println!(
            "{:>7} {} {} {:>6.1} {:>6.1} {:>9}  {} {}",
            record.pid,
            fit_unicode(&record.owner_user, 10),
            fit_unicode(record.status.label(), 8),
            record.cpu_percent,
            record.memory_percent,
            format_bytes(record.memory_bytes),
            fit_unicode(&record.name, 16),
            fit_unicode(&record.command_line, 60).trim_end(),
        );
    }

    if cli.sessions {
        println!();
        println!(
            "{} {} {} {} {} WHAT",
            fit_unicode("USER", 10),
            fit_unicode("TTY", 8),
            fit_unicode("FROM", 16),
            fit_unicode("LOGIN@", 8),
            fit_unicode("IDLE", 7),
        );
        for session in tick.sessions.iter() {
            println!(
                "{} {} {} {} {} {}",
                fit_unicode(&session.user, 10),
                fit_unicode(&session.terminal, 8),
                fit_unicode(session.from_host.as_deref().unwrap_or("-"), 16),
                fit_unicode(&session.login_time, 8),
                fit_unicode(&session.idle_time, 7),
                session.command.as_deref().unwrap_or(""),
            );
        }
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_config() {
        let cli = Cli::parse_from([
            "sysvigil",
            "--config",
            "/nonexistent/sysvigil.toml",
            "--interval",
            "5",
            "--log-format",
            "json",
        ]);
        let (config, fallback) = load_config_for_cli(&cli).unwrap();
        assert_eq!(config.general.refresh_interval(), RefreshInterval::Five);
        assert_eq!(config.logging.format, "json");
        assert!(matches!(fallback, Some(ConfigError::Read { .. })));
    }

    #[test]
    fn malformed_config_reason_survives_until_logging_is_up() {
        let temp = std::env::temp_dir().join("sysvigil_cli_malformed.toml");
        std::fs::write(&temp, "[general\nrefresh_interval_secs = ").unwrap();
        let path = temp.to_string_lossy().to_string();
        let cli = Cli::parse_from(["sysvigil", "--config", path.as_str()]);
        let (config, fallback) = load_config_for_cli(&cli).unwrap();
        assert_eq!(config.general.refresh_interval(), RefreshInterval::Two);
        assert!(matches!(fallback, Some(ConfigError::Parse(_))));
        let _ = std::fs::remove_file(&temp);
    }

    #[test]
    fn unsupported_interval_flag_is_rejected() {
        let cli = Cli::parse_from(["sysvigil", "--config", "/nonexistent/x.toml", "--interval", "3"]);
        assert!(load_config_for_cli(&cli).is_err());
    }

    #[test]
    fn cpu_line_shows_core_counts_and_max_frequency() {
        let mut tick = TickState::initial(std::time::UNIX_EPOCH);
        tick.sample.cpu_percent = 12.5;
        tick.sample.cpu_frequency_mhz = Some(2400);
        tick.host.cpu_model = "Test CPU".to_string();
        tick.host.logical_cores = 8;
        tick.host.physical_cores = Some(4);
        tick.host.cpu_max_frequency_mhz = Some(3600);
        assert_eq!(
            cpu_line(&tick),
            "CPU  12.5%  Test CPU (4 physical / 8 logical) @ 2400 MHz (max 3600 MHz)  [0 samples]"
        );

        tick.host.physical_cores = None;
        tick.host.cpu_max_frequency_mhz = None;
        tick.sample.cpu_frequency_mhz = None;
        assert_eq!(cpu_line(&tick), "CPU  12.5%  Test CPU (8 cores)  [0 samples]");
    }

    #[test]
    fn force_requires_kill() {
        assert!(Cli::try_parse_from(["sysvigil", "--force"]).is_err());
        assert!(Cli::try_parse_from(["sysvigil", "--kill", "42", "--force"]).is_ok());
    }
}
