use std::fs::File;
use std::io::Read;
use std::process::ExitCode;
use std::time::Duration;

use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use ddns_agent::config::Config;
use ddns_agent::{DdnsAgent, DdnsResult, TcpConnector};

const CONFIG_PATHS: &[&str] = &[
    "./config.toml",
    #[cfg(target_family = "unix")]
    "/etc/ddns-agent/config.toml",
];

/// The path given on the command line wins; otherwise the first readable
/// file out of `CONFIG_PATHS` is used.
fn read_config() -> Option<String> {
    let paths = match std::env::args().nth(1) {
        Some(path) => vec![path],
        None => CONFIG_PATHS.iter().map(|path| path.to_string()).collect(),
    };

    for path in &paths {
        let mut file = match File::open(path) {
            Ok(f) => f,
            Err(_) => continue,
        };

        let mut config_str = String::new();
        match file.read_to_string(&mut config_str) {
            Ok(_) => return Some(config_str),
            Err(e) => eprintln!("Unable to read config file {}, reason: {}", path, e),
        }
    }

    None
}

/// Counts consecutive failed cycles and decides how loudly to report them.
#[derive(Debug)]
struct FailureTracker {
    failures: u32,
    threshold: u32,
}

impl FailureTracker {
    fn new(threshold: u32) -> Self {
        Self { failures: 0, threshold }
    }

    /// Account for one cycle. Returns true once the failure streak has
    /// reached the threshold.
    fn record(&mut self, result: DdnsResult) -> bool {
        match result {
            DdnsResult::Updated | DdnsResult::Unchanged => {
                self.failures = 0;
                false
            }
            DdnsResult::Error => {
                self.failures = self.failures.saturating_add(1);
                self.failures >= self.threshold
            }
        }
    }

    fn last_cycle_succeeded(&self) -> bool {
        self.failures == 0
    }

    /// Exit status of a single-cycle run.
    fn exit_code(&self) -> ExitCode {
        if self.last_cycle_succeeded() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let Some(config_str) = read_config() else {
        eprintln!("No configuration found. Quitting.");
        return ExitCode::FAILURE;
    };

    let config = match Config::from_toml(&config_str) {
        Ok(conf) => conf,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.general.log_level);

    let resolver = match config.resolver.to_resolver() {
        Ok(r) => r,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut connector = TcpConnector::new(config.resolver.connect_timeout());
    let mut agent = DdnsAgent::new(config.ddns.into_boxed())
        .with_resolver(resolver)
        .with_retry(config.resolver.retry_policy())
        .with_poll(config.resolver.poll_config());

    let update_rate = config.general.update_rate;
    let mut tracker = FailureTracker::new(config.general.failure_threshold.get());

    info!(
        "ddns-agent v{} started, updating every {} second(s)",
        env!("CARGO_PKG_VERSION"),
        update_rate.map(u32::from).unwrap_or(0)
    );

    loop {
        let result = agent.update(&mut connector);
        let escalate = tracker.record(result);

        match result {
            DdnsResult::Updated => {}
            DdnsResult::Unchanged => debug!("nothing to do this cycle"),
            DdnsResult::Error if escalate => {
                error!("{} consecutive update cycles have failed", tracker.failures)
            }
            DdnsResult::Error => warn!("update cycle failed ({} in a row)", tracker.failures),
        }

        match &update_rate {
            Some(sleep_for) => std::thread::sleep(Duration::from_secs(sleep_for.get() as u64)),
            // 0 update rate makes this a fire-once program.
            None => return tracker.exit_code(),
        }
    }
}
