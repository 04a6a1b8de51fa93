use clap::Parser;
use payment_model::RunMode;

/// Reads payment sheets and pushes a due-date report to ntfy.
#[derive(Debug, Parser)]
#[command(name = "payment-report", version, about)]
pub struct Cli {
    /// Path to the YAML configuration. Falls back to $PAYMENT_REPORT_CONFIG,
    /// then ~/.payment-report/config.yaml and /etc/payment-report.yaml.
    #[arg(value_name = "CONFIG")]
    pub config: Option<String>,

    /// Also print each report to standard output.
    #[arg(long)]
    pub print: bool,

    /// Run a single report and exit instead of following the schedule.
    #[arg(long)]
    pub once: bool,

    /// Timeout in seconds for every outbound HTTP call.
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub http_timeout: u64,
}

impl Cli {
    pub fn mode(&self) -> RunMode {
        if self.once {
            RunMode::Once
        } else {
            RunMode::Scheduled
        }
    }
}
