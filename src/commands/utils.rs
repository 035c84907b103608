/// Initialize logging
pub fn init_logging(verbose: bool) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let level = if verbose { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();
}

/// Format minutes for display, e.g. `1h 05m`
pub fn format_minutes(minutes: f64) -> String {
    let total = minutes.max(0.0).round() as u64;
    if total < 60 {
        format!("{}m", total)
    } else {
        format!("{}h {:02}m", total / 60, total % 60)
    }
}
