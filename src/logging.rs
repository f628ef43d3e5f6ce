use log::{debug, info, warn};

use crate::validation::result::ValidationResult;

/// Initialize the logger with appropriate level based on verbosity
pub fn init_logger(verbose: bool, quiet: bool) {
    let level = if quiet {
        log::LevelFilter::Off
    } else if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .init();

    debug!("Logger initialized with level: {level:?}");
}

/// Log validation start
pub fn log_validation_start(link_count: usize) {
    info!("Starting validation of {link_count} links");
}

/// Log the retry scheduler going to sleep
pub fn log_retry_sleep(delay_ms: u64, result: &ValidationResult, remaining: usize) {
    info!("Sleeping {delay_ms} ms to retry {result}; there are still {remaining} URIs to retry");
}

/// Log validation completion
pub fn log_validation_complete(link_count: usize, issues: usize, duration_ms: u128) {
    if issues == 0 {
        info!("Validation complete: {link_count}/{link_count} links valid ({duration_ms}ms)");
    } else {
        warn!(
            "Validation complete: {}/{} links valid, {} issues found ({}ms)",
            link_count.saturating_sub(issues),
            link_count,
            issues,
            duration_ms
        );
    }
}
