//! Logging initialization

use std::path::PathBuf;

/// Initialize logging based on debug flag
/// Returns the log file path if debug logging is enabled
///
/// Logging goes to a file rather than stdio: the analyzer runs embedded in
/// a host process whose own console must stay untouched.
pub fn init_logging(debug: bool) -> Option<PathBuf> {
    if debug {
        // Named temp file via the tempfile crate for cross-platform support
        let temp_file = tempfile::Builder::new()
            .prefix("leakscope-")
            .suffix(".log")
            .tempfile()
            .map(|f| {
                let path = f.path().to_path_buf();
                // Keep the file alive by leaking it (cleaned up by the OS)
                std::mem::forget(f);
                path
            })
            .unwrap_or_else(|_| {
                // Fallback: create file directly in temp_dir
                let temp_dir = std::env::temp_dir();
                temp_dir.join(format!("leakscope-{}.log", std::process::id()))
            });

        let file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&temp_file)
            .expect("Failed to open log file");

        tracing_subscriber::fmt()
            .with_writer(file)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
            )
            .with_ansi(false) // No ANSI codes in log file
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .init();

        Some(temp_file)
    } else {
        // No logging by default (silent operation)
        None
    }
}
