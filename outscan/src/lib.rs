// Include the binary's modules directly so integration tests can drive them
#[path = "commands.rs"]
pub mod commands;
#[path = "handlers.rs"]
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{build_scan_options, flag_or_env, run_scan};

// Re-export scan functionality from outscan-core
pub use outscan_core::report::write_reports;
pub use outscan_core::scan::execute_scan;
pub use outscan_core::{Allowlist, ScanOptions, ScanResult};
