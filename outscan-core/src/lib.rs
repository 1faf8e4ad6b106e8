pub mod allowlist;
pub mod classify;
pub mod config;
pub mod error;
pub mod report;
pub mod scan;

pub use allowlist::{Allowlist, Rule};
pub use classify::ScanResult;
pub use config::ScanOptions;
pub use error::CheckError;

pub fn print_banner() {
    println!(
        r#"
            _
  ___  _  _| |_ ___ __ __ _ _ _
 / _ \| || |  _(_-</ _/ _` | ' \
 \___/ \_,_|\__/__/\__\__,_|_||_|
"#
    );
    println!(
        "outscan v{} - checks that all outbound URLs are ones we expect\n",
        env!("CARGO_PKG_VERSION")
    );
}
