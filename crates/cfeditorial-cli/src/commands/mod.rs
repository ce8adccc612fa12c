use super::*;

pub mod clear;
pub mod get;
pub mod init;
pub mod invalidate;
pub mod resolve;

pub use clear::clear;
pub use get::{get, GetOptions};
pub use init::init;
pub use invalidate::invalidate;
pub use resolve::resolve;

/// Available commands for the CLI
#[derive(Subcommand, Clone)]
pub enum Commands {
  /// Write a default configuration file
  Init,

  /// Find the editorial for a problem and print its solution
  Get(GetOptions),

  /// Show how a problem URL is understood, without any network access
  Resolve {
    /// Codeforces problem URL
    /// Examples: "https://codeforces.com/contest/1/problem/A", "codeforces.com/gym/102942/problem/F"
    url: String,
  },

  /// Remove the cached editorial for a problem
  Invalidate {
    /// Codeforces problem URL
    url: String,
  },

  /// Remove every cached editorial after confirmation
  Clear,
}
