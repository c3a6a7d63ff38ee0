//! arbordb entry point
//!
//! Thin launcher: parse arguments, hand off to the config module, print
//! errors to stderr, exit non-zero on failure. No subsystem logic here.

use clap::Parser;

use arbordb::config::{self, ServeArgs};

#[tokio::main]
async fn main() {
    let args = ServeArgs::parse();
    if let Err(e) = config::run(args).await {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
