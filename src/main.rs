use clap::Parser;
use log::{debug, LevelFilter};
use snafu::ErrorCompat;

mod args;
mod dash;

use crate::dash::ErrorKind;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = args::Args::parse();

    if args.verbose {
        env_logger::Builder::new()
            .filter_level(LevelFilter::Debug)
            .init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }
    debug!("args: {:?}", args);

    if let Err(e) = dash::run_command(args).await {
        let kind = e.kind();
        if kind == ErrorKind::Validation {
            eprintln!("warning: {}", e);
            std::process::exit(2);
        }
        eprintln!("error ({:?}): {}", kind, e);
        for cause in e.iter_chain().skip(1) {
            eprintln!("  caused by: {}", cause);
        }
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            eprintln!("trace: {}", bt);
        }
        std::process::exit(1);
    }
}
