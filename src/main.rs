//! zar - inspect and export legacy tile/sprite binary assets

use std::process::ExitCode;

use zar_codec::cli;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    cli::run()
}
