use clap::Parser;
use puppetconfig::cli::{self, Cli};
use std::io;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let ctx = cli.context();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(ctx.log_directive())))
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {}", e);
            return ExitCode::from(2);
        }
    };

    let mut stdout = io::stdout().lock();
    match runtime.block_on(cli::run(&cli, &mut stdout)) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::debug!(kind = ?e.kind(), "command failed");
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
