use playexr::ViewerEngine;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut engine = ViewerEngine;
    ExitCode::from(playexr::run(std::env::args_os(), &mut engine))
}
