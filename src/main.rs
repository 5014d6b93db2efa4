// src/main.rs

use tracing::error;

#[tokio::main]
async fn main() {
    let args = taskmaster::cli::parse();

    if let Err(err) = taskmaster::logging::init_logging(args.log_level) {
        eprintln!("failed to initialise logging: {err}");
        std::process::exit(1);
    }

    if let Err(err) = taskmaster::run(args).await {
        error!(error = %err, "taskmaster failed");
        std::process::exit(1);
    }
}
