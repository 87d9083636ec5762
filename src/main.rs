mod cli;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "safequake=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let (addr, config) = match cli::run() {
        cli::RunOutcome::Serve(addr, config) => (addr, config),
        cli::RunOutcome::Broadcast(config, text) => {
            match safequake::broadcast(config, &text).await {
                Ok((sent, failed)) => {
                    println!("sent {sent}, failed {failed}");
                    std::process::exit(if failed == 0 { 0 } else { 1 });
                }
                Err(err) => {
                    tracing::error!(error = %err, "broadcast failed");
                    std::process::exit(1);
                }
            }
        }
        cli::RunOutcome::ResetMarker(config) => match safequake::reset_marker(&config) {
            Ok(()) => std::process::exit(0),
            Err(err) => {
                tracing::error!(error = %err, "failed to reset marker");
                std::process::exit(1);
            }
        },
        cli::RunOutcome::Exit(code) => std::process::exit(code),
    };

    if let Err(err) = safequake::serve(addr, config).await {
        tracing::error!(error = %err, "server stopped");
        std::process::exit(1);
    }
}
