use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match questline_cli::cli::app::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            questline_cli::output::error(&format!("{err:#}"));
            ExitCode::FAILURE
        }
    }
}
