mod cli;
mod evaluate;
mod infra;
mod routes;
mod server;
mod webhooks;

use loan_underwriting::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
