mod cli;
mod commands;
mod demo;
mod infra;

use nijobs_offers::error::AppError;

pub fn run() -> Result<(), AppError> {
    cli::run()
}
