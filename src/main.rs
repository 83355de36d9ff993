// paicore-uart - PAICORE configuration over UART
use clap::Parser;
use paicore_uart::cli::{execute_command, Args};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let code = execute_command(args).await;
    std::process::exit(code);
}
