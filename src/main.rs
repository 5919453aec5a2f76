// src/main.rs

use sysmaint::{cli, run};

#[tokio::main]
async fn main() {
    let args = cli::parse();
    match run(args).await {
        Ok(exit) => std::process::exit(exit.code()),
        Err(err) => {
            eprintln!("sysmaint error: {err}");
            std::process::exit(1);
        }
    }
}
