// src/main.rs

use testmux::{cli, logging, run};

#[tokio::main]
async fn main() {
    let exit_code = match run_main().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("testmux error: {err}");
            1
        }
    };

    std::process::exit(exit_code);
}

async fn run_main() -> anyhow::Result<i32> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    Ok(run(args).await?)
}
