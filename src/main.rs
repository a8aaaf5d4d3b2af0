//! # 非定常熱伝導 PINN
//!
//! `clap` クレートを利用して、コマンドラインから`train`（学習）と`infer`（推論）の
//! 機能を個別に実行できます。
//!
//! ## 使い方
//!
//! ### 学習
//! ```bash
//! cargo run --release -- train
//! cargo run --release -- train --plate --iterations 2000
//! ```
//!
//! ### 推論
//! ```bash
//! cargo run --release -- infer
//! ```

use clap::Parser;
use heat_pinn::cli::{Cli, Commands};
use heat_pinn::plot::FieldGrid;
use heat_pinn::{PinnResult, config, inference, logging, training};

fn run(cli: Cli) -> PinnResult<()> {
    match cli.command {
        Commands::Train(args) => {
            let config = args.resolve_config()?;
            training::run(config, &args.artifact_dir, !args.no_plots)?;
        }
        Commands::Infer {
            artifact_dir,
            resolution,
            time,
        } => {
            let grid = FieldGrid {
                resolution,
                snapshot_time: time,
            };
            inference::run(&artifact_dir, grid, true)?;
        }
        Commands::InitConfig { output, plate } => config::write_default(&output, plate)?,
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.log_level.as_deref());

    if let Err(e) = run(cli) {
        log::error!("{e}");
        std::process::exit(1);
    }
}
