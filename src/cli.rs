use crate::DEFAULT_ARTIFACT_DIR;
use crate::config::PinnConfig;
use crate::error::PinnResult;
use crate::model::ActivationKind;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// clapでコマンドラインの構造を定義します。
#[derive(Parser, Debug)]
#[command(author, version, about = "A Physics-Informed Neural Network (PINN) for transient heat conduction with Burn", long_about = None)]
pub struct Cli {
    /// ログレベル (error, warn, info, debug, trace)。省略時は RUST_LOG または info
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// 実行するサブコマンドを定義します。
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// PINNモデルを学習し、結果をファイルに保存します
    Train(TrainArgs),
    /// 保存されたPINNモデルを使い、推論を実行します
    Infer {
        /// 学習済みの成果物があるディレクトリ
        #[arg(long, default_value = DEFAULT_ARTIFACT_DIR)]
        artifact_dir: PathBuf,
        /// 各方向の格子点数
        #[arg(long, default_value_t = 50)]
        resolution: usize,
        /// 2次元問題で描画する時刻
        #[arg(long)]
        time: Option<f64>,
    },
    /// 既定の設定ファイルを書き出します
    InitConfig {
        #[arg(long, default_value = "pinn_config.json")]
        output: PathBuf,
        /// 2次元の板の設定を書き出します
        #[arg(long)]
        plate: bool,
    },
}

/// `train` の引数
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// JSON 設定ファイル（省略時は既定の設定）
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// 設定ファイルがないとき、1次元の棒ではなく2次元の板の設定を使います
    #[arg(long)]
    pub plate: bool,
    #[arg(long)]
    pub iterations: Option<usize>,
    #[arg(long)]
    pub learning_rate: Option<f64>,
    /// 初期条件の損失の重み
    #[arg(long)]
    pub ic_weight: Option<f64>,
    #[arg(long, value_enum)]
    pub activation: Option<ActivationKind>,
    #[arg(long)]
    pub seed: Option<u64>,
    #[arg(long, default_value = DEFAULT_ARTIFACT_DIR)]
    pub artifact_dir: PathBuf,
    /// 温度場と損失グラフを描画しません
    #[arg(long)]
    pub no_plots: bool,
}

impl TrainArgs {
    /// 設定ファイルまたはプリセットに、コマンドラインの上書きを適用します。
    pub fn resolve_config(&self) -> PinnResult<PinnConfig> {
        let mut config = match &self.config {
            Some(path) => PinnConfig::from_file(path)?,
            None if self.plate => PinnConfig::plate(),
            None => PinnConfig::baseline(),
        };
        if let Some(iterations) = self.iterations {
            config.max_iterations = iterations;
        }
        if let Some(learning_rate) = self.learning_rate {
            config.learning_rate = learning_rate;
        }
        if let Some(ic) = self.ic_weight {
            config.loss_weights.ic = ic;
        }
        if let Some(activation) = self.activation {
            config.model.activation = activation;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        Ok(config)
    }
}
