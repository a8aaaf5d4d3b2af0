//! # 物理情報ニューラルネットワーク (PINN) ライブラリ
//!
//! `burn` フレームワークを使用して物理情報ニューラルネットワーク（PINN）を構築し、
//! 1次元の棒・2次元の板における非定常熱伝導方程式
//!
//! ```text
//! c ∂u/∂t = ∇·(k ∇u) − β (u − u_ref) + q
//! ```
//!
//! を解くための主要なコンポーネントを提供します。

pub mod backend;
pub mod batch;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod inference;
pub mod logging;
pub mod loss;
pub mod model;
pub mod pinn;
pub mod plot;
pub mod problem;
pub mod sampler;
pub mod training;

pub use error::{PinnError, PinnResult};

/// モデルを保存するファイル名
pub const MODEL_FILENAME: &str = "pinn_model.mpk";
/// 学習時の設定を保存するファイル名
pub const CONFIG_FILENAME: &str = "config.json";
/// 損失グラフのファイル名
pub const LOSS_GRAPH_FILENAME: &str = "loss_graph.png";
/// 推論結果の温度場のファイル名
pub const FIELD_FILENAME: &str = "field.png";
/// 成果物の既定の保存先
pub const DEFAULT_ARTIFACT_DIR: &str = "artifacts";
