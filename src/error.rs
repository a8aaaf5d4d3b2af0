//! エラー型の定義
//!
//! 設定エラー・数値発散・次元の不一致の3種類を中心に、入出力や描画の失敗も
//! `PinnError` に集約し、呼び出し元へそのまま伝播させます。

use crate::domain::{Axis, Edge};
use crate::loss::LossRecord;
use burn::record::RecorderError;
use std::path::PathBuf;
use thiserror::Error;

/// このクレートの結果型
pub type PinnResult<T> = Result<T, PinnError>;

/// PINNの学習・推論で発生するエラー
#[derive(Error, Debug)]
pub enum PinnError {
    /// 学習開始前に検出される設定の誤り
    #[error("設定エラー: {0}")]
    Config(String),

    /// 損失が有限値でなくなった（NaN / Inf）
    #[error("数値発散: 反復 {iteration} で損失が有限値ではなくなりました (直前の有限な損失: {last_finite:?})")]
    Divergence {
        iteration: usize,
        last_finite: Option<LossRecord>,
    },

    /// 座標バッチの列数が問題の次元と一致しない
    #[error("次元の不一致 ({context}): 期待 {expected} 列, 実際 {found} 列")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        found: usize,
    },

    /// 要求された導関数が計算されていない
    #[error("軸 {0} の導関数は計算されていません")]
    MissingDerivative(Axis),

    /// バッチの役割が操作と合わない
    #[error("バッチの役割が不正です ({context}): {found}")]
    RoleMismatch {
        context: &'static str,
        found: String,
    },

    /// 領域の境界ではない辺が指定された
    #[error("辺 {0} はこの領域の境界ではありません")]
    InvalidEdge(Edge),

    /// 逆伝播の入力が勾配追跡されていない
    #[error("入力座標が勾配追跡されていないため、入力勾配を求められません")]
    UntrackedInput,

    /// 設定ファイルの読み込み失敗
    #[error("設定ファイルを読み込めません: {0}")]
    ConfigFile(String),

    /// モデルの保存・読み込み失敗
    #[error("モデルの保存/読み込みに失敗しました: {0}")]
    Record(#[from] RecorderError),

    /// 学習済みの成果物が見つからない
    #[error("'{}' が見つかりません。最初に 'train' コマンドでモデルを学習・保存してください。", .0.display())]
    MissingArtifact(PathBuf),

    /// グラフ描画の失敗
    #[error("描画に失敗しました: {0}")]
    Plot(String),

    /// テンソルからの値の取り出し失敗
    #[error("テンソルデータを読み出せません: {0}")]
    TensorData(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PinnError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
