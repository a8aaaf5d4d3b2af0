//! 計算バックエンドの選択
//!
//! バックエンドは設定値として明示的に渡し、起動時に一度だけデバイスへ解決します。

use burn::backend::ndarray::NdArrayDevice;
use burn::backend::{Autodiff, NdArray};
use serde::{Deserialize, Serialize};

/// 推論用バックエンド
pub type InferenceBackend = NdArray<f32>;

/// 学習用バックエンド（自動微分付き）
pub type TrainingBackend = Autodiff<InferenceBackend>;

/// 選択可能な計算バックエンド
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum ComputeBackend {
    /// ndarray による CPU 計算
    Cpu,
}

impl ComputeBackend {
    /// テンソルを確保するデバイス
    pub fn device(self) -> NdArrayDevice {
        match self {
            ComputeBackend::Cpu => NdArrayDevice::Cpu,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ComputeBackend::Cpu => "NdArray (CPU)",
        }
    }
}
