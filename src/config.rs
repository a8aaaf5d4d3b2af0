//! 学習全体の設定
//!
//! burn の `Config` で定義しているため、`with_*` による上書きと JSON での保存・読み込みができます。

use crate::backend::ComputeBackend;
use crate::domain::{Domain, DomainConfig};
use crate::error::{PinnError, PinnResult};
use crate::loss::LossWeights;
use crate::model::FieldNetworkConfig;
use crate::problem::{BoundaryConditions, EdgeProfile, PhysicsConfig, Transverse};
use crate::sampler::SampleCounts;
use burn::config::Config;
use burn::optim::AdamConfig;
use burn::optim::decay::WeightDecayConfig;
use std::path::Path;

#[derive(Config, Debug)]
pub struct PinnConfig {
    #[config(default = "DomainConfig::new()")]
    pub domain: DomainConfig,
    #[config(default = "PhysicsConfig::new()")]
    pub physics: PhysicsConfig,
    #[config(default = "FieldNetworkConfig::new()")]
    pub model: FieldNetworkConfig,
    /// Adam の学習率
    #[config(default = 2.0e-2)]
    pub learning_rate: f64,
    /// L2 正則化の係数（`None` なら無効）
    #[config(default = "None")]
    pub weight_decay: Option<f32>,
    #[config(default = "LossWeights::new()")]
    pub loss_weights: LossWeights,
    #[config(default = "SampleCounts::new()")]
    pub sample_counts: SampleCounts,
    #[config(default = 5000)]
    pub max_iterations: usize,
    /// 損失の出力と描画を行う間隔
    #[config(default = 500)]
    pub report_interval: usize,
    #[config(default = "None")]
    pub seed: Option<u64>,
    #[config(default = "ComputeBackend::Cpu")]
    pub backend: ComputeBackend,
}

impl PinnConfig {
    /// x ∈ [0, 2], t ∈ [0, 1], β = 3, k = c = 1, u(0, t) = 1 − exp(−t/0.1), u(2, t) = 0, u(x, 0) = 0
    pub fn baseline() -> Self {
        Self::new()
    }

    /// 単位正方形の板。x = 0 の辺を y 方向に半波長の正弦分布で加熱します。
    pub fn plate() -> Self {
        let boundary = BoundaryConditions {
            x_lower: EdgeProfile::ramp(1.0, 0.1).with_transverse(Transverse::HalfSine),
            ..BoundaryConditions::baseline()
        };
        Self::new()
            .with_domain(
                DomainConfig::new()
                    .with_x_max(1.0)
                    .with_y_min(Some(0.0))
                    .with_y_max(Some(1.0)),
            )
            .with_physics(PhysicsConfig::new().with_beta(0.0).with_boundary(boundary))
            .with_sample_counts(SampleCounts::new().with_interior(2000))
    }

    /// JSON ファイルから読み込みます。
    pub fn from_file(path: impl AsRef<Path>) -> PinnResult<Self> {
        let path = path.as_ref();
        Self::load(path).map_err(|e| PinnError::ConfigFile(format!("{}: {e:?}", path.display())))
    }

    /// 学習開始前に全ての設定を検証し、領域を返します。
    pub fn validate(&self) -> PinnResult<Domain> {
        let domain = self.domain.build()?;
        self.physics.validate(&domain)?;

        if self.model.hidden_layer_sizes.is_empty() || self.model.hidden_layer_sizes.contains(&0) {
            return Err(PinnError::config(format!(
                "hidden_layer_sizes = {:?} は1つ以上の正のユニット数である必要があります",
                self.model.hidden_layer_sizes
            )));
        }
        if !(self.learning_rate > 0.0) || !self.learning_rate.is_finite() {
            return Err(PinnError::config(format!(
                "learning_rate = {} は正の値である必要があります",
                self.learning_rate
            )));
        }
        if let Some(decay) = self.weight_decay {
            if !(decay >= 0.0) || !decay.is_finite() {
                return Err(PinnError::config(format!(
                    "weight_decay = {decay} は0以上である必要があります"
                )));
            }
        }
        self.loss_weights.validate()?;
        self.sample_counts.validate()?;
        if self.max_iterations == 0 {
            return Err(PinnError::config("max_iterations は1以上である必要があります"));
        }
        if self.report_interval == 0 {
            return Err(PinnError::config("report_interval は1以上である必要があります"));
        }
        Ok(domain)
    }

    /// Adam の設定
    pub fn optimizer(&self) -> AdamConfig {
        AdamConfig::new().with_weight_decay(self.weight_decay.map(WeightDecayConfig::new))
    }
}

/// 既定の設定を JSON として書き出します。
pub fn write_default(path: &Path, plate: bool) -> PinnResult<()> {
    let config = if plate {
        PinnConfig::plate()
    } else {
        PinnConfig::baseline()
    };
    config.save(path)?;
    log::info!("=> 設定を '{}' に保存しました。", path.display());
    Ok(())
}
