//! 損失の組み立てと記録
//!
//! PDE・初期条件・境界条件の各残差の二乗平均を重み付きで足し合わせます。
//! `ic` の重みを上げると初期条件の精度が上がる代わりに境界条件の精度が下がることがあり、
//! これは多目的最適化として本質的なトレードオフです。

use crate::error::{PinnError, PinnResult};
use burn::config::Config;
use burn::nn::loss::{MseLoss, Reduction};
use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor};
use std::fmt;

/// 各損失項の重み
#[derive(Config, Debug)]
pub struct LossWeights {
    #[config(default = 1.0)]
    pub pde: f64,
    #[config(default = 1.0)]
    pub ic: f64,
    #[config(default = 1.0)]
    pub bc: f64,
}

impl LossWeights {
    pub fn validate(&self) -> PinnResult<()> {
        for (name, weight) in [("pde", self.pde), ("ic", self.ic), ("bc", self.bc)] {
            if !(weight > 0.0) || !weight.is_finite() {
                return Err(PinnError::config(format!(
                    "loss_weights.{name} = {weight} は正の有限値である必要があります"
                )));
            }
        }
        Ok(())
    }
}

/// 計算グラフにつながった損失テンソル
#[derive(Debug, Clone)]
pub struct LossTerms<B: Backend> {
    pub pde: Tensor<B, 1>,
    pub ic: Tensor<B, 1>,
    pub bc: Tensor<B, 1>,
    pub total: Tensor<B, 1>,
}

impl<B: Backend> LossTerms<B> {
    /// スカラー値を取り出します。
    pub fn record(&self) -> LossRecord {
        let scalar = |t: &Tensor<B, 1>| t.clone().into_scalar().elem::<f32>();
        LossRecord {
            pde: scalar(&self.pde),
            ic: scalar(&self.ic),
            bc: scalar(&self.bc),
            total: scalar(&self.total),
        }
    }
}

/// 残差の二乗平均
pub fn mean_square<B: Backend>(residual: Tensor<B, 2>) -> Tensor<B, 1> {
    let target = residual.zeros_like();
    MseLoss::new().forward(residual, target, Reduction::Mean)
}

/// 3つの残差から損失を組み立てます。
pub fn assemble<B: Backend>(
    pde_residual: Tensor<B, 2>,
    ic_residual: Tensor<B, 2>,
    bc_residual: Tensor<B, 2>,
    weights: &LossWeights,
) -> LossTerms<B> {
    let pde = mean_square(pde_residual);
    let ic = mean_square(ic_residual);
    let bc = mean_square(bc_residual);
    let total =
        pde.clone().mul_scalar(weights.pde) + ic.clone().mul_scalar(weights.ic) + bc.clone().mul_scalar(weights.bc);
    LossTerms { pde, ic, bc, total }
}

/// 1反復分の損失の内訳
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossRecord {
    pub pde: f32,
    pub ic: f32,
    pub bc: f32,
    pub total: f32,
}

impl LossRecord {
    pub fn is_finite(&self) -> bool {
        [self.pde, self.ic, self.bc, self.total].iter().all(|v| v.is_finite())
    }
}

impl fmt::Display for LossRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Total Loss: {:.6e}, PDE: {:.6e}, IC: {:.6e}, BC: {:.6e}",
            self.total, self.pde, self.ic, self.bc
        )
    }
}

/// 学習ループが所有する追記専用の損失履歴
#[derive(Debug, Clone, Default)]
pub struct LossHistory {
    records: Vec<LossRecord>,
}

impl LossHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: LossRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[LossRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first(&self) -> Option<&LossRecord> {
        self.records.first()
    }

    pub fn last(&self) -> Option<&LossRecord> {
        self.records.last()
    }

    /// 全損失の移動平均（窓幅 `window`）
    pub fn moving_average(&self, window: usize) -> Vec<f32> {
        if window == 0 {
            return Vec::new();
        }
        self.records
            .windows(window)
            .map(|w| w.iter().map(|r| r.total).sum::<f32>() / window as f32)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::TensorData;

    type TestBackend = NdArray<f32>;

    fn column(values: Vec<f32>) -> Tensor<TestBackend, 2> {
        let n = values.len();
        Tensor::from_data(TensorData::new(values, [n, 1]), &Default::default())
    }

    #[test]
    fn weighted_sum_of_mean_squares() {
        let weights = LossWeights::new().with_ic(2.0).with_bc(0.5);
        let terms = assemble(
            column(vec![1.0, -1.0]),
            column(vec![2.0, 0.0, 0.0, 2.0]),
            column(vec![3.0]),
            &weights,
        );
        let record = terms.record();
        assert!((record.pde - 1.0).abs() < 1e-6);
        assert!((record.ic - 2.0).abs() < 1e-6);
        assert!((record.bc - 9.0).abs() < 1e-6);
        assert!((record.total - (1.0 + 4.0 + 4.5)).abs() < 1e-5);
        assert!(record.is_finite());
    }

    #[test]
    fn losses_are_non_negative() {
        let terms = assemble(
            column(vec![-0.3, -2.0]),
            column(vec![-1e-3]),
            column(vec![0.0]),
            &LossWeights::new(),
        );
        let record = terms.record();
        assert!(record.pde >= 0.0 && record.ic >= 0.0 && record.bc == 0.0 && record.total >= 0.0);
    }

    #[test]
    fn detects_non_finite_loss() {
        let terms = assemble(
            column(vec![f32::NAN]),
            column(vec![0.0]),
            column(vec![0.0]),
            &LossWeights::new(),
        );
        assert!(!terms.record().is_finite());
    }

    #[test]
    fn rejects_non_positive_weights() {
        assert!(LossWeights::new().validate().is_ok());
        assert!(LossWeights::new().with_ic(0.0).validate().is_err());
        assert!(LossWeights::new().with_bc(f64::INFINITY).validate().is_err());
    }

    #[test]
    fn moving_average_smooths_history() {
        let mut history = LossHistory::new();
        for total in [4.0, 2.0, 3.0, 1.0] {
            history.push(LossRecord {
                pde: 0.0,
                ic: 0.0,
                bc: 0.0,
                total,
            });
        }
        assert_eq!(history.moving_average(2), vec![3.0, 2.5, 2.0]);
        assert!(history.moving_average(5).is_empty());
    }
}
