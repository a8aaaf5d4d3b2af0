//! 選点（コロケーション点）のサンプリング
//!
//! 学習の反復ごとに内部点・初期点・境界点を一様乱数で引き直します。

use crate::batch::{BatchRole, CoordinateBatch, TrackedCoords};
use crate::domain::{Axis, Domain, Edge, Interval};
use crate::error::{PinnError, PinnResult};
use burn::config::Config;
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::{Distribution, Tensor};

/// 1反復あたりの点数
#[derive(Config, Debug)]
pub struct SampleCounts {
    #[config(default = 1000)]
    pub interior: usize,
    #[config(default = 100)]
    pub ic: usize,
    /// 境界辺1本あたりの点数
    #[config(default = 100)]
    pub bc: usize,
}

impl SampleCounts {
    pub fn validate(&self) -> PinnResult<()> {
        for (name, count) in [("interior", self.interior), ("ic", self.ic), ("bc", self.bc)] {
            if count == 0 {
                return Err(PinnError::config(format!(
                    "sample_counts.{name} は1以上である必要があります"
                )));
            }
        }
        Ok(())
    }
}

/// 1反復分の選点
#[derive(Debug, Clone)]
pub struct CollocationSet<B: Backend> {
    /// PDE残差用の内部点（勾配追跡済み）
    pub interior: TrackedCoords<B>,
    /// t = 0 の点
    pub initial: CoordinateBatch<B>,
    /// 各境界辺の点
    pub boundaries: Vec<CoordinateBatch<B>>,
}

/// 領域から選点を引くサンプラー
#[derive(Debug, Clone)]
pub struct CollocationSampler {
    domain: Domain,
    counts: SampleCounts,
}

impl CollocationSampler {
    pub fn new(domain: Domain, counts: SampleCounts) -> PinnResult<Self> {
        counts.validate()?;
        Ok(Self { domain, counts })
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// 新しい選点一式を引きます。
    pub fn sample<B: AutodiffBackend>(&self, device: &B::Device) -> PinnResult<CollocationSet<B>> {
        let interior = self.batch(self.counts.interior, BatchRole::Interior, device)?.track();
        let initial = self.batch(self.counts.ic, BatchRole::Initial, device)?;
        let boundaries = self
            .domain
            .edges()
            .into_iter()
            .map(|edge| self.batch(self.counts.bc, BatchRole::Boundary(edge), device))
            .collect::<PinnResult<Vec<_>>>()?;

        Ok(CollocationSet {
            interior,
            initial,
            boundaries,
        })
    }

    fn batch<B: Backend>(&self, n: usize, role: BatchRole, device: &B::Device) -> PinnResult<CoordinateBatch<B>> {
        let layout = self.domain.dimensionality();
        let columns = layout
            .axes()
            .iter()
            .map(|&axis| self.column::<B>(n, axis, role, device))
            .collect::<Vec<_>>();
        CoordinateBatch::new(Tensor::cat(columns, 1), role, layout)
    }

    /// 役割に応じて、固定値または区間内の一様乱数の列を作ります。
    fn column<B: Backend>(&self, n: usize, axis: Axis, role: BatchRole, device: &B::Device) -> Tensor<B, 2> {
        match role {
            BatchRole::Initial if axis == Axis::T => Tensor::zeros([n, 1], device),
            BatchRole::Boundary(Edge { axis: fixed, side }) if axis == fixed => {
                let value = self.domain.edge_value(Edge::new(fixed, side)).unwrap_or_default();
                Tensor::full([n, 1], value, device)
            }
            _ => match self.domain.interval(axis) {
                Some(interval) => uniform(n, interval, device),
                None => Tensor::zeros([n, 1], device),
            },
        }
    }
}

fn uniform<B: Backend>(n: usize, interval: Interval, device: &B::Device) -> Tensor<B, 2> {
    Tensor::random([n, 1], Distribution::Uniform(interval.min, interval.max), device)
}
