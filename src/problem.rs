//! 熱伝導問題の物理定義
//!
//! 支配方程式は移流（反応）項付きの非定常熱伝導方程式
//!
//! ```text
//! c ∂u/∂t − ∇·(k ∇u) + β (u − u_ref) − q = 0
//! ```
//!
//! で、初期条件・境界条件とともに [`HeatProblem`] トレイトとして表現します。
//! 1次元の棒 ([`RodProblem`]) と2次元の板 ([`PlateProblem`]) の2種類を用意しています。

use crate::batch::{BatchRole, CoordinateBatch, TrackedCoords, axis_column};
use crate::domain::{Axis, Dimensionality, Domain, Edge, Interval, Side};
use crate::error::{PinnError, PinnResult};
use crate::model::FieldDerivatives;
use burn::config::Config;
use burn::tensor::Tensor;
use burn::tensor::backend::{AutodiffBackend, Backend};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// 空間的に線形に変化する物性値 `value + slope_x·x + slope_y·y`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialProfile {
    pub value: f64,
    #[serde(default)]
    pub slope_x: f64,
    #[serde(default)]
    pub slope_y: f64,
}

impl MaterialProfile {
    pub fn uniform(value: f64) -> Self {
        Self {
            value,
            slope_x: 0.0,
            slope_y: 0.0,
        }
    }

    pub fn is_uniform(&self) -> bool {
        self.slope_x == 0.0 && self.slope_y == 0.0
    }

    pub fn at(&self, x: f64, y: f64) -> f64 {
        self.value + self.slope_x * x + self.slope_y * y
    }

    fn slope(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.slope_x,
            Axis::Y => self.slope_y,
            Axis::T => 0.0,
        }
    }

    fn evaluate<B: Backend>(&self, coords: &Tensor<B, 2>, layout: Dimensionality) -> Tensor<B, 2> {
        let [n, _] = coords.dims();
        let mut out = Tensor::full([n, 1], self.value, &coords.device());
        for &axis in layout.spatial_axes() {
            let slope = self.slope(axis);
            if slope != 0.0 {
                if let Some(column) = axis_column(coords, layout, axis) {
                    out = out + column.mul_scalar(slope);
                }
            }
        }
        out
    }

    fn gradient<B: Backend>(&self, coords: &Tensor<B, 2>, axis: Axis) -> Option<Tensor<B, 2>> {
        let slope = self.slope(axis);
        if slope == 0.0 {
            return None;
        }
        let [n, _] = coords.dims();
        Some(Tensor::full([n, 1], slope, &coords.device()))
    }
}

/// t = 0 における温度分布
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InitialProfile {
    Zero,
    Constant { value: f64 },
    /// 各空間軸について `sin(mode·π·ξ)` の積（ξ は [0, 1] に正規化した座標）
    SineMode { amplitude: f64, mode: u32 },
}

impl InitialProfile {
    fn evaluate<B: Backend>(&self, coords: &Tensor<B, 2>, domain: &Domain) -> Tensor<B, 2> {
        let [n, _] = coords.dims();
        let device = coords.device();
        match self {
            InitialProfile::Zero => Tensor::zeros([n, 1], &device),
            InitialProfile::Constant { value } => Tensor::full([n, 1], *value, &device),
            InitialProfile::SineMode { amplitude, mode } => {
                let layout = domain.dimensionality();
                let mut out = Tensor::full([n, 1], *amplitude, &device);
                for &axis in layout.spatial_axes() {
                    if let (Some(column), Some(interval)) =
                        (axis_column(coords, layout, axis), domain.interval(axis))
                    {
                        out = out * half_sine(column, interval, *mode);
                    }
                }
                out
            }
        }
    }
}

/// 境界辺上の時間変化
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EdgeKind {
    Zero,
    Constant { value: f64 },
    /// `amplitude · (1 − exp(−t / time_constant))`
    Ramp { amplitude: f64, time_constant: f64 },
}

/// 2次元で辺に沿った方向の分布
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transverse {
    Uniform,
    /// 辺の両端で0になる半波長の正弦
    HalfSine,
}

/// 1つの境界辺の条件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeProfile {
    pub kind: EdgeKind,
    pub transverse: Transverse,
}

impl EdgeProfile {
    pub fn zero() -> Self {
        Self {
            kind: EdgeKind::Zero,
            transverse: Transverse::Uniform,
        }
    }

    pub fn ramp(amplitude: f64, time_constant: f64) -> Self {
        Self {
            kind: EdgeKind::Ramp {
                amplitude,
                time_constant,
            },
            transverse: Transverse::Uniform,
        }
    }

    pub fn with_transverse(mut self, transverse: Transverse) -> Self {
        self.transverse = transverse;
        self
    }

    /// `t` は時間列、`along` は辺に沿った座標列とその区間（1次元では `None`）。
    fn evaluate<B: Backend>(&self, t: Tensor<B, 2>, along: Option<(Tensor<B, 2>, Interval)>) -> Tensor<B, 2> {
        let temporal = match self.kind {
            EdgeKind::Zero => return t.zeros_like(),
            EdgeKind::Constant { value } => t.ones_like().mul_scalar(value),
            EdgeKind::Ramp {
                amplitude,
                time_constant,
            } => t
                .mul_scalar(-1.0 / time_constant)
                .exp()
                .neg()
                .add_scalar(1.0)
                .mul_scalar(amplitude),
        };
        match (self.transverse, along) {
            (Transverse::HalfSine, Some((column, interval))) => temporal * half_sine(column, interval, 1),
            _ => temporal,
        }
    }

    fn validate(&self, name: &str) -> PinnResult<()> {
        match self.kind {
            EdgeKind::Ramp { time_constant, .. } if !(time_constant > 0.0) => Err(PinnError::config(format!(
                "境界 {name} の時定数 {time_constant} は正の値である必要があります"
            ))),
            _ => Ok(()),
        }
    }
}

/// 全ての辺の境界条件。1次元では y 方向の辺は使いません。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryConditions {
    pub x_lower: EdgeProfile,
    pub x_upper: EdgeProfile,
    pub y_lower: EdgeProfile,
    pub y_upper: EdgeProfile,
}

impl BoundaryConditions {
    /// x_min の辺だけが `1 − exp(−t/0.1)` で加熱され、他の辺は0
    pub fn baseline() -> Self {
        Self {
            x_lower: EdgeProfile::ramp(1.0, 0.1),
            x_upper: EdgeProfile::zero(),
            y_lower: EdgeProfile::zero(),
            y_upper: EdgeProfile::zero(),
        }
    }

    /// 辺に対応する境界条件。時間軸の「辺」は境界ではありません。
    pub fn for_edge(&self, edge: Edge) -> PinnResult<&EdgeProfile> {
        match (edge.axis, edge.side) {
            (Axis::X, Side::Lower) => Ok(&self.x_lower),
            (Axis::X, Side::Upper) => Ok(&self.x_upper),
            (Axis::Y, Side::Lower) => Ok(&self.y_lower),
            (Axis::Y, Side::Upper) => Ok(&self.y_upper),
            (Axis::T, _) => Err(PinnError::InvalidEdge(edge)),
        }
    }
}

/// 物理定数と初期・境界条件の設定
#[derive(Config, Debug)]
pub struct PhysicsConfig {
    /// 移流（反応）係数 β
    #[config(default = 3.0)]
    pub beta: f64,
    /// 参照温度 u_ref
    #[config(default = 0.0)]
    pub u_ref: f64,
    /// 熱源 q
    #[config(default = 0.0)]
    pub heat_source: f64,
    #[config(default = "MaterialProfile::uniform(1.0)")]
    pub conductivity: MaterialProfile,
    #[config(default = "MaterialProfile::uniform(1.0)")]
    pub heat_capacity: MaterialProfile,
    #[config(default = "InitialProfile::Zero")]
    pub initial: InitialProfile,
    #[config(default = "BoundaryConditions::baseline()")]
    pub boundary: BoundaryConditions,
}

impl PhysicsConfig {
    /// 物性値が領域全体で正であること等を確認します。
    pub fn validate(&self, domain: &Domain) -> PinnResult<()> {
        for (name, value) in [
            ("beta", self.beta),
            ("u_ref", self.u_ref),
            ("heat_source", self.heat_source),
        ] {
            if !value.is_finite() {
                return Err(PinnError::config(format!("{name} = {value} は有限値である必要があります")));
            }
        }
        for (name, material) in [
            ("conductivity", &self.conductivity),
            ("heat_capacity", &self.heat_capacity),
        ] {
            // 線形分布なので領域の角で正なら全体で正
            for (x, y) in domain.spatial_corners() {
                let value = material.at(x, y);
                if !(value > 0.0) || !value.is_finite() {
                    return Err(PinnError::config(format!(
                        "{name} は正である必要があります: ({x}, {y}) で {value}"
                    )));
                }
            }
        }
        for edge in domain.edges() {
            self.boundary.for_edge(edge)?.validate(&edge.to_string())?;
        }
        Ok(())
    }

    fn advection<B: Backend>(&self, u: &Tensor<B, 2>) -> Tensor<B, 2> {
        u.clone().sub_scalar(self.u_ref).mul_scalar(self.beta)
    }

    fn source<B: Backend>(&self, coords: &Tensor<B, 2>) -> Tensor<B, 2> {
        let [n, _] = coords.dims();
        Tensor::full([n, 1], self.heat_source, &coords.device())
    }
}

/// 熱伝導問題の能力インターフェース
///
/// 係数関数は座標 `(N, D)` を受け取り `(N, 1)` を返します。
/// 残差は厳密解に対して0になります。
pub trait HeatProblem<B: AutodiffBackend> {
    fn domain(&self) -> &Domain;

    fn dimensionality(&self) -> Dimensionality {
        self.domain().dimensionality()
    }

    /// 熱源 q(x, t)
    fn heat_source(&self, coords: &Tensor<B, 2>) -> Tensor<B, 2>;

    /// β (u − u_ref)
    fn advection(&self, u: &Tensor<B, 2>, coords: &Tensor<B, 2>) -> Tensor<B, 2>;

    /// 熱伝導率 k(x)
    fn conductivity(&self, coords: &Tensor<B, 2>) -> Tensor<B, 2>;

    /// 熱容量 c(x)
    fn heat_capacity(&self, coords: &Tensor<B, 2>) -> Tensor<B, 2>;

    /// t = 0 における目標値
    fn initial_condition(&self, coords: &Tensor<B, 2>) -> Tensor<B, 2>;

    /// 境界辺 `edge` 上の目標値。`edge` が領域の辺でなければエラー。
    fn boundary_condition(&self, coords: &Tensor<B, 2>, edge: Edge) -> PinnResult<Tensor<B, 2>>;

    /// ∂k/∂axis。`k` が一様なら `None`。
    ///
    /// 既定の実装は座標の複製を勾配追跡の対象にして `conductivity` を逆伝播で微分します。
    /// `k` はパラメータに依存しないので、結果は計算グラフから切り離して問題ありません。
    fn conductivity_gradient(&self, coords: &Tensor<B, 2>, axis: Axis) -> Option<Tensor<B, 2>> {
        let col = self.dimensionality().column(axis)?;
        let probe = coords.clone().detach().require_grad();
        let grads = self.conductivity(&probe).sum().backward();
        let grad = probe.grad(&grads)?;
        let [n, _] = grad.dims();
        Some(Tensor::from_inner(grad.slice([0..n, col..col + 1])))
    }

    /// 2階導関数が必要な軸
    fn second_order_axes(&self) -> &'static [Axis] {
        self.dimensionality().spatial_axes()
    }

    /// `c u_t − Σ (k u_aa + k_a u_a) + β (u − u_ref) − q`
    fn pde_residual(&self, coords: &TrackedCoords<B>, field: &FieldDerivatives<B>) -> PinnResult<Tensor<B, 2>> {
        let layout = self.dimensionality();
        ensure_layout(layout, coords.layout(), "PDE残差")?;
        let x = coords.tensor();
        let u = field.value();

        let mut residual = self.heat_capacity(x) * field.first(Axis::T)?;
        let k = self.conductivity(x);
        for &axis in layout.spatial_axes() {
            let mut flux_divergence = k.clone() * field.second(axis)?;
            if let Some(k_a) = self.conductivity_gradient(x, axis) {
                flux_divergence = flux_divergence + k_a * field.first(axis)?;
            }
            residual = residual - flux_divergence;
        }
        Ok(residual + self.advection(u, x) - self.heat_source(x))
    }

    /// `u − u_0`
    fn ic_residual(&self, batch: &CoordinateBatch<B>, u: Tensor<B, 2>) -> PinnResult<Tensor<B, 2>> {
        ensure_layout(self.dimensionality(), batch.layout(), "初期条件残差")?;
        if batch.role() != BatchRole::Initial {
            return Err(PinnError::RoleMismatch {
                context: "初期条件残差",
                found: batch.role().to_string(),
            });
        }
        Ok(u - self.initial_condition(batch.tensor()))
    }

    /// `u − u_b`
    fn bc_residual(&self, batch: &CoordinateBatch<B>, u: Tensor<B, 2>) -> PinnResult<Tensor<B, 2>> {
        ensure_layout(self.dimensionality(), batch.layout(), "境界条件残差")?;
        let BatchRole::Boundary(edge) = batch.role() else {
            return Err(PinnError::RoleMismatch {
                context: "境界条件残差",
                found: batch.role().to_string(),
            });
        };
        Ok(u - self.boundary_condition(batch.tensor(), edge)?)
    }
}

fn ensure_layout(expected: Dimensionality, found: Dimensionality, context: &'static str) -> PinnResult<()> {
    if expected != found {
        return Err(PinnError::DimensionMismatch {
            context,
            expected: expected.width(),
            found: found.width(),
        });
    }
    Ok(())
}

/// `sin(mode·π·(s − min)/len)`
fn half_sine<B: Backend>(column: Tensor<B, 2>, interval: Interval, mode: u32) -> Tensor<B, 2> {
    column
        .sub_scalar(interval.min)
        .mul_scalar(mode as f64 * PI / interval.length())
        .sin()
}

/// 1次元の棒 x ∈ [x_min, x_max]
#[derive(Debug, Clone)]
pub struct RodProblem {
    domain: Domain,
    physics: PhysicsConfig,
}

impl RodProblem {
    pub fn new(domain: Domain, physics: PhysicsConfig) -> PinnResult<Self> {
        ensure_layout(Dimensionality::One, domain.dimensionality(), "1次元問題の領域")?;
        physics.validate(&domain)?;
        Ok(Self { domain, physics })
    }
}

impl<B: AutodiffBackend> HeatProblem<B> for RodProblem {
    fn domain(&self) -> &Domain {
        &self.domain
    }

    fn heat_source(&self, coords: &Tensor<B, 2>) -> Tensor<B, 2> {
        self.physics.source(coords)
    }

    fn advection(&self, u: &Tensor<B, 2>, _coords: &Tensor<B, 2>) -> Tensor<B, 2> {
        self.physics.advection(u)
    }

    fn conductivity(&self, coords: &Tensor<B, 2>) -> Tensor<B, 2> {
        self.physics.conductivity.evaluate(coords, Dimensionality::One)
    }

    fn heat_capacity(&self, coords: &Tensor<B, 2>) -> Tensor<B, 2> {
        self.physics.heat_capacity.evaluate(coords, Dimensionality::One)
    }

    fn initial_condition(&self, coords: &Tensor<B, 2>) -> Tensor<B, 2> {
        self.physics.initial.evaluate(coords, &self.domain)
    }

    fn boundary_condition(&self, coords: &Tensor<B, 2>, edge: Edge) -> PinnResult<Tensor<B, 2>> {
        if edge.axis != Axis::X {
            return Err(PinnError::InvalidEdge(edge));
        }
        let [n, _] = coords.dims();
        let t = coords.clone().slice([0..n, 1..2]);
        Ok(self.physics.boundary.for_edge(edge)?.evaluate(t, None))
    }

    fn conductivity_gradient(&self, coords: &Tensor<B, 2>, axis: Axis) -> Option<Tensor<B, 2>> {
        self.physics.conductivity.gradient(coords, axis)
    }
}

/// 2次元の板 (x, y) ∈ [x_min, x_max] × [y_min, y_max]
#[derive(Debug, Clone)]
pub struct PlateProblem {
    domain: Domain,
    y: Interval,
    physics: PhysicsConfig,
}

impl PlateProblem {
    pub fn new(domain: Domain, physics: PhysicsConfig) -> PinnResult<Self> {
        let Some(y) = domain.y else {
            return Err(PinnError::DimensionMismatch {
                context: "2次元問題の領域",
                expected: Dimensionality::Two.width(),
                found: domain.dimensionality().width(),
            });
        };
        physics.validate(&domain)?;
        Ok(Self { domain, y, physics })
    }
}

impl<B: AutodiffBackend> HeatProblem<B> for PlateProblem {
    fn domain(&self) -> &Domain {
        &self.domain
    }

    fn heat_source(&self, coords: &Tensor<B, 2>) -> Tensor<B, 2> {
        self.physics.source(coords)
    }

    fn advection(&self, u: &Tensor<B, 2>, _coords: &Tensor<B, 2>) -> Tensor<B, 2> {
        self.physics.advection(u)
    }

    fn conductivity(&self, coords: &Tensor<B, 2>) -> Tensor<B, 2> {
        self.physics.conductivity.evaluate(coords, Dimensionality::Two)
    }

    fn heat_capacity(&self, coords: &Tensor<B, 2>) -> Tensor<B, 2> {
        self.physics.heat_capacity.evaluate(coords, Dimensionality::Two)
    }

    fn initial_condition(&self, coords: &Tensor<B, 2>) -> Tensor<B, 2> {
        self.physics.initial.evaluate(coords, &self.domain)
    }

    fn boundary_condition(&self, coords: &Tensor<B, 2>, edge: Edge) -> PinnResult<Tensor<B, 2>> {
        let profile = self.physics.boundary.for_edge(edge)?;
        let [n, _] = coords.dims();
        let t = coords.clone().slice([0..n, 2..3]);
        let along = match edge.axis {
            Axis::X => (coords.clone().slice([0..n, 1..2]), self.y),
            _ => (coords.clone().slice([0..n, 0..1]), self.domain.x),
        };
        Ok(profile.evaluate(t, Some(along)))
    }

    fn conductivity_gradient(&self, coords: &Tensor<B, 2>, axis: Axis) -> Option<Tensor<B, 2>> {
        self.physics.conductivity.gradient(coords, axis)
    }
}

/// 領域の次元に応じて問題を構築します。
pub fn build_problem<B: AutodiffBackend>(
    domain: Domain,
    physics: &PhysicsConfig,
) -> PinnResult<Box<dyn HeatProblem<B>>> {
    Ok(match domain.dimensionality() {
        Dimensionality::One => Box::new(RodProblem::new(domain, physics.clone())?),
        Dimensionality::Two => Box::new(PlateProblem::new(domain, physics.clone())?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::to_vec;
    use crate::domain::DomainConfig;
    use burn::backend::{Autodiff, NdArray};
    use burn::tensor::TensorData;

    type TestBackend = Autodiff<NdArray<f32>>;

    fn rod(physics: PhysicsConfig) -> RodProblem {
        RodProblem::new(DomainConfig::new().build().unwrap(), physics).unwrap()
    }

    fn plate(physics: PhysicsConfig) -> PlateProblem {
        let domain = DomainConfig::new()
            .with_x_max(1.0)
            .with_y_min(Some(0.0))
            .with_y_max(Some(1.0))
            .build()
            .unwrap();
        PlateProblem::new(domain, physics).unwrap()
    }

    fn tracked(rows: Vec<f32>, layout: Dimensionality) -> TrackedCoords<TestBackend> {
        let n = rows.len() / layout.width();
        CoordinateBatch::from_rows(rows, n, BatchRole::Interior, layout, &Default::default())
            .unwrap()
            .track()
    }

    fn column(values: Vec<f32>) -> Tensor<TestBackend, 2> {
        let n = values.len();
        Tensor::from_data(TensorData::new(values, [n, 1]), &Default::default())
    }

    fn assert_near_zero(residual: Tensor<TestBackend, 2>, scale: &[f32]) {
        let values = to_vec(residual).unwrap();
        for (r, s) in values.iter().zip(scale) {
            assert!(r.abs() < 1e-3 * s.abs().max(1.0), "residual {r} (scale {s})");
        }
    }

    fn rod_points() -> Vec<(f32, f32)> {
        (0..9).map(|i| (0.2 * i as f32 + 0.1, 0.1 * i as f32)).collect()
    }

    /// 1次元の解析解 u(x, t) と u_t, u_x, u_xx から残差を評価します。
    fn rod_residual(problem: &RodProblem, solution: impl Fn(f32, f32) -> [f32; 4]) -> (Tensor<TestBackend, 2>, Vec<f32>) {
        let points = rod_points();
        let coords = tracked(points.iter().flat_map(|&(x, t)| [x, t]).collect(), Dimensionality::One);
        let values: Vec<[f32; 4]> = points.iter().map(|&(x, t)| solution(x, t)).collect();
        let pick = |i: usize| column(values.iter().map(|v| v[i]).collect());
        let field = FieldDerivatives::from_parts(
            Dimensionality::One,
            pick(0),
            vec![(Axis::T, pick(1)), (Axis::X, pick(2))],
            vec![(Axis::X, pick(3))],
        )
        .unwrap();
        let residual = HeatProblem::<TestBackend>::pde_residual(problem, &coords, &field).unwrap();
        (residual, values.iter().map(|v| v[0]).collect())
    }

    #[test]
    fn baseline_initial_condition_is_exactly_zero() {
        let problem = rod(PhysicsConfig::new());
        let coords = column(vec![0.0, 0.7, 1.3, 2.0]);
        let coords = Tensor::cat(vec![coords.clone(), coords.zeros_like()], 1);
        let u0 = to_vec(HeatProblem::<TestBackend>::initial_condition(&problem, &coords)).unwrap();
        assert!(u0.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn ramp_boundary_starts_at_zero_and_rises_toward_amplitude() {
        let problem = rod(PhysicsConfig::new());
        let times: Vec<f32> = (0..21).map(|i| i as f32 * 0.05).collect();
        let coords = Tensor::cat(vec![column(vec![0.0; times.len()]), column(times.clone())], 1);
        let edge = Edge::new(Axis::X, Side::Lower);
        let u = to_vec(HeatProblem::<TestBackend>::boundary_condition(&problem, &coords, edge).unwrap()).unwrap();

        assert_eq!(u[0], 0.0);
        for pair in u.windows(2) {
            assert!(pair[1] > pair[0], "not increasing: {pair:?}");
        }
        assert!(u.iter().all(|&v| v < 1.0));
        assert!((u[u.len() - 1] - (1.0 - (-10.0f32).exp())).abs() < 1e-5);

        let upper =
            HeatProblem::<TestBackend>::boundary_condition(&problem, &coords, Edge::new(Axis::X, Side::Upper)).unwrap();
        assert!(to_vec(upper).unwrap().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn non_boundary_edges_are_rejected() {
        let coords = Tensor::cat(vec![column(vec![0.0, 1.0]), column(vec![0.5, 0.5])], 1);
        let time_edge = Edge::new(Axis::T, Side::Lower);
        assert!(matches!(
            BoundaryConditions::baseline().for_edge(time_edge),
            Err(PinnError::InvalidEdge(edge)) if edge == time_edge
        ));

        let problem = rod(PhysicsConfig::new());
        for edge in [time_edge, Edge::new(Axis::Y, Side::Upper)] {
            let result = HeatProblem::<TestBackend>::boundary_condition(&problem, &coords, edge);
            assert!(matches!(result, Err(PinnError::InvalidEdge(_))), "{edge}");
        }

        let batch = CoordinateBatch::<TestBackend>::new(coords, BatchRole::Boundary(time_edge), Dimensionality::One)
            .unwrap();
        let u = batch.tensor().zeros_like().slice([0..2, 0..1]);
        assert!(matches!(
            HeatProblem::<TestBackend>::bc_residual(&problem, &batch, u),
            Err(PinnError::InvalidEdge(_))
        ));
    }

    #[test]
    fn linear_steady_state_has_zero_residual() {
        let problem = rod(PhysicsConfig::new().with_beta(0.0));
        let (residual, u) = rod_residual(&problem, |x, _| [1.0 + 0.5 * x, 0.0, 0.5, 0.0]);
        assert_near_zero(residual, &u);
    }

    #[test]
    fn reaction_steady_state_has_zero_residual() {
        // −u'' + 3u = 0  →  u = exp(√3 x)
        let problem = rod(PhysicsConfig::new());
        let r = 3.0f32.sqrt();
        let (residual, u) = rod_residual(&problem, |x, _| {
            let u = (r * x).exp();
            [u, 0.0, r * u, 3.0 * u]
        });
        assert_near_zero(residual, &u);
    }

    #[test]
    fn decaying_mode_has_zero_residual() {
        // u_t = u_xx  →  u = exp(−t) sin(x)
        let problem = rod(PhysicsConfig::new().with_beta(0.0));
        let (residual, u) = rod_residual(&problem, |x, t| {
            let u = (-t).exp() * x.sin();
            [u, -u, (-t).exp() * x.cos(), -u]
        });
        assert_near_zero(residual, &u);
    }

    #[test]
    fn heterogeneous_conductivity_has_zero_residual() {
        // ((1 + x) u')' = 0  →  u = ln(1 + x)
        let physics = PhysicsConfig::new().with_beta(0.0).with_conductivity(MaterialProfile {
            value: 1.0,
            slope_x: 1.0,
            slope_y: 0.0,
        });
        let problem = rod(physics);
        let (residual, u) = rod_residual(&problem, |x, _| {
            [(1.0 + x).ln(), 0.0, 1.0 / (1.0 + x), -1.0 / ((1.0 + x) * (1.0 + x))]
        });
        assert_near_zero(residual, &u);
    }

    /// k = exp(x) の問題。∂k/∂x は既定の逆伝播実装で求めます。
    struct ExponentialRod {
        domain: Domain,
    }

    impl HeatProblem<TestBackend> for ExponentialRod {
        fn domain(&self) -> &Domain {
            &self.domain
        }
        fn heat_source(&self, coords: &Tensor<TestBackend, 2>) -> Tensor<TestBackend, 2> {
            let [n, _] = coords.dims();
            Tensor::zeros([n, 1], &coords.device())
        }
        fn advection(&self, u: &Tensor<TestBackend, 2>, _coords: &Tensor<TestBackend, 2>) -> Tensor<TestBackend, 2> {
            u.zeros_like()
        }
        fn conductivity(&self, coords: &Tensor<TestBackend, 2>) -> Tensor<TestBackend, 2> {
            let [n, _] = coords.dims();
            coords.clone().slice([0..n, 0..1]).exp()
        }
        fn heat_capacity(&self, coords: &Tensor<TestBackend, 2>) -> Tensor<TestBackend, 2> {
            let [n, _] = coords.dims();
            Tensor::ones([n, 1], &coords.device())
        }
        fn initial_condition(&self, coords: &Tensor<TestBackend, 2>) -> Tensor<TestBackend, 2> {
            self.heat_source(coords)
        }
        fn boundary_condition(&self, coords: &Tensor<TestBackend, 2>, _edge: Edge) -> PinnResult<Tensor<TestBackend, 2>> {
            Ok(self.heat_source(coords))
        }
    }

    #[test]
    fn default_conductivity_gradient_uses_autodiff() {
        // (e^x u')' = 0  →  u = −e^(−x)
        let problem = ExponentialRod {
            domain: DomainConfig::new().build().unwrap(),
        };
        let points = rod_points();
        let coords = tracked(points.iter().flat_map(|&(x, t)| [x, t]).collect(), Dimensionality::One);

        let k_x = problem.conductivity_gradient(coords.tensor(), Axis::X).unwrap();
        let expected: Vec<f32> = points.iter().map(|&(x, _)| x.exp()).collect();
        for (a, b) in to_vec(k_x).unwrap().iter().zip(&expected) {
            assert!((a - b).abs() < 1e-4 * b.max(1.0));
        }

        let values = |f: &dyn Fn(f32) -> f32| column(points.iter().map(|&(x, _)| f(x)).collect());
        let field = FieldDerivatives::from_parts(
            Dimensionality::One,
            values(&|x| -(-x).exp()),
            vec![(Axis::T, values(&|_| 0.0)), (Axis::X, values(&|x| (-x).exp()))],
            vec![(Axis::X, values(&|x| -(-x).exp()))],
        )
        .unwrap();
        let residual = problem.pde_residual(&coords, &field).unwrap();
        assert_near_zero(residual, &expected);
    }

    #[test]
    fn plate_decaying_mode_has_zero_residual() {
        // u_t = u_xx + u_yy  →  u = exp(−2t) sin(x) sin(y)
        let problem = plate(PhysicsConfig::new().with_beta(0.0));
        let points: Vec<[f32; 3]> = (0..8)
            .map(|i| {
                let s = i as f32 / 8.0;
                [s, 1.0 - s, 0.5 * s]
            })
            .collect();
        let coords = tracked(points.iter().flatten().copied().collect(), Dimensionality::Two);
        let f = |g: &dyn Fn(f32, f32, f32) -> f32| column(points.iter().map(|p| g(p[0], p[1], p[2])).collect());
        let u = |x: f32, y: f32, t: f32| (-2.0 * t).exp() * x.sin() * y.sin();
        let field = FieldDerivatives::from_parts(
            Dimensionality::Two,
            f(&u),
            vec![
                (Axis::T, f(&|x, y, t| -2.0 * u(x, y, t))),
                (Axis::X, f(&|x, y, t| (-2.0 * t).exp() * x.cos() * y.sin())),
                (Axis::Y, f(&|x, y, t| (-2.0 * t).exp() * x.sin() * y.cos())),
            ],
            vec![(Axis::X, f(&|x, y, t| -u(x, y, t))), (Axis::Y, f(&|x, y, t| -u(x, y, t)))],
        )
        .unwrap();
        let residual = HeatProblem::<TestBackend>::pde_residual(&problem, &coords, &field).unwrap();
        assert_near_zero(residual, &[1.0; 8]);
    }

    #[test]
    fn plate_boundary_varies_along_edge() {
        let mut boundary = BoundaryConditions::baseline();
        boundary.x_lower = EdgeProfile::ramp(2.0, 0.5).with_transverse(Transverse::HalfSine);
        let problem = plate(PhysicsConfig::new().with_boundary(boundary));
        let coords = Tensor::cat(
            vec![column(vec![0.0; 3]), column(vec![0.0, 0.5, 1.0]), column(vec![1.0; 3])],
            1,
        );
        let u = to_vec(HeatProblem::<TestBackend>::boundary_condition(
            &problem,
            &coords,
            Edge::new(Axis::X, Side::Lower),
        )
        .unwrap())
        .unwrap();
        let ramp = 2.0 * (1.0 - (-2.0f32).exp());
        assert!(u[0].abs() < 1e-6);
        assert!((u[1] - ramp).abs() < 1e-5);
        assert!(u[2].abs() < 1e-5);
    }

    #[test]
    fn residuals_check_roles_and_width() {
        let problem = rod(PhysicsConfig::new());
        let device = Default::default();
        let interior =
            CoordinateBatch::<TestBackend>::from_rows(vec![0.5, 0.5], 1, BatchRole::Interior, Dimensionality::One, &device)
                .unwrap();
        let u = column(vec![0.0]);
        assert!(matches!(
            problem.ic_residual(&interior, u.clone()),
            Err(PinnError::RoleMismatch { .. })
        ));
        assert!(matches!(
            problem.bc_residual(&interior, u.clone()),
            Err(PinnError::RoleMismatch { .. })
        ));

        let wide = CoordinateBatch::<TestBackend>::from_rows(
            vec![0.5, 0.5, 0.0],
            1,
            BatchRole::Initial,
            Dimensionality::Two,
            &device,
        )
        .unwrap();
        assert!(matches!(
            problem.ic_residual(&wide, u),
            Err(PinnError::DimensionMismatch { expected: 2, found: 3, .. })
        ));
    }

    #[test]
    fn rejects_non_positive_material() {
        let domain = DomainConfig::new().build().unwrap();
        let physics = PhysicsConfig::new().with_conductivity(MaterialProfile {
            value: 1.0,
            slope_x: -1.0,
            slope_y: 0.0,
        });
        assert!(matches!(RodProblem::new(domain, physics), Err(PinnError::Config(_))));

        let physics = PhysicsConfig::new().with_heat_capacity(MaterialProfile::uniform(0.0));
        assert!(matches!(RodProblem::new(domain, physics), Err(PinnError::Config(_))));

        let mut boundary = BoundaryConditions::baseline();
        boundary.x_lower = EdgeProfile::ramp(1.0, 0.0);
        let physics = PhysicsConfig::new().with_boundary(boundary);
        assert!(matches!(RodProblem::new(domain, physics), Err(PinnError::Config(_))));
    }
}
