use crate::batch::{BatchRole, CoordinateBatch, TrackedCoords, to_vec};
use crate::error::PinnResult;
use crate::loss::{LossTerms, LossWeights, assemble};
use crate::model::FieldNetwork;
use crate::problem::HeatProblem;
use crate::sampler::CollocationSet;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::{ElementConversion, Tensor};

/// 物理損失を計算します。
///
/// 内部点で近似器の値と導関数を評価してPDE残差を、初期点・境界点で値を評価して
/// 初期条件・境界条件の残差を求め、重み付きの損失に組み立てます。
pub fn physics_loss<B: AutodiffBackend, P: HeatProblem<B> + ?Sized>(
    model: &FieldNetwork<B>,
    problem: &P,
    collocation: &CollocationSet<B>,
    weights: &LossWeights,
) -> PinnResult<LossTerms<B>> {
    let field = model.forward_with_derivatives(&collocation.interior, problem.second_order_axes())?;
    let pde_residual = problem.pde_residual(&collocation.interior, &field)?;

    let u_ic = model.evaluate(&collocation.initial)?;
    let ic_residual = problem.ic_residual(&collocation.initial, u_ic)?;

    let bc_residuals = collocation
        .boundaries
        .iter()
        .map(|batch| {
            let u_bc = model.evaluate(batch)?;
            problem.bc_residual(batch, u_bc)
        })
        .collect::<PinnResult<Vec<_>>>()?;

    Ok(assemble(pde_residual, ic_residual, Tensor::cat(bc_residuals, 0), weights))
}

/// 学習後の初期条件・境界条件の最大残差
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResidualSummary {
    pub max_ic: f32,
    pub max_bc: f32,
}

/// 等間隔の格子上で初期条件・境界条件の残差の最大絶対値を求めます。
pub fn residual_summary<B: AutodiffBackend, P: HeatProblem<B> + ?Sized>(
    model: &FieldNetwork<B>,
    problem: &P,
    resolution: usize,
    device: &B::Device,
) -> PinnResult<ResidualSummary> {
    let domain = *problem.domain();
    let layout = domain.dimensionality();

    let (rows, n) = domain.initial_grid(resolution);
    let initial = CoordinateBatch::<B>::from_rows(rows, n, BatchRole::Initial, layout, device)?;
    let ic = problem.ic_residual(&initial, model.evaluate(&initial)?)?;
    let max_ic = max_abs(ic);

    let mut max_bc = 0.0f32;
    for edge in domain.edges() {
        let (rows, n) = domain.edge_grid(edge, resolution);
        let batch = CoordinateBatch::<B>::from_rows(rows, n, BatchRole::Boundary(edge), layout, device)?;
        let bc = problem.bc_residual(&batch, model.evaluate(&batch)?)?;
        max_bc = max_bc.max(max_abs(bc));
    }

    Ok(ResidualSummary { max_ic, max_bc })
}

/// 前進モードで伝播させた1階導関数と、逆伝播で求めた入力勾配との最大差
pub fn derivative_consistency<B: AutodiffBackend>(
    model: &FieldNetwork<B>,
    coords: &TrackedCoords<B>,
) -> PinnResult<f32> {
    let jets = model.forward_with_derivatives(coords, &[])?;
    let reverse = model.input_gradient(coords)?;
    let [n, _] = reverse.dims();

    let mut worst = 0.0f32;
    for (col, &axis) in coords.layout().axes().iter().enumerate() {
        let forward = to_vec(jets.first(axis)?)?;
        let backward = to_vec(reverse.clone().slice([0..n, col..col + 1]))?;
        for (a, b) in forward.iter().zip(&backward) {
            worst = worst.max((a - b).abs());
        }
    }
    Ok(worst)
}

fn max_abs<B: AutodiffBackend>(residual: Tensor<B, 2>) -> f32 {
    residual.abs().max().into_scalar().elem::<f32>()
}
