use crate::backend::TrainingBackend;
use crate::config::PinnConfig;
use crate::error::{PinnError, PinnResult};
use crate::loss::LossHistory;
use crate::model::FieldNetwork;
use crate::pinn::{derivative_consistency, physics_loss, residual_summary};
use crate::plot::{FieldGrid, PlotReporter, plot_loss_history};
use crate::problem::{HeatProblem, build_problem};
use crate::sampler::CollocationSampler;
use crate::{CONFIG_FILENAME, LOSS_GRAPH_FILENAME, MODEL_FILENAME};
use burn::config::Config;
use burn::module::{AutodiffModule, Module};
use burn::optim::{GradientsParams, Optimizer};
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use burn::tensor::backend::{AutodiffBackend, Backend};
use std::path::Path;
use std::time::{Duration, Instant};

/// 定期報告を受け取るオブザーバー
///
/// 報告のたびに、推論用バックエンドへ切り離した近似器と、それまでの損失履歴が渡されます。
pub trait TrainingObserver<B: Backend> {
    fn on_report(&mut self, iteration: usize, model: &FieldNetwork<B>, history: &LossHistory) -> PinnResult<()>;
}

/// 何もしないオブザーバー
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl<B: Backend> TrainingObserver<B> for Silent {
    fn on_report(&mut self, _iteration: usize, _model: &FieldNetwork<B>, _history: &LossHistory) -> PinnResult<()> {
        Ok(())
    }
}

/// 学習の結果
#[derive(Debug)]
pub struct TrainingOutcome<B: Backend> {
    pub model: FieldNetwork<B>,
    pub history: LossHistory,
    pub elapsed: Duration,
}

/// 固定の反復回数だけ学習します。
///
/// 各反復で選点を引き直し、物理損失を計算して Adam で1ステップ更新します。
/// 損失が有限値でなくなった時点で `PinnError::Divergence` を返します。
pub fn train<B, P, O>(
    config: &PinnConfig,
    problem: &P,
    device: &B::Device,
    observer: &mut O,
) -> PinnResult<TrainingOutcome<B>>
where
    B: AutodiffBackend,
    P: HeatProblem<B> + ?Sized,
    O: TrainingObserver<B::InnerBackend> + ?Sized,
{
    let domain = config.validate()?;
    if domain.dimensionality() != problem.dimensionality() {
        return Err(PinnError::DimensionMismatch {
            context: "設定の領域と問題の領域",
            expected: problem.dimensionality().width(),
            found: domain.dimensionality().width(),
        });
    }
    if let Some(seed) = config.seed {
        B::seed(seed);
    }

    let sampler = CollocationSampler::new(*problem.domain(), config.sample_counts.clone())?;
    let mut model = config.model.init::<B>(domain.dimensionality().width(), device);
    let mut optim = config.optimizer().init::<B, FieldNetwork<B>>();
    let mut history = LossHistory::new();

    let probe = sampler.sample::<B>(device)?;
    log::debug!(
        "導関数の自己診断: 前進モードと逆伝播の最大差 {:.3e}",
        derivative_consistency(&model, &probe.interior)?
    );

    log::info!(
        "学習を開始します (熱伝導方程式, {}次元) - 反復回数: {}",
        domain.dimensionality().spatial_axes().len(),
        config.max_iterations
    );
    let training_start = Instant::now();

    for iteration in 1..=config.max_iterations {
        let collocation = sampler.sample::<B>(device)?;
        let terms = physics_loss(&model, problem, &collocation, &config.loss_weights)?;
        let record = terms.record();
        if !record.is_finite() {
            return Err(PinnError::Divergence {
                iteration,
                last_finite: history.last().copied(),
            });
        }
        history.push(record);

        if iteration % config.report_interval == 0 {
            log::info!("[Iteration {iteration}] {record}");
            observer.on_report(iteration, &model.valid(), &history)?;
        }

        let grads = GradientsParams::from_grads(terms.total.backward(), &model);
        model = optim.step(config.learning_rate, model, grads);
    }

    let elapsed = training_start.elapsed();
    log::info!("学習が完了しました。");
    log::info!("=> 学習時間: {elapsed:.2?}");
    Ok(TrainingOutcome {
        model,
        history,
        elapsed,
    })
}

/// `train`サブコマンドを実行します。
///
/// 設定・学習済みモデル・損失グラフを `artifact_dir` に保存します。
/// `plots` が偽なら温度場と損失グラフの描画を省きます。
pub fn run(config: PinnConfig, artifact_dir: &Path, plots: bool) -> PinnResult<TrainingOutcome<TrainingBackend>> {
    // 再現できるように、指定がなければここでシードを決めて設定に残す
    let seed = config.seed.unwrap_or_else(rand::random::<u64>);
    let config = config.with_seed(Some(seed));
    let domain = config.validate()?;

    std::fs::create_dir_all(artifact_dir)?;
    let config_path = artifact_dir.join(CONFIG_FILENAME);
    config.save(&config_path)?;
    log::info!("=> 設定を '{}' に保存しました (seed: {seed})。", config_path.display());

    let device = config.backend.device();
    log::info!("バックエンド: {}", config.backend.name());
    let problem = build_problem::<TrainingBackend>(domain, &config.physics)?;

    let outcome = if plots {
        let mut reporter = PlotReporter::new(artifact_dir, domain, FieldGrid::default());
        train(&config, problem.as_ref(), &device, &mut reporter)?
    } else {
        train(&config, problem.as_ref(), &device, &mut Silent)?
    };

    let summary = residual_summary(&outcome.model, problem.as_ref(), 101, &device)?;
    log::info!(
        "=> 最大残差: 初期条件 {:.3e}, 境界条件 {:.3e}",
        summary.max_ic,
        summary.max_bc
    );

    if plots {
        let graph_path = artifact_dir.join(LOSS_GRAPH_FILENAME);
        plot_loss_history(&outcome.history, &graph_path).map_err(|e| PinnError::Plot(e.to_string()))?;
        log::info!("=> 損失グラフを '{}' に保存しました。", graph_path.display());
    }

    log::info!("学習済みモデルを保存中...");
    let model_path = artifact_dir.join(MODEL_FILENAME);
    outcome
        .model
        .clone()
        .save_file(model_path.clone(), &NamedMpkFileRecorder::<FullPrecisionSettings>::new())?;
    log::info!("=> モデルを '{}' に保存しました。", model_path.display());

    Ok(outcome)
}

