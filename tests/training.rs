use burn::module::AutodiffModule;
use burn::tensor::Tensor;
use heat_pinn::backend::{InferenceBackend, TrainingBackend};
use heat_pinn::config::PinnConfig;
use heat_pinn::domain::{Axis, Domain, DomainConfig, Edge};
use heat_pinn::loss::{LossHistory, LossWeights};
use heat_pinn::model::{FieldNetwork, FieldNetworkConfig};
use heat_pinn::plot::{FieldGrid, FieldSlice, PlotReporter, evaluate_field};
use heat_pinn::problem::{HeatProblem, PhysicsConfig, RodProblem, build_problem};
use heat_pinn::sampler::SampleCounts;
use heat_pinn::training::{Silent, TrainingObserver, train};
use heat_pinn::{PinnError, PinnResult, inference, training};
use std::path::PathBuf;

fn small_config() -> PinnConfig {
    PinnConfig::baseline()
        .with_model(FieldNetworkConfig::new().with_hidden_layer_sizes(vec![16, 8]))
        .with_sample_counts(SampleCounts::new().with_interior(64).with_ic(16).with_bc(16))
        .with_learning_rate(1.0e-2)
        .with_max_iterations(60)
        .with_report_interval(20)
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("heat-pinn-{name}-{}", std::process::id()));
    std::fs::remove_dir_all(&dir).ok();
    dir
}

#[derive(Default)]
struct Recorder {
    iterations: Vec<usize>,
    history_lengths: Vec<usize>,
}

impl TrainingObserver<InferenceBackend> for Recorder {
    fn on_report(
        &mut self,
        iteration: usize,
        model: &FieldNetwork<InferenceBackend>,
        history: &LossHistory,
    ) -> PinnResult<()> {
        assert_eq!(model.input_width(), 2);
        self.iterations.push(iteration);
        self.history_lengths.push(history.len());
        Ok(())
    }
}

#[test]
fn short_run_reduces_moving_average_loss() {
    let config = small_config();
    let domain = config.validate().unwrap();
    let problem = build_problem::<TrainingBackend>(domain, &config.physics).unwrap();
    let mut recorder = Recorder::default();

    let outcome = train(&config, problem.as_ref(), &Default::default(), &mut recorder).unwrap();

    assert_eq!(outcome.history.len(), 60);
    assert!(outcome.history.records().iter().all(|r| r.is_finite() && r.total >= 0.0));
    assert_eq!(recorder.iterations, vec![20, 40, 60]);
    assert_eq!(recorder.history_lengths, vec![20, 40, 60]);

    let trend = outcome.history.moving_average(10);
    let (first, last) = (trend[0], trend[trend.len() - 1]);
    assert!(last < first, "移動平均が減少していません: {first} -> {last}");
}

/// 熱源が NaN になる棒
struct PoisonedRod {
    inner: RodProblem,
}

type B = TrainingBackend;

impl HeatProblem<B> for PoisonedRod {
    fn domain(&self) -> &Domain {
        HeatProblem::<B>::domain(&self.inner)
    }
    fn heat_source(&self, coords: &Tensor<B, 2>) -> Tensor<B, 2> {
        let [n, _] = coords.dims();
        Tensor::full([n, 1], f32::NAN, &coords.device())
    }
    fn advection(&self, u: &Tensor<B, 2>, coords: &Tensor<B, 2>) -> Tensor<B, 2> {
        HeatProblem::<B>::advection(&self.inner, u, coords)
    }
    fn conductivity(&self, coords: &Tensor<B, 2>) -> Tensor<B, 2> {
        HeatProblem::<B>::conductivity(&self.inner, coords)
    }
    fn conductivity_gradient(&self, coords: &Tensor<B, 2>, axis: Axis) -> Option<Tensor<B, 2>> {
        HeatProblem::<B>::conductivity_gradient(&self.inner, coords, axis)
    }
    fn heat_capacity(&self, coords: &Tensor<B, 2>) -> Tensor<B, 2> {
        HeatProblem::<B>::heat_capacity(&self.inner, coords)
    }
    fn initial_condition(&self, coords: &Tensor<B, 2>) -> Tensor<B, 2> {
        HeatProblem::<B>::initial_condition(&self.inner, coords)
    }
    fn boundary_condition(&self, coords: &Tensor<B, 2>, edge: Edge) -> PinnResult<Tensor<B, 2>> {
        HeatProblem::<B>::boundary_condition(&self.inner, coords, edge)
    }
}

#[test]
fn non_finite_loss_aborts_with_divergence() {
    let config = small_config();
    let domain = config.validate().unwrap();
    let problem = PoisonedRod {
        inner: RodProblem::new(domain, PhysicsConfig::new()).unwrap(),
    };

    let result = train(&config, &problem, &Default::default(), &mut Silent);
    match result {
        Err(PinnError::Divergence { iteration, last_finite }) => {
            assert_eq!(iteration, 1);
            assert!(last_finite.is_none());
        }
        other => panic!("発散が検出されませんでした: {other:?}"),
    }
}

#[test]
fn invalid_config_fails_before_training() {
    let config = small_config().with_loss_weights(LossWeights::new().with_ic(0.0));
    let domain = DomainConfig::new().build().unwrap();
    let problem = RodProblem::new(domain, PhysicsConfig::new()).unwrap();
    let mut recorder = Recorder::default();

    let result = train::<B, _, _>(&config, &problem, &Default::default(), &mut recorder);
    assert!(matches!(result, Err(PinnError::Config(_))));
    assert!(recorder.iterations.is_empty());
}

#[test]
fn plate_run_reports_through_plot_observer() {
    let dir = scratch_dir("plate");
    std::fs::create_dir_all(&dir).unwrap();
    let config = PinnConfig::plate()
        .with_model(FieldNetworkConfig::new().with_hidden_layer_sizes(vec![8]))
        .with_sample_counts(SampleCounts::new().with_interior(32).with_ic(8).with_bc(8))
        .with_max_iterations(4)
        .with_report_interval(2);
    let domain = config.validate().unwrap();
    let problem = build_problem::<B>(domain, &config.physics).unwrap();
    let grid = FieldGrid {
        resolution: 8,
        snapshot_time: Some(0.5),
    };
    let mut reporter = PlotReporter::new(&dir, domain, grid).with_overlay(FieldSlice::from_fn(&domain, &grid, |_, _, _| 0.0));

    let outcome = train(&config, problem.as_ref(), &Default::default(), &mut reporter).unwrap();
    assert_eq!(outcome.history.len(), 4);
    assert_eq!(outcome.model.input_width(), 3);
    for name in ["field_000002.png", "field_000004.png", heat_pinn::LOSS_GRAPH_FILENAME] {
        assert!(dir.join(name).exists(), "{name} が書き出されていません");
    }
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn saved_model_reloads_for_inference() {
    let dir = scratch_dir("artifacts");
    let config = small_config().with_max_iterations(5).with_seed(Some(42));

    let outcome = training::run(config, &dir, false).unwrap();
    assert!(dir.join(heat_pinn::MODEL_FILENAME).exists());
    assert!(dir.join(heat_pinn::CONFIG_FILENAME).exists());

    let (loaded_config, model) = inference::load_model(&dir).unwrap();
    assert_eq!(loaded_config.seed, Some(42));
    assert_eq!(loaded_config.max_iterations, 5);

    let grid = FieldGrid {
        resolution: 5,
        snapshot_time: None,
    };
    let domain = loaded_config.validate().unwrap();
    let device = Default::default();
    let expected = evaluate_field(&outcome.model.valid(), &domain, &grid, &device).unwrap();
    let reloaded = evaluate_field(&model, &domain, &grid, &device).unwrap();
    for (a, b) in expected.values.iter().zip(&reloaded.values) {
        assert!((a - b).abs() < 1e-6);
    }

    let slice = inference::run(&dir, grid, false).unwrap();
    assert_eq!(slice.values.len(), 25);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn inference_without_artifacts_is_reported() {
    let dir = scratch_dir("missing");
    assert!(matches!(
        inference::load_model(&dir),
        Err(PinnError::MissingArtifact(_))
    ));
}
