use crate::backend::InferenceBackend;
use crate::config::PinnConfig;
use crate::error::{PinnError, PinnResult};
use crate::model::FieldNetwork;
use crate::plot::{FieldGrid, FieldSlice, evaluate_field, plot_field};
use crate::{CONFIG_FILENAME, FIELD_FILENAME, MODEL_FILENAME};
use burn::module::Module;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use std::path::Path;
use std::time::Instant;

/// 保存済みの設定とモデルを読み込みます。
pub fn load_model(artifact_dir: &Path) -> PinnResult<(PinnConfig, FieldNetwork<InferenceBackend>)> {
    let config_path = artifact_dir.join(CONFIG_FILENAME);
    let model_path = artifact_dir.join(MODEL_FILENAME);
    for path in [&config_path, &model_path] {
        if !path.exists() {
            return Err(PinnError::MissingArtifact(path.clone()));
        }
    }

    let config = PinnConfig::from_file(&config_path)?;
    let domain = config.validate()?;
    let device = config.backend.device();

    log::info!("保存済みモデルを '{}' からロード中...", model_path.display());
    let model = config
        .model
        .init::<InferenceBackend>(domain.dimensionality().width(), &device)
        .load_file(model_path, &NamedMpkFileRecorder::<FullPrecisionSettings>::new(), &device)?;
    Ok((config, model))
}

/// `infer`サブコマンドを実行します。
///
/// 格子上で温度場を評価し、`plots` が真なら `field.png` に描画します。
pub fn run(artifact_dir: &Path, grid: FieldGrid, plots: bool) -> PinnResult<FieldSlice> {
    let (config, model) = load_model(artifact_dir)?;
    let domain = config.validate()?;
    let device = config.backend.device();

    log::info!("推論を実行します - バックエンド: {}", config.backend.name());
    let inference_start = Instant::now();
    let slice = evaluate_field(&model, &domain, &grid, &device)?;
    let inference_duration = inference_start.elapsed();

    log::info!(
        "推論が完了しました。入力グリッド数: {}x{}={}, 出力の形状: [{}, 1]",
        slice.nx,
        slice.ny,
        slice.nx * slice.ny,
        slice.values.len()
    );
    log::info!("=> 推論時間: {inference_duration:.2?}");

    if plots {
        let path = artifact_dir.join(FIELD_FILENAME);
        plot_field(&slice, None, "u", &path).map_err(|e| PinnError::Plot(e.to_string()))?;
        log::info!("=> 温度場を '{}' に保存しました。", path.display());
    }
    Ok(slice)
}
