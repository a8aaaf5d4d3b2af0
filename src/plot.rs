//! 損失曲線と温度場の描画

use crate::batch::{BatchRole, CoordinateBatch, to_vec};
use crate::domain::{Axis, Domain, Interval};
use crate::error::{PinnError, PinnResult};
use crate::loss::{LossHistory, LossRecord};
use crate::model::FieldNetwork;
use crate::training::TrainingObserver;
use burn::tensor::backend::Backend;
use plotters::prelude::*;
use std::path::{Path, PathBuf};

/// 描画する格子
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldGrid {
    /// 各方向の格子点数
    pub resolution: usize,
    /// 2次元問題で描画する時刻（`None` なら t_max）
    pub snapshot_time: Option<f64>,
}

impl Default for FieldGrid {
    fn default() -> Self {
        Self {
            resolution: 50,
            snapshot_time: None,
        }
    }
}

/// 2次元の断面上の場の値
///
/// 1次元問題では横軸 x・縦軸 t、2次元問題では横軸 x・縦軸 y（時刻は固定）です。
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSlice {
    pub horizontal: (Axis, Interval),
    pub vertical: (Axis, Interval),
    pub nx: usize,
    pub ny: usize,
    /// 行優先 `values[j * nx + i]`
    pub values: Vec<f32>,
}

impl FieldSlice {
    /// 格子点の座標行（x, [y,] t）
    fn coordinates(domain: &Domain, grid: &FieldGrid) -> (Vec<f32>, (Axis, Interval), (Axis, Interval)) {
        let n = grid.resolution;
        let xs = domain.x.linspace(n);
        let mut rows = Vec::new();
        match domain.y {
            None => {
                for &t in &domain.t.linspace(n) {
                    for &x in &xs {
                        rows.extend([x as f32, t as f32]);
                    }
                }
                (rows, (Axis::X, domain.x), (Axis::T, domain.t))
            }
            Some(y) => {
                let t = grid.snapshot_time.unwrap_or(domain.t.max) as f32;
                for &yv in &y.linspace(n) {
                    for &x in &xs {
                        rows.extend([x as f32, yv as f32, t]);
                    }
                }
                (rows, (Axis::X, domain.x), (Axis::Y, y))
            }
        }
    }

    /// 関数 `f(x, y, t)` から断面を作ります（参照解の重ね描き用）。1次元では y = 0 です。
    pub fn from_fn(domain: &Domain, grid: &FieldGrid, f: impl Fn(f64, f64, f64) -> f64) -> Self {
        let (rows, horizontal, vertical) = Self::coordinates(domain, grid);
        let width = domain.dimensionality().width();
        let values = rows
            .chunks(width)
            .map(|row| match row {
                [x, t] => f(*x as f64, 0.0, *t as f64) as f32,
                [x, y, t] => f(*x as f64, *y as f64, *t as f64) as f32,
                _ => f32::NAN,
            })
            .collect();
        Self {
            horizontal,
            vertical,
            nx: grid.resolution,
            ny: grid.resolution,
            values,
        }
    }

    fn range(&self) -> (f32, f32) {
        let min = self.values.iter().copied().fold(f32::INFINITY, f32::min);
        let max = self.values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        if max - min > f32::EPSILON {
            (min, max)
        } else {
            (min - 0.5, min + 0.5)
        }
    }
}

/// 近似器を格子上で評価します。
pub fn evaluate_field<B: Backend>(
    model: &FieldNetwork<B>,
    domain: &Domain,
    grid: &FieldGrid,
    device: &B::Device,
) -> PinnResult<FieldSlice> {
    if grid.resolution < 2 {
        return Err(PinnError::Config(format!(
            "描画の格子点数 {} は2以上である必要があります",
            grid.resolution
        )));
    }
    let (rows, horizontal, vertical) = FieldSlice::coordinates(domain, grid);
    let layout = domain.dimensionality();
    let n = rows.len() / layout.width();
    let batch = CoordinateBatch::<B>::from_rows(rows, n, BatchRole::Interior, layout, device)?;
    let values = to_vec(model.evaluate(&batch)?)?;
    Ok(FieldSlice {
        horizontal,
        vertical,
        nx: grid.resolution,
        ny: grid.resolution,
        values,
    })
}

/// 温度場をヒートマップとしてPNGファイルに出力します。
///
/// `overlay` を与えると、右側に |u − overlay| を並べて描きます。
pub fn plot_field(
    slice: &FieldSlice,
    overlay: Option<&FieldSlice>,
    title: &str,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut panels = vec![(title.to_string(), slice.values.clone())];
    if let Some(reference) = overlay {
        let diff = slice
            .values
            .iter()
            .zip(&reference.values)
            .map(|(u, r)| (u - r).abs())
            .collect();
        panels.push(("|u - reference|".to_string(), diff));
    }

    let root = BitMapBackend::new(path, (700 * panels.len() as u32, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    let areas = root.split_evenly((1, panels.len()));

    for (area, (caption, values)) in areas.iter().zip(panels) {
        let panel = FieldSlice {
            values,
            ..slice.clone()
        };
        let (min, max) = panel.range();
        let (h_axis, h) = panel.horizontal;
        let (v_axis, v) = panel.vertical;
        let dx = h.length() / panel.nx.saturating_sub(1).max(1) as f64;
        let dy = v.length() / panel.ny.saturating_sub(1).max(1) as f64;

        let mut chart = ChartBuilder::on(area)
            .caption(format!("{caption} [{min:.3}, {max:.3}]"), ("sans-serif", 24).into_font())
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(h.min..h.max, v.min..v.max)?;
        chart
            .configure_mesh()
            .disable_mesh()
            .x_desc(h_axis.to_string())
            .y_desc(v_axis.to_string())
            .draw()?;

        let h_points = h.linspace(panel.nx);
        let v_points = v.linspace(panel.ny);
        chart.draw_series(panel.values.iter().enumerate().map(|(k, &value)| {
            let (x, y) = (h_points[k % panel.nx], v_points[k / panel.nx]);
            let level = ((value - min) / (max - min)).clamp(0.0, 1.0) as f64;
            let color = HSLColor(0.7 * (1.0 - level), 0.9, 0.5);
            Rectangle::new(
                [(x - dx / 2.0, y - dy / 2.0), (x + dx / 2.0, y + dy / 2.0)],
                color.filled(),
            )
        }))?;
    }
    root.present()?;
    Ok(())
}

/// 学習過程の損失をグラフとしてPNGファイルに出力します。
pub fn plot_loss_history(history: &LossHistory, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let records = history.records();
    if records.is_empty() {
        return Ok(());
    }
    let log = |v: f32| v.max(1e-12).log10();
    let series: [(&str, fn(&LossRecord) -> f32, RGBColor); 4] = [
        ("Total Loss", |r| r.total, RED),
        ("PDE Loss", |r| r.pde, BLUE),
        ("IC Loss", |r| r.ic, GREEN),
        ("BC Loss", |r| r.bc, MAGENTA),
    ];

    let all = records
        .iter()
        .flat_map(|r| [r.total, r.pde, r.ic, r.bc])
        .map(log);
    let (min_log_loss, max_log_loss) = all.fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });

    let root = BitMapBackend::new(path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Loss History", ("sans-serif", 40).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(1..records.len().max(2), (min_log_loss - 0.5)..(max_log_loss + 0.5))?;
    chart
        .configure_mesh()
        .y_desc("Loss (log10 scale)")
        .x_desc("Iteration")
        .draw()?;
    for (label, value, color) in series {
        chart
            .draw_series(LineSeries::new(
                records.iter().enumerate().map(|(i, r)| (i + 1, log(value(r)))),
                &color,
            ))?
            .label(label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }
    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}

/// 定期報告のたびに温度場と損失曲線を描画するオブザーバー
#[derive(Debug, Clone)]
pub struct PlotReporter {
    dir: PathBuf,
    domain: Domain,
    grid: FieldGrid,
    overlay: Option<FieldSlice>,
}

impl PlotReporter {
    pub fn new(dir: impl Into<PathBuf>, domain: Domain, grid: FieldGrid) -> Self {
        Self {
            dir: dir.into(),
            domain,
            grid,
            overlay: None,
        }
    }

    /// 参照解を重ねて描くようにします。
    pub fn with_overlay(mut self, overlay: FieldSlice) -> Self {
        self.overlay = Some(overlay);
        self
    }

    fn render<B: Backend>(&self, iteration: usize, model: &FieldNetwork<B>, history: &LossHistory) -> PinnResult<()> {
        let slice = evaluate_field(model, &self.domain, &self.grid, &model.device())?;
        let path = self.dir.join(format!("field_{iteration:06}.png"));
        plot_field(&slice, self.overlay.as_ref(), &format!("u (iteration {iteration})"), &path)
            .map_err(|e| PinnError::Plot(e.to_string()))?;
        plot_loss_history(history, &self.dir.join(crate::LOSS_GRAPH_FILENAME))
            .map_err(|e| PinnError::Plot(e.to_string()))?;
        log::debug!("=> 温度場を '{}' に保存しました。", path.display());
        Ok(())
    }
}

impl<B: Backend> TrainingObserver<B> for PlotReporter {
    fn on_report(&mut self, iteration: usize, model: &FieldNetwork<B>, history: &LossHistory) -> PinnResult<()> {
        // 描画の失敗で学習は止めない
        if let Err(e) = self.render(iteration, model, history) {
            log::warn!("グラフの描画に失敗しました: {e}");
        }
        Ok(())
    }
}
