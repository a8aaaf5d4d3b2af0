//! 計算領域（空間 × 時間の直方体）と座標軸の定義

use crate::error::{PinnError, PinnResult};
use burn::config::Config;
use std::fmt;

/// 座標軸。座標の並びは「空間軸 → 時間軸」の順です。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    T,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::T => "t",
        };
        f.write_str(name)
    }
}

/// 境界のどちら側か
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Lower,
    Upper,
}

/// 空間方向の境界辺。座標値の比較ではなく、このタグで境界条件を選びます。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    pub axis: Axis,
    pub side: Side,
}

impl Edge {
    pub const fn new(axis: Axis, side: Side) -> Self {
        Self { axis, side }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = match self.side {
            Side::Lower => "min",
            Side::Upper => "max",
        };
        write!(f, "{}_{}", self.axis, side)
    }
}

/// 空間次元。1次元なら列は (x, t)、2次元なら (x, y, t)。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimensionality {
    One,
    Two,
}

impl Dimensionality {
    /// 座標バッチの列数
    pub fn width(self) -> usize {
        self.axes().len()
    }

    pub fn axes(self) -> &'static [Axis] {
        match self {
            Dimensionality::One => &[Axis::X, Axis::T],
            Dimensionality::Two => &[Axis::X, Axis::Y, Axis::T],
        }
    }

    pub fn spatial_axes(self) -> &'static [Axis] {
        match self {
            Dimensionality::One => &[Axis::X],
            Dimensionality::Two => &[Axis::X, Axis::Y],
        }
    }

    /// 軸に対応する列番号。この次元に存在しない軸なら `None`。
    pub fn column(self, axis: Axis) -> Option<usize> {
        self.axes().iter().position(|a| *a == axis)
    }
}

/// 閉区間 [min, max]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub min: f64,
    pub max: f64,
}

impl Interval {
    pub fn new(min: f64, max: f64) -> PinnResult<Self> {
        if !(min.is_finite() && max.is_finite()) || min >= max {
            return Err(PinnError::config(format!(
                "区間 [{min}, {max}] が不正です (min < max である必要があります)"
            )));
        }
        Ok(Self { min, max })
    }

    pub fn length(&self) -> f64 {
        self.max - self.min
    }

    /// 区間を両端を含めて `n` 等分した点列
    pub fn linspace(&self, n: usize) -> Vec<f64> {
        match n {
            0 => Vec::new(),
            1 => vec![self.min],
            _ => (0..n)
                .map(|i| self.min + self.length() * i as f64 / (n - 1) as f64)
                .collect(),
        }
    }

    /// [0, 1] に正規化した位置
    pub fn normalize(&self, value: f64) -> f64 {
        (value - self.min) / self.length()
    }
}

/// 領域の範囲を指定する設定
#[derive(Config, Debug)]
pub struct DomainConfig {
    #[config(default = 0.0)]
    pub x_min: f64,
    #[config(default = 2.0)]
    pub x_max: f64,
    /// 2次元の場合のみ指定します
    #[config(default = "None")]
    pub y_min: Option<f64>,
    #[config(default = "None")]
    pub y_max: Option<f64>,
    #[config(default = 1.0)]
    pub t_max: f64,
}

impl DomainConfig {
    /// 設定を検証して領域を構築します。
    pub fn build(&self) -> PinnResult<Domain> {
        let x = Interval::new(self.x_min, self.x_max)?;
        let y = match (self.y_min, self.y_max) {
            (Some(min), Some(max)) => Some(Interval::new(min, max)?),
            (None, None) => None,
            _ => {
                return Err(PinnError::config(
                    "y_min と y_max は両方指定するか、両方省略してください",
                ));
            }
        };
        let t = Interval::new(0.0, self.t_max)
            .map_err(|_| PinnError::config(format!("t_max = {} は正の値である必要があります", self.t_max)))?;
        Ok(Domain { x, y, t })
    }
}

/// 空間 × 時間の計算領域
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Domain {
    pub x: Interval,
    pub y: Option<Interval>,
    pub t: Interval,
}

impl Domain {
    pub fn dimensionality(&self) -> Dimensionality {
        match self.y {
            Some(_) => Dimensionality::Two,
            None => Dimensionality::One,
        }
    }

    pub fn interval(&self, axis: Axis) -> Option<Interval> {
        match axis {
            Axis::X => Some(self.x),
            Axis::Y => self.y,
            Axis::T => Some(self.t),
        }
    }

    /// 全ての空間境界辺
    pub fn edges(&self) -> Vec<Edge> {
        self.dimensionality()
            .spatial_axes()
            .iter()
            .flat_map(|&axis| [Edge::new(axis, Side::Lower), Edge::new(axis, Side::Upper)])
            .collect()
    }

    /// 境界辺上で固定される座標値
    pub fn edge_value(&self, edge: Edge) -> Option<f64> {
        self.interval(edge.axis).map(|interval| match edge.side {
            Side::Lower => interval.min,
            Side::Upper => interval.max,
        })
    }

    /// 空間領域の角（1次元では y = 0 として扱います）
    pub fn spatial_corners(&self) -> Vec<(f64, f64)> {
        let ys = match self.y {
            Some(y) => vec![y.min, y.max],
            None => vec![0.0],
        };
        [self.x.min, self.x.max]
            .into_iter()
            .flat_map(|x| ys.iter().map(move |&y| (x, y)))
            .collect()
    }

    /// t = 0 断面の格子点（行優先の平坦な配列と点数）
    pub fn initial_grid(&self, resolution: usize) -> (Vec<f32>, usize) {
        let xs = self.x.linspace(resolution);
        let mut rows = Vec::new();
        match self.y {
            None => {
                for &x in &xs {
                    rows.extend([x as f32, 0.0]);
                }
            }
            Some(y) => {
                for &yv in &y.linspace(resolution) {
                    for &x in &xs {
                        rows.extend([x as f32, yv as f32, 0.0]);
                    }
                }
            }
        }
        let n = rows.len() / self.dimensionality().width();
        (rows, n)
    }

    /// 境界辺上の格子点。時間方向（2次元では辺に沿った方向も）に等間隔です。
    pub fn edge_grid(&self, edge: Edge, resolution: usize) -> (Vec<f32>, usize) {
        let fixed = self.edge_value(edge).unwrap_or_default() as f32;
        let ts = self.t.linspace(resolution);
        let mut rows = Vec::new();
        match (self.y, edge.axis) {
            (None, _) => {
                for &t in &ts {
                    rows.extend([fixed, t as f32]);
                }
            }
            (Some(y), Axis::X) => {
                for &t in &ts {
                    for &yv in &y.linspace(resolution) {
                        rows.extend([fixed, yv as f32, t as f32]);
                    }
                }
            }
            (Some(_), _) => {
                for &t in &ts {
                    for &x in &self.x.linspace(resolution) {
                        rows.extend([x as f32, fixed, t as f32]);
                    }
                }
            }
        }
        let n = rows.len() / self.dimensionality().width();
        (rows, n)
    }
}
