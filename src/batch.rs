//! 役割付きの座標バッチ
//!
//! 座標は形状 `(N, D)` のテンソルで、列は空間軸の後に時間軸が並びます。
//! 境界バッチはどの辺の点かをタグとして持つため、境界条件の選択に
//! 浮動小数点の等値比較は使いません。

use crate::domain::{Axis, Dimensionality, Edge};
use crate::error::{PinnError, PinnResult};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::{Tensor, TensorData};
use std::fmt;

/// バッチの役割
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchRole {
    /// PDE残差を評価する内部点
    Interior,
    /// t = 0 の初期条件点
    Initial,
    /// 空間境界上の点
    Boundary(Edge),
}

impl fmt::Display for BatchRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchRole::Interior => f.write_str("interior"),
            BatchRole::Initial => f.write_str("initial"),
            BatchRole::Boundary(edge) => write!(f, "boundary({edge})"),
        }
    }
}

/// 役割と次元を伴う座標バッチ
#[derive(Debug, Clone)]
pub struct CoordinateBatch<B: Backend> {
    coords: Tensor<B, 2>,
    role: BatchRole,
    layout: Dimensionality,
}

impl<B: Backend> CoordinateBatch<B> {
    /// 列数が次元と一致することを確認してバッチを作ります。
    pub fn new(coords: Tensor<B, 2>, role: BatchRole, layout: Dimensionality) -> PinnResult<Self> {
        let [_, width] = coords.dims();
        if width != layout.width() {
            return Err(PinnError::DimensionMismatch {
                context: "座標バッチ",
                expected: layout.width(),
                found: width,
            });
        }
        Ok(Self { coords, role, layout })
    }

    /// 行優先の平坦な配列からバッチを作ります。
    pub fn from_rows(
        rows: Vec<f32>,
        n: usize,
        role: BatchRole,
        layout: Dimensionality,
        device: &B::Device,
    ) -> PinnResult<Self> {
        if rows.len() != n * layout.width() {
            return Err(PinnError::DimensionMismatch {
                context: "座標配列",
                expected: n * layout.width(),
                found: rows.len(),
            });
        }
        let coords = Tensor::<B, 2>::from_data(TensorData::new(rows, [n, layout.width()]), device);
        Self::new(coords, role, layout)
    }

    pub fn tensor(&self) -> &Tensor<B, 2> {
        &self.coords
    }

    pub fn role(&self) -> BatchRole {
        self.role
    }

    pub fn layout(&self) -> Dimensionality {
        self.layout
    }

    pub fn len(&self) -> usize {
        self.coords.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 指定した軸の列 `(N, 1)`
    pub fn column(&self, axis: Axis) -> Option<Tensor<B, 2>> {
        axis_column(&self.coords, self.layout, axis)
    }

    /// 入力を勾配追跡の対象にします。導関数の評価はこの後の順伝播でのみ可能です。
    pub fn track(self) -> TrackedCoords<B>
    where
        B: AutodiffBackend,
    {
        TrackedCoords {
            batch: CoordinateBatch {
                coords: self.coords.require_grad(),
                role: self.role,
                layout: self.layout,
            },
        }
    }
}

/// 勾配追跡済みの座標バッチ
#[derive(Debug, Clone)]
pub struct TrackedCoords<B: Backend> {
    batch: CoordinateBatch<B>,
}

impl<B: Backend> TrackedCoords<B> {
    /// 勾配追跡をせずに包みます（入力勾配が得られない場合の確認用）。
    #[cfg(test)]
    pub(crate) fn untracked(batch: CoordinateBatch<B>) -> Self {
        Self { batch }
    }

    pub fn batch(&self) -> &CoordinateBatch<B> {
        &self.batch
    }

    pub fn tensor(&self) -> &Tensor<B, 2> {
        self.batch.tensor()
    }

    pub fn layout(&self) -> Dimensionality {
        self.batch.layout()
    }

    pub fn len(&self) -> usize {
        self.batch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }
}

/// テンソルから1列を切り出します。
pub fn axis_column<B: Backend>(
    coords: &Tensor<B, 2>,
    layout: Dimensionality,
    axis: Axis,
) -> Option<Tensor<B, 2>> {
    let col = layout.column(axis)?;
    let [n, _] = coords.dims();
    Some(coords.clone().slice([0..n, col..col + 1]))
}

/// テンソルの値を `f32` の配列として取り出します。
pub fn to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> PinnResult<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| PinnError::TensorData(format!("{e:?}")))
}
