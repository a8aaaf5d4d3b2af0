use crate::batch::{CoordinateBatch, TrackedCoords};
use crate::domain::{Axis, Dimensionality};
use crate::error::{PinnError, PinnResult};
use burn::config::Config;
use burn::module::{Ignored, Module};
use burn::nn::{Linear, LinearConfig};
use burn::prelude::Backend;
use burn::tensor::activation::sigmoid;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::{Tensor, TensorData};
use serde::{Deserialize, Serialize};

/// 隠れ層の活性化関数。2階導関数が必要なため滑らかなものに限ります。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum ActivationKind {
    Sigmoid,
    Tanh,
}

impl ActivationKind {
    /// 活性化の値とその1階・2階導関数 `(σ(z), σ'(z), σ''(z))` を返します。
    fn jet<B: Backend>(self, z: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 2>, Tensor<B, 2>) {
        match self {
            ActivationKind::Sigmoid => {
                let s = sigmoid(z);
                let d1 = s.clone() * s.clone().neg().add_scalar(1.0);
                let d2 = d1.clone() * s.clone().mul_scalar(-2.0).add_scalar(1.0);
                (s, d1, d2)
            }
            ActivationKind::Tanh => {
                let a = z.tanh();
                let d1 = (a.clone() * a.clone()).neg().add_scalar(1.0);
                let d2 = a.clone().mul_scalar(-2.0) * d1.clone();
                (a, d1, d2)
            }
        }
    }

    fn apply<B: Backend>(self, z: Tensor<B, 2>) -> Tensor<B, 2> {
        match self {
            ActivationKind::Sigmoid => sigmoid(z),
            ActivationKind::Tanh => z.tanh(),
        }
    }
}

/// ネットワーク構造の設定
#[derive(Config, Debug)]
pub struct FieldNetworkConfig {
    /// 隠れ層のユニット数（入力側から順に）
    #[config(default = "vec![100, 10]")]
    pub hidden_layer_sizes: Vec<usize>,
    #[config(default = "ActivationKind::Sigmoid")]
    pub activation: ActivationKind,
}

impl FieldNetworkConfig {
    /// 入力 `input_dim` 列、出力1列のネットワークを初期化します。
    pub fn init<B: Backend>(&self, input_dim: usize, device: &B::Device) -> FieldNetwork<B> {
        let mut linears = Vec::with_capacity(self.hidden_layer_sizes.len() + 1);
        let mut width = input_dim;
        for &hidden in &self.hidden_layer_sizes {
            linears.push(LinearConfig::new(width, hidden).init(device));
            width = hidden;
        }
        linears.push(LinearConfig::new(width, 1).init(device));
        FieldNetwork {
            linears,
            activation: Ignored(self.activation),
        }
    }
}

/// PINNの本体となるニューラルネットワークモデル。
///
/// 座標 (x, [y,] t) を入力とし、その点における温度 u を予測する多層パーセプトロン（MLP）です。
#[derive(Module, Debug)]
pub struct FieldNetwork<B: Backend> {
    linears: Vec<Linear<B>>,
    activation: Ignored<ActivationKind>,
}

impl<B: Backend> FieldNetwork<B> {
    /// 入力の列数
    pub fn input_width(&self) -> usize {
        self.linears
            .first()
            .map(|linear| linear.weight.val().dims()[0])
            .unwrap_or_default()
    }

    pub fn activation(&self) -> ActivationKind {
        self.activation.0
    }

    /// パラメータが置かれているデバイス
    pub fn device(&self) -> B::Device {
        self.linears
            .first()
            .map(|linear| linear.weight.val().device())
            .unwrap_or_default()
    }

    /// モデルの順伝播を実行します。
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let Some((output, hidden)) = self.linears.split_last() else {
            return input;
        };
        let mut x = input;
        for linear in hidden {
            x = self.activation.0.apply(linear.forward(x));
        }
        output.forward(x)
    }

    /// 列数を確認してから順伝播します。
    pub fn evaluate(&self, batch: &CoordinateBatch<B>) -> PinnResult<Tensor<B, 2>> {
        self.check_width(batch.layout(), "ネットワーク入力")?;
        Ok(self.forward(batch.tensor().clone()))
    }

    /// 値と入力に関する導関数を同時に計算します。
    ///
    /// 1階導関数は全ての軸について、2階導関数は `second_order` に挙げた軸についてのみ求めます。
    /// 導関数は層ごとに前進モードで伝播させた通常のテンソル演算なので、
    /// これを含む損失から逆伝播すればパラメータ勾配がそのまま得られます。
    pub fn forward_with_derivatives(
        &self,
        coords: &TrackedCoords<B>,
        second_order: &[Axis],
    ) -> PinnResult<FieldDerivatives<B>> {
        let layout = coords.layout();
        self.check_width(layout, "導関数の評価")?;

        let x = coords.tensor().clone();
        let [n, width] = x.dims();
        let device = x.device();

        let mut second_cols = Vec::with_capacity(second_order.len());
        for &axis in second_order {
            let col = layout.column(axis).ok_or(PinnError::MissingDerivative(axis))?;
            second_cols.push(col);
        }

        let mut value = x;
        let mut first: Vec<Tensor<B, 2>> = (0..width)
            .map(|col| unit_column::<B>(n, width, col, &device))
            .collect();
        let mut second: Vec<Tensor<B, 2>> = second_cols
            .iter()
            .map(|_| Tensor::zeros([n, width], &device))
            .collect();

        let last = self.linears.len().saturating_sub(1);
        for (i, linear) in self.linears.iter().enumerate() {
            let weight = linear.weight.val();
            let z = linear.forward(value);
            let dz: Vec<_> = first.into_iter().map(|d| d.matmul(weight.clone())).collect();
            let d2z: Vec<_> = second.into_iter().map(|d| d.matmul(weight.clone())).collect();

            if i == last {
                value = z;
                first = dz;
                second = d2z;
                break;
            }

            let (a, s1, s2) = self.activation.0.jet(z);
            second = d2z
                .into_iter()
                .zip(&second_cols)
                .map(|(d2, &col)| {
                    let d = dz[col].clone();
                    s2.clone() * d.clone() * d + s1.clone() * d2
                })
                .collect();
            first = dz.into_iter().map(|d| s1.clone() * d).collect();
            value = a;
        }

        let mut second_by_col = vec![None; width];
        for (col, d2) in second_cols.into_iter().zip(second) {
            second_by_col[col] = Some(d2);
        }

        Ok(FieldDerivatives {
            layout,
            value,
            first: first.into_iter().map(Some).collect(),
            second: second_by_col,
        })
    }

    fn check_width(&self, layout: Dimensionality, context: &'static str) -> PinnResult<()> {
        if layout.width() != self.input_width() {
            return Err(PinnError::DimensionMismatch {
                context,
                expected: self.input_width(),
                found: layout.width(),
            });
        }
        Ok(())
    }
}

impl<B: AutodiffBackend> FieldNetwork<B> {
    /// 逆伝播で求めた Σu の入力勾配 `(N, D)`。
    ///
    /// 結果は内側のバックエンドのテンソルで、計算グラフからは切り離されています。
    pub fn input_gradient(
        &self,
        coords: &TrackedCoords<B>,
    ) -> PinnResult<Tensor<B::InnerBackend, 2>> {
        let u = self.forward(coords.tensor().clone());
        let grads = u.sum().backward();
        coords
            .tensor()
            .grad(&grads)
            .ok_or(PinnError::UntrackedInput)
    }
}

/// 列 `col` だけが1の `(n, width)` テンソル
fn unit_column<B: Backend>(n: usize, width: usize, col: usize, device: &B::Device) -> Tensor<B, 2> {
    let mut data = vec![0.0f32; n * width];
    for row in data.chunks_mut(width) {
        row[col] = 1.0;
    }
    Tensor::from_data(TensorData::new(data, [n, width]), device)
}

/// 場の値と入力座標に関する偏導関数（いずれも `(N, 1)`）
#[derive(Debug, Clone)]
pub struct FieldDerivatives<B: Backend> {
    layout: Dimensionality,
    value: Tensor<B, 2>,
    first: Vec<Option<Tensor<B, 2>>>,
    second: Vec<Option<Tensor<B, 2>>>,
}

impl<B: Backend> FieldDerivatives<B> {
    /// 既知の値と導関数から組み立てます（解析解の検証や別の近似器で使います）。
    pub fn from_parts(
        layout: Dimensionality,
        value: Tensor<B, 2>,
        first: Vec<(Axis, Tensor<B, 2>)>,
        second: Vec<(Axis, Tensor<B, 2>)>,
    ) -> PinnResult<Self> {
        let place = |entries: Vec<(Axis, Tensor<B, 2>)>| -> PinnResult<Vec<Option<Tensor<B, 2>>>> {
            let mut slots = vec![None; layout.width()];
            for (axis, tensor) in entries {
                let col = layout.column(axis).ok_or(PinnError::MissingDerivative(axis))?;
                slots[col] = Some(tensor);
            }
            Ok(slots)
        };
        Ok(Self {
            layout,
            value,
            first: place(first)?,
            second: place(second)?,
        })
    }

    pub fn value(&self) -> &Tensor<B, 2> {
        &self.value
    }

    /// ∂u/∂axis
    pub fn first(&self, axis: Axis) -> PinnResult<Tensor<B, 2>> {
        self.lookup(&self.first, axis)
    }

    /// ∂²u/∂axis²
    pub fn second(&self, axis: Axis) -> PinnResult<Tensor<B, 2>> {
        self.lookup(&self.second, axis)
    }

    fn lookup(&self, slots: &[Option<Tensor<B, 2>>], axis: Axis) -> PinnResult<Tensor<B, 2>> {
        self.layout
            .column(axis)
            .and_then(|col| slots.get(col).cloned().flatten())
            .ok_or(PinnError::MissingDerivative(axis))
    }
}
