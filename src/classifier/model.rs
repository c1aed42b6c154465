use burn::config::Config;
use burn::module::Module;
use burn::nn::transformer::{TransformerEncoder, TransformerEncoderConfig, TransformerEncoderInput};
use burn::nn::{Dropout, DropoutConfig, Embedding, EmbeddingConfig, Linear, LinearConfig};
use burn::tensor::activation;
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};

/// シーケンス分類器のハイパーパラメータ
#[derive(Config, Debug)]
pub struct SequenceClassifierConfig {
    /// 入力シーケンス長
    pub seq_len: usize,
    /// フレームごとの特徴次元 (max_people x 17 x 2)
    pub feature_dim: usize,
    #[config(default = 128)]
    pub d_model: usize,
    #[config(default = 4)]
    pub num_heads: usize,
    #[config(default = 256)]
    pub ff_dim: usize,
    #[config(default = 2)]
    pub num_layers: usize,
}

/// 姿勢特徴シーケンスを暴力確率に写像するTransformerエンコーダ
///
/// 入力射影 + 学習位置埋め込み → エンコーダ2層 → 時間平均プーリング
/// → 全結合 → sigmoid の1スカラー出力。
#[derive(Module, Debug)]
pub struct SequenceClassifier<B: Backend> {
    proj: Linear<B>,
    pos_emb: Embedding<B>,
    encoder: TransformerEncoder<B>,
    fc: Linear<B>,
    out: Linear<B>,
    dropout: Dropout,
}

impl SequenceClassifierConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SequenceClassifier<B> {
        SequenceClassifier {
            proj: LinearConfig::new(self.feature_dim, self.d_model).init(device),
            pos_emb: EmbeddingConfig::new(self.seq_len, self.d_model).init(device),
            encoder: TransformerEncoderConfig::new(
                self.d_model,
                self.ff_dim,
                self.num_heads,
                self.num_layers,
            )
            .with_dropout(0.1)
            .init(device),
            fc: LinearConfig::new(self.d_model, 64).init(device),
            out: LinearConfig::new(64, 1).init(device),
            dropout: DropoutConfig::new(0.3).init(),
        }
    }
}

impl<B: Backend> SequenceClassifier<B> {
    /// x: [batch, seq_len, feature_dim] → スコア [batch, 1] (0〜1)
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 2> {
        let [_, seq_len, _] = x.dims();
        let device = x.device();

        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &device)
            .reshape([1, seq_len]);

        // 位置埋め込みはバッチ次元にブロードキャストされる
        let x = self.proj.forward(x) + self.pos_emb.forward(positions);
        let x = self.encoder.forward(TransformerEncoderInput::new(x));

        // 時間方向の平均プーリング [batch, d_model]
        let x: Tensor<B, 2> = x.mean_dim(1).squeeze(1);

        let x = self.dropout.forward(activation::relu(self.fc.forward(x)));
        activation::sigmoid(self.out.forward(x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::TensorData;

    type TestBackend = NdArray;

    #[test]
    fn test_forward_output_shape() {
        let device = Default::default();
        let config = SequenceClassifierConfig::new(4, 34);
        let model = config.init::<TestBackend>(&device);

        let x = Tensor::<TestBackend, 3>::zeros([2, 4, 34], &device);
        let y = model.forward(x);
        assert_eq!(y.dims(), [2, 1]);
    }

    #[test]
    fn test_scores_stay_in_unit_interval() {
        let device = Default::default();
        let config = SequenceClassifierConfig::new(3, 68);
        let model = config.init::<TestBackend>(&device);

        // 極端な入力でも sigmoid 出力は [0, 1] に収まる
        let values: Vec<f32> = (0..3 * 68).map(|i| (i as f32 - 100.0) * 37.5).collect();
        let x = Tensor::<TestBackend, 3>::from_data(
            TensorData::new(values, [1, 3, 68]),
            &device,
        );
        let scores = model.forward(x).into_data().to_vec::<f32>().unwrap();
        for s in scores {
            assert!((0.0..=1.0).contains(&s), "score out of range: {}", s);
        }
    }

    #[test]
    fn test_forward_is_deterministic_on_inference_backend() {
        // 非autodiffバックエンドではDropoutは恒等になり、同一入力は同一出力
        let device = Default::default();
        let config = SequenceClassifierConfig::new(2, 34);
        let model = config.init::<TestBackend>(&device);

        let x = Tensor::<TestBackend, 3>::ones([1, 2, 34], &device);
        let a = model.forward(x.clone()).into_data().to_vec::<f32>().unwrap();
        let b = model.forward(x).into_data().to_vec::<f32>().unwrap();
        assert_eq!(a, b);
    }
}
