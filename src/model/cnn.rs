//! CNN Model Architecture for Hand-Sign Classification
//!
//! Three convolution blocks (3x3 valid convolution, ReLU, 2x2 max-pool) with
//! 32, 64 and 128 filters, a flatten, and one dense layer producing class
//! logits. Softmax is applied by [`HandSignCnn::forward_softmax`]; training
//! works on logits through a log-softmax.

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Linear, LinearConfig, PaddingConfig2d, Relu,
    },
    tensor::{backend::Backend, Tensor},
};

use crate::utils::error::HandSignError;

/// Configuration for the HandSignCnn model
#[derive(Config, Debug)]
pub struct HandSignCnnConfig {
    /// Number of output classes
    #[config(default = "24")]
    pub num_classes: usize,

    /// Input image size (square)
    #[config(default = "28")]
    pub input_size: usize,

    /// Number of input channels (3 for RGB)
    #[config(default = "3")]
    pub in_channels: usize,

    /// Filters of the first block; doubled in each following block
    #[config(default = "32")]
    pub base_filters: usize,
}

impl HandSignCnnConfig {
    /// Spatial side length after the three conv/pool blocks
    pub fn final_spatial_size(&self) -> usize {
        (0..3).fold(self.input_size, |s, _| s.saturating_sub(2) / 2)
    }

    /// Width of the flattened feature vector fed to the dense layer
    pub fn flattened_features(&self) -> usize {
        let s = self.final_spatial_size();
        self.base_filters * 4 * s * s
    }

    pub fn validate(&self) -> crate::utils::error::Result<()> {
        if self.num_classes == 0 {
            return Err(HandSignError::Model("num_classes must be > 0".into()));
        }
        if self.final_spatial_size() == 0 {
            return Err(HandSignError::Model(format!(
                "input size {} is too small for three conv/pool blocks",
                self.input_size
            )));
        }
        Ok(())
    }
}

/// Conv2d (3x3, valid) + ReLU + MaxPool (2x2, stride 2)
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub conv: Conv2d<B>,
    pub relu: Relu,
    pub pool: MaxPool2d,
}

impl<B: Backend> ConvBlock<B> {
    pub fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Valid)
            .init(device);
        let pool = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();

        Self {
            conv,
            relu: Relu::new(),
            pool,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.relu.forward(x);
        self.pool.forward(x)
    }
}

/// Hand-sign letter classifier
#[derive(Module, Debug)]
pub struct HandSignCnn<B: Backend> {
    pub block1: ConvBlock<B>,
    pub block2: ConvBlock<B>,
    pub block3: ConvBlock<B>,
    pub output: Linear<B>,
    num_classes: usize,
}

impl<B: Backend> HandSignCnn<B> {
    /// Build a freshly initialised model
    pub fn new(
        config: &HandSignCnnConfig,
        device: &B::Device,
    ) -> crate::utils::error::Result<Self> {
        config.validate()?;
        let base = config.base_filters;

        // 28 -> 26 -> 13 -> 11 -> 5 -> 3 -> 1
        let block1 = ConvBlock::new(config.in_channels, base, device);
        let block2 = ConvBlock::new(base, base * 2, device);
        let block3 = ConvBlock::new(base * 2, base * 4, device);
        let output = LinearConfig::new(config.flattened_features(), config.num_classes).init(device);

        Ok(Self {
            block1,
            block2,
            block3,
            output,
            num_classes: config.num_classes,
        })
    }

    /// # Arguments
    /// * `x` - Input tensor of shape [batch_size, 3, height, width]
    ///
    /// # Returns
    /// * Logits of shape [batch_size, num_classes]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.block1.forward(x);
        let x = self.block2.forward(x);
        let x = self.block3.forward(x);

        let [batch_size, channels, height, width] = x.dims();
        let x = x.reshape([batch_size, channels * height * width]);

        self.output.forward(x)
    }

    /// Class probabilities, rows summing to 1
    pub fn forward_softmax(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        burn::tensor::activation::softmax(self.forward(x), 1)
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Fail fast when the output layer does not cover `dataset_classes`
    pub fn ensure_num_classes(&self, dataset_classes: usize) -> crate::utils::error::Result<()> {
        if self.num_classes != dataset_classes {
            return Err(HandSignError::ClassCountMismatch {
                model: self.num_classes,
                dataset: dataset_classes,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_feature_size_for_28px() {
        let config = HandSignCnnConfig::new();
        assert_eq!(config.final_spatial_size(), 1);
        assert_eq!(config.flattened_features(), 128);
    }

    #[test]
    fn test_config_json_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model_config.json");
        let config = HandSignCnnConfig::new().with_num_classes(7).with_base_filters(16);

        config.save(&path).unwrap();
        let loaded = HandSignCnnConfig::load(&path).unwrap();
        assert_eq!(loaded.num_classes, 7);
        assert_eq!(loaded.base_filters, 16);
        assert_eq!(loaded.input_size, 28);
    }

    #[test]
    fn test_too_small_input_rejected() {
        let config = HandSignCnnConfig::new().with_input_size(16);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let config = HandSignCnnConfig::new();
        let model: HandSignCnn<TestBackend> = HandSignCnn::new(&config, &device).unwrap();

        let input = Tensor::<TestBackend, 4>::zeros([2, 3, 28, 28], &device);
        let output = model.forward(input);
        assert_eq!(output.dims(), [2, 24]);
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let device = Default::default();
        let config = HandSignCnnConfig::new().with_num_classes(5);
        let model: HandSignCnn<TestBackend> = HandSignCnn::new(&config, &device).unwrap();

        let input = Tensor::<TestBackend, 4>::ones([3, 3, 28, 28], &device);
        let sums: Vec<f32> = model
            .forward_softmax(input)
            .sum_dim(1)
            .into_data()
            .iter::<f32>()
            .collect();
        assert!(sums.iter().all(|s| (s - 1.0).abs() < 1e-5));
    }

    #[test]
    fn test_class_count_check() {
        let device = Default::default();
        let config = HandSignCnnConfig::new().with_num_classes(3);
        let model: HandSignCnn<TestBackend> = HandSignCnn::new(&config, &device).unwrap();

        assert!(model.ensure_num_classes(3).is_ok());
        assert!(matches!(
            model.ensure_num_classes(24),
            Err(HandSignError::ClassCountMismatch {
                model: 3,
                dataset: 24
            })
        ));
    }

    #[test]
    fn test_larger_input_flattens_correctly() {
        let device = Default::default();
        let config = HandSignCnnConfig::new().with_input_size(64).with_num_classes(2);
        let model: HandSignCnn<TestBackend> = HandSignCnn::new(&config, &device).unwrap();

        let input = Tensor::<TestBackend, 4>::zeros([1, 3, 64, 64], &device);
        assert_eq!(model.forward(input).dims(), [1, 2]);
    }
}
