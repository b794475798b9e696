//! U-Net architecture for semantic segmentation.
//!
//! Three encoder levels and a bottleneck, mirrored by a decoder that
//! up-samples with transposed convolutions and concatenates the encoder
//! skip connections. Input height and width must be multiples of 8.

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d, Relu,
    },
    tensor::{backend::Backend, Tensor},
};

/// A model mapping an image batch [B, C, H, W] to per-pixel class logits
/// [B, num_classes, H, W].
pub trait SegmentationModel<B: Backend>: Module<B> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4>;

    fn num_classes(&self) -> usize;
}

/// Configuration for the U-Net model
#[derive(Config, Debug)]
pub struct UNetConfig {
    /// Number of input channels (3 for RGB)
    #[config(default = "3")]
    pub in_channels: usize,

    /// Number of output classes, background included
    #[config(default = "3")]
    pub num_classes: usize,

    /// Filters of the first level, doubled at every level below it
    #[config(default = "16")]
    pub base_filters: usize,
}

impl UNetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> UNet<B> {
        UNet::new(self, device)
    }
}

impl From<&seg_core::ModelConfig> for UNetConfig {
    fn from(config: &seg_core::ModelConfig) -> Self {
        UNetConfig::new()
            .with_in_channels(config.in_channels)
            .with_num_classes(config.num_classes)
            .with_base_filters(config.base_filters)
    }
}

/// Two 3x3 convolutions, each followed by BatchNorm and ReLU
#[derive(Module, Debug)]
pub struct DoubleConv<B: Backend> {
    conv1: Conv2d<B>,
    bn1: BatchNorm<B, 2>,
    conv2: Conv2d<B>,
    bn2: BatchNorm<B, 2>,
    relu: Relu,
}

impl<B: Backend> DoubleConv<B> {
    pub fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        let conv1 = Conv2dConfig::new([in_channels, out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Same)
            .init(device);
        let conv2 = Conv2dConfig::new([out_channels, out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Same)
            .init(device);

        Self {
            conv1,
            bn1: BatchNormConfig::new(out_channels).init(device),
            conv2,
            bn2: BatchNormConfig::new(out_channels).init(device),
            relu: Relu::new(),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.relu.forward(self.bn1.forward(self.conv1.forward(x)));
        self.relu.forward(self.bn2.forward(self.conv2.forward(x)))
    }
}

/// Decoder stage: 2x up-sampling, skip concatenation, DoubleConv
#[derive(Module, Debug)]
pub struct UpBlock<B: Backend> {
    up: ConvTranspose2d<B>,
    conv: DoubleConv<B>,
}

impl<B: Backend> UpBlock<B> {
    /// `in_channels` is the width of the incoming (deeper) feature map;
    /// the skip connection is expected to carry `in_channels / 2`.
    pub fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        let up = ConvTranspose2dConfig::new([in_channels, out_channels], [2, 2])
            .with_stride([2, 2])
            .init(device);

        Self {
            up,
            conv: DoubleConv::new(out_channels * 2, out_channels, device),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>, skip: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.up.forward(x);
        self.conv.forward(Tensor::cat(vec![x, skip], 1))
    }
}

/// U-Net segmentation network
#[derive(Module, Debug)]
pub struct UNet<B: Backend> {
    enc1: DoubleConv<B>,
    enc2: DoubleConv<B>,
    enc3: DoubleConv<B>,
    pool: MaxPool2d,
    bottleneck: DoubleConv<B>,
    up3: UpBlock<B>,
    up2: UpBlock<B>,
    up1: UpBlock<B>,
    head: Conv2d<B>,
    num_classes: usize,
}

impl<B: Backend> UNet<B> {
    pub fn new(config: &UNetConfig, device: &B::Device) -> Self {
        let f = config.base_filters;

        Self {
            enc1: DoubleConv::new(config.in_channels, f, device),
            enc2: DoubleConv::new(f, f * 2, device),
            enc3: DoubleConv::new(f * 2, f * 4, device),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            bottleneck: DoubleConv::new(f * 4, f * 8, device),
            up3: UpBlock::new(f * 8, f * 4, device),
            up2: UpBlock::new(f * 4, f * 2, device),
            up1: UpBlock::new(f * 2, f, device),
            head: Conv2dConfig::new([f, config.num_classes], [1, 1]).init(device),
            num_classes: config.num_classes,
        }
    }

    /// # Arguments
    /// * `x` - Input tensor of shape [batch_size, in_channels, height, width]
    ///
    /// # Returns
    /// * Logits tensor of shape [batch_size, num_classes, height, width]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let s1 = self.enc1.forward(x);
        let s2 = self.enc2.forward(self.pool.forward(s1.clone()));
        let s3 = self.enc3.forward(self.pool.forward(s2.clone()));
        let x = self.bottleneck.forward(self.pool.forward(s3.clone()));

        let x = self.up3.forward(x, s3);
        let x = self.up2.forward(x, s2);
        let x = self.up1.forward(x, s1);

        self.head.forward(x)
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }
}

impl<B: Backend> SegmentationModel<B> for UNet<B> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        UNet::forward(self, images)
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let model = UNetConfig::new()
            .with_base_filters(4)
            .init::<TestBackend>(&device);

        let input = Tensor::<TestBackend, 4>::zeros([2, 3, 16, 24], &device);
        let output = model.forward(input);
        assert_eq!(output.dims(), [2, 3, 16, 24]);
    }

    #[test]
    fn test_custom_class_count() {
        let device = Default::default();
        let model = UNetConfig::new()
            .with_in_channels(1)
            .with_num_classes(5)
            .with_base_filters(2)
            .init::<TestBackend>(&device);

        let output = SegmentationModel::forward(
            &model,
            Tensor::<TestBackend, 4>::ones([1, 1, 8, 8], &device),
        );
        assert_eq!(output.dims(), [1, 5, 8, 8]);
        assert_eq!(SegmentationModel::<TestBackend>::num_classes(&model), 5);
    }

    #[test]
    fn test_config_from_model_config() {
        let config = UNetConfig::from(&seg_core::ModelConfig {
            in_channels: 3,
            num_classes: 4,
            base_filters: 8,
        });
        assert_eq!(config.num_classes, 4);
        assert_eq!(config.base_filters, 8);
    }

    #[test]
    fn test_parameter_count_grows_with_filters() {
        let device = Default::default();
        let small = UNetConfig::new().with_base_filters(2).init::<TestBackend>(&device);
        let large = UNetConfig::new().with_base_filters(4).init::<TestBackend>(&device);
        assert!(large.num_params() > small.num_params());
    }
}
