//! Burn network for classifying variant images by population.
//!
//! `AncestryNet` is a stack of separable convolution blocks followed by a dense head:
//! - each block expands channels with a 1x1 convolution, applies row and column
//!   depthwise convolutions around a vertical max-pool, then projects with a
//!   horizontally strided convolution, halving both spatial dimensions;
//! - every convolution is followed by LeakyReLU and batch normalization.
//!
//! Inputs are NCHW `[batch, 1, side, side]`; outputs are unnormalized class logits.

use burn::module::Module;
use burn::nn;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, PaddingConfig2d};
use burn::tensor::activation::{leaky_relu, softmax};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Negative slope of the LeakyReLU activations.
pub const LEAKY_SLOPE: f64 = 0.3;

/// `(input, expanded, output)` channels of each block, outermost first.
pub const BLOCK_CHANNELS: [(usize, usize, usize); 3] = [(1, 32, 64), (64, 64, 128), (128, 128, 256)];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AncestryNetConfig {
    /// Image side length in pixels.
    pub side: usize,
    /// Number of population classes.
    pub classes: usize,
    /// Upper bound on separable blocks; the image side may allow fewer.
    pub max_blocks: usize,
}

impl AncestryNetConfig {
    pub fn new(side: usize, classes: usize) -> Self {
        Self {
            side,
            classes,
            max_blocks: BLOCK_CHANNELS.len(),
        }
    }

    /// Blocks that fit the image: each one halves the side, which must stay at least 1.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut side = self.side;
        while depth < self.max_blocks.min(BLOCK_CHANNELS.len()) && side >= 2 {
            side /= 2;
            depth += 1;
        }
        depth
    }

    /// Side length after all blocks.
    pub fn output_side(&self) -> usize {
        self.side >> self.depth()
    }

    /// Channels after all blocks.
    pub fn output_channels(&self) -> usize {
        match self.depth() {
            0 => 1,
            d => BLOCK_CHANNELS[d - 1].2,
        }
    }

    /// Length of the flattened feature vector fed to the dense head.
    pub fn flat_features(&self) -> usize {
        let side = self.output_side();
        self.output_channels() * side * side
    }
}

fn conv(
    channels: [usize; 2],
    kernel: [usize; 2],
    stride: [usize; 2],
    padding: PaddingConfig2d,
    groups: usize,
) -> Conv2dConfig {
    Conv2dConfig::new(channels, kernel)
        .with_stride(stride)
        .with_padding(padding)
        .with_groups(groups)
        .with_bias(false)
}

/// One convolution followed by LeakyReLU and batch normalization.
#[derive(Debug, Module)]
pub struct ConvUnit<B: Backend> {
    conv: Conv2d<B>,
    norm: BatchNorm<B, 2>,
}

impl<B: Backend> ConvUnit<B> {
    fn new(cfg: Conv2dConfig, out_channels: usize, device: &B::Device) -> Self {
        Self {
            conv: cfg.init(device),
            norm: BatchNormConfig::new(out_channels).init(device),
        }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(input);
        let x = leaky_relu(x, LEAKY_SLOPE);
        self.norm.forward(x)
    }
}

#[derive(Debug, Module)]
pub struct SeparableBlock<B: Backend> {
    expand: ConvUnit<B>,
    row_depthwise: ConvUnit<B>,
    pool: MaxPool2d,
    col_depthwise: ConvUnit<B>,
    project: ConvUnit<B>,
}

impl<B: Backend> SeparableBlock<B> {
    pub fn new(channels: (usize, usize, usize), device: &B::Device) -> Self {
        let (input, mid, output) = channels;
        let expand = ConvUnit::new(
            conv([input, mid], [1, 1], [1, 1], PaddingConfig2d::Valid, 1),
            mid,
            device,
        );
        let row_depthwise = ConvUnit::new(
            conv([mid, mid], [1, 3], [1, 1], PaddingConfig2d::Explicit(0, 1), mid),
            mid,
            device,
        );
        let pool = MaxPool2dConfig::new([2, 1]).with_strides([2, 1]).init();
        let col_depthwise = ConvUnit::new(
            conv([mid, mid], [3, 1], [1, 1], PaddingConfig2d::Explicit(1, 0), mid),
            mid,
            device,
        );
        let project = ConvUnit::new(
            conv([mid, output], [1, 2], [1, 2], PaddingConfig2d::Valid, 1),
            output,
            device,
        );
        Self {
            expand,
            row_depthwise,
            pool,
            col_depthwise,
            project,
        }
    }

    /// `[N, in, H, W] -> [N, out, H/2, W/2]`.
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.expand.forward(input);
        let x = self.row_depthwise.forward(x);
        let x = self.pool.forward(x);
        let x = self.col_depthwise.forward(x);
        self.project.forward(x)
    }
}

#[derive(Debug, Module)]
pub struct AncestryNet<B: Backend> {
    blocks: Vec<SeparableBlock<B>>,
    head: nn::Linear<B>,
}

impl<B: Backend> AncestryNet<B> {
    pub fn new(cfg: AncestryNetConfig, device: &B::Device) -> Self {
        let blocks = BLOCK_CHANNELS[..cfg.depth()]
            .iter()
            .map(|&channels| SeparableBlock::new(channels, device))
            .collect();
        let head = nn::LinearConfig::new(cfg.flat_features(), cfg.classes.max(1)).init(device);
        Self { blocks, head }
    }

    /// Class logits, shape `[N, classes]`.
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = images;
        for block in &self.blocks {
            x = block.forward(x);
        }
        let [batch, channels, height, width] = x.dims();
        self.head.forward(x.reshape([batch, channels * height * width]))
    }

    /// Per-class probabilities, shape `[N, classes]`, each row summing to 1.
    pub fn forward_probabilities(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        softmax(self.forward(images), 1)
    }
}

pub mod prelude {
    pub use super::{AncestryNet, AncestryNetConfig, SeparableBlock};
}
