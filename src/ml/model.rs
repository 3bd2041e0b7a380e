// ============================================================
// Layer 5 — Captioning Model Architecture
// ============================================================
// EncoderCnn: image → fixed-width embedding
//   backbone (3 strided conv + ReLU, global average pool)
//   → linear projection → batch norm
//
// DecoderRnn: (embedding, caption ids, lengths) → logits
//   word embedding → stacked LSTM → linear to vocabulary,
//   gathered at the packed (non-padding) positions only.
//
// Only the encoder's `linear` and `bn` and the whole decoder
// are trained; the backbone stays frozen.

use anyhow::Result;
use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
        BatchNorm, BatchNormConfig,
        Embedding, EmbeddingConfig,
        Linear, LinearConfig,
        Lstm, LstmConfig,
        PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::relu,
};

use crate::ml::packing::pack_steps;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct CaptionModelConfig {
    pub vocab_size:  usize,
    pub embed_size:  usize,
    pub hidden_size: usize,
    pub num_layers:  usize,
    /// Width of the backbone's pooled feature vector
    #[config(default = 128)]
    pub backbone_channels: usize,
}

impl CaptionModelConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> CaptionModel<B> {
        CaptionModel {
            encoder: self.init_encoder(device),
            decoder: self.init_decoder(device),
        }
    }

    fn init_encoder<B: Backend>(&self, device: &B::Device) -> EncoderCnn<B> {
        let c = self.backbone_channels;
        let conv = |d_in: usize, d_out: usize| {
            Conv2dConfig::new([d_in, d_out], [3, 3])
                .with_stride([2, 2])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(device)
        };

        let backbone = Backbone {
            conv1: conv(3, c / 4),
            conv2: conv(c / 4, c / 2),
            conv3: conv(c / 2, c),
            pool:  AdaptiveAvgPool2dConfig::new([1, 1]).init(),
        };

        EncoderCnn {
            backbone,
            linear: LinearConfig::new(c, self.embed_size).init(device),
            bn:     BatchNormConfig::new(self.embed_size).with_momentum(0.01).init(device),
        }
    }

    fn init_decoder<B: Backend>(&self, device: &B::Device) -> DecoderRnn<B> {
        let lstm = (0..self.num_layers)
            .map(|layer| {
                let d_input = if layer == 0 { self.embed_size } else { self.hidden_size };
                LstmConfig::new(d_input, self.hidden_size, true).init(device)
            })
            .collect();

        DecoderRnn {
            embed:  EmbeddingConfig::new(self.vocab_size, self.embed_size).init(device),
            lstm,
            linear: LinearConfig::new(self.hidden_size, self.vocab_size).init(device),
        }
    }
}

// ─── Encoder ──────────────────────────────────────────────────────────────────

/// Convolutional feature extractor. Never trained here: the
/// encoder freezes it and detaches its output.
#[derive(Module, Debug)]
pub struct Backbone<B: Backend> {
    pub conv1: Conv2d<B>,
    pub conv2: Conv2d<B>,
    pub conv3: Conv2d<B>,
    pub pool:  AdaptiveAvgPool2d,
}

impl<B: Backend> Backbone<B> {
    /// [batch, 3, H, W] → [batch, channels]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = relu(self.conv1.forward(images));
        let x = relu(self.conv2.forward(x));
        let x = relu(self.conv3.forward(x));
        let x = self.pool.forward(x);
        let [batch, channels, _, _] = x.dims();
        x.reshape([batch, channels])
    }
}

#[derive(Module, Debug)]
pub struct EncoderCnn<B: Backend> {
    pub backbone: Backbone<B>,
    pub linear:   Linear<B>,
    pub bn:       BatchNorm<B, 0>,
}

impl<B: Backend> EncoderCnn<B> {
    /// [batch, 3, H, W] → [batch, embed_size]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let features = self.backbone.forward(images).detach();
        self.bn.forward(self.linear.forward(features))
    }

    /// Take the backbone out of gradient tracking. Its parameters
    /// then never receive gradients, so the optimiser never holds
    /// state for them or updates them.
    pub fn freeze_backbone(mut self) -> Self {
        self.backbone = self.backbone.no_grad();
        self
    }
}

// ─── Decoder ──────────────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct DecoderRnn<B: Backend> {
    pub embed:  Embedding<B>,
    pub lstm:   Vec<Lstm<B>>,
    pub linear: Linear<B>,
}

impl<B: Backend> DecoderRnn<B> {
    /// One pass over the padded ground-truth captions.
    ///
    /// The image embedding is fed as step 0, followed by the
    /// caption tokens; the output at step t predicts token t.
    /// Returns one row of vocabulary logits per real caption token,
    /// in packing order: [Σ lengths, vocab_size].
    pub fn forward(
        &self,
        features: Tensor<B, 2>,
        captions: Tensor<B, 2, Int>,
        lengths:  &[usize],
    ) -> Result<Tensor<B, 2>> {
        let [batch, max_len] = captions.dims();

        let embeddings = self.embed.forward(captions);
        let mut x = Tensor::cat(vec![features.unsqueeze_dim::<3>(1), embeddings], 1);

        for layer in &self.lstm {
            let (hidden, _state) = layer.forward(x, None);
            x = hidden;
        }

        let [_, _, hidden_size] = x.dims();
        let hiddens = x.slice([0..batch, 0..max_len, 0..hidden_size]);
        let packed  = pack_steps(hiddens, lengths)?;
        Ok(self.linear.forward(packed))
    }
}

// ─── Full model ───────────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct CaptionModel<B: Backend> {
    pub encoder: EncoderCnn<B>,
    pub decoder: DecoderRnn<B>,
}

impl<B: Backend> CaptionModel<B> {
    /// images [batch, 3, H, W], captions [batch, max_len] →
    /// logits [Σ lengths, vocab_size]
    pub fn forward(
        &self,
        images:   Tensor<B, 4>,
        captions: Tensor<B, 2, Int>,
        lengths:  &[usize],
    ) -> Result<Tensor<B, 2>> {
        let features = self.encoder.forward(images);
        self.decoder.forward(features, captions, lengths)
    }
}
