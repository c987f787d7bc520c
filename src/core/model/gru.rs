use crate::core::tensor::ModelMode;
use crate::core::Result;
use candle_core::Tensor;
use candle_nn::{ops::sigmoid, Dropout, VarBuilder};

/// One GRU layer with PyTorch parameter layout, gates ordered (r, z, n).
pub struct GruLayer {
    w_ih_t: Tensor,
    w_hh_t: Tensor,
    b_ih: Tensor,
    b_hh: Tensor,
    hidden_size: usize,
}

impl GruLayer {
    pub fn load(vb: &VarBuilder, layer: usize, input_size: usize, hidden_size: usize) -> candle_core::Result<Self> {
        let gates = 3 * hidden_size;
        let w_ih = vb.get((gates, input_size), &format!("weight_ih_l{}", layer))?;
        let w_hh = vb.get((gates, hidden_size), &format!("weight_hh_l{}", layer))?;
        let b_ih = vb.get(gates, &format!("bias_ih_l{}", layer))?;
        let b_hh = vb.get(gates, &format!("bias_hh_l{}", layer))?;

        Ok(Self {
            w_ih_t: w_ih.t()?.contiguous()?,
            w_hh_t: w_hh.t()?.contiguous()?,
            b_ih,
            b_hh,
            hidden_size,
        })
    }

    /// Runs the layer over `xs` of shape `(steps, input)` from a zero state.
    /// Returns every step's hidden state `(steps, hidden)` and the final one
    /// `(1, hidden)`.
    pub fn forward(&self, xs: &Tensor) -> Result<(Tensor, Tensor)> {
        let steps = xs.dim(0)?;
        let input_gates = xs.matmul(&self.w_ih_t)?.broadcast_add(&self.b_ih)?;

        let mut h = Tensor::zeros((1, self.hidden_size), xs.dtype(), xs.device())?;
        let mut outputs = Vec::with_capacity(steps);
        for t in 0..steps {
            let gi = input_gates.narrow(0, t, 1)?.chunk(3, 1)?;
            let gh = h.matmul(&self.w_hh_t)?.broadcast_add(&self.b_hh)?.chunk(3, 1)?;

            let r = sigmoid(&(&gi[0] + &gh[0])?)?;
            let z = sigmoid(&(&gi[1] + &gh[1])?)?;
            let reset_hidden = (&r * &gh[2])?;
            let n = (&gi[2] + &reset_hidden)?.tanh()?;
            // h' = (1 - z) * n + z * h
            let delta = (&h - &n)?;
            h = (&n + (&z * &delta)?)?;
            outputs.push(h.clone());
        }

        Ok((Tensor::cat(&outputs, 0)?, h))
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }
}

/// Stacked unidirectional GRU with dropout between layers.
pub struct Gru {
    layers: Vec<GruLayer>,
    dropout: Dropout,
    mode: ModelMode,
}

impl Gru {
    pub fn load(
        vb: VarBuilder,
        input_size: usize,
        hidden_size: usize,
        num_layers: usize,
        dropout: f32,
    ) -> candle_core::Result<Self> {
        let mut layers = Vec::with_capacity(num_layers);
        for layer in 0..num_layers {
            let in_dim = if layer == 0 { input_size } else { hidden_size };
            layers.push(GruLayer::load(&vb, layer, in_dim, hidden_size)?);
        }
        Ok(Self {
            layers,
            dropout: Dropout::new(dropout),
            mode: ModelMode::Inference,
        })
    }

    /// Final hidden state of the last layer, shape `(1, hidden)`.
    pub fn last_hidden(&self, xs: &Tensor) -> Result<Tensor> {
        let mut input = xs.clone();
        let mut last = None;
        for (i, layer) in self.layers.iter().enumerate() {
            let (outputs, h) = layer.forward(&input)?;
            last = Some(h);
            if i + 1 < self.layers.len() {
                input = self.dropout.forward(&outputs, self.mode.is_train())?;
            }
        }
        last.ok_or_else(|| crate::core::NerError::Inference("GRU has no layers".to_string()))
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn mode(&self) -> ModelMode {
        self.mode
    }

    #[cfg(test)]
    pub(crate) fn set_mode(&mut self, mode: ModelMode) {
        self.mode = mode;
    }
}
