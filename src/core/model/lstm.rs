use crate::core::Result;
use candle_core::Tensor;
use candle_nn::rnn::{lstm, Direction, LSTMConfig, LSTM, RNN};
use candle_nn::VarBuilder;

/// Single layer bidirectional LSTM over PyTorch weights
/// (`*_l0` forward, `*_l0_reverse` backward). Output rows concatenate the
/// forward and backward states: `(steps, 2 * hidden)`.
pub struct BiLstm {
    forward: LSTM,
    backward: LSTM,
    input_size: usize,
    hidden_size: usize,
}

impl BiLstm {
    pub fn load(vb: VarBuilder, input_size: usize, hidden_size: usize) -> candle_core::Result<Self> {
        let direction = |direction: Direction| {
            let config = LSTMConfig {
                direction,
                ..Default::default()
            };
            lstm(input_size, hidden_size, config, vb.clone())
        };
        Ok(Self {
            forward: direction(Direction::Forward)?,
            backward: direction(Direction::Backward)?,
            input_size,
            hidden_size,
        })
    }

    /// `xs` is `(steps, input)`. The backward pass reads the sequence from
    /// the end and its states are put back in positional order.
    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let fwd = run(&self.forward, xs)?;
        let bwd = reverse_rows(&run(&self.backward, &reverse_rows(xs)?)?)?;
        Ok(Tensor::cat(&[&fwd, &bwd], 1)?)
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn output_size(&self) -> usize {
        2 * self.hidden_size
    }
}

fn run(lstm: &LSTM, xs: &Tensor) -> Result<Tensor> {
    let states = lstm.seq(&xs.unsqueeze(0)?)?;
    Ok(lstm.states_to_tensor(&states)?.squeeze(0)?)
}

fn reverse_rows(xs: &Tensor) -> Result<Tensor> {
    let steps = xs.dim(0)? as u32;
    let order: Vec<u32> = (0..steps).rev().collect();
    let order = Tensor::new(order.as_slice(), xs.device())?;
    Ok(xs.index_select(&order, 0)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use std::collections::HashMap;

    fn weights(input: usize, hidden: usize, value: f32) -> HashMap<String, Tensor> {
        let dev = Device::Cpu;
        let g = 4 * hidden;
        let mut map = HashMap::new();
        for suffix in ["", "_reverse"] {
            map.insert(format!("weight_ih_l0{}", suffix), Tensor::full(value, (g, input), &dev).unwrap());
            map.insert(format!("weight_hh_l0{}", suffix), Tensor::full(value, (g, hidden), &dev).unwrap());
            map.insert(format!("bias_ih_l0{}", suffix), Tensor::zeros(g, DType::F32, &dev).unwrap());
            map.insert(format!("bias_hh_l0{}", suffix), Tensor::zeros(g, DType::F32, &dev).unwrap());
        }
        map
    }

    #[test]
    fn test_output_shape() {
        let vb = VarBuilder::from_tensors(weights(3, 2, 0.1), DType::F32, &Device::Cpu);
        let lstm = BiLstm::load(vb, 3, 2).unwrap();
        assert_eq!(lstm.output_size(), 4);

        let xs = Tensor::ones((6, 3), DType::F32, &Device::Cpu).unwrap();
        let out = lstm.forward(&xs).unwrap();
        assert_eq!(out.dims(), &[6, 4]);
    }

    #[test]
    fn test_directions_mirror_on_symmetric_input() {
        // Identical weights in both directions over a constant sequence: the
        // forward state at step t equals the backward state at step n-1-t.
        let vb = VarBuilder::from_tensors(weights(1, 1, 0.3), DType::F32, &Device::Cpu);
        let lstm = BiLstm::load(vb, 1, 1).unwrap();

        let xs = Tensor::ones((3, 1), DType::F32, &Device::Cpu).unwrap();
        let out = lstm.forward(&xs).unwrap().to_vec2::<f32>().unwrap();
        for t in 0..3 {
            assert!((out[t][0] - out[2 - t][1]).abs() < 1e-6);
        }
        // Later forward steps have seen more input.
        assert!(out[2][0] > out[0][0]);
    }

    #[test]
    fn test_backward_direction_reads_reverse_weights() {
        let mut map = weights(1, 1, 0.3);
        for name in ["weight_ih_l0_reverse", "weight_hh_l0_reverse"] {
            map.insert(name.to_string(), Tensor::zeros((4, 1), DType::F32, &Device::Cpu).unwrap());
        }
        let vb = VarBuilder::from_tensors(map, DType::F32, &Device::Cpu);
        let lstm = BiLstm::load(vb, 1, 1).unwrap();

        let xs = Tensor::ones((3, 1), DType::F32, &Device::Cpu).unwrap();
        let out = lstm.forward(&xs).unwrap().to_vec2::<f32>().unwrap();
        for row in &out {
            assert!(row[0] > 0.0);
            assert_eq!(row[1], 0.0);
        }
    }

    #[test]
    fn test_single_step_matches_hand_computation() {
        let vb = VarBuilder::from_tensors(weights(1, 1, 0.5), DType::F32, &Device::Cpu);
        let lstm = BiLstm::load(vb, 1, 1).unwrap();

        let xs = Tensor::ones((1, 1), DType::F32, &Device::Cpu).unwrap();
        let out = lstm.forward(&xs).unwrap().to_vec2::<f32>().unwrap();

        let s = 1.0 / (1.0 + (-0.5f32).exp());
        let c = s * 0.5f32.tanh();
        let expected = s * c.tanh();
        assert!((out[0][0] - expected).abs() < 1e-5);
        assert!((out[0][1] - expected).abs() < 1e-5);
    }
}
