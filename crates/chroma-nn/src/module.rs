use chroma_core::{Result, Tensor};

/// Base trait for all inference layers and blocks.
///
/// A module is stateless at call time: `forward` is a pure function of the
/// input and the module's bound parameters, so a module shared behind `Arc`
/// can serve concurrent forward passes without coordination.
pub trait Module: Send + Sync {
    /// Forward pass.
    fn forward(&self, input: &Tensor) -> Result<Tensor>;

    /// The parameter tensors bound to this module, in a stable order.
    fn parameters(&self) -> Vec<&Tensor>;

    /// Total number of scalar parameters.
    fn num_parameters(&self) -> usize {
        self.parameters().iter().map(|t| t.numel()).sum()
    }
}
