use crate::errors::TensorError;
use crate::tensor::Tensor;
use std::cmp::PartialEq;

impl PartialEq for Tensor {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Tensor {
    /// 对张量中的所有元素求和
    pub fn sum(&self) -> f32 {
        self.data.sum()
    }

    /// 将所有元素置为`value`，形状不变
    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    /// 以`other`的值覆盖本张量。两者形状须严格一致，否则panic
    pub fn copy_from(&mut self, other: &Self) {
        assert!(
            self.is_same_shape(other),
            "{}",
            TensorError::InconsistentShape {
                tensor1_shape: self.shape().to_vec(),
                tensor2_shape: other.shape().to_vec(),
            }
        );
        self.data.assign(&other.data);
    }
}
