use super::Tensor;
use crate::errors::TensorError;
use ndarray::IxDyn;
use std::ops::{Index, IndexMut};

// 引用式索引：`tensor[[n, c, h, w]]`
impl<const N: usize> Index<[usize; N]> for Tensor {
    type Output = f32;

    fn index(&self, index: [usize; N]) -> &f32 {
        self.check_index_dimension(N);
        &self.data[IxDyn(&index)]
    }
}

impl<const N: usize> IndexMut<[usize; N]> for Tensor {
    fn index_mut(&mut self, index: [usize; N]) -> &mut f32 {
        self.check_index_dimension(N);
        &mut self.data[IxDyn(&index)]
    }
}

impl Tensor {
    fn check_index_dimension(&self, got: usize) {
        assert!(
            got == self.dimension(),
            "{}",
            TensorError::IndexDimensionMismatch {
                expected: self.dimension(),
                got,
            }
        );
    }
}
