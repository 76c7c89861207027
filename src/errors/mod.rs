use thiserror::Error;

/// 张量层面的错误。张量属于底层容器，误用时直接以本类型的文本 panic
#[derive(Error, Debug, PartialEq)]
pub enum TensorError {
    #[error("数据长度{len}与形状{shape:?}所需的元素个数{expected}不一致")]
    DataLengthMismatch {
        len: usize,
        shape: Vec<usize>,
        expected: usize,
    },
    #[error("索引维度{got}与张量维度{expected}不一致")]
    IndexDimensionMismatch { expected: usize, got: usize },
    #[error("张量形状不一致：第一个张量的形状为{tensor1_shape:?}，第二个张量的形状为{tensor2_shape:?}")]
    InconsistentShape {
        tensor1_shape: Vec<usize>,
        tensor2_shape: Vec<usize>,
    },
    #[error("随机区间无效：下界{min}须小于等于上界{max}")]
    InvalidRange { min: f32, max: f32 },
}
