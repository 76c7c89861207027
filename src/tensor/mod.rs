use ndarray::{Array, IxDyn};
use rand::Rng;
use rand::distributions::{Distribution, Uniform};

use crate::errors::TensorError;

mod ops {
    pub mod others;
}

mod index;
mod property;


/// 定义张量的结构体。本库中的张量主要用于承载 4 维的 [num, channels, height, width] 数据，
/// 但本身不限制维度。
/// 注：内部数组始终保持标准（行优先、连续）内存布局，故可随时以切片方式访问全部元素。
#[derive(Debug, Clone)]
pub struct Tensor {
    data: Array<f32, IxDyn>,
}

impl Tensor {
    /// 以给定数据与形状创建张量。
    /// 注：`data`的长度必须和`shape`中所有元素的乘积相等，否则panic。
    pub fn new(data: &[f32], shape: &[usize]) -> Self {
        let expected = shape.iter().product::<usize>();
        assert!(
            data.len() == expected,
            "{}",
            TensorError::DataLengthMismatch {
                len: data.len(),
                shape: shape.to_vec(),
                expected,
            }
        );
        let data = Array::from_shape_vec(IxDyn(shape), data.to_vec())
            .expect("长度已校验，构造必然成功");
        Self { data }
    }

    /// 创建一个全零张量
    pub fn zeros(shape: &[usize]) -> Self {
        Self {
            data: Array::zeros(IxDyn(shape)),
        }
    }

    /// 创建一个所有元素均为`value`的张量（常用于以常数填充测试输入）
    pub fn full(value: f32, shape: &[usize]) -> Self {
        Self {
            data: Array::from_elem(IxDyn(shape), value),
        }
    }

    /// 创建一个随机张量，其值在[min, max]的闭区间。
    /// 随机数由调用方提供的`rng`产生，故固定种子即可复现同样的张量。
    pub fn new_uniform<R: Rng + ?Sized>(min: f32, max: f32, shape: &[usize], rng: &mut R) -> Self {
        assert!(min <= max, "{}", TensorError::InvalidRange { min, max });
        let uniform = Uniform::from(min..=max);
        let data = (0..shape.iter().product::<usize>())
            .map(|_| uniform.sample(&mut *rng))
            .collect::<Vec<_>>();
        Self::new(&data, shape)
    }
}
