/*
 * @Author       : 老董
 * @Date         : 2026-10-18
 * @Description  : Blob：层与层之间传递的 4 维数据块 [num, channels, height, width]
 *
 * 每个 Blob 同时持有两份形状一致的张量：
 * - data：前向传播的值
 * - diff：反向传播的梯度
 */

use crate::tensor::Tensor;

#[derive(Debug, Clone)]
pub struct Blob {
    data: Tensor,
    diff: Tensor,
}

impl Blob {
    /// 创建一个全零的 Blob
    pub fn new(num: usize, channels: usize, height: usize, width: usize) -> Self {
        let shape = [num, channels, height, width];
        Self {
            data: Tensor::zeros(&shape),
            diff: Tensor::zeros(&shape),
        }
    }

    /// 以现成的值张量创建 Blob，梯度初始化为零。`data`须为 4 维
    pub fn from_data(data: Tensor) -> Self {
        assert!(
            data.dimension() == 4,
            "Blob 须为 4 维 [num, channels, height, width]，得到 {:?}",
            data.shape()
        );
        let diff = Tensor::zeros(data.shape());
        Self { data, diff }
    }

    /// 调整形状。形状变化时 data 与 diff 都重新分配并清零；形状不变则保留原值
    pub fn reshape(&mut self, num: usize, channels: usize, height: usize, width: usize) {
        let shape = [num, channels, height, width];
        if self.shape() != shape {
            self.data = Tensor::zeros(&shape);
            self.diff = Tensor::zeros(&shape);
        }
    }

    /// 调整为与`other`相同的形状
    pub fn reshape_like(&mut self, other: &Self) {
        let [n, c, h, w] = other.shape();
        self.reshape(n, c, h, w);
    }

    pub fn shape(&self) -> [usize; 4] {
        let s = self.data.shape();
        [s[0], s[1], s[2], s[3]]
    }

    pub fn num(&self) -> usize {
        self.data.shape()[0]
    }

    pub fn channels(&self) -> usize {
        self.data.shape()[1]
    }

    pub fn height(&self) -> usize {
        self.data.shape()[2]
    }

    pub fn width(&self) -> usize {
        self.data.shape()[3]
    }

    /// 元素总数 num*channels*height*width
    pub fn count(&self) -> usize {
        self.data.size()
    }

    pub fn data(&self) -> &Tensor {
        &self.data
    }

    /// 以行优先顺序可变地访问全部值。只能改值、不能改形状，形状变化须经`reshape`
    pub fn data_mut(&mut self) -> &mut [f32] {
        self.data.data_as_slice_mut()
    }

    pub fn diff(&self) -> &Tensor {
        &self.diff
    }

    /// 同`data_mut`，作用于梯度
    pub fn diff_mut(&mut self) -> &mut [f32] {
        self.diff.data_as_slice_mut()
    }
}

impl Default for Blob {
    fn default() -> Self {
        Self::new(0, 0, 0, 0)
    }
}
