/*
 * @Author       : 老董
 * @Date         : 2026-10-18
 * @Description  : 本类仅包含一些属性方法，不包含任何运算方法
 */

use super::Tensor;

impl Tensor {
    /// 张量的形状，如 4 维数据为`[num, channels, height, width]`
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// 张量的维（dim）数、阶（rank）数，即`shape()`的元素个数
    pub fn dimension(&self) -> usize {
        self.data.ndim()
    }

    /// 计算张量中所有元素的数量
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// 判断两个张量的形状是否严格一致。如：形状为 [1, 4]，[1, 4]和[4]是不一致的，会返回false
    pub fn is_same_shape(&self, other: &Self) -> bool {
        self.shape() == other.shape()
    }

    /// 以行优先顺序返回全部元素
    pub fn data_as_slice(&self) -> &[f32] {
        self.data.as_slice().expect("张量始终为标准内存布局")
    }

    pub fn data_as_slice_mut(&mut self) -> &mut [f32] {
        self.data.as_slice_mut().expect("张量始终为标准内存布局")
    }
}
