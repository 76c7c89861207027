/*
 * @Author       : 老董
 * @Date         : 2026-10-18
 * @Description  : 2D 池化层（最大池化 / 平均池化）
 *
 * 设计决策：
 * - 输入输出都是 4D [num, C, H, W]，每个 (num, C) 平面独立计算
 * - 输出尺寸向上取整：起点仍在输入内的残缺窗口也算一个输出，窗口越界部分被裁掉（不补零）
 * - 最大池化记录每个输出位置对应最大值在输入平面中的展平索引 h * W + w，用于反向传播；
 *   值相同时取行优先扫描中第一个出现的位置
 * - 并行后端用 Rayon 按平面并行，平面内的计算顺序与顺序后端一致，结果逐位相同
 */

use super::{TraitLayer, check_not_empty, check_shape, single_blob, single_blob_mut};
use crate::nn::{Blob, Context, LayerError, LayerParameter, PoolMethod};
use rayon::prelude::*;
use tracing::{debug, trace};

/// 池化窗口的几何信息（单个平面）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PoolGeometry {
    height: usize,
    width: usize,
    pooled_height: usize,
    pooled_width: usize,
    kernel_size: usize,
    stride: usize,
}

impl PoolGeometry {
    const fn input_plane(&self) -> usize {
        self.height * self.width
    }

    const fn output_plane(&self) -> usize {
        self.pooled_height * self.pooled_width
    }

    /// 第 (ph, pw) 个输出对应的输入窗口，返回 (h_start, h_end, w_start, w_end)，左闭右开
    fn window(&self, ph: usize, pw: usize) -> (usize, usize, usize, usize) {
        let h_start = ph * self.stride;
        let w_start = pw * self.stride;
        let h_end = h_start.saturating_add(self.kernel_size).min(self.height);
        let w_end = w_start.saturating_add(self.kernel_size).min(self.width);
        (h_start, h_end, w_start, w_end)
    }

    fn max_forward(&self, input: &[f32], output: &mut [f32], indices: &mut [usize]) {
        for ph in 0..self.pooled_height {
            for pw in 0..self.pooled_width {
                let (h_start, h_end, w_start, w_end) = self.window(ph, pw);

                let mut max_val = f32::NEG_INFINITY;
                let mut max_idx = h_start * self.width + w_start;
                for h in h_start..h_end {
                    for w in w_start..w_end {
                        let idx = h * self.width + w;
                        // 严格大于：相等时保留先出现的位置
                        if input[idx] > max_val {
                            max_val = input[idx];
                            max_idx = idx;
                        }
                    }
                }

                let out = ph * self.pooled_width + pw;
                output[out] = max_val;
                indices[out] = max_idx;
            }
        }
    }

    fn max_backward(&self, top_diff: &[f32], indices: &[usize], bottom_diff: &mut [f32]) {
        bottom_diff.fill(0.);
        // 重叠窗口可能选中同一个输入位置，梯度累加
        for (&grad, &idx) in top_diff.iter().zip(indices) {
            bottom_diff[idx] += grad;
        }
    }

    fn ave_forward(&self, input: &[f32], output: &mut [f32]) {
        for ph in 0..self.pooled_height {
            for pw in 0..self.pooled_width {
                let (h_start, h_end, w_start, w_end) = self.window(ph, pw);
                let mut sum = 0.;
                for h in h_start..h_end {
                    for w in w_start..w_end {
                        sum += input[h * self.width + w];
                    }
                }
                let pool_size = ((h_end - h_start) * (w_end - w_start)) as f32;
                output[ph * self.pooled_width + pw] = sum / pool_size;
            }
        }
    }

    fn ave_backward(&self, top_diff: &[f32], bottom_diff: &mut [f32]) {
        bottom_diff.fill(0.);
        for ph in 0..self.pooled_height {
            for pw in 0..self.pooled_width {
                let (h_start, h_end, w_start, w_end) = self.window(ph, pw);
                let pool_size = ((h_end - h_start) * (w_end - w_start)) as f32;
                let grad = top_diff[ph * self.pooled_width + pw] / pool_size;
                for h in h_start..h_end {
                    for w in w_start..w_end {
                        bottom_diff[h * self.width + w] += grad;
                    }
                }
            }
        }
    }
}

/// 计算单个方向的输出尺寸：ceil((input - kernel) / stride) + 1，
/// 再保证最后一个窗口的起点落在输入内。结果非正时返回 None。
/// 全程用无符号运算，任何 usize 取值都不会溢出
fn pooled_size(input: usize, kernel_size: usize, stride: usize) -> Option<usize> {
    if input < kernel_size {
        // 窗口比输入大：ceil(-(kernel - input) / stride) + 1 = 1 - floor((kernel - input) / stride)，
        // 仅当超出部分小于步长时为正（恰好一个被裁剪的窗口）
        return (kernel_size - input < stride).then_some(1);
    }
    let mut pooled = (input - kernel_size).div_ceil(stride).saturating_add(1);
    // 乘法溢出说明起点早已越界
    while pooled > 0
        && (pooled - 1)
            .checked_mul(stride)
            .is_none_or(|start| start >= input)
    {
        pooled -= 1;
    }
    (pooled > 0).then_some(pooled)
}

/// 2D 池化层
#[derive(Debug, Clone)]
pub struct PoolingLayer {
    param: LayerParameter,
    /// setup 时推导出的几何信息及输入形状
    geometry: Option<PoolGeometry>,
    bottom_shape: [usize; 4],
    /// 最近一次最大池化 forward 记录的最大值位置，与 top 同长
    max_indices: Option<Vec<usize>>,
    /// 最近一次 forward 是否已完成（平均池化的反向传播也以此为前提）
    forwarded: bool,
}

impl PoolingLayer {
    pub fn new(param: LayerParameter) -> Self {
        Self {
            param,
            geometry: None,
            bottom_shape: [0; 4],
            max_indices: None,
            forwarded: false,
        }
    }

    pub const fn param(&self) -> &LayerParameter {
        &self.param
    }

    /// setup 后的输出形状 [num, C, pooled_h, pooled_w]
    pub fn top_shape(&self) -> Option<[usize; 4]> {
        self.geometry.map(|g| {
            let [num, channels, _, _] = self.bottom_shape;
            [num, channels, g.pooled_height, g.pooled_width]
        })
    }

    /// 最近一次最大池化 forward 记录的最大值位置（展平的平面内索引 h * W + w）
    pub fn max_indices(&self) -> Option<&[usize]> {
        self.max_indices.as_deref()
    }

    fn geometry(&self) -> Result<PoolGeometry, LayerError> {
        self.geometry.ok_or_else(|| {
            LayerError::PreconditionViolation(format!("{}层尚未 setup", self.type_name()))
        })
    }
}

impl TraitLayer for PoolingLayer {
    fn type_name(&self) -> &'static str {
        "Pooling"
    }

    fn setup(&mut self, bottom: &[&Blob], top: &mut [&mut Blob]) -> Result<(), LayerError> {
        let name = self.type_name();
        let bottom = single_blob(name, "输入", bottom)?;
        let top = single_blob_mut(name, "输出", top)?;

        let LayerParameter {
            kernel_size,
            stride,
            ..
        } = self.param;
        if kernel_size == 0 {
            return Err(LayerError::InvalidConfiguration(
                "kernel_size须≥1".to_string(),
            ));
        }
        if stride == 0 {
            return Err(LayerError::InvalidConfiguration("stride须≥1".to_string()));
        }
        check_not_empty(name, bottom)?;

        let [num, channels, height, width] = bottom.shape();
        let (Some(pooled_height), Some(pooled_width)) = (
            pooled_size(height, kernel_size, stride),
            pooled_size(width, kernel_size, stride),
        ) else {
            return Err(LayerError::ShapeMismatch {
                expected: vec![num, channels, kernel_size, kernel_size],
                got: bottom.shape().to_vec(),
                message: format!(
                    "池化窗口{kernel_size}x{kernel_size}（步长{stride}）得不到有效的输出尺寸"
                ),
            });
        };

        let geometry = PoolGeometry {
            height,
            width,
            pooled_height,
            pooled_width,
            kernel_size,
            stride,
        };
        top.reshape(num, channels, pooled_height, pooled_width);

        self.geometry = Some(geometry);
        self.bottom_shape = bottom.shape();
        self.max_indices = None;
        self.forwarded = false;

        debug!(
            pool = ?self.param.pool,
            kernel_size,
            stride,
            bottom = ?self.bottom_shape,
            top = ?top.shape(),
            "池化层 setup 完成"
        );
        Ok(())
    }

    fn forward(
        &mut self,
        ctx: &mut Context,
        bottom: &[&Blob],
        top: &mut [&mut Blob],
    ) -> Result<(), LayerError> {
        let name = self.type_name();
        let bottom = single_blob(name, "输入", bottom)?;
        let top = single_blob_mut(name, "输出", top)?;
        let geometry = self.geometry()?;
        check_shape(bottom, self.bottom_shape, "池化层输入形状与 setup 时不一致，请重新 setup")?;
        let top_shape = self.top_shape().unwrap_or_default();
        check_shape(top, top_shape, "池化层输出形状与 setup 时不一致")?;

        trace!(backend = ?ctx.backend(), pool = ?self.param.pool, "池化层 forward");

        let input = bottom.data().data_as_slice();
        let output = top.data_mut();
        let (in_plane, out_plane) = (geometry.input_plane(), geometry.output_plane());

        match self.param.pool {
            PoolMethod::Max => {
                let mut indices = vec![0usize; output.len()];
                if ctx.is_parallel() {
                    output
                        .par_chunks_mut(out_plane)
                        .zip(indices.par_chunks_mut(out_plane))
                        .zip(input.par_chunks(in_plane))
                        .for_each(|((out, idx), x)| geometry.max_forward(x, out, idx));
                } else {
                    output
                        .chunks_mut(out_plane)
                        .zip(indices.chunks_mut(out_plane))
                        .zip(input.chunks(in_plane))
                        .for_each(|((out, idx), x)| geometry.max_forward(x, out, idx));
                }
                self.max_indices = Some(indices);
            }
            PoolMethod::Ave => {
                if ctx.is_parallel() {
                    output
                        .par_chunks_mut(out_plane)
                        .zip(input.par_chunks(in_plane))
                        .for_each(|(out, x)| geometry.ave_forward(x, out));
                } else {
                    output
                        .chunks_mut(out_plane)
                        .zip(input.chunks(in_plane))
                        .for_each(|(out, x)| geometry.ave_forward(x, out));
                }
                self.max_indices = None;
            }
        }
        self.forwarded = true;
        Ok(())
    }

    fn backward(
        &mut self,
        ctx: &mut Context,
        top: &[&Blob],
        propagate_down: bool,
        bottom: &mut [&mut Blob],
    ) -> Result<(), LayerError> {
        let name = self.type_name();
        let top = single_blob(name, "输出", top)?;
        let bottom = single_blob_mut(name, "输入", bottom)?;
        if !propagate_down {
            return Ok(());
        }
        let geometry = self.geometry()?;
        if !self.forwarded {
            return Err(LayerError::PreconditionViolation(
                "池化层 backward 之前须先 forward".to_string(),
            ));
        }
        check_shape(bottom, self.bottom_shape, "池化层 backward 的输入形状与最近一次 forward 不一致")?;
        let top_shape = self.top_shape().unwrap_or_default();
        check_shape(top, top_shape, "池化层 backward 的输出形状与 setup 时不一致")?;

        trace!(backend = ?ctx.backend(), pool = ?self.param.pool, "池化层 backward");

        let top_diff = top.diff().data_as_slice();
        let bottom_diff = bottom.diff_mut();
        let (in_plane, out_plane) = (geometry.input_plane(), geometry.output_plane());

        match self.param.pool {
            PoolMethod::Max => {
                let indices = self.max_indices.as_deref().ok_or_else(|| {
                    LayerError::PreconditionViolation("缺少最大值索引缓存".to_string())
                })?;
                if ctx.is_parallel() {
                    bottom_diff
                        .par_chunks_mut(in_plane)
                        .zip(top_diff.par_chunks(out_plane))
                        .zip(indices.par_chunks(out_plane))
                        .for_each(|((dx, dy), idx)| geometry.max_backward(dy, idx, dx));
                } else {
                    bottom_diff
                        .chunks_mut(in_plane)
                        .zip(top_diff.chunks(out_plane))
                        .zip(indices.chunks(out_plane))
                        .for_each(|((dx, dy), idx)| geometry.max_backward(dy, idx, dx));
                }
            }
            PoolMethod::Ave => {
                if ctx.is_parallel() {
                    bottom_diff
                        .par_chunks_mut(in_plane)
                        .zip(top_diff.par_chunks(out_plane))
                        .for_each(|(dx, dy)| geometry.ave_backward(dy, dx));
                } else {
                    bottom_diff
                        .chunks_mut(in_plane)
                        .zip(top_diff.chunks(out_plane))
                        .for_each(|(dx, dy)| geometry.ave_backward(dy, dx));
                }
            }
        }
        Ok(())
    }
}
