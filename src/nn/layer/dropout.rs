/*
 * @Author       : 老董
 * @Date         : 2026-10-18
 * @Description  : Dropout 层
 *
 * 训练阶段：每个激活值独立地以 dropout_ratio 的概率置零，保留下来的乘以 scale = 1 / (1 - ratio)，
 *          掩码留给紧随其后的 backward 使用；
 * 评估阶段：原样透传。
 * 掩码总是按行优先顺序、单线程地从上下文的随机数生成器抽取，
 * 因此同一种子在顺序与并行后端下得到同一掩码；并行后端只并行“应用掩码”这一步。
 * 支持输入输出为同一个 Blob（原地计算）。
 */

use super::{TraitLayer, check_not_empty, check_shape, single_blob, single_blob_mut};
use crate::nn::{Blob, Context, LayerError, LayerParameter};
use rand::distributions::{Bernoulli, Distribution};
use rayon::prelude::*;
use tracing::{debug, trace};

/// 最近一次训练阶段 forward 生成的掩码，true 表示保留
#[derive(Debug, Clone, PartialEq, Eq)]
struct DropoutMask {
    keep: Vec<bool>,
    shape: [usize; 4],
}

#[derive(Debug, Clone)]
pub struct DropoutLayer {
    param: LayerParameter,
    threshold: f32,
    scale: f32,
    /// setup 时记录的输入形状，None 表示尚未 setup
    bottom_shape: Option<[usize; 4]>,
    mask: Option<DropoutMask>,
}

impl DropoutLayer {
    pub fn new(param: LayerParameter) -> Self {
        Self {
            param,
            threshold: 0.,
            scale: 1.,
            bottom_shape: None,
            mask: None,
        }
    }

    pub const fn param(&self) -> &LayerParameter {
        &self.param
    }

    /// 保留下来的激活值的放大倍数 1 / (1 - dropout_ratio)，setup 后有效
    pub const fn scale(&self) -> f32 {
        self.scale
    }

    /// 最近一次训练阶段 forward 的掩码
    pub fn mask(&self) -> Option<&[bool]> {
        self.mask.as_ref().map(|m| m.keep.as_slice())
    }

    fn validate_ratio(&mut self) -> Result<(), LayerError> {
        let ratio = self.param.dropout_ratio;
        if !(0.0..1.0).contains(&ratio) {
            return Err(LayerError::InvalidConfiguration(format!(
                "dropout_ratio须在[0, 1)内，得到{ratio}"
            )));
        }
        self.threshold = ratio;
        self.scale = 1. / (1. - ratio);
        Ok(())
    }

    fn setup_shape(&mut self, bottom: &Blob) -> Result<(), LayerError> {
        self.validate_ratio()?;
        check_not_empty(self.type_name(), bottom)?;
        self.bottom_shape = Some(bottom.shape());
        self.mask = None;
        debug!(
            dropout_ratio = self.threshold,
            scale = self.scale,
            shape = ?bottom.shape(),
            "Dropout 层 setup 完成"
        );
        Ok(())
    }

    fn expect_setup_shape(&self, blob: &Blob) -> Result<(), LayerError> {
        let shape = self.bottom_shape.ok_or_else(|| {
            LayerError::PreconditionViolation(format!("{}层尚未 setup", self.type_name()))
        })?;
        check_shape(blob, shape, "Dropout 层的形状与 setup 时不一致，请重新 setup")
    }

    /// 训练阶段：抽取新掩码并原地作用于`values`；评估阶段：什么也不做
    fn forward_values(
        &mut self,
        ctx: &mut Context,
        shape: [usize; 4],
        values: &mut [f32],
    ) -> Result<(), LayerError> {
        if !ctx.is_train_mode() {
            self.mask = None;
            return Ok(());
        }
        let keep_prob = f64::from(1. - self.threshold);
        let bernoulli = Bernoulli::new(keep_prob).map_err(|e| {
            LayerError::InvalidConfiguration(format!("保留概率{keep_prob}无效：{e}"))
        })?;
        let keep: Vec<bool> = bernoulli
            .sample_iter(ctx.rng_mut())
            .take(values.len())
            .collect();
        apply_mask(ctx.is_parallel(), &keep, self.scale, values);
        self.mask = Some(DropoutMask { keep, shape });
        Ok(())
    }

    /// 训练阶段：以最近一次 forward 的掩码原地作用于梯度；评估阶段：梯度透传
    fn backward_values(
        &self,
        ctx: &Context,
        shape: [usize; 4],
        diff: &mut [f32],
    ) -> Result<(), LayerError> {
        if !ctx.is_train_mode() {
            return Ok(());
        }
        let mask = self.mask.as_ref().ok_or_else(|| {
            LayerError::PreconditionViolation(
                "Dropout 层 backward 之前须先在训练阶段 forward".to_string(),
            )
        })?;
        if mask.shape != shape {
            return Err(LayerError::ShapeMismatch {
                expected: mask.shape.to_vec(),
                got: shape.to_vec(),
                message: "Dropout 层 backward 的形状与最近一次 forward 的掩码不一致".to_string(),
            });
        }
        apply_mask(ctx.is_parallel(), &mask.keep, self.scale, diff);
        Ok(())
    }
}

/// 保留的乘以`scale`，丢弃的置零
fn apply_mask(parallel: bool, keep: &[bool], scale: f32, values: &mut [f32]) {
    let op = |(v, &k): (&mut f32, &bool)| *v = if k { *v * scale } else { 0. };
    if parallel {
        values.par_iter_mut().zip(keep.par_iter()).for_each(op);
    } else {
        values.iter_mut().zip(keep).for_each(op);
    }
}

impl TraitLayer for DropoutLayer {
    fn type_name(&self) -> &'static str {
        "Dropout"
    }

    fn setup(&mut self, bottom: &[&Blob], top: &mut [&mut Blob]) -> Result<(), LayerError> {
        let name = self.type_name();
        let bottom = single_blob(name, "输入", bottom)?;
        let top = single_blob_mut(name, "输出", top)?;
        self.setup_shape(bottom)?;
        top.reshape_like(bottom);
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
        self.expect_setup_shape(bottom)?;
        self.expect_setup_shape(top)?;
        trace!(backend = ?ctx.backend(), phase = ?ctx.phase(), "Dropout 层 forward");

        top.data_mut().copy_from_slice(bottom.data().data_as_slice());
        let shape = top.shape();
        self.forward_values(ctx, shape, top.data_mut())
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
        self.expect_setup_shape(top)?;
        self.expect_setup_shape(bottom)?;
        trace!(backend = ?ctx.backend(), phase = ?ctx.phase(), "Dropout 层 backward");

        bottom.diff_mut().copy_from_slice(top.diff().data_as_slice());
        let shape = bottom.shape();
        self.backward_values(ctx, shape, bottom.diff_mut())
    }

    fn supports_in_place(&self) -> bool {
        true
    }

    fn setup_in_place(&mut self, blob: &mut Blob) -> Result<(), LayerError> {
        self.setup_shape(blob)
    }

    fn forward_in_place(&mut self, ctx: &mut Context, blob: &mut Blob) -> Result<(), LayerError> {
        self.expect_setup_shape(blob)?;
        trace!(backend = ?ctx.backend(), phase = ?ctx.phase(), "Dropout 层原地 forward");
        let shape = blob.shape();
        self.forward_values(ctx, shape, blob.data_mut())
    }

    fn backward_in_place(
        &mut self,
        ctx: &mut Context,
        propagate_down: bool,
        blob: &mut Blob,
    ) -> Result<(), LayerError> {
        if !propagate_down {
            return Ok(());
        }
        self.expect_setup_shape(blob)?;
        trace!(backend = ?ctx.backend(), phase = ?ctx.phase(), "Dropout 层原地 backward");
        let shape = blob.shape();
        self.backward_values(ctx, shape, blob.diff_mut())
    }
}
