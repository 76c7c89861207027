/*
 * @Author       : 老董
 * @Date         : 2026-10-18
 * @Description  : 层（Layer）的统一接口
 *
 * 每个层都只有三个动作：
 * - setup：读取并校验参数，推导输出形状，调整输出 Blob
 * - forward：由 bottom 的 data 计算 top 的 data
 * - backward：由 top 的 diff 计算 bottom 的 diff
 * 输入/输出都以 Blob 引用的有序列表传入，本库的两种层都要求恰好 1 个输入、1 个输出。
 * 层内部缓存（池化的最大值位置、Dropout 的掩码）只对最近一次 forward 有效。
 */

mod dropout;
mod pooling;

pub use dropout::DropoutLayer;
pub use pooling::PoolingLayer;

use super::{Blob, Context, LayerError};
use enum_dispatch::enum_dispatch;

#[enum_dispatch]
#[derive(Debug, Clone)]
pub enum Layer {
    Pooling(PoolingLayer),
    Dropout(DropoutLayer),
}

#[enum_dispatch(Layer)]
pub trait TraitLayer {
    fn type_name(&self) -> &'static str;

    fn setup(&mut self, bottom: &[&Blob], top: &mut [&mut Blob]) -> Result<(), LayerError>;

    fn forward(
        &mut self,
        ctx: &mut Context,
        bottom: &[&Blob],
        top: &mut [&mut Blob],
    ) -> Result<(), LayerError>;

    /// `propagate_down`为false时不计算、也不清零 bottom 的 diff。
    /// 前置条件：此前已对同形状的输入调用过 forward，否则返回`PreconditionViolation`
    fn backward(
        &mut self,
        ctx: &mut Context,
        top: &[&Blob],
        propagate_down: bool,
        bottom: &mut [&mut Blob],
    ) -> Result<(), LayerError>;

    /// 是否支持输入输出为同一个 Blob（原地计算）
    fn supports_in_place(&self) -> bool {
        false
    }

    fn setup_in_place(&mut self, _blob: &mut Blob) -> Result<(), LayerError> {
        Err(self.in_place_unsupported())
    }

    fn forward_in_place(&mut self, _ctx: &mut Context, _blob: &mut Blob) -> Result<(), LayerError> {
        Err(self.in_place_unsupported())
    }

    fn backward_in_place(
        &mut self,
        _ctx: &mut Context,
        _propagate_down: bool,
        _blob: &mut Blob,
    ) -> Result<(), LayerError> {
        Err(self.in_place_unsupported())
    }

    fn in_place_unsupported(&self) -> LayerError {
        LayerError::InvalidConfiguration(format!("{}层不支持原地计算", self.type_name()))
    }
}

// ========== 各层共用的小工具 ==========

/// 取出列表中唯一的只读 Blob，`role`用于报错（如"输入"）
pub(super) fn single_blob<'a>(
    layer: &str,
    role: &str,
    blobs: &'a [&Blob],
) -> Result<&'a Blob, LayerError> {
    match blobs {
        [blob] => Ok(*blob),
        _ => Err(LayerError::InvalidConfiguration(format!(
            "{layer}层需要恰好1个{role}，得到{}个",
            blobs.len()
        ))),
    }
}

/// 取出列表中唯一的可变 Blob
pub(super) fn single_blob_mut<'a>(
    layer: &str,
    role: &str,
    blobs: &'a mut [&mut Blob],
) -> Result<&'a mut Blob, LayerError> {
    let len = blobs.len();
    match blobs {
        [blob] => Ok(&mut **blob),
        _ => Err(LayerError::InvalidConfiguration(format!(
            "{layer}层需要恰好1个{role}，得到{len}个"
        ))),
    }
}

/// 校验 Blob 形状与 setup 时记录的一致
pub(super) fn check_shape(
    blob: &Blob,
    expected: [usize; 4],
    message: impl Into<String>,
) -> Result<(), LayerError> {
    if blob.shape() == expected {
        Ok(())
    } else {
        Err(LayerError::ShapeMismatch {
            expected: expected.to_vec(),
            got: blob.shape().to_vec(),
            message: message.into(),
        })
    }
}

/// setup 时拒绝空输入
pub(super) fn check_not_empty(layer: &str, blob: &Blob) -> Result<(), LayerError> {
    if blob.count() == 0 {
        return Err(LayerError::ShapeMismatch {
            expected: vec![],
            got: blob.shape().to_vec(),
            message: format!("{layer}层的输入不能为空"),
        });
    }
    Ok(())
}
