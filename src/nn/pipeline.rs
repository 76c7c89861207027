/*
 * @Author       : 老董
 * @Date         : 2026-10-18
 * @Description  : 串联管线（Sequential）：按链式法则依次驱动多个层
 *
 * - setup / forward 按添加顺序执行，backward 逆序执行
 * - 支持原地计算的层（如 Dropout）直接复用前一层的输出 Blob，不新建 Blob；
 *   第一层即便支持原地计算也不复用，以免覆盖管线输入
 * - blobs[0] 为管线输入，最后一个 Blob 为管线输出
 */

use super::layer::{Layer, TraitLayer};
use super::{Blob, Context, LayerError};
use tracing::debug;

#[derive(Debug, Clone)]
struct Stage {
    layer: Layer,
    bottom: usize,
    top: usize,
}

impl Stage {
    const fn is_in_place(&self) -> bool {
        self.bottom == self.top
    }
}

#[derive(Debug, Clone)]
pub struct Sequential {
    stages: Vec<Stage>,
    blobs: Vec<Blob>,
    is_setup: bool,
}

impl Sequential {
    pub fn new(input: Blob) -> Self {
        Self {
            stages: Vec::new(),
            blobs: vec![input],
            is_setup: false,
        }
    }

    /// 追加一层。追加后需重新`setup`
    pub fn push(&mut self, layer: impl Into<Layer>) -> &mut Self {
        let layer = layer.into();
        let bottom = self.blobs.len() - 1;
        let top = if layer.supports_in_place() && !self.stages.is_empty() {
            bottom
        } else {
            self.blobs.push(Blob::default());
            bottom + 1
        };
        self.stages.push(Stage { layer, bottom, top });
        self.is_setup = false;
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn layer(&self, index: usize) -> Option<&Layer> {
        self.stages.get(index).map(|stage| &stage.layer)
    }

    pub fn input(&self) -> &Blob {
        &self.blobs[0]
    }

    /// 修改输入的值；若改变了形状，需重新`setup`
    pub fn input_mut(&mut self) -> &mut Blob {
        &mut self.blobs[0]
    }

    pub fn output(&self) -> &Blob {
        &self.blobs[self.blobs.len() - 1]
    }

    /// 一般用于在 backward 前写入输出的梯度
    pub fn output_mut(&mut self) -> &mut Blob {
        let last = self.blobs.len() - 1;
        &mut self.blobs[last]
    }

    /// 全部 Blob，[0] 为输入
    pub fn blobs(&self) -> &[Blob] {
        &self.blobs
    }

    /// 任一层 setup 失败时管线保持未 setup 状态
    pub fn setup(&mut self) -> Result<(), LayerError> {
        self.is_setup = false;
        for stage in &mut self.stages {
            if stage.is_in_place() {
                stage.layer.setup_in_place(&mut self.blobs[stage.top])?;
            } else {
                let (lower, upper) = self.blobs.split_at_mut(stage.top);
                stage.layer.setup(&[&lower[stage.bottom]], &mut [&mut upper[0]])?;
            }
            debug!(
                layer = stage.layer.type_name(),
                in_place = stage.is_in_place(),
                top = ?self.blobs[stage.top].shape(),
                "管线 setup"
            );
        }
        self.is_setup = true;
        Ok(())
    }

    /// 依次 forward，返回管线输出
    pub fn forward(&mut self, ctx: &mut Context) -> Result<&Blob, LayerError> {
        self.ensure_setup()?;
        for stage in &mut self.stages {
            if stage.is_in_place() {
                stage.layer.forward_in_place(ctx, &mut self.blobs[stage.top])?;
            } else {
                let (lower, upper) = self.blobs.split_at_mut(stage.top);
                stage
                    .layer
                    .forward(ctx, &[&lower[stage.bottom]], &mut [&mut upper[0]])?;
            }
        }
        Ok(self.output())
    }

    /// 逆序 backward。输出的梯度须事先写入`output_mut().diff_mut()`；
    /// `propagate_to_input`控制是否计算管线输入的梯度
    pub fn backward(
        &mut self,
        ctx: &mut Context,
        propagate_to_input: bool,
    ) -> Result<(), LayerError> {
        self.ensure_setup()?;
        for stage in self.stages.iter_mut().rev() {
            let propagate_down = stage.bottom != 0 || propagate_to_input;
            if stage.is_in_place() {
                stage
                    .layer
                    .backward_in_place(ctx, propagate_down, &mut self.blobs[stage.top])?;
            } else {
                let (lower, upper) = self.blobs.split_at_mut(stage.top);
                stage.layer.backward(
                    ctx,
                    &[&upper[0]],
                    propagate_down,
                    &mut [&mut lower[stage.bottom]],
                )?;
            }
        }
        Ok(())
    }

    fn ensure_setup(&self) -> Result<(), LayerError> {
        if self.is_setup {
            Ok(())
        } else {
            Err(LayerError::PreconditionViolation(
                "管线须先 setup 再 forward/backward".to_string(),
            ))
        }
    }
}
