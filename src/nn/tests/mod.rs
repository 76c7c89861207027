/*
 * @Author       : 老董
 * @Date         : 2026-10-18
 * @Description  : nn 模块单元测试的公共设施
 */

use crate::nn::{Blob, LayerParameter};
use crate::tensor::Tensor;

/// 为顺序与并行两种后端各生成一个测试：`<name>_sequential` 与 `<name>_parallel`。
/// `$body`须为签名`fn(Backend) -> Result<(), LayerError>`的函数
macro_rules! test_both_backends {
    ($name:ident, $body:path) => {
        paste::paste! {
            #[test]
            fn [<$name _sequential>]() -> Result<(), $crate::nn::LayerError> {
                $body($crate::nn::Backend::Sequential)
            }

            #[test]
            fn [<$name _parallel>]() -> Result<(), $crate::nn::LayerError> {
                $body($crate::nn::Backend::Parallel)
            }
        }
    };
}

mod blob;
mod layer_dropout;

/// 安装输出到测试捕获区的日志订阅器，重复调用无害
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// 形状为 [2, 3, 6, 5]、全部元素为 1 的输入
fn constant_bottom() -> Blob {
    Blob::from_data(Tensor::full(1., &[2, 3, 6, 5]))
}

/// kernel_size = 3，stride = 2，其余取默认（dropout_ratio = 0.5）
fn pool_param() -> LayerParameter {
    LayerParameter::new().with_kernel_size(3).with_stride(2)
}

/// 单平面 [1, 1, h, w] 的 Blob
fn plane(data: &[f32], height: usize, width: usize) -> Blob {
    Blob::from_data(Tensor::new(data, &[1, 1, height, width]))
}
