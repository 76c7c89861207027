/*
 * @Author       : 老董
 * @Date         : 2026-10-18
 * @Description  : 层参数（LayerParameter）
 *                 同一份参数可同时交给池化层与 Dropout 层，各取所需；
 *                 层在 setup 时读取并校验，之后不再变化
 */

use super::LayerError;
use serde::{Deserialize, Serialize};

/// 池化方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolMethod {
    #[default]
    Max,
    Ave,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerParameter {
    /// 池化窗口边长（正方形窗口），须由使用者显式给出
    pub kernel_size: usize,
    /// 相邻窗口的步长
    pub stride: usize,
    pub pool: PoolMethod,
    /// 每个激活值被置零的概率，须在[0, 1)内
    pub dropout_ratio: f32,
}

impl Default for LayerParameter {
    fn default() -> Self {
        Self {
            kernel_size: 0,
            stride: 1,
            pool: PoolMethod::Max,
            dropout_ratio: 0.5,
        }
    }
}

impl LayerParameter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 JSON 读取参数，未给出的字段取默认值
    ///
    /// ```
    /// use pool_dropout::nn::LayerParameter;
    ///
    /// let param = LayerParameter::from_json(r#"{"kernel_size": 3, "stride": 2}"#).unwrap();
    /// assert_eq!(param.kernel_size, 3);
    /// assert_eq!(param.dropout_ratio, 0.5);
    /// ```
    pub fn from_json(json: &str) -> Result<Self, LayerError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, LayerError> {
        Ok(serde_json::to_string(self)?)
    }

    pub const fn with_kernel_size(mut self, kernel_size: usize) -> Self {
        self.kernel_size = kernel_size;
        self
    }

    pub const fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    pub const fn with_pool(mut self, pool: PoolMethod) -> Self {
        self.pool = pool;
        self
    }

    pub const fn with_dropout_ratio(mut self, dropout_ratio: f32) -> Self {
        self.dropout_ratio = dropout_ratio;
        self
    }
}
