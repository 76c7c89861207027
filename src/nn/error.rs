/*
 * @Author       : 老董
 * @Date         : 2026-10-18
 * @Description  : 层（Layer）操作的错误类型
 *
 * 所有错误都在 setup/forward/backward 调用处同步返回，本库不做任何重试：
 * 没有 I/O，相同的配置与输入必然得到相同的错误。
 */

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum LayerError {
    /// 配置非法（kernel_size/stride 非正、dropout_ratio 越界、输入输出个数不对等），
    /// 在 setup 时发现，该层实例不可再用
    #[error("配置无效：{0}")]
    InvalidConfiguration(String),

    /// 输入为空或前后层形状不一致
    #[error("形状不匹配：预期{expected:?}，实际得到{got:?}。{message}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
        message: String,
    },

    /// 调用顺序错误，如未 forward 就 backward，属于使用方的编程错误
    #[error("前置条件不满足：{0}")]
    PreconditionViolation(String),

    /// JSON 配置解析失败
    #[error("配置解析失败：{0}")]
    ConfigParse(String),
}

impl From<serde_json::Error> for LayerError {
    fn from(err: serde_json::Error) -> Self {
        Self::ConfigParse(err.to_string())
    }
}
