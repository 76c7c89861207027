//! # Pool Dropout
//!
//! 用纯 rust 实现的最大池化层与 Dropout 层，以及把二者串联起来的管线。
//! 两种层都支持顺序与并行（Rayon）两种后端，且两种后端的计算结果一致；
//! 执行后端、训练/评估阶段与随机种子都放在显式传入的[`nn::Context`]中。
//!

pub mod errors;
pub mod nn;
pub mod tensor;
pub mod utils;
