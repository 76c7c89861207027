/*
 * @Author       : 老董
 * @Date         : 2026-10-18
 * @Description  : 负责神经网络层（池化、Dropout）及其串联管线
 */

mod blob;
mod context;
mod error;
pub mod layer;
mod param;
mod pipeline;

pub use blob::Blob;
pub use context::{Backend, Context, ContextConfig, Phase};
pub use error::LayerError;
pub use layer::{DropoutLayer, Layer, PoolingLayer, TraitLayer};
pub use param::{LayerParameter, PoolMethod};
pub use pipeline::Sequential;

#[cfg(test)]
mod tests;
