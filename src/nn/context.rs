/*
 * @Author       : 老董
 * @Date         : 2026-10-18
 * @Description  : 执行上下文：后端（顺序/并行）、阶段（训练/评估）与随机数源
 *
 * 上下文以参数形式显式传入各层的 forward/backward，而不是全局状态，
 * 因此同一进程内可以同时跑多条互不干扰的管线。
 * 约定：一次 forward/backward 过程中不修改后端与阶段；
 * 同一条管线中途切换后端不保证结果正确。
 */

use super::LayerError;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 计算后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// 单线程逐元素计算
    #[default]
    Sequential,
    /// 使用 Rayon 线程池，对互不相关的输出并行计算；结果与顺序后端完全一致
    Parallel,
}

/// 运行阶段，影响 Dropout 的行为
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Train,
    Eval,
}

/// 上下文的可序列化配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub backend: Backend,
    pub phase: Phase,
    /// 为 None 时从系统熵源初始化随机数生成器
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl ContextConfig {
    /// 从 JSON 读取，未给出的字段取默认值
    pub fn from_json(json: &str) -> Result<Self, LayerError> {
        Ok(serde_json::from_str(json)?)
    }
}

pub struct Context {
    backend: Backend,
    phase: Phase,
    seed: Option<u64>,
    rng: StdRng,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("backend", &self.backend)
            .field("phase", &self.phase)
            .field("seed", &self.seed)
            .finish()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    // ========== 创建 ==========

    /// 顺序后端 + 训练阶段，随机数来自系统熵源
    pub fn new() -> Self {
        Self {
            backend: Backend::default(),
            phase: Phase::default(),
            seed: None,
            rng: StdRng::from_entropy(),
        }
    }

    /// 创建一个带固定种子的上下文（确保可重复性）
    pub fn new_with_seed(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            rng: StdRng::seed_from_u64(seed),
            ..Self::new()
        }
    }

    pub fn from_config(config: &ContextConfig) -> Self {
        let mut ctx = match config.seed {
            Some(seed) => Self::new_with_seed(seed),
            None => Self::new(),
        };
        ctx.backend = config.backend;
        ctx.phase = config.phase;
        ctx
    }

    // ========== 后端 ==========

    pub const fn backend(&self) -> Backend {
        self.backend
    }

    pub const fn set_backend(&mut self, backend: Backend) {
        self.backend = backend;
    }

    pub const fn is_parallel(&self) -> bool {
        matches!(self.backend, Backend::Parallel)
    }

    // ========== 阶段 ==========

    pub const fn phase(&self) -> Phase {
        self.phase
    }

    pub const fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub const fn set_train_mode(&mut self) {
        self.phase = Phase::Train;
    }

    pub const fn set_eval_mode(&mut self) {
        self.phase = Phase::Eval;
    }

    pub const fn is_train_mode(&self) -> bool {
        matches!(self.phase, Phase::Train)
    }

    // ========== 随机数 ==========

    /// 设置/重置随机种子，随机序列从头开始
    pub fn set_seed(&mut self, seed: u64) {
        self.seed = Some(seed);
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// 检查上下文是否有固定种子
    pub const fn has_seed(&self) -> bool {
        self.seed.is_some()
    }

    pub const fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}
