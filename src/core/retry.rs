//! 重试预算与迭代计数
//!
//! ExecutionConfig 为单次 run 的硬上限；IterationState 由编排循环独占；
//! RetryPolicy 只做纯计算（无 I/O），决定某次失败后能否重试。

use serde::Deserialize;

/// 单次 run 的执行上限（三项均为硬上限）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ExecutionConfig {
    /// 同一步骤内允许的最大重试次数
    #[serde(default = "default_limit")]
    pub max_retries_per_step: u32,
    /// 整个 run 累计允许的最大重试次数
    #[serde(default = "default_limit")]
    pub total_max_retries: u32,
    /// 最大迭代次数（Deciding -> ToolDispatch 成功一次算一轮；失败重试不计入）
    #[serde(default = "default_limit")]
    pub max_iterations: u32,
}

fn default_limit() -> u32 {
    5
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_retries_per_step: default_limit(),
            total_max_retries: default_limit(),
            max_iterations: default_limit(),
        }
    }
}

impl ExecutionConfig {
    pub fn new(max_retries_per_step: u32, total_max_retries: u32, max_iterations: u32) -> Self {
        Self {
            max_retries_per_step,
            total_max_retries,
            max_iterations,
        }
    }
}

/// 循环内部状态，run 返回时销毁
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IterationState {
    pub iteration_index: u32,
    pub step_retry_count: u32,
    pub total_retry_count: u32,
}

impl IterationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// 一轮迭代成功完成：进入下一轮，步骤重试计数清零（累计计数不清零）
    pub fn complete_iteration(self) -> Self {
        Self {
            iteration_index: self.iteration_index + 1,
            step_retry_count: 0,
            ..self
        }
    }

    /// 模型决策成功：步骤重试计数清零，迭代数不变
    pub fn complete_step(self) -> Self {
        Self {
            step_retry_count: 0,
            ..self
        }
    }

    pub fn iterations_exhausted(&self, config: &ExecutionConfig) -> bool {
        self.iteration_index >= config.max_iterations
    }
}

/// 重试簿记：判断预算、记录一次重试
#[derive(Debug, Default, Clone, Copy)]
pub struct RetryPolicy;

impl RetryPolicy {
    pub fn new() -> Self {
        Self
    }

    pub fn can_retry_step(&self, state: &IterationState, config: &ExecutionConfig) -> bool {
        state.step_retry_count < config.max_retries_per_step
    }

    pub fn can_retry_total(&self, state: &IterationState, config: &ExecutionConfig) -> bool {
        state.total_retry_count < config.total_max_retries
    }

    pub fn can_retry(&self, state: &IterationState, config: &ExecutionConfig) -> bool {
        self.can_retry_step(state, config) && self.can_retry_total(state, config)
    }

    pub fn record_retry(&self, state: IterationState) -> IterationState {
        IterationState {
            step_retry_count: state.step_retry_count + 1,
            total_retry_count: state.total_retry_count + 1,
            ..state
        }
    }
}
