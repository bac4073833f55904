//! 请求边界上的取消与超时控制

use crate::error::{ReflowError, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// 可在线程间共享的取消标记
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// 创建未取消的标记
    pub fn new() -> Self {
        Self::default()
    }

    /// 请求取消
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// 是否已请求取消
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// 单个转换请求的守卫
///
/// 流水线在每个阶段之间、每个成员之间调用 [`RequestGuard::check`]，
/// 一旦被取消或超时立即返回错误，已经做了一半的结果随调用栈一起丢弃。
#[derive(Debug, Clone)]
pub struct RequestGuard {
    started: Instant,
    timeout: Option<Duration>,
    cancel: CancelToken,
}

impl RequestGuard {
    /// 创建守卫
    pub fn new(timeout: Option<Duration>, cancel: CancelToken) -> Self {
        Self {
            started: Instant::now(),
            timeout,
            cancel,
        }
    }

    /// 不限时、不可取消的守卫
    pub fn unbounded() -> Self {
        Self::new(None, CancelToken::new())
    }

    /// 检查请求是否仍可继续
    pub fn check(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(ReflowError::Cancelled);
        }
        if let Some(timeout) = self.timeout {
            let elapsed = self.started.elapsed();
            if elapsed > timeout {
                return Err(ReflowError::Timeout {
                    elapsed_secs: elapsed.as_secs(),
                });
            }
        }
        Ok(())
    }
}

impl Default for RequestGuard {
    fn default() -> Self {
        Self::unbounded()
    }
}
