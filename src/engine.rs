//! 同步引擎 —— brewfile 期望状态与实际安装集合的调和
//!
//! 引擎只输出纯数据（SyncDiff / OperationResult / SyncState），
//! 不接触任何渲染状态；所有失败都折叠为结果值，不向上抛出。

use crate::brew::{BrewClient, OperationResult, Package, SyncDiff};
use crate::brewfile::Brewfile;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// 进入子流程前就能拦截的失败（不会启动任何子进程）
#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("未找到 brewfile，请在 Brewfile 面板按 c 创建")]
    BrewfileMissing,
    #[error("读取 brewfile 失败: {0}")]
    BrewfileRead(String),
    #[error("没有选中任何包")]
    NothingSelected,
    #[error("卸载是破坏性操作，不支持全选，请逐个选择")]
    SelectAllForbidden,
}

// ========== 操作锁 ==========

/// 进程级操作锁：同一时刻最多一个变更操作在途
///
/// 通过 try_acquire 拿到守卫，守卫 Drop 时自动释放，
/// 任何失败路径都不会留下卡死的锁。
#[derive(Debug, Clone, Default)]
pub struct OperationLock {
    held: Arc<AtomicBool>,
}

impl OperationLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }

    /// 尝试获取锁；已被持有时返回 None（调用方静默忽略，不排队）
    pub fn try_acquire(&self) -> Option<OperationGuard> {
        if self
            .held
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            Some(OperationGuard {
                held: Arc::clone(&self.held),
            })
        } else {
            None
        }
    }
}

#[derive(Debug)]
pub struct OperationGuard {
    held: Arc<AtomicBool>,
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        self.held.store(false, Ordering::SeqCst);
    }
}

// ========== 同步状态机 ==========

/// brewfile 应用流程对外暴露的状态标签
#[derive(Debug, Clone, PartialEq)]
pub enum SyncState {
    Idle,
    /// 差异已算出，等待用户再次触发确认
    AwaitingConfirmation(SyncDiff),
    Applying,
}

// ========== 引擎 ==========

#[derive(Debug, Clone)]
pub struct Engine {
    brew: BrewClient,
    brewfile: Brewfile,
    pub lock: OperationLock,
}

impl Engine {
    pub fn new(brew: BrewClient, brewfile: Brewfile) -> Self {
        Self {
            brew,
            brewfile,
            lock: OperationLock::new(),
        }
    }

    pub fn brew(&self) -> &BrewClient {
        &self.brew
    }

    pub fn brewfile(&self) -> &Brewfile {
        &self.brewfile
    }

    /// Checking 阶段：读取实际安装集合并计算差异
    ///
    /// 无 brewfile 时直接短路返回引导信息，不进入检查。
    pub fn check_apply(&self) -> Result<SyncDiff, EngineError> {
        if !self.brewfile.exists() {
            return Err(EngineError::BrewfileMissing);
        }
        let installed = self.brew.installed_packages();
        self.brewfile
            .diff_against_installed(&installed)
            .map_err(|e| EngineError::BrewfileRead(e.to_string()))
    }

    /// Applying 阶段：先装后卸，严格顺序执行，聚合结果
    pub fn apply_diff(&self, diff: &SyncDiff) -> OperationResult {
        let mut installed = Vec::new();
        let mut removed = Vec::new();
        let mut failures: Vec<String> = Vec::new();

        for name in &diff.to_install {
            let result = self.brew.install(name);
            if result.success {
                installed.push(name.clone());
            } else {
                failures.push(result.message);
            }
        }
        for name in &diff.to_remove {
            let result = self.brew.uninstall(name);
            if result.success {
                removed.push(name.clone());
            } else {
                failures.push(result.message);
            }
        }

        let success = failures.is_empty();
        let message = if success {
            let mut parts = Vec::new();
            if !installed.is_empty() {
                parts.push(format!("安装 {}", installed.join(", ")));
            }
            if !removed.is_empty() {
                parts.push(format!("卸载 {}", removed.join(", ")));
            }
            if parts.is_empty() {
                "同步完成：无变更".to_string()
            } else {
                format!("同步完成：{}", parts.join("；"))
            }
        } else {
            failures.join("；")
        };

        OperationResult {
            success,
            message,
            installed,
            removed,
        }
    }

    /// 批量安装（搜索面板多选后触发）
    pub fn install_packages(&self, names: &[String]) -> Result<OperationResult, EngineError> {
        if names.is_empty() {
            return Err(EngineError::NothingSelected);
        }
        let mut installed = Vec::new();
        let mut all_ok = true;
        for name in names {
            let result = self.brew.install(name);
            if result.success {
                installed.push(name.clone());
            } else {
                all_ok = false;
                log::warn!("{}", result.message);
            }
        }
        let message = if all_ok {
            format!("成功安装 {} 个包", installed.len())
        } else {
            "部分包安装失败".to_string()
        };
        let mut result = if all_ok {
            OperationResult::ok(message)
        } else {
            OperationResult::fail(message)
        };
        result.installed = installed;
        Ok(result)
    }

    /// 批量卸载；拒绝"全选"快捷方式
    pub fn uninstall_packages(
        &self,
        names: &[String],
        select_all: bool,
    ) -> Result<OperationResult, EngineError> {
        if select_all {
            return Err(EngineError::SelectAllForbidden);
        }
        if names.is_empty() {
            return Err(EngineError::NothingSelected);
        }
        let mut removed = Vec::new();
        let mut all_ok = true;
        for name in names {
            let result = self.brew.uninstall(name);
            if result.success {
                removed.push(name.clone());
            } else {
                all_ok = false;
                log::warn!("{}", result.message);
            }
        }
        let message = if all_ok {
            format!("成功卸载 {} 个包", removed.len())
        } else {
            "部分包卸载失败".to_string()
        };
        let mut result = if all_ok {
            OperationResult::ok(message)
        } else {
            OperationResult::fail(message)
        };
        result.removed = removed;
        Ok(result)
    }

    /// 更新选中的包（全选时退化为 brew upgrade 整体更新）
    pub fn upgrade_packages(
        &self,
        names: &[String],
        select_all: bool,
    ) -> Result<OperationResult, EngineError> {
        if select_all {
            return Ok(self.brew.upgrade_all());
        }
        if names.is_empty() {
            return Err(EngineError::NothingSelected);
        }
        let mut all_ok = true;
        let mut count = 0usize;
        for name in names {
            let result = self.brew.upgrade(name);
            if result.success {
                count += 1;
            } else {
                all_ok = false;
                log::warn!("{}", result.message);
            }
        }
        if all_ok {
            Ok(OperationResult::ok(format!("成功更新 {} 个包", count)))
        } else {
            Ok(OperationResult::fail("部分包更新失败"))
        }
    }

    /// 用当前安装集合新建 brewfile
    pub fn create_brewfile(&self, installed: &[Package]) -> OperationResult {
        match self.brewfile.create_from(installed) {
            Ok(count) => OperationResult::ok(format!("已创建 brewfile（{} 个包）", count)),
            Err(e) => OperationResult::fail(format!("创建 brewfile 失败: {}", e)),
        }
    }

    /// 把 brewfile 同步为当前安装集合
    pub fn update_brewfile(&self, installed: &[Package]) -> OperationResult {
        match self.brewfile.update_from(installed) {
            Ok(count) => OperationResult::ok(format!("brewfile 已更新（{} 个包）", count)),
            Err(e) => OperationResult::fail(format!("更新 brewfile 失败: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// 用 /usr/bin/true 或 /usr/bin/false 顶替 brew，
    /// 让任何子命令都确定性地成功/失败。
    fn engine_with(command: &str, dir: &std::path::Path) -> Engine {
        Engine::new(
            BrewClient::new(command),
            Brewfile::new(dir.join("Brewfile")),
        )
    }

    #[test]
    fn lock_is_mutually_exclusive() {
        let lock = OperationLock::new();
        let guard = lock.try_acquire().expect("首次获取应成功");
        assert!(lock.is_held());
        // 持有期间第二次获取被拒绝
        assert!(lock.try_acquire().is_none());
        drop(guard);
        assert!(!lock.is_held());
        assert!(lock.try_acquire().is_some());
    }

    #[test]
    fn lock_clones_share_state() {
        let lock = OperationLock::new();
        let view = lock.clone();
        let _guard = lock.try_acquire().unwrap();
        assert!(view.is_held());
        assert!(view.try_acquire().is_none());
    }

    #[test]
    fn check_apply_requires_brewfile() {
        let dir = tempdir().unwrap();
        let engine = engine_with("true", dir.path());
        assert_eq!(engine.check_apply().unwrap_err(), EngineError::BrewfileMissing);
    }

    #[test]
    fn apply_diff_aggregates_success() {
        let dir = tempdir().unwrap();
        let engine = engine_with("true", dir.path());
        let diff = SyncDiff {
            to_install: vec!["curl".to_string()],
            to_remove: vec!["htop".to_string()],
        };
        let result = engine.apply_diff(&diff);
        assert!(result.success);
        assert_eq!(result.installed, vec!["curl"]);
        assert_eq!(result.removed, vec!["htop"]);
        // 结果消息点名列出涉及的包
        assert!(result.message.contains("curl"));
        assert!(result.message.contains("htop"));
    }

    #[test]
    fn apply_diff_aggregates_failure() {
        let dir = tempdir().unwrap();
        let engine = engine_with("false", dir.path());
        let diff = SyncDiff {
            to_install: vec!["curl".to_string()],
            to_remove: vec![],
        };
        let result = engine.apply_diff(&diff);
        assert!(!result.success);
        assert!(result.installed.is_empty());
    }

    #[test]
    fn empty_diff_applies_to_nothing() {
        let dir = tempdir().unwrap();
        let engine = engine_with("false", dir.path());
        // 空差异下不执行任何子命令，即使底下的 brew 必定失败也成功
        let result = engine.apply_diff(&SyncDiff::default());
        assert!(result.success);
        assert!(result.installed.is_empty());
        assert!(result.removed.is_empty());
        assert!(result.message.contains("无变更"));
    }

    #[test]
    fn uninstall_refuses_select_all() {
        let dir = tempdir().unwrap();
        let engine = engine_with("true", dir.path());
        let err = engine
            .uninstall_packages(&["wget".to_string()], true)
            .unwrap_err();
        assert_eq!(err, EngineError::SelectAllForbidden);
    }

    #[test]
    fn batch_ops_require_selection() {
        let dir = tempdir().unwrap();
        let engine = engine_with("true", dir.path());
        assert_eq!(
            engine.install_packages(&[]).unwrap_err(),
            EngineError::NothingSelected
        );
        assert_eq!(
            engine.uninstall_packages(&[], false).unwrap_err(),
            EngineError::NothingSelected
        );
        assert_eq!(
            engine.upgrade_packages(&[], false).unwrap_err(),
            EngineError::NothingSelected
        );
    }

    #[test]
    fn install_batch_reports_each_name() {
        let dir = tempdir().unwrap();
        let engine = engine_with("true", dir.path());
        let names = vec!["wget".to_string(), "curl".to_string()];
        let result = engine.install_packages(&names).unwrap();
        assert!(result.success);
        assert_eq!(result.installed, names);
    }
}
