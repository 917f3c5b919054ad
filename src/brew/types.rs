//! Homebrew 相关数据类型定义

/// 命令输出结果
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

impl CommandOutput {
    /// 构造一个失败结果（进程未能产出正常输出时使用）
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: message.into(),
            success: false,
        }
    }
}

/// 已安装包信息
#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    pub name: String,
    /// 当前安装的版本（多版本并存时取最新的一个）
    pub installed_version: String,
    pub outdated: bool,
    /// 可升级到的版本；未过期时等于 installed_version
    pub available_version: String,
}

/// 搜索结果条目
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub name: String,
    pub description: String,
}

/// brewfile 期望集合与实际安装集合的差异
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncDiff {
    pub to_install: Vec<String>,
    pub to_remove: Vec<String>,
}

impl SyncDiff {
    pub fn is_empty(&self) -> bool {
        self.to_install.is_empty() && self.to_remove.is_empty()
    }
}

/// 单次变更操作的结果；批量操作时聚合（success = 所有子操作的 AND）
#[derive(Debug, Clone)]
pub struct OperationResult {
    pub success: bool,
    pub message: String,
    pub installed: Vec<String>,
    pub removed: Vec<String>,
}

impl OperationResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            installed: Vec::new(),
            removed: Vec::new(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            installed: Vec::new(),
            removed: Vec::new(),
        }
    }
}
