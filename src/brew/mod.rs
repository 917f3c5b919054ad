//! 包管理器模块 — 对 Homebrew (brew) 的封装

pub mod parser;
pub mod types;

// 重新导出常用类型
pub use types::{CommandOutput, OperationResult, Package, SearchResult, SyncDiff};

use anyhow::{anyhow, Result};
use parser::{merge_outdated, parse_info_desc, parse_info_json, parse_installed_list, parse_outdated, parse_search_lines};
use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// 已知需要特殊处理的包名（虚拟化/容器类，安装器会索要提权）
pub const DEFAULT_SPECIAL_PACKAGES: &[&str] = &["parallels", "virtualbox", "vmware", "docker"];

/// 特殊包操作的墙钟超时（秒）
pub const DEFAULT_SPECIAL_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct BrewClient {
    pub command: String,
    special_packages: Vec<String>,
    special_timeout: Duration,
}

impl BrewClient {
    /// 检测 brew 是否可用
    pub fn detect() -> Result<Self> {
        if Command::new("which")
            .arg("brew")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
        {
            return Ok(Self::new("brew"));
        }
        Err(anyhow!("未找到 brew，请先安装 Homebrew"))
    }

    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            special_packages: DEFAULT_SPECIAL_PACKAGES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            special_timeout: Duration::from_secs(DEFAULT_SPECIAL_TIMEOUT_SECS),
        }
    }

    /// 覆盖特殊包名单（来自配置文件）
    pub fn with_special_packages(mut self, names: Vec<String>, timeout_secs: u64) -> Self {
        self.special_packages = names;
        self.special_timeout = Duration::from_secs(timeout_secs);
        self
    }

    /// 第一个参数是否命中特殊包名单（大小写不敏感子串匹配）
    pub fn is_special(&self, args: &[String]) -> bool {
        let Some(first) = args.first() else {
            return false;
        };
        let lowered = first.to_lowercase();
        self.special_packages
            .iter()
            .any(|name| lowered.contains(&name.to_lowercase()))
    }

    /// 执行 brew 子命令并捕获输出
    ///
    /// 永远返回结果值：启动失败、非零退出、超时都折叠为 success=false，
    /// 不向调用方抛出错误。
    pub fn execute(&self, subcommand: &str, args: &[String]) -> CommandOutput {
        let mutating = matches!(subcommand, "install" | "uninstall" | "upgrade");

        if mutating && self.is_special(args) {
            // 特殊包：追加强制标志，透传 askpass 通道，限时执行
            let mut full_args = args.to_vec();
            match subcommand {
                "uninstall" => full_args.push("--zap".to_string()),
                _ => full_args.push("--force".to_string()),
            }
            log::info!("特殊包操作: brew {} {}", subcommand, full_args.join(" "));
            return self.run_with_timeout(subcommand, &full_args, self.special_timeout);
        }

        // 常规执行，不提权
        let output = Command::new(&self.command)
            .arg(subcommand)
            .args(args)
            .output();

        match output {
            Ok(o) => CommandOutput {
                stdout: String::from_utf8_lossy(&o.stdout).to_string(),
                stderr: String::from_utf8_lossy(&o.stderr).to_string(),
                success: o.status.success(),
            },
            Err(e) => CommandOutput::failure(format!("启动 {} 失败: {}", self.command, e)),
        }
    }

    /// 限时执行：子进程放入独立进程组，超时后对整个进程组 SIGKILL
    fn run_with_timeout(&self, subcommand: &str, args: &[String], timeout: Duration) -> CommandOutput {
        use std::os::unix::process::CommandExt;

        let mut cmd = Command::new(&self.command);
        cmd.arg(subcommand);
        cmd.args(args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        // 提权侧通道由外部的 askpass 模块准备，这里只负责透传
        if let Ok(askpass) = std::env::var("SUDO_ASKPASS") {
            cmd.env("SUDO_ASKPASS", askpass);
        }
        unsafe {
            cmd.pre_exec(|| {
                // 创建独立进程组，方便统一杀死 brew + sudo 整棵进程树
                libc::setpgid(0, 0);
                Ok(())
            });
        }

        let mut child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => return CommandOutput::failure(format!("启动 {} 失败: {}", self.command, e)),
        };
        let child_pid = child.id();

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdout_handle = std::thread::spawn(move || read_all(stdout));
        let stderr_handle = std::thread::spawn(move || read_all(stderr));

        let deadline = Instant::now() + timeout;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    return CommandOutput {
                        stdout: stdout_handle.join().unwrap_or_default(),
                        stderr: stderr_handle.join().unwrap_or_default(),
                        success: status.success(),
                    };
                }
                Ok(None) => {}
                Err(e) => {
                    unsafe {
                        libc::kill(-(child_pid as i32), libc::SIGKILL);
                    }
                    let _ = child.wait();
                    return CommandOutput::failure(format!("等待子进程失败: {}", e));
                }
            }

            if Instant::now() >= deadline {
                // 超时：对整个进程组 SIGKILL，绝不留下后台进程
                log::warn!(
                    "brew {} 超过 {} 秒未完成，强制终止进程组 {}",
                    subcommand,
                    timeout.as_secs(),
                    child_pid
                );
                unsafe {
                    libc::kill(-(child_pid as i32), libc::SIGKILL);
                }
                let _ = child.wait();
                let _ = stdout_handle.join();
                let _ = stderr_handle.join();
                return CommandOutput::failure(format!(
                    "操作超时（{} 秒），进程已被强制终止",
                    timeout.as_secs()
                ));
            }

            std::thread::sleep(Duration::from_millis(100));
        }
    }

    // ===== 查询 =====

    /// 获取已安装包列表（含过期标记）
    pub fn installed_packages(&self) -> Vec<Package> {
        let listed = self.execute("list", &["--versions".to_string()]);
        if !listed.success || listed.stdout.is_empty() {
            return Vec::new();
        }
        let installed = parse_installed_list(&listed.stdout);

        // outdated 查询失败时降级为"全部视为最新"，不影响列表本身
        let outdated_out = self.execute("outdated", &["--verbose".to_string()]);
        let outdated = if outdated_out.success {
            parse_outdated(&outdated_out.stdout)
        } else {
            log::warn!("brew outdated 查询失败: {}", outdated_out.stderr.trim());
            Default::default()
        };

        merge_outdated(installed, &outdated)
    }

    /// 搜索远程包
    ///
    /// 回退链：JSON 详情 → 纯文本行解析 → 逐包补查描述。
    pub fn search(&self, query: &str) -> Vec<SearchResult> {
        if query.trim().is_empty() {
            return Vec::new();
        }

        let searched = self.execute("search", &[query.to_string()]);
        if !searched.success || searched.stdout.is_empty() {
            return Vec::new();
        }

        // 优先尝试结构化 JSON：成功且非空则直接采用
        let info = self.execute(
            "info",
            &["--json=v2".to_string(), query.to_string()],
        );
        if info.success && !info.stdout.is_empty() {
            let from_json = parse_info_json(&info.stdout);
            if !from_json.is_empty() {
                return from_json;
            }
        }

        // 回退到逐行解析搜索输出
        let mut results = parse_search_lines(&searched.stdout);

        // 补查缺失的描述，单个失败静默忽略
        for result in &mut results {
            if result.description.is_empty() {
                if let Some(desc) = self.package_desc(&result.name) {
                    result.description = desc;
                }
            }
        }

        results
    }

    /// 查询单个包的描述
    pub fn package_desc(&self, name: &str) -> Option<String> {
        if name.trim().is_empty() {
            return None;
        }
        let info = self.execute(
            "info",
            &[name.to_string(), "--json=v2".to_string()],
        );
        if !info.success || info.stdout.is_empty() {
            return None;
        }
        parse_info_desc(&info.stdout)
    }

    // ===== 变更 =====

    /// 安装单个包
    pub fn install(&self, name: &str) -> OperationResult {
        if name.trim().is_empty() {
            return OperationResult::fail("包名不能为空");
        }
        let out = self.execute("install", &[name.to_string()]);
        if out.success {
            let mut result = OperationResult::ok(format!("成功安装 {}", name));
            result.installed.push(name.to_string());
            result
        } else {
            OperationResult::fail(format!("安装 {} 失败: {}", name, out.stderr.trim()))
        }
    }

    /// 卸载单个包
    pub fn uninstall(&self, name: &str) -> OperationResult {
        if name.trim().is_empty() {
            return OperationResult::fail("包名不能为空");
        }
        let out = self.execute("uninstall", &[name.to_string()]);
        if out.success {
            let mut result = OperationResult::ok(format!("成功卸载 {}", name));
            result.removed.push(name.to_string());
            result
        } else {
            OperationResult::fail(format!("卸载 {} 失败: {}", name, out.stderr.trim()))
        }
    }

    /// 更新单个包
    pub fn upgrade(&self, name: &str) -> OperationResult {
        if name.trim().is_empty() {
            return OperationResult::fail("包名不能为空");
        }
        let out = self.execute("upgrade", &[name.to_string()]);
        if out.success {
            OperationResult::ok(format!("成功更新 {}", name))
        } else {
            OperationResult::fail(format!("更新 {} 失败: {}", name, out.stderr.trim()))
        }
    }

    /// 更新所有包
    pub fn upgrade_all(&self) -> OperationResult {
        let out = self.execute("upgrade", &[]);
        if out.success {
            OperationResult::ok("成功更新所有包")
        } else {
            OperationResult::fail(format!("更新失败: {}", out.stderr.trim()))
        }
    }

    /// 刷新 Homebrew 自身与包数据库
    pub fn update_database(&self) -> OperationResult {
        let out = self.execute("update", &[]);
        if out.success {
            OperationResult::ok("Homebrew 数据库已更新")
        } else {
            OperationResult::fail(format!("更新 Homebrew 失败: {}", out.stderr.trim()))
        }
    }
}

/// 把整个流读成字符串（读取失败返回已读部分）
fn read_all(stream: Option<impl Read>) -> String {
    let mut buf = String::new();
    if let Some(mut reader) = stream {
        let _ = reader.read_to_string(&mut buf);
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> BrewClient {
        BrewClient::new("brew")
    }

    #[test]
    fn special_match_is_case_insensitive_substring() {
        let c = client();
        assert!(c.is_special(&["Docker".to_string()]));
        assert!(c.is_special(&["parallels-desktop".to_string()]));
        assert!(!c.is_special(&["wget".to_string()]));
        assert!(!c.is_special(&[]));
    }

    #[test]
    fn special_list_is_configurable() {
        let c = client().with_special_packages(vec!["qemu".to_string()], 5);
        assert!(c.is_special(&["QEMU-full".to_string()]));
        assert!(!c.is_special(&["docker".to_string()]));
    }

    #[test]
    fn empty_package_name_is_rejected_without_spawning() {
        let c = BrewClient::new("definitely-not-a-real-binary");
        // 前置条件失败：不会尝试启动子进程，因此假命令名也不报启动错误
        let result = c.install("  ");
        assert!(!result.success);
        assert_eq!(result.message, "包名不能为空");
        assert!(result.installed.is_empty());
    }

    #[test]
    fn timeout_kills_overrunning_process_group() {
        // 用 sleep 顶替 brew：1 秒限时内跑不完的子进程被整组杀掉
        let c = BrewClient::new("sleep");
        let started = Instant::now();
        let out = c.run_with_timeout("60", &[], Duration::from_secs(1));
        assert!(!out.success);
        assert!(out.stderr.contains("操作超时"));
        // 不会等满 60 秒
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn timeout_lets_fast_commands_finish() {
        let c = BrewClient::new("sleep");
        let out = c.run_with_timeout("0.1", &[], Duration::from_secs(30));
        assert!(out.success);
    }

    #[test]
    fn launch_failure_is_a_result_value() {
        let c = BrewClient::new("definitely-not-a-real-binary");
        let out = c.execute("list", &[]);
        assert!(!out.success);
        assert!(out.stderr.contains("启动"));
    }
}
