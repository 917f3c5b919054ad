//! sudo 提权侧通道（askpass）
//!
//! 启动 TUI 前先验证一次 sudo 密码，然后生成一个只有属主可执行的
//! askpass 脚本并导出 SUDO_ASKPASS，之后需要提权的 brew 子进程由
//! sudo 自行调用该脚本取密码。核心代码只透传环境变量，不保存明文。

use anyhow::{bail, Result};
use crossterm::event::{self, Event, KeyCode, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::fs;
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// 掩码式读取密码（原始模式，回显 *）
fn prompt_password(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;

    enable_raw_mode()?;
    let outcome = read_masked();
    disable_raw_mode()?;
    println!();

    outcome
}

fn read_masked() -> Result<String> {
    let mut password = String::new();
    loop {
        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Enter => return Ok(password),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    bail!("已取消")
                }
                KeyCode::Backspace => {
                    if password.pop().is_some() {
                        print!("\x08 \x08");
                        io::stdout().flush()?;
                    }
                }
                KeyCode::Char(c) => {
                    password.push(c);
                    print!("*");
                    io::stdout().flush()?;
                }
                _ => {}
            }
        }
    }
}

/// 用 `sudo -S true` 校验密码
fn validate_password(password: &str) -> Result<bool> {
    let mut child = Command::new("sudo")
        .args(["-S", "true"])
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    if let Some(stdin) = child.stdin.as_mut() {
        writeln!(stdin, "{}", password)?;
    }
    drop(child.stdin.take());

    Ok(child.wait()?.success())
}

/// askpass 脚本的生命周期句柄：Drop 时删除脚本并清掉环境变量
#[derive(Debug)]
pub struct AskpassRelay {
    script_path: PathBuf,
}

impl AskpassRelay {
    /// 写入 askpass 脚本（0700）并导出 SUDO_ASKPASS
    pub fn setup(password: &str) -> Result<Self> {
        let script_path = std::env::temp_dir().join("lian-brew-askpass");
        // 单引号包裹，内部单引号按 shell 规则转义
        let quoted = password.replace('\'', r"'\''");
        let content = format!("#!/bin/bash\nprintf '%s\\n' '{}'\n", quoted);
        fs::write(&script_path, content)?;
        fs::set_permissions(&script_path, fs::Permissions::from_mode(0o700))?;
        std::env::set_var("SUDO_ASKPASS", &script_path);
        Ok(Self { script_path })
    }

    pub fn script_path(&self) -> &Path {
        &self.script_path
    }
}

impl Drop for AskpassRelay {
    fn drop(&mut self) {
        std::env::remove_var("SUDO_ASKPASS");
        if let Err(e) = fs::remove_file(&self.script_path) {
            log::warn!("删除 askpass 脚本失败: {}", e);
        }
    }
}

/// 启动前鉴权：最多 3 次尝试，全部失败则报错退出
pub fn authenticate() -> Result<AskpassRelay> {
    println!("lian-brew 的部分操作需要 sudo 权限。");

    for attempt in 1..=3 {
        let password = prompt_password("请输入 sudo 密码: ")?;
        match validate_password(&password) {
            Ok(true) => return AskpassRelay::setup(&password),
            Ok(false) => println!("密码错误，请重试（{}/3）。", attempt),
            Err(e) => bail!("无法执行 sudo 验证: {}", e),
        }
    }

    bail!("连续 3 次验证失败")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_creates_and_cleans_up_script() {
        let relay = AskpassRelay::setup("secret'with$quote").unwrap();
        let path = relay.script_path().to_path_buf();
        assert!(path.exists());

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("#!/bin/bash"));
        // 单引号已按 shell 规则转义
        assert!(content.contains(r"secret'\''with$quote"));

        drop(relay);
        assert!(!path.exists());
    }
}
