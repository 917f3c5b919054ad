//! brewfile —— 声明式包清单的读写与差异计算
//!
//! 格式：每行一个包名，`#` 开头为注释，空行忽略。
//! 引擎把它当作期望状态的唯一来源，文件本身的并发修改不做检测。

use crate::brew::{Package, SyncDiff};
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Brewfile {
    path: PathBuf,
}

impl Brewfile {
    /// 默认位置：~/.config/lian-brew/Brewfile
    pub fn default_path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".config/lian-brew/Brewfile")
    }

    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// 文件本身是否为符号链接（用 symlink_metadata，不跟随链接）
    pub fn is_symlink(&self) -> bool {
        fs::symlink_metadata(&self.path)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false)
    }

    /// 符号链接指向的目标路径
    pub fn symlink_target(&self) -> Option<PathBuf> {
        if !self.is_symlink() {
            return None;
        }
        fs::read_link(&self.path).ok()
    }

    /// 读取期望包名列表（保持文件内顺序）
    pub fn read(&self) -> Result<Vec<String>> {
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("读取 brewfile 失败: {}", self.path.display()))?;
        Ok(content
            .lines()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| line.to_string())
            .collect())
    }

    /// 写入包名列表（覆盖式）
    pub fn write(&self, names: &[String]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("创建目录失败: {}", parent.display()))?;
        }
        let mut content = String::from("# lian-brew 生成的 brewfile\n");
        for name in names {
            content.push_str(name);
            content.push('\n');
        }
        fs::write(&self.path, content)
            .with_context(|| format!("写入 brewfile 失败: {}", self.path.display()))?;
        Ok(())
    }

    /// 用当前安装集合新建 brewfile，返回写入的包数
    pub fn create_from(&self, installed: &[Package]) -> Result<usize> {
        let names: Vec<String> = installed.iter().map(|p| p.name.clone()).collect();
        self.write(&names)?;
        Ok(names.len())
    }

    /// 把 brewfile 同步为当前安装集合，返回写入的包数
    pub fn update_from(&self, installed: &[Package]) -> Result<usize> {
        self.create_from(installed)
    }

    /// brewfile 是否与实际安装集合一致
    pub fn is_up_to_date(&self, installed: &[Package]) -> bool {
        match self.diff_against_installed(installed) {
            Ok(diff) => diff.is_empty(),
            Err(_) => false,
        }
    }

    /// 计算期望集合与实际安装集合的差异
    ///
    /// to_install = 期望 − 已安装（保持 brewfile 顺序），
    /// to_remove = 已安装 − 期望（保持安装列表顺序）。
    pub fn diff_against_installed(&self, installed: &[Package]) -> Result<SyncDiff> {
        let desired = self.read()?;
        let desired_set: HashSet<&str> = desired.iter().map(|s| s.as_str()).collect();
        let installed_set: HashSet<&str> = installed.iter().map(|p| p.name.as_str()).collect();

        let to_install = desired
            .iter()
            .filter(|name| !installed_set.contains(name.as_str()))
            .cloned()
            .collect();
        let to_remove = installed
            .iter()
            .filter(|pkg| !desired_set.contains(pkg.name.as_str()))
            .map(|pkg| pkg.name.clone())
            .collect();

        Ok(SyncDiff {
            to_install,
            to_remove,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn pkg(name: &str) -> Package {
        Package {
            name: name.to_string(),
            installed_version: "1.0".to_string(),
            outdated: false,
            available_version: "1.0".to_string(),
        }
    }

    #[test]
    fn read_skips_comments_and_blank_lines() {
        let dir = tempdir().unwrap();
        let bf = Brewfile::new(dir.path().join("Brewfile"));
        fs::write(bf.path(), "# 注释\nwget\n\n  curl  \n# another\nhtop\n").unwrap();
        assert_eq!(bf.read().unwrap(), vec!["wget", "curl", "htop"]);
    }

    #[test]
    fn write_read_round_trip() {
        let dir = tempdir().unwrap();
        let bf = Brewfile::new(dir.path().join("nested/Brewfile"));
        assert!(!bf.exists());
        bf.write(&["wget".to_string(), "curl".to_string()]).unwrap();
        assert!(bf.exists());
        assert_eq!(bf.read().unwrap(), vec!["wget", "curl"]);
    }

    #[test]
    fn diff_install_and_remove_sides() {
        let dir = tempdir().unwrap();
        let bf = Brewfile::new(dir.path().join("Brewfile"));
        bf.write(&["wget".to_string(), "curl".to_string()]).unwrap();

        let installed = vec![pkg("wget"), pkg("htop")];
        let diff = bf.diff_against_installed(&installed).unwrap();
        assert_eq!(diff.to_install, vec!["curl"]);
        assert_eq!(diff.to_remove, vec!["htop"]);

        // 不变式：to_install 与已安装集合不相交，to_remove 与期望集合不相交
        assert!(diff.to_install.iter().all(|n| !installed.iter().any(|p| &p.name == n)));
        assert!(!diff.to_remove.contains(&"wget".to_string()));
    }

    #[test]
    fn diff_is_idempotent() {
        let dir = tempdir().unwrap();
        let bf = Brewfile::new(dir.path().join("Brewfile"));
        bf.write(&["wget".to_string()]).unwrap();
        let installed = vec![pkg("htop")];
        let first = bf.diff_against_installed(&installed).unwrap();
        let second = bf.diff_against_installed(&installed).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn up_to_date_when_sets_match() {
        let dir = tempdir().unwrap();
        let bf = Brewfile::new(dir.path().join("Brewfile"));
        bf.write(&["wget".to_string(), "curl".to_string()]).unwrap();
        assert!(bf.is_up_to_date(&[pkg("curl"), pkg("wget")]));
        assert!(!bf.is_up_to_date(&[pkg("wget")]));
    }

    #[test]
    fn missing_file_is_not_up_to_date() {
        let dir = tempdir().unwrap();
        let bf = Brewfile::new(dir.path().join("Brewfile"));
        assert!(!bf.exists());
        assert!(!bf.is_up_to_date(&[pkg("wget")]));
        assert!(bf.read().is_err());
    }

    #[test]
    fn create_from_installed_set() {
        let dir = tempdir().unwrap();
        let bf = Brewfile::new(dir.path().join("Brewfile"));
        let count = bf.create_from(&[pkg("wget"), pkg("htop")]).unwrap();
        assert_eq!(count, 2);
        let diff = bf.diff_against_installed(&[pkg("wget"), pkg("htop")]).unwrap();
        assert!(diff.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_detection_and_target() {
        let dir = tempdir().unwrap();
        let real = dir.path().join("dotfiles-Brewfile");
        fs::write(&real, "wget\n").unwrap();
        let link = dir.path().join("Brewfile");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let bf = Brewfile::new(link);
        assert!(bf.exists());
        assert!(bf.is_symlink());
        assert_eq!(bf.symlink_target().unwrap(), real);
        assert_eq!(bf.read().unwrap(), vec!["wget"]);
    }
}
