use crate::brew::{OperationResult, Package, SearchResult, SyncDiff};
use crate::config::Config;
use crate::engine::{Engine, SyncState};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};

// ========== 枚举 ==========

/// 三个面板：搜索 / 已安装 / brewfile 同步
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    Search,    // 1: 远程搜索 + 安装
    Installed, // 2: 已安装列表 + 更新/卸载
    Sync,      // 3: brewfile 管理
}

impl Panel {
    pub fn next(self) -> Self {
        match self {
            Panel::Search => Panel::Installed,
            Panel::Installed => Panel::Sync,
            Panel::Sync => Panel::Search,
        }
    }
}

// ========== 状态消息 ==========

/// 面板内的短时状态消息，超过 TTL 后自动消失
#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub text: String,
    pub success: bool,
    created: Instant,
}

impl StatusMessage {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            success: true,
            created: Instant::now(),
        }
    }

    pub fn err(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            success: false,
            created: Instant::now(),
        }
    }

    pub fn expired(&self, ttl: Duration) -> bool {
        self.created.elapsed() >= ttl
    }
}

// ========== 事件 ==========

#[derive(Debug)]
pub enum AppEvent {
    /// 已安装列表 + brewfile 状态的整体刷新结果
    Refreshed {
        packages: Vec<Package>,
        brewfile_exists: bool,
        symlink_target: Option<PathBuf>,
        up_to_date: bool,
    },
    SearchResults {
        results: Vec<SearchResult>,
        seq: u64,
    },
    /// 某个变更操作结束；refresh 为真时触发整体刷新
    OperationDone {
        panel: Panel,
        result: OperationResult,
        refresh: bool,
    },
    SyncChecked(Result<SyncDiff, String>),
    DatabaseUpdated(OperationResult),
}

// ========== 子状态结构体 ==========

pub struct SearchPanelState {
    pub input: String,
    pub cursor: usize,
    /// 是否处于输入态（/ 进入，Enter/Esc 退出）
    pub typing: bool,
    pub searching: bool,
    pub results: Vec<SearchResult>,
    pub selected: usize,
    pub marked: HashSet<usize>,
    pub status: Option<StatusMessage>,
    /// 搜索序号，丢弃过期的异步结果
    pub seq: u64,
}

impl SearchPanelState {
    pub fn new() -> Self {
        Self {
            input: String::new(),
            cursor: 0,
            typing: false,
            searching: false,
            results: Vec::new(),
            selected: 0,
            marked: HashSet::new(),
            status: None,
            seq: 0,
        }
    }

    /// 收集要安装的包名：有标记用标记项，否则用当前高亮项
    pub fn selected_names(&self) -> Vec<String> {
        if self.marked.is_empty() {
            self.results
                .get(self.selected)
                .map(|r| vec![r.name.clone()])
                .unwrap_or_default()
        } else {
            let mut indices: Vec<usize> = self.marked.iter().copied().collect();
            indices.sort_unstable();
            indices
                .into_iter()
                .filter_map(|i| self.results.get(i))
                .map(|r| r.name.clone())
                .collect()
        }
    }
}

pub struct InstalledPanelState {
    pub packages: Vec<Package>,
    /// 筛选后的 packages 下标
    pub filtered: Vec<usize>,
    pub loading: bool,
    pub input: String,
    pub cursor: usize,
    pub typing: bool,
    /// 0 为"全选"行，1.. 对应 filtered[i-1]
    pub selected: usize,
    pub marked: HashSet<usize>,
    pub select_all: bool,
    pub status: Option<StatusMessage>,
}

impl InstalledPanelState {
    pub fn new() -> Self {
        Self {
            packages: Vec::new(),
            filtered: Vec::new(),
            loading: true,
            input: String::new(),
            cursor: 0,
            typing: false,
            selected: 0,
            marked: HashSet::new(),
            select_all: false,
            status: None,
        }
    }

    /// 刷新后装入新列表
    ///
    /// 标记按下标指向旧列表，换列表后全部失效，连同全选一并清空，
    /// 避免下标漂移到别的包上。
    pub fn reload(&mut self, packages: Vec<Package>) {
        self.packages = packages;
        self.loading = false;
        self.marked.clear();
        self.select_all = false;
        self.apply_filter();
    }

    /// 对已安装列表应用关键词筛选
    pub fn apply_filter(&mut self) {
        let keyword = self.input.to_lowercase();
        if keyword.is_empty() {
            self.filtered = (0..self.packages.len()).collect();
        } else {
            self.filtered = self
                .packages
                .iter()
                .enumerate()
                .filter(|(_, pkg)| pkg.name.to_lowercase().contains(&keyword))
                .map(|(i, _)| i)
                .collect();
        }
        self.selected = 0;
        self.marked.retain(|idx| self.filtered.contains(idx));
    }

    pub fn outdated_count(&self) -> usize {
        self.packages.iter().filter(|p| p.outdated).count()
    }

    /// 列表总行数（含"全选"行）
    pub fn row_count(&self) -> usize {
        self.filtered.len() + 1
    }

    /// 当前高亮是否停在"全选"行
    pub fn on_select_all_row(&self) -> bool {
        self.selected == 0
    }

    /// 切换全选：标记/清空所有筛选可见的包
    pub fn toggle_select_all(&mut self) {
        self.select_all = !self.select_all;
        if self.select_all {
            self.marked = self.filtered.iter().copied().collect();
        } else {
            self.marked.clear();
        }
    }

    /// 收集操作目标：有标记用标记项，否则用当前高亮项
    pub fn selected_names(&self) -> Vec<String> {
        if self.marked.is_empty() {
            self.selected
                .checked_sub(1)
                .and_then(|i| self.filtered.get(i))
                .and_then(|&idx| self.packages.get(idx))
                .map(|p| vec![p.name.clone()])
                .unwrap_or_default()
        } else {
            let mut indices: Vec<usize> = self.marked.iter().copied().collect();
            indices.sort_unstable();
            indices
                .into_iter()
                .filter_map(|idx| self.packages.get(idx))
                .map(|p| p.name.clone())
                .collect()
        }
    }
}

pub struct SyncPanelState {
    pub state: SyncState,
    pub exists: bool,
    pub symlink_target: Option<PathBuf>,
    pub up_to_date: bool,
    pub status: Option<StatusMessage>,
}

impl SyncPanelState {
    pub fn new() -> Self {
        Self {
            state: SyncState::Idle,
            exists: false,
            symlink_target: None,
            up_to_date: false,
            status: None,
        }
    }

    /// 非确认键取消待确认的差异；其他状态不受影响
    pub fn cancel_pending(&mut self) -> bool {
        if matches!(self.state, SyncState::AwaitingConfirmation(_)) {
            self.state = SyncState::Idle;
            self.status = Some(StatusMessage::ok("已取消同步"));
            true
        } else {
            false
        }
    }
}

// ========== App ==========

pub struct App {
    pub focus: Panel,
    pub config: Config,
    pub engine: Engine,
    pub should_quit: bool,
    // 子状态
    pub search: SearchPanelState,
    pub installed: InstalledPanelState,
    pub sync: SyncPanelState,
}

impl App {
    pub fn new(config: Config, engine: Engine) -> Self {
        Self {
            focus: Panel::Search,
            config,
            engine,
            should_quit: false,
            search: SearchPanelState::new(),
            installed: InstalledPanelState::new(),
            sync: SyncPanelState::new(),
        }
    }

    /// 任一输入框处于输入态时，全局快捷键让位给文本输入
    pub fn typing(&self) -> bool {
        self.search.typing || self.installed.typing
    }

    pub fn set_status(&mut self, panel: Panel, msg: StatusMessage) {
        match panel {
            Panel::Search => self.search.status = Some(msg),
            Panel::Installed => self.installed.status = Some(msg),
            Panel::Sync => self.sync.status = Some(msg),
        }
    }

    /// 清理过期的状态消息（每轮主循环调用）
    pub fn expire_statuses(&mut self) {
        let ttl = Duration::from_secs(self.config.status_ttl_secs);
        for status in [
            &mut self.search.status,
            &mut self.installed.status,
            &mut self.sync.status,
        ] {
            if status.as_ref().map(|s| s.expired(ttl)).unwrap_or(false) {
                *status = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkg(name: &str, outdated: bool) -> Package {
        Package {
            name: name.to_string(),
            installed_version: "1.0".to_string(),
            outdated,
            available_version: if outdated { "2.0" } else { "1.0" }.to_string(),
        }
    }

    #[test]
    fn filter_narrows_and_reset_restores() {
        let mut s = InstalledPanelState::new();
        s.packages = vec![pkg("wget", false), pkg("curl", true), pkg("htop", false)];
        s.apply_filter();
        assert_eq!(s.filtered, vec![0, 1, 2]);

        s.input = "CU".to_string();
        s.apply_filter();
        assert_eq!(s.filtered, vec![1]);

        s.input.clear();
        s.apply_filter();
        assert_eq!(s.filtered.len(), 3);
        assert_eq!(s.outdated_count(), 1);
    }

    #[test]
    fn filter_drops_marks_outside_view() {
        let mut s = InstalledPanelState::new();
        s.packages = vec![pkg("wget", false), pkg("curl", false)];
        s.apply_filter();
        s.marked.insert(0);
        s.marked.insert(1);

        s.input = "wget".to_string();
        s.apply_filter();
        assert_eq!(s.marked.len(), 1);
        assert!(s.marked.contains(&0));
    }

    #[test]
    fn select_all_marks_visible_packages() {
        let mut s = InstalledPanelState::new();
        s.packages = vec![pkg("wget", false), pkg("curl", false)];
        s.apply_filter();
        s.toggle_select_all();
        assert!(s.select_all);
        assert_eq!(s.marked.len(), 2);
        s.toggle_select_all();
        assert!(s.marked.is_empty());
    }

    #[test]
    fn selected_names_fall_back_to_highlight() {
        let mut s = InstalledPanelState::new();
        s.packages = vec![pkg("wget", false), pkg("curl", false)];
        s.apply_filter();
        // 高亮在"全选"行时没有目标
        assert!(s.selected_names().is_empty());
        s.selected = 2;
        assert_eq!(s.selected_names(), vec!["curl"]);
        s.marked.insert(0);
        assert_eq!(s.selected_names(), vec!["wget"]);
    }

    #[test]
    fn reload_invalidates_stale_marks() {
        let mut s = InstalledPanelState::new();
        s.packages = vec![pkg("a", false), pkg("b", false), pkg("c", false)];
        s.apply_filter();
        s.marked.insert(0);
        s.marked.insert(1);

        // 卸载后列表缩短，旧下标不能漂移到剩下的包上
        s.reload(vec![pkg("c", false)]);
        assert!(s.marked.is_empty());
        assert!(!s.select_all);
        assert!(s.selected_names().is_empty());
    }

    #[test]
    fn cancel_pending_only_from_awaiting() {
        let mut s = SyncPanelState::new();
        let diff = crate::brew::SyncDiff {
            to_install: vec!["wget".to_string()],
            to_remove: vec![],
        };

        s.state = SyncState::AwaitingConfirmation(diff);
        assert!(s.cancel_pending());
        assert_eq!(s.state, SyncState::Idle);
        assert!(s.status.is_some());

        // Idle / Applying 下不是取消动作
        assert!(!s.cancel_pending());
        s.state = SyncState::Applying;
        assert!(!s.cancel_pending());
        assert_eq!(s.state, SyncState::Applying);
    }

    #[test]
    fn status_expires_by_ttl() {
        let msg = StatusMessage::ok("完成");
        assert!(!msg.expired(Duration::from_secs(3)));
        assert!(msg.expired(Duration::from_secs(0)));
    }

    #[test]
    fn panel_focus_cycles() {
        assert_eq!(Panel::Search.next(), Panel::Installed);
        assert_eq!(Panel::Installed.next(), Panel::Sync);
        assert_eq!(Panel::Sync.next(), Panel::Search);
    }
}
