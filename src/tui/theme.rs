//! MTF flag 主题色定义，全局统一使用

use ratatui::style::Color;

/// 粉色 (MTF flag)
pub const PINK: Color = Color::Rgb(245, 169, 184);
/// 蓝色 (MTF flag)
pub const BLUE: Color = Color::Rgb(91, 206, 250);
/// 选中行背景色
pub const SEL_BG: Color = Color::Rgb(45, 35, 55);
/// 亮白色
pub const BRIGHT_WHITE: Color = Color::Rgb(255, 255, 255);
/// 暗灰色（次要信息）
pub const DIM: Color = Color::Rgb(130, 130, 140);
/// 描述文字灰色（选中行内）
pub const DESC_DIM: Color = Color::Rgb(180, 180, 190);
/// 聚焦面板边框
pub const FOCUS: Color = Color::Rgb(0, 196, 13);
/// 可更新版本号
pub const OUTDATED: Color = Color::Rgb(255, 184, 76);
/// 成功状态消息
pub const STATUS_OK: Color = Color::Rgb(120, 220, 120);
/// 失败状态消息
pub const STATUS_ERR: Color = Color::Rgb(240, 100, 100);
