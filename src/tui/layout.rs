use super::state::StatusMessage;
use super::theme::{DIM, FOCUS, STATUS_ERR, STATUS_OK};
use ratatui::{
    layout::{Constraint, Direction, Layout, Margin, Rect},
    style::{Modifier, Style},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
    Frame,
};

/// 纵向三面板 + 底部命令栏：
/// 搜索(30%) / 已安装(弹性) / brewfile(7 行) / 命令栏(1 行)
pub fn panel_layout(area: Rect) -> Vec<Rect> {
    Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(30),
            Constraint::Min(8),
            Constraint::Length(7),
            Constraint::Length(1),
        ])
        .split(area)
        .to_vec()
}

/// 面板外框，聚焦时绿色边框 + 加粗标题
pub fn panel_block(title: &str, focused: bool) -> Block<'static> {
    let border_style = if focused {
        Style::default().fg(FOCUS)
    } else {
        Style::default().fg(DIM)
    };
    let title_style = if focused {
        Style::default().fg(FOCUS).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(DIM)
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(format!(" {} ", title))
        .title_style(title_style)
}

/// 在面板内部底行渲染状态消息（绿=成功，红=失败）
pub fn render_status(f: &mut Frame, status: &Option<StatusMessage>, area: Rect) {
    let Some(msg) = status else { return };
    if area.height == 0 {
        return;
    }
    let color = if msg.success { STATUS_OK } else { STATUS_ERR };
    let line = Paragraph::new(format!(" {}", msg.text)).style(Style::default().fg(color));
    let bottom = Rect {
        x: area.x,
        y: area.y + area.height - 1,
        width: area.width,
        height: 1,
    };
    f.render_widget(line, bottom);
}

/// 底部命令栏
pub fn render_command_bar(f: &mut Frame, text: &str, area: Rect) {
    let bar = Paragraph::new(format!(" {}", text)).style(Style::default().fg(DIM));
    f.render_widget(bar, area);
}

/// 列表右侧滚动条（内容超出可视高度时才出现）
pub fn render_scrollbar(f: &mut Frame, total: usize, position: usize, area: Rect) {
    if total <= area.height as usize {
        return;
    }
    let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
        .begin_symbol(Some("↑"))
        .end_symbol(Some("↓"));
    let mut state = ScrollbarState::new(total).position(position);
    f.render_stateful_widget(
        scrollbar,
        area.inner(Margin {
            horizontal: 0,
            vertical: 0,
        }),
        &mut state,
    );
}

/// 高亮行超出可视区时的滚动偏移
pub fn scroll_offset(selected: usize, visible_height: usize) -> usize {
    if visible_height > 0 && selected >= visible_height {
        selected.saturating_sub(visible_height - 1)
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scroll_follows_selection() {
        assert_eq!(scroll_offset(0, 10), 0);
        assert_eq!(scroll_offset(9, 10), 0);
        assert_eq!(scroll_offset(10, 10), 1);
        assert_eq!(scroll_offset(25, 10), 16);
    }

    #[test]
    fn zero_height_does_not_underflow() {
        assert_eq!(scroll_offset(5, 0), 0);
    }
}
