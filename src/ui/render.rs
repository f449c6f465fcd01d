//! 界面渲染
//!
//! 根据 UiState 绘制：标题栏显示任务状态与进度条，左侧为启动表单与结果文件，
//! 中部为按严重级别着色的任务日志，对话打开时右侧为对话面板，底部为输入框与快捷键提示。

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{
        Block, Borders, Gauge, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap,
    },
    Frame,
};

use crate::api::ScrapeConfig;
use crate::core::{ChatRole, ChatView, Severity, TaskStatus, TaskView, UiState};

/// 渲染所需的本地 UI 状态（不属于编排器）
#[derive(Debug, Clone)]
pub struct ViewState {
    pub form: ScrapeConfig,
    pub input: String,
    pub notice: Option<String>,
    pub log_scroll: usize,
}

fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Error => Color::Red,
        Severity::Success => Color::Green,
        Severity::Warning => Color::Yellow,
        Severity::Debug => Color::DarkGray,
        Severity::Info => Color::Cyan,
        Severity::Log => Color::Reset,
    }
}

fn status_color(status: TaskStatus) -> Color {
    match status {
        TaskStatus::Idle => Color::Gray,
        TaskStatus::Starting | TaskStatus::Running => Color::Cyan,
        TaskStatus::Completed => Color::Green,
        TaskStatus::Error => Color::Red,
        TaskStatus::Cancelled => Color::Yellow,
    }
}

/// 绘制一帧；将日志区 (总行数, 可视高度) 写入 out 供外部 clamp 滚动
pub fn draw(f: &mut Frame, state: &UiState, view: &ViewState, out: &mut (usize, usize)) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(4),
        ])
        .split(f.area());

    draw_header(f, rows[0], &state.task);

    let columns = if state.chat.open {
        vec![
            Constraint::Length(34),
            Constraint::Min(30),
            Constraint::Percentage(35),
        ]
    } else {
        vec![Constraint::Length(34), Constraint::Min(30)]
    };
    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(columns)
        .split(rows[1]);

    draw_form(f, body[0], &state.task, &view.form);
    *out = draw_log(f, body[1], &state.task, view.log_scroll);
    if state.chat.open {
        draw_chat(f, body[2], &state.chat);
    }
    draw_input(f, rows[2], state, view);
}

fn draw_header(f: &mut Frame, area: Rect, task: &TaskView) {
    let id = task
        .task_id
        .as_ref()
        .map(|id| format!(" │ 任务 {}", id))
        .unwrap_or_default();
    let hint = if task.status.is_terminal() {
        " │ /start 重新提交"
    } else {
        ""
    };
    let title = format!(" Ayzen │ {}{}{} ", task.status, id, hint);
    let gauge = Gauge::default()
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(status_color(task.status))),
        )
        .gauge_style(Style::default().fg(status_color(task.status)))
        .percent(u16::from(task.progress))
        .label(format!("{}%", task.progress));
    f.render_widget(gauge, area);
}

fn draw_form(f: &mut Frame, area: Rect, task: &TaskView, form: &ScrapeConfig) {
    let dim = Style::default().fg(Color::DarkGray);
    let mut lines = vec![
        Line::from(format!("用户      {}", form.user_name)),
        Line::from(format!("域名数    {}", form.target_domains)),
        Line::from(format!("线程数    {}", form.max_threads)),
        Line::from(format!("关键词    {}", form.keyword_source.as_str())),
        Line::from(format!(
            "AI 提示   {}",
            form.ai_prompt.as_deref().unwrap_or("-")
        )),
        Line::from(format!(
            "Telegram  {}",
            if form.send_telegram { "on" } else { "off" }
        )),
        Line::from(""),
    ];
    if task.result_files.is_empty() {
        lines.push(Line::from(Span::styled("暂无结果文件", dim)));
    } else {
        lines.push(Line::from(Span::styled(
            "结果文件（/download FILE）",
            Style::default().add_modifier(Modifier::BOLD),
        )));
        for file in &task.result_files {
            lines.push(Line::from(Span::styled(
                format!("• {}", file.name),
                Style::default().fg(Color::Green),
            )));
            lines.push(Line::from(Span::styled(format!("  {}", file.url), dim)));
        }
    }

    let border = if task.controls.form_locked {
        Color::DarkGray
    } else {
        Color::Blue
    };
    let block = Block::default()
        .title(if task.controls.form_locked {
            " 启动参数（已锁定） "
        } else {
            " 启动参数 "
        })
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border));
    f.render_widget(
        Paragraph::new(Text::from(lines))
            .block(block)
            .wrap(Wrap { trim: false }),
        area,
    );
}

fn draw_log(f: &mut Frame, area: Rect, task: &TaskView, scroll: usize) -> (usize, usize) {
    let lines: Vec<Line> = task
        .log
        .iter()
        .map(|entry| {
            Line::from(vec![
                Span::styled(
                    format!("[{}] ", entry.timestamp.format("%H:%M:%S")),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(
                    entry.text.clone(),
                    Style::default().fg(severity_color(entry.severity)),
                ),
            ])
        })
        .collect();

    let block = Block::default()
        .title(" 任务日志 ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));
    let content_height = area.height.saturating_sub(2) as usize;
    let total_lines = lines.len();
    let offset = scroll.min(total_lines.saturating_sub(content_height));

    f.render_widget(
        Paragraph::new(Text::from(lines))
            .block(block)
            .scroll((offset as u16, 0)),
        area,
    );

    if total_lines > content_height {
        let mut scrollbar_state = ScrollbarState::new(total_lines)
            .position(offset)
            .viewport_content_length(content_height);
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .thumb_symbol("█")
            .track_symbol(Some("░"));
        f.render_stateful_widget(scrollbar, area, &mut scrollbar_state);
    }
    (total_lines, content_height)
}

fn draw_chat(f: &mut Frame, area: Rect, chat: &ChatView) {
    let mut lines: Vec<Line> = Vec::new();
    for (idx, m) in chat.history.iter().enumerate() {
        if idx > 0 {
            lines.push(Line::from(""));
        }
        let color = match m.role {
            ChatRole::User => Color::Cyan,
            ChatRole::Assistant => Color::Green,
            ChatRole::System => Color::Red,
        };
        lines.push(Line::from(Span::styled(
            m.sender.clone(),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(m.text.clone()));
    }
    if chat.pending {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "…",
            Style::default().fg(Color::DarkGray),
        )));
    }

    // 保持最新消息可见
    let height = area.height.saturating_sub(2) as usize;
    let offset = lines.len().saturating_sub(height);
    let block = Block::default()
        .title(format!(" 对话 │ {} ", chat.persona_label))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta));
    f.render_widget(
        Paragraph::new(Text::from(lines))
            .block(block)
            .wrap(Wrap { trim: false })
            .scroll((offset as u16, 0)),
        area,
    );
}

fn draw_input(f: &mut Frame, area: Rect, state: &UiState, view: &ViewState) {
    let title = match &view.notice {
        Some(notice) => format!(" {} ", notice),
        None if state.chat.open && !state.chat.input_enabled => " 等待回复… ".to_string(),
        None => " 输入（/help 查看命令） ".to_string(),
    };
    let hint = " Enter 执行 │ ↑↓ PgUp/PgDn 滚动 │ Ctrl+C 取消任务 │ Ctrl+L 重置 │ Esc 关闭对话 │ Ctrl+Q 退出 ";
    let block = Block::default()
        .title(title)
        .title_bottom(Line::from(Span::styled(hint, Style::default().fg(Color::DarkGray))))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Blue));
    let style = if state.chat.open && !state.chat.input_enabled {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default()
    };
    f.render_widget(
        Paragraph::new(view.input.as_str())
            .block(block)
            .wrap(Wrap { trim: false })
            .style(style),
        area,
    );
}
