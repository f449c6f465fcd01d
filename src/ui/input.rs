//! 输入行解析：斜杠命令编辑启动表单或转为 Command；普通文本在对话打开时作为对话消息发送
//!
//! 纯函数，不触碰终端，便于测试。

use crate::api::{KeywordSource, ScrapeConfig};
use crate::core::{persona, Command};

/// 一行输入的处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum InputAction {
    /// 发给编排器
    Send(CommandKind),
    /// 本地提示（表单已修改 / 用法错误）
    Notice(String),
    Quit,
    Nothing,
}

/// Command 不实现 PartialEq（携带配置），这里用一个可比较的外壳
#[derive(Debug, Clone, PartialEq)]
pub enum CommandKind {
    Start(ScrapeConfig),
    Cancel,
    Reset,
    ToggleChat,
    Persona(String),
    Chat(String),
    Download(String),
}

impl From<CommandKind> for Command {
    fn from(kind: CommandKind) -> Self {
        match kind {
            CommandKind::Start(cfg) => Command::StartTask(cfg),
            CommandKind::Cancel => Command::CancelTask,
            CommandKind::Reset => Command::ResetTask,
            CommandKind::ToggleChat => Command::ToggleChat,
            CommandKind::Persona(id) => Command::SelectPersona(id),
            CommandKind::Chat(text) => Command::SendChat(text),
            CommandKind::Download(name) => Command::DownloadResult(name),
        }
    }
}

pub const HELP: &str = "/domains N  /threads N  /keywords default|ai  /prompt TEXT  /telegram on|off  \
/start  /cancel  /reset  /chat  /persona ID  /download FILE  /quit";

/// 解析一行输入；form 为当前启动表单草稿，form_locked 时拒绝修改
pub fn parse_line(
    line: &str,
    form: &mut ScrapeConfig,
    chat_open: bool,
    form_locked: bool,
) -> InputAction {
    let line = line.trim();
    if line.is_empty() {
        return InputAction::Nothing;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return if chat_open {
            InputAction::Send(CommandKind::Chat(line.to_string()))
        } else {
            InputAction::Notice("Chat is closed; use /chat to open it".to_string())
        };
    };

    let (cmd, arg) = match rest.split_once(char::is_whitespace) {
        Some((c, a)) => (c, a.trim()),
        None => (rest, ""),
    };
    let cmd = cmd.to_lowercase();

    let edits_form = matches!(
        cmd.as_str(),
        "domains" | "threads" | "keywords" | "prompt" | "telegram"
    );
    if edits_form && form_locked {
        return InputAction::Notice("Form is locked while a task is active".to_string());
    }

    match cmd.as_str() {
        "domains" => match arg.parse::<u32>() {
            Ok(n) => {
                form.target_domains = n;
                InputAction::Notice(format!("Target domains: {}", n))
            }
            Err(_) => usage("/domains N"),
        },
        "threads" => match arg.parse::<u8>() {
            Ok(n) => {
                form.max_threads = n;
                InputAction::Notice(format!("Max threads: {}", n))
            }
            Err(_) => usage("/threads N"),
        },
        "keywords" => match KeywordSource::parse(arg) {
            Some(source) => {
                form.keyword_source = source;
                InputAction::Notice(format!("Keyword source: {}", source.as_str()))
            }
            None => usage("/keywords default|ai"),
        },
        "prompt" => {
            form.ai_prompt = (!arg.is_empty()).then(|| arg.to_string());
            InputAction::Notice(if arg.is_empty() {
                "AI prompt cleared".to_string()
            } else {
                "AI prompt set".to_string()
            })
        }
        "telegram" => match arg.to_lowercase().as_str() {
            "on" => {
                form.send_telegram = true;
                InputAction::Notice("Telegram notification: on".to_string())
            }
            "off" => {
                form.send_telegram = false;
                InputAction::Notice("Telegram notification: off".to_string())
            }
            _ => usage("/telegram on|off"),
        },
        "start" => InputAction::Send(CommandKind::Start(form.clone())),
        "cancel" => InputAction::Send(CommandKind::Cancel),
        "reset" => InputAction::Send(CommandKind::Reset),
        "chat" => InputAction::Send(CommandKind::ToggleChat),
        "persona" if !arg.is_empty() => InputAction::Send(CommandKind::Persona(arg.to_string())),
        "persona" => {
            let ids: Vec<String> = persona::list()
                .iter()
                .map(|p| format!("{}={}", p.id, p.label))
                .collect();
            InputAction::Notice(format!("Usage: /persona ID ({})", ids.join(", ")))
        }
        "download" if !arg.is_empty() => {
            InputAction::Send(CommandKind::Download(arg.to_string()))
        }
        "download" => usage("/download FILE"),
        "quit" | "exit" => InputAction::Quit,
        "help" => InputAction::Notice(HELP.to_string()),
        other => InputAction::Notice(format!("Unknown command: /{} (try /help)", other)),
    }
}

fn usage(text: &str) -> InputAction {
    InputAction::Notice(format!("Usage: {}", text))
}
