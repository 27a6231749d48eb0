//! Line-oriented terminal front end: parses typed commands and turns view
//! snapshots into printable lines.

use aitu_sync::ChatView;
use aitu_types::models::ConversationId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    List,
    /// 1-based index into the conversation list.
    Open(usize),
    Users,
    /// 1-based index into the candidate user list.
    Start(usize),
    Refresh,
    Quit,
    Say(String),
    Usage(&'static str),
    Empty,
}

pub fn parse(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Input::Say(line.to_string());
    };

    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };

    match name {
        "list" => Input::List,
        "users" => Input::Users,
        "refresh" => Input::Refresh,
        "quit" | "exit" => Input::Quit,
        "open" => index(arg).map_or(Input::Usage("/open <n>"), Input::Open),
        "start" => index(arg).map_or(Input::Usage("/start <n>"), Input::Start),
        _ => Input::Usage("commands: /list /open <n> /users /start <n> /refresh /quit"),
    }
}

fn index(arg: &str) -> Option<usize> {
    arg.parse::<usize>().ok().filter(|n| *n > 0)
}

pub fn conversation_lines(view: &ChatView) -> Vec<String> {
    if view.loading {
        return vec!["(loading conversations...)".into()];
    }
    if view.conversations.is_empty() {
        return vec!["(no conversations, /users to start one)".into()];
    }

    let active = view.active.as_ref().map(|c| &c.id);
    view.conversations
        .iter()
        .enumerate()
        .map(|(i, conv)| {
            let marker = if Some(&conv.id) == active { '*' } else { ' ' };
            let mut line = format!("{marker}{:>3}. {}", i + 1, conv.display_name());
            if let Some(last) = &conv.last_message {
                line.push_str(&format!("  -- {last}"));
            }
            line
        })
        .collect()
}

pub fn candidate_lines(view: &ChatView) -> Vec<String> {
    if view.candidates.is_empty() {
        return vec!["(no users available)".into()];
    }
    view.candidates
        .iter()
        .enumerate()
        .map(|(i, user)| format!("{:>4}. [{}] {}", i + 1, user.initials(), user.display_name()))
        .collect()
}

/// Tracks what has already been printed so each snapshot only prints news.
#[derive(Debug, Default)]
pub struct Renderer {
    connected: Option<bool>,
    active: Option<ConversationId>,
    generation: u64,
    shown: usize,
    picker_open: bool,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, view: &ChatView) -> Vec<String> {
        let mut out = Vec::new();

        if self.connected != Some(view.connected) {
            self.connected = Some(view.connected);
            out.push(if view.connected {
                "[online]".to_string()
            } else {
                "[offline, reconnecting]".to_string()
            });
        }

        if view.new_chat_open && !self.picker_open {
            out.push("Start a chat with (/start <n>):".into());
            out.extend(candidate_lines(view));
        }
        self.picker_open = view.new_chat_open;

        let active = view.active.as_ref().map(|c| c.id.clone());
        if active != self.active {
            self.active = active;
            self.generation = view.history_generation;
            self.shown = 0;
            if let Some(conv) = &view.active {
                out.push(format!("== {} ==", conv.display_name()));
            }
        }

        // A fetch replaced the transcript; reprint it from the top
        if view.history_generation != self.generation {
            self.generation = view.history_generation;
            if self.shown > 0 {
                out.push("-- history reloaded --".into());
            }
            self.shown = 0;
        }
        self.shown = self.shown.min(view.messages.len());
        for message in &view.messages[self.shown..] {
            let author = if view.is_mine(message) {
                "me".to_string()
            } else {
                message.author_name()
            };
            let time = message
                .created_at
                .map(|t| t.format("%H:%M ").to_string())
                .unwrap_or_default();
            out.push(format!("{time}{author}: {}", message.content));
        }
        self.shown = view.messages.len();

        out
    }
}
