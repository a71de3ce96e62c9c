//! CLI (Command Line Interface) mode
//!
//! Provides an interactive chat REPL driving the session manager
//! end-to-end: resolve, generate, record.

use nu_ansi_term::{Color, Style};
use reedline::{
    ColumnarMenu, Completer, DefaultHinter, Emacs, KeyCode, KeyModifiers, Keybindings, MenuBuilder,
    Prompt, Reedline, ReedlineEvent, ReedlineMenu, Signal, Suggestion,
};
use se_core::{ChatMessage, Config, Role, SessionManager};
use tracing::info;

/// Available commands for autocomplete display
const COMMANDS: &[(&str, &str)] = &[
    ("/help", "ヘルプを表示"),
    ("/exit", "プログラムを終了"),
    ("/quit", "プログラムを終了"),
    ("/new", "新しいセッションを開始"),
    ("/end", "現在のセッションを終了"),
    ("/history", "会話履歴を表示"),
];

/// Command completer for reedline
#[derive(Clone)]
pub struct CommandCompleter {
    commands: Vec<(&'static str, &'static str)>,
}

impl CommandCompleter {
    pub fn new() -> Self {
        Self {
            commands: COMMANDS.to_vec(),
        }
    }
}

impl Default for CommandCompleter {
    fn default() -> Self {
        Self::new()
    }
}

impl Completer for CommandCompleter {
    fn complete(&mut self, line: &str, pos: usize) -> Vec<Suggestion> {
        if !line.starts_with('/') {
            return Vec::new();
        }

        self.commands
            .iter()
            .filter(|(cmd, _)| cmd.starts_with(line))
            .map(|(cmd, desc)| Suggestion {
                value: cmd.to_string(),
                description: Some(desc.to_string()),
                extra: None,
                span: reedline::Span::new(0, pos),
                append_whitespace: true,
                style: None,
            })
            .collect()
    }
}

/// Custom prompt with colored styling
struct ColoredPrompt {
    style: Style,
}

impl ColoredPrompt {
    fn new() -> Self {
        Self {
            style: Color::Cyan.bold(),
        }
    }
}

impl Prompt for ColoredPrompt {
    fn render_prompt_left(&self) -> std::borrow::Cow<'_, str> {
        std::borrow::Cow::Owned(self.style.paint("> ").to_string())
    }

    fn render_prompt_right(&self) -> std::borrow::Cow<'_, str> {
        std::borrow::Cow::Borrowed("")
    }

    fn render_prompt_indicator(
        &self,
        _prompt_mode: reedline::PromptEditMode,
    ) -> std::borrow::Cow<'_, str> {
        std::borrow::Cow::Borrowed("")
    }

    fn render_prompt_multiline_indicator(&self) -> std::borrow::Cow<'_, str> {
        std::borrow::Cow::Borrowed("")
    }

    fn render_prompt_history_search_indicator(
        &self,
        _history_search: reedline::PromptHistorySearch,
    ) -> std::borrow::Cow<'_, str> {
        std::borrow::Cow::Borrowed("")
    }
}

/// What the command handler decided
enum CommandOutcome {
    /// Input was a command and has been handled
    Handled,
    /// The user asked to leave
    Quit,
    /// Not a command; treat as a chat message
    Message,
}

/// Run CLI interactive mode
pub async fn run_cli(
    manager: SessionManager,
    config: &Config,
    user_id: String,
) -> anyhow::Result<()> {
    info!("Starting CLI chat for user {}", user_id);

    print_welcome(&user_id);

    // Setup keybindings
    let mut keybindings = default_keybindings();

    // Trigger completion on '/' key
    keybindings.add_binding(
        KeyModifiers::NONE,
        KeyCode::Char('/'),
        ReedlineEvent::Edit(vec![reedline::EditCommand::Complete]),
    );

    // Setup menu - with_only_buffer_difference(false) makes menu show even without buffer changes
    let menu = Box::new(
        ColumnarMenu::default()
            .with_name("command_menu")
            .with_columns(1)
            .with_column_width(Some(40))
            .with_only_buffer_difference(false),
    );

    // Setup hinter
    let hinter = DefaultHinter::default().with_style(Style::new().dimmed());

    // Create line editor
    let mut line_editor = Reedline::create()
        .with_completer(Box::new(CommandCompleter::new()))
        .with_menu(ReedlineMenu::EngineCompleter(menu))
        .with_hinter(Box::new(hinter))
        .with_edit_mode(Box::new(Emacs::new(keybindings)));

    let prompt = ColoredPrompt::new();

    // Session currently being continued, if any
    let mut current_session: Option<String> = None;

    loop {
        let signal = line_editor.read_line(&prompt);

        match signal {
            Ok(Signal::Success(line)) => {
                let input = line.trim();

                if input.is_empty() {
                    continue;
                }

                match handle_command(input, &manager, &user_id, &mut current_session).await {
                    CommandOutcome::Handled => continue,
                    CommandOutcome::Quit => break,
                    CommandOutcome::Message => {}
                }

                if input.chars().count() > config.chat.max_message_length {
                    eprintln!(
                        "\n❌ メッセージが長すぎます（最大 {} 文字）。\n",
                        config.chat.max_message_length
                    );
                    continue;
                }

                let resolved = match manager.resolve(&user_id, current_session.as_deref()).await {
                    Ok(resolved) => resolved,
                    Err(e) => {
                        eprintln!("\n❌ セッションを初期化できませんでした: {}\n", e);
                        continue;
                    }
                };

                match resolved.chain.generate(input, &resolved.history).await {
                    Ok(reply) => {
                        println!("\n{}\n", reply);

                        manager.record_turn(
                            &user_id,
                            &resolved.session_id,
                            input,
                            &reply,
                            resolved.next_turn_number(),
                        );
                        current_session = Some(resolved.session_id);
                    }
                    Err(e) => {
                        eprintln!("\n❌ エラー: {}\n", e);
                    }
                }
            }
            Ok(Signal::CtrlC) => {
                println!("^C");
                continue;
            }
            Ok(Signal::CtrlD) => {
                break;
            }
            Err(err) => {
                eprintln!("\n❌ エラー: {}\n", err);
                break;
            }
        }
    }

    // Let queued write-behind jobs land before the process goes away.
    manager.flush_writes().await;
    println!("\n👋 さようなら！\n");

    Ok(())
}

/// Default keybindings for reedline
fn default_keybindings() -> Keybindings {
    let mut keybindings = Keybindings::new();
    // Tab key triggers completion
    keybindings.add_binding(
        KeyModifiers::NONE,
        KeyCode::Tab,
        ReedlineEvent::Edit(vec![reedline::EditCommand::Complete]),
    );
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Enter, ReedlineEvent::Submit);
    // Esc key clears/closes menus
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Esc, ReedlineEvent::Esc);
    keybindings.add_binding(
        KeyModifiers::CONTROL,
        KeyCode::Char('c'),
        ReedlineEvent::CtrlC,
    );
    keybindings.add_binding(
        KeyModifiers::CONTROL,
        KeyCode::Char('d'),
        ReedlineEvent::CtrlD,
    );
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Up, ReedlineEvent::Up);
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Down, ReedlineEvent::Down);
    keybindings
}

/// Handle special commands (/new, /end, /history, ...)
async fn handle_command(
    input: &str,
    manager: &SessionManager,
    user_id: &str,
    current_session: &mut Option<String>,
) -> CommandOutcome {
    let lower = input.to_lowercase();

    match lower.as_str() {
        "/exit" | "/quit" | "/q" => CommandOutcome::Quit,
        "/new" => {
            *current_session = None;
            println!("\n✅ 次のメッセージで新しいセッションを開始します。\n");
            CommandOutcome::Handled
        }
        "/end" => {
            match current_session.take() {
                Some(session_id) => {
                    manager.end_session(user_id, &session_id);
                    println!("\n✅ セッションを終了しました。\n");
                }
                None => {
                    println!("\nアクティブなセッションはありません。\n");
                }
            }
            CommandOutcome::Handled
        }
        "/history" => {
            let Some(session_id) = current_session.as_deref() else {
                println!("\nまだ会話がありません。\n");
                return CommandOutcome::Handled;
            };

            match manager.resolve(user_id, Some(session_id)).await {
                Ok(resolved) => print_history(&resolved.history),
                Err(e) => eprintln!("\n❌ 履歴を読み込めませんでした: {}\n", e),
            }
            CommandOutcome::Handled
        }
        "/help" | "/?" => {
            print_commands();
            CommandOutcome::Handled
        }
        _ if lower.starts_with('/') => {
            eprintln!(
                "\n❓ 不明なコマンド: {}。/help でコマンド一覧を確認してください。\n",
                input
            );
            CommandOutcome::Handled
        }
        _ => CommandOutcome::Message,
    }
}

fn print_welcome(user_id: &str) {
    println!();
    println!("🌿 StressEase チャットへようこそ（user: {}）", user_id);
    println!("   気持ちを聞かせてください。/help でコマンド一覧を表示します。");
    println!();
}

fn print_commands() {
    println!();
    for (cmd, desc) in COMMANDS {
        println!("  {:<10} {}", cmd, desc);
    }
    println!();
}

fn print_history(history: &[ChatMessage]) {
    if history.is_empty() {
        println!("\n（履歴はまだありません）\n");
        return;
    }

    println!();
    for message in history {
        let (label, style) = match message.role {
            Role::User => ("あなた", Color::Green.bold()),
            Role::Assistant => ("アシスタント", Color::Cyan.bold()),
        };
        println!("{}: {}", style.paint(label), message.text);
    }
    println!();
}
