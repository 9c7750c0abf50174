//! Console chat transport.
//!
//! A line-oriented stand-in for a chat server, for local play and scripted
//! runs:
//! - Lines starting with the bot prefix are commands from the current user
//! - Lines starting with `#` control the console (switch user, set an
//!   avatar, quit)
//! - All other lines are chat messages from the current user, delivered to
//!   whatever prompt is waiting for them

use async_trait::async_trait;
use rpg_core::{ChatError, Conversation, Form, GameService, MessageId, Reply};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, Mutex};
use tracing::warn;

/// One user's view of the console.
pub struct ConsoleConversation {
    user: String,
    next_id: Arc<AtomicU64>,
    inbox: Mutex<mpsc::UnboundedReceiver<String>>,
    avatar: RwLock<Option<String>>,
}

impl ConsoleConversation {
    fn new(
        user: &str,
        next_id: Arc<AtomicU64>,
    ) -> (Arc<Self>, mpsc::UnboundedSender<String>) {
        let (sender, inbox) = mpsc::unbounded_channel();
        let conversation = Arc::new(Self {
            user: user.to_string(),
            next_id,
            inbox: Mutex::new(inbox),
            avatar: RwLock::new(None),
        });
        (conversation, sender)
    }

    fn new_id(&self) -> MessageId {
        MessageId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn set_avatar(&self, url: &str) {
        *self.avatar.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(url.to_string());
    }
}

#[async_trait]
impl Conversation for ConsoleConversation {
    fn user(&self) -> &str {
        &self.user
    }

    fn avatar(&self) -> Option<String> {
        self.avatar
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    async fn send(&self, text: &str) -> Result<MessageId, ChatError> {
        let id = self.new_id();
        println!("[{id}] {text}");
        Ok(id)
    }

    async fn post_form(&self, form: &Form) -> Result<MessageId, ChatError> {
        let id = self.new_id();
        println!("[{id}]\n{}", render_form(form));
        Ok(id)
    }

    async fn edit_form(&self, id: MessageId, form: &Form) -> Result<(), ChatError> {
        println!("[{id} edited]\n{}", render_form(form));
        Ok(())
    }

    async fn delete(&self, id: MessageId) -> Result<(), ChatError> {
        println!("[{id} deleted]");
        Ok(())
    }

    async fn next_message(&self, timeout: Duration) -> Result<Option<Reply>, ChatError> {
        let mut inbox = self.inbox.lock().await;
        match tokio::time::timeout(timeout, inbox.recv()).await {
            Err(_) => Ok(None),
            Ok(None) => Err(ChatError::Closed),
            Ok(Some(content)) => Ok(Some(Reply {
                id: self.new_id(),
                content,
            })),
        }
    }

    async fn choose(
        &self,
        id: MessageId,
        options: &[String],
        timeout: Duration,
    ) -> Result<Option<usize>, ChatError> {
        let listed: Vec<String> = options
            .iter()
            .enumerate()
            .map(|(i, option)| format!("{}) {option}", i + 1))
            .collect();
        println!("[{id} choices] {}", listed.join("  "));

        let mut inbox = self.inbox.lock().await;
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let content = match tokio::time::timeout_at(deadline, inbox.recv()).await {
                Err(_) => return Ok(None),
                Ok(None) => return Err(ChatError::Closed),
                Ok(Some(content)) => content,
            };
            if let Some(index) = parse_choice(&content, options) {
                return Ok(Some(index));
            }
            println!("[{id} choices] pick one of: {}", listed.join("  "));
        }
    }

    async fn clear_choices(&self, _id: MessageId) -> Result<(), ChatError> {
        Ok(())
    }
}

/// A 1-based option number or an option label.
fn parse_choice(input: &str, options: &[String]) -> Option<usize> {
    let input = input.trim();
    if let Ok(number) = input.parse::<usize>() {
        return (1..=options.len()).contains(&number).then(|| number - 1);
    }
    options
        .iter()
        .position(|option| option.to_lowercase() == input.to_lowercase())
}

fn render_form(form: &Form) -> String {
    let mut out = format!("== {} ==", form.title);
    if let Some(thumbnail) = &form.thumbnail {
        out.push_str(&format!(" [{thumbnail}]"));
    }
    if !form.description.is_empty() {
        out.push('\n');
        out.push_str(&form.description);
    }
    for (name, value) in &form.fields {
        out.push_str(&format!("\n  {name}: {value}"));
    }
    if !form.footer.is_empty() {
        out.push_str(&format!("\n-- {}", form.footer));
    }
    out
}

struct ConsoleUser {
    conversation: Arc<ConsoleConversation>,
    inbox: mpsc::UnboundedSender<String>,
}

fn console_user<'a>(
    users: &'a mut HashMap<String, ConsoleUser>,
    current: &str,
    next_id: &Arc<AtomicU64>,
) -> &'a ConsoleUser {
    users.entry(current.to_string()).or_insert_with(|| {
        let (conversation, inbox) = ConsoleConversation::new(current, next_id.clone());
        ConsoleUser {
            conversation,
            inbox,
        }
    })
}

/// Read stdin until EOF or `#quit`.
pub async fn run(service: GameService, initial_user: &str) -> anyhow::Result<()> {
    let prefix = service.config().bot.prefix.clone();
    let next_id = Arc::new(AtomicU64::new(1));
    let mut users: HashMap<String, ConsoleUser> = HashMap::new();
    let mut current = initial_user.to_string();

    println!("=== {} ===", service.config().bot.name);
    println!("Playing as user {current}. Type {prefix}help for game commands, #help for console commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(control) = line.strip_prefix('#') {
            let parts: Vec<&str> = control.split_whitespace().collect();
            match parts.as_slice() {
                ["quit"] | ["exit"] => break,
                ["user", id] => {
                    current = id.to_string();
                    println!("[console] now playing as user {current}");
                }
                ["avatar", url] => {
                    console_user(&mut users, &current, &next_id)
                        .conversation
                        .set_avatar(url);
                    println!("[console] avatar of user {current} set");
                }
                ["help"] => {
                    println!("[console] #user <id>     - act as another user");
                    println!("[console] #avatar <url>  - set the current user's avatar");
                    println!("[console] #quit          - exit");
                    println!("[console] {prefix}<command> runs a game command, anything else is a chat message");
                }
                _ => println!("[console] unknown console command, try #help"),
            }
            continue;
        }

        let user = console_user(&mut users, &current, &next_id);
        match line.strip_prefix(prefix.as_str()) {
            Some(command) => {
                // Commands may wait for replies, so they must not block the reader.
                let service = service.clone();
                let conversation: Arc<dyn Conversation> = user.conversation.clone();
                let command = command.to_string();
                tokio::spawn(async move {
                    if let Err(err) = service.handle_line(conversation, &command).await {
                        warn!(error = %err, "command failed");
                        println!("[error] {err}");
                    }
                });
            }
            None => {
                if user.inbox.send(line.to_string()).is_err() {
                    warn!(user = %current, "conversation closed");
                }
            }
        }
    }
    Ok(())
}
