use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use murmur_chat::{ChatSession, TurnEvent};
use murmur_llm::{ChatClient, ChatOptions, SpeechClient};
use murmur_persist::{MessageRole, PersistenceClient};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

const HELP: &str = "\
Type a message to chat. Commands:
  /new           start a new conversation
  /list          list conversations
  /open <id>     switch to a conversation
  /history       show the current conversation
  /speak <path>  save the last reply as audio
  /help          show this help
  /quit          exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send(String),
    New,
    List,
    Open(String),
    History,
    Speak(PathBuf),
    Help,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Some(Command::Send(line.to_string())));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    let command = match (name, arg) {
        ("new", _) => Command::New,
        ("list", _) => Command::List,
        ("history", _) => Command::History,
        ("help", _) => Command::Help,
        ("quit" | "exit", _) => Command::Quit,
        ("open", "") => bail!("Usage: /open <conversation id>"),
        ("open", id) => Command::Open(id.to_string()),
        ("speak", "") => bail!("Usage: /speak <output path>"),
        ("speak", path) => Command::Speak(PathBuf::from(path)),
        (other, _) => bail!("Unknown command: /{} (try /help)", other),
    };
    Ok(Some(command))
}

/// Line-oriented chat front-end over one store
pub struct Repl {
    client: Arc<dyn ChatClient>,
    speech: Option<Arc<dyn SpeechClient>>,
    store: Arc<dyn PersistenceClient>,
    model: String,
    options: ChatOptions,
    session: ChatSession,
    events_tx: mpsc::Sender<TurnEvent>,
    events: mpsc::Receiver<TurnEvent>,
}

impl Repl {
    /// Start on a fresh conversation
    pub async fn new(
        client: Arc<dyn ChatClient>,
        speech: Option<Arc<dyn SpeechClient>>,
        store: Arc<dyn PersistenceClient>,
        model: String,
        options: ChatOptions,
    ) -> Result<Self> {
        let (events_tx, events) = mpsc::channel(64);
        let session = ChatSession::start(client.clone(), store.clone())
            .await?
            .with_model(model.clone())
            .with_options(options.clone())
            .with_events(events_tx.clone());

        Ok(Self {
            client,
            speech,
            store,
            model,
            options,
            session,
            events_tx,
            events,
        })
    }

    pub fn conversation_id(&self) -> &str {
        self.session.conversation_id()
    }

    fn configure(&self, session: ChatSession) -> ChatSession {
        session
            .with_model(self.model.clone())
            .with_options(self.options.clone())
            .with_events(self.events_tx.clone())
    }

    /// Read commands from stdin until `/quit` or end of input
    pub async fn run(&mut self) -> Result<()> {
        println!("{}", HELP);
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            print!("> ");
            std::io::stdout().flush()?;

            let Some(line) = lines.next_line().await? else {
                break;
            };

            let command = match parse_command(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(e) => {
                    eprintln!("{}", e);
                    continue;
                }
            };

            match self.execute(command).await {
                Ok(Flow::Quit) => break,
                Ok(Flow::Continue) => {}
                Err(e) => eprintln!("error: {:#}", e),
            }
        }
        Ok(())
    }

    pub async fn execute(&mut self, command: Command) -> Result<Flow> {
        match command {
            Command::Send(text) => self.send(&text).await?,
            Command::New => {
                let session = ChatSession::start(self.client.clone(), self.store.clone()).await?;
                self.session = self.configure(session);
                println!("Started conversation {}", self.conversation_id());
            }
            Command::List => self.list().await?,
            Command::Open(id) => {
                let session = ChatSession::open(self.client.clone(), self.store.clone(), &id).await?;
                self.session = self.configure(session);
                let conversation = self.session.conversation().await?;
                println!("Opened \"{}\"", conversation.display_title());
                self.history().await?;
            }
            Command::History => self.history().await?,
            Command::Speak(path) => self.speak(path).await?,
            Command::Help => println!("{}", HELP),
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    async fn send(&mut self, text: &str) -> Result<()> {
        let mut out = std::io::stdout();
        let turn = self.session.send_message(text);
        tokio::pin!(turn);

        let outcome = loop {
            tokio::select! {
                biased;
                Some(event) = self.events.recv() => render(&mut out, event)?,
                outcome = &mut turn => break outcome,
            }
        };
        while let Ok(event) = self.events.try_recv() {
            render(&mut out, event)?;
        }

        let outcome = outcome?;
        if let Some(error) = &outcome.error {
            eprintln!("(reply interrupted: {})", error);
        }
        Ok(())
    }

    async fn list(&self) -> Result<()> {
        let conversations = self.store.list_conversations().await?;
        for conversation in conversations {
            let marker = if conversation.id == self.conversation_id() { "*" } else { " " };
            println!(
                "{} {}  {}  {}",
                marker,
                conversation.id,
                conversation.created_at.format("%Y-%m-%d %H:%M"),
                conversation.display_title()
            );
        }
        Ok(())
    }

    async fn history(&self) -> Result<()> {
        for message in self.session.history().await? {
            let speaker = match message.role {
                MessageRole::User => "you",
                MessageRole::Assistant => "assistant",
            };
            println!("{}: {}", speaker, message.content);
        }
        Ok(())
    }

    async fn speak(&self, path: PathBuf) -> Result<()> {
        let Some(speech) = &self.speech else {
            bail!("Speech is disabled; set GOOGLE_API_KEY to enable it");
        };

        let history = self.session.history().await?;
        let Some(reply) = history
            .iter()
            .rev()
            .find(|m| !m.is_user() && !m.content.is_empty())
        else {
            bail!("No reply to speak yet");
        };

        let audio = speech.synthesize(&reply.content).await?;
        tokio::fs::write(&path, &audio)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Wrote {} bytes to {}", audio.len(), path.display());
        Ok(())
    }
}

fn render(out: &mut impl Write, event: TurnEvent) -> std::io::Result<()> {
    match event {
        TurnEvent::Started { .. } => {}
        TurnEvent::Delta { content } => {
            write!(out, "{}", content)?;
            out.flush()?;
        }
        TurnEvent::Completed { .. } => writeln!(out)?,
    }
    Ok(())
}
