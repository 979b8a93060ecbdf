#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use murmur_llm::{ChatClient, ChatRequest, ChatResponse, DecodeError, EventStream, StreamEvent};
use tokio::sync::Notify;

/// How one `chat_stream` call behaves
pub enum Script {
    Reply(Vec<&'static str>),
    FailAfter(Vec<&'static str>, DecodeError),
    OpenError(&'static str),
}

type Hook = Box<dyn Fn() + Send + Sync>;

/// Chat backend that plays back scripted replies and records every request
pub struct ScriptedChat {
    scripts: Mutex<VecDeque<Script>>,
    title: Mutex<Option<String>>,
    pub requests: Mutex<Vec<ChatRequest>>,
    pub title_requests: Mutex<Vec<ChatRequest>>,
    gate: Option<Arc<Notify>>,
    stream_hook: Mutex<Option<Hook>>,
}

impl ScriptedChat {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            title: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            title_requests: Mutex::new(Vec::new()),
            gate: None,
            stream_hook: Mutex::new(None),
        }
    }

    /// Reply to title requests with `title`; without one they fail
    pub fn with_title(self, title: &str) -> Self {
        *self.title.lock().unwrap() = Some(title.to_string());
        self
    }

    /// Hold every reply stream until `gate` is notified
    pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn on_stream(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.stream_hook.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn stream_calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatClient for ScriptedChat {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        self.title_requests.lock().unwrap().push(request);
        let title = self.title.lock().unwrap().clone();
        match title {
            Some(title) => Ok(ChatResponse {
                content: Some(title),
                usage: None,
                finish_reason: Some("stop".to_string()),
            }),
            None => Err(anyhow!("Chat API error (500): title unavailable")),
        }
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<EventStream> {
        self.requests.lock().unwrap().push(request);
        if let Some(hook) = self.stream_hook.lock().unwrap().as_ref() {
            hook();
        }

        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Script::Reply(Vec::new()));

        let (fragments, failure) = match script {
            Script::Reply(fragments) => (fragments, None),
            Script::FailAfter(fragments, error) => (fragments, Some(error)),
            Script::OpenError(message) => return Err(anyhow!("{}", message)),
        };
        let gate = self.gate.clone();

        Ok(Box::pin(async_stream::stream! {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            for fragment in fragments {
                yield Ok(StreamEvent::Message { content: fragment.to_string() });
            }
            match failure {
                Some(error) => yield Err(anyhow::Error::new(error)),
                None => yield Ok(StreamEvent::Done { finish_reason: Some("stop".to_string()) }),
            }
        }))
    }
}
