#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use promptline_questions::{ConversationIdentity, InboundEvent, Question};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Minimal chat event: a text message, a button press, or a photo.
#[derive(Debug, Clone)]
pub enum Payload {
    Text(String),
    Button(String),
    Photo,
}

#[derive(Debug, Clone)]
pub struct TestEvent {
    pub user: u64,
    pub payload: Payload,
}

impl InboundEvent for TestEvent {
    fn has(&self, tag: &str) -> bool {
        match &self.payload {
            Payload::Text(_) => matches!(tag, "message" | "message:text"),
            Payload::Photo => matches!(tag, "message" | "message:photo"),
            Payload::Button(_) => matches!(tag, "callback_query" | "callback_query:data"),
        }
    }

    fn text(&self) -> Option<&str> {
        match &self.payload {
            Payload::Text(t) | Payload::Button(t) => Some(t),
            Payload::Photo => None,
        }
    }

    fn identity(&self) -> Option<ConversationIdentity> {
        Some(
            ConversationIdentity::new("100")
                .with_user(self.user.to_string())
                .with_chat(self.user.to_string()),
        )
    }
}

pub type Q = Question<TestEvent>;

pub fn text(user: u64, t: &str) -> Arc<TestEvent> {
    Arc::new(TestEvent {
        user,
        payload: Payload::Text(t.to_string()),
    })
}

pub fn button(user: u64, data: &str) -> Arc<TestEvent> {
    Arc::new(TestEvent {
        user,
        payload: Payload::Button(data.to_string()),
    })
}

pub fn photo(user: u64) -> Arc<TestEvent> {
    Arc::new(TestEvent {
        user,
        payload: Payload::Photo,
    })
}

pub fn key(user: u64) -> String {
    format!("100-{user}-{user}")
}

/// Ordered log of callback invocations shared with closures.
#[derive(Clone, Default)]
pub struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }

    /// Question whose pre-step and handler append `pre:<name>` and
    /// `answer:<name>:<text>` to the log.
    pub fn question(&self, name: &'static str, matcher: &'static str) -> Q {
        let pre = self.clone();
        let ans = self.clone();
        Q::new(matcher)
            .pre_step(move |_| {
                let log = pre.clone();
                async move {
                    log.push(format!("pre:{name}"));
                    anyhow::Ok(())
                }
            })
            .answer_handler(move |ev| {
                let log = ans.clone();
                async move {
                    log.push(format!("answer:{name}:{}", ev.text().unwrap_or("-")));
                    anyhow::Ok(())
                }
            })
    }
}
