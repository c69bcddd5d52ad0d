use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::MentorSettings;
use crate::metrics::MENTOR_REPLIES_TOTAL;
use crate::models::mentor::{ChatMessage, ChatRole, ChatTranscript, SendMessageResponse};

pub const GREETING: &str = "Hello, young friend! I am the Guide. What is on your mind about your studies or your career path? Share it, and we will look for answers in the lessons of those who came before us.";
pub const EMPTY_REPLY: &str =
    "Sorry, the Guide is still reflecting and cannot answer just yet.";
pub const CONNECTION_ERROR: &str =
    "Something went wrong while reaching the source of knowledge. Please try again later.";
pub const MISSING_KEY: &str =
    "The connection to knowledge is currently interrupted (missing API key).";

pub const SYSTEM_PROMPT: &str = r#"You are "The Guide", an AI mentor inspired by the manner, wisdom and patriotism of President Ho Chi Minh.
You never call yourself "Uncle Ho" or "President Ho". Refer to yourself as "the Guide" or "I".
Tone: warm, deep, encouraging, occasionally witty but always dignified.

Mission: advise young people and students on life, study and entrepreneurship by applying Ho Chi Minh Thought in a creative and modern way.

Response rules:
1. Connect history and the present: open with a story or idea from his life, then relate it to today's technology or startup problem.
   Example: "He learned to write newspaper articles in French with a tiny vocabulary. Learning to program is the same: start from the simplest lines of code..."
2. Encourage self-study and creativity: stress independent thinking over rote imitation.
3. Be brief and to the point: keep every answer short and focused on actionable advice.

Background knowledge:
- Thought on national liberation (Chapter III).
- Thought on great national unity.
- Working style: scientific, concrete, words matched by deeds."#;

/// Opaque text-completion backend: conversation in, reply text out.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// `history` ends with the newest user message. Returns the reply text,
    /// which may be empty.
    async fn complete(&self, system_prompt: &str, history: &[ChatMessage]) -> Result<String>;

    fn is_configured(&self) -> bool {
        true
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// Gemini `generateContent` over HTTPS
pub struct GeminiClient {
    http_client: Client,
    settings: MentorSettings,
}

impl GeminiClient {
    pub fn new(settings: MentorSettings) -> Self {
        Self {
            http_client: Client::new(),
            settings,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.settings.api_url.trim_end_matches('/'),
            self.settings.model
        )
    }
}

#[async_trait]
impl CompletionClient for GeminiClient {
    async fn complete(&self, system_prompt: &str, history: &[ChatMessage]) -> Result<String> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("Mentor API key is not configured"))?;

        let payload = GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: system_prompt,
                }],
            },
            contents: history
                .iter()
                .map(|message| Content {
                    role: Some(match message.role {
                        ChatRole::User => "user",
                        ChatRole::Model => "model",
                    }),
                    parts: vec![Part {
                        text: &message.text,
                    }],
                })
                .collect(),
            generation_config: GenerationConfig {
                temperature: self.settings.temperature,
                max_output_tokens: self.settings.max_output_tokens,
            },
        };

        let response = self
            .http_client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&payload)
            .timeout(Duration::from_secs(self.settings.timeout_seconds))
            .send()
            .await
            .context("Failed to call mentor API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!("Mentor API returned error {}: {}", status, error_text));
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .context("Failed to parse mentor API response")?;

        Ok(body
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<String>()
            })
            .unwrap_or_default())
    }

    fn is_configured(&self) -> bool {
        self.settings.api_key.is_some()
    }
}

struct Chat {
    messages: Mutex<Vec<ChatMessage>>,
    last_active: StdMutex<Instant>,
}

impl Chat {
    fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages: Mutex::new(messages),
            last_active: StdMutex::new(Instant::now()),
        }
    }

    fn last_active(&self) -> Instant {
        *self
            .last_active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn touch(&self) {
        *self
            .last_active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Instant::now();
    }
}

/// Server-side mentor conversations.
///
/// Chats idle for longer than the TTL are treated as gone and are dropped
/// the next time a chat is opened. When the map is full, opening a chat
/// evicts the least recently active one.
pub struct MentorService {
    client: Arc<dyn CompletionClient>,
    chats: RwLock<HashMap<String, Arc<Chat>>>,
    chat_ttl: Duration,
    max_chats: usize,
}

impl MentorService {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        let defaults = MentorSettings::default();
        Self::with_limits(
            client,
            Duration::from_secs(defaults.chat_ttl_seconds),
            defaults.max_chats,
        )
    }

    pub fn with_limits(
        client: Arc<dyn CompletionClient>,
        chat_ttl: Duration,
        max_chats: usize,
    ) -> Self {
        Self {
            client,
            chats: RwLock::new(HashMap::new()),
            chat_ttl,
            max_chats: max_chats.max(1),
        }
    }

    fn is_expired(&self, chat: &Chat) -> bool {
        chat.last_active().elapsed() >= self.chat_ttl
    }

    async fn chat(&self, chat_id: &str) -> Option<Arc<Chat>> {
        let chat = self.chats.read().await.get(chat_id).cloned()?;
        (!self.is_expired(&chat)).then_some(chat)
    }

    /// Drops idle chats, then the least recently active ones until there is
    /// room for one more.
    fn evict(&self, chats: &mut HashMap<String, Arc<Chat>>) {
        let before = chats.len();
        chats.retain(|_, chat| !self.is_expired(chat));

        while chats.len() >= self.max_chats {
            let oldest = chats
                .iter()
                .min_by_key(|(_, chat)| chat.last_active())
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    chats.remove(&id);
                }
                None => break,
            }
        }

        let evicted = before - chats.len();
        if evicted > 0 {
            tracing::debug!("Evicted {} mentor chats", evicted);
        }
    }

    /// Opens a conversation seeded with the greeting. Without an API key the
    /// conversation still opens, with a notice appended.
    pub async fn create_chat(&self) -> ChatTranscript {
        let chat_id = Uuid::new_v4().to_string();
        let mut messages = vec![message(ChatRole::Model, GREETING)];
        if !self.client.is_configured() {
            tracing::warn!("Mentor chat {} opened without an API key", chat_id);
            messages.push(message(ChatRole::Model, MISSING_KEY));
        }

        let mut chats = self.chats.write().await;
        self.evict(&mut chats);
        chats.insert(chat_id.clone(), Arc::new(Chat::new(messages.clone())));
        drop(chats);
        tracing::info!("Mentor chat created: {}", chat_id);

        ChatTranscript { chat_id, messages }
    }

    pub async fn transcript(&self, chat_id: &str) -> Option<ChatTranscript> {
        let chat = self.chat(chat_id).await?;
        let messages = chat.messages.lock().await.clone();
        Some(ChatTranscript {
            chat_id: chat_id.to_string(),
            messages,
        })
    }

    /// Appends the user's message and the mentor's reply. Completion
    /// failures become a fixed apology; they are never returned as errors.
    /// Returns `None` for an unknown chat.
    pub async fn send(&self, chat_id: &str, text: &str) -> Option<SendMessageResponse> {
        let chat = self.chat(chat_id).await?;
        chat.touch();
        // Held for the whole exchange so replies stay in order
        let mut messages = chat.messages.lock().await;

        let user_message = message(ChatRole::User, text.trim());
        messages.push(user_message.clone());

        let reply_text = if !self.client.is_configured() {
            MENTOR_REPLIES_TOTAL.with_label_values(&["unconfigured"]).inc();
            MISSING_KEY.to_string()
        } else {
            match self
                .client
                .complete(SYSTEM_PROMPT, conversation(&messages))
                .await
            {
                Ok(reply) if !reply.trim().is_empty() => {
                    MENTOR_REPLIES_TOTAL.with_label_values(&["success"]).inc();
                    reply
                }
                Ok(_) => {
                    MENTOR_REPLIES_TOTAL.with_label_values(&["empty"]).inc();
                    tracing::warn!("Mentor returned an empty reply for chat {}", chat_id);
                    EMPTY_REPLY.to_string()
                }
                Err(e) => {
                    MENTOR_REPLIES_TOTAL.with_label_values(&["error"]).inc();
                    tracing::error!("Mentor completion failed for chat {}: {:#}", chat_id, e);
                    CONNECTION_ERROR.to_string()
                }
            }
        };

        let reply = message(ChatRole::Model, &reply_text);
        messages.push(reply.clone());
        chat.touch();

        Some(SendMessageResponse {
            chat_id: chat_id.to_string(),
            user_message,
            reply,
        })
    }
}

/// The part of a transcript sent upstream: the conversation has to open with
/// a user turn, so the seeded model messages before it are left out.
fn conversation(messages: &[ChatMessage]) -> &[ChatMessage] {
    let start = messages
        .iter()
        .position(|message| message.role == ChatRole::User)
        .unwrap_or(messages.len());
    &messages[start..]
}

fn message(role: ChatRole, text: &str) -> ChatMessage {
    ChatMessage {
        id: Uuid::new_v4().to_string(),
        role,
        text: text.to_string(),
        timestamp: Utc::now(),
    }
}
