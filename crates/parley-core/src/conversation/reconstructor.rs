//! Rebuilding call arguments from a continuation id

use std::sync::Arc;

use super::error::{ConversationError, ConversationResult};
use super::history::{build_embedded_history, build_message_history, embed_prompt};
use crate::budget::TokenAllocation;
use crate::config::{ConversationConfig, HistoryMode};
use crate::logging::Logger;
use crate::providers::ModelProviderRegistry;
use crate::routing::{ModelRouter, RouteRequest};
use crate::storage::ThreadStore;
use crate::types::{is_auto, is_reserved, keys, Arguments, ConversationTurn, ModelCategory, ModelContext};

/// Keys that only ever apply to the call that set them
const PER_CALL_KEYS: &[&str] = &[keys::TEMPERATURE, keys::THINKING_MODE, keys::MODEL, keys::CONTINUATION_ID];

/// Provider label used when sizing a budget for a model nobody serves yet
const UNKNOWN_PROVIDER: &str = "unknown";

/// Per-call inputs beyond the arguments themselves
#[derive(Debug, Clone, Copy)]
pub struct ReconstructRequest<'a> {
    pub tool_name: &'a str,
    pub continuation_id: &'a str,
    pub category: ModelCategory,
    pub session_fingerprint: Option<&'a str>,
}

/// Rebuilds enriched arguments for a call that continues a thread
pub struct ContextReconstructor {
    threads: Arc<dyn ThreadStore>,
    providers: Arc<dyn ModelProviderRegistry>,
    router: Arc<ModelRouter>,
    config: ConversationConfig,
}

impl ContextReconstructor {
    pub fn new(
        threads: Arc<dyn ThreadStore>,
        providers: Arc<dyn ModelProviderRegistry>,
        router: Arc<ModelRouter>,
        config: ConversationConfig,
    ) -> Self {
        Self {
            threads,
            providers,
            router,
            config,
        }
    }

    /// Enrich `arguments` with the thread behind `request.continuation_id`
    ///
    /// On error the arguments are dropped untouched; nothing is enriched.
    /// The new user turn is the only store mutation, and its failure is
    /// logged rather than returned.
    pub async fn reconstruct(
        &self,
        request: ReconstructRequest<'_>,
        mut arguments: Arguments,
        logger: &Arc<dyn Logger>,
    ) -> ConversationResult<Arguments> {
        let continuation_id = request.continuation_id;
        let thread = self
            .threads
            .get_thread(continuation_id)
            .await?
            .ok_or_else(|| ConversationError::NotFound {
                continuation_id: continuation_id.to_string(),
            })?;

        if self.config.enforce_session_scoping {
            if let Some(stored) = thread.session_fingerprint.as_deref() {
                if request.session_fingerprint != Some(stored) {
                    if !self.config.allow_cross_session {
                        return Err(ConversationError::SessionMismatch {
                            continuation_id: continuation_id.to_string(),
                        });
                    }
                    logger.warn(&format!(
                        "[Reconstructor] Thread {} used from a different session (cross-session allowed)",
                        continuation_id
                    ));
                }
            }
        }

        let original_prompt = arguments.original_user_text().unwrap_or_default().to_string();
        let user_turn = ConversationTurn::user(original_prompt.clone())
            .with_files(arguments.files())
            .with_images(arguments.images())
            .with_tool(request.tool_name);
        match self.threads.add_turn(continuation_id, user_turn).await {
            Ok(true) => {}
            Ok(false) => logger.warn(&format!(
                "[Reconstructor] Could not append user turn to {} (turn limit reached or thread closed)",
                continuation_id
            )),
            Err(e) => logger.warn(&format!(
                "[Reconstructor] Failed to append user turn to {}: {}",
                continuation_id, e
            )),
        }

        let previous_model = thread.last_assistant_model().map(str::to_string);
        let requested = arguments.model().map(str::to_string);
        match (&requested, &previous_model) {
            (Some(current), Some(previous))
                if !is_auto(Some(current.as_str())) && !current.eq_ignore_ascii_case(previous) =>
            {
                logger.warn(&format!(
                    "[Reconstructor] Model changed mid-conversation on {}: {} -> {}",
                    continuation_id, previous, current
                ));
                arguments.set(keys::MODEL_SWITCHED_FROM, previous.clone());
            }
            (current, Some(previous)) if is_auto(current.as_deref()) => {
                logger.debug(&format!("[Reconstructor] Locking {} to model {}", continuation_id, previous));
                arguments.set(keys::MODEL, previous.clone());
                arguments.set(keys::MODEL_LOCKED, true);
            }
            _ => {}
        }

        let seed_model = match arguments.model() {
            Some(model) if !is_auto(Some(model)) => model.to_string(),
            model => {
                self.router
                    .route(&RouteRequest {
                        tool_name: request.tool_name,
                        requested_model: model,
                        arguments: &arguments,
                        category: request.category,
                    })
                    .model
            }
        };
        let context = ModelContext::new(
            seed_model.clone(),
            self.providers
                .get_provider_for_model(&seed_model)
                .unwrap_or_else(|| UNKNOWN_PROVIDER.to_string()),
            &self.providers.get_model_capabilities(&seed_model).unwrap_or_default(),
        );
        let allocation = TokenAllocation::for_context(&context);

        let remaining = match self.config.history_mode {
            HistoryMode::Embedded => {
                let history = build_embedded_history(&thread, allocation.history_tokens, self.config.max_turns);
                let enhanced = embed_prompt(&history, &original_prompt);
                let prompt_key = if arguments.contains(keys::PROMPT) || !arguments.contains(keys::STEP) {
                    keys::PROMPT
                } else {
                    keys::STEP
                };
                arguments.set(prompt_key, enhanced);
                allocation.remaining_after(history.tokens)
            }
            HistoryMode::Messages => {
                let messages = build_message_history(&thread, allocation.history_tokens);
                arguments.set_reserved(keys::CONVERSATION_MESSAGES, &messages)?;
                allocation.content_tokens
            }
        };
        arguments.set(keys::ORIGINAL_PROMPT, original_prompt);
        arguments.set(keys::REMAINING_TOKENS, remaining);

        for (key, value) in &thread.initial_context {
            if PER_CALL_KEYS.contains(&key.as_str()) || is_reserved(key) {
                continue;
            }
            if arguments.is_unset(key) {
                arguments.set(key.clone(), value.clone());
            }
        }

        logger.debug(&format!(
            "[Reconstructor] Rebuilt {} ({} prior turns, seed model {}, {} tokens remaining)",
            continuation_id,
            thread.turns.len(),
            seed_model,
            remaining
        ));
        Ok(arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoutingConfig;
    use crate::logging::{LogLevel, MemoryLogger};
    use crate::providers::StaticProviderRegistry;
    use crate::storage::MemoryThreadStore;
    use crate::types::{ModelCapabilities, ModelSpec, ProviderConfig};
    use serde_json::{json, Map, Value};
    use std::time::Duration;

    struct Fixture {
        store: Arc<MemoryThreadStore>,
        reconstructor: ContextReconstructor,
        memory: Arc<MemoryLogger>,
        logger: Arc<dyn Logger>,
    }

    fn fixture(config: ConversationConfig) -> Fixture {
        let store = Arc::new(MemoryThreadStore::new(Duration::from_secs(3600), config.max_turns));
        let providers = Arc::new(StaticProviderRegistry::new(
            vec![ProviderConfig::new("gemini").with_model(ModelSpec::new(
                "flash",
                ModelCapabilities {
                    context_window: 100_000,
                    ..Default::default()
                },
            ))],
            &[],
        ));
        let router = Arc::new(ModelRouter::new(RoutingConfig {
            default_model: "flash".into(),
            ..Default::default()
        }));
        let memory = Arc::new(MemoryLogger::new());
        Fixture {
            reconstructor: ContextReconstructor::new(store.clone(), providers, router, config),
            store,
            logger: memory.clone(),
            memory,
        }
    }

    fn args(value: Value) -> Arguments {
        Arguments::from_value(value).unwrap()
    }

    fn request<'a>(id: &'a str) -> ReconstructRequest<'a> {
        ReconstructRequest {
            tool_name: "chat",
            continuation_id: id,
            category: ModelCategory::Balanced,
            session_fingerprint: None,
        }
    }

    async fn seeded(f: &Fixture, initial: Map<String, Value>, fingerprint: Option<&str>) -> String {
        let id = f
            .store
            .create_thread("chat", initial, fingerprint.map(str::to_string))
            .await
            .unwrap()
            .to_string();
        f.store.add_turn(&id, ConversationTurn::user("hello").with_tool("chat")).await.unwrap();
        f.store
            .add_turn(
                &id,
                ConversationTurn::assistant("hi there").with_tool("chat").with_model("gemini", "flash"),
            )
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let f = fixture(ConversationConfig::default());
        let err = f
            .reconstructor
            .reconstruct(request("not-a-thread"), args(json!({"prompt": "x"})), &f.logger)
            .await
            .unwrap_err();
        assert!(matches!(err, ConversationError::NotFound { .. }));
        assert!(err.to_string().contains("without continuation_id"));
    }

    #[tokio::test]
    async fn appends_user_turn_and_embeds_history() {
        let f = fixture(ConversationConfig::default());
        let id = seeded(&f, Map::new(), None).await;

        let out = f
            .reconstructor
            .reconstruct(request(&id), args(json!({"prompt": "follow up", "files": ["x.rs"]})), &f.logger)
            .await
            .unwrap();

        let prompt = out.get_str(keys::PROMPT).unwrap();
        assert!(prompt.contains("hi there"));
        assert!(prompt.ends_with("=== NEW USER INPUT ===\nfollow up"));
        assert_eq!(out.get_str(keys::ORIGINAL_PROMPT), Some("follow up"));
        assert!(out.get_u64(keys::REMAINING_TOKENS).unwrap() < 60_000);

        let thread = f.store.get_thread(&id).await.unwrap().unwrap();
        let last = thread.turns.last().unwrap();
        assert_eq!(last.content, "follow up");
        assert_eq!(last.files, vec!["x.rs".to_string()]);
    }

    #[tokio::test]
    async fn auto_model_is_locked_to_previous() {
        let f = fixture(ConversationConfig::default());
        let id = seeded(&f, Map::new(), None).await;

        let out = f
            .reconstructor
            .reconstruct(request(&id), args(json!({"prompt": "more", "model": "auto"})), &f.logger)
            .await
            .unwrap();
        assert_eq!(out.model(), Some("flash"));
        assert!(out.model_locked());
    }

    #[tokio::test]
    async fn model_change_is_labelled_not_corrected() {
        let f = fixture(ConversationConfig::default());
        let id = seeded(&f, Map::new(), None).await;

        let out = f
            .reconstructor
            .reconstruct(request(&id), args(json!({"prompt": "more", "model": "o3"})), &f.logger)
            .await
            .unwrap();
        assert_eq!(out.model(), Some("o3"));
        assert!(!out.model_locked());
        assert_eq!(out.get_str(keys::MODEL_SWITCHED_FROM), Some("flash"));
        assert!(f.memory.contains(LogLevel::Warn, "flash -> o3"));
    }

    #[tokio::test]
    async fn initial_context_fills_unset_keys_only() {
        let f = fixture(ConversationConfig::default());
        let initial = json!({
            "focus": "security",
            "temperature": 0.2,
            "thinking_mode": "high",
            "model": "pro",
            "severity": "high",
            "_resolved_model_name": "pro"
        });
        let id = seeded(&f, initial.as_object().unwrap().clone(), None).await;

        let out = f
            .reconstructor
            .reconstruct(request(&id), args(json!({"prompt": "go", "severity": "low"})), &f.logger)
            .await
            .unwrap();
        assert_eq!(out.get_str("focus"), Some("security"));
        assert_eq!(out.get_str("severity"), Some("low"));
        assert!(out.is_unset(keys::TEMPERATURE));
        assert!(out.is_unset(keys::THINKING_MODE));
        assert!(out.is_unset(keys::RESOLVED_MODEL_NAME));
        assert_eq!(out.model(), Some("flash"));
    }

    #[tokio::test]
    async fn session_mismatch_fails_closed() {
        let config = ConversationConfig {
            enforce_session_scoping: true,
            ..Default::default()
        };
        let f = fixture(config);
        let id = seeded(&f, Map::new(), Some("session-a")).await;

        let mut req = request(&id);
        req.session_fingerprint = Some("session-b");
        let err = f
            .reconstructor
            .reconstruct(req, args(json!({"prompt": "x"})), &f.logger)
            .await
            .unwrap_err();
        assert!(matches!(err, ConversationError::SessionMismatch { .. }));

        let thread = f.store.get_thread(&id).await.unwrap().unwrap();
        assert_eq!(thread.turns.len(), 2);
    }

    #[tokio::test]
    async fn cross_session_allowed_is_logged() {
        let config = ConversationConfig {
            enforce_session_scoping: true,
            allow_cross_session: true,
            ..Default::default()
        };
        let f = fixture(config);
        let id = seeded(&f, Map::new(), Some("session-a")).await;

        let mut req = request(&id);
        req.session_fingerprint = Some("session-b");
        f.reconstructor
            .reconstruct(req, args(json!({"prompt": "x"})), &f.logger)
            .await
            .unwrap();
        assert!(f.memory.contains(LogLevel::Warn, "different session"));
    }

    #[tokio::test]
    async fn turn_limit_does_not_block() {
        let config = ConversationConfig {
            max_turns: 2,
            ..Default::default()
        };
        let f = fixture(config);
        let id = seeded(&f, Map::new(), None).await;

        let out = f
            .reconstructor
            .reconstruct(request(&id), args(json!({"prompt": "third"})), &f.logger)
            .await
            .unwrap();
        assert_eq!(out.get_str(keys::ORIGINAL_PROMPT), Some("third"));
        assert!(f.memory.contains(LogLevel::Warn, "turn limit reached"));
    }

    #[tokio::test]
    async fn message_mode_skips_subtraction() {
        let config = ConversationConfig {
            history_mode: HistoryMode::Messages,
            ..Default::default()
        };
        let f = fixture(config);
        let id = seeded(&f, Map::new(), None).await;

        let out = f
            .reconstructor
            .reconstruct(request(&id), args(json!({"prompt": "next"})), &f.logger)
            .await
            .unwrap();
        assert_eq!(out.get_str(keys::PROMPT), Some("next"));
        assert_eq!(out.get_u64(keys::REMAINING_TOKENS), Some(60_000));
        let messages: Vec<Value> = out.get_reserved(keys::CONVERSATION_MESSAGES).unwrap();
        assert_eq!(messages.len(), 2);
    }
}
