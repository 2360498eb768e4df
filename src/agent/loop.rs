//! Agent loop implementation
//!
//! Consumes inbound messages one at a time, drives the tool-calling
//! conversation with the provider, persists the turn and publishes the reply.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tokio::sync::{watch, RwLock};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::bus::{InboundMessage, MessageBus, OutboundMessage};
use crate::config::Config;
use crate::error::Result;
use crate::providers::{ChatOptions, LLMProvider, LLMResponse};
use crate::session::{Message, SessionManager, ToolCall};
use crate::tools::{Tool, ToolContext, ToolRegistry};
use crate::utils::panic_message;
use crate::utils::string::preview;

use super::context::ContextBuilder;

/// Reply used when the final model response carries no text.
pub const PLACEHOLDER_REPLY: &str = "I completed the requested actions.";

/// The agent that turns inbound messages into replies.
///
/// Messages are handled strictly one after another, in the order they were
/// queued. A failed turn publishes an error reply and leaves the session
/// untouched; the loop keeps running.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use chipclaw::agent::AgentLoop;
/// use chipclaw::bus::MessageBus;
/// use chipclaw::config::Config;
/// use chipclaw::providers::OpenAIProvider;
/// use chipclaw::session::SessionManager;
/// use chipclaw::tools::EchoTool;
///
/// let config = Arc::new(Config::default());
/// let bus = Arc::new(MessageBus::new());
/// let provider = Arc::new(OpenAIProvider::new("sk-xxx"));
/// let agent = AgentLoop::new(config, SessionManager::new_memory(), bus, provider);
///
/// agent.register_tool(Box::new(EchoTool)).await;
/// agent.run().await;
/// ```
pub struct AgentLoop {
    config: Arc<Config>,
    sessions: SessionManager,
    bus: Arc<MessageBus>,
    provider: Arc<dyn LLMProvider>,
    tools: RwLock<ToolRegistry>,
    context_builder: ContextBuilder,
    running: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
}

impl AgentLoop {
    pub fn new(
        config: Arc<Config>,
        sessions: SessionManager,
        bus: Arc<MessageBus>,
        provider: Arc<dyn LLMProvider>,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        let context_builder = ContextBuilder::new(&config.workspace_path());
        Self {
            config,
            sessions,
            bus,
            provider,
            tools: RwLock::new(ToolRegistry::new()),
            context_builder,
            running: AtomicBool::new(false),
            shutdown_tx,
        }
    }

    /// Replace the context builder, e.g. to point at another workspace.
    pub fn with_context_builder(mut self, context_builder: ContextBuilder) -> Self {
        self.context_builder = context_builder;
        self
    }

    pub async fn register_tool(&self, tool: Box<dyn Tool>) {
        self.tools.write().await.register(tool);
    }

    pub async fn tool_count(&self) -> usize {
        self.tools.read().await.len()
    }

    pub async fn tool_names(&self) -> Vec<String> {
        self.tools
            .read()
            .await
            .names()
            .into_iter()
            .map(String::from)
            .collect()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run one turn and return the final reply text.
    ///
    /// Tool exchanges live only in the request message list; the session
    /// gains exactly the user record and the final assistant record, and is
    /// saved once. A save failure is logged and does not fail the turn.
    ///
    /// # Errors
    /// Returns the provider error when any LLM call fails. The session is not
    /// modified in that case.
    pub async fn process_message(&self, msg: &Arc<InboundMessage>) -> Result<String> {
        let agent = &self.config.agent;
        let mut session = self.sessions.get_or_create(&msg.session_key).await;
        let mut messages = self.context_builder.build_messages(
            session.get_history(agent.max_session_messages),
            &msg.content,
            Some(&msg.channel),
            Some(&msg.chat_id),
        );

        let workspace = self.context_builder.workspace().to_string_lossy().to_string();
        let tool_ctx = ToolContext::new()
            .with_channel(&msg.channel, &msg.chat_id)
            .with_workspace(&workspace);
        let tool_definitions = self.tools.read().await.definitions();
        let options = ChatOptions::new()
            .with_max_tokens(agent.max_tokens)
            .with_temperature(agent.temperature);

        let mut last_response: Option<LLMResponse> = None;
        for iteration in 1..=agent.max_tool_iterations {
            debug!(
                iteration,
                max = agent.max_tool_iterations,
                "Calling LLM"
            );
            let response = self
                .provider
                .chat(
                    messages.clone(),
                    tool_definitions.clone(),
                    Some(&agent.model),
                    options.clone(),
                )
                .await?;

            if !response.has_tool_calls() {
                last_response = Some(response);
                break;
            }

            let calls: Vec<ToolCall> = response
                .tool_calls
                .iter()
                .map(|call| call.to_tool_call())
                .collect();
            messages.push(Message::assistant_with_tools(
                response.content.as_deref().unwrap_or_default(),
                calls,
            ));

            for call in &response.tool_calls {
                info!(tool = %call.name, id = %call.id, "Executing tool");
                let result = {
                    let tools = self.tools.read().await;
                    tools
                        .execute(&call.name, call.arguments.clone(), &tool_ctx)
                        .await
                };
                debug!(tool = %call.name, result = %preview(&result, 200), "Tool finished");
                messages.push(Message::tool_result(&call.id, &result));
            }

            if iteration == agent.max_tool_iterations {
                warn!(
                    iterations = iteration,
                    "Tool loop hit the iteration limit, finalizing"
                );
            }
            last_response = Some(response);
        }

        let content = last_response
            .and_then(|r| r.content)
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| PLACEHOLDER_REPLY.to_string());

        session.add_message(Message::user(&msg.content));
        session.add_message(Message::assistant(&content));
        if let Err(e) = self.sessions.save(&session).await {
            error!(session = %session.key, error = %e, "Failed to save session");
        }

        Ok(content)
    }

    /// Process `msg` and publish the reply, or an error reply on failure.
    ///
    /// Never fails: every error ends up as an outbound message or a log line.
    /// A panic inside the turn is treated like an error and answered the
    /// same way.
    pub async fn handle_message(&self, msg: InboundMessage) {
        let msg = Arc::new(msg);
        let start = Instant::now();

        let outcome = AssertUnwindSafe(self.process_message(&msg))
            .catch_unwind()
            .await;
        let failure = match outcome {
            Ok(Ok(content)) => {
                info!(
                    latency_ms = start.elapsed().as_millis() as u64,
                    response_len = content.len(),
                    "Request completed"
                );
                self.publish(OutboundMessage::reply_to(&msg, &content)).await;
                return;
            }
            Ok(Err(e)) => {
                error!(
                    latency_ms = start.elapsed().as_millis() as u64,
                    error = %e,
                    "Request failed"
                );
                e.to_string()
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(
                    latency_ms = start.elapsed().as_millis() as u64,
                    panic = %message,
                    "Request panicked"
                );
                format!("Panic: {}", message)
            }
        };

        self.publish(OutboundMessage::new(
            &msg.channel,
            &msg.chat_id,
            &format!("Error processing message: {}", failure),
        ))
        .await;
    }

    async fn publish(&self, outbound: OutboundMessage) {
        if let Err(e) = self.bus.publish_outbound(outbound).await {
            error!(error = %e, "Failed to publish outbound message");
        }
    }

    /// Consume inbound messages until `stop()` is called or the inbound
    /// queue is closed and drained. Returns immediately if already running.
    ///
    /// A `stop()` that arrives before `run()` starts is kept: the next
    /// `run()` consumes it and returns without handling any message.
    pub async fn run(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Agent loop already running");
            return;
        }
        let _guard = RunGuard { agent: self };

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        if *shutdown_rx.borrow_and_update() {
            info!("Agent loop stopped before it started");
            return;
        }
        info!(provider = %self.provider.name(), model = %self.config.agent.model, "Starting agent loop");

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow_and_update() {
                        info!("Received shutdown signal");
                        break;
                    }
                }
                msg = self.bus.consume_inbound() => {
                    let Some(msg) = msg else {
                        info!("Inbound queue closed");
                        break;
                    };
                    let span = info_span!(
                        "request",
                        request_id = %uuid::Uuid::new_v4(),
                        channel = %msg.channel,
                        chat_id = %msg.chat_id,
                    );
                    async {
                        info!(sender = %msg.sender_id, content = %preview(&msg.content, 80), "Processing message");
                        self.handle_message(msg).await;
                    }
                    .instrument(span)
                    .await;
                }
            }
        }

        info!("Agent loop stopped");
    }

    /// Signal `run()` to return after the message in progress.
    pub fn stop(&self) {
        info!("Stopping agent loop");
        self.shutdown_tx.send_replace(true);
    }
}

/// Resets the run state however `run()` exits, so the loop can be restarted.
struct RunGuard<'a> {
    agent: &'a AgentLoop,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.agent.shutdown_tx.send_replace(false);
        self.agent.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChipClawError;
    use crate::providers::{ToolCallRequest, ToolDefinition};
    use crate::session::Role;
    use crate::tools::EchoTool;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Replays canned responses and records every request.
    struct ScriptedProvider {
        responses: Mutex<VecDeque<Result<LLMResponse>>>,
        requests: Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<Result<LLMResponse>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        fn request(&self, index: usize) -> Vec<Message> {
            self.requests.lock().unwrap()[index].clone()
        }
    }

    #[async_trait]
    impl LLMProvider for ScriptedProvider {
        async fn chat(
            &self,
            messages: Vec<Message>,
            _tools: Vec<ToolDefinition>,
            _model: Option<&str>,
            _options: ChatOptions,
        ) -> Result<LLMResponse> {
            self.requests.lock().unwrap().push(messages);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(LLMResponse::text("fallback")))
        }

        fn default_model(&self) -> &str {
            "scripted"
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn echo_call(id: &str, text: &str) -> LLMResponse {
        LLMResponse::with_tools(vec![ToolCallRequest::new(
            id,
            "echo",
            json!({ "message": text }),
        )])
    }

    fn agent_with(provider: Arc<ScriptedProvider>, dir: &TempDir) -> AgentLoop {
        let mut config = Config::default();
        config.agent.workspace = dir.path().to_string_lossy().to_string();
        AgentLoop::new(
            Arc::new(config),
            SessionManager::new_memory(),
            Arc::new(MessageBus::new()),
            provider,
        )
    }

    fn inbound(content: &str) -> Arc<InboundMessage> {
        Arc::new(InboundMessage::new("uart", "uart_user", "uart_default", content))
    }

    #[tokio::test]
    async fn test_tool_results_feed_next_call() {
        let dir = TempDir::new().unwrap();
        let provider = ScriptedProvider::new(vec![
            Ok(echo_call("call_1", "pong")),
            Ok(LLMResponse::text("The echo said pong")),
        ]);
        let agent = agent_with(provider.clone(), &dir);
        agent.register_tool(Box::new(EchoTool)).await;

        let reply = agent.process_message(&inbound("ping")).await.unwrap();
        assert_eq!(reply, "The echo said pong");
        assert_eq!(provider.calls(), 2);

        let second = provider.request(1);
        let n = second.len();
        assert_eq!(second[n - 2].role, Role::Assistant);
        assert_eq!(second[n - 2].tool_calls.as_ref().unwrap()[0].id, "call_1");
        assert_eq!(second[n - 1].role, Role::Tool);
        assert_eq!(second[n - 1].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(second[n - 1].content, "pong");
    }

    #[tokio::test]
    async fn test_tool_calls_execute_in_model_order() {
        let dir = TempDir::new().unwrap();
        let provider = ScriptedProvider::new(vec![
            Ok(LLMResponse::with_tools(vec![
                ToolCallRequest::new("a", "echo", json!({"message": "first"})),
                ToolCallRequest::new("b", "missing_tool", json!({})),
                ToolCallRequest::new("c", "echo", json!({"message": "third"})),
            ])),
            Ok(LLMResponse::text("ok")),
        ]);
        let agent = agent_with(provider.clone(), &dir);
        agent.register_tool(Box::new(EchoTool)).await;

        agent.process_message(&inbound("go")).await.unwrap();

        let tool_records: Vec<(String, String)> = provider
            .request(1)
            .into_iter()
            .filter(|m| m.role == Role::Tool)
            .map(|m| (m.tool_call_id.unwrap(), m.content))
            .collect();
        assert_eq!(
            tool_records,
            vec![
                ("a".to_string(), "first".to_string()),
                (
                    "b".to_string(),
                    "Error: Tool 'missing_tool' not found".to_string()
                ),
                ("c".to_string(), "third".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_iteration_limit_uses_placeholder() {
        let dir = TempDir::new().unwrap();
        let responses = (0..10).map(|i| Ok(echo_call(&format!("c{}", i), "again"))).collect();
        let provider = ScriptedProvider::new(responses);

        let mut config = Config::default();
        config.agent.workspace = dir.path().to_string_lossy().to_string();
        config.agent.max_tool_iterations = 3;
        let agent = AgentLoop::new(
            Arc::new(config),
            SessionManager::new_memory(),
            Arc::new(MessageBus::new()),
            provider.clone(),
        );
        agent.register_tool(Box::new(EchoTool)).await;

        let reply = agent.process_message(&inbound("loop forever")).await.unwrap();
        assert_eq!(provider.calls(), 3);
        assert_eq!(reply, PLACEHOLDER_REPLY);
    }

    #[tokio::test]
    async fn test_session_gains_user_and_assistant_only() {
        let dir = TempDir::new().unwrap();
        let provider = ScriptedProvider::new(vec![
            Ok(echo_call("call_1", "x")),
            Ok(LLMResponse::text("Done")),
        ]);
        let agent = agent_with(provider, &dir);
        agent.register_tool(Box::new(EchoTool)).await;

        agent.process_message(&inbound("do it")).await.unwrap();

        let session = agent.sessions().get_or_create("uart:uart_default").await;
        assert_eq!(session.len(), 2);
        assert_eq!(session.messages[0], Message::user("do it"));
        assert_eq!(session.messages[1], Message::assistant("Done"));
    }

    #[tokio::test]
    async fn test_history_window_is_replayed() {
        let dir = TempDir::new().unwrap();
        let provider = ScriptedProvider::new(vec![
            Ok(LLMResponse::text("one")),
            Ok(LLMResponse::text("two")),
        ]);
        let agent = agent_with(provider.clone(), &dir);

        agent.process_message(&inbound("first")).await.unwrap();
        agent.process_message(&inbound("second")).await.unwrap();

        let request = provider.request(1);
        let contents: Vec<&str> = request[1..].iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "one", "second"]);
    }

    #[tokio::test]
    async fn test_provider_error_leaves_session_untouched() {
        let dir = TempDir::new().unwrap();
        let provider = ScriptedProvider::new(vec![Err(ChipClawError::Provider(
            "HTTP 500: overloaded".to_string(),
        ))]);
        let agent = agent_with(provider, &dir);

        agent
            .handle_message(InboundMessage::new("mqtt", "u", "room1", "hi"))
            .await;

        let reply = agent.bus().consume_outbound().await.unwrap();
        assert_eq!(reply.channel, "mqtt");
        assert_eq!(reply.chat_id, "room1");
        assert!(reply.content.starts_with("Error processing message:"));
        assert!(reply.content.contains("HTTP 500"));
        assert!(agent.sessions().get_or_create("mqtt:room1").await.is_empty());
    }

    #[tokio::test]
    async fn test_handle_message_reply_points_at_inbound() {
        let dir = TempDir::new().unwrap();
        let provider = ScriptedProvider::new(vec![Ok(LLMResponse::text("Done"))]);
        let agent = agent_with(provider, &dir);

        agent
            .handle_message(InboundMessage::new("uart", "uart_user", "uart_default", "hi"))
            .await;

        let reply = agent.bus().consume_outbound().await.unwrap();
        assert_eq!(reply.content, "Done");
        assert_eq!(reply.reply_to.as_ref().unwrap().content, "hi");
    }

    #[tokio::test]
    async fn test_assistant_record_echoes_wire_arguments() {
        let dir = TempDir::new().unwrap();
        let truncated = r#"{"message": "hi""#;
        let provider = ScriptedProvider::new(vec![
            Ok(LLMResponse::with_tools(vec![ToolCallRequest::from_wire(
                "call_1",
                "echo",
                truncated,
                json!({ "_raw": truncated }),
            )])),
            Ok(LLMResponse::text("ok")),
        ]);
        let agent = agent_with(provider.clone(), &dir);
        agent.register_tool(Box::new(EchoTool)).await;

        agent.process_message(&inbound("say hi")).await.unwrap();

        let request = provider.request(1);
        let assistant = request
            .iter()
            .find(|m| m.tool_calls.is_some())
            .expect("assistant record with tool calls");
        let calls = assistant.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].id, "call_1");
        assert_eq!(calls[0].arguments, truncated);
    }

    /// Panics on the first call, answers normally afterwards.
    struct FlakyProvider {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl LLMProvider for FlakyProvider {
        async fn chat(
            &self,
            _messages: Vec<Message>,
            _tools: Vec<ToolDefinition>,
            _model: Option<&str>,
            _options: ChatOptions,
        ) -> Result<LLMResponse> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                *calls += 1;
                *calls
            };
            if call == 1 {
                panic!("decoder state corrupted");
            }
            Ok(LLMResponse::text("recovered"))
        }

        fn default_model(&self) -> &str {
            "flaky"
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    #[tokio::test]
    async fn test_provider_panic_becomes_error_reply() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.agent.workspace = dir.path().to_string_lossy().to_string();
        let bus = Arc::new(MessageBus::new());
        let agent = Arc::new(AgentLoop::new(
            Arc::new(config),
            SessionManager::new_memory(),
            bus.clone(),
            Arc::new(FlakyProvider {
                calls: Mutex::new(0),
            }),
        ));

        let runner = {
            let agent = Arc::clone(&agent);
            tokio::spawn(async move { agent.run().await })
        };
        bus.publish_inbound(InboundMessage::new("uart", "u", "bench", "first"))
            .await
            .unwrap();
        bus.publish_inbound(InboundMessage::new("uart", "u", "bench", "second"))
            .await
            .unwrap();

        let timeout = std::time::Duration::from_secs(5);
        let failed = tokio::time::timeout(timeout, bus.consume_outbound())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(failed.chat_id, "bench");
        assert!(failed.reply_to.is_none());
        assert_eq!(
            failed.content,
            "Error processing message: Panic: decoder state corrupted"
        );

        let ok = tokio::time::timeout(timeout, bus.consume_outbound())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ok.content, "recovered");
        assert!(agent.is_running());
        assert!(!runner.is_finished());

        // Only the turn that completed was persisted.
        let session = agent.sessions().get_or_create("uart:bench").await;
        assert_eq!(session.len(), 2);
        assert_eq!(session.messages[0].content, "second");

        agent.stop();
        tokio::time::timeout(timeout, runner).await.unwrap().unwrap();
        assert!(!agent.is_running());
    }

    #[tokio::test]
    async fn test_stop_before_run_is_honored() {
        let dir = TempDir::new().unwrap();
        let provider = ScriptedProvider::new(vec![]);
        let agent = agent_with(provider.clone(), &dir);
        agent
            .bus()
            .publish_inbound(InboundMessage::new("uart", "u", "c", "queued"))
            .await
            .unwrap();

        agent.stop();
        tokio::time::timeout(std::time::Duration::from_millis(200), agent.run())
            .await
            .expect("pending stop should end run at once");
        assert!(!agent.is_running());
        assert_eq!(provider.calls(), 0);
        assert_eq!(agent.bus().inbound_len(), 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_signal() {
        let dir = TempDir::new().unwrap();
        let agent = Arc::new(agent_with(ScriptedProvider::new(vec![]), &dir));

        let runner = {
            let agent = Arc::clone(&agent);
            tokio::spawn(async move { agent.run().await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(agent.is_running());

        agent.stop();
        tokio::time::timeout(std::time::Duration::from_secs(2), runner)
            .await
            .unwrap()
            .unwrap();
        assert!(!agent.is_running());
    }
}
