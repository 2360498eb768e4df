//! Console channel: the line protocol over stdin/stdout.
//!
//! Useful for talking to the agent from a terminal without any hardware
//! attached. Replies are written as JSON lines, the same framing a serial
//! peer would see.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::bus::{MessageBus, OutboundMessage};
use crate::error::{ChipClawError, Result};
use crate::log_component;

use super::line::{self, CONSOLE_DEFAULTS};
use super::{BaseChannelConfig, Channel};

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

pub struct ConsoleChannel {
    config: BaseChannelConfig,
    bus: Arc<MessageBus>,
    /// Taken by the reader task on start. Behind a mutex only so the channel
    /// stays `Sync`; it is accessed through `&mut self`.
    input: std::sync::Mutex<Option<BoxedReader>>,
    output: Arc<Mutex<BoxedWriter>>,
    running: Arc<AtomicBool>,
    shutdown_tx: Option<watch::Sender<bool>>,
    reader: Option<JoinHandle<()>>,
}

impl ConsoleChannel {
    /// A console channel on the process's stdin and stdout.
    pub fn new(bus: Arc<MessageBus>) -> Self {
        Self::with_io(
            bus,
            Box::new(tokio::io::stdin()),
            Box::new(tokio::io::stdout()),
        )
    }

    /// A console channel on arbitrary streams.
    pub fn with_io(bus: Arc<MessageBus>, input: BoxedReader, output: BoxedWriter) -> Self {
        Self {
            config: BaseChannelConfig::new("console"),
            bus,
            input: std::sync::Mutex::new(Some(input)),
            output: Arc::new(Mutex::new(output)),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx: None,
            reader: None,
        }
    }
}

#[async_trait]
impl Channel for ConsoleChannel {
    fn name(&self) -> &str {
        &self.config.name
    }

    /// The input stream can only be consumed once, so a stopped console
    /// channel cannot be restarted.
    async fn start(&mut self) -> Result<()> {
        if self.running.load(Ordering::SeqCst) {
            log_component!(warn, "console", "Channel already running");
            return Ok(());
        }
        let input = self
            .input
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| ChipClawError::Channel("console input already consumed".into()))?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let config = self.config.clone();
        let bus = self.bus.clone();
        self.reader = Some(tokio::spawn(async move {
            let published =
                line::read_lines(BufReader::new(input), &config, &CONSOLE_DEFAULTS, bus, shutdown_rx)
                    .await;
            log_component!(info, "console", "Reader finished", messages = published);
        }));
        self.shutdown_tx = Some(shutdown_tx);
        self.running.store(true, Ordering::SeqCst);
        log_component!(info, "console", "Channel started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
        if let Some(handle) = self.reader.take() {
            // stdin reads block a worker thread and do not observe the
            // shutdown signal until the next line arrives.
            handle.abort();
        }
        log_component!(info, "console", "Channel stopped");
        Ok(())
    }

    async fn send(&self, msg: OutboundMessage) -> Result<()> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(ChipClawError::Channel("console channel not running".into()));
        }
        let mut output = self.output.lock().await;
        line::write_reply(&mut *output, &msg).await
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn is_allowed(&self, sender_id: &str) -> bool {
        self.config.is_allowed(sender_id)
    }
}
