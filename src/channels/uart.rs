//! UART channel: the line protocol over a serial port.
//!
//! A microcontroller or a USB serial adapter sends one message per line and
//! receives one JSON reply per line. The default identity for plain-text
//! lines is sender `uart_user` in chat `uart_default`.
//!
//! Requires the `serial` feature.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{BufReader, WriteHalf};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_serial::{SerialPortBuilderExt, SerialStream};

use crate::bus::{MessageBus, OutboundMessage};
use crate::config::UartConfig;
use crate::error::{ChipClawError, Result};
use crate::log_component;

use super::line::{self, UART_DEFAULTS};
use super::{BaseChannelConfig, Channel};

pub struct UartChannel {
    config: UartConfig,
    base_config: BaseChannelConfig,
    bus: Arc<MessageBus>,
    writer: Arc<Mutex<Option<WriteHalf<SerialStream>>>>,
    running: Arc<AtomicBool>,
    shutdown_tx: Option<watch::Sender<bool>>,
    reader: Option<JoinHandle<()>>,
}

impl UartChannel {
    pub fn new(config: UartConfig, bus: Arc<MessageBus>) -> Self {
        let base_config = BaseChannelConfig::with_allowlist("uart", config.allowlist.clone());
        Self {
            config,
            base_config,
            bus,
            writer: Arc::new(Mutex::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx: None,
            reader: None,
        }
    }

    pub fn port(&self) -> &str {
        &self.config.port
    }
}

#[async_trait]
impl Channel for UartChannel {
    fn name(&self) -> &str {
        &self.base_config.name
    }

    async fn start(&mut self) -> Result<()> {
        if self.running.load(Ordering::SeqCst) {
            log_component!(warn, "uart", "Channel already running");
            return Ok(());
        }

        let stream = tokio_serial::new(&self.config.port, self.config.baudrate)
            .open_native_async()
            .map_err(|e| {
                ChipClawError::Channel(format!("failed to open {}: {}", self.config.port, e))
            })?;
        let (read_half, write_half) = tokio::io::split(stream);
        *self.writer.lock().await = Some(write_half);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let base_config = self.base_config.clone();
        let bus = self.bus.clone();
        let running = self.running.clone();
        self.reader = Some(tokio::spawn(async move {
            let published = line::read_lines(
                BufReader::new(read_half),
                &base_config,
                &UART_DEFAULTS,
                bus,
                shutdown_rx,
            )
            .await;
            running.store(false, Ordering::SeqCst);
            log_component!(info, "uart", "Reader finished", messages = published);
        }));
        self.shutdown_tx = Some(shutdown_tx);
        self.running.store(true, Ordering::SeqCst);

        log_component!(
            info,
            "uart",
            "Channel started",
            port = %self.config.port,
            baudrate = self.config.baudrate
        );
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
        if let Some(handle) = self.reader.take() {
            if tokio::time::timeout(std::time::Duration::from_secs(2), handle)
                .await
                .is_err()
            {
                log_component!(warn, "uart", "Reader did not stop within timeout");
            }
        }
        self.writer.lock().await.take();
        log_component!(info, "uart", "Channel stopped");
        Ok(())
    }

    async fn send(&self, msg: OutboundMessage) -> Result<()> {
        let mut writer = self.writer.lock().await;
        let Some(port) = writer.as_mut() else {
            return Err(ChipClawError::Channel("uart port not open".into()));
        };
        line::write_reply(port, &msg).await?;
        log_component!(debug, "uart", "Reply sent", chat_id = %msg.chat_id);
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn is_allowed(&self, sender_id: &str) -> bool {
        self.base_config.is_allowed(sender_id)
    }
}
