pub mod config;
pub mod initialization;
pub mod input;
pub mod logging_system;
pub mod shutdown;

pub use config::{Config, ConfigError, LogFormat, LogLevel, LoggingMode};
pub use initialization::InitializationError;
pub use input::{ControlCommand, InputLine, parse_line};
pub use logging_system::{LoggingSystem, setup_logging_safe};
pub use shutdown::{ShutdownSignal, ShutdownTrigger};

use crate::host::{HostLifecycle, Visibility};
use crate::logger::{EventLogger, LoggerContext, LoggerRegistry};
use crate::sender::{EventSender, HttpBeacon, HttpTransport};
use crate::storage::DiskStorage;
use std::process;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

/// The wired-up logger plus the host it runs in.
pub struct App {
    logger: EventLogger,
    lifecycle: Arc<HostLifecycle>,
    registry: Arc<LoggerRegistry>,
}

impl App {
    pub async fn from_args<I, T>(args: I) -> Result<Self, Box<dyn std::error::Error + Send + Sync>>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let config = Config::from_args_and_env(args)?;
        setup_logging_safe(config.log_level, config.log_format)?;
        Ok(Self::from_config(&config)?)
    }

    pub fn from_config(config: &Config) -> Result<Self, InitializationError> {
        let transport = HttpTransport::new(config.transport_config()).map_err(|e| {
            InitializationError::ResourceInitFailed {
                resource: "http transport".to_string(),
                source: Box::new(e),
            }
        })?;

        let lifecycle = Arc::new(HostLifecycle::new(config.interactive));
        let registry = Arc::new(LoggerRegistry::new());
        let storage = Arc::new(DiskStorage::new(config.storage_config()));

        let sender = EventSender::new(
            config.sender_config()?,
            Arc::new(transport.clone()),
            lifecycle.clone(),
        )
        .with_beacon(Arc::new(HttpBeacon::new(transport)));

        let context =
            LoggerContext::new(lifecycle.clone(), storage).with_registry(registry.clone());
        let logger = EventLogger::new(config.logger_options(), sender, context);

        info!(
            endpoint = %config.endpoint,
            batch_size = config.batch_size,
            logging_enabled = ?config.logging_enabled,
            "Configured rask-event-logger v{}",
            get_version()
        );

        Ok(Self {
            logger,
            lifecycle,
            registry,
        })
    }

    pub fn logger(&self) -> &EventLogger {
        &self.logger
    }

    pub fn lifecycle(&self) -> &Arc<HostLifecycle> {
        &self.lifecycle
    }

    /// Read stdin until EOF or a termination signal, then shut down.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let (trigger, signal) = ShutdownTrigger::channel();
        let signals = trigger.listen_for_signals();

        let stdin = BufReader::new(tokio::io::stdin());
        let result = self.run_with_input(stdin, signal).await;

        signals.abort();
        result
    }

    pub async fn run_with_input<R>(
        self,
        input: R,
        mut shutdown: ShutdownSignal,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        R: AsyncBufRead + Unpin,
    {
        let dispatcher = self.registry.attach(&self.lifecycle);
        self.logger.start().await;
        info!("rask-event-logger is reading events from stdin");

        let mut lines = input.lines();
        let mut accepted = 0u64;

        let outcome = loop {
            tokio::select! {
                _ = shutdown.wait() => {
                    info!("Shutdown requested");
                    break Ok(());
                }
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if self.handle_line(&line).await {
                            accepted += 1;
                        }
                    }
                    Ok(None) => {
                        debug!("Input closed");
                        break Ok(());
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to read input");
                        break Err(e);
                    }
                },
            }
        };

        self.logger.shutdown().await;
        dispatcher.abort();

        info!(accepted, "rask-event-logger stopped");
        outcome.map_err(Into::into)
    }

    /// Returns true when the line carried an event.
    async fn handle_line(&self, line: &str) -> bool {
        match parse_line(line) {
            Ok(Some(InputLine::Event(event))) => {
                self.logger.enqueue(*event);
                true
            }
            Ok(Some(InputLine::Control(command))) => {
                match command {
                    ControlCommand::Background => self.lifecycle.set_visibility(Visibility::Background),
                    ControlCommand::Foreground => self.lifecycle.set_visibility(Visibility::Foreground),
                    ControlCommand::Flush => self.logger.flush().await,
                    ControlCommand::Unload => self.lifecycle.set_unloading(true),
                }
                false
            }
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "Skipping input line");
                false
            }
        }
    }
}

pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

pub async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args: Vec<String> = std::env::args().collect();

    match App::from_args(args).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("Application error: {}", e);
                process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Configuration error: {e}");
            process::exit(1);
        }
    }

    Ok(())
}
