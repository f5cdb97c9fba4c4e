//! The interactive session loop.
//!
//! Lines arrive on one channel and interrupts on another; whatever front-end
//! owns the terminal (or socket, or test) feeds both. The loop never touches
//! the terminal itself.
//!
//! ```text
//! Awaiting Input ──line──▶ Dispatching ──▶ Completed ──▶ Awaiting Input
//!                              │
//!                          interrupt
//!                              ▼
//!                          Cancelled ──same input──▶ Dispatching
//! ```

use chrono::Utc;
use codewright_core::error::{Error, SessionError};
use codewright_core::event::{DomainEvent, EventBus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::runner::{ExecuteOptions, TurnExecutor, TurnOutcome};

/// User-visible notices from the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    /// The in-flight turn was cancelled and will be re-submitted
    Cancelled,
    /// No input arrived in time, or a turn exceeded its timeout
    TimedOut,
    /// A turn completed with this end-task message
    Response(String),
    Error(String),
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionExit {
    /// The user typed an exit keyword
    Exited,
    TimedOut,
    /// The input channel closed
    InputClosed,
}

impl SessionExit {
    pub fn is_success(self) -> bool {
        !matches!(self, SessionExit::TimedOut)
    }
}

enum Idle {
    Line(String),
    Closed,
    TimedOut,
}

pub struct InteractiveSession {
    executor: Arc<dyn TurnExecutor>,
    events: Arc<EventBus>,
    options: ExecuteOptions,
    exit_keywords: Vec<String>,
    idle_timeout: Option<Duration>,
    notices: Option<mpsc::UnboundedSender<SessionNotice>>,
}

impl InteractiveSession {
    pub fn new(executor: Arc<dyn TurnExecutor>, events: Arc<EventBus>) -> Self {
        Self {
            executor,
            events,
            options: ExecuteOptions::default(),
            exit_keywords: vec!["exit".into(), "quit".into()],
            idle_timeout: None,
            notices: None,
        }
    }

    /// Options passed to every turn.
    pub fn with_options(mut self, options: ExecuteOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_exit_keywords(mut self, keywords: Vec<String>) -> Self {
        self.exit_keywords = keywords;
        self
    }

    /// Give up when no input or interrupt arrives for `timeout`.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    pub fn with_notices(mut self, tx: mpsc::UnboundedSender<SessionNotice>) -> Self {
        self.notices = Some(tx);
        self
    }

    fn notify(&self, notice: SessionNotice) {
        if let Some(tx) = &self.notices {
            let _ = tx.send(notice);
        }
    }

    fn is_exit(&self, line: &str) -> bool {
        let line = line.trim();
        self.exit_keywords
            .iter()
            .any(|k| k.eq_ignore_ascii_case(line))
    }

    /// Run until an exit keyword, a timeout, or the input closing.
    pub async fn run(
        &self,
        mut lines: mpsc::Receiver<String>,
        mut interrupts: mpsc::Receiver<()>,
    ) -> SessionExit {
        let mut interrupts_open = true;

        loop {
            let line = match self
                .await_input(&mut lines, &mut interrupts, &mut interrupts_open)
                .await
            {
                Idle::Line(line) => line,
                Idle::Closed => {
                    debug!("Input closed");
                    self.executor.cleanup().await;
                    return SessionExit::InputClosed;
                }
                Idle::TimedOut => {
                    warn!("No input before timeout");
                    self.notify(SessionNotice::TimedOut);
                    self.executor.cleanup().await;
                    return SessionExit::TimedOut;
                }
            };

            if line.trim().is_empty() {
                continue;
            }
            if self.is_exit(&line) {
                info!("Exit requested");
                self.executor.cleanup().await;
                return SessionExit::Exited;
            }

            if let Some(exit) = self
                .dispatch(&line, &mut interrupts, &mut interrupts_open)
                .await
            {
                return exit;
            }
        }
    }

    async fn await_input(
        &self,
        lines: &mut mpsc::Receiver<String>,
        interrupts: &mut mpsc::Receiver<()>,
        interrupts_open: &mut bool,
    ) -> Idle {
        loop {
            let idle = async {
                match self.idle_timeout {
                    Some(limit) => tokio::time::sleep(limit).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                line = lines.recv() => {
                    return match line {
                        Some(line) => Idle::Line(line),
                        None => Idle::Closed,
                    };
                }
                signal = interrupts.recv(), if *interrupts_open => {
                    // Nothing in flight; an interrupt only restarts the idle clock
                    if signal.is_none() {
                        *interrupts_open = false;
                    }
                }
                () = idle => return Idle::TimedOut,
            }
        }
    }

    /// Run `input` until it finishes, re-submitting it after each
    /// cancellation. Returns an exit when the session must end.
    async fn dispatch(
        &self,
        input: &str,
        interrupts: &mut mpsc::Receiver<()>,
        interrupts_open: &mut bool,
    ) -> Option<SessionExit> {
        loop {
            let cancel = CancellationToken::new();
            let turn = self.executor.execute(input, &self.options, cancel.clone());
            tokio::pin!(turn);

            let result = loop {
                tokio::select! {
                    result = &mut turn => break result,
                    signal = interrupts.recv(), if *interrupts_open => match signal {
                        Some(()) => {
                            debug!("Interrupt received");
                            cancel.cancel();
                        }
                        None => *interrupts_open = false,
                    },
                }
            };

            match result {
                Ok(TurnOutcome::Completed { message }) => {
                    self.notify(SessionNotice::Response(message));
                    return None;
                }
                Ok(TurnOutcome::RoundLimit { rounds }) => {
                    self.notify(SessionNotice::Error(format!(
                        "Stopped after {rounds} rounds without end_task"
                    )));
                    return None;
                }
                Err(Error::Session(SessionError::Cancelled)) => {
                    info!("Turn cancelled, re-submitting");
                    self.notify(SessionNotice::Cancelled);
                    self.events.publish(DomainEvent::TurnCancelled {
                        input_preview: input.chars().take(80).collect(),
                        timestamp: Utc::now(),
                    });
                }
                Err(Error::Session(SessionError::Timeout { secs })) => {
                    warn!(secs, "Turn timed out");
                    self.notify(SessionNotice::TimedOut);
                    self.executor.cleanup().await;
                    return Some(SessionExit::TimedOut);
                }
                Err(e) => {
                    warn!(error = %e, "Turn failed");
                    self.notify(SessionNotice::Error(e.to_string()));
                    return None;
                }
            }
        }
    }
}
