// SPDX-FileCopyrightText: 2026 Modrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Line-delimited JSON transport on stdin/stdout.
//!
//! Lets a collaborator process (or an operator) drive the daemon: inbound
//! events arrive one JSON object per line on stdin, delivery instructions
//! go out one JSON object per line on stdout. Malformed input lines are
//! logged and skipped rather than killing the feed.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin, Stdout};
use tokio::sync::Mutex;
use tracing::warn;

use modrelay_core::{DeliveryInstruction, InboundEvent, RelayError, RelayTransport};

/// Transport backed by the process's standard streams.
pub struct StdioTransport {
    lines: Mutex<Lines<BufReader<Stdin>>>,
    stdout: Mutex<Stdout>,
}

impl StdioTransport {
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
            stdout: Mutex::new(tokio::io::stdout()),
        }
    }
}

#[async_trait]
impl RelayTransport for StdioTransport {
    fn name(&self) -> &str {
        "stdio"
    }

    async fn connect(&mut self) -> Result<(), RelayError> {
        Ok(())
    }

    async fn next_event(&self) -> Result<InboundEvent, RelayError> {
        loop {
            let line = match self.lines.lock().await.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    return Err(RelayError::Transport {
                        message: "stdin closed".to_string(),
                        source: None,
                    });
                }
                Err(e) => {
                    return Err(RelayError::Transport {
                        message: format!("stdin read failed: {e}"),
                        source: Some(Box::new(e)),
                    });
                }
            };

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<InboundEvent>(trimmed) {
                Ok(event) => return Ok(event),
                Err(e) => {
                    warn!(error = %e, "ignoring malformed inbound line");
                }
            }
        }
    }

    async fn deliver(&self, instruction: DeliveryInstruction) -> Result<(), RelayError> {
        let mut line = serde_json::to_string(&instruction)
            .map_err(|e| RelayError::Internal(format!("instruction serialization failed: {e}")))?;
        line.push('\n');

        let mut stdout = self.stdout.lock().await;
        stdout.write_all(line.as_bytes()).await.map_err(|e| {
            RelayError::Transport {
                message: format!("stdout write failed: {e}"),
                source: Some(Box::new(e)),
            }
        })?;
        stdout.flush().await.map_err(|e| RelayError::Transport {
            message: format!("stdout flush failed: {e}"),
            source: Some(Box::new(e)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modrelay_core::{ChannelId, TicketId, UserId};

    #[test]
    fn instruction_serializes_to_one_tagged_object() {
        let instruction = DeliveryInstruction::PostToTicket {
            ticket_id: TicketId("t-1".into()),
            channel: Some(ChannelId("mod-inbox".into())),
            payload: "hello".into(),
        };
        let line = serde_json::to_string(&instruction).unwrap();
        assert!(line.contains(r#""kind":"post_to_ticket""#));
        assert!(!line.contains('\n'));
    }

    #[test]
    fn inbound_line_parses_into_event() {
        let line = r#"{"kind":"moderator_reply","ticket":{"user":"u1"},"payload":"done","timestamp":"2026-03-01T00:00:00Z"}"#;
        let event: InboundEvent = serde_json::from_str(line).unwrap();
        match event {
            InboundEvent::ModeratorReply { ticket, .. } => {
                assert_eq!(ticket, modrelay_core::TicketRef::User(UserId("u1".into())));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
