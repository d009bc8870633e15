//! Phone-side sensor server client
//!
//! The phone runs a small HTTP server that buffers accelerometer and
//! gyroscope samples on command:
//!
//! ```text
//! GET /control?cmd=start|stop|clear
//! GET /get?accX=full&accY=full&accZ=full&gyrX=full&gyrY=full&gyrZ=full
//!     -> {"buffer": {"accX": {"buffer": [..]}, ..., "gyrZ": {"buffer": [..]}}}
//! ```
//!
//! Every request carries its own timeout. Nothing here retries.

use crate::error::CollaboratorError;
use airdraw_common::{Channel, ChannelBuffers, CHANNEL_COUNT};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const USER_AGENT: &str = concat!("airdraw-ai/", env!("CARGO_PKG_VERSION"));

/// Commands accepted by the phone's `/control` endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Start,
    Stop,
    Clear,
}

impl ControlCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            ControlCommand::Start => "start",
            ControlCommand::Stop => "stop",
            ControlCommand::Clear => "clear",
        }
    }
}

impl std::fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport to the phone's sensor buffers
#[async_trait]
pub trait SensorLink: Send + Sync {
    async fn send_command(&self, command: ControlCommand) -> Result<(), CollaboratorError>;

    /// Fetch all six channel buffers (lengths may differ)
    async fn fetch_buffers(&self) -> Result<ChannelBuffers, CollaboratorError>;
}

#[async_trait]
impl<T: SensorLink + ?Sized> SensorLink for Arc<T> {
    async fn send_command(&self, command: ControlCommand) -> Result<(), CollaboratorError> {
        (**self).send_command(command).await
    }

    async fn fetch_buffers(&self) -> Result<ChannelBuffers, CollaboratorError> {
        (**self).fetch_buffers().await
    }
}

#[derive(Debug, Deserialize)]
struct ControlResponse {
    result: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct GetResponse {
    buffer: HashMap<String, BufferEntry>,
}

#[derive(Debug, Deserialize)]
struct BufferEntry {
    buffer: Vec<f64>,
}

/// reqwest-backed [`SensorLink`]
pub struct PhoneClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl PhoneClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, CollaboratorError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| CollaboratorError::Transport {
                url: base_url.clone(),
                message: e.to_string(),
            })?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<reqwest::Response, CollaboratorError> {
        let response = self
            .http_client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollaboratorError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl SensorLink for PhoneClient {
    async fn send_command(&self, command: ControlCommand) -> Result<(), CollaboratorError> {
        let url = format!("{}/control", self.base_url);
        tracing::debug!(url = %url, command = %command, "Sending phone command");

        let response = self.get(&url, &[("cmd", command.as_str())]).await?;
        let body = response.text().await.map_err(|e| classify_error(&url, e))?;

        // Bodies that are not JSON are accepted; only an explicit refusal fails
        let verdict = serde_json::from_str::<ControlResponse>(&body)
            .ok()
            .and_then(|r| r.result);
        if verdict == Some(false) {
            return Err(CollaboratorError::Rejected {
                url,
                command: command.to_string(),
            });
        }
        Ok(())
    }

    async fn fetch_buffers(&self) -> Result<ChannelBuffers, CollaboratorError> {
        let url = format!("{}/get", self.base_url);
        let query: Vec<(&str, &str)> = Channel::ALL
            .iter()
            .map(|c| (c.buffer_name(), "full"))
            .collect();

        let response = self.get(&url, &query).await?;
        let mut body: GetResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                CollaboratorError::Timeout { url: url.clone() }
            } else {
                CollaboratorError::Malformed {
                    url: url.clone(),
                    message: e.to_string(),
                }
            }
        })?;

        let mut buffers: [Vec<f64>; CHANNEL_COUNT] = Default::default();
        for channel in Channel::ALL {
            let entry = body.buffer.remove(channel.buffer_name()).ok_or_else(|| {
                CollaboratorError::Malformed {
                    url: url.clone(),
                    message: format!("missing buffer '{}'", channel.buffer_name()),
                }
            })?;
            buffers[channel.index()] = entry.buffer;
        }

        let buffers = ChannelBuffers::new(buffers);
        tracing::debug!(lengths = ?buffers.lengths(), "Fetched phone buffers");
        Ok(buffers)
    }
}

/// Map a reqwest failure onto the collaborator error kinds
fn classify_error(url: &str, err: reqwest::Error) -> CollaboratorError {
    let url = url.to_string();
    if err.is_timeout() {
        CollaboratorError::Timeout { url }
    } else if err.is_connect() {
        CollaboratorError::Connect {
            url,
            message: err.to_string(),
        }
    } else if err.is_decode() {
        CollaboratorError::Malformed {
            url,
            message: err.to_string(),
        }
    } else {
        CollaboratorError::Transport {
            url,
            message: err.to_string(),
        }
    }
}
