//! HTTP implementation of [`TransportGateway`].
//!
//! Routes, relative to the configured base URL:
//! - `GET  devices`
//! - `GET  contentdirectory/{udn}/browse?objectId=..`
//! - `POST devices/{udn}/callAction`
//! - `GET  renderer/{udn}/subscribe?instanceId=..` (`text/event-stream`)

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use super::{
    ActionResult, DeviceList, DirectoryListing, ServiceCall, Subscription, SubscriptionEvent,
    TransportGateway,
};
use crate::DeviceId;
use crate::errors::ControlError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// SSE event name announcing the list of pushed properties.
const INIT_EVENT: &str = "init";

/// Largest unterminated event block kept while waiting for its blank line.
const MAX_PENDING_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct RestGateway {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl RestGateway {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    /// Shares an existing connection pool.
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Timeout applied to request/response exchanges. The event stream is
    /// long-lived and never times out.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[cfg(feature = "hkconfig")]
    pub fn from_config(config: &hkconfig::Config) -> Self {
        let timeout = config
            .get_gateway_timeout_secs()
            .unwrap_or(hkconfig::DEFAULT_GATEWAY_TIMEOUT_SECS);
        Self::new(&config.get_gateway_base_url()).with_timeout(Duration::from_secs(timeout))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn device_url(&self, prefix: &str, device: &DeviceId, suffix: &str) -> String {
        self.url(&format!(
            "{}/{}/{}",
            prefix,
            urlencoding::encode(&device.0),
            suffix
        ))
    }
}

fn status_error(status: StatusCode) -> ControlError {
    ControlError::HttpStatus {
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or("").to_string(),
    }
}

fn ensure_success(response: Response) -> Result<Response, ControlError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(status_error(status))
    }
}

/// Parses an action status body; an empty body means no details.
fn parse_action_result(body: &str) -> Result<ActionResult, ControlError> {
    if body.trim().is_empty() {
        return Ok(ActionResult::default());
    }
    Ok(serde_json::from_str(body)?)
}

/// Maps a `callAction` answer to its outcome.
///
/// The gateway answers 201 when the device returned OK and 202 when the
/// device answered with an error status.
fn action_outcome(status: StatusCode, body: &str) -> Result<ActionResult, ControlError> {
    match status {
        StatusCode::ACCEPTED => {
            let result = parse_action_result(body).unwrap_or_else(|_| ActionResult {
                status_code: 0,
                message: body.trim().to_string(),
            });
            Err(ControlError::Rejected {
                status_code: result.status_code,
                message: result.message,
            })
        }
        status if status.is_success() => parse_action_result(body),
        status => Err(status_error(status)),
    }
}

#[async_trait]
impl TransportGateway for RestGateway {
    async fn list_devices(&self) -> Result<DeviceList, ControlError> {
        let response = self
            .client
            .get(self.url("devices"))
            .timeout(self.timeout)
            .send()
            .await?;
        let response = ensure_success(response)?;
        Ok(response.json::<DeviceList>().await?)
    }

    async fn browse_directory(
        &self,
        device: &DeviceId,
        container_id: &str,
    ) -> Result<DirectoryListing, ControlError> {
        let response = self
            .client
            .get(self.device_url("contentdirectory", device, "browse"))
            .query(&[("objectId", container_id)])
            .timeout(self.timeout)
            .send()
            .await?;
        let response = ensure_success(response)?;
        Ok(response.json::<DirectoryListing>().await?)
    }

    async fn invoke_action(
        &self,
        device: &DeviceId,
        call: &ServiceCall,
    ) -> Result<ActionResult, ControlError> {
        debug!(
            device = device.0.as_str(),
            service = call.service_id.as_str(),
            action = call.action.as_str(),
            "Invoking service action"
        );
        let response = self
            .client
            .post(self.device_url("devices", device, "callAction"))
            .json(call)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status));
        }
        let body = response.text().await?;
        action_outcome(status, &body)
    }

    async fn subscribe(
        &self,
        device: &DeviceId,
        instance_id: &str,
    ) -> Result<Subscription, ControlError> {
        let response = self
            .client
            .get(self.device_url("renderer", device, "subscribe"))
            .query(&[("instanceId", instance_id)])
            .header("Accept", "text/event-stream")
            .send()
            .await?;
        let response = ensure_success(response)?;

        let (tx, subscription) = Subscription::channel();
        let device = device.0.clone();

        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut parser = SseParser::default();

            loop {
                tokio::select! {
                    _ = tx.closed() => {
                        debug!(device = device.as_str(), "Event stream closed by subscriber");
                        break;
                    }
                    chunk = stream.next() => match chunk {
                        Some(Ok(bytes)) => {
                            for event in parser.push(&bytes) {
                                if !tx.send(event) {
                                    return;
                                }
                            }
                        }
                        Some(Err(err)) => {
                            warn!(device = device.as_str(), error = %err, "Event stream failed");
                            tx.send(SubscriptionEvent::Error(err.to_string()));
                            break;
                        }
                        None => {
                            debug!(device = device.as_str(), "Event stream ended");
                            tx.send(SubscriptionEvent::Error("event stream ended".to_string()));
                            break;
                        }
                    }
                }
            }
        });

        Ok(subscription)
    }
}

/// Incremental `text/event-stream` decoder.
///
/// Bytes are buffered until a blank line terminates an event block, so
/// chunks may split lines or UTF-8 sequences anywhere. Line endings (`\r\n`,
/// `\n` or a lone `\r`) are normalized to `\n` on the way in.
#[derive(Debug, Default)]
pub(crate) struct SseParser {
    buffer: Vec<u8>,
    /// The previous chunk ended with `\r`; a leading `\n` belongs to it.
    after_cr: bool,
}

impl SseParser {
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<SubscriptionEvent> {
        for &byte in chunk {
            match byte {
                b'\r' => {
                    self.buffer.push(b'\n');
                    self.after_cr = true;
                }
                b'\n' if self.after_cr => self.after_cr = false,
                _ => {
                    self.buffer.push(byte);
                    self.after_cr = false;
                }
            }
        }

        let mut events = Vec::new();
        while let Some(end) = find_block_end(&self.buffer) {
            let block: Vec<u8> = self.buffer.drain(..end + 2).take(end).collect();
            let block = String::from_utf8_lossy(&block);
            events.extend(parse_block(&block));
        }

        if self.buffer.len() > MAX_PENDING_BYTES {
            warn!(
                pending = self.buffer.len(),
                "Discarding oversized unterminated event block"
            );
            self.buffer.clear();
        }

        events
    }
}

fn find_block_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

fn parse_block(block: &str) -> Vec<SubscriptionEvent> {
    let mut event_name: Option<&str> = None;
    let mut data_lines: Vec<&str> = Vec::new();

    for line in block.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event_name = Some(value),
            "data" => data_lines.push(value),
            _ => {}
        }
    }

    if data_lines.is_empty() {
        return Vec::new();
    }
    let data = data_lines.join("\n");

    let parsed: Value = match serde_json::from_str(&data) {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, data = data.as_str(), "Ignoring malformed event payload");
            return Vec::new();
        }
    };

    if event_name == Some(INIT_EVENT) {
        let names = match parsed {
            Value::Array(values) => values.iter().map(value_to_string).collect(),
            other => {
                warn!(payload = %other, "Ignoring malformed init event");
                return Vec::new();
            }
        };
        return vec![SubscriptionEvent::Initialized(names)];
    }

    match parsed {
        Value::Object(map) => map
            .into_iter()
            .map(|(name, value)| SubscriptionEvent::PropertyChanged {
                name,
                value: value_to_string(&value),
            })
            .collect(),
        other => {
            warn!(payload = %other, "Ignoring non-object property event");
            Vec::new()
        }
    }
}

/// Property values travel as JSON scalars; the store keeps strings.
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn changed(name: &str, value: &str) -> SubscriptionEvent {
        SubscriptionEvent::PropertyChanged {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_data_blocks_become_property_events() {
        let mut parser = SseParser::default();
        let events = parser.push(
            b"data: {\"TransportState\":\"PLAYING\"}\n\ndata: {\"Volume\":42}\n\ndata: {\"Mute\":false}\n\n",
        );
        assert_eq!(
            events,
            vec![
                changed("TransportState", "PLAYING"),
                changed("Volume", "42"),
                changed("Mute", "false"),
            ]
        );
    }

    #[test]
    fn test_init_event_lists_properties() {
        let mut parser = SseParser::default();
        let events = parser.push(b"event: init\ndata: [\"Volume\",\"Mute\"]\n\n");
        assert_eq!(
            events,
            vec![SubscriptionEvent::Initialized(vec![
                "Volume".to_string(),
                "Mute".to_string()
            ])]
        );
    }

    #[test]
    fn test_chunks_split_anywhere() {
        let mut parser = SseParser::default();
        assert!(parser.push(b"data: {\"AVTransp").is_empty());
        assert!(parser.push(b"ortURI\":\"http://x/a.mp3\"}\n").is_empty());
        assert_eq!(
            parser.push(b"\n"),
            vec![changed("AVTransportURI", "http://x/a.mp3")]
        );
    }

    #[test]
    fn test_heartbeats_and_garbage_are_ignored() {
        let mut parser = SseParser::default();
        let events = parser.push(b":\n\ndata: not json\n\n:\r\n\r\ndata: {\"CurrentTrack\":2}\r\n\r\n");
        assert_eq!(events, vec![changed("CurrentTrack", "2")]);
    }

    #[test]
    fn test_null_values_become_empty() {
        assert_eq!(value_to_string(&Value::Null), "");
        assert_eq!(value_to_string(&serde_json::json!(7)), "7");
        assert_eq!(value_to_string(&serde_json::json!("x")), "x");
    }

    #[test]
    fn test_device_urls_are_escaped() {
        let gateway = RestGateway::new("http://host:8080/api/");
        assert_eq!(gateway.base_url(), "http://host:8080/api");
        assert_eq!(
            gateway.device_url("devices", &DeviceId("uuid:a b".to_string()), "callAction"),
            "http://host:8080/api/devices/uuid%3Aa%20b/callAction"
        );
    }

    #[test]
    fn test_lone_cr_and_split_crlf_line_endings() {
        let mut parser = SseParser::default();
        assert_eq!(
            parser.push(b"data: {\"Volume\":1}\r\r"),
            vec![changed("Volume", "1")]
        );
        // a CRLF split across chunks is one line ending, not two
        assert!(parser.push(b"data: {\"Volume\":2}\r").is_empty());
        assert!(parser.push(b"\n").is_empty());
        assert_eq!(parser.push(b"\r\n"), vec![changed("Volume", "2")]);
    }

    #[test]
    fn test_unterminated_block_is_capped() {
        let mut parser = SseParser::default();
        let flood = vec![b'x'; MAX_PENDING_BYTES + 1];
        assert!(parser.push(b"data: ").is_empty());
        assert!(parser.push(&flood).is_empty());
        assert!(parser.buffer.is_empty());

        assert_eq!(
            parser.push(b"\n\ndata: {\"Mute\":\"1\"}\n\n"),
            vec![changed("Mute", "1")]
        );
    }

    #[test]
    fn test_created_answer_is_success() {
        assert_eq!(
            action_outcome(StatusCode::CREATED, ""),
            Ok(ActionResult::default())
        );
        assert_eq!(
            action_outcome(StatusCode::CREATED, r#"{"statusCode":200,"message":"OK"}"#),
            Ok(ActionResult {
                status_code: 200,
                message: "OK".to_string()
            })
        );
    }

    #[test]
    fn test_accepted_answer_is_device_rejection() {
        assert_eq!(
            action_outcome(
                StatusCode::ACCEPTED,
                r#"{"statusCode":701,"message":"Transition not available"}"#
            ),
            Err(ControlError::Rejected {
                status_code: 701,
                message: "Transition not available".to_string()
            })
        );
        assert_eq!(
            action_outcome(StatusCode::ACCEPTED, "device error"),
            Err(ControlError::Rejected {
                status_code: 0,
                message: "device error".to_string()
            })
        );
    }

    #[test]
    fn test_other_statuses_are_http_errors() {
        assert_eq!(
            action_outcome(StatusCode::NOT_FOUND, ""),
            Err(ControlError::HttpStatus {
                status: 404,
                reason: "Not Found".to_string()
            })
        );
        assert_eq!(
            action_outcome(StatusCode::INTERNAL_SERVER_ERROR, "boom"),
            Err(ControlError::HttpStatus {
                status: 500,
                reason: "Internal Server Error".to_string()
            })
        );
    }

    #[test]
    fn test_unreadable_success_body_is_decode_error() {
        assert!(matches!(
            action_outcome(StatusCode::CREATED, "{not json"),
            Err(ControlError::Decode(_))
        ));
    }
}
