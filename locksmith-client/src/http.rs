//! Default transport: JSON-RPC 2.0 over HTTP.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::caller::{Connector, RemoteCaller, Reply};
use crate::config::ClientConfig;
use crate::error::{LocksmithError, Result};
use crate::protocol;

/// Channel speaking JSON-RPC 2.0 to the authority's HTTP endpoint.
pub struct HttpCaller {
    endpoint: Url,
    client: reqwest::Client,
    user: Option<String>,
    password: Option<String>,
    timeout: Duration,
    next_id: AtomicU64,
}

impl HttpCaller {
    /// Create a channel against `endpoint`, taking credentials and the
    /// socket timeout from `config`.
    pub fn new(endpoint: Url, config: &ClientConfig) -> Result<Self> {
        // No client-wide timeout: a waiting acquire may legitimately block
        // for minutes. Deadlines are set per request instead.
        let client = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .build()
            .map_err(|e| LocksmithError::Network(e.to_string()))?;

        Ok(Self {
            endpoint,
            client,
            user: config.user.clone(),
            password: config.password.clone(),
            timeout: config.timeout,
            next_id: AtomicU64::new(1),
        })
    }
}

#[async_trait]
impl RemoteCaller for HttpCaller {
    async fn call(&self, method: &str, args: &[Value]) -> Result<Reply> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!("Calling {} on lock authority", method);

        let mut request = self
            .client
            .post(self.endpoint.clone())
            .json(&build_request(id, method, args));
        if let Some(user) = &self.user {
            request = request.basic_auth(user, self.password.as_deref());
        }
        if let Some(deadline) = request_deadline(method, args, self.timeout) {
            request = request.timeout(deadline);
        }

        let response = request
            .send()
            .await
            .map_err(|e| LocksmithError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LocksmithError::Remote(format!(
                "authority answered {}: {}",
                status,
                body.trim()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| LocksmithError::BadReply(e.to_string()))?;
        parse_reply(body)
    }
}

/// Build a JSON-RPC 2.0 request envelope.
fn build_request(id: u64, method: &str, args: &[Value]) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": args,
    })
}

/// Deadline for one request, or `None` for no deadline at all.
///
/// A blocking acquire waits on the authority until the lock is granted,
/// so it must not carry one. A waiting acquire gets its wait budget on
/// top of the socket timeout; everything else answers within the socket
/// timeout.
fn request_deadline(method: &str, args: &[Value], socket: Duration) -> Option<Duration> {
    if method != protocol::ACQUIRE {
        return Some(socket);
    }
    match protocol::AcquireArgs::decode(args) {
        // Malformed call; send it anyway and let the authority reject it.
        Err(_) => Some(socket),
        Ok(call) => match call.wait {
            None => None,
            Some(wait) => socket.checked_add(wait),
        },
    }
}

/// Interpret a JSON-RPC response body as reply tuples.
fn parse_reply(body: Value) -> Result<Reply> {
    if let Some(error) = body.get("error")
        && !error.is_null()
    {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(LocksmithError::Remote(message));
    }

    let result = body
        .get("result")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            LocksmithError::BadReply("reply carries neither result nor error".to_string())
        })?;

    let mut rows = Vec::with_capacity(result.len());
    for row in result {
        let tuple = row.as_array().ok_or_else(|| {
            LocksmithError::BadReply("result tuple is not an array".to_string())
        })?;
        rows.push(tuple.clone());
    }
    Ok(Reply::new(rows))
}

/// Connector establishing [`HttpCaller`] channels.
///
/// This is the default transport: the authority is expected at
/// `http://{host}:{port}/`.
#[derive(Debug, Clone, Default)]
pub struct HttpConnector;

impl HttpConnector {
    /// Create the default HTTP connector.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn connect(&self, config: &ClientConfig) -> Result<Arc<dyn RemoteCaller>> {
        let endpoint = Url::parse(&format!("http://{}:{}/", config.host, config.port))
            .map_err(|e| LocksmithError::Config(format!("invalid authority address: {}", e)))?;
        Ok(Arc::new(HttpCaller::new(endpoint, config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_envelope_shape() {
        let request = build_request(7, protocol::RELEASE, &[json!("u-1")]);
        assert_eq!(request["jsonrpc"], "2.0");
        assert_eq!(request["id"], 7);
        assert_eq!(request["method"], protocol::RELEASE);
        assert_eq!(request["params"], json!(["u-1"]));
    }

    #[test]
    fn test_parse_result_tuples() {
        let body = json!({"jsonrpc": "2.0", "id": 1, "result": [["u-1", "orders", "u-1"]]});
        let reply = parse_reply(body).unwrap();
        assert_eq!(reply.first(), Some(&[json!("u-1"), json!("orders"), json!("u-1")][..]));
    }

    #[test]
    fn test_parse_error_member() {
        let body = json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -32000, "message": "validity must be positive"}});
        let err = parse_reply(body).unwrap_err();
        assert!(matches!(err, LocksmithError::Remote(ref m) if m.contains("validity")));
    }

    #[test]
    fn test_parse_rejects_non_tuple_result() {
        let body = json!({"jsonrpc": "2.0", "id": 1, "result": ["not-a-tuple"]});
        assert!(matches!(
            parse_reply(body),
            Err(LocksmithError::BadReply(_))
        ));
    }

    #[test]
    fn test_parse_rejects_missing_result() {
        let body = json!({"jsonrpc": "2.0", "id": 1});
        assert!(parse_reply(body).is_err());
    }

    #[test]
    fn test_blocking_acquire_carries_no_deadline() {
        let socket = Duration::from_secs(1);
        let args = [json!("orders"), json!(30.0)];
        assert_eq!(request_deadline(protocol::ACQUIRE, &args, socket), None);
    }

    #[test]
    fn test_waiting_acquire_extends_the_deadline() {
        let socket = Duration::from_secs(1);
        let args = [json!("orders"), json!(30.0), json!(5.0)];
        assert_eq!(
            request_deadline(protocol::ACQUIRE, &args, socket),
            Some(Duration::from_secs(6))
        );
    }

    #[test]
    fn test_single_attempt_acquire_keeps_the_socket_deadline() {
        let socket = Duration::from_secs(1);
        let args = [json!("orders"), json!(30.0), json!(0.0)];
        assert_eq!(
            request_deadline(protocol::ACQUIRE, &args, socket),
            Some(socket)
        );
    }

    #[test]
    fn test_other_methods_keep_the_socket_deadline() {
        let socket = Duration::from_secs(2);
        assert_eq!(
            request_deadline(protocol::UPDATE, &[json!("u-1"), json!(30.0)], socket),
            Some(socket)
        );
    }
}
