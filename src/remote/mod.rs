//! Remote file/group service.
//!
//! Every request is a JSON object `{op, ...params}` POSTed to
//! `<server>?api=<file|group|user>`. Replies are JSON objects with a
//! `status` integer (positive = success, zero = benign, negative = error with
//! `msg`), except list operations, which reply with a bare array.
//!
//! Key items:
//!   RemoteService  - the seam handlers and completion call through
//!   Reply          - status classification of a decoded reply
//!   HttpService    - reqwest transport
//!   TransportError - a call that never produced a decodable reply

#[cfg(test)]
pub mod scripted;

use std::fmt;
use std::time::Duration;

use futures::future::{FutureExt, LocalBoxFuture};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, trace};
use url::Url;

/// Which service endpoint a request goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Api {
    File,
    Group,
    User,
}

impl Api {
    pub fn as_str(&self) -> &'static str {
        match self {
            Api::File => "file",
            Api::Group => "group",
            Api::User => "user",
        }
    }
}

impl fmt::Display for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {code}: {body}")]
    Status { code: u16, body: String },
    #[error("malformed reply: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid service url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl TransportError {
    /// The `status <code|error>: <text>` message reported for a failed call.
    pub fn synthetic(&self) -> String {
        match self {
            TransportError::Status { code, body } if body.trim().is_empty() => {
                format!("status {code}: request failed")
            }
            TransportError::Status { code, body } => format!("status {code}: {}", body.trim()),
            TransportError::Http(e) if e.is_timeout() => format!("status timeout: {e}"),
            TransportError::Decode(e) => format!("status parsererror: {e}"),
            other => format!("status error: {other}"),
        }
    }
}

pub type RemoteFuture = LocalBoxFuture<'static, Result<Value, TransportError>>;

/// A request/response service. Calls resolve independently; nothing limits
/// how many are in flight.
pub trait RemoteService {
    fn call(&self, api: Api, op: &str, params: Value) -> RemoteFuture;
}

/* ---- Reply classification ---- */

pub const UNKNOWN_ERROR: &str = "unknown error";

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// `status > 0`, or an object without a status.
    Success(Value),
    /// `status == 0`
    Benign(Value),
    /// `status < 0`, carrying `msg`.
    Failure(String),
    /// A bare array.
    List(Vec<Value>),
}

impl Reply {
    pub fn classify(value: Value) -> Reply {
        match value {
            Value::Array(items) => Reply::List(items),
            Value::Object(_) => match status_of(&value) {
                Some(s) if s < 0 => Reply::Failure(error_message(&value)),
                Some(0) => Reply::Benign(value),
                _ => Reply::Success(value),
            },
            other => Reply::Failure(format!("unexpected reply: {other}")),
        }
    }
}

pub fn status_of(value: &Value) -> Option<i64> {
    value.get("status").and_then(Value::as_i64)
}

/// The reply's `msg`, or a generic message when it has none.
pub fn error_message(value: &Value) -> String {
    value
        .get("msg")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .unwrap_or(UNKNOWN_ERROR)
        .to_string()
}

/// Builds the wire object: `op` plus the params' fields, nulls dropped.
pub fn request_body(op: &str, params: Value) -> Value {
    let mut body = match params {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("params".to_string(), other);
            map
        }
    };
    body.insert("op".to_string(), Value::String(op.to_string()));
    let mut body = Value::Object(body);
    strip_nulls(&mut body);
    body
}

fn strip_nulls(value: &mut Value) {
    if let Value::Object(map) = value {
        map.retain(|_, v| !v.is_null());
        map.values_mut().for_each(strip_nulls);
    }
}

/* ---- HTTP transport ---- */

#[derive(Clone)]
pub struct HttpService {
    client: reqwest::Client,
    base: Url,
}

impl HttpService {
    pub fn new(base: Url, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .build()?;
        Ok(Self { client, base })
    }

    pub fn endpoint(&self, api: Api) -> Url {
        let mut url = self.base.clone();
        url.query_pairs_mut().append_pair("api", api.as_str());
        url
    }
}

impl RemoteService for HttpService {
    fn call(&self, api: Api, op: &str, params: Value) -> RemoteFuture {
        let client = self.client.clone();
        let url = self.endpoint(api);
        let body = request_body(op, params);
        async move {
            debug!(%url, op = %body["op"], "remote call");
            trace!(body = %body, "request body");
            let resp = client.post(url).json(&body).send().await?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(TransportError::Status {
                    code: status.as_u16(),
                    body,
                });
            }
            let bytes = resp.bytes().await?;
            let value: Value = serde_json::from_slice(&bytes)?;
            trace!(reply = %value, "remote reply");
            Ok(value)
        }
        .boxed_local()
    }
}
