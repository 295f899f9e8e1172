//! Lifecycle event model.
//!
//! # Responsibilities
//! - Carry the lifecycle method, target path and query of one event
//! - Hold the parameters bound by the router for the running handler
//! - Expose the payload (`message`) or close code (`close`)
//! - Provide a scratch map for handler-to-handler state
//!
//! # Design Decisions
//! - A Request is built fresh for every event and dropped after dispatch
//! - Params are overwritten before each chain link runs

use std::fmt;

use axum::body::Bytes;
use axum::http::Extensions;
use serde::de::DeserializeOwned;

use crate::error::Error;
use crate::routing::pattern::Params;

/// The three lifecycle methods a connection raises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Connect,
    Message,
    Close,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Connect => "connect",
            Method::Message => "message",
            Method::Close => "close",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An inbound message payload, as framed by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Binary(Bytes),
}

impl Payload {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::Text(text) => text.as_bytes(),
            Payload::Binary(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

/// One lifecycle event being routed.
#[derive(Debug)]
pub struct Request {
    method: Method,
    path: String,
    query: Option<String>,
    params: Params,
    payload: Option<Payload>,
    close_code: Option<u16>,
    extensions: Extensions,
}

impl Request {
    /// Build a request for `target`, which may carry a `?query` suffix.
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (target, None),
        };
        Self {
            method,
            path: path.to_string(),
            query,
            params: Params::new(),
            payload: None,
            close_code: None,
            extensions: Extensions::new(),
        }
    }

    pub fn connect(target: &str) -> Self {
        Self::new(Method::Connect, target)
    }

    pub fn message(target: &str, payload: Payload) -> Self {
        let mut req = Self::new(Method::Message, target);
        req.payload = Some(payload);
        req
    }

    pub fn close(target: &str, code: Option<u16>) -> Self {
        let mut req = Self::new(Method::Close, target);
        req.close_code = code;
        req
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Parameters bound by the route entry of the running handler.
    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }

    /// Look up a single parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub(crate) fn set_params(&mut self, params: Params) {
        self.params = params;
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    pub fn close_code(&self) -> Option<u16> {
        self.close_code
    }

    /// Decode the payload as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let payload = self
            .payload
            .as_ref()
            .ok_or(Error::MissingPayload { method: self.method })?;
        Ok(serde_json::from_slice(payload.as_bytes())?)
    }

    /// Scratch state shared along the handler chain.
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_query_split_from_path() {
        let req = Request::connect("/did/42/socket?lang=en");
        assert_eq!(req.path(), "/did/42/socket");
        assert_eq!(req.query(), Some("lang=en"));
        assert_eq!(req.method(), Method::Connect);
        assert!(req.payload().is_none());
        assert!(req.close_code().is_none());
    }

    #[test]
    fn test_json_payload() {
        #[derive(Deserialize)]
        struct Msg {
            kind: String,
        }

        let req = Request::message("/x", Payload::Text(r#"{"kind":"ping"}"#.into()));
        let msg: Msg = req.json().unwrap();
        assert_eq!(msg.kind, "ping");

        let req = Request::message("/x", Payload::Binary(Bytes::from_static(b"{\"kind\":\"b\"}")));
        let msg: Msg = req.json().unwrap();
        assert_eq!(msg.kind, "b");
    }

    #[test]
    fn test_json_without_payload_fails() {
        let req = Request::close("/x", Some(1000));
        assert_eq!(req.close_code(), Some(1000));
        let err = req.json::<serde_json::Value>().unwrap_err();
        assert!(matches!(err, Error::MissingPayload { method: Method::Close }));
    }

    #[test]
    fn test_extensions_scratch() {
        #[derive(Clone, Debug, PartialEq)]
        struct Session(u32);

        let mut req = Request::connect("/");
        req.extensions_mut().insert(Session(7));
        assert_eq!(req.extensions().get::<Session>(), Some(&Session(7)));
    }
}
