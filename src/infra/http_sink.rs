//! HTTP request sink backed by `reqwest`.
//!
//! Each event becomes `GET {base_url}{target}` carrying the original client in
//! `X-Forwarded-For` and a fixed `User-Agent`. Redirects are not followed, so
//! the status recorded is the one the target produced for the replayed path.
//! Only the status is read; the body is dropped unread.

use std::error::Error as StdError;
use std::io;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, USER_AGENT};
use reqwest::redirect::Policy;

use crate::core::{DispatchError, ReplayError, RequestSink, ScheduledEvent};

/// Header carrying the original client identity.
pub const FORWARDED_FOR: &str = "x-forwarded-for";

/// Sends replayed requests to a live HTTP target.
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: reqwest::Client,
    base_url: String,
    user_agent: HeaderValue,
}

impl HttpSink {
    /// Build a sink for `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError::Client`] if the user agent is not a valid header
    /// value or the client cannot be constructed.
    pub fn new(
        base_url: &str,
        user_agent: &str,
        timeout: Option<Duration>,
    ) -> Result<Self, ReplayError> {
        let user_agent = HeaderValue::from_str(user_agent)
            .map_err(|e| ReplayError::Client(format!("invalid user agent: {e}")))?;

        let mut builder = reqwest::Client::builder().redirect(Policy::none());
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ReplayError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_agent,
        })
    }

    /// Full URL requested for `target`.
    #[must_use]
    pub fn url_for(&self, target: &str) -> String {
        if target.starts_with('/') {
            format!("{}{target}", self.base_url)
        } else {
            format!("{}/{target}", self.base_url)
        }
    }
}

#[async_trait]
impl RequestSink for HttpSink {
    async fn send(&self, event: &ScheduledEvent) -> Result<u16, DispatchError> {
        let response = self
            .client
            .get(self.url_for(event.target()))
            .header(USER_AGENT, self.user_agent.clone())
            .header(FORWARDED_FOR, event.origin())
            .send()
            .await
            .map_err(classify)?;

        Ok(response.status().as_u16())
    }
}

/// Sort a client failure into the transient or unexpected class.
#[must_use]
pub fn classify(err: reqwest::Error) -> DispatchError {
    if is_transient(&err) {
        DispatchError::Transient(err.to_string())
    } else {
        DispatchError::Unexpected(err.to_string())
    }
}

fn is_transient(err: &reqwest::Error) -> bool {
    if err.is_timeout() || err.is_connect() {
        return true;
    }
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            if is_disconnect(io_err.kind()) {
                return true;
            }
        }
        if let Some(hyper_err) = cause.downcast_ref::<hyper::Error>() {
            // Peer hung up before (or while) answering.
            if hyper_err.is_incomplete_message()
                || hyper_err.is_closed()
                || hyper_err.is_canceled()
            {
                return true;
            }
        }
        source = cause.source();
    }
    false
}

const fn is_disconnect(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::TimedOut
    )
}
