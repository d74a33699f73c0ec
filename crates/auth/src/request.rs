//! Host boundary: what the security layer reads from (and writes back to) the
//! current HTTP exchange.
//!
//! HTTP plumbing is the host's job. The host builds a [`RequestContext`] per
//! request, hands it to the firewall, and afterwards copies
//! [`RequestContext::response_cookies`] onto its response.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

/// Server-side session of the current client.
///
/// Implementations are owned by the host and must already be safe under
/// concurrent access; no extra locking happens here.
pub trait SessionStore: Send + Sync + Debug {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: String) -> bool;

    fn remove(&self, key: &str) -> bool;
}

/// In-memory session store.
///
/// Intended for tests/dev hosts.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().map(|v| v.is_empty()).unwrap_or(true)
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: String) -> bool {
        match self.values.write() {
            Ok(mut values) => {
                values.insert(key.to_string(), value);
                true
            }
            Err(_) => false,
        }
    }

    fn remove(&self, key: &str) -> bool {
        match self.values.write() {
            Ok(mut values) => values.remove(key).is_some(),
            Err(_) => false,
        }
    }
}

/// Cookie the host must emit on the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseCookie {
    pub name: String,
    pub value: String,
    /// `None` is a browser-session cookie.
    pub expires: Option<DateTime<Utc>>,
    pub http_only: bool,
    pub path: String,
}

impl ResponseCookie {
    /// Render as a `Set-Cookie` header value.
    pub fn to_header_value(&self) -> String {
        let mut out = format!("{}={}; Path={}", self.name, self.value, self.path);
        if let Some(expires) = self.expires {
            out.push_str("; Expires=");
            out.push_str(&expires.format("%a, %d %b %Y %H:%M:%S GMT").to_string());
        }
        if self.http_only {
            out.push_str("; HttpOnly");
        }
        out
    }
}

/// Request-scoped view of the HTTP exchange.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    path: String,
    headers: HashMap<String, String>,
    form: HashMap<String, String>,
    cookies: HashMap<String, String>,
    session: Option<Arc<dyn SessionStore>>,
    response_cookies: Vec<ResponseCookie>,
}

impl RequestContext {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Header names are case-insensitive.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_form_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.insert(name.into(), value.into());
        self
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    /// Parse and attach a raw `Cookie` request header.
    pub fn with_cookie_header(mut self, raw: &str) -> Self {
        for pair in raw.split(';') {
            if let Some((name, value)) = pair.trim().split_once('=') {
                self.cookies
                    .insert(name.trim().to_string(), value.trim().to_string());
            }
        }
        self
    }

    pub fn with_session(mut self, session: Arc<dyn SessionStore>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn form_field(&self, name: &str) -> Option<&str> {
        self.form.get(name).map(String::as_str)
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn session(&self) -> Option<&Arc<dyn SessionStore>> {
        self.session.as_ref()
    }

    /// Queue a cookie for the response. A later cookie with the same name
    /// replaces an earlier one, and the incoming view is updated so reads in
    /// the same request observe the write.
    pub fn set_cookie(&mut self, cookie: ResponseCookie) {
        self.response_cookies.retain(|c| c.name != cookie.name);
        if cookie.value.is_empty() {
            self.cookies.remove(&cookie.name);
        } else {
            self.cookies.insert(cookie.name.clone(), cookie.value.clone());
        }
        self.response_cookies.push(cookie);
    }

    pub fn response_cookies(&self) -> &[ResponseCookie] {
        &self.response_cookies
    }
}
