use crate::{DigestChallenge, Error, Result};
use std::fmt;

use http::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use http::{Method, Request, Response, StatusCode};
use log::{debug, warn};

/// The HTTP round trip this crate sits on top of.
///
/// Request bodies are plain buffers, so the same request can go out twice with the same bytes.
/// Connection handling, TLS, redirects and timeouts are all up to the implementor.
pub trait Transport {
    type Body;
    type Error: std::error::Error + Send + Sync + 'static;

    fn send(
        &self,
        request: &Request<Vec<u8>>,
    ) -> std::result::Result<Response<Self::Body>, Self::Error>;
}

/// Source of credentials, consulted when a request comes back with 401.
pub trait AuthHandler {
    /// Inspect the 401 response headers and add credentials to `request`.
    ///
    /// Returns `false` if there is nothing to answer with (e.g. an unknown scheme); the 401 is
    /// then handed to the caller as is.
    fn handle_auth(&self, headers: &HeaderMap, request: &mut Request<Vec<u8>>) -> Result<bool>;
}

/// Answers `Digest` challenges with a fixed username and password
#[derive(Clone)]
pub struct DigestAuth {
    username: String,
    password: String,
}

impl DigestAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for DigestAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigestAuth")
            .field("username", &self.username)
            .field("password", &"<hidden>")
            .finish()
    }
}

impl AuthHandler for DigestAuth {
    fn handle_auth(&self, headers: &HeaderMap, request: &mut Request<Vec<u8>>) -> Result<bool> {
        let mut challenge = match DigestChallenge::from_headers(headers) {
            Some(challenge) => challenge,
            None => {
                warn!("401 for {} carries no Digest challenge", request.uri());
                return Ok(false);
            }
        };

        challenge.apply_auth(&self.username, &self.password, request)?;
        Ok(true)
    }
}

/// HTTP client that retries a request once with credentials after a 401.
pub struct Client<T> {
    transport: T,
    auth_handler: Option<Box<dyn AuthHandler + Send + Sync>>,
}

impl<T: Transport> Client<T> {
    /// Client without credentials; 401 responses are returned untouched.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            auth_handler: None,
        }
    }

    pub fn with_auth_handler(mut self, handler: impl AuthHandler + Send + Sync + 'static) -> Self {
        self.auth_handler = Some(Box::new(handler));
        self
    }

    /// Shorthand for `with_auth_handler(DigestAuth::new(username, password))`
    pub fn with_digest_auth(
        self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.with_auth_handler(DigestAuth::new(username, password))
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send `request`, answering a 401 challenge at most once.
    ///
    /// On a 401 the auth handler adds an `Authorization` header to `request` in place and the
    /// request is sent again. Whatever comes back the second time is returned, even another 401.
    ///
    /// # Errors
    /// Transport failures are returned without a retry. Failing to answer the challenge
    /// (e.g. an unsupported algorithm) is an error too, rather than sending a bogus digest.
    pub fn execute(&self, request: &mut Request<Vec<u8>>) -> Result<Response<T::Body>> {
        let response = self.send(request)?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let handler = match &self.auth_handler {
            Some(handler) => handler,
            None => {
                debug!("401 for {} and no credentials configured", request.uri());
                return Ok(response);
            }
        };

        if !handler.handle_auth(response.headers(), request)? {
            return Ok(response);
        }

        debug!("401 for {} {}, retrying with credentials", request.method(), request.uri());
        self.send(request)
    }

    pub fn get(&self, url: &str) -> Result<Response<T::Body>> {
        let mut request = Request::builder().method(Method::GET).uri(url).body(Vec::new())?;
        self.execute(&mut request)
    }

    pub fn head(&self, url: &str) -> Result<Response<T::Body>> {
        let mut request = Request::builder().method(Method::HEAD).uri(url).body(Vec::new())?;
        self.execute(&mut request)
    }

    pub fn post(
        &self,
        url: &str,
        content_type: &str,
        body: impl Into<Vec<u8>>,
    ) -> Result<Response<T::Body>> {
        let mut request = Request::builder()
            .method(Method::POST)
            .uri(url)
            .header(CONTENT_TYPE, HeaderValue::from_str(content_type)?)
            .body(body.into())?;
        self.execute(&mut request)
    }

    /// POST `pairs` as an `application/x-www-form-urlencoded` body
    pub fn post_form(&self, url: &str, pairs: &[(&str, &str)]) -> Result<Response<T::Body>> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        self.post(url, "application/x-www-form-urlencoded", body)
    }

    fn send(&self, request: &Request<Vec<u8>>) -> Result<Response<T::Body>> {
        self.transport
            .send(request)
            .map_err(|e| Error::Transport(Box::new(e)))
    }
}
