use crate::utils::quote_for_digest;
use crate::{Algorithm, Error, Result};
use std::collections::HashMap;
use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use http::header::{HeaderMap, HeaderValue, AUTHORIZATION, WWW_AUTHENTICATE};
use http::uri::PathAndQuery;
use http::Request;
use log::trace;
use rand::{rngs::OsRng, RngCore};

/// Number of random bytes behind a client nonce
const CNONCE_LEN: usize = 12;

/// One round of Digest authentication.
///
/// Built from a single `WWW-Authenticate` challenge, filled in with credentials and request
/// details by [`apply_auth()`](#method.apply_auth), and then thrown away. Reusing one value for
/// several requests keeps counting `nc` up against the same server nonce, which only works with
/// servers that allow nonce reuse.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct DigestChallenge {
    /// Authorization realm (i.e. hostname, serial number...)
    pub realm: String,
    /// Server nonce
    pub nonce: String,
    /// Server opaque string, echoed back untouched. Empty if not given.
    pub opaque: String,
    /// Quality of protection options exactly as offered, e.g. `auth,auth-int`
    pub qop: String,
    /// Hashing algo, MD5 when the server does not name one
    pub algorithm: Algorithm,
    /// Every other attribute of the challenge (`domain`, `stale`, ...)
    pub params: HashMap<String, String>,

    /// Request method, set from the request being authenticated
    pub method: String,
    /// Request-URI as it goes on the wire (path and query)
    pub path: String,
    /// Client nonce of the latest response
    pub cnonce: String,
    /// How many responses were computed for this server nonce
    pub nc: u32,

    pub username: String,
    pub password: String,

    custom_cnonce: Option<String>,
}

impl DigestChallenge {
    /// Parse a `WWW-Authenticate` header value.
    ///
    /// Returns `None` unless the value uses the `Digest` scheme; other schemes (e.g. `Basic`)
    /// are not ours to answer. Pairs without `=` are skipped, and a repeated attribute keeps
    /// its last value.
    pub fn parse(header: &str) -> Option<Self> {
        let rest = strip_scheme(header)?;
        let mut params = parse_params(rest);

        trace!("parsed digest challenge attributes: {:?}", params.keys());

        let mut take = |key: &str| params.remove(key).unwrap_or_default();
        let realm = take("realm");
        let nonce = take("nonce");
        let opaque = take("opaque");
        let qop = take("qop");
        let algorithm = match params.remove("algorithm") {
            Some(a) if !a.is_empty() => a.parse().unwrap_or_default(),
            _ => Algorithm::default(),
        };

        Some(Self {
            realm,
            nonce,
            opaque,
            qop,
            algorithm,
            params,
            ..Default::default()
        })
    }

    /// Find the first digest challenge among the response's `WWW-Authenticate` headers.
    ///
    /// Values are read as UTF-8, so a realm with non-ASCII characters is kept byte for byte.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        headers
            .get_all(WWW_AUTHENTICATE)
            .iter()
            .filter_map(|value| std::str::from_utf8(value.as_bytes()).ok())
            .find_map(Self::parse)
    }

    /// Pin the client nonce instead of drawing a random one. Meant for tests.
    pub fn set_custom_cnonce(&mut self, cnonce: &str) {
        self.custom_cnonce = Some(cnonce.to_owned());
    }

    /// The qop to answer with; `None` means the server asked for the RFC 2069 form.
    ///
    /// # Errors
    /// If the server offered qop options but `auth` is not one of them.
    pub fn selected_qop(&self) -> Result<Option<&'static str>> {
        if self.qop.trim().is_empty() {
            return Ok(None);
        }

        if self
            .qop
            .split(',')
            .any(|q| q.trim().eq_ignore_ascii_case("auth"))
        {
            Ok(Some("auth"))
        } else {
            Err(Error::UnsupportedQop(self.qop.clone()))
        }
    }

    /// HA1 and HA2 for the current credentials and request
    fn checksums(&self) -> Result<(String, String)> {
        let a1 = format!("{}:{}:{}", self.username, self.realm, self.password);
        let a2 = format!("{}:{}", self.method, self.path);

        Ok((self.algorithm.hash_str(&a1)?, self.algorithm.hash_str(&a2)?))
    }

    /// Compute the `response` digest from the current state.
    pub fn response_digest(&self) -> Result<String> {
        let (ha1, ha2) = self.checksums()?;

        let message = match self.selected_qop()? {
            Some(qop) => format!(
                "{ha1}:{nonce}:{nc:08x}:{cnonce}:{qop}:{ha2}",
                ha1 = ha1,
                nonce = self.nonce,
                nc = self.nc,
                cnonce = self.cnonce,
                qop = qop,
                ha2 = ha2
            ),
            None => format!("{}:{}:{}", ha1, self.nonce, ha2),
        };

        self.algorithm.hash_str(&message)
    }

    /// Format the `Authorization` header value from the current state.
    pub fn authorization(&self) -> Result<String> {
        let response = self.response_digest()?;

        let mut header = format!(
            r#"Digest username="{}", realm="{}", nonce="{}", uri="{}""#,
            quote_for_digest(&self.username),
            quote_for_digest(&self.realm),
            quote_for_digest(&self.nonce),
            quote_for_digest(&self.path)
        );

        if let Some(qop) = self.selected_qop()? {
            header.push_str(&format!(
                r#", cnonce="{}", nc={:08x}, qop={}"#,
                quote_for_digest(&self.cnonce),
                self.nc,
                qop
            ));
        }

        header.push_str(&format!(
            r#", response="{}", algorithm={}"#,
            response, self.algorithm
        ));

        if !self.opaque.is_empty() {
            header.push_str(&format!(r#", opaque="{}""#, quote_for_digest(&self.opaque)));
        }

        Ok(header)
    }

    /// Answer the challenge for `request`, replacing its `Authorization` header.
    ///
    /// Bumps `nc` and draws a fresh cnonce each call. On error neither the request nor the
    /// challenge is changed.
    ///
    /// # Errors
    /// Unsupported algorithm or qop, or a failing OS random source.
    pub fn apply_auth<B>(
        &mut self,
        username: &str,
        password: &str,
        request: &mut Request<B>,
    ) -> Result<()> {
        let cnonce = match &self.custom_cnonce {
            Some(cnonce) => cnonce.clone(),
            None => random_cnonce()?,
        };
        let path = request
            .uri()
            .path_and_query()
            .map(PathAndQuery::as_str)
            .unwrap_or("/");

        let next = DigestChallenge {
            nc: self.nc + 1,
            cnonce,
            method: request.method().as_str().to_owned(),
            path: path.to_owned(),
            username: username.to_owned(),
            password: password.to_owned(),
            ..self.clone()
        };

        let value = HeaderValue::from_str(&next.authorization()?)?;
        request.headers_mut().insert(AUTHORIZATION, value);
        *self = next;
        Ok(())
    }
}

impl fmt::Debug for DigestChallenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigestChallenge")
            .field("realm", &self.realm)
            .field("nonce", &self.nonce)
            .field("opaque", &self.opaque)
            .field("qop", &self.qop)
            .field("algorithm", &self.algorithm)
            .field("params", &self.params)
            .field("method", &self.method)
            .field("path", &self.path)
            .field("cnonce", &self.cnonce)
            .field("nc", &self.nc)
            .field("username", &self.username)
            .field("password", &"<hidden>")
            .finish()
    }
}

/// Parse a `WWW-Authenticate` header value, see [`DigestChallenge::parse()`].
pub fn parse_challenge(header: &str) -> Option<DigestChallenge> {
    DigestChallenge::parse(header)
}

fn random_cnonce() -> Result<String> {
    let mut bytes = [0u8; CNONCE_LEN];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(STANDARD.encode(bytes))
}

/// Return what follows the `Digest` scheme token, or None for any other scheme
fn strip_scheme(header: &str) -> Option<&str> {
    let header = header.trim_start();
    let split = header.find(|c: char| c.is_ascii_whitespace())?;
    let (scheme, rest) = header.split_at(split);

    if scheme.eq_ignore_ascii_case("Digest") {
        Some(rest)
    } else {
        None
    }
}

/// Helper func that parses the key-value list received from server.
/// Commas inside quoted values do not separate pairs.
fn parse_params(input: &str) -> HashMap<String, String> {
    let mut parsed = HashMap::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;

    let mut push = |pair: &str| {
        if let Some((key, value)) = pair.split_once('=') {
            let key = key.trim().trim_matches('"').to_ascii_lowercase();
            if !key.is_empty() {
                parsed.insert(key, unquote(value));
            }
        }
    };

    for (i, c) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            ',' if !quoted => {
                push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    push(&input[start..]);

    parsed
}

/// Strip whitespace and surrounding quotes, resolving backslash escapes in quoted values.
/// An unterminated quoted value runs to the end of the input.
fn unquote(raw: &str) -> String {
    let raw = raw.trim();
    match raw.strip_prefix('"') {
        Some(inner) => {
            let mut value = String::with_capacity(inner.len());
            let mut chars = inner.chars();
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(next) = chars.next() {
                            value.push(next);
                        }
                    }
                    '"' => break,
                    _ => value.push(c),
                }
            }
            value.trim().to_string()
        }
        None => raw.trim_matches('"').trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_challenge, parse_params, DigestChallenge};
    use crate::{Algorithm, Error};
    use http::header::{HeaderMap, HeaderValue, AUTHORIZATION, WWW_AUTHENTICATE};
    use http::Request;

    const RFC2617: &str = r#"Digest realm="testrealm@host.com", qop="auth,auth-int", nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093", opaque="5ccc069c403ebaf9f0171e9517f40e41""#;

    fn get(uri: &str) -> Request<()> {
        Request::builder().method("GET").uri(uri).body(()).unwrap()
    }

    #[test]
    fn test_parse_params() {
        let map = parse_params(
            r#" realm="api@example.org", qop="auth, auth-int", algorithm=MD5, stale=FALSE, junk, nonce="a\"b""#,
        );

        assert_eq!(map.get("realm").unwrap(), "api@example.org");
        assert_eq!(map.get("qop").unwrap(), "auth, auth-int");
        assert_eq!(map.get("algorithm").unwrap(), "MD5");
        assert_eq!(map.get("stale").unwrap(), "FALSE");
        assert_eq!(map.get("nonce").unwrap(), "a\"b");
        assert_eq!(map.len(), 5);

        assert!(parse_params("").is_empty());
    }

    #[test]
    fn test_parse_challenge() {
        let parsed = parse_challenge(RFC2617).unwrap();

        assert_eq!(parsed.realm, "testrealm@host.com");
        assert_eq!(parsed.nonce, "dcd98b7102dd2f0e8b11d0f600bfb0c093");
        assert_eq!(parsed.opaque, "5ccc069c403ebaf9f0171e9517f40e41");
        assert_eq!(parsed.qop, "auth,auth-int");
        assert_eq!(parsed.algorithm, Algorithm::MD5);
        assert_eq!(parsed.nc, 0);
        assert!(parsed.params.is_empty());
    }

    #[test]
    fn test_parse_keeps_unknown_and_last_duplicate() {
        let parsed = DigestChallenge::parse(
            "Digest\n  realm=\"first\", domain=\"/a /b\", realm=second, nonce=xyz, algorithm=MD5-sess",
        )
        .unwrap();

        assert_eq!(parsed.realm, "second");
        assert_eq!(parsed.nonce, "xyz");
        assert_eq!(parsed.opaque, "");
        assert_eq!(parsed.algorithm, Algorithm::MD5Sess);
        assert_eq!(parsed.params.get("domain").unwrap(), "/a /b");
    }

    #[test]
    fn test_parse_other_schemes() {
        assert!(parse_challenge(r#"Basic realm="x""#).is_none());
        assert!(parse_challenge("Digest").is_none());
        assert!(parse_challenge("").is_none());
        assert!(parse_challenge(r#"DigestX realm="x""#).is_none());
        assert!(parse_challenge(r#"digest realm="x""#).is_some());
    }

    #[test]
    fn test_from_headers_skips_basic() {
        let mut headers = HeaderMap::new();
        headers.append(WWW_AUTHENTICATE, HeaderValue::from_static(r#"Basic realm="x""#));
        headers.append(
            WWW_AUTHENTICATE,
            HeaderValue::from_static(r#"Digest realm="y", nonce="n""#),
        );

        assert_eq!(DigestChallenge::from_headers(&headers).unwrap().realm, "y");
        assert!(DigestChallenge::from_headers(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_rfc2617() {
        let mut challenge = parse_challenge(RFC2617).unwrap();
        challenge.set_custom_cnonce("0a4f113b");

        let mut request = get("http://www.nowhere.org/dir/index.html");
        challenge
            .apply_auth("Mufasa", "Circle Of Life", &mut request)
            .unwrap();

        assert_eq!(challenge.nc, 1);
        assert_eq!(challenge.method, "GET");
        assert_eq!(challenge.path, "/dir/index.html");
        assert_eq!(
            challenge.response_digest().unwrap(),
            "6629fae49393a05397450978507c4ef1"
        );

        let str = request.headers()[AUTHORIZATION]
            .to_str()
            .unwrap()
            .replace(", ", ",\n  ");
        assert_eq!(
            str,
            r#"
Digest username="Mufasa",
  realm="testrealm@host.com",
  nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093",
  uri="/dir/index.html",
  cnonce="0a4f113b",
  nc=00000001,
  qop=auth,
  response="6629fae49393a05397450978507c4ef1",
  algorithm=MD5,
  opaque="5ccc069c403ebaf9f0171e9517f40e41"
"#
            .trim()
        );
    }

    #[test]
    fn test_rfc7616_md5() {
        let src = r#"Digest
       realm="http-auth@example.org",
       qop="auth, auth-int",
       algorithm=MD5,
       nonce="7ypf/xlj9XXwfDPEoM4URrv/xwf94BcCAzFZH4GiTo0v",
       opaque="FQhe/qaU925kfnzjCev0ciny7QMkPqMAFRtzCUYo5tdS"
    "#;

        let mut challenge = parse_challenge(src).unwrap();
        challenge.set_custom_cnonce("f2/wE4q74E6zIJEtWaHKaf5wv/H5QzzpXusqGemxURZJ");

        let mut request = get("/dir/index.html");
        challenge
            .apply_auth("Mufasa", "Circle of Life", &mut request)
            .unwrap();

        assert_eq!(
            challenge.response_digest().unwrap(),
            "8ca523f5e9506fed4657c9700eebdbec"
        );
    }

    #[test]
    fn test_rfc2069_without_qop() {
        let src = r#"Digest realm="testrealm@host.com", nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093", opaque="5ccc069c403ebaf9f0171e9517f40e41""#;

        let mut challenge = parse_challenge(src).unwrap();
        let mut request = get("/dir/index.html");
        challenge
            .apply_auth("Mufasa", "CircleOfLife", &mut request)
            .unwrap();

        assert_eq!(
            request.headers()[AUTHORIZATION],
            r#"Digest username="Mufasa", realm="testrealm@host.com", nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093", uri="/dir/index.html", response="1949323746fe6a43ef61f9606e7febea", algorithm=MD5, opaque="5ccc069c403ebaf9f0171e9517f40e41""#
        );
    }

    #[test]
    fn test_deterministic_with_fixed_cnonce() {
        let mut a = parse_challenge(RFC2617).unwrap();
        let mut b = parse_challenge(RFC2617).unwrap();
        a.set_custom_cnonce("abc");
        b.set_custom_cnonce("abc");

        let mut ra = get("/x?y=1");
        let mut rb = get("/x?y=1");
        a.apply_auth("u", "p", &mut ra).unwrap();
        b.apply_auth("u", "p", &mut rb).unwrap();

        assert_eq!(a.path, "/x?y=1");
        assert_eq!(ra.headers()[AUTHORIZATION], rb.headers()[AUTHORIZATION]);
    }

    #[test]
    fn test_random_cnonce_is_fresh() {
        let mut challenge = parse_challenge(RFC2617).unwrap();
        let mut request = get("/");

        challenge.apply_auth("u", "p", &mut request).unwrap();
        let first = challenge.cnonce.clone();
        challenge.apply_auth("u", "p", &mut request).unwrap();

        // 12 bytes -> 16 base64 chars, no padding
        assert_eq!(first.len(), 16);
        assert_ne!(first, challenge.cnonce);
        assert_eq!(challenge.nc, 2);
        assert!(request.headers()[AUTHORIZATION]
            .to_str()
            .unwrap()
            .contains("nc=00000002"));
    }

    #[test]
    fn test_replaces_prior_authorization() {
        let mut challenge = parse_challenge(RFC2617).unwrap();
        let mut request = get("/");
        request
            .headers_mut()
            .insert(AUTHORIZATION, HeaderValue::from_static("Basic Zm9vOmJhcg=="));

        challenge.apply_auth("u", "p", &mut request).unwrap();

        let values: Vec<_> = request.headers().get_all(AUTHORIZATION).iter().collect();
        assert_eq!(values.len(), 1);
        assert!(values[0].to_str().unwrap().starts_with("Digest "));
    }

    #[test]
    fn test_unsupported_algorithm() {
        for algo in &["MD5-sess", "SHA-256"] {
            let src = format!(r#"Digest realm="r", nonce="n", qop="auth", algorithm={}"#, algo);
            let mut challenge = parse_challenge(&src).unwrap();
            let mut request = get("/");

            match challenge.apply_auth("u", "p", &mut request) {
                Err(Error::UnsupportedAlgorithm(name)) => assert_eq!(name, *algo),
                other => panic!("unexpected {:?}", other),
            }
            assert!(request.headers().get(AUTHORIZATION).is_none());
        }
    }

    #[test]
    fn test_unsupported_qop() {
        let mut challenge =
            parse_challenge(r#"Digest realm="r", nonce="n", qop="auth-int""#).unwrap();
        let mut request = get("/");

        let before = challenge.clone();

        assert!(matches!(
            challenge.apply_auth("u", "p", &mut request),
            Err(Error::UnsupportedQop(_))
        ));
        assert!(request.headers().get(AUTHORIZATION).is_none());
        assert_eq!(challenge, before);
        assert_eq!(challenge.nc, 0);
    }

    #[test]
    fn test_failed_apply_keeps_count() {
        let mut challenge =
            parse_challenge(r#"Digest realm="r", nonce="n", qop=auth, algorithm=MD5-sess"#)
                .unwrap();
        let mut request = get("/");

        assert!(challenge.apply_auth("u", "p", &mut request).is_err());
        assert!(challenge.apply_auth("u", "p", &mut request).is_err());

        assert_eq!(challenge.nc, 0);
        assert_eq!(challenge.cnonce, "");
        assert_eq!(challenge.username, "");
    }

    #[test]
    fn test_utf8_realm() {
        let mut headers = HeaderMap::new();
        headers.insert(
            WWW_AUTHENTICATE,
            HeaderValue::from_bytes("Digest realm=\"Gerät\", nonce=\"n\", qop=\"auth\"".as_bytes())
                .unwrap(),
        );

        let mut challenge = DigestChallenge::from_headers(&headers).unwrap();
        assert_eq!(challenge.realm, "Gerät");

        challenge.set_custom_cnonce("c");
        let mut request = get("/");
        challenge.apply_auth("Jürgen", "pw", &mut request).unwrap();

        assert_eq!(
            challenge.response_digest().unwrap(),
            "d0b8c2772bfbbb5e4d8fa5ca1245e3e7"
        );
        let value = request.headers()[AUTHORIZATION].as_bytes();
        assert!(std::str::from_utf8(value)
            .unwrap()
            .starts_with("Digest username=\"Jürgen\", realm=\"Gerät\""));
    }

    #[test]
    fn test_debug_hides_password() {
        let mut challenge = parse_challenge(RFC2617).unwrap();
        let mut request = get("/");
        challenge
            .apply_auth("Mufasa", "Circle Of Life", &mut request)
            .unwrap();

        let printed = format!("{:?}", challenge);
        assert!(printed.contains("Mufasa"));
        assert!(!printed.contains("Circle Of Life"));
    }

    #[test]
    fn test_quotes_escaped_in_header() {
        let mut challenge =
            parse_challenge(r#"Digest realm="a \"b\"", nonce="n", qop=auth"#).unwrap();
        assert_eq!(challenge.realm, r#"a "b""#);

        challenge.set_custom_cnonce("c");
        let mut request = get("/");
        challenge.apply_auth("u", "p", &mut request).unwrap();

        assert!(request.headers()[AUTHORIZATION]
            .to_str()
            .unwrap()
            .contains(r#"realm="a \"b\"""#));
    }
}
