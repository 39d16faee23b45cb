//! HTTP Digest Authentication (RFC 2617) for HTTP clients.
//!
//! [`Client`] wraps any [`Transport`] and, when a request comes back with `401 Unauthorized`,
//! asks its [`AuthHandler`] for credentials and sends the request once more. The stock handler,
//! [`DigestAuth`], answers `Digest` challenges using [`DigestChallenge`].
//!
//! Only the plain `MD5` algorithm with `qop=auth` (or no qop at all, RFC 2069 style) is
//! supported. Other algorithms, `MD5-sess` included, are reported as errors.
//!
//! # Examples
//!
//! Answering a challenge by hand:
//!
//! ```
//! use http::header::AUTHORIZATION;
//! use http::Request;
//!
//! // Value from the WWW-Authenticate HTTP header (usually in a HTTP 401 response)
//! let www_authenticate = r#"Digest realm="testrealm@host.com", qop="auth,auth-int", nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093", opaque="5ccc069c403ebaf9f0171e9517f40e41""#;
//!
//! let mut challenge = httpdigest::parse(www_authenticate).unwrap();
//! // For this example, we inject a custom cnonce. A random one is generated otherwise.
//! challenge.set_custom_cnonce("0a4f113b");
//!
//! let mut request = Request::get("/dir/index.html").body(Vec::<u8>::new()).unwrap();
//! challenge.apply_auth("Mufasa", "Circle Of Life", &mut request).unwrap();
//!
//! assert_eq!(request.headers()[AUTHORIZATION], r#"Digest username="Mufasa", realm="testrealm@host.com", nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093", uri="/dir/index.html", cnonce="0a4f113b", nc=00000001, qop=auth, response="6629fae49393a05397450978507c4ef1", algorithm=MD5, opaque="5ccc069c403ebaf9f0171e9517f40e41""#);
//! ```
//!
//! Letting the client do it:
//!
//! ```no_run
//! # use http::{Request, Response};
//! # struct MyTransport;
//! # impl httpdigest::Transport for MyTransport {
//! #     type Body = Vec<u8>;
//! #     type Error = std::io::Error;
//! #     fn send(&self, _: &Request<Vec<u8>>) -> Result<Response<Vec<u8>>, std::io::Error> {
//! #         unimplemented!()
//! #     }
//! # }
//! let client = httpdigest::Client::new(MyTransport).with_digest_auth("Mufasa", "Circle Of Life");
//! let response = client.get("http://www.nowhere.org/dir/index.html")?;
//! println!("{}", response.status());
//! # Ok::<(), httpdigest::Error>(())
//! ```

mod challenge;
mod client;
mod enums;
mod error;
mod utils;

pub use error::{Error, Result};

pub use crate::challenge::{parse_challenge, DigestChallenge};
pub use crate::client::{AuthHandler, Client, DigestAuth, Transport};
pub use crate::enums::Algorithm;

/// Parse the WWW-Authenticate header value.
/// It's just a convenience method to call [`DigestChallenge::parse()`](struct.DigestChallenge.html#method.parse).
pub fn parse(www_authenticate: &str) -> Option<DigestChallenge> {
    DigestChallenge::parse(www_authenticate)
}

#[test]
fn test_parse_respond() {
    let src = r#"
    Digest
       realm="http-auth@example.org",
       qop="auth, auth-int",
       algorithm=MD5,
       nonce="7ypf/xlj9XXwfDPEoM4URrv/xwf94BcCAzFZH4GiTo0v",
       opaque="FQhe/qaU925kfnzjCev0ciny7QMkPqMAFRtzCUYo5tdS"
    "#;

    let mut prompt = crate::parse(src).unwrap();
    prompt.set_custom_cnonce("f2/wE4q74E6zIJEtWaHKaf5wv/H5QzzpXusqGemxURZJ");

    let mut request = http::Request::post("http://example.org/dir/index.html")
        .body(b"payload".to_vec())
        .unwrap();
    prompt.apply_auth("Mufasa", "Circle of Life", &mut request).unwrap();

    let str = request.headers()[http::header::AUTHORIZATION]
        .to_str()
        .unwrap()
        .replace(", ", ",\n  ");

    assert_eq!(prompt.method, "POST");
    assert_eq!(
        str,
        r#"
Digest username="Mufasa",
  realm="http-auth@example.org",
  nonce="7ypf/xlj9XXwfDPEoM4URrv/xwf94BcCAzFZH4GiTo0v",
  uri="/dir/index.html",
  cnonce="f2/wE4q74E6zIJEtWaHKaf5wv/H5QzzpXusqGemxURZJ",
  nc=00000001,
  qop=auth,
  response="6f31d8ff6361bb27783b6ac62b999535",
  algorithm=MD5,
  opaque="FQhe/qaU925kfnzjCev0ciny7QMkPqMAFRtzCUYo5tdS"
"#
        .trim()
    );
}
