//! HTTP/1.1 request composition into caller-owned buffers.

use std::io::{Cursor, Write};

use serde::Serialize;

use crate::{domain::BotToken, errors::Error, ports::Endpoint, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
}

impl Verb {
    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
        }
    }
}

/// Write a complete request for `method` into `out` and return its length.
///
/// Nothing is written past `out.len()`. On `ComposeOverflow` the prefix
/// already in `out` is garbage and must not be sent.
pub fn compose(
    verb: Verb,
    method: &str,
    token: &BotToken,
    endpoint: &Endpoint,
    body: Option<&[u8]>,
    out: &mut [u8],
) -> Result<usize> {
    let capacity = out.len();
    let overflow = |_: std::io::Error| Error::ComposeOverflow { capacity };

    let mut cur = Cursor::new(out);
    write!(
        cur,
        "{} /{}{}/{} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n",
        verb.as_str(),
        endpoint.routing_prefix,
        token.expose(),
        method,
        endpoint.host,
    )
    .map_err(overflow)?;

    match body {
        Some(body) => {
            write!(
                cur,
                "Content-Type: application/json\r\nContent-Length: {}\r\n\r\n",
                body.len()
            )
            .map_err(overflow)?;
            cur.write_all(body).map_err(overflow)?;
        }
        None => cur.write_all(b"\r\n").map_err(overflow)?,
    }

    Ok(cur.position() as usize)
}

#[derive(Serialize)]
struct GetUpdatesBody {
    offset: i64,
    timeout: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u32>,
}

/// Serialize the `getUpdates` body into `out`, replacing its contents.
///
/// `out` keeps its allocation across cycles.
pub fn compose_get_updates_body(
    offset: i64,
    timeout_secs: u32,
    limit: Option<u32>,
    out: &mut Vec<u8>,
) -> Result<()> {
    out.clear();
    serde_json::to_writer(
        &mut *out,
        &GetUpdatesBody {
            offset,
            timeout: timeout_secs,
            limit,
        },
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> BotToken {
        BotToken::new("42:secret")
    }

    #[test]
    fn get_without_body_has_no_content_headers() {
        let mut buf = [0u8; 256];
        let n = compose(
            Verb::Get,
            "getMe",
            &token(),
            &Endpoint::default(),
            None,
            &mut buf,
        )
        .unwrap();
        let text = std::str::from_utf8(&buf[..n]).unwrap();
        assert_eq!(
            text,
            "GET /bot42:secret/getMe HTTP/1.1\r\nHost: api.telegram.org\r\nConnection: close\r\n\r\n"
        );
    }

    #[test]
    fn post_carries_exact_content_length_and_body() {
        let body = br#"{"offset":0,"timeout":0}"#;
        let mut buf = [0u8; 256];
        let n = compose(
            Verb::Post,
            "getUpdates",
            &token(),
            &Endpoint::default(),
            Some(body),
            &mut buf,
        )
        .unwrap();
        let text = std::str::from_utf8(&buf[..n]).unwrap();
        assert!(text.starts_with("POST /bot42:secret/getUpdates HTTP/1.1\r\n"));
        assert!(text.contains("Content-Type: application/json\r\n"));
        assert!(text.contains(&format!("Content-Length: {}\r\n", body.len())));
        assert!(text.ends_with("\r\n\r\n{\"offset\":0,\"timeout\":0}"));
    }

    #[test]
    fn overflow_is_reported_instead_of_truncating() {
        let mut buf = [0u8; 32];
        let err = compose(
            Verb::Post,
            "sendMessage",
            &token(),
            &Endpoint::default(),
            Some(b"{}"),
            &mut buf,
        )
        .unwrap_err();
        assert!(matches!(err, Error::ComposeOverflow { capacity: 32 }));
    }

    #[test]
    fn exact_fit_is_accepted() {
        let mut big = [0u8; 256];
        let n = compose(
            Verb::Get,
            "getMe",
            &token(),
            &Endpoint::default(),
            None,
            &mut big,
        )
        .unwrap();

        let mut exact = vec![0u8; n];
        assert_eq!(
            compose(
                Verb::Get,
                "getMe",
                &token(),
                &Endpoint::default(),
                None,
                &mut exact
            )
            .unwrap(),
            n
        );
        assert_eq!(&exact[..], &big[..n]);
    }

    #[test]
    fn custom_endpoint_changes_prefix_and_host() {
        let endpoint = Endpoint {
            host: "localhost".to_string(),
            port: 8081,
            routing_prefix: "api/bot".to_string(),
        };
        let mut buf = [0u8; 256];
        let n = compose(Verb::Get, "getMe", &token(), &endpoint, None, &mut buf).unwrap();
        let text = std::str::from_utf8(&buf[..n]).unwrap();
        assert!(text.starts_with("GET /api/bot42:secret/getMe HTTP/1.1\r\nHost: localhost\r\n"));
    }

    #[test]
    fn get_updates_body_omits_limit_when_unset() {
        let mut body = Vec::new();
        compose_get_updates_body(0, 0, None, &mut body).unwrap();
        assert_eq!(body, br#"{"offset":0,"timeout":0}"#);

        compose_get_updates_body(101, 5, Some(1), &mut body).unwrap();
        assert_eq!(body, br#"{"offset":101,"timeout":5,"limit":1}"#);
    }
}
