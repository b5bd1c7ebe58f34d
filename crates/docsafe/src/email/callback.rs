//! Minimal loopback HTTP listener that receives the OAuth redirect.

use log::debug;
use reqwest::Url;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use super::error::{MailError, Result};

/// Longest request head we are willing to read.
const MAX_HEADER_LINES: usize = 100;

const SUCCESS_PAGE: &str = "<html><body><h1>Authorization received</h1>\
<p>You can close this window and return to the terminal.</p></body></html>";

/// Listens on `127.0.0.1:<ephemeral port>` for the authorization redirect.
pub struct CallbackListener {
    listener: TcpListener,
    redirect_uri: String,
}

impl CallbackListener {
    pub async fn bind() -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let port = listener.local_addr()?.port();
        Ok(Self {
            listener,
            redirect_uri: format!("http://127.0.0.1:{}/", port),
        })
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Waits for the redirect carrying `code` (or `error`) and returns the
    /// code once `state` has been checked.
    ///
    /// Requests without either parameter (a browser's favicon fetch, for
    /// example) get a 404 and are otherwise ignored.
    pub async fn wait_for_code(self, expected_state: &str) -> Result<String> {
        loop {
            let (mut stream, peer) = self.listener.accept().await?;
            debug!("Callback connection from {}", peer);

            let target = match read_request_target(&mut stream).await? {
                Some(target) => target,
                None => {
                    respond(&mut stream, "400 Bad Request", "Bad request").await?;
                    continue;
                }
            };

            let url = Url::parse(&format!("http://127.0.0.1{}", target))
                .map_err(|e| MailError::AuthenticationFailed(format!("Bad redirect: {}", e)))?;
            let mut code = None;
            let mut state = None;
            let mut error = None;
            for (key, value) in url.query_pairs() {
                match key.as_ref() {
                    "code" => code = Some(value.into_owned()),
                    "state" => state = Some(value.into_owned()),
                    "error" => error = Some(value.into_owned()),
                    _ => {}
                }
            }

            if code.is_none() && error.is_none() {
                respond(&mut stream, "404 Not Found", "Not found").await?;
                continue;
            }

            respond(&mut stream, "200 OK", SUCCESS_PAGE).await?;

            if let Some(error) = error {
                return Err(MailError::AuthenticationFailed(format!(
                    "Authorization denied: {}",
                    error
                )));
            }
            if state.as_deref() != Some(expected_state) {
                return Err(MailError::AuthenticationFailed(
                    "State parameter mismatch in authorization redirect".to_string(),
                ));
            }
            return code.ok_or_else(|| {
                MailError::AuthenticationFailed("Redirect carried no code".to_string())
            });
        }
    }
}

/// Reads the request head and returns the request target of a GET.
async fn read_request_target(stream: &mut TcpStream) -> Result<Option<String>> {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    // Drain the remaining header lines.
    for _ in 0..MAX_HEADER_LINES {
        let mut line = String::new();
        let read = reader.read_line(&mut line).await?;
        if read == 0 || line == "\r\n" || line == "\n" {
            break;
        }
    }

    let mut parts = request_line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("GET"), Some(target)) if target.starts_with('/') => Ok(Some(target.to_string())),
        _ => Ok(None),
    }
}

async fn respond(stream: &mut TcpStream, status: &str, body: &str) -> Result<()> {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tokio::io::AsyncReadExt;

    async fn get(addr: SocketAddr, target: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(format!("GET {} HTTP/1.1\r\nHost: 127.0.0.1\r\n\r\n", target).as_bytes())
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    async fn bind() -> (CallbackListener, SocketAddr) {
        let listener = CallbackListener::bind().await.unwrap();
        let addr = listener.listener.local_addr().unwrap();
        (listener, addr)
    }

    #[tokio::test]
    async fn test_receives_code() {
        let (listener, addr) = bind().await;
        assert_eq!(
            listener.redirect_uri(),
            format!("http://127.0.0.1:{}/", addr.port())
        );

        let waiter = tokio::spawn(async move { listener.wait_for_code("s1").await });

        let favicon = get(addr, "/favicon.ico").await;
        assert!(favicon.starts_with("HTTP/1.1 404"));

        let response = get(addr, "/?state=s1&code=4%2Fabc").await;
        assert!(response.starts_with("HTTP/1.1 200"));

        assert_eq!(waiter.await.unwrap().unwrap(), "4/abc");
    }

    #[tokio::test]
    async fn test_state_mismatch_rejected() {
        let (listener, addr) = bind().await;
        let waiter = tokio::spawn(async move { listener.wait_for_code("expected").await });

        get(addr, "/?state=forged&code=abc").await;

        let err = waiter.await.unwrap().unwrap_err();
        assert!(matches!(err, MailError::AuthenticationFailed(_)));
    }

    #[tokio::test]
    async fn test_denied_authorization() {
        let (listener, addr) = bind().await;
        let waiter = tokio::spawn(async move { listener.wait_for_code("s").await });

        get(addr, "/?error=access_denied&state=s").await;

        match waiter.await.unwrap().unwrap_err() {
            MailError::AuthenticationFailed(msg) => assert!(msg.contains("access_denied")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
