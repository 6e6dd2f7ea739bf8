//! reqwest-backed transport driven by a private current-thread runtime

use std::cell::Cell;
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use http::header::{HeaderMap, HeaderValue, CONTENT_TYPE, WWW_AUTHENTICATE};
use http::{StatusCode, Version};
use reqwest::redirect::Policy;
use tokio::runtime::Runtime;
use url::Url;

use super::connect::{ConnectCounter, CountConnectsLayer};
use super::dns::{DnsLookupError, DnsServers};
use super::{global_init, TransferRequest, Transport, TransportCode, TransportError};
use crate::config::AuthMode;

const VERBOSE_TARGET: &str = "ouroboros_easy_http::verbose";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Settings that require a freshly built engine client when they change.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ClientKey {
    dns_servers: Option<DnsServers>,
    verbose: bool,
}

struct CachedClient {
    key: ClientKey,
    client: reqwest::Client,
}

/// Reusable engine handle.
///
/// Keeps its connections alive between requests, so consecutive requests to
/// the same origin can report zero new connections.
pub struct ReqwestTransport {
    runtime: Runtime,
    client: Option<CachedClient>,
    connects: ConnectCounter,
    last_status: Option<u16>,
    last_connects: Option<u32>,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        global_init()?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                TransportError::new(
                    TransportCode::FailedInit,
                    format!("cannot start I/O driver: {}", e),
                )
            })?;

        Ok(Self {
            runtime,
            client: None,
            connects: ConnectCounter::default(),
            last_status: None,
            last_connects: None,
        })
    }

    fn client_for(&mut self, key: ClientKey) -> Result<reqwest::Client, TransportError> {
        if let Some(cached) = &self.client {
            if cached.key == key {
                return Ok(cached.client.clone());
            }
        }

        tracing::debug!(
            dns_override = key.dns_servers.is_some(),
            verbose = key.verbose,
            "building engine client"
        );
        let client = build_client(&key, &self.connects)?;
        self.client = Some(CachedClient {
            key,
            client: client.clone(),
        });
        Ok(client)
    }
}

impl Transport for ReqwestTransport {
    fn perform(
        &mut self,
        request: &TransferRequest<'_>,
        sink: &mut dyn FnMut(&[u8]) -> usize,
    ) -> Result<(), TransportError> {
        self.last_status = None;
        self.last_connects = None;

        let url = parse_url(request.url)?;
        let client = self.client_for(ClientKey {
            dns_servers: request.dns_servers.cloned(),
            verbose: request.verbose,
        })?;

        let connects_before = self.connects.get();
        let status = Cell::new(None);
        let received = Cell::new(0u64);

        let outcome = self.runtime.block_on(async {
            let work = transfer(&client, request, url, sink, &status, &received);
            match request.timeout {
                Some(limit) => match tokio::time::timeout(limit, work).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(timed_out(limit, received.get())),
                },
                None => work.await,
            }
        });

        self.last_status = status.get();
        let opened = self.connects.get().saturating_sub(connects_before);
        self.last_connects = Some(u32::try_from(opened).unwrap_or(u32::MAX));
        outcome
    }

    fn response_code(&self) -> Result<u16, TransportError> {
        self.last_status.ok_or_else(|| {
            TransportError::new(TransportCode::RecvError, "no response received on this handle")
        })
    }

    fn num_connects(&self) -> Result<u32, TransportError> {
        Ok(self.last_connects.unwrap_or(0))
    }
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("last_status", &self.last_status)
            .field("last_connects", &self.last_connects)
            .field("total_connects", &self.connects.get())
            .finish()
    }
}

fn build_client(key: &ClientKey, counter: &ConnectCounter) -> Result<reqwest::Client, TransportError> {
    let mut builder = reqwest::Client::builder()
        .use_rustls_tls()
        .redirect(Policy::none())
        .connection_verbose(key.verbose)
        .connector_layer(CountConnectsLayer::new(counter.clone()));

    if let Some(servers) = &key.dns_servers {
        builder = builder.dns_resolver(Arc::new(servers.resolver()));
    }

    builder
        .build()
        .map_err(|e| TransportError::new(TransportCode::FailedInit, error_chain(&e)))
}

/// One full request/response exchange, body delivered through `sink`.
async fn transfer(
    client: &reqwest::Client,
    request: &TransferRequest<'_>,
    url: Url,
    sink: &mut dyn FnMut(&[u8]) -> usize,
    status: &Cell<Option<u16>>,
    received: &Cell<u64>,
) -> Result<(), TransportError> {
    let mut response = send(client, request, &url).await?;
    let code = response.status();
    status.set(Some(code.as_u16()));

    if request.verbose {
        log_response_head(&response);
    }

    if request.fail_on_http_error && code.as_u16() >= 400 {
        return Err(TransportError::new(
            TransportCode::HttpReturnedError,
            format!("The requested URL returned error: {}", code.as_u16()),
        ));
    }

    if request.return_headers {
        deliver(sink, &render_head(&response), received)?;
    }

    while let Some(chunk) = response.chunk().await.map_err(from_reqwest)? {
        deliver(sink, &chunk, received)?;
    }
    Ok(())
}

/// Send the request, negotiating credentials when the auth mode asks for it.
async fn send(
    client: &reqwest::Client,
    request: &TransferRequest<'_>,
    url: &Url,
) -> Result<reqwest::Response, TransportError> {
    match request.auth {
        AuthMode::None => dispatch(client, request, url, None).await,
        AuthMode::Basic { username, password } => {
            dispatch(client, request, url, Some((username, password))).await
        }
        AuthMode::Any { username, password } => {
            let probe = dispatch(client, request, url, None).await?;
            if probe.status() != StatusCode::UNAUTHORIZED || !offers_basic(probe.headers()) {
                return Ok(probe);
            }
            tracing::debug!("server offered Basic authentication, resending with credentials");
            // Drain so the connection can be reused for the second attempt.
            if let Err(e) = probe.bytes().await {
                tracing::debug!(error = %e, "could not drain challenge response");
            }
            dispatch(client, request, url, Some((username, password))).await
        }
    }
}

async fn dispatch(
    client: &reqwest::Client,
    request: &TransferRequest<'_>,
    url: &Url,
    credentials: Option<(&String, &String)>,
) -> Result<reqwest::Response, TransportError> {
    let mut builder = client.request(request.method.clone(), url.clone());
    for (name, value) in request.headers.iter() {
        builder = builder.header(name.clone(), value.clone());
    }
    if let Some(body) = request.body {
        let headers = request.headers;
        if !headers.contains(&CONTENT_TYPE) && !headers.is_removed(&CONTENT_TYPE) {
            builder = builder.header(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));
        }
        builder = builder.body(body.clone());
    }
    if let Some((username, password)) = credentials {
        builder = builder.basic_auth(username, Some(password));
    }

    let outgoing = builder.build().map_err(from_reqwest)?;
    if request.verbose {
        log_request(&outgoing);
    }
    client.execute(outgoing).await.map_err(from_reqwest)
}

fn offers_basic(headers: &HeaderMap) -> bool {
    headers.get_all(WWW_AUTHENTICATE).iter().any(|challenge| {
        challenge
            .to_str()
            .map(|c| {
                c.split(',')
                    .filter_map(|part| part.split_whitespace().next())
                    .any(|scheme| scheme.eq_ignore_ascii_case("basic"))
            })
            .unwrap_or(false)
    })
}

fn deliver(
    sink: &mut dyn FnMut(&[u8]) -> usize,
    data: &[u8],
    received: &Cell<u64>,
) -> Result<(), TransportError> {
    if data.is_empty() {
        return Ok(());
    }
    let accepted = sink(data);
    received.set(received.get() + accepted.min(data.len()) as u64);
    if accepted != data.len() {
        return Err(TransportError::new(
            TransportCode::WriteError,
            format!(
                "Failure writing output to destination, passed {} returned {}",
                data.len(),
                accepted
            ),
        ));
    }
    Ok(())
}

/// Status line plus response headers, terminated by an empty line.
fn render_head(response: &reqwest::Response) -> Vec<u8> {
    let mut head = format!(
        "{} {}\r\n",
        version_str(response.version()),
        response.status()
    )
    .into_bytes();
    for (name, value) in response.headers() {
        head.extend_from_slice(name.as_str().as_bytes());
        head.extend_from_slice(b": ");
        head.extend_from_slice(value.as_bytes());
        head.extend_from_slice(b"\r\n");
    }
    head.extend_from_slice(b"\r\n");
    head
}

fn version_str(version: Version) -> &'static str {
    if version == Version::HTTP_09 {
        "HTTP/0.9"
    } else if version == Version::HTTP_10 {
        "HTTP/1.0"
    } else if version == Version::HTTP_2 {
        "HTTP/2"
    } else if version == Version::HTTP_3 {
        "HTTP/3"
    } else {
        "HTTP/1.1"
    }
}

fn log_request(request: &reqwest::Request) {
    tracing::info!(target: VERBOSE_TARGET, "> {} {}", request.method(), request.url());
    for (name, value) in request.headers() {
        if value.is_sensitive() {
            tracing::info!(target: VERBOSE_TARGET, "> {}: [REDACTED]", name);
        } else {
            tracing::info!(target: VERBOSE_TARGET, "> {}: {:?}", name, value);
        }
    }
}

fn log_response_head(response: &reqwest::Response) {
    tracing::info!(
        target: VERBOSE_TARGET,
        "< {} {}",
        version_str(response.version()),
        response.status()
    );
    for (name, value) in response.headers() {
        tracing::info!(target: VERBOSE_TARGET, "< {}: {:?}", name, value);
    }
}

fn parse_url(raw: &str) -> Result<Url, TransportError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(TransportError::new(TransportCode::UrlMalformed, "No URL set"));
    }

    // No scheme given: assume plain http.
    let parsed = if raw.contains("://") {
        Url::parse(raw)
    } else {
        Url::parse(&format!("http://{}", raw))
    };
    let url =
        parsed.map_err(|e| TransportError::new(TransportCode::UrlMalformed, e.to_string()))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(TransportError::new(
            TransportCode::UnsupportedProtocol,
            format!("Protocol \"{}\" not supported", other),
        )),
    }
}

fn timed_out(limit: Duration, received: u64) -> TransportError {
    TransportError::new(
        TransportCode::OperationTimedOut,
        format!(
            "Operation timed out after {} milliseconds with {} bytes received",
            limit.as_millis(),
            received
        ),
    )
}

fn from_reqwest(err: reqwest::Error) -> TransportError {
    let code = if err.is_timeout() {
        TransportCode::OperationTimedOut
    } else if resolve_failed(&err) {
        TransportCode::CouldNotResolveHost
    } else if err.is_connect() {
        TransportCode::CouldNotConnect
    } else if err.is_builder() {
        TransportCode::UrlMalformed
    } else if err.is_body() || err.is_decode() {
        TransportCode::RecvError
    } else if err.is_request() {
        TransportCode::SendError
    } else {
        TransportCode::RecvError
    };
    TransportError::new(code, error_chain(&err))
}

fn resolve_failed(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.is::<DnsLookupError>() || e.to_string().starts_with("dns error") {
            return true;
        }
        current = e.source();
    }
    false
}

/// The error and all of its sources, joined with `": "`.
fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut current = err.source();
    while let Some(e) = current {
        let text = e.to_string();
        if !parts.iter().any(|p| p.contains(&text)) {
            parts.push(text);
        }
        current = e.source();
    }
    parts.join(": ")
}
