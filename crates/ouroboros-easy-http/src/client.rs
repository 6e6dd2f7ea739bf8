//! Blocking single-handle HTTP client

use bytes::Bytes;
use http::Method;

use crate::config::{AuthMode, AuthType, ClientConfig};
use crate::error::{check, Error, ErrorKind, HttpResult};
use crate::transport::{
    DnsServers, HeaderList, ReqwestTransport, TransferRequest, Transport, TransportError,
};

/// Blocking HTTP client that runs one GET or POST at a time.
///
/// Configuration set through the setters applies from the next call on.
/// Calls take `&mut self`, so one client cannot be driven from two threads
/// at once; use one client per thread instead.
///
/// # Example
///
/// ```ignore
/// use ouroboros_easy_http::{AuthType, HttpClient};
///
/// let mut client = HttpClient::new()?;
/// client.set_timeout_secs(10);
/// client.set_auth(AuthType::Basic, "user", "secret")?;
///
/// let body = client.fetch("https://example.com/status", &["Accept: text/plain"])?;
/// println!("{} bytes over {} new connection(s)", body.len(), client.num_connects());
/// ```
pub struct HttpClient<T: Transport = ReqwestTransport> {
    transport: T,
    config: ClientConfig,
    num_connects: u32,
}

impl HttpClient<ReqwestTransport> {
    /// Create a client with default configuration
    ///
    /// Fails with [`ErrorKind::Uninitialized`] when the process-wide setup or
    /// the transport handle cannot be acquired. The client is unusable then;
    /// callers that cannot continue without it decide whether to abort.
    pub fn new() -> HttpResult<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a client with the given configuration. Fails like [`HttpClient::new`].
    pub fn with_config(config: ClientConfig) -> HttpResult<Self> {
        let transport = ReqwestTransport::new().map_err(uninitialized)?;
        Ok(Self::with_transport(transport, config))
    }
}

fn uninitialized(err: TransportError) -> Error {
    Error::new(
        ErrorKind::Uninitialized,
        format!("could not initialize transport: {}", err.diagnostic()),
    )
}

impl<T: Transport> HttpClient<T> {
    pub fn with_transport(transport: T, config: ClientConfig) -> Self {
        Self {
            transport,
            config,
            num_connects: 0,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn set_return_headers(&mut self, enabled: bool) {
        self.config.return_headers = enabled;
    }

    /// A value <= 0 disables the timeout.
    pub fn set_timeout_secs(&mut self, secs: i64) {
        self.config.timeout_secs = Some(secs);
    }

    /// Resolve through these name servers (`host[:port][,host[:port]]...`)
    /// instead of the system default. The list is validated on the next call.
    pub fn set_dns_servers(&mut self, servers: impl Into<String>) {
        self.config.dns_servers = Some(servers.into());
    }

    pub fn set_auth(
        &mut self,
        auth_type: AuthType,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> HttpResult<()> {
        self.config.auth = AuthMode::new(auth_type, username, password);
        Ok(())
    }

    pub fn set_verbose(&mut self, enabled: bool) {
        self.config.verbose = enabled;
    }

    /// Whether the transport itself should fail on statuses >= 400.
    ///
    /// Off by default so that the body of auth-related responses such as
    /// 401 and 407 is still delivered. Statuses outside 2xx are reported as
    /// `RemoteError` either way.
    pub fn set_fail_on_http_error(&mut self, enabled: bool) {
        self.config.fail_on_http_error = enabled;
    }

    /// New connections opened by the most recent successful transfer.
    pub fn num_connects(&self) -> u32 {
        self.num_connects
    }

    /// GET `url` into `dst`, replacing whatever `dst` held.
    pub fn fetch_url(&mut self, url: &str, dst: &mut Vec<u8>, headers: &[&str]) -> HttpResult<()> {
        self.execute(url, None, dst, headers)
    }

    /// POST `post_data` to `url`, response into `dst`.
    pub fn post_to_url(
        &mut self,
        url: &str,
        post_data: &[u8],
        dst: &mut Vec<u8>,
        headers: &[&str],
    ) -> HttpResult<()> {
        self.execute(url, Some(post_data), dst, headers)
    }

    pub fn fetch(&mut self, url: &str, headers: &[&str]) -> HttpResult<Vec<u8>> {
        let mut body = Vec::new();
        self.fetch_url(url, &mut body, headers)?;
        Ok(body)
    }

    pub fn post(&mut self, url: &str, post_data: &[u8], headers: &[&str]) -> HttpResult<Vec<u8>> {
        let mut body = Vec::new();
        self.post_to_url(url, post_data, &mut body, headers)?;
        Ok(body)
    }

    fn execute(
        &mut self,
        url: &str,
        post_data: Option<&[u8]>,
        dst: &mut Vec<u8>,
        headers: &[&str],
    ) -> HttpResult<()> {
        dst.clear();
        let method = if post_data.is_some() {
            Method::POST
        } else {
            Method::GET
        };

        tracing::debug!(%method, headers = headers.len(), "dispatching request");
        let result = self.run(method, url, post_data, dst, headers);
        match &result {
            Ok(()) => tracing::debug!(
                bytes = dst.len(),
                num_connects = self.num_connects,
                "request completed"
            ),
            Err(e) => tracing::warn!(kind = %e.kind(), error = %e.sanitized_message(), "request failed"),
        }
        result
    }

    fn run(
        &mut self,
        method: Method,
        url: &str,
        post_data: Option<&[u8]>,
        dst: &mut Vec<u8>,
        headers: &[&str],
    ) -> HttpResult<()> {
        let header_list = check(HeaderList::from_raw(headers))?;
        let body = post_data.map(Bytes::copy_from_slice);
        let dns_servers = match self.config.dns_override() {
            Some(list) => Some(check(DnsServers::parse(list))?),
            None => None,
        };

        let request = TransferRequest {
            method,
            url,
            headers: &header_list,
            body: body.as_ref(),
            auth: &self.config.auth,
            verbose: self.config.verbose,
            fail_on_http_error: self.config.fail_on_http_error,
            return_headers: self.config.return_headers,
            timeout: self.config.timeout(),
            dns_servers: dns_servers.as_ref(),
        };

        let mut sink = |chunk: &[u8]| {
            dst.extend_from_slice(chunk);
            chunk.len()
        };
        check(self.transport.perform(&request, &mut sink))?;

        self.num_connects = check(self.transport.num_connects())?;

        let status = check(self.transport.response_code())?;
        if !(200..300).contains(&status) {
            return Err(Error::remote(status));
        }
        Ok(())
    }
}

impl<T: Transport + std::fmt::Debug> std::fmt::Debug for HttpClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("num_connects", &self.num_connects)
            .field("transport", &self.transport)
            .finish()
    }
}
