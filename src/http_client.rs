use crate::error::{AppResult, ErrorReason};
use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use hickory_resolver::TokioAsyncResolver;
use http::{header, Method, Request, Response, Uri};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper_util::rt::TokioIo;
use rustls_pki_types::ServerName;
use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
};
use tokio_rustls::{
    rustls::{ClientConfig, RootCertStore},
    TlsConnector,
};

const USER_AGENT: &str = concat!("uptime-watchdog/", env!("CARGO_PKG_VERSION"));

/// Minimal HTTP/1.1 client: one fresh connection per request, TLS for `https` URLs.
#[derive(Clone)]
pub struct HttpClient {
    resolver: Arc<TokioAsyncResolver>,
    connector: TlsConnector,
}

impl HttpClient {
    pub fn new(resolver: Arc<TokioAsyncResolver>) -> Self {
        let mut root_store = RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let mut tls_config = ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();
        tls_config.alpn_protocols = vec![b"http/1.1".to_vec()];

        Self {
            resolver,
            connector: TlsConnector::from(Arc::new(tls_config)),
        }
    }

    pub async fn get(&self, uri: &Uri) -> AppResult<Response<Incoming>> {
        self.send(Method::GET, uri, None).await
    }

    pub async fn post_json(&self, uri: &Uri, body: Vec<u8>) -> AppResult<Response<Incoming>> {
        self.send(Method::POST, uri, Some(Bytes::from(body))).await
    }

    async fn send(
        &self,
        method: Method,
        uri: &Uri,
        body: Option<Bytes>,
    ) -> AppResult<Response<Incoming>> {
        let target = RequestTarget::from_uri(uri)?;
        let sockaddr = self.resolve(&target).await?;
        trace!("Connecting to {} ({})", uri, sockaddr);
        let stream = TcpStream::connect(sockaddr).await?;

        let mut builder = Request::builder()
            .method(method)
            .uri(target.path_and_query.as_str())
            .header(header::HOST, target.authority.as_str())
            .header(header::USER_AGENT, USER_AGENT);
        if let Some(credentials) = &target.credentials {
            builder = builder.header(
                header::AUTHORIZATION,
                format!("Basic {}", STANDARD.encode(credentials)),
            );
        }
        if body.is_some() {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
        }
        let request = builder.body(Full::new(body.unwrap_or_default()))?;

        if target.tls {
            let server_name = ServerName::try_from(target.host.clone())
                .map_err(|_| ErrorReason::InvalidEndpoint(format!("invalid server name `{}`", target.host)))?;
            let stream = self.connector.connect(server_name, stream).await?;
            Self::send_over(stream, request).await
        } else {
            Self::send_over(stream, request).await
        }
    }

    async fn resolve(&self, target: &RequestTarget) -> AppResult<SocketAddr> {
        if let Ok(ip) = target.host.parse::<IpAddr>() {
            return Ok(SocketAddr::new(ip, target.port));
        }

        let ip = self
            .resolver
            .lookup_ip(target.host.as_str())
            .await?
            .iter()
            .next()
            .ok_or_else(|| ErrorReason::NoAddress(target.host.clone()))?;
        Ok(SocketAddr::new(ip, target.port))
    }

    async fn send_over<S>(io: S, request: Request<Full<Bytes>>) -> AppResult<Response<Incoming>>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(io)).await?;
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                trace!("Connection closed with error: {}", e);
            }
        });

        Ok(sender.send_request(request).await?)
    }
}

/// Connection coordinates extracted from an absolute URL.
#[derive(Clone, Debug, PartialEq, Eq)]
struct RequestTarget {
    tls: bool,
    host: String,
    port: u16,
    /// Value of the `Host` header; never carries userinfo.
    authority: String,
    /// `user:password` taken from the URL, sent as Basic auth.
    credentials: Option<String>,
    path_and_query: String,
}

impl RequestTarget {
    fn from_uri(uri: &Uri) -> AppResult<Self> {
        let tls = match uri.scheme_str() {
            Some("https") => true,
            Some("http") => false,
            _ => {
                return Err(ErrorReason::InvalidEndpoint(format!("unsupported URL `{}`", uri)).into())
            }
        };
        let authority = uri
            .authority()
            .ok_or_else(|| ErrorReason::InvalidEndpoint(format!("missing host in `{}`", uri)))?;
        let host = authority
            .host()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_owned();
        let port = authority
            .port_u16()
            .unwrap_or(if tls { 443 } else { 80 });
        let credentials = authority
            .as_str()
            .rsplit_once('@')
            .map(|(userinfo, _)| userinfo.to_owned());
        let host_header = match authority.port() {
            Some(explicit) => format!("{}:{}", authority.host(), explicit),
            None => authority.host().to_owned(),
        };
        let path_and_query = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .filter(|pq| !pq.is_empty())
            .unwrap_or("/")
            .to_owned();

        Ok(Self {
            tls,
            host,
            port,
            authority: host_header,
            credentials,
            path_and_query,
        })
    }
}
