//! The HTTP transport used to talk to archive.today.
//!
//! The submission handshake treats status codes and redirect headers as
//! protocol signals, so every request states whether redirects are followed.

use std::borrow::Cow;

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderName},
    Method,
};

use crate::error::Result;

pub static CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Redirects {
    Follow,
    Manual,
}

#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(HeaderName, String)>,
    pub body: Option<String>,
    pub redirects: Redirects,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            redirects: Redirects::Follow,
        }
    }

    /// Creates a form-encoded POST request.
    pub fn post_form(url: impl Into<String>, body: String) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            headers: vec![(reqwest::header::CONTENT_TYPE, CONTENT_TYPE_FORM.into())],
            body: Some(body),
            redirects: Redirects::Follow,
        }
    }

    #[must_use]
    pub fn header(mut self, name: HeaderName, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    #[must_use]
    pub fn manual_redirects(mut self) -> Self {
        self.redirects = Redirects::Manual;
        self
    }

    pub fn header_value(&self, name: &HeaderName) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: u16,
    /// Final URL after any followed redirects.
    pub url: String,
    pub headers: HeaderMap,
    pub body: String,
}

impl HttpResponse {
    /// Returns the header as a string. Bytes that are not UTF-8 are replaced
    /// with U+FFFD.
    pub fn header(&self, name: &str) -> Option<Cow<'_, str>> {
        self.headers
            .get(name)
            .map(|v| String::from_utf8_lossy(v.as_bytes()))
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, req: HttpRequest) -> Result<HttpResponse>;
}

/// [`HttpTransport`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    manual_redirect_client: reqwest::Client,
}

impl ReqwestTransport {
    /// # Errors
    ///
    /// Fails if the TLS backend cannot be initialized.
    pub fn new(verbose: bool) -> Result<Self> {
        let client = reqwest::ClientBuilder::new()
            .connection_verbose(verbose)
            .build()?;
        let manual_redirect_client = reqwest::ClientBuilder::new()
            .connection_verbose(verbose)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            client,
            manual_redirect_client,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, req: HttpRequest) -> Result<HttpResponse> {
        let client = match req.redirects {
            Redirects::Follow => &self.client,
            Redirects::Manual => &self.manual_redirect_client,
        };

        let method = req.method.clone();
        let mut builder = client.request(req.method, &req.url);
        for (name, value) in req.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = req.body {
            builder = builder.body(body);
        }

        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let url = resp.url().to_string();
        let headers = resp.headers().clone();
        let body = resp.text().await?;
        log::trace!("{} {} -> HTTP {}", method, url, status);

        Ok(HttpResponse {
            status,
            url,
            headers,
            body,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! A scripted transport that replays canned responses in order.

    use std::{collections::VecDeque, sync::Mutex};

    use reqwest::header::HeaderValue;

    use super::*;

    pub(crate) struct ScriptedTransport {
        script: Mutex<VecDeque<(Method, String, HttpResponse)>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new() -> Self {
            Self {
                script: Mutex::new(VecDeque::new()),
                requests: Mutex::new(Vec::new()),
            }
        }

        /// Expects the next request to be `method url` and answers it with
        /// `resp`.
        pub(crate) fn expect(self, method: Method, url: &str, resp: HttpResponse) -> Self {
            self.script
                .lock()
                .unwrap()
                .push_back((method, url.into(), resp));
            self
        }

        pub(crate) fn requests(&self) -> Vec<HttpRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub(crate) fn is_exhausted(&self) -> bool {
            self.script.lock().unwrap().is_empty()
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn send(&self, req: HttpRequest) -> Result<HttpResponse> {
            let (method, url, resp) = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| panic!("unexpected request: {} {}", req.method, req.url));
            assert_eq!(req.method, method, "method for {}", req.url);
            assert_eq!(req.url, url);
            self.requests.lock().unwrap().push(req);
            Ok(resp)
        }
    }

    pub(crate) fn response(
        status: u16,
        url: &str,
        headers: &[(&str, &str)],
        body: &str,
    ) -> HttpResponse {
        let mut header_map = HeaderMap::new();
        for (name, value) in headers {
            header_map.insert(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        HttpResponse {
            status,
            url: url.into(),
            headers: header_map,
            body: body.into(),
        }
    }
}
