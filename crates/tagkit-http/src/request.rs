//! The request seen by templates.
//!
//! [`HttpRequest`] holds what tags need from the current request: its path,
//! GET parameters, host and scheme. Hosts build one per incoming request with
//! [`HttpRequest::builder`].

use std::collections::HashMap;

use http::{HeaderMap, Method};

use crate::querydict::QueryDict;

/// An HTTP request, modeled after Django's `HttpRequest`.
///
/// ```
/// use tagkit_http::HttpRequest;
///
/// let request = HttpRequest::builder()
///     .path("/articles/2024/")
///     .query_string("page=1")
///     .header("host", "www.mysite.com")
///     .build();
///
/// assert_eq!(request.get().get("page"), Some("1"));
/// assert_eq!(request.get_full_path(), "/articles/2024/?page=1");
/// assert_eq!(
///     request.build_absolute_uri(Some("/feed/")),
///     "http://www.mysite.com/feed/"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: Method,
    path: String,
    path_info: String,
    query_string: String,
    get: QueryDict,
    headers: HeaderMap,
    meta: HashMap<String, String>,
    scheme: String,
}

impl HttpRequest {
    /// Creates a new [`HttpRequestBuilder`].
    pub fn builder() -> HttpRequestBuilder {
        HttpRequestBuilder::default()
    }

    /// Returns the HTTP method.
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the full request path, including any script prefix.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the path below the script prefix (`META["PATH_INFO"]`).
    pub fn path_info(&self) -> &str {
        &self.path_info
    }

    /// Returns the raw query string without the leading `?`.
    pub fn query_string(&self) -> &str {
        &self.query_string
    }

    /// Returns the parsed GET parameters.
    pub const fn get(&self) -> &QueryDict {
        &self.get
    }

    /// Returns the request headers.
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the META dictionary.
    pub const fn meta(&self) -> &HashMap<String, String> {
        &self.meta
    }

    /// Returns the URL scheme (`"http"` or `"https"`).
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Returns `true` if the request came in over HTTPS.
    pub fn is_secure(&self) -> bool {
        self.scheme.eq_ignore_ascii_case("https")
    }

    /// Returns the request host.
    ///
    /// Looks at the `Host` header, then `META["HTTP_HOST"]`, then
    /// `META["SERVER_NAME"]`, falling back to `localhost`.
    pub fn get_host(&self) -> String {
        self.headers
            .get(http::header::HOST)
            .and_then(|v| v.to_str().ok())
            .or_else(|| self.meta.get("HTTP_HOST").map(String::as_str))
            .or_else(|| self.meta.get("SERVER_NAME").map(String::as_str))
            .unwrap_or("localhost")
            .to_string()
    }

    /// Returns the path followed by the query string, if any.
    pub fn get_full_path(&self) -> String {
        if self.query_string.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.query_string)
        }
    }

    /// Builds an absolute URI for `location`.
    ///
    /// Absolute URLs are returned unchanged and protocol-relative ones
    /// (`//host/path`) take this request's scheme. A location starting with
    /// `/` is placed on this request's origin; any other location is resolved
    /// against the directory of the current path. `None` yields the URI of
    /// the request itself.
    pub fn build_absolute_uri(&self, location: Option<&str>) -> String {
        let origin = format!("{}://{}", self.scheme, self.get_host());
        match location {
            Some(loc) if is_absolute_url(loc) => loc.to_string(),
            Some(loc) if loc.starts_with("//") => format!("{}:{loc}", self.scheme),
            Some(loc) if loc.starts_with('/') => format!("{origin}{loc}"),
            Some(loc) => {
                let base = self.path.rfind('/').map_or("/", |i| &self.path[..=i]);
                format!("{origin}{base}{loc}")
            }
            None => format!("{origin}{}", self.get_full_path()),
        }
    }
}

/// Returns `true` for `http://` and `https://` URLs.
pub fn is_absolute_url(location: &str) -> bool {
    let lower = location.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// A builder for constructing [`HttpRequest`] instances.
#[derive(Debug)]
pub struct HttpRequestBuilder {
    method: Method,
    path: String,
    path_info: Option<String>,
    query_string: String,
    headers: HeaderMap,
    meta: HashMap<String, String>,
    scheme: String,
}

impl Default for HttpRequestBuilder {
    fn default() -> Self {
        Self {
            method: Method::GET,
            path: "/".to_string(),
            path_info: None,
            query_string: String::new(),
            headers: HeaderMap::new(),
            meta: HashMap::new(),
            scheme: "http".to_string(),
        }
    }
}

impl HttpRequestBuilder {
    /// Sets the HTTP method.
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Sets the request path.
    #[must_use]
    pub fn path(mut self, path: &str) -> Self {
        self.path = path.to_string();
        self
    }

    /// Sets the path info; defaults to the path.
    #[must_use]
    pub fn path_info(mut self, path_info: &str) -> Self {
        self.path_info = Some(path_info.to_string());
        self
    }

    /// Sets the query string (without leading `?`).
    #[must_use]
    pub fn query_string(mut self, qs: &str) -> Self {
        self.query_string = qs.trim_start_matches('?').to_string();
        self
    }

    /// Adds a header. Invalid names or values are ignored.
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            http::header::HeaderName::from_bytes(name.as_bytes()),
            http::header::HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Adds a META entry.
    #[must_use]
    pub fn meta(mut self, key: &str, value: &str) -> Self {
        self.meta.insert(key.to_string(), value.to_string());
        self
    }

    /// Sets the scheme (http or https).
    #[must_use]
    pub fn scheme(mut self, scheme: &str) -> Self {
        self.scheme = scheme.to_string();
        self
    }

    /// Builds the [`HttpRequest`], filling the standard META keys.
    pub fn build(self) -> HttpRequest {
        let get = QueryDict::parse(&self.query_string);
        let path_info = self.path_info.unwrap_or_else(|| self.path.clone());

        let mut meta = self.meta;
        meta.entry("REQUEST_METHOD".to_string())
            .or_insert_with(|| self.method.to_string());
        meta.entry("PATH_INFO".to_string())
            .or_insert_with(|| path_info.clone());
        meta.entry("QUERY_STRING".to_string())
            .or_insert_with(|| self.query_string.clone());

        HttpRequest {
            method: self.method,
            path: self.path,
            path_info,
            query_string: self.query_string,
            get,
            headers: self.headers,
            meta,
            scheme: self.scheme,
        }
    }
}
