use bytes::Bytes;
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderValue, InvalidHeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value;
use url::Url;

/// An error building a request from an [`OperationDescriptor`].
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("No value supplied for path parameter {{{}}}", .0)]
    MissingPathParam(&'static str),
    #[error("Base URL cannot be extended with path segments")]
    CannotBeBase,
    #[error("{}", .0)]
    InvalidHeaderValue(#[from] InvalidHeaderValue),
    #[error("JSON serialize error: {}", .0)]
    Json(#[from] serde_json::Error),
}

/// How the access token is attached to authenticated requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthScheme {
    /// As an `access_token` query parameter.
    #[default]
    QueryParam,
    /// As an `Authorization: Bearer` header.
    BearerHeader,
}

/// The access token and attachment scheme for one request.
#[derive(Debug, Clone, Copy)]
pub struct Auth<'a> {
    pub token: &'a str,
    pub scheme: AuthScheme,
}

/// The body attached to an operation before building.
#[derive(Debug, Clone)]
pub enum RequestBody {
    /// A JSON value produced by the codec.
    Json(Value),
    /// Raw bytes with an explicit content type, used for media uploads.
    Raw { content_type: String, data: Bytes },
}

/// A data-driven description of one HTTP operation.
///
/// Path parameters are substituted into the template by name and
/// URL-escaped; query parameters are appended in declared order, skipping
/// any with no value. Descriptors are constructed per call and carry no
/// state of their own.
#[derive(Debug, Clone)]
pub struct OperationDescriptor {
    pub method: Method,
    pub path_template: &'static str,
    pub path_params: Vec<(&'static str, String)>,
    pub query_params: Vec<(&'static str, Option<String>)>,
    pub body: Option<RequestBody>,
    pub authenticated: bool,
}

impl OperationDescriptor {
    /// Creates a descriptor for an authenticated operation.
    pub fn new(method: Method, path_template: &'static str) -> Self {
        Self {
            method,
            path_template,
            path_params: Vec::new(),
            query_params: Vec::new(),
            body: None,
            authenticated: true,
        }
    }

    /// Creates a descriptor that carries no access token.
    ///
    /// Used for the login call and for public directory reads.
    pub fn unauthenticated(method: Method, path_template: &'static str) -> Self {
        Self {
            authenticated: false,
            ..Self::new(method, path_template)
        }
    }

    pub fn path_param(mut self, name: &'static str, value: impl ToString) -> Self {
        self.path_params.push((name, value.to_string()));
        self
    }

    pub fn query_param(mut self, name: &'static str, value: Option<String>) -> Self {
        self.query_params.push((name, value));
        self
    }

    pub fn json_body<T>(mut self, body: &T) -> Result<Self, BuildError>
    where
        T: Serialize,
    {
        self.body = Some(RequestBody::Json(serde_json::to_value(body)?));

        Ok(self)
    }

    pub fn raw_body(mut self, content_type: impl Into<String>, data: Bytes) -> Self {
        self.body = Some(RequestBody::Raw {
            content_type: content_type.into(),
            data,
        });
        self
    }

    /// Builds a fully-formed request against the given base URL.
    ///
    /// Pure; performs no I/O. `auth` is attached only when the descriptor
    /// is authenticated.
    pub fn build(&self, base: &Url, auth: Option<Auth<'_>>) -> Result<PreparedRequest, BuildError> {
        let mut url = base.clone();

        {
            let mut segments = url.path_segments_mut().map_err(|_| BuildError::CannotBeBase)?;

            segments.pop_if_empty();

            for segment in self.path_template.split('/') {
                if let Some(name) = template_param(segment) {
                    let value = self.path_params
                        .iter()
                        .find(|(param, _)| *param == name)
                        .map(|(_, value)| value.as_str())
                        .ok_or(BuildError::MissingPathParam(name))?;

                    segments.push(value);
                } else {
                    segments.push(segment);
                }
            }
        }

        {
            let mut pairs = url.query_pairs_mut();

            for (name, value) in &self.query_params {
                if let Some(value) = value {
                    pairs.append_pair(name, value);
                }
            }

            if self.authenticated {
                if let Some(Auth { token, scheme: AuthScheme::QueryParam }) = auth {
                    pairs.append_pair("access_token", token);
                }
            }
        }

        // an empty query would otherwise show up as a trailing "?"
        if url.query() == Some("") {
            url.set_query(None);
        }

        let mut headers = HeaderMap::new();

        if self.authenticated {
            if let Some(Auth { token, scheme: AuthScheme::BearerHeader }) = auth {
                headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}"))?);
            }
        }

        let body = match &self.body {
            Some(RequestBody::Json(value)) => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

                Some(Bytes::from(serde_json::to_vec(value)?))
            },
            Some(RequestBody::Raw { content_type, data }) => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_str(content_type)?);

                Some(data.clone())
            },
            None => None,
        };

        Ok(PreparedRequest {
            method: self.method.clone(),
            url,
            headers,
            body,
        })
    }
}

/// A request ready to hand to the transport.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

/// Extracts the parameter name from a `{name}` template segment.
fn template_param(segment: &str) -> Option<&str> {
    segment.strip_prefix('{')?.strip_suffix('}')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://matrix.example.org/_matrix/client/r0/").unwrap()
    }

    fn auth() -> Auth<'static> {
        Auth {
            token: "syt_secret",
            scheme: AuthScheme::QueryParam,
        }
    }

    #[test]
    fn substitutes_and_escapes_path_params() {
        let request = OperationDescriptor::new(Method::POST, "rooms/{roomId}/join")
            .path_param("roomId", "!room id#1:example.org")
            .build(&base(), Some(auth()))
            .unwrap();

        assert_eq!(
            request.url.path(),
            "/_matrix/client/r0/rooms/!room%20id%231:example.org/join",
        );
    }

    #[test]
    fn missing_path_param_is_an_error() {
        let error = OperationDescriptor::new(Method::POST, "rooms/{roomId}/join")
            .build(&base(), Some(auth()))
            .unwrap_err();

        assert!(matches!(error, BuildError::MissingPathParam("roomId")));
    }

    #[test]
    fn appends_query_params_in_declared_order_skipping_none() {
        let request = OperationDescriptor::new(Method::GET, "rooms/{roomId}/messages")
            .path_param("roomId", "!r:example.org")
            .query_param("from", Some("t1".to_owned()))
            .query_param("dir", Some("b".to_owned()))
            .query_param("limit", Some("100".to_owned()))
            .query_param("to", None)
            .build(&base(), Some(auth()))
            .unwrap();

        assert_eq!(
            request.url.query(),
            Some("from=t1&dir=b&limit=100&access_token=syt_secret"),
        );
    }

    #[test]
    fn bearer_scheme_uses_authorization_header() {
        let request = OperationDescriptor::new(Method::POST, "createRoom")
            .build(
                &base(),
                Some(Auth {
                    token: "syt_secret",
                    scheme: AuthScheme::BearerHeader,
                }),
            )
            .unwrap();

        assert_eq!(request.url.query(), None);
        assert_eq!(
            request.headers.get(AUTHORIZATION).unwrap(),
            "Bearer syt_secret",
        );
    }

    #[test]
    fn unauthenticated_descriptor_carries_no_token() {
        let request = OperationDescriptor::unauthenticated(Method::GET, "publicRooms")
            .query_param("limit", Some("20".to_owned()))
            .build(&base(), Some(auth()))
            .unwrap();

        assert_eq!(request.url.query(), Some("limit=20"));
        assert!(request.headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn json_body_sets_content_type() {
        let request = OperationDescriptor::new(Method::POST, "createRoom")
            .json_body(&serde_json::json!({"name": "lobby"}))
            .unwrap()
            .build(&base(), Some(auth()))
            .unwrap();

        assert_eq!(request.headers.get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(request.body.unwrap(), Bytes::from(r#"{"name":"lobby"}"#));
    }

    #[test]
    fn raw_body_keeps_supplied_content_type() {
        let request = OperationDescriptor::new(Method::POST, "upload")
            .raw_body("image/png", Bytes::from_static(b"\x89PNG"))
            .build(&base(), Some(auth()))
            .unwrap();

        assert_eq!(request.headers.get(CONTENT_TYPE).unwrap(), "image/png");
    }
}
