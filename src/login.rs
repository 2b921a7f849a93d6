use crate::request::OperationDescriptor;
use crate::response::{self, Outcome};
use crate::types::{AuthedUser, UserPassword};
use reqwest::{Client, Method};
use url::Url;

/// The fixed login route under the bare server origin.
const LOGIN_ROUTE: &str = "_matrix/client/r0/login";

/// Logs in with a username and password.
///
/// `user` is the local part only, without `@` or the server name. The
/// returned [`AuthedUser`] carries the access token and full user id to
/// build a [`crate::session::MatrixSession`] from. The supplied [`Client`]
/// can be reused for the session afterwards to share its connection pool.
pub async fn login(
    client: &Client,
    server: &Url,
    user: &str,
    password: &str,
) -> Outcome<AuthedUser> {
    let operation = OperationDescriptor::unauthenticated(Method::POST, LOGIN_ROUTE)
        .json_body(&UserPassword::new(user, password))?;
    let request = operation.build(server, None)?;

    log::debug!("{} {}", request.method, request.url.path());

    let mut builder = client
        .request(request.method, request.url)
        .headers(request.headers);

    if let Some(body) = request.body {
        builder = builder.body(body);
    }

    response::map_transport(builder.send().await).await
}
