//! Google OAuth endpoints and consent URL construction.

use crate::credentials::Connection;

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Build the consent URL for `connection`.
///
/// Requests offline access with a forced consent prompt so Google issues a
/// refresh token every time. `state` carries the user id back to the callback.
pub fn build_auth_url(
    auth_url: &str,
    client_id: &str,
    redirect_uri: &str,
    connection: Connection,
    state: &str,
) -> String {
    let scopes = connection.scopes().join(" ");
    let mut url = format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&include_granted_scopes=true&prompt=consent",
        auth_url,
        urlencoding::encode(client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(&scopes),
    );
    if !state.is_empty() {
        url.push_str("&state=");
        url.push_str(&urlencoding::encode(state));
    }
    url
}
