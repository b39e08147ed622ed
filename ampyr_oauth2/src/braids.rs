use std::fmt;

use aliri_braid::braid;

macro_rules! limited_reveal {
    ($ty:ty: $hidden:literal, $default:literal) => {
        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                if f.alternate() {
                    f.write_str("\"")?;
                    limited_reveal(self.as_str(), &mut *f, $default)?;
                    f.write_str("\"")
                } else {
                    f.write_str(concat!("***", $hidden, "***"))
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                if f.alternate() {
                    limited_reveal(self.as_str(), &mut *f, usize::MAX)
                } else {
                    f.write_str(concat!("***", $hidden, "***"))
                }
            }
        }
    };
}

/// Writes at most `f.width()` (or `default_len`) characters of a secret,
/// ending in `…` when truncated
fn limited_reveal(unprotected: &str, f: &mut fmt::Formatter, default_len: usize) -> fmt::Result {
    let max_len = f.width().unwrap_or(default_len);
    if max_len <= 1 {
        return f.write_str("…");
    }

    if unprotected.chars().count() <= max_len {
        return f.write_str(unprotected);
    }

    match unprotected.char_indices().nth(max_len - 1) {
        Some((idx, _)) => {
            f.write_str(&unprotected[..idx])?;
            f.write_str("…")
        }
        None => f.write_str(unprotected),
    }
}

/// An OAuth2 client ID
#[braid(serde)]
pub struct ClientId;

/// An OAuth2 client secret
#[braid(serde, debug = "owned", display = "owned")]
pub struct ClientSecret;

limited_reveal!(ClientSecretRef: "CLIENT SECRET", 5);

/// Identifies the user whose data a token grants access to
#[braid(serde)]
pub struct UserId;

/// A space-delimited list of OAuth2 scopes
#[braid(serde)]
pub struct Scope;

/// An access token
#[braid(serde, debug = "owned", display = "owned")]
pub struct AccessToken;

limited_reveal!(AccessTokenRef: "ACCESS TOKEN", 15);

/// A refresh token
#[braid(serde, debug = "owned", display = "owned")]
pub struct RefreshToken;

limited_reveal!(RefreshTokenRef: "REFRESH TOKEN", 5);

/// An authorization code returned to the redirect URL after the user
/// grants access
#[braid(serde, debug = "owned", display = "owned")]
pub struct AuthorizationCode;

limited_reveal!(AuthorizationCodeRef: "AUTHORIZATION CODE", 5);

/// A PKCE code verifier
#[braid(serde, debug = "owned", display = "owned")]
pub struct CodeVerifier;

limited_reveal!(CodeVerifierRef: "CODE VERIFIER", 5);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_are_hidden_by_default() {
        let token = AccessToken::from_static("abcdefghijklmnopqrstuvwxyz");

        assert_eq!(format!("{}", token), "***ACCESS TOKEN***");
        assert_eq!(format!("{:?}", token), "***ACCESS TOKEN***");
    }

    #[test]
    fn alternate_form_reveals_a_prefix() {
        let secret = ClientSecret::from_static("hunter2-and-more");

        assert_eq!(format!("{:#?}", secret), "\"hunt…\"");
        assert_eq!(format!("{:#3}", secret), "hu…");
        assert_eq!(format!("{:#}", secret), "hunter2-and-more");
    }

    #[test]
    fn short_secrets_are_revealed_whole_in_alternate_form() {
        let token = RefreshToken::from_static("abc");

        assert_eq!(format!("{:#?}", token), "\"abc\"");
    }

    #[test]
    fn identifiers_print_plainly() {
        let id = ClientId::from_static("my-app");

        assert_eq!(id.to_string(), "my-app");
    }
}
