use std::time::Duration;

use axum::http::{header, HeaderMap};

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";

/// Value of the first non-empty cookie called `name`.
pub fn read<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, v)| *k == name && !v.is_empty())
        .map(|(_, v)| v)
}

/// `Set-Cookie` value for an HTTP-only session cookie.
pub fn session(name: &str, value: &str, max_age: Duration, secure: bool) -> String {
    let mut cookie = format!(
        "{name}={value}; Path=/; HttpOnly; Max-Age={}",
        max_age.as_secs()
    );
    if secure {
        cookie.push_str("; Secure; SameSite=None");
    } else {
        cookie.push_str("; SameSite=Lax");
    }
    cookie
}

pub fn cleared(name: &str, secure: bool) -> String {
    let mut cookie = session(name, "", Duration::ZERO, secure);
    cookie.push_str("; Expires=Thu, 01 Jan 1970 00:00:00 GMT");
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn reads_named_cookie_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; access_token=abc.def; refresh_token="),
        );
        assert_eq!(read(&headers, ACCESS_COOKIE), Some("abc.def"));
        assert_eq!(read(&headers, REFRESH_COOKIE), None);
        assert_eq!(read(&headers, "missing"), None);
    }

    #[test]
    fn session_cookie_attributes() {
        let lax = session(ACCESS_COOKIE, "t", Duration::from_secs(60), false);
        assert_eq!(lax, "access_token=t; Path=/; HttpOnly; Max-Age=60; SameSite=Lax");
        let secure = session(ACCESS_COOKIE, "t", Duration::from_secs(60), true);
        assert!(secure.ends_with("; Secure; SameSite=None"));
        assert!(cleared(REFRESH_COOKIE, false).contains("Max-Age=0"));
    }
}
