//! URL query parameter redaction.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

/// Characters left unescaped in a form-encoded value.
const FORM_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'*');

/// Origin that relative request targets are resolved against.
static BASE: LazyLock<Url> =
    LazyLock::new(|| Url::parse("http://localhost/").expect("base url is valid"));

/// Replace the values of matching query parameters.
///
/// `params` holds lowercased names; matching is on the percent-decoded,
/// lowercased parameter name. Everything else in the URL is kept byte for
/// byte. Targets as adapters hand them over may be decoded, so raw spaces
/// and quotes are accepted; URLs the WHATWG parser rejects are returned
/// unchanged.
pub fn redact_url(url: &str, params: &BTreeSet<String>, replacement: &str) -> String {
    if params.is_empty() {
        return url.to_string();
    }

    let (without_fragment, fragment) = match url.find('#') {
        Some(idx) => url.split_at(idx),
        None => (url, ""),
    };

    if !parses(without_fragment) {
        return url.to_string();
    }

    let Some((base, query)) = without_fragment.split_once('?') else {
        return url.to_string();
    };

    let encoded = utf8_percent_encode(replacement, FORM_VALUE).to_string();
    let mut changed = false;

    let pairs: Vec<String> = query
        .split('&')
        .map(|pair| {
            let (raw_name, raw_value) = match pair.split_once('=') {
                Some((n, v)) => (n, Some(v)),
                None => (pair, None),
            };
            if raw_name.is_empty() || !params.contains(&decode_name(raw_name)) {
                return pair.to_string();
            }
            if raw_value == Some(encoded.as_str()) || raw_value == Some(replacement) {
                return pair.to_string();
            }
            changed = true;
            format!("{}={}", raw_name, encoded)
        })
        .collect();

    if !changed {
        return url.to_string();
    }

    let mut out = String::with_capacity(url.len() + encoded.len());
    out.push_str(base);
    out.push('?');
    out.push_str(&pairs.join("&"));
    out.push_str(fragment);
    out
}

fn parses(url: &str) -> bool {
    match Url::parse(url) {
        Ok(_) => true,
        Err(url::ParseError::RelativeUrlWithoutBase) => BASE.join(url).is_ok(),
        Err(_) => false,
    }
}

fn decode_name(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8_lossy()
        .to_lowercase()
}
