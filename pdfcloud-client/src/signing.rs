//! Request signatures (`sn` parameter).
//!
//! The service authenticates each call with an MD5 digest over the sorted,
//! form-urlencoded request parameters followed by `&sk=<secret>`.

use std::collections::BTreeMap;

use md5::{Digest, Md5};

/// Form-urlencode a single key or value.
///
/// Unreserved characters pass through, spaces become `+`, everything else is
/// percent-encoded.
fn form_encode(s: &str) -> String {
    // A literal '%' is emitted as %25, so every %20 here came from a space
    urlencoding::encode(s).replace("%20", "+")
}

/// Percent-encode the secret, keeping `/` literal.
fn encode_secret(secret: &str) -> String {
    urlencoding::encode(secret).replace("%2F", "/")
}

/// Build the canonical string that gets hashed.
///
/// Keys are sorted ascending; a repeated key keeps the last value. An empty
/// parameter set still carries the secret suffix.
pub fn canonical_query<I, K, V>(params: I, secret: &str) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let sorted: BTreeMap<String, String> = params
        .into_iter()
        .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
        .collect();

    let query = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", form_encode(k), form_encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    format!("{}&sk={}", query, encode_secret(secret))
}

/// Compute the request signature as lowercase hex.
pub fn sign<I, K, V>(params: I, secret: &str) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut hasher = Md5::new();
    hasher.update(canonical_query(params, secret).as_bytes());
    format!("{:x}", hasher.finalize())
}
