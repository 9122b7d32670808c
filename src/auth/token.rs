//! Bearer token extraction from the `Authorization` header.

/// Pull the token out of a raw `Authorization` header value.
///
/// The expected shape is `"<scheme> <token>"`: split on the first space and
/// return the second segment. Returns `None` when the header is absent,
/// empty, has no second segment, or the segment is empty. Absence is a
/// normal, silent outcome, not an error.
pub fn extract_bearer(header: Option<&str>) -> Option<&str> {
    let value = header?;
    let (_scheme, token) = value.split_once(' ')?;
    if token.is_empty() { None } else { Some(token) }
}
