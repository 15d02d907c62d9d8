//! URL parsing utilities for capture events
//!
//! These functions work directly on string slices; only the final
//! normalized hostname is allocated.

use crate::types::Scheme;

// =============================================================================
// Scheme Extraction
// =============================================================================

/// Extract the scheme of a URL (the part before the first ':').
/// Returns None if the URL has no valid scheme.
pub fn extract_scheme(url: &str) -> Option<Scheme> {
    let colon_pos = url.find(':')?;
    let raw = &url[..colon_pos];

    let bytes = raw.as_bytes();
    if bytes.is_empty() || !bytes[0].is_ascii_alphabetic() {
        return None;
    }
    if !bytes
        .iter()
        .all(|&b| b.is_ascii_alphanumeric() || b == b'+' || b == b'-' || b == b'.')
    {
        return None;
    }

    let scheme = if raw.eq_ignore_ascii_case("https") {
        Scheme::Https
    } else if raw.eq_ignore_ascii_case("http") {
        Scheme::Http
    } else if raw.eq_ignore_ascii_case("wss") {
        Scheme::Wss
    } else if raw.eq_ignore_ascii_case("ws") {
        Scheme::Ws
    } else if raw.eq_ignore_ascii_case("ftp") {
        Scheme::Ftp
    } else {
        Scheme::Other(raw.to_ascii_lowercase())
    };

    Some(scheme)
}

/// Get the position after "://".
#[inline]
pub fn get_scheme_end(url: &str) -> Option<usize> {
    let bytes = url.as_bytes();
    let colon_pos = bytes.iter().position(|&b| b == b':')?;

    if bytes.len() > colon_pos + 2 && bytes[colon_pos + 1] == b'/' && bytes[colon_pos + 2] == b'/' {
        return Some(colon_pos + 3);
    }

    None
}

// =============================================================================
// Host Extraction
// =============================================================================

/// Get the start and end positions of the hostname in a URL.
///
/// Userinfo and port are excluded. Bracketed IPv6 literals keep their
/// brackets.
pub fn get_host_position(url: &str) -> Option<(usize, usize)> {
    let scheme_end = get_scheme_end(url)?;
    let bytes = url.as_bytes();

    // Authority ends at the first '/', '?' or '#'
    let mut authority_end = bytes.len();
    for (i, &b) in bytes[scheme_end..].iter().enumerate() {
        if b == b'/' || b == b'?' || b == b'#' {
            authority_end = scheme_end + i;
            break;
        }
    }

    // Skip userinfo
    let host_start = match url[scheme_end..authority_end].rfind('@') {
        Some(at) => scheme_end + at + 1,
        None => scheme_end,
    };

    if bytes.get(host_start) == Some(&b'[') {
        let close = url[host_start..authority_end].find(']')?;
        return Some((host_start, host_start + close + 1));
    }

    let mut host_end = authority_end;
    for i in host_start..authority_end {
        if bytes[i] == b':' {
            host_end = i;
            break;
        }
    }

    Some((host_start, host_end))
}

/// Host extraction without allocations.
/// Returns a slice into the original URL.
#[inline]
pub fn extract_host(url: &str) -> Option<&str> {
    let (host_start, host_end) = get_host_position(url)?;
    Some(&url[host_start..host_end])
}

/// Extract and normalize the hostname of a URL.
///
/// Returns None when the URL has no authority or the host is not a valid
/// hostname.
pub fn hostname_of(url: &str) -> Option<String> {
    extract_host(url.trim()).and_then(normalize_hostname)
}

// =============================================================================
// Hostname Normalization
// =============================================================================

/// Lowercase a hostname and check that it is well formed.
///
/// Accepted: DNS names made of `[a-z0-9-]` labels (a trailing root dot is
/// dropped) and bracketed IPv6 literals.
pub fn normalize_hostname(host: &str) -> Option<String> {
    let trimmed = host.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(inner) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        if !inner.is_empty() && inner.bytes().all(|b| b.is_ascii_hexdigit() || b == b':' || b == b'.') {
            return Some(trimmed.to_ascii_lowercase());
        }
        return None;
    }

    let trimmed = trimmed.strip_suffix('.').unwrap_or(trimmed);
    if trimmed.is_empty() || trimmed.len() > 253 {
        return None;
    }

    for label in trimmed.split('.') {
        if label.is_empty() || label.len() > 63 {
            return None;
        }
        if !label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_') {
            return None;
        }
    }

    Some(trimmed.to_ascii_lowercase())
}
