use std::net::IpAddr;

use serde::Deserialize;

/// One blocklisted domain and the label shown when it is hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlocklistEntry {
    pub domain: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlocklistFormat {
    /// `[{"domain": "...", "description": "..."}]`
    Json,
    /// Hosts-file, `||host^` or bare domain lines
    Lines,
}

impl BlocklistFormat {
    pub fn detect(text: &str) -> Self {
        if text.trim_start().starts_with('[') {
            Self::Json
        } else {
            Self::Lines
        }
    }
}

#[derive(Deserialize)]
struct JsonEntry {
    domain: String,
    #[serde(default)]
    description: Option<String>,
}

/// Parse a blocklist in either format. `fallback` labels entries that carry
/// no description of their own.
pub fn parse_blocklist(text: &str, fallback: &str) -> Result<Vec<BlocklistEntry>, serde_json::Error> {
    match BlocklistFormat::detect(text) {
        BlocklistFormat::Json => parse_blocklist_json(text, fallback),
        BlocklistFormat::Lines => Ok(parse_blocklist_lines(text, fallback)),
    }
}

pub fn parse_blocklist_json(text: &str, fallback: &str) -> Result<Vec<BlocklistEntry>, serde_json::Error> {
    let raw: Vec<JsonEntry> = serde_json::from_str(text)?;
    let mut entries = Vec::with_capacity(raw.len());

    for entry in raw {
        let Some(domain) = normalize_domain(&entry.domain) else {
            log::debug!("skipping invalid blocklist domain '{}'", entry.domain);
            continue;
        };
        let description = entry
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| fallback.to_string());
        entries.push(BlocklistEntry { domain, description });
    }

    Ok(entries)
}

pub fn parse_blocklist_lines(text: &str, fallback: &str) -> Vec<BlocklistEntry> {
    let mut entries = Vec::new();
    let mut title: Option<String> = None;

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(found) = parse_title(line) {
            title = Some(found);
            continue;
        }

        if is_comment_line(line) || line.starts_with("@@") {
            continue;
        }

        let pattern = match line.find('$') {
            Some(pos) => &line[..pos],
            None => line,
        };

        let domain = parse_host_anchor_rule(pattern)
            .or_else(|| parse_hosts_file_domain(pattern))
            .or_else(|| parse_bare_domain(pattern));

        if let Some(domain) = domain {
            entries.push(BlocklistEntry {
                domain,
                description: title.clone().unwrap_or_else(|| fallback.to_string()),
            });
        }
    }

    entries
}

fn parse_title(line: &str) -> Option<String> {
    let rest = line.strip_prefix('!').or_else(|| line.strip_prefix('#'))?.trim_start();
    let (key, value) = rest.split_once(':')?;
    if !key.trim().eq_ignore_ascii_case("title") {
        return None;
    }
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn is_comment_line(line: &str) -> bool {
    line.starts_with('!') || line.starts_with('[') || line.starts_with('#')
}

fn parse_host_anchor_rule(line: &str) -> Option<String> {
    let rest = line.trim().strip_prefix("||")?;
    let rest = rest.strip_prefix('.').unwrap_or(rest);

    let mut end = rest.len();
    for (i, ch) in rest.char_indices() {
        if ch == '^' || ch == '|' {
            end = i;
            break;
        }
        if ch == '/' || ch == '?' || ch == '#' || ch == ':' || ch == '*' {
            return None;
        }
    }

    normalize_domain(&rest[..end])
}

/// Hosts-file placeholders that are never real blocklist entries.
const HOSTS_PLACEHOLDERS: &[&str] = &[
    "localhost",
    "localhost.localdomain",
    "local",
    "broadcasthost",
    "ip6-localhost",
    "ip6-loopback",
];

fn parse_hosts_file_domain(line: &str) -> Option<String> {
    let mut parts = line.split_whitespace();
    let first = parts.next()?;
    let second = parts.next()?;

    if first.parse::<IpAddr>().is_err() || second.parse::<IpAddr>().is_ok() {
        return None;
    }
    let domain = normalize_domain(second)?;
    if HOSTS_PLACEHOLDERS.contains(&domain.as_str()) {
        return None;
    }
    Some(domain)
}

fn parse_bare_domain(line: &str) -> Option<String> {
    let line = line.trim();
    if line.contains(char::is_whitespace) || !line.contains('.') || line.parse::<IpAddr>().is_ok() {
        return None;
    }
    normalize_domain(line)
}

/// Lowercase a domain and check it only holds hostname characters.
pub fn normalize_domain(host: &str) -> Option<String> {
    let trimmed = host.trim().trim_matches('.');
    if trimmed.is_empty() {
        return None;
    }

    if !trimmed
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'-' || b == b'_')
    {
        return None;
    }

    if trimmed.split('.').any(str::is_empty) {
        return None;
    }

    Some(trimmed.to_ascii_lowercase())
}
