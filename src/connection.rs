use crate::error::{PipelineError, Result};

/// The parts of a `Key=Value;` connection string the pipelines act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub server: String,
    pub database: String,
}

const DEFAULT_SERVER: &str = "localhost";
const DEFAULT_DATABASE: &str = "master";

const SERVER_KEYS: &[&str] = &["server", "data source", "address", "addr"];
const DATABASE_KEYS: &[&str] = &["database", "initial catalog"];

/// Parse used by the backup-compare pipeline: missing keys fall back to
/// `localhost` / `master`.
pub fn lenient_parse(raw: &str) -> ConnectionDescriptor {
    ConnectionDescriptor {
        server: find_value(raw, SERVER_KEYS).unwrap_or_else(|| DEFAULT_SERVER.to_string()),
        database: find_value(raw, DATABASE_KEYS).unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
    }
}

/// Parse used by the continuous-deployment pipeline: both a server and a
/// database key must be present.
pub fn strict_parse(raw: &str) -> Result<ConnectionDescriptor> {
    let server = find_value(raw, SERVER_KEYS)
        .ok_or_else(|| PipelineError::Connection("Server (or Data Source) not found".into()))?;
    let database = find_value(raw, DATABASE_KEYS)
        .ok_or_else(|| PipelineError::Connection("Database (or Initial Catalog) not found".into()))?;
    Ok(ConnectionDescriptor { server, database })
}

/// First value whose key matches any of `keys`, ignoring case and whitespace
/// around the key.
fn find_value(raw: &str, keys: &[&str]) -> Option<String> {
    raw.split(';')
        .filter_map(|part| part.split_once('='))
        .find(|(k, _)| keys.iter().any(|key| k.trim().eq_ignore_ascii_case(key)))
        .map(|(_, v)| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Mask credentials in a connection string so it can be logged.
pub fn mask_connection_string(raw: &str) -> String {
    raw.split(';')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(mask_part)
        .collect::<Vec<_>>()
        .join(";")
}

fn mask_part(part: &str) -> String {
    let Some((k, v)) = part.split_once('=') else {
        return part.to_string();
    };
    let norm = k.trim().to_ascii_lowercase().replace([' ', '_'], "");
    match norm.as_str() {
        "password" | "pwd" => format!("{}=***", k.trim()),
        "userid" | "user" | "username" | "uid" => format!("{}={}", k.trim(), mask_value(v.trim())),
        _ => part.to_string(),
    }
}

fn mask_value(value: &str) -> String {
    if value.chars().count() <= 8 {
        return "***".to_string();
    }
    let chars: Vec<char> = value.chars().collect();
    let start: String = chars[..4].iter().collect();
    let end: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", start, end)
}
