// ── Block content parsing ──

use std::collections::BTreeMap;

/// `key=value` fields of one alarm block.
pub type FieldMap = BTreeMap<String, String>;

const HANDSHAKE_PREFIX: &str = "handshake=";

/// Classified content of one extracted block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockMessage {
    /// Keepalive of the form `handshake=<value>`.
    Handshake(String),
    /// Parsed alarm fields.
    Alarm(FieldMap),
    /// No `key=value` line could be parsed.
    NonAlarm,
}

/// Classify and parse one block's trimmed content.
pub fn parse_block(content: &str) -> BlockMessage {
    let content = content.trim();

    if !content.contains('\n') {
        let lowered = content.to_ascii_lowercase();
        if lowered.starts_with(HANDSHAKE_PREFIX) {
            return BlockMessage::Handshake(content[HANDSHAKE_PREFIX.len()..].trim().to_owned());
        }
    }

    let fields: FieldMap = content
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            (!key.is_empty()).then(|| (key.to_owned(), value.trim().to_owned()))
        })
        .collect();

    if fields.is_empty() {
        BlockMessage::NonAlarm
    } else {
        BlockMessage::Alarm(fields)
    }
}
