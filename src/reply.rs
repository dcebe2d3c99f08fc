//! Chat-facing reply shapes: plain messages and embeds.

use serde::Serialize;

/// Discord rejects messages longer than this many characters.
pub const MESSAGE_CHAR_LIMIT: usize = 2000;
/// Discord caps an embed at 25 fields.
pub const EMBED_FIELD_LIMIT: usize = 25;
pub const COLOR_ORANGE: u32 = 0xE67E22;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Embed {
    pub title: String,
    pub color: u32,
    pub fields: Vec<EmbedField>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Text(String),
    Embed(Embed),
}

impl Reply {
    /// Terminal rendering used by the CLI.
    pub fn render_plain(&self) -> String {
        match self {
            Reply::Text(text) => text.clone(),
            Reply::Embed(embed) => {
                let mut out = format!("== {} ==\n", embed.title);
                for field in &embed.fields {
                    out.push_str(&format!("\n{}\n{}\n", field.name, field.value));
                }
                out
            }
        }
    }
}

/// Splits on line boundaries so each chunk fits in `limit` characters;
/// a single over-long line is cut on char boundaries.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len + line_len <= limit {
            current.push_str(line);
            current_len += line_len;
            continue;
        }
        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len <= limit {
            current.push_str(line);
            current_len = line_len;
            continue;
        }
        let chars = line.chars().collect::<Vec<_>>();
        for piece in chars.chunks(limit) {
            let piece = piece.iter().collect::<String>();
            if piece.chars().count() == limit {
                chunks.push(piece);
            } else {
                current_len = piece.chars().count();
                current = piece;
            }
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_message("hello\nworld", 2000), vec!["hello\nworld"]);
        assert!(split_message("", 2000).is_empty());
    }

    #[test]
    fn splits_on_lines_within_limit() {
        let text = "aaaa\nbbbb\ncccc\n";
        let chunks = split_message(text, 10);
        assert_eq!(chunks, vec!["aaaa\nbbbb\n", "cccc\n"]);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn long_line_hard_split_by_chars() {
        let text = "⭐".repeat(25);
        let chunks = split_message(&text, 10);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn embed_plain_rendering_lists_fields() {
        let reply = Reply::Embed(Embed {
            title: "Top".to_string(),
            color: COLOR_ORANGE,
            fields: vec![EmbedField {
                name: "Alpha (#A1)".to_string(),
                value: "3.10".to_string(),
                inline: false,
            }],
        });
        let text = reply.render_plain();
        assert!(text.starts_with("== Top =="));
        assert!(text.contains("Alpha (#A1)\n3.10"));
    }
}
