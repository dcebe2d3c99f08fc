use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;
use serde_json::{Value, json};

use crate::reply::{MESSAGE_CHAR_LIMIT, Reply, split_message};

const REQUEST_TIMEOUT_SECS: u64 = 10;

static CLIENT: OnceCell<Client> = OnceCell::new();

pub fn http_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to build http client")
    })
}

/// One webhook body per message; long text is split to respect the message limit.
pub fn webhook_payloads(reply: &Reply) -> Vec<Value> {
    match reply {
        Reply::Text(text) => split_message(text, MESSAGE_CHAR_LIMIT)
            .into_iter()
            .map(|chunk| {
                json!({
                    "content": chunk,
                    "allowed_mentions": { "parse": [] },
                })
            })
            .collect(),
        Reply::Embed(embed) => vec![json!({
            "embeds": [embed],
            "allowed_mentions": { "parse": [] },
        })],
    }
}

pub fn post_reply(webhook_url: &str, reply: &Reply) -> Result<()> {
    if !webhook_url.starts_with("https://") && !webhook_url.starts_with("http://") {
        bail!("webhook URL must start with http:// or https://");
    }
    let client = http_client()?;
    for payload in webhook_payloads(reply) {
        let resp = client
            .post(webhook_url)
            .json(&payload)
            .send()
            .context("webhook request failed")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(anyhow!("webhook http {}: {}", status, body));
        }
    }
    tracing::debug!("reply posted to webhook");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reply::{COLOR_ORANGE, Embed, EmbedField};

    #[test]
    fn text_reply_becomes_content_chunks() {
        let long = "line of text\n".repeat(400);
        let payloads = webhook_payloads(&Reply::Text(long));
        assert!(payloads.len() > 1);
        for p in &payloads {
            let content = p["content"].as_str().unwrap();
            assert!(content.chars().count() <= MESSAGE_CHAR_LIMIT);
            assert!(p["allowed_mentions"]["parse"].as_array().unwrap().is_empty());
        }
    }

    #[test]
    fn embed_reply_serializes_fields() {
        let reply = Reply::Embed(Embed {
            title: "Top".to_string(),
            color: COLOR_ORANGE,
            fields: vec![EmbedField {
                name: "Alpha (#A1)".to_string(),
                value: "v".to_string(),
                inline: false,
            }],
        });
        let payloads = webhook_payloads(&reply);
        assert_eq!(payloads.len(), 1);
        let embed = &payloads[0]["embeds"][0];
        assert_eq!(embed["title"], "Top");
        assert_eq!(embed["color"], COLOR_ORANGE);
        assert_eq!(embed["fields"][0]["name"], "Alpha (#A1)");
        assert_eq!(embed["fields"][0]["inline"], false);
    }

    #[test]
    fn rejects_non_http_url() {
        assert!(post_reply("ftp://example", &Reply::Text("x".into())).is_err());
    }
}
