//! Chat commands and the dispatcher that turns their results into replies.
//!
//! Handlers return `anyhow::Result<Reply>`; only `dispatch` converts an error
//! into the user-facing failure message, so every command fails the same way.

use std::path::PathBuf;

use anyhow::Result;

use crate::config::BotConfig;
use crate::export::export_predictions;
use crate::predict::{predict_table, render_ranked_text, top_attackers_embed};
use crate::reply::Reply;
use crate::store::WarStore;
use crate::train::train;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Store a war spreadsheet in the data directory.
    Upload { source: PathBuf },
    Train,
    Predict,
    TopAttackers { limit: Option<usize> },
    Export { out: PathBuf },
}

impl Command {
    pub fn label(&self) -> &'static str {
        match self {
            Command::Upload { .. } => "Upload",
            Command::Train => "Training",
            Command::Predict => "Prediction",
            Command::TopAttackers { .. } => "Top attackers",
            Command::Export { .. } => "Export",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Success(Reply),
    Failure {
        command: &'static str,
        message: String,
    },
}

impl CommandOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CommandOutcome::Success(_))
    }

    pub fn into_reply(self) -> Reply {
        match self {
            CommandOutcome::Success(reply) => reply,
            CommandOutcome::Failure { command, message } => {
                // A zero-width space after each backtick keeps the text from closing the fence.
                let message = message.replace('`', "`\u{200b}");
                Reply::Text(format!("❌ {command} failed:\n```\n{message}\n```"))
            }
        }
    }
}

pub fn dispatch(store: &WarStore, config: &BotConfig, command: &Command) -> CommandOutcome {
    match run(store, config, command) {
        Ok(reply) => CommandOutcome::Success(reply),
        Err(err) => {
            tracing::warn!(command = command.label(), error = %format!("{err:#}"), "command failed");
            CommandOutcome::Failure {
                command: command.label(),
                message: format!("{err:#}"),
            }
        }
    }
}

fn run(store: &WarStore, config: &BotConfig, command: &Command) -> Result<Reply> {
    match command {
        Command::Upload { source } => {
            let saved = store.import_file(source)?;
            let name = saved
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            Ok(Reply::Text(format!(
                "✅ War file uploaded and saved as **{name}**!"
            )))
        }
        Command::Train => {
            let report = train(store, config)?;
            let mut msg = String::from("🔥 AI model trained successfully and saved!\n");
            msg.push_str(&format!(
                "Wars: {} (recent rows {}, older rows {}) · Players: {}\n",
                report.wars, report.recent_samples, report.older_samples, report.players
            ));
            let mut drivers = report.importances.clone();
            drivers.sort_by(|a, b| b.1.total_cmp(&a.1));
            let top = drivers
                .iter()
                .filter(|(_, share)| *share > 0.0)
                .take(3)
                .map(|(name, share)| format!("{name} {:.0}%", share * 100.0))
                .collect::<Vec<_>>();
            if !top.is_empty() {
                msg.push_str(&format!("Top drivers: {}\n", top.join(", ")));
            }
            Ok(Reply::Text(msg))
        }
        Command::Predict => {
            let table = predict_table(store)?;
            Ok(Reply::Text(render_ranked_text(&table)))
        }
        Command::TopAttackers { limit } => {
            let table = predict_table(store)?;
            let limit = limit.unwrap_or(config.top_limit);
            Ok(Reply::Embed(top_attackers_embed(&table.rows, limit)))
        }
        Command::Export { out } => {
            let table = predict_table(store)?;
            let count = export_predictions(out, &table.rows)?;
            Ok(Reply::Text(format!(
                "📄 Exported {count} predictions to **{}**",
                out.display()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_renders_as_code_block() {
        let reply = CommandOutcome::Failure {
            command: "Training",
            message: "No war files found in data".to_string(),
        }
        .into_reply();
        assert_eq!(
            reply,
            Reply::Text("❌ Training failed:\n```\nNo war files found in data\n```".to_string())
        );
    }

    #[test]
    fn failure_text_cannot_break_out_of_code_block() {
        let reply = CommandOutcome::Failure {
            command: "Upload",
            message: "Upload rejected: bad name ```@everyone```".to_string(),
        }
        .into_reply();
        let Reply::Text(text) = reply else {
            panic!("expected text reply");
        };
        assert_eq!(text.matches("```").count(), 2);
        assert!(text.starts_with("❌ Upload failed:\n```\n"));
        assert!(text.ends_with("\n```"));
        assert_eq!(text.replace('\u{200b}', "").matches("@everyone").count(), 1);
    }

    #[test]
    fn labels_are_stable() {
        assert_eq!(Command::Train.label(), "Training");
        assert_eq!(Command::TopAttackers { limit: None }.label(), "Top attackers");
    }
}
