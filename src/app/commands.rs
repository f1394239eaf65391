use crate::core::aggregator::paginate;
use crate::core::normalizer;
use crate::core::orchestrator::{CheckReport, Orchestrator};
use crate::core::store::SavedStore;
use crate::domain::model::OwnerId;
use crate::domain::ports::{DeliveryChannel, Fetcher, Storage};
use crate::utils::error::Result;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Free-form text holding the numbers to save.
    Add(String),
    List,
    Clear,
    Check,
    /// Optional query text; empty means "my saved numbers".
    Inline(String),
}

impl Command {
    /// Parses `/add 888..., /list, /clear, /check, /inline [query]`. A bot
    /// suffix such as `/check@SomeBot` is accepted.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (head, rest) = match text.find(char::is_whitespace) {
            Some(at) => (&text[..at], text[at..].trim()),
            None => (text, ""),
        };
        let name = head.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);

        match name.to_ascii_lowercase().as_str() {
            "add" | "save" => Some(Command::Add(rest.to_string())),
            "list" => Some(Command::List),
            "clear" => Some(Command::Clear),
            "check" => Some(Command::Check),
            "inline" => Some(Command::Inline(rest.to_string())),
            _ => None,
        }
    }
}

pub const ADD_USAGE: &str = "Send numbers after /add, separated by commas, spaces or new lines.";
const PERSIST_WARNING: &str = "⚠️ Could not write to disk; changes are kept until restart.";

/// Executes owner commands against the store and orchestrator, replying on
/// the given channel.
pub struct CommandHandler<S: Storage, F: Fetcher> {
    store: Arc<SavedStore<S>>,
    orchestrator: Arc<Orchestrator<F>>,
    lines_per_chunk: usize,
}

impl<S: Storage, F: Fetcher> CommandHandler<S, F> {
    pub fn new(
        store: Arc<SavedStore<S>>,
        orchestrator: Arc<Orchestrator<F>>,
        lines_per_chunk: usize,
    ) -> Self {
        Self {
            store,
            orchestrator,
            lines_per_chunk,
        }
    }

    /// Returns the check report for `Check`/`Inline`, `None` otherwise.
    pub async fn handle(
        &self,
        owner: OwnerId,
        command: Command,
        channel: &dyn DeliveryChannel,
    ) -> Result<Option<CheckReport>> {
        tracing::debug!("Owner {} issued {:?}", owner, command);
        match command {
            Command::Add(text) => {
                let reply = self.add(owner, &text).await;
                send_bounded(channel, &reply).await?;
                Ok(None)
            }
            Command::List => {
                for chunk in self.list(owner, channel.max_chunk_size()).await {
                    channel.send(&chunk).await?;
                }
                Ok(None)
            }
            Command::Clear => {
                let outcome = self.store.clear(owner).await;
                let mut reply = format!("Cleared {} saved numbers.", outcome.removed);
                if !outcome.persisted {
                    reply.push('\n');
                    reply.push_str(PERSIST_WARNING);
                }
                send_bounded(channel, &reply).await?;
                Ok(None)
            }
            Command::Check => Ok(Some(self.orchestrator.check_saved(owner, channel).await?)),
            Command::Inline(query) => Ok(Some(
                self.orchestrator
                    .check_inline(owner, &query, channel)
                    .await?,
            )),
        }
    }

    async fn add(&self, owner: OwnerId, text: &str) -> String {
        let tokens: Vec<&str> = normalizer::split_tokens(text).collect();
        if normalizer::identifiers(tokens.iter().copied()).is_empty() {
            return ADD_USAGE.to_string();
        }

        let outcome = self.store.add(owner, tokens).await;
        let mut reply = format!(
            "Saved {} new numbers. Total: {}/{}.",
            outcome.added,
            outcome.total,
            self.store.max_per_owner()
        );
        if outcome.overflow > 0 {
            reply.push_str(&format!(" {} ignored: limit reached.", outcome.overflow));
        }
        if !outcome.persisted {
            reply.push('\n');
            reply.push_str(PERSIST_WARNING);
        }
        reply
    }

    async fn list(&self, owner: OwnerId, max_chunk_size: usize) -> Vec<String> {
        let saved = self.store.list(owner).await;
        if saved.is_empty() {
            return paginate(
                None,
                &["You have no saved numbers.".to_string()],
                1,
                max_chunk_size,
            );
        }
        let lines: Vec<String> = saved
            .iter()
            .enumerate()
            .map(|(i, id)| format!("{}. +{}", i + 1, id))
            .collect();
        paginate(
            Some(format!("Saved numbers: {}", saved.len())),
            &lines,
            self.lines_per_chunk,
            max_chunk_size,
        )
    }
}

/// Sends a short reply, split if the channel cannot take it whole.
async fn send_bounded(channel: &dyn DeliveryChannel, reply: &str) -> Result<()> {
    for chunk in paginate(None, &[reply.to_string()], 1, channel.max_chunk_size()) {
        channel.send(&chunk).await?;
    }
    Ok(())
}
