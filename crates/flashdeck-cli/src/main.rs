//! flashdeck - command-line client for flashdeckd
//!
//! Each invocation connects to the daemon socket, sends one command on behalf
//! of `--user`, and prints the result. `watch` keeps the connection open and
//! prints the user's events as they arrive.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use flashdeck_api::{
    CardContent, CardType, CardView, Command, EventPayload, ResponsePayload, ResponseResult, Tag,
};
use flashdeck_ipc::IpcClient;
use flashdeck_util::{
    CardId, TagId, UserId, default_socket_path, format_datetime_full, format_interval,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// flashdeck - spaced-repetition flashcards
#[derive(Parser, Debug)]
#[command(name = "flashdeck")]
#[command(about = "Command-line client for flashdeckd", long_about = None)]
struct Args {
    /// Socket path for flashdeckd connection (or set FLASHDECK_SOCKET env var)
    #[arg(short, long, env = "FLASHDECK_SOCKET")]
    socket: Option<PathBuf>,

    /// Learner to act as (or set FLASHDECK_USER env var)
    #[arg(short, long, env = "FLASHDECK_USER")]
    user: UserId,

    /// Log level
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Create a card
    Add {
        /// Word or phrase being learned
        target: String,
        /// Its meaning
        meaning: String,
        /// "phrase" or "sentence"
        #[arg(long = "type", default_value = "phrase")]
        card_type: String,
        #[arg(long, default_value = "")]
        context: String,
        #[arg(long, default_value = "")]
        translation: String,
        #[arg(long, default_value = "")]
        cloze: String,
        /// Tag name; repeat for several
        #[arg(short, long = "tag")]
        tags: Vec<String>,
    },
    /// Grade a card: forgot, hard, or easy
    Review { card_id: CardId, rating: String },
    /// Cards due now, soonest first
    Due {
        #[arg(short = 'n', long)]
        limit: Option<u32>,
    },
    /// Pick a study session without changing any schedule
    Study {
        /// hardest, random, or tag
        #[arg(default_value = "hardest")]
        strategy: String,
        #[arg(short = 'n', long)]
        limit: Option<u32>,
        /// Tag id for the "tag" strategy; repeat for several
        #[arg(short, long = "tag")]
        tag_ids: Vec<TagId>,
        /// Seed for a reproducible "random" order
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Show one card
    Show { card_id: CardId },
    /// Delete a card
    Delete { card_id: CardId },
    /// List tags, or create/delete one
    Tags {
        #[command(subcommand)]
        action: Option<TagAction>,
    },
    /// Print events for this user until interrupted
    Watch,
    /// Service health
    Health,
}

#[derive(Subcommand, Debug)]
enum TagAction {
    Add { name: String },
    Delete { tag_id: TagId },
}

impl Action {
    fn into_command(self) -> Result<Command> {
        let command = match self {
            Action::Add {
                target,
                meaning,
                card_type,
                context,
                translation,
                cloze,
                tags,
            } => {
                let Some(card_type) = CardType::parse(&card_type) else {
                    bail!("unknown card type '{}' (expected phrase or sentence)", card_type);
                };
                Command::CreateCard {
                    content: CardContent {
                        card_type,
                        target_text: target,
                        target_meaning: meaning,
                        context_sentence: context,
                        context_translation: translation,
                        cloze_sentence: cloze,
                    },
                    tags,
                }
            }
            Action::Review { card_id, rating } => Command::Review { card_id, rating },
            Action::Due { limit } => Command::Due { limit },
            Action::Study {
                strategy,
                limit,
                tag_ids,
                seed,
            } => Command::Study {
                strategy,
                limit,
                tag_ids,
                seed,
            },
            Action::Show { card_id } => Command::GetCard { card_id },
            Action::Delete { card_id } => Command::DeleteCard { card_id },
            Action::Tags { action: None } => Command::ListTags,
            Action::Tags {
                action: Some(TagAction::Add { name }),
            } => Command::CreateTag { name },
            Action::Tags {
                action: Some(TagAction::Delete { tag_id }),
            } => Command::DeleteTag { tag_id },
            Action::Health => Command::GetHealth,
            Action::Watch => Command::SubscribeEvents,
        };
        Ok(command)
    }
}

fn card_line(card: &CardView) -> String {
    format!(
        "{}  {:<8} {:>6}  ease {:.2}  next {}  {} = {}",
        card.card_id,
        card.card_type.as_str(),
        format_interval(card.interval),
        card.ease_factor,
        format_datetime_full(&card.next_review),
        card.target_text,
        card.target_meaning,
    )
}

fn tag_line(tag: &Tag) -> String {
    format!("{}  {}", tag.id, tag.name)
}

fn render(payload: &ResponsePayload) -> String {
    match payload {
        ResponsePayload::Card(card) => card_line(card),
        ResponsePayload::Cards(cards) if cards.is_empty() => "No cards.".into(),
        ResponsePayload::Cards(cards) => cards.iter().map(card_line).collect::<Vec<_>>().join("\n"),
        ResponsePayload::Tag(tag) => tag_line(tag),
        ResponsePayload::Tags(tags) if tags.is_empty() => "No tags.".into(),
        ResponsePayload::Tags(tags) => tags.iter().map(tag_line).collect::<Vec<_>>().join("\n"),
        ResponsePayload::Deleted => "Deleted.".into(),
        ResponsePayload::Subscribed { client_id } => format!("Subscribed as {}", client_id),
        ResponsePayload::Unsubscribed => "Unsubscribed.".into(),
        ResponsePayload::Health(h) => format!(
            "live: {}  ready: {}  store: {}",
            h.live,
            h.ready,
            if h.store_ok { "ok" } else { "unavailable" }
        ),
        ResponsePayload::Pong => "pong".into(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let socket_path = args.socket.unwrap_or_else(default_socket_path);
    tracing::debug!(socket = %socket_path.display(), user = %args.user, "Connecting");

    let client = IpcClient::connect(&socket_path, args.user)
        .await
        .with_context(|| format!("connecting to flashdeckd at {}", socket_path.display()))?;

    if matches!(args.command, Action::Watch) {
        let mut events = client.subscribe().await?;
        loop {
            let event = events.next().await?;
            println!(
                "{}  {}",
                format_datetime_full(&event.timestamp),
                event_line(&event.payload)
            );
        }
    }

    let mut client = client;
    let response = client.send(args.command.into_command()?).await?;
    match response.result {
        ResponseResult::Ok(payload) => {
            println!("{}", render(&payload));
            Ok(())
        }
        ResponseResult::Err(e) => {
            let hint = if e.code.is_retryable() { " (try again)" } else { "" };
            bail!("{:?}: {}{}", e.code, e.message, hint)
        }
    }
}

fn event_line(payload: &EventPayload) -> String {
    match payload {
        EventPayload::CardReviewed {
            card_id,
            rating,
            interval,
            ease_factor,
            next_review,
        } => format!(
            "reviewed {} as {}: {} ease {:.2}, next {}",
            card_id,
            rating,
            format_interval(*interval),
            ease_factor,
            format_datetime_full(next_review)
        ),
        EventPayload::CardCreated { card_id } => format!("created {}", card_id),
        EventPayload::CardDeleted { card_id } => format!("deleted {}", card_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn args_are_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn add_builds_create_card() {
        let user = UserId::new();
        let args = Args::try_parse_from([
            "flashdeck",
            "--user",
            &user.to_string(),
            "add",
            "hola",
            "hello",
            "--tag",
            "spanish",
            "--tag",
            "greetings",
        ])
        .unwrap();
        assert_eq!(args.user, user);

        match args.command.into_command().unwrap() {
            Command::CreateCard { content, tags } => {
                assert_eq!(content.card_type, CardType::Phrase);
                assert_eq!(content.target_text, "hola");
                assert_eq!(tags, vec!["spanish", "greetings"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn unknown_card_type_rejected_locally() {
        let args = Args::try_parse_from([
            "flashdeck",
            "--user",
            &UserId::new().to_string(),
            "add",
            "x",
            "y",
            "--type",
            "poem",
        ])
        .unwrap();
        assert!(args.command.into_command().is_err());
    }

    #[test]
    fn study_passes_tokens_through() {
        let tag = TagId::new();
        let args = Args::try_parse_from([
            "flashdeck",
            "--user",
            &UserId::new().to_string(),
            "study",
            "tag",
            "-n",
            "5",
            "--tag",
            &tag.to_string(),
        ])
        .unwrap();

        match args.command.into_command().unwrap() {
            Command::Study {
                strategy,
                limit,
                tag_ids,
                seed,
            } => {
                assert_eq!(strategy, "tag");
                assert_eq!(limit, Some(5));
                assert_eq!(tag_ids, vec![tag]);
                assert!(seed.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn empty_lists_render_placeholder() {
        assert_eq!(render(&ResponsePayload::Cards(Vec::new())), "No cards.");
        assert_eq!(render(&ResponsePayload::Tags(Vec::new())), "No tags.");
    }
}
