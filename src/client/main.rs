#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

//! ticketchat-tail
//!
//! Opens one ticket conversation from the stored session, prints it, and
//! tails live messages until Ctrl-C.
//!
//! ```text
//! ticketchat-tail <ticket-id>
//! ```
//!
//! Without a stored session, `TICKETCHAT_TOKEN` and `TICKETCHAT_USER_ID` are
//! used to log in and the session is saved for the next run.

use std::collections::HashSet;
use std::sync::Arc;
use ticketchat::client::{ChatSession, Config, FileSessionStore, Session, WsConnector};
use ticketchat::shared::messaging::{ChatMessage, CorrelationId, TicketId, UserId};

fn print_message(message: &ChatMessage) {
    let state = match (message.id, message.seen_at) {
        (None, _) => "unsent",
        (Some(_), Some(_)) => "seen",
        (Some(_), None) => "",
    };
    println!(
        "{} [{} -> {}] {} {}",
        message.timestamp.format("%Y-%m-%d %H:%M:%S"),
        message.sender_id,
        message.receiver_id,
        message.preview(120),
        state
    );
}

/// Messages of `conversation` not printed yet, in conversation order.
/// Keyed by correlation id, which an echo keeps.
fn unprinted(conversation: Vec<ChatMessage>, printed: &mut HashSet<CorrelationId>) -> Vec<ChatMessage> {
    conversation
        .into_iter()
        .filter(|message| printed.insert(message.correlation_id))
        .collect()
}

fn session_from_env() -> Option<Session> {
    let token = std::env::var("TICKETCHAT_TOKEN").ok()?;
    let user_id = std::env::var("TICKETCHAT_USER_ID").ok()?.parse::<i64>().ok()?;
    Some(Session::new(token, UserId(user_id)))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .init();

    let ticket_id = std::env::args()
        .nth(1)
        .ok_or("usage: ticketchat-tail <ticket-id>")?
        .parse::<i64>()
        .map(TicketId)?;

    let sessions = FileSessionStore::default_location()?;
    tracing::info!("[CHAT] Session file: {}", sessions.path().display());
    let mut chat = ChatSession::new(Config::new(), Arc::new(WsConnector), Box::new(sessions));

    if !chat.resume().await? {
        let session = session_from_env().ok_or("no stored session; set TICKETCHAT_TOKEN and TICKETCHAT_USER_ID")?;
        chat.login(session).await?;
    }

    chat.select_ticket(ticket_id)?;
    chat.load_history(ticket_id).await?;
    let mut printed = HashSet::new();
    for message in unprinted(chat.conversation(ticket_id), &mut printed) {
        print_message(&message);
    }
    println!("-- {} unread on ticket {} --", chat.unread_count(ticket_id), ticket_id);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = chat.next_change() => {
                let Some(changed) = changed else { break };
                if changed != ticket_id {
                    tracing::info!("[CHAT] Ticket {} now has {} unread", changed, chat.unread_count(changed));
                    continue;
                }
                for message in unprinted(chat.conversation(ticket_id), &mut printed) {
                    print_message(&message);
                }
            }
        }
    }

    // leave the stored session in place for the next run
    chat.shutdown().await;
    Ok(())
}
