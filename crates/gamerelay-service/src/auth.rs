//! Ticket resolution.
//!
//! Clients do not send credentials over the game socket. They first ask
//! the user service for a short-lived ticket, then present it in the join
//! URL. [`UserRepository`] turns that ticket back into a user id.

use std::future::Future;

use dashmap::DashMap;
use gamerelay_protocol::PlayerId;

/// Resolves join tickets to user ids.
pub trait UserRepository: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Redeems `ticket` and returns the user it was issued to.
    fn acquire_user_id(
        &self,
        ticket: &str,
    ) -> impl Future<Output = Result<PlayerId, Self::Error>> + Send;
}

/// The ticket was never issued or has already been redeemed.
#[derive(Debug, thiserror::Error)]
#[error("unknown ticket")]
pub struct UnknownTicket;

/// In-memory tickets for development and tests.
///
/// Tickets are single-use unless issued with
/// [`issue_reusable`](Self::issue_reusable).
#[derive(Debug, Default)]
pub struct StaticTickets {
    tickets: DashMap<String, (PlayerId, bool)>,
}

impl StaticTickets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a ticket that can be redeemed once.
    pub fn issue(&self, ticket: impl Into<String>, user: PlayerId) {
        self.tickets.insert(ticket.into(), (user, false));
    }

    /// Issues a ticket that can be redeemed any number of times.
    pub fn issue_reusable(&self, ticket: impl Into<String>, user: PlayerId) {
        self.tickets.insert(ticket.into(), (user, true));
    }

    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    fn redeem(&self, ticket: &str) -> Option<PlayerId> {
        let reusable = self.tickets.get(ticket)?.1;
        if reusable {
            self.tickets.get(ticket).map(|entry| entry.0.clone())
        } else {
            self.tickets.remove(ticket).map(|(_, (user, _))| user)
        }
    }
}

impl UserRepository for StaticTickets {
    type Error = UnknownTicket;

    async fn acquire_user_id(&self, ticket: &str) -> Result<PlayerId, UnknownTicket> {
        self.redeem(ticket).ok_or(UnknownTicket)
    }
}
