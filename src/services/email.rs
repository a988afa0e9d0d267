//! Turns an already-parsed inbound email into a ticket or a follow-up.
//!
//! The ticket is resolved in order from the `In-Reply-To` header (matched
//! against stored follow-up message ids), the explicit ticket id, and a
//! `[<slug>-<id>]` reference in the subject. Unresolved messages open a new
//! ticket.

use crate::{
    error::{AppError, Result},
    models::{
        email::{EmailOutcome, IngestEmailRequest},
        ticket::{TicketStatus, DEFAULT_PRIORITY},
    },
    services::{
        attachment::decode_uploads,
        followup::{FollowUpDraft, FollowUpService},
        ticket::{OpeningFollowUp, TicketDraft, TicketService},
        Database,
    },
};
use regex::Regex;
use std::collections::BTreeMap;
use tracing::{debug, info};
use validator::Validate;

const NO_SUBJECT: &str = "(no subject)";

#[derive(Clone)]
pub struct EmailService {
    db: Database,
    tickets: TicketService,
    followups: FollowUpService,
    max_attachment_size: u64,
    subject_reference: Regex,
}

impl EmailService {
    pub fn new(
        db: Database,
        tickets: TicketService,
        followups: FollowUpService,
        max_attachment_size: u64,
    ) -> Result<Self> {
        let subject_reference = Regex::new(r"\[(?P<slug>[\w-]+)-(?P<id>\d+)\]")
            .map_err(|e| AppError::Internal(format!("Invalid subject pattern: {}", e)))?;

        Ok(Self {
            db,
            tickets,
            followups,
            max_attachment_size,
            subject_reference,
        })
    }

    pub async fn create_object_from_email_message(&self, request: IngestEmailRequest) -> Result<EmailOutcome> {
        request.validate()?;

        let payload = &request.payload;
        let attachments = decode_uploads("files", &payload.files, self.max_attachment_size)?;
        let message_id = request
            .message
            .message_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);

        match self.resolve_ticket(&request) {
            Some(ticket_id) => {
                let draft = FollowUpDraft {
                    ticket_id,
                    author: None,
                    title: format!("E-Mail Received from {}", payload.sender_email),
                    comment: payload.comment(),
                    public: true,
                    new_status: None,
                    reopen_if_closed: true,
                    time_spent: None,
                    message_id,
                    attachments,
                };

                let (followup, _) = self.followups.append_followup(draft).await?;
                info!(
                    "Email from {} appended follow-up {} to ticket {}",
                    payload.sender_email, followup.followup.id, ticket_id
                );

                Ok(EmailOutcome::FollowUp {
                    ticket_id,
                    followup_id: followup.followup.id,
                })
            }
            None => {
                let draft = TicketDraft {
                    queue_id: payload.queue,
                    title: self.strip_reference(&payload.subject),
                    description: payload.comment(),
                    resolution: None,
                    submitter_email: Some(payload.sender_email.clone()),
                    assigned_to: None,
                    status: TicketStatus::New,
                    on_hold: false,
                    priority: parse_priority(payload.priority.as_deref()),
                    due_date: None,
                    merged_to: None,
                    custom_input: BTreeMap::new(),
                    partial_custom_fields: true,
                    opening: OpeningFollowUp {
                        title: format!("E-Mail Received from {}", payload.sender_email),
                        author: None,
                        message_id,
                        attachments,
                    },
                };

                let (ticket, followup_id) = self.tickets.open_ticket(draft).await?;
                info!(
                    "Email from {} opened ticket {}",
                    payload.sender_email,
                    ticket.reference()
                );

                Ok(EmailOutcome::Ticket {
                    ticket_id: ticket.ticket.id,
                    followup_id,
                })
            }
        }
    }

    fn resolve_ticket(&self, request: &IngestEmailRequest) -> Option<u64> {
        if let Some(reply_to) = request.message.reply_to() {
            let matched = self
                .db
                .read(|t| t.followup_by_message_id(reply_to).map(|f| f.ticket_id));
            if let Some(ticket_id) = matched {
                debug!("In-Reply-To {} matched ticket {}", reply_to, ticket_id);
                return Some(ticket_id);
            }
        }

        if let Some(ticket_id) = request.ticket_id {
            if self.db.read(|t| t.tickets.contains_key(&ticket_id)) {
                return Some(ticket_id);
            }
            debug!("Ignoring unknown ticket id {} on inbound email", ticket_id);
        }

        let captures = self.subject_reference.captures(&request.payload.subject)?;
        let slug = captures.name("slug")?.as_str();
        let ticket_id: u64 = captures.name("id")?.as_str().parse().ok()?;

        self.db.read(|t| {
            let ticket = t.tickets.get(&ticket_id)?;
            let queue = t.queues.get(&ticket.queue_id)?;
            (queue.slug == slug).then_some(ticket_id)
        })
    }

    fn strip_reference(&self, subject: &str) -> String {
        let title = self.subject_reference.replace_all(subject, "");
        let title = title.trim();
        if title.is_empty() {
            NO_SUBJECT.to_string()
        } else {
            title.chars().take(200).collect()
        }
    }
}

/// Mail priority header value, falling back to the default for anything
/// outside 1..=5.
fn parse_priority(raw: Option<&str>) -> u8 {
    raw.and_then(|p| p.trim().parse::<u8>().ok())
        .filter(|p| (1..=5).contains(p))
        .unwrap_or(DEFAULT_PRIORITY)
}
