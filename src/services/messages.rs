// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Direct messages between users.

use crate::db::document::to_document;
use crate::db::{collections, new_key, DocumentStore, Filter, Update};
use crate::error::{AppError, Result};
use crate::models::{validate_id, Message, MessageDraft};
use crate::time_utils::now_rfc3339_millis;
use std::sync::Arc;
use validator::Validate;

#[derive(Clone)]
pub struct MessageService {
    store: Arc<dyn DocumentStore>,
}

impl MessageService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn send_message(&self, draft: MessageDraft) -> Result<Message> {
        draft.validate()?;
        validate_id("sender", &draft.sender_id)?;
        validate_id("receiver", &draft.receiver_id)?;

        let message = Message {
            id: new_key(),
            sender_id: draft.sender_id,
            receiver_id: draft.receiver_id,
            kind: draft.kind,
            read: false,
            timestamp: now_rfc3339_millis(),
            body: draft.body,
        };
        self.store
            .insert_one(collections::MESSAGES, to_document(&message)?)
            .await?;

        tracing::debug!(
            message_id = %message.id,
            sender_id = %message.sender_id,
            receiver_id = %message.receiver_id,
            "Message sent"
        );
        Ok(message)
    }

    /// Messages between two users in both directions, oldest first.
    pub async fn conversation(&self, user_a: &str, user_b: &str) -> Result<Vec<Message>> {
        validate_id("user", user_a)?;
        validate_id("user", user_b)?;

        let mut messages = self.direction(user_a, user_b).await?;
        if user_a != user_b {
            messages.extend(self.direction(user_b, user_a).await?);
        }

        // Fixed-format UTC timestamps sort lexically.
        messages.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(messages)
    }

    async fn direction(&self, sender: &str, receiver: &str) -> Result<Vec<Message>> {
        self.store
            .get_many::<Message>(
                collections::MESSAGES,
                &Filter::field_eq("sender_id", sender).and(Filter::field_eq("receiver_id", receiver)),
            )
            .await
    }

    pub async fn mark_read(&self, message_id: &str) -> Result<()> {
        validate_id("message", message_id)?;

        let outcome = self
            .store
            .update_one(
                collections::MESSAGES,
                &Filter::key(message_id),
                &Update::new().set("read", true),
            )
            .await?;
        if outcome.matched == 0 {
            return Err(AppError::NotFound(format!(
                "Message {} not found",
                message_id
            )));
        }
        Ok(())
    }
}
