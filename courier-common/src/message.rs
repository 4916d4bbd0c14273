//! The outbound message as the queue stores it and providers receive it.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::{address::Mailbox, error::ValidationError};

/// Dispatch priority of a queued message.
///
/// Variants are declared in dispatch order, so the derived `Ord` sorts
/// `High` first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Normal,
    Low,
}

/// A single email to deliver
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailPayload {
    #[serde(default)]
    pub from: Option<Mailbox>,
    #[serde(default)]
    pub to: Vec<Mailbox>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<Mailbox>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bcc: Vec<Mailbox>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<Mailbox>,
    #[serde(default)]
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(default)]
    pub track_opens: bool,
    #[serde(default)]
    pub track_clicks: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "is_empty_map")]
    pub metadata: AHashMap<String, String>,
    #[serde(default, skip_serializing_if = "is_empty_map")]
    pub headers: AHashMap<String, String>,
}

fn is_empty_map(map: &AHashMap<String, String>) -> bool {
    map.is_empty()
}

impl EmailPayload {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from(mut self, from: impl Into<Mailbox>) -> Self {
        self.from = Some(from.into());
        self
    }

    #[must_use]
    pub fn to(mut self, to: impl Into<Mailbox>) -> Self {
        self.to.push(to.into());
        self
    }

    #[must_use]
    pub fn cc(mut self, cc: impl Into<Mailbox>) -> Self {
        self.cc.push(cc.into());
        self
    }

    #[must_use]
    pub fn bcc(mut self, bcc: impl Into<Mailbox>) -> Self {
        self.bcc.push(bcc.into());
        self
    }

    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    #[must_use]
    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    /// Every recipient across `to`, `cc` and `bcc`
    pub fn recipients(&self) -> impl Iterator<Item = &Mailbox> {
        self.to.iter().chain(&self.cc).chain(&self.bcc)
    }

    pub fn recipient_count(&self) -> usize {
        self.to.len() + self.cc.len() + self.bcc.len()
    }

    /// Recipient addresses, lowercased and sorted, for duplicate detection
    pub fn sorted_recipients(&self) -> Vec<String> {
        let mut recipients: Vec<String> = self
            .recipients()
            .map(|mailbox| mailbox.email.to_ascii_lowercase())
            .collect();
        recipients.sort_unstable();
        recipients
    }

    /// Approximate size of the message body in bytes
    pub fn body_size(&self) -> usize {
        self.text.as_ref().map_or(0, String::len) + self.html.as_ref().map_or(0, String::len)
    }

    /// Check the message can be handed to a transport.
    ///
    /// # Errors
    ///
    /// Returns the first problem found, in the order: recipients, subject,
    /// body, sender, then individual addresses.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.recipient_count() == 0 {
            return Err(ValidationError::NoRecipients);
        }

        if self.subject.trim().is_empty() {
            return Err(ValidationError::EmptySubject);
        }

        let blank = |body: &Option<String>| body.as_deref().is_none_or(|b| b.trim().is_empty());
        if blank(&self.text) && blank(&self.html) {
            return Err(ValidationError::EmptyBody);
        }

        let Some(from) = &self.from else {
            return Err(ValidationError::MissingSender);
        };

        std::iter::once(from)
            .chain(self.recipients())
            .chain(self.reply_to.as_ref())
            .find(|mailbox| !mailbox.is_valid())
            .map_or(Ok(()), |mailbox| {
                Err(ValidationError::InvalidAddress(mailbox.email.clone()))
            })
    }
}
