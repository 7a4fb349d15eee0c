use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::errors::ClientError;

/// Body of a research request. Serialized untagged: the shape alone tells
/// the service which mode to run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ResearchRequest {
    /// Look up the meetings on a date in the calendar.
    Automatic(AutomaticLookup),
    /// Research a company and attendees given directly.
    Manual(ManualEntry),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomaticLookup {
    pub date: DateTime<Utc>,
    /// Attendees to leave out of the research (usually the requester).
    pub exclude_emails: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ManualEntry {
    pub company: String,
    pub attendees: Vec<String>,
}

impl ResearchRequest {
    pub fn automatic(date: DateTime<Utc>, exclude_emails: Vec<String>) -> Self {
        Self::Automatic(AutomaticLookup {
            date,
            exclude_emails,
        })
    }

    pub fn manual(company: impl Into<String>, attendees: Vec<String>) -> Self {
        Self::Manual(ManualEntry {
            company: company.into(),
            attendees,
        })
    }

    /// Trims list entries, drops blank ones and checks required fields.
    pub fn validate(self) -> Result<Self, ClientError> {
        match self {
            Self::Automatic(lookup) => Ok(Self::Automatic(AutomaticLookup {
                date: lookup.date,
                exclude_emails: clean_list(lookup.exclude_emails),
            })),
            Self::Manual(entry) => {
                let company = entry.company.trim();
                if company.is_empty() {
                    return Err(ClientError::Validation(
                        "company must not be empty".into(),
                    ));
                }
                Ok(Self::Manual(ManualEntry {
                    company: company.to_string(),
                    attendees: clean_list(entry.attendees),
                }))
            }
        }
    }

    /// Short label for logs.
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Automatic(_) => "automatic",
            Self::Manual(_) => "manual",
        }
    }
}

/// Splits free-form list input on commas or semicolons.
///
/// `"Mike Spring; Kate Benson"` and `"Mike Spring, Kate Benson"` both give
/// two entries.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split([',', ';'])
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_owned)
        .collect()
}

fn clean_list(entries: Vec<String>) -> Vec<String> {
    entries
        .into_iter()
        .map(|entry| entry.trim().to_string())
        .filter(|entry| !entry.is_empty())
        .collect()
}
