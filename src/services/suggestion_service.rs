//! Packing suggestions from an external text-generation model.
//!
//! The model itself sits behind `SuggestionProvider`. This module owns the
//! prompt and the cleanup of whatever comes back: fenced JSON, malformed
//! JSON and provider outages all degrade to "no suggestions".

use crate::models::PackageType;
use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;
use tracing::{debug, warn};

/// Shown when the provider cannot produce a tip.
pub const FALLBACK_TIP: &str = "Plan ahead and declutter before you pack!";

#[derive(Debug, Error)]
pub enum SuggestionError {
    #[error("suggestion provider unavailable: {0}")]
    Unavailable(String),
}

/// What the user is packing.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionRequest {
    pub room_of_origin: String,
    pub package_type: PackageType,
    #[serde(default)]
    pub existing_content: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SuggestedItem {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// A text model that answers a prompt.
pub trait SuggestionProvider: Send + Sync {
    fn generate(&self, prompt: &str)
    -> impl Future<Output = Result<String, SuggestionError>> + Send;
}

pub struct SuggestionService<P: SuggestionProvider> {
    provider: P,
}

impl<P: SuggestionProvider> SuggestionService<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Ask for 3–5 items commonly packed from the given room.
    ///
    /// Never fails; any problem yields an empty list.
    pub async fn suggest(&self, request: &SuggestionRequest) -> Vec<SuggestedItem> {
        let prompt = build_prompt(request);
        match self.provider.generate(&prompt).await {
            Ok(text) => parse_suggestions(&text),
            Err(err) => {
                warn!("content suggestions skipped: {}", err);
                Vec::new()
            }
        }
    }

    /// One short moving tip, or `FALLBACK_TIP`.
    pub async fn moving_tip(&self) -> String {
        let prompt = "Provide one concise, actionable moving tip for someone planning a house move. \
                      Keep it under 150 characters.";
        match self.provider.generate(prompt).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => FALLBACK_TIP.to_string(),
            Err(err) => {
                warn!("moving tip skipped: {}", err);
                FALLBACK_TIP.to_string()
            }
        }
    }
}

pub fn build_prompt(request: &SuggestionRequest) -> String {
    let kind = request.package_type.id_stem();
    let room = &request.room_of_origin;
    let mut prompt = String::from("You are a helpful moving assistant.\n");
    prompt.push_str(&format!("A user is packing a {} for their move.\n", kind));
    prompt.push_str(&format!(
        "The room of origin for this package is \"{}\".\n",
        room
    ));
    if let Some(existing) = request
        .existing_content
        .as_deref()
        .filter(|s| !s.trim().is_empty())
    {
        prompt.push_str(&format!(
            "They have already listed these items: \"{}\".\n",
            existing
        ));
    }
    prompt.push_str(&format!(
        "Suggest 3-5 common items that are typically packed in a {} from a {}.\n",
        kind, room
    ));
    prompt.push_str("Consider items that might be overlooked.\n");
    prompt.push_str(
        "Provide your response as a JSON array of objects, where each object has a \"name\" \
         (string) and an optional \"reason\" (string, brief).\n",
    );
    prompt.push_str(
        "Example: [{\"name\": \"Item 1\", \"reason\": \"Often forgotten\"}, {\"name\": \"Item 2\"}]\n",
    );
    prompt
}

/// Trim and unwrap a single Markdown code fence (optionally tagged).
pub fn clean_json_response(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed
        .strip_prefix("```")
        .and_then(|s| s.strip_suffix("```"))
    else {
        return trimmed;
    };
    let body = inner
        .trim_start_matches(|c: char| c.is_ascii_alphanumeric() || c == '_')
        .trim();
    if body.is_empty() { trimmed } else { body }
}

/// Parse a model reply into items. Anything unexpected yields an empty list.
pub fn parse_suggestions(text: &str) -> Vec<SuggestedItem> {
    let cleaned = clean_json_response(text);
    match serde_json::from_str::<Vec<SuggestedItem>>(cleaned) {
        Ok(items) => items,
        Err(err) => {
            debug!("suggestion reply was not the expected JSON: {}", err);
            Vec::new()
        }
    }
}
