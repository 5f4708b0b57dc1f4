//! Keyword rules: prefix matching and response formatting.
//!
//! Rules are evaluated in list order and the first rule whose keyword is a
//! case-insensitive prefix of the message wins. There is no scoring: callers
//! that manage the list put more specific prefixes first.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::AutoReplyError;
use crate::message::MediaPayload;

/// Delimiter separating response lines in a stored rule.
pub const LINE_DELIMITER: &str = "||";

/// A prefix pattern paired with a response (text and/or image).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub keyword: String,
    #[serde(default)]
    pub response: String,
    /// Image as a `data:<mime>;base64,...` URI.
    #[serde(default)]
    pub image: Option<String>,
}

impl KeywordRule {
    pub fn new(keyword: &str, response: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            response: response.to_string(),
            image: None,
        }
    }

    pub fn with_image(mut self, data_uri: &str) -> Self {
        self.image = Some(data_uri.to_string());
        self
    }

    /// Whether `text` starts with this rule's keyword, ignoring case.
    pub fn matches(&self, text: &str) -> bool {
        text.to_lowercase()
            .starts_with(&self.keyword.to_lowercase())
    }

    /// Apply a partial update; fields absent from the patch are kept.
    pub fn apply(&mut self, patch: KeywordRulePatch) {
        if let Some(keyword) = patch.keyword {
            self.keyword = keyword;
        }
        if let Some(response) = patch.response {
            self.response = response;
        }
        if let Some(image) = patch.image {
            self.image = image;
        }
    }

    /// Build the reply this rule produces.
    pub fn reply(&self) -> Result<Reply, AutoReplyError> {
        let text = format_response(&self.response);
        match self.image.as_deref().filter(|uri| !uri.is_empty()) {
            Some(uri) => Ok(Reply::Media {
                media: MediaPayload::from_data_uri(uri)?,
                caption: text,
            }),
            None => Ok(Reply::Text(text)),
        }
    }
}

/// Partial update for a keyword rule.
///
/// `image: null` clears the image; omitting `image` keeps it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct KeywordRulePatch {
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub image: Option<Option<String>>,
}

/// Distinguish an explicit `null` from a missing field.
fn deserialize_some<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// What to send back for a matched rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Plain reply to the inbound message.
    Text(String),
    /// Media sent to the sender with the text as caption.
    Media { media: MediaPayload, caption: String },
}

/// Return the first rule whose keyword prefixes `text` (case-insensitive).
pub fn match_rule<'a>(rules: &'a [KeywordRule], text: &str) -> Option<&'a KeywordRule> {
    let lowered = text.to_lowercase();
    rules
        .iter()
        .find(|rule| lowered.starts_with(&rule.keyword.to_lowercase()))
}

/// Split on `||`, trim each segment, drop empty ones, and join with newlines.
pub fn format_response(response: &str) -> String {
    response
        .split(LINE_DELIMITER)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> Vec<KeywordRule> {
        vec![
            KeywordRule::new("harga paket", "Paket A 100k||Paket B 200k"),
            KeywordRule::new("harga", "Cek katalog kami"),
            KeywordRule::new("halo", "Hai juga!"),
        ]
    }

    #[test]
    fn test_match_case_insensitive_prefix() {
        let rules = rules();
        let hit = match_rule(&rules, "Halo, apa kabar?").unwrap();
        assert_eq!(hit.response, "Hai juga!");
        assert!(match_rule(&rules, "HALO").is_some());
    }

    #[test]
    fn test_match_is_prefix_not_substring() {
        let rules = rules();
        assert!(match_rule(&rules, "oh halo").is_none());
        assert!(match_rule(&rules, "hal").is_none());
    }

    #[test]
    fn test_first_match_wins() {
        let rules = rules();
        let hit = match_rule(&rules, "harga paket hemat").unwrap();
        assert_eq!(hit.keyword, "harga paket");

        // Reversed order: the general rule now shadows the specific one.
        let reversed: Vec<KeywordRule> = rules.into_iter().rev().collect();
        let hit = match_rule(&reversed, "harga paket hemat").unwrap();
        assert_eq!(hit.keyword, "harga");
    }

    #[test]
    fn test_no_match_on_empty_list() {
        assert!(match_rule(&[], "anything").is_none());
    }

    #[test]
    fn test_keyword_case_is_ignored() {
        let rules = vec![KeywordRule::new("PROMO", "50% off")];
        assert!(match_rule(&rules, "promo hari ini").is_some());
        assert!(rules[0].matches("Promo"));
    }

    #[test]
    fn test_format_response_drops_blank_segments() {
        assert_eq!(format_response("Hi||  ||Bye"), "Hi\nBye");
        assert_eq!(format_response("  one  "), "one");
        assert_eq!(format_response("a||b||c"), "a\nb\nc");
        assert_eq!(format_response("||"), "");
        assert_eq!(format_response(""), "");
    }

    #[test]
    fn test_reply_text() {
        let rule = KeywordRule::new("menu", "Nasi||Mie");
        assert_eq!(rule.reply().unwrap(), Reply::Text("Nasi\nMie".to_string()));
    }

    #[test]
    fn test_reply_empty_response_is_sent_as_is() {
        let rule = KeywordRule::new("x", "");
        assert_eq!(rule.reply().unwrap(), Reply::Text(String::new()));
    }

    #[test]
    fn test_reply_media_with_caption() {
        // "hi" in base64.
        let rule = KeywordRule::new("pic", "Look||here").with_image("data:image/jpeg;base64,aGk=");
        match rule.reply().unwrap() {
            Reply::Media { media, caption } => {
                assert_eq!(media.mime_type, "image/jpeg");
                assert_eq!(media.data, b"hi");
                assert_eq!(caption, "Look\nhere");
            }
            other => panic!("expected media reply, got {other:?}"),
        }
    }

    #[test]
    fn test_reply_bad_image_is_error() {
        let rule = KeywordRule::new("pic", "x").with_image("not-a-data-uri");
        assert!(rule.reply().is_err());
    }

    #[test]
    fn test_patch_keeps_missing_fields() {
        let mut rule = KeywordRule::new("pic", "old").with_image("data:image/png;base64,aGk=");
        let patch: KeywordRulePatch = serde_json::from_str(r#"{"response":"new"}"#).unwrap();
        rule.apply(patch);
        assert_eq!(rule.keyword, "pic");
        assert_eq!(rule.response, "new");
        assert!(rule.image.is_some());
    }

    #[test]
    fn test_patch_null_image_clears() {
        let mut rule = KeywordRule::new("pic", "old").with_image("data:image/png;base64,aGk=");
        let patch: KeywordRulePatch = serde_json::from_str(r#"{"image":null}"#).unwrap();
        assert_eq!(patch.image, Some(None));
        rule.apply(patch);
        assert_eq!(rule.image, None);
        assert_eq!(rule.response, "old");
    }

    #[test]
    fn test_rule_serializes_null_image() {
        let json = serde_json::to_value(KeywordRule::new("a", "b")).unwrap();
        assert_eq!(json, serde_json::json!({"keyword":"a","response":"b","image":null}));
    }

    #[test]
    fn test_rule_deserializes_without_image() {
        let rule: KeywordRule = serde_json::from_str(r#"{"keyword":"a","response":"b"}"#).unwrap();
        assert_eq!(rule.image, None);
    }
}
