//! Push payload contract and notification options.

use serde::{Deserialize, Serialize};

use finpro_common::{Error, Result};

pub const DEFAULT_TITLE: &str = "FinTech Pro Notification";
pub const DEFAULT_BODY: &str = "New notification";
pub const DEFAULT_ICON: &str = "/icons/icon-192x192.png";
pub const DEFAULT_BADGE: &str = "/icons/icon-72x72.png";
pub const DEFAULT_URL: &str = "/";
const DEFAULT_VIBRATE: [u32; 3] = [100, 50, 100];

/// Inbound push message. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PushPayload {
    pub title: Option<String>,
    pub body: Option<String>,
    pub icon: Option<String>,
    pub url: Option<String>,
}

/// Data attached to a shown notification and handed back on click.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationData {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationOptions {
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub data: NotificationData,
}

/// A notification ready to display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub options: NotificationOptions,
}

impl From<PushPayload> for Notification {
    fn from(payload: PushPayload) -> Self {
        Self {
            title: payload.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            options: NotificationOptions {
                body: payload.body.unwrap_or_else(|| DEFAULT_BODY.to_string()),
                icon: payload.icon.unwrap_or_else(|| DEFAULT_ICON.to_string()),
                badge: DEFAULT_BADGE.to_string(),
                vibrate: DEFAULT_VIBRATE.to_vec(),
                data: NotificationData {
                    url: payload.url.unwrap_or_else(|| DEFAULT_URL.to_string()),
                },
            },
        }
    }
}

/// Decode a push message body.
///
/// Returns `Ok(None)` when the message carries no data.
pub fn parse_push(data: Option<&[u8]>) -> Result<Option<Notification>> {
    let Some(data) = data.filter(|d| !d.is_empty()) else {
        return Ok(None);
    };

    let payload: PushPayload = serde_json::from_slice(data)
        .map_err(|e| Error::MalformedPushPayload(e.to_string()))?;
    Ok(Some(payload.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let notification = parse_push(Some(b"{}")).unwrap().unwrap();

        assert_eq!(notification.title, "FinTech Pro Notification");
        assert_eq!(notification.options.body, "New notification");
        assert_eq!(notification.options.icon, "/icons/icon-192x192.png");
        assert_eq!(notification.options.badge, "/icons/icon-72x72.png");
        assert_eq!(notification.options.vibrate, vec![100, 50, 100]);
        assert_eq!(notification.options.data.url, "/");
    }

    #[test]
    fn test_payload_fields_override_defaults() {
        let body = br#"{"title":"Rates","body":"EUR/USD moved","url":"/markets"}"#;
        let notification = parse_push(Some(body)).unwrap().unwrap();

        assert_eq!(notification.title, "Rates");
        assert_eq!(notification.options.body, "EUR/USD moved");
        assert_eq!(notification.options.data.url, "/markets");
        assert_eq!(notification.options.icon, DEFAULT_ICON);
    }

    #[test]
    fn test_empty_push_is_ignored() {
        assert!(parse_push(None).unwrap().is_none());
        assert!(parse_push(Some(b"")).unwrap().is_none());
    }

    #[test]
    fn test_malformed_payload() {
        let result = parse_push(Some(b"not json"));
        assert!(matches!(result, Err(Error::MalformedPushPayload(_))));
    }
}
