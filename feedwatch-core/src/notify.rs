use chrono::Utc;
use reqwest::Client;
use tracing::info;
use url::Url;

use crate::config::{NotificationSettings, Priority};
use crate::error::NotifyError;
use crate::feed::FeedItem;

const TEST_MESSAGE: &str = "This is a test notification from your RSS Feed Monitor";

/// Rendered ntfy message, ready to be posted.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub target: String,
    pub title: String,
    pub body: String,
    pub priority: Priority,
    pub tags: Option<String>,
    pub actions: Option<String>,
}

/// Drops every character outside printable ASCII (0x20..=0x7E).
pub fn sanitize_title(title: &str) -> String {
    title.chars().filter(|c| (' '..='~').contains(c)).collect()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

pub fn render(
    item: &FeedItem,
    matched_keywords: &[String],
    settings: &NotificationSettings,
    server_address: &str,
    default_topic: &str,
) -> Notification {
    let title = if settings.use_post_title {
        item.title.as_str()
    } else {
        non_empty(settings.custom_title.as_deref()).unwrap_or(&item.title)
    };

    let mut body = if settings.use_post_description {
        item.description.clone()
    } else {
        non_empty(settings.custom_description.as_deref())
            .unwrap_or(&item.description)
            .to_owned()
    };
    if settings.append_link && !item.link.is_empty() {
        body = format!("{body}\n\nLink: {}", item.link);
    }

    let tags = (settings.include_keyword_tags && !matched_keywords.is_empty())
        .then(|| matched_keywords.join(","));
    let actions = (settings.include_open_action && !item.link.is_empty())
        .then(|| format!("view, Open, {}", item.link));

    let topic = non_empty(settings.ntfy_topic.as_deref().map(str::trim)).unwrap_or(default_topic);
    let target = format!("{}/{}", server_address.trim_end_matches('/'), topic);

    Notification {
        target,
        title: sanitize_title(title),
        body,
        priority: settings.priority,
        tags,
        actions,
    }
}

/// Canned item used by the test-notification command.
pub fn test_item(server_address: &str) -> FeedItem {
    FeedItem {
        title: "Test Notification".to_owned(),
        link: server_address.to_owned(),
        description: TEST_MESSAGE.to_owned(),
        content: TEST_MESSAGE.to_owned(),
        summary: TEST_MESSAGE.to_owned(),
        content_snippet: TEST_MESSAGE.to_owned(),
        pub_date: Some(Utc::now()),
    }
}

/// Posts rendered notifications to the gateway. One attempt, no retry.
#[derive(Debug, Clone)]
pub struct Notifier {
    client: Client,
}

impl Notifier {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn dispatch(&self, notification: &Notification) -> Result<(), NotifyError> {
        let url = Url::parse(&notification.target)?;
        info!(title = %notification.title, target = %url, "sending notification");

        let mut request = self
            .client
            .post(url)
            .header("Title", notification.title.clone())
            .header("Priority", notification.priority.as_str())
            .body(notification.body.clone());
        if let Some(tags) = &notification.tags {
            request = request.header("Tags", tags.clone());
        }
        if let Some(actions) = &notification.actions {
            request = request.header("Actions", actions.clone());
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(NotifyError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}
