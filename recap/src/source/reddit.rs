// Reddit thread extraction
//
// Fetches the `.json` rendering of a thread and flattens post and comment
// tree into indented plain text.

use std::time::Duration;

use serde_json::Value;

use crate::config::RedditConfig;

use super::{Document, DocumentKind, SourceError, SourceExtractor};

const FETCH_TIMEOUT: Duration = Duration::from_secs(20);

const REDDIT_HOSTS: &[&str] = &[
    "reddit.com",
    "www.reddit.com",
    "old.reddit.com",
    "new.reddit.com",
    "np.reddit.com",
];

pub struct RedditExtractor {
    client: reqwest::Client,
    config: RedditConfig,
}

impl RedditExtractor {
    pub fn new(client: reqwest::Client, config: RedditConfig) -> Self {
        Self { client, config }
    }

    fn listing_url(&self, url: &reqwest::Url) -> String {
        let path = url.path().trim_end_matches('/');
        format!(
            "{}{}.json?raw_json=1&limit={}",
            self.config.api_base, path, self.config.comment_limit
        )
    }
}

#[async_trait::async_trait]
impl SourceExtractor for RedditExtractor {
    fn name(&self) -> &'static str {
        "reddit"
    }

    fn accepts(&self, url: &reqwest::Url) -> bool {
        let host_ok = url
            .host_str()
            .map(|h| REDDIT_HOSTS.contains(&h.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        host_ok && url.path().contains("/comments/")
    }

    async fn extract(&self, url: &reqwest::Url) -> Result<Document, SourceError> {
        let listing_url = self.listing_url(url);

        let resp = self
            .client
            .get(&listing_url)
            .header(reqwest::header::USER_AGENT, &self.config.user_agent)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| SourceError::ExtractionFailed(format!("reddit request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::ExtractionFailed(format!(
                "reddit returned {status} for {listing_url}"
            )));
        }

        let listing: Value = resp.json().await.map_err(|e| {
            SourceError::ExtractionFailed(format!("reddit response is not valid JSON: {e}"))
        })?;

        let (title, text) = render_thread(&listing, self.config.max_comment_depth)?;
        tracing::debug!(url = %url, chars = text.len(), "reddit thread rendered");

        Ok(Document {
            url: url.to_string(),
            kind: DocumentKind::Reddit,
            title: Some(title),
            text,
        })
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render a thread listing (`[post listing, comment listing]`) as text.
///
/// Returns the post title and the rendered thread. Comments deeper than
/// `max_depth` (0 = top-level only) are dropped along with their replies.
pub fn render_thread(listing: &Value, max_depth: usize) -> Result<(String, String), SourceError> {
    let post = listing
        .get(0)
        .and_then(children)
        .and_then(|c| c.first())
        .and_then(|p| p.get("data"))
        .ok_or_else(|| SourceError::ExtractionFailed("reddit listing has no post".into()))?;

    let title = str_field(post, "title").to_string();
    let mut out = String::new();
    out.push_str(&format!("Title: {title}\n"));
    out.push_str(&format!("Subreddit: r/{}\n", str_field(post, "subreddit")));
    out.push_str(&format!("Author: u/{}\n", str_field(post, "author")));
    out.push_str(&format!("Score: {}\n", int_field(post, "score")));

    let selftext = str_field(post, "selftext").trim();
    if !selftext.is_empty() {
        out.push('\n');
        out.push_str(selftext);
        out.push('\n');
    }

    let link = str_field(post, "url");
    if !link.is_empty() && !post.get("is_self").and_then(Value::as_bool).unwrap_or(true) {
        out.push_str(&format!("\nLink: {link}\n"));
    }

    let comments = listing
        .get(1)
        .and_then(children)
        .map(Vec::as_slice)
        .unwrap_or(&[]);
    let mut rendered = String::new();
    render_comments(comments, 0, max_depth, &mut rendered);
    if !rendered.is_empty() {
        out.push_str("\nComments:\n");
        out.push_str(&rendered);
    }

    Ok((title, out))
}

fn render_comments(comments: &[Value], depth: usize, max_depth: usize, out: &mut String) {
    if depth > max_depth {
        return;
    }
    let indent = "  ".repeat(depth);

    for comment in comments {
        // "more" stubs and anything else that is not a comment.
        if comment.get("kind").and_then(Value::as_str) != Some("t1") {
            continue;
        }
        let Some(data) = comment.get("data") else {
            continue;
        };

        let body = str_field(data, "body").trim();
        if body.is_empty() {
            continue;
        }

        out.push_str(&format!(
            "{indent}- u/{} ({} points): ",
            str_field(data, "author"),
            int_field(data, "score")
        ));
        let mut lines = body.lines();
        if let Some(first) = lines.next() {
            out.push_str(first);
        }
        out.push('\n');
        for line in lines {
            out.push_str(&indent);
            out.push_str("  ");
            out.push_str(line);
            out.push('\n');
        }

        // `replies` is "" when there are none.
        if let Some(replies) = data.get("replies").and_then(children) {
            render_comments(replies, depth + 1, max_depth, out);
        }
    }
}

fn children(listing: &Value) -> Option<&Vec<Value>> {
    listing.get("data")?.get("children")?.as_array()
}

fn str_field<'a>(data: &'a Value, key: &str) -> &'a str {
    data.get(key).and_then(Value::as_str).unwrap_or("")
}

fn int_field(data: &Value, key: &str) -> i64 {
    data.get(key).and_then(Value::as_i64).unwrap_or(0)
}
