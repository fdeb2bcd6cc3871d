//! HTML listing of all series

use std::fmt::Write;

use axum::extract::State;
use axum::response::Html;

use super::{MetricsApiState, with_timeout};
use crate::api::types::ApiError;

/// `GET /`
pub async fn index(State(state): State<MetricsApiState>) -> Result<Html<String>, ApiError> {
    let snapshot = with_timeout(state.storage.get_all()).await?;

    let mut body = String::from("<!DOCTYPE html>\n<html><head><title>Metrics</title></head><body>\n");
    if snapshot.is_empty() {
        body.push_str("<p>No metrics available</p>\n");
    }
    for metric in snapshot.values() {
        let _ = writeln!(
            body,
            "<div>{}: {}</div>",
            escape_html(metric.id()),
            metric.value_string()
        );
    }
    body.push_str("</body></html>\n");
    Ok(Html(body))
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<b>&\"'"), "&lt;b&gt;&amp;&quot;&#39;");
        assert_eq!(escape_html("Alloc"), "Alloc");
    }
}
