//! Readable rendering of marketplace fragments and the release result

use crate::selectors::{MarketplaceUrls, RELEASE_NAME};
use amo_core::ReleaseInfo;
use htmd::HtmlToMarkdown;
use scraper::Html;

/// Convert a rendered HTML fragment to Markdown for the log and for error
/// messages. Scripts, styles and form chrome are dropped.
pub fn html_to_markdown(html: &str) -> String {
    let converter = HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style", "noscript", "button", "input"])
        .build();

    match converter.convert(html) {
        Ok(md) => collapse_blank_lines(&md),
        Err(_) => extract_text_fallback(html),
    }
}

/// Keep at most one blank line between content lines
fn collapse_blank_lines(md: &str) -> String {
    let mut result = String::with_capacity(md.len());
    let mut pending_blank = false;

    for line in md.lines() {
        if line.trim().is_empty() {
            pending_blank = !result.is_empty();
            continue;
        }
        if !result.is_empty() {
            result.push('\n');
            if pending_blank {
                result.push('\n');
            }
        }
        pending_blank = false;
        result.push_str(line.trim_end());
    }

    result.trim().to_string()
}

/// Plain text of the fragment, for markup htmd cannot convert
fn extract_text_fallback(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text: Vec<&str> = fragment.root_element().text().collect();
    collapse_whitespace(&text.join(" "))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Upload progress text as one log line: the cancel link's label removed,
/// whitespace collapsed
pub fn normalize_progress(progress: &str) -> String {
    collapse_whitespace(&progress.replacen("Cancel", "", 1))
}

/// Result handed back to the release pipeline
pub fn release_info(urls: &MarketplaceUrls) -> ReleaseInfo {
    ReleaseInfo {
        name: RELEASE_NAME.to_string(),
        url: urls.listing(),
    }
}
