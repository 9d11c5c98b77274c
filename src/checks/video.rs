//! Embedded video rules.
//!
//! `<video>` and `<embed>` are rejected outright, `<iframe>` always (with a
//! pointed message when it embeds a known video host). Links to a video host
//! must wrap a preview `<img>`; a bare text link fails.

use super::{Check, CheckContext};
use crate::report::{CheckResult, Diagnostic};
use url::Url;

const VIDEO_HOSTS: &[&str] = &[
    "youtube.com",
    "youtu.be",
    "vimeo.com",
    "dailymotion.com",
    "tiktok.com",
    "facebook.com",
    "streamable.com",
    "wistia.com",
    "loom.com",
];

/// Whether `url` points at a known video host (the host itself or any
/// subdomain). Protocol-relative URLs are read as https.
pub fn is_video_link(url: &str) -> bool {
    let url = url.trim();
    let absolute = if url.starts_with("//") {
        format!("https:{url}")
    } else {
        url.to_string()
    };
    let Ok(parsed) = Url::parse(&absolute) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };
    let host = host.to_ascii_lowercase();
    VIDEO_HOSTS
        .iter()
        .any(|h| host == *h || host.ends_with(&format!(".{h}")))
}

pub struct VideoCheck;

impl Check for VideoCheck {
    fn name(&self) -> &'static str {
        "Embedded Videos"
    }

    fn run(&self, ctx: &CheckContext) -> CheckResult {
        let mut violations = Vec::new();

        for (path, doc) in ctx.documents(&mut violations) {
            doc.visit(&mut |el, _| {
                let at = |message: String| match doc.line_of(el) {
                    Some(line) => Diagnostic::at(message, path, line),
                    None => Diagnostic::in_file(message, path),
                };

                match el.name.as_str() {
                    "video" => violations.push(at(
                        "<video> tag detected. Use a static image linking to the video instead"
                            .to_string(),
                    )),
                    "embed" => violations.push(at(
                        "<embed> tag detected. Embedding videos is not allowed".to_string(),
                    )),
                    "iframe" => {
                        let src = el.attr("src").unwrap_or("");
                        let message = if is_video_link(src) {
                            format!(
                                "<iframe> embed from \"{src}\" is not allowed. Use a preview image linking to this video"
                            )
                        } else {
                            "<iframe> detected. Embedding content is not allowed".to_string()
                        };
                        violations.push(at(message));
                    }
                    "a" => {
                        let href = el.attr("href").unwrap_or("");
                        if is_video_link(href) && !el.has_descendant("img") {
                            violations.push(at(format!(
                                "Link to video ({href}) must be shown using a preview image, not a plain link"
                            )));
                        }
                    }
                    _ => {}
                }
            });
        }

        CheckResult::from_violations(
            self.name(),
            self.severity(),
            violations,
            "No embedded videos",
        )
    }
}
