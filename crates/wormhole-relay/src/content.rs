//! Mirror content codec.
//!
//! A mirror is the original text with two optional decorations:
//!
//! ```text
//! **╭** 💬 [**Alice**](<https://discord.com/channels/1/2/3>) : the replied-to text
//! the original body, cut short if needed [[...]](<https://discord.com/channels/1/4/5>)
//! ```
//!
//! The first line previews the message being answered and links to its
//! mirror in the destination channel. The trailing link points at the
//! original when the body had to be cut to respect the platform's message
//! size limit. [`extract_original_content`] undoes both so a mirror can be
//! compared against its original.
//!
//! All lengths are counted in `char`s.

use wormhole_common::models::{Message, MessageLink};

/// First characters of a reply-preview line.
pub const REPLY_PREFIX: &str = "**╭** 💬 [**";
/// Start of the "see more" link appended to cut bodies.
pub const TRUNCATION_MARKER: &str = " [[...]](<";
/// Only this many leading characters take part in identity comparison.
pub const COMPARISON_CAP: usize = 1500;
/// Platform limit on message length.
pub const MIRROR_LIMIT: usize = 2000;
/// Longest replied-to snippet shown in a reply line.
pub const PREVIEW_LENGTH: usize = 50;

const PREVIEW_CUT: usize = PREVIEW_LENGTH - 3;

/// What a reply line shows about the message being answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyPreview {
    /// Display name of the replied-to message's author
    pub author: String,
    /// Where the preview links to (the mirror if found, else the original)
    pub jump_url: String,
    /// Replied-to text, without its own decorations
    pub content: String,
}

impl ReplyPreview {
    /// The full reply line, newline included.
    pub fn line(&self) -> String {
        format!(
            "{REPLY_PREFIX}{}**](<{}>) : {}\n",
            self.author,
            self.jump_url,
            preview_snippet(&self.content)
        )
    }
}

/// Composes mirrors. Holds the web base URL jump links are built on.
#[derive(Debug, Clone)]
pub struct ContentCodec {
    web_url: String,
}

impl ContentCodec {
    pub fn new(web_url: impl Into<String>) -> Self {
        Self {
            web_url: web_url.into(),
        }
    }

    pub fn jump_url(&self, message: &Message) -> String {
        message.jump_url(&self.web_url)
    }

    /// Build the mirror text for `message`, at most [`MIRROR_LIMIT`] chars.
    pub fn compose(&self, message: &Message, reply: Option<&ReplyPreview>) -> String {
        let mut reply_line = reply.map(ReplyPreview::line).unwrap_or_default();
        let body = message.content.as_str();

        if char_len(&reply_line) + char_len(body) <= MIRROR_LIMIT {
            return reply_line + body;
        }

        let suffix = format!("{TRUNCATION_MARKER}{}>)", self.jump_url(message));
        if char_len(&reply_line) + char_len(&suffix) > MIRROR_LIMIT {
            reply_line.clear();
        }
        let room = MIRROR_LIMIT.saturating_sub(char_len(&reply_line) + char_len(&suffix));
        format!("{reply_line}{}{suffix}", truncate_chars(body, room))
    }
}

/// Strip the reply line and the "see more" link from a mirror's text.
///
/// Text without decorations is returned unchanged.
pub fn extract_original_content(text: &str) -> &str {
    let mut body = text;
    if body.starts_with(REPLY_PREFIX) {
        body = body.split_once('\n').map_or("", |(_, rest)| rest);
    }
    if body.ends_with(">)") {
        if let Some(idx) = body.rfind(TRUNCATION_MARKER) {
            body = &body[..idx];
        }
    }
    body
}

/// Recover the replied-to message address from a mirror's reply line.
pub fn extract_reference(text: &str) -> Option<MessageLink> {
    let line = text.lines().next()?;
    let rest = line.strip_prefix(REPLY_PREFIX)?;
    let (_, after_name) = rest.split_once("](<")?;
    let (url, _) = after_name.split_once(">)")?;
    MessageLink::parse(url)
}

/// The prefix of `content` that identity comparison looks at.
pub fn comparison_form(content: &str) -> &str {
    truncate_chars(content, COMPARISON_CAP)
}

/// One-line snippet of at most [`PREVIEW_LENGTH`] chars.
pub fn preview_snippet(content: &str) -> String {
    let flat: String = content
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    if char_len(&flat) <= PREVIEW_LENGTH {
        return flat;
    }
    let mut snippet = truncate_chars(&flat, PREVIEW_CUT).to_owned();
    snippet.push_str("...");
    snippet
}

/// Longest prefix of `s` holding at most `max` chars.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use wormhole_common::ids::{ChannelId, GuildId, MessageId, UserId};
    use wormhole_common::models::Author;

    fn message(content: &str) -> Message {
        Message {
            id: MessageId(500),
            channel_id: ChannelId(20),
            guild_id: Some(GuildId(1)),
            author: Author {
                id: UserId(7),
                display_name: "Alice".into(),
                avatar_url: None,
                bot: false,
            },
            webhook_id: None,
            content: content.into(),
            created_at: Utc::now(),
            reference: None,
            attachments: Vec::new(),
            embeds: Vec::new(),
        }
    }

    fn preview() -> ReplyPreview {
        ReplyPreview {
            author: "Bob".into(),
            jump_url: "https://discord.com/channels/1/30/400".into(),
            content: "what do you think?".into(),
        }
    }

    fn codec() -> ContentCodec {
        ContentCodec::new("https://discord.com")
    }

    #[test]
    fn plain_message_is_unchanged() {
        assert_eq!(codec().compose(&message("hello"), None), "hello");
        assert_eq!(extract_original_content("hello"), "hello");
    }

    #[test]
    fn reply_line_format() {
        let mirror = codec().compose(&message("sure"), Some(&preview()));
        assert_eq!(
            mirror,
            "**╭** 💬 [**Bob**](<https://discord.com/channels/1/30/400>) : what do you think?\nsure"
        );
        assert_eq!(extract_original_content(&mirror), "sure");
    }

    #[test]
    fn long_message_is_cut_with_see_more_link() {
        let body = "a".repeat(2500);
        let mirror = codec().compose(&message(&body), None);

        assert_eq!(mirror.chars().count(), MIRROR_LIMIT);
        assert!(mirror.ends_with(" [[...]](<https://discord.com/channels/1/20/500>)"));
        let extracted = extract_original_content(&mirror);
        assert!(body.starts_with(extracted));
        assert_eq!(comparison_form(extracted), comparison_form(&body));
    }

    #[test]
    fn round_trip_over_decoration_combinations() {
        let bodies = [
            "short".to_owned(),
            "ünïcödé ✨ ".repeat(300),
            "line\n".repeat(700),
            "x".repeat(MIRROR_LIMIT),
        ];
        for body in &bodies {
            for reply in [None, Some(preview())] {
                let mirror = codec().compose(&message(body), reply.as_ref());
                assert!(mirror.chars().count() <= MIRROR_LIMIT);
                assert_eq!(
                    comparison_form(extract_original_content(&mirror)),
                    comparison_form(body),
                );
            }
        }
    }

    #[test]
    fn limit_counts_the_reply_line() {
        let body = "b".repeat(1990);
        let mirror = codec().compose(&message(&body), Some(&preview()));
        assert_eq!(mirror.chars().count(), MIRROR_LIMIT);
        assert!(mirror.starts_with(REPLY_PREFIX));
        assert!(mirror.ends_with(">)"));
    }

    #[test]
    fn snippets_are_single_line_and_capped() {
        assert_eq!(preview_snippet("two\nlines"), "two lines");
        let long = "é".repeat(60);
        let snippet = preview_snippet(&long);
        assert_eq!(snippet.chars().count(), PREVIEW_LENGTH);
        assert!(snippet.ends_with("..."));
        assert_eq!(preview_snippet(&"c".repeat(50)), "c".repeat(50));
    }

    #[test]
    fn extracts_reply_reference() {
        let mirror = codec().compose(&message("sure"), Some(&preview()));
        let link = extract_reference(&mirror).unwrap();
        assert_eq!(link.guild_id, Some(GuildId(1)));
        assert_eq!(link.channel_id, ChannelId(30));
        assert_eq!(link.message_id, MessageId(400));
        assert!(extract_reference("no reply here").is_none());
    }

    #[test]
    fn reply_line_alone_extracts_to_empty() {
        let line = preview().line();
        assert_eq!(extract_original_content(line.trim_end()), "");
    }
}
