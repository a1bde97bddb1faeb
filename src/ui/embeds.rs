use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::time::Duration;

use crate::audio::{request::format_duration, NowPlaying, Request};

/// Colour palette shared by every embed
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

const STANDARD_FOOTER: &str = "🎵 Open Jukebox";
const ITEMS_PER_PAGE: usize = 10;

/// Embed for `/current`: the active request plus its skip votes.
pub fn create_now_playing_embed(status: &NowPlaying) -> CreateEmbed {
    let request = &status.request;
    let metadata = request.metadata();

    let mut embed = CreateEmbed::default()
        .title(if status.paused {
            "⏸️ Paused"
        } else {
            "🎵 Now Playing"
        })
        .description(format!("**{}**", request.title()))
        .color(if status.paused {
            colors::WARNING_ORANGE
        } else {
            colors::SUCCESS_GREEN
        })
        .field(
            "🎤 Uploader",
            metadata
                .and_then(|m| m.uploader.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            true,
        );

    embed = match metadata.and_then(|m| m.duration) {
        Some(duration) => embed.field("⏱️ Duration", format_duration(duration), true),
        None => embed.field("⏱️ Duration", "🔴 Live", true),
    };

    let mut votes = format!("**{}/{}** people have asked me to skip this", status.votes, status.threshold);
    if status.owner_immune {
        votes.push_str(", but I don't really care");
    }

    embed
        .field("👤 Requested by", format!("<@{}>", request.requester), true)
        .field("⏭️ Skip votes", votes, false)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Embed for `/queue`: the pending requests in play order, paged.
pub fn create_queue_embed(
    current: Option<&NowPlaying>,
    pending: &[Request],
    page: usize,
) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("📋 Queue")
        .color(colors::INFO_BLUE);

    if let Some(current) = current {
        embed = embed.field("▶️ Playing", format!("**{}**", current.request.title()), false);
    }

    if pending.is_empty() {
        return embed
            .description("😴 **Nothing queued**\n\n💡 Use `/play <request>` to add something")
            .color(colors::NEUTRAL_GRAY)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
            .timestamp(Timestamp::now());
    }

    let page = Page::new(pending.len(), page, ITEMS_PER_PAGE);
    embed = embed.field(
        "Up next",
        queue_lines(&pending[page.start..page.end], page.start),
        false,
    );

    let total: Duration = pending
        .iter()
        .filter_map(|r| r.metadata().and_then(|m| m.duration))
        .sum();
    let mut info = format!("**Total:** {} requests", pending.len());
    if total > Duration::ZERO {
        info.push_str(&format!(" • **Duration:** {}", format_duration(total)));
    }
    embed = embed.field("Info", info, false);

    let footer = if page.total_pages > 1 {
        format!("Page {} of {} • Open Jukebox", page.number, page.total_pages)
    } else {
        STANDARD_FOOTER.to_string()
    };

    embed
        .footer(CreateEmbedFooter::new(footer))
        .timestamp(Timestamp::now())
}

/// Discord rejects embed fields longer than this.
const FIELD_LIMIT: usize = 1024;
const TITLE_LIMIT: usize = 60;

fn queue_lines(requests: &[Request], offset: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut used = 0;

    for (i, request) in requests.iter().enumerate() {
        let duration = request
            .metadata()
            .and_then(|m| m.duration)
            .map(|d| format!(" `[{}]`", format_duration(d)))
            .unwrap_or_default();
        let line = format!(
            "**{}**. {}{} • <@{}>",
            offset + i + 1,
            truncate(request.title(), TITLE_LIMIT),
            duration,
            request.requester
        );

        // Leave room for the overflow note while more lines follow.
        let following = requests.len() - i - 1;
        let reserve = if following > 0 {
            overflow_note(following).chars().count() + 1
        } else {
            0
        };
        let cost = line.chars().count() + usize::from(!lines.is_empty());
        if used + cost + reserve > FIELD_LIMIT {
            lines.push(overflow_note(requests.len() - i));
            break;
        }

        used += cost;
        lines.push(line);
    }

    lines.join("\n")
}

fn overflow_note(count: usize) -> String {
    format!("…and {} more", count)
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut short: String = text.chars().take(max).collect();
    short.push('…');
    short
}

/// A window over the pending requests. Out-of-range pages clamp to the last one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Page {
    number: usize,
    total_pages: usize,
    start: usize,
    end: usize,
}

impl Page {
    fn new(total_items: usize, page: usize, per_page: usize) -> Self {
        let total_pages = total_items.div_ceil(per_page).max(1);
        let number = page.clamp(1, total_pages);
        let start = (number - 1) * per_page;
        let end = (start + per_page).min(total_items);
        Self {
            number,
            total_pages,
            start,
            end,
        }
    }
}
