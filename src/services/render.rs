//! HTML email rendering
//!
//! Pure string templating: edition data in, a full inline-styled HTML
//! document out. Rendering is recipient-independent; per-recipient
//! tracking URLs are substituted afterwards by [`personalize`]. Every
//! rendered document carries exactly one open-tracking pixel and exactly
//! one unsubscribe link.

use crate::services::generator::{WorthWatching, WorthWatchingSection};
use chrono::NaiveDate;
use uuid::Uuid;

/// Placeholder substituted with the per-recipient send id
pub const SEND_ID_TOKEN: &str = "__SEND_ID__";
/// Placeholder substituted with the per-recipient unsubscribe token
pub const UNSUBSCRIBE_TOKEN: &str = "__UNSUBSCRIBE__";

#[derive(Debug, Clone)]
pub struct RenderStory {
    pub title: String,
    pub url: String,
    pub category: String,
    pub summary: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RenderSponsor {
    pub name: String,
    pub tagline: Option<String>,
    pub url: String,
}

/// Everything the template needs, already resolved from the database.
#[derive(Debug, Clone)]
pub struct RenderInput {
    pub newsletter_title: String,
    pub edition_date: NaiveDate,
    pub editor_note: Option<String>,
    pub hero: RenderStory,
    pub hero_image_url: Option<String>,
    pub stories: Vec<RenderStory>,
    pub worth_watching: Option<WorthWatching>,
    pub mystery_link: Option<(String, String)>, // (teaser, url)
    pub fun_fact: Option<String>,
    pub sponsor: Option<RenderSponsor>,
}

/// Render the full email document with recipient placeholders.
pub fn render_edition(input: &RenderInput, base_url: &str) -> String {
    let mut html = String::with_capacity(16 * 1024);

    html.push_str("<!DOCTYPE html><html><head><meta charset=\"utf-8\">");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">");
    html.push_str("</head><body style=\"margin:0;padding:0;background-color:#f4f4f5;");
    html.push_str("font-family:Georgia,'Times New Roman',serif;color:#18181b;\">");
    html.push_str(
        "<table role=\"presentation\" width=\"100%\" cellpadding=\"0\" cellspacing=\"0\">\
         <tr><td align=\"center\" style=\"padding:24px 12px;\">\
         <table role=\"presentation\" width=\"600\" cellpadding=\"0\" cellspacing=\"0\" \
         style=\"background-color:#ffffff;border-radius:8px;overflow:hidden;\">",
    );

    // Masthead
    html.push_str(&format!(
        "<tr><td style=\"background-color:#18181b;padding:28px 32px;text-align:center;\">\
         <h1 style=\"margin:0;color:#fafafa;font-size:26px;letter-spacing:1px;\">{}</h1>\
         <p style=\"margin:6px 0 0;color:#a1a1aa;font-size:13px;\">{}</p>\
         </td></tr>",
        escape_html(&input.newsletter_title),
        input.edition_date.format("%A, %B %-d, %Y"),
    ));

    // Editor's note
    if let Some(note) = &input.editor_note {
        html.push_str(&format!(
            "<tr><td style=\"padding:24px 32px 8px;\">\
             <p style=\"margin:0;font-size:15px;line-height:1.6;font-style:italic;color:#3f3f46;\">{}</p>\
             </td></tr>",
            escape_html(note),
        ));
    }

    // Hero story
    html.push_str("<tr><td style=\"padding:24px 32px 0;\">");
    if let Some(image_url) = &input.hero_image_url {
        html.push_str(&format!(
            "<img src=\"{}\" width=\"536\" alt=\"\" style=\"display:block;width:100%;border-radius:6px;margin-bottom:16px;\">",
            escape_attr(image_url),
        ));
    }
    html.push_str(&format!(
        "<a href=\"{}\" style=\"color:#18181b;text-decoration:none;\">\
         <h2 style=\"margin:0 0 8px;font-size:22px;line-height:1.3;\">{}</h2></a>",
        track_click(base_url, &input.hero.url),
        escape_html(&input.hero.title),
    ));
    if let Some(summary) = &input.hero.summary {
        html.push_str(&format!(
            "<p style=\"margin:0;font-size:15px;line-height:1.6;color:#3f3f46;\">{}</p>",
            escape_html(summary),
        ));
    }
    html.push_str("</td></tr>");

    // Top stories
    if !input.stories.is_empty() {
        html.push_str(
            "<tr><td style=\"padding:28px 32px 0;\">\
             <h3 style=\"margin:0 0 4px;font-size:13px;text-transform:uppercase;\
             letter-spacing:2px;color:#71717a;\">Top Stories</h3></td></tr>",
        );
        for story in &input.stories {
            html.push_str(&format!(
                "<tr><td style=\"padding:14px 32px 0;\">\
                 <p style=\"margin:0 0 2px;font-size:11px;text-transform:uppercase;\
                 letter-spacing:1px;color:#a1a1aa;\">{}</p>\
                 <a href=\"{}\" style=\"color:#18181b;text-decoration:none;\">\
                 <h4 style=\"margin:0 0 4px;font-size:17px;line-height:1.4;\">{}</h4></a>",
                escape_html(&story.category),
                track_click(base_url, &story.url),
                escape_html(&story.title),
            ));
            if let Some(summary) = &story.summary {
                html.push_str(&format!(
                    "<p style=\"margin:0;font-size:14px;line-height:1.5;color:#52525b;\">{}</p>",
                    escape_html(summary),
                ));
            }
            html.push_str("</td></tr>");
        }
    }

    // Worth watching
    if let Some(ww) = &input.worth_watching {
        html.push_str(
            "<tr><td style=\"padding:28px 32px 0;\">\
             <h3 style=\"margin:0 0 4px;font-size:13px;text-transform:uppercase;\
             letter-spacing:2px;color:#71717a;\">Worth Watching</h3></td></tr>",
        );
        for section in [&ww.trends, &ww.events, &ww.spotlight, &ww.policy] {
            html.push_str(&render_worth_watching(section));
        }
    }

    // Mystery link
    if let Some((teaser, url)) = &input.mystery_link {
        html.push_str(&format!(
            "<tr><td style=\"padding:28px 32px 0;\">\
             <table role=\"presentation\" width=\"100%\" cellpadding=\"0\" cellspacing=\"0\">\
             <tr><td style=\"background-color:#fef9c3;border-radius:6px;padding:16px 20px;\">\
             <p style=\"margin:0;font-size:14px;color:#713f12;\">&#128269; <strong>Mystery link:</strong> \
             {} <a href=\"{}\" style=\"color:#854d0e;\">Take a look</a></p>\
             </td></tr></table></td></tr>",
            escape_html(teaser),
            track_click(base_url, url),
        ));
    }

    // Fun fact
    if let Some(fact) = &input.fun_fact {
        html.push_str(&format!(
            "<tr><td style=\"padding:20px 32px 0;\">\
             <p style=\"margin:0;font-size:14px;line-height:1.6;color:#3f3f46;\">\
             <strong>Fun fact:</strong> {}</p></td></tr>",
            escape_html(fact),
        ));
    }

    // Sponsor
    if let Some(sponsor) = &input.sponsor {
        let tagline = sponsor
            .tagline
            .as_deref()
            .map(|t| format!(" &mdash; {}", escape_html(t)))
            .unwrap_or_default();
        html.push_str(&format!(
            "<tr><td style=\"padding:28px 32px 0;\">\
             <p style=\"margin:0;font-size:12px;color:#a1a1aa;text-transform:uppercase;\
             letter-spacing:1px;\">Presented by</p>\
             <p style=\"margin:4px 0 0;font-size:14px;color:#3f3f46;\">\
             <a href=\"{}\" style=\"color:#18181b;\">{}</a>{}</p></td></tr>",
            track_click(base_url, &sponsor.url),
            escape_html(&sponsor.name),
            tagline,
        ));
    }

    // Footer: unsubscribe link and open pixel
    html.push_str(&format!(
        "<tr><td style=\"padding:32px;border-top:1px solid #e4e4e7;margin-top:28px;\">\
         <p style=\"margin:0;font-size:12px;color:#a1a1aa;text-align:center;\">\
         You are receiving this because you subscribed to {}.<br>\
         <a href=\"{}/subscribers/unsubscribe/{}\" style=\"color:#71717a;\">Unsubscribe</a>\
         </p></td></tr>",
        escape_html(&input.newsletter_title),
        base_url,
        UNSUBSCRIBE_TOKEN,
    ));
    html.push_str(&format!(
        "</table>\
         <img src=\"{}/track/open/{}\" width=\"1\" height=\"1\" alt=\"\" style=\"display:block;\">\
         </td></tr></table></body></html>",
        base_url, SEND_ID_TOKEN,
    ));

    html
}

fn render_worth_watching(section: &WorthWatchingSection) -> String {
    format!(
        "<tr><td style=\"padding:14px 32px 0;\">\
         <h4 style=\"margin:0 0 4px;font-size:16px;\">{}</h4>\
         <p style=\"margin:0;font-size:14px;line-height:1.5;color:#52525b;\">{}</p>\
         </td></tr>",
        escape_html(&section.title),
        escape_html(&section.content),
    )
}

/// Substitute per-recipient tokens into a rendered document.
pub fn personalize(html: &str, send_id: Uuid, unsubscribe_token: &str) -> String {
    html.replace(SEND_ID_TOKEN, &send_id.to_string())
        .replace(UNSUBSCRIBE_TOKEN, unsubscribe_token)
}

/// Wrap a target URL in the click-tracking redirect.
fn track_click(base_url: &str, target: &str) -> String {
    format!(
        "{}/track/click/{}?url={}",
        base_url,
        SEND_ID_TOKEN,
        urlencoding::encode(target)
    )
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(text: &str) -> String {
    escape_html(text).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_input() -> RenderInput {
        RenderInput {
            newsletter_title: "The Daily Edition".to_string(),
            edition_date: NaiveDate::from_ymd_opt(2026, 8, 25).unwrap(),
            editor_note: Some("A quiet Monday with loud headlines.".to_string()),
            hero: RenderStory {
                title: "City council votes on transit plan".to_string(),
                url: "https://news.example.com/articles/transit-plan".to_string(),
                category: "Local".to_string(),
                summary: Some("The decade-long plan passed 7-2.".to_string()),
            },
            hero_image_url: None,
            stories: vec![
                RenderStory {
                    title: "Rates & markets".to_string(),
                    url: "https://news.example.com/articles/rates".to_string(),
                    category: "Business".to_string(),
                    summary: Some("Markets shrugged.".to_string()),
                },
                RenderStory {
                    title: "Storm watch".to_string(),
                    url: "https://news.example.com/articles/storm".to_string(),
                    category: "Weather".to_string(),
                    summary: None,
                },
            ],
            worth_watching: Some(WorthWatching {
                trends: WorthWatchingSection {
                    title: "Trends".to_string(),
                    content: "Transit ridership is up.".to_string(),
                },
                events: WorthWatchingSection {
                    title: "Events".to_string(),
                    content: "Budget hearing Thursday.".to_string(),
                },
                spotlight: WorthWatchingSection {
                    title: "Spotlight".to_string(),
                    content: "Meet the new metro chief.".to_string(),
                },
                policy: WorthWatchingSection {
                    title: "Policy".to_string(),
                    content: "Zoning reform moves ahead.".to_string(),
                },
            }),
            mystery_link: Some((
                "A map you will not stop scrolling.".to_string(),
                "https://example.com/mystery".to_string(),
            )),
            fun_fact: Some("Honey never spoils.".to_string()),
            sponsor: Some(RenderSponsor {
                name: "Acme Coffee".to_string(),
                tagline: Some("Fuel for deadlines".to_string()),
                url: "https://acme.example.com".to_string(),
            }),
        }
    }

    const BASE: &str = "https://mail.example.com";

    #[test]
    fn test_exactly_one_open_pixel() {
        let html = render_edition(&sample_input(), BASE);
        assert_eq!(html.matches("/track/open/").count(), 1);
    }

    #[test]
    fn test_exactly_one_unsubscribe_link() {
        let html = render_edition(&sample_input(), BASE);
        assert_eq!(html.matches("/subscribers/unsubscribe/").count(), 1);
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let input = sample_input();
        assert_eq!(render_edition(&input, BASE), render_edition(&input, BASE));
    }

    #[test]
    fn test_story_links_are_wrapped() {
        let html = render_edition(&sample_input(), BASE);
        // hero + 2 stories + mystery + sponsor
        assert_eq!(html.matches("/track/click/").count(), 5);
        assert!(html.contains(&urlencoding::encode("https://news.example.com/articles/rates").into_owned()));
    }

    #[test]
    fn test_personalize_replaces_all_tokens() {
        let html = render_edition(&sample_input(), BASE);
        let send_id = Uuid::new_v4();
        let personalized = personalize(&html, send_id, "tok123");
        assert!(!personalized.contains(SEND_ID_TOKEN));
        assert!(!personalized.contains(UNSUBSCRIBE_TOKEN));
        assert!(personalized.contains(&send_id.to_string()));
        assert!(personalized.contains("/subscribers/unsubscribe/tok123"));
    }

    #[test]
    fn test_html_is_escaped() {
        let mut input = sample_input();
        input.hero.title = "Markets <rally> & rebound".to_string();
        let html = render_edition(&input, BASE);
        assert!(html.contains("Markets &lt;rally&gt; &amp; rebound"));
        assert!(!html.contains("<rally>"));
    }

    #[test]
    fn test_optional_blocks_omitted() {
        let mut input = sample_input();
        input.mystery_link = None;
        input.fun_fact = None;
        input.sponsor = None;
        input.worth_watching = None;
        let html = render_edition(&input, BASE);
        assert!(!html.contains("Mystery link"));
        assert!(!html.contains("Fun fact"));
        assert!(!html.contains("Presented by"));
        assert!(!html.contains("Worth Watching"));
        // tracking invariants hold regardless
        assert_eq!(html.matches("/track/open/").count(), 1);
        assert_eq!(html.matches("/subscribers/unsubscribe/").count(), 1);
    }
}
