//! Allow-list filter for the small HTML snippets upstream attaches as news.

const ALLOWED_TAGS: &[&str] = &["a", "b", "i", "em", "strong", "br", "p", "span"];
const DROP_CONTENT_TAGS: &[&str] = &["script", "style"];

/// Keeps allow-listed tags (without attributes, except an `http(s)` `href`
/// on links) and text. Everything else is removed; script and style bodies
/// are removed with their tags.
#[must_use]
pub fn sanitize_news_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        let after = &rest[open..];
        let Some(close) = after.find('>') else {
            out.push_str(&escape_text(after));
            return out;
        };

        let tag = parse_tag(&after[1..close]);
        rest = &after[close + 1..];

        let Some(tag) = tag else {
            continue;
        };
        if !tag.closing && DROP_CONTENT_TAGS.contains(&tag.name.as_str()) {
            rest = skip_past_closing(rest, &tag.name);
            continue;
        }
        if !ALLOWED_TAGS.contains(&tag.name.as_str()) {
            continue;
        }

        match (tag.closing, tag.name.as_str(), tag.href) {
            (true, "br", _) => {}
            (true, name, _) => {
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
            (false, "a", Some(href)) => {
                out.push_str("<a href=\"");
                out.push_str(&escape_attr(&href));
                out.push_str("\">");
            }
            (false, name, _) => {
                out.push('<');
                out.push_str(name);
                out.push('>');
            }
        }
    }

    out.push_str(rest);
    out
}

struct Tag {
    name: String,
    closing: bool,
    href: Option<String>,
}

fn parse_tag(inner: &str) -> Option<Tag> {
    let inner = inner.trim();
    let (closing, inner) = match inner.strip_prefix('/') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, inner),
    };
    let name_len = inner
        .find(|ch: char| !ch.is_ascii_alphanumeric())
        .unwrap_or(inner.len());
    if name_len == 0 {
        return None;
    }
    let name = inner[..name_len].to_ascii_lowercase();
    let href = if name == "a" && !closing {
        attr_value(&inner[name_len..], "href").filter(|href| is_web_url(href))
    } else {
        None
    };
    Some(Tag {
        name,
        closing,
        href,
    })
}

fn attr_value(attrs: &str, wanted: &str) -> Option<String> {
    let mut rest = attrs.trim_start_matches('/');
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return None;
        }
        let name_end = rest
            .find(|ch: char| ch == '=' || ch.is_whitespace())
            .unwrap_or(rest.len());
        let name = rest[..name_end].to_ascii_lowercase();
        rest = rest[name_end..].trim_start();

        let Some(after_eq) = rest.strip_prefix('=') else {
            if name.is_empty() {
                return None;
            }
            continue;
        };
        let after_eq = after_eq.trim_start();
        let (value, remaining) = match after_eq.chars().next() {
            Some(quote @ ('"' | '\'')) => {
                let body = &after_eq[1..];
                let end = body.find(quote).unwrap_or(body.len());
                (&body[..end], body.get(end + 1..).unwrap_or(""))
            }
            _ => {
                let end = after_eq.find(char::is_whitespace).unwrap_or(after_eq.len());
                (&after_eq[..end], &after_eq[end..])
            }
        };
        if name == wanted {
            return Some(value.trim().to_owned());
        }
        rest = remaining;
    }
}

fn is_web_url(href: &str) -> bool {
    url::Url::parse(href).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}

fn skip_past_closing<'a>(rest: &'a str, name: &str) -> &'a str {
    let needle = format!("</{name}");
    let lower = rest.to_ascii_lowercase();
    match lower.find(&needle) {
        Some(start) => match rest[start..].find('>') {
            Some(end) => &rest[start + end + 1..],
            None => "",
        },
        None => "",
    }
}

fn escape_text(text: &str) -> String {
    text.replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}
