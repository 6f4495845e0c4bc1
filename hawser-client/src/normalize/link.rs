//! Deep-link classification for join/invite rewrites.
//!
//! Recognizes the messenger deep-link forms and splits them into
//! invite-type (private invite hash) and channel-type (public username)
//! links. Decoded content is never itself link-shaped, which is what makes
//! the invite rewrite rule idempotent.
//!
//! Hosts, schemes, and keywords match case-insensitively; the decoded
//! content keeps its original case (invite hashes are case-sensitive).

/// Classification of a join/invite deep link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkKind {
    /// Private invite link; payload is the invite hash.
    Invite(String),
    /// Public channel link; payload is the username.
    Public(String),
}

const HOSTS: [&str; 3] = ["t.me", "telegram.me", "telegram.dog"];

/// Classify a string as a join/invite deep link.
///
/// Recognized forms, scheme optional:
///
/// - `t.me/joinchat/<hash>` and `t.me/+<hash>` (invite)
/// - `t.me/<username>` and the subdomain form `<username>.t.me` (channel)
/// - `tg://join?invite=<hash>` (invite) and `tg://resolve?domain=<username>`
///   (channel)
///
/// plus the same paths on `telegram.me` / `telegram.dog`. Anything else,
/// including already-decoded hashes and bare usernames, is `None`.
pub fn classify_link(raw: &str) -> Option<LinkKind> {
    let link = raw.trim();

    if let Some(rest) = strip_prefix_ci(link, "tg://") {
        return classify_tg_uri(rest);
    }

    let bare = strip_prefix_ci(link, "https://")
        .or_else(|| strip_prefix_ci(link, "http://"))
        .unwrap_or(link);
    let bare = strip_prefix_ci(bare, "www.").unwrap_or(bare);

    let (host, path) = match bare.split_once('/') {
        Some((host, path)) => (host, Some(path)),
        None => (bare, None),
    };

    // Subdomain form: `<username>.t.me`.
    for known in HOSTS {
        if let Some(prefix) = strip_suffix_ci(host, known) {
            if let Some(user) = prefix.strip_suffix('.') {
                let user = handle(user);
                if !user.is_empty() && !user.eq_ignore_ascii_case("www") {
                    return Some(LinkKind::Public(user));
                }
            }
        }
    }

    if !HOSTS.iter().any(|known| host.eq_ignore_ascii_case(known)) {
        return None;
    }
    let path = path?;

    if let Some(hash) = strip_prefix_ci(path, "joinchat/") {
        let hash = handle(hash);
        return (!hash.is_empty()).then_some(LinkKind::Invite(hash));
    }
    if let Some(hash) = path.strip_prefix('+') {
        let hash = handle(hash);
        return (!hash.is_empty()).then_some(LinkKind::Invite(hash));
    }

    let user = handle(path);
    (!user.is_empty()).then_some(LinkKind::Public(user))
}

fn classify_tg_uri(rest: &str) -> Option<LinkKind> {
    if let Some(query) = strip_prefix_ci(rest, "join?") {
        return query_param(query, "invite").map(LinkKind::Invite);
    }
    if let Some(query) = strip_prefix_ci(rest, "resolve?") {
        return query_param(query, "domain").map(LinkKind::Public);
    }
    None
}

fn query_param(query: &str, name: &str) -> Option<String> {
    for pair in query.split('&') {
        if let Some(value) = strip_prefix_ci(pair, name) {
            if let Some(value) = value.strip_prefix('=') {
                let value = handle(value);
                if !value.is_empty() {
                    return Some(value);
                }
            }
        }
    }
    None
}

/// Longest leading run of handle characters (`[A-Za-z0-9_-]`).
fn handle(s: &str) -> String {
    s.chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

/// Case-insensitive `strip_prefix` for ASCII prefixes.
fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() < prefix.len() || !s.is_char_boundary(prefix.len()) {
        return None;
    }
    if s[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

/// Case-insensitive `strip_suffix` for ASCII suffixes.
fn strip_suffix_ci<'a>(s: &'a str, suffix: &str) -> Option<&'a str> {
    if s.len() < suffix.len() {
        return None;
    }
    let split = s.len() - suffix.len();
    if !s.is_char_boundary(split) {
        return None;
    }
    if s[split..].eq_ignore_ascii_case(suffix) {
        Some(&s[..split])
    } else {
        None
    }
}
