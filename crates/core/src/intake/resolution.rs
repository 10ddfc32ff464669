//! Resolution detection from release names.

use regex_lite::Regex;

/// Guess the vertical resolution from a release title.
///
/// Recognises `2160p`, `1080p`, `720p`, `480p` and the `4K`/`UHD` aliases.
/// When a title carries several markers the highest one wins.
pub fn parse_resolution(title: &str) -> Option<u32> {
    let lines = Regex::new(r"(?i)(?:^|[^a-z0-9])(2160|1080|720|480)p(?:[^a-z0-9]|$)").ok()?;
    let aliases = Regex::new(r"(?i)(?:^|[^a-z0-9])(4k|uhd)(?:[^a-z0-9]|$)").ok()?;

    let from_lines = lines
        .captures_iter(title)
        .filter_map(|caps| caps.get(1)?.as_str().parse::<u32>().ok())
        .max();
    let from_alias = aliases.is_match(title).then_some(2160);

    from_lines.max(from_alias)
}
