/// True when the title (plus flair, if any) marks an official trailer for the show.
///
/// `keywords` must already be lowercase. An empty keyword list matches any title.
pub fn is_official_trailer(title: &str, flair: Option<&str>, keywords: &[String]) -> bool {
    let title_lower = title.to_lowercase();
    let tagged = match flair {
        Some(f) => format!("{} {}", title_lower, f.to_lowercase()),
        None => title_lower.clone(),
    };

    let about_show = keywords.is_empty() || keywords.iter().any(|k| title_lower.contains(k.as_str()));
    about_show && tagged.contains("trailer") && tagged.contains("official")
}
