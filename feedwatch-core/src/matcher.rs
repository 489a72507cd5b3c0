//! Case-insensitive substring keyword matching.

/// Keywords contained in `text`, in configuration order and without
/// duplicates. Blank keywords never match.
pub fn matched_keywords(text: &str, keywords: &[String]) -> Vec<String> {
    let haystack = text.to_lowercase();
    let mut matched: Vec<String> = Vec::new();
    for keyword in keywords {
        if keyword.trim().is_empty() || matched.contains(keyword) {
            continue;
        }
        if haystack.contains(&keyword.to_lowercase()) {
            matched.push(keyword.clone());
        }
    }
    matched
}

pub fn matches(text: &str, keywords: &[String]) -> bool {
    !matched_keywords(text, keywords).is_empty()
}
