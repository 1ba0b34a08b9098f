//! Keyword normalization for the associative memory index

/// Lower-case, trim punctuation, and strip common inflections so that
/// "Parties", "party's" and "party" share an index key.
pub fn normalize_keyword(raw: &str) -> Option<String> {
    let word: String = raw
        .trim()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    if word.is_empty() {
        return None;
    }

    let word = word.strip_suffix("'s").unwrap_or(&word).to_string();
    Some(stem(&word))
}

fn stem(word: &str) -> String {
    let len = word.chars().count();
    if len <= 3 {
        return word.to_string();
    }
    if let Some(base) = word.strip_suffix("ies") {
        return format!("{}y", base);
    }
    if word.ends_with("sses") || word.ends_with("xes") || word.ends_with("ches") || word.ends_with("shes") {
        return word[..word.len() - 2].to_string();
    }
    if word.ends_with('s') && !word.ends_with("ss") && !word.ends_with("us") && !word.ends_with("is") {
        return word[..word.len() - 1].to_string();
    }
    word.to_string()
}

/// Normalize and deduplicate a keyword list, dropping empties
pub fn normalize_all<I, S>(keywords: I) -> std::collections::BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    keywords
        .into_iter()
        .filter_map(|k| normalize_keyword(k.as_ref()))
        .collect()
}
