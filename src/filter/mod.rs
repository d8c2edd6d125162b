//! Filter evaluation.
//!
//! A filter is a conjunction of predicates over release attributes plus a
//! download action. The first enabled filter whose predicates all pass
//! wins; later filters are not evaluated. Every failing filter records a
//! reason string for operator visibility.

use regex::Regex;

use crate::db::{Filter, Release};

/// Outcome of evaluating a release against the filter list.
#[derive(Debug)]
pub struct MatchResult<'a> {
    /// First filter whose predicates all passed.
    pub matched: Option<&'a Filter>,
    /// One reason per filter evaluated before the match (or all, on miss).
    pub rejections: Vec<String>,
}

/// Evaluate a release against filters in order.
pub fn match_release<'a>(filters: &'a [Filter], release: &Release) -> MatchResult<'a> {
    let mut rejections = Vec::new();

    for filter in filters {
        if !filter.enabled {
            continue;
        }
        match check_filter(filter, release) {
            Ok(()) => {
                return MatchResult {
                    matched: Some(filter),
                    rejections,
                };
            }
            Err(reason) => rejections.push(format!("{}: {}", filter.name, reason)),
        }
    }

    MatchResult {
        matched: None,
        rejections,
    }
}

/// Check a single filter; the first failing predicate produces the reason.
fn check_filter(filter: &Filter, release: &Release) -> Result<(), String> {
    if !filter.indexers.is_empty()
        && !filter
            .indexers
            .iter()
            .any(|i| i.eq_ignore_ascii_case(&release.indexer))
    {
        return Err(format!("indexer {} not in filter list", release.indexer));
    }

    if let Some(patterns) = nonempty(&filter.match_releases)
        && !match_any(patterns, &release.name)
    {
        return Err("release name does not match".to_string());
    }
    if let Some(patterns) = nonempty(&filter.except_releases)
        && match_any(patterns, &release.name)
    {
        return Err("release name matches exception".to_string());
    }

    if let Some(patterns) = nonempty(&filter.match_categories)
        && !match_any(patterns, &release.category)
    {
        return Err(format!("category {:?} does not match", release.category));
    }
    if let Some(patterns) = nonempty(&filter.except_categories)
        && match_any(patterns, &release.category)
    {
        return Err(format!("category {:?} matches exception", release.category));
    }

    if let Some(wanted) = nonempty(&filter.match_tags) {
        let have: Vec<&str> = split_list(&release.tags).collect();
        for tag in split_list(wanted) {
            if !have.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
                return Err(format!("missing tag {:?}", tag));
            }
        }
    }
    if let Some(banned) = nonempty(&filter.except_tags) {
        let have: Vec<&str> = split_list(&release.tags).collect();
        for tag in split_list(banned) {
            if have.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
                return Err(format!("has excluded tag {:?}", tag));
            }
        }
    }

    if filter.min_year.is_some() || filter.max_year.is_some() {
        let year: i64 = release
            .year
            .parse()
            .map_err(|_| "announce carries no usable year".to_string())?;
        if let Some(min) = filter.min_year
            && year < min
        {
            return Err(format!("year {} below minimum {}", year, min));
        }
        if let Some(max) = filter.max_year
            && year > max
        {
            return Err(format!("year {} above maximum {}", year, max));
        }
    }

    // Size bounds only apply when the announce carries a size.
    if let Some(size) = release.size {
        if let Some(min) = filter.min_size
            && size < min
        {
            return Err(format!("size {} below minimum {}", size, min));
        }
        if let Some(max) = filter.max_size
            && size > max
        {
            return Err(format!("size {} above maximum {}", size, max));
        }
    }

    for (label, list) in [
        ("resolution", &filter.resolutions),
        ("source", &filter.sources),
        ("codec", &filter.codecs),
    ] {
        if let Some(values) = nonempty(list)
            && !contains_any(values, &release.name)
        {
            return Err(format!("{} does not match", label));
        }
    }

    if filter.freeleech && !release.freeleech {
        return Err("not freeleech".to_string());
    }

    Ok(())
}

fn nonempty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}

fn split_list(csv: &str) -> impl Iterator<Item = &str> {
    csv.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// Whether any comma-separated wildcard pattern matches the whole value.
fn match_any(patterns: &str, value: &str) -> bool {
    split_list(patterns).any(|pattern| wildcard_match(pattern, value))
}

/// Whether any comma-separated token appears inside the value.
fn contains_any(tokens: &str, value: &str) -> bool {
    let haystack = value.to_ascii_lowercase();
    split_list(tokens).any(|token| haystack.contains(&token.to_ascii_lowercase()))
}

/// Case-insensitive glob match: `*` spans anything, `?` one character.
fn wildcard_match(pattern: &str, value: &str) -> bool {
    let mut regex = String::with_capacity(pattern.len() + 8);
    regex.push_str("(?i)^");
    for ch in pattern.chars() {
        match ch {
            '*' => regex.push_str(".*"),
            '?' => regex.push('.'),
            other => regex.push_str(&regex::escape(&other.to_string())),
        }
    }
    regex.push('$');

    match Regex::new(&regex) {
        Ok(re) => re.is_match(value),
        Err(_) => false,
    }
}
