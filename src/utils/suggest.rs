fn normalize_token(value: &str) -> Vec<char> {
    value
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a == b {
        return 0;
    }
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

fn contains(haystack: &[char], needle: &[char]) -> bool {
    needle.len() <= haystack.len() && haystack.windows(needle.len()).any(|w| w == needle)
}

fn score_candidate(input: &[char], candidate: &str) -> Option<usize> {
    let b = normalize_token(candidate);
    if input.is_empty() || b.is_empty() {
        return None;
    }
    if input == b.as_slice() {
        return Some(0);
    }
    if contains(input, &b) || contains(&b, input) {
        return Some(1);
    }
    Some(levenshtein(input, &b))
}

fn max_allowed_distance(len: usize) -> usize {
    match len {
        0 => 0,
        1..=4 => 1,
        5..=8 => 2,
        _ => ((len as f32) * 0.35).floor().max(3.0) as usize,
    }
}

/// Close matches for `input` among `candidates`, best first.
pub fn suggest<'a, I>(input: &str, candidates: I, limit: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let normalized = normalize_token(input);
    if normalized.is_empty() {
        return Vec::new();
    }
    let allowed = max_allowed_distance(normalized.len());

    let mut scored: Vec<(&str, usize)> = candidates
        .into_iter()
        .filter_map(|candidate| {
            score_candidate(&normalized, candidate)
                .filter(|score| *score <= allowed)
                .map(|score| (candidate, score))
        })
        .collect();

    scored.sort_by(|a, b| {
        a.1.cmp(&b.1)
            .then_with(|| a.0.len().cmp(&b.0.len()))
            .then_with(|| a.0.cmp(b.0))
    });
    scored.dedup_by(|a, b| a.0 == b.0);

    scored
        .into_iter()
        .take(limit.max(1))
        .map(|(candidate, _)| candidate.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggests_close_operation_names() {
        let names = ["get_case", "get_cases", "get_run", "add_result"];
        let out = suggest("get_cse", names, 3);
        assert_eq!(out.first().map(String::as_str), Some("get_case"));
        assert!(!out.contains(&"add_result".to_string()));
    }

    #[test]
    fn empty_input_suggests_nothing() {
        assert!(suggest("  ", ["get_case"], 3).is_empty());
    }

    #[test]
    fn unrelated_input_suggests_nothing() {
        assert!(suggest("nonexistent_tool", ["get_case", "add_run"], 3).is_empty());
    }
}
