//! Closest-name suggestions for unknown tools

/// Minimum similarity for a suggestion
pub const SUGGESTION_THRESHOLD: f64 = 0.6;

/// Normalized similarity in `0.0..=1.0`
pub fn similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    let distance = levenshtein_distance(a, b);
    (1.0 - distance as f64 / max_len as f64).max(0.0)
}

/// Best candidate at or above `threshold`
pub fn closest_match<'a, I>(name: &str, candidates: I, threshold: f64) -> Option<(&'a str, f64)>
where
    I: IntoIterator<Item = &'a str>,
{
    let name = name.trim().to_lowercase();
    candidates
        .into_iter()
        .map(|candidate| (candidate, similarity(&name, candidate)))
        .filter(|(_, score)| *score >= threshold)
        .fold(None, |best: Option<(&'a str, f64)>, current| match best {
            Some(b) if b.1 >= current.1 => Some(b),
            _ => Some(current),
        })
}

fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for i in 1..=a.len() {
        current[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            current[j] = (previous[j] + 1)
                .min(current[j - 1] + 1)
                .min(previous[j - 1] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance() {
        assert_eq!(levenshtein_distance("chat", "chat"), 0);
        assert_eq!(levenshtein_distance("chat", "chta"), 2);
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
    }

    #[test]
    fn suggests_best_match() {
        let tools = ["chat", "codereview", "thinkdeep", "debug"];
        let (name, score) = closest_match("codereveiw", tools, SUGGESTION_THRESHOLD).unwrap();
        assert_eq!(name, "codereview");
        assert!(score >= 0.6);

        assert!(closest_match("zzzzzz", tools, SUGGESTION_THRESHOLD).is_none());
    }
}
