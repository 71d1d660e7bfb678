//! "Did you mean" suggestions.

/// Edit distance between two strings, counted in chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Closest candidate within distance 2, ties broken by candidate order.
/// Very short inputs must be strictly closer than their own length.
pub fn suggest<'a, I>(input: &str, candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let len = input.chars().count();
    candidates
        .into_iter()
        .filter(|c| *c != input)
        .map(|c| (c, levenshtein(input, c)))
        .filter(|&(_, d)| d <= 2 && d < len.max(1))
        .min_by_key(|&(_, d)| d)
        .map(|(c, _)| c)
}
