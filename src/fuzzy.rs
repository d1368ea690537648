//! Fuzzy string similarity for the matcher's fallback stage
//!
//! Scores are on a 0-100 scale. `partial_ratio` finds the best alignment of
//! the shorter string inside the longer one, so extra words around a command
//! phrase do not drag the score down.

/// Normalized indel similarity (0-100) between two strings
pub fn ratio(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    to_score(similarity(&a, &b))
}

/// Best `ratio` of the shorter string against any same-length window of the
/// longer one, including windows hanging off either end
pub fn partial_ratio(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };

    if short.is_empty() {
        return if long.is_empty() { 100 } else { 0 };
    }
    if short.len() == long.len() {
        return to_score(similarity(&short, &long));
    }

    let n = short.len();
    let mut best = 0.0f64;

    // Partial windows at the start and end of the longer string
    for k in 1..n {
        best = best.max(similarity(&short, &long[..k]));
        best = best.max(similarity(&short, &long[long.len() - k..]));
    }
    for window in long.windows(n) {
        best = best.max(similarity(&short, window));
        if best >= 1.0 {
            break;
        }
    }

    to_score(best)
}

fn similarity(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    (2 * lcs_len(a, b)) as f64 / total as f64
}

/// Length of the longest common subsequence
fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut dp = vec![vec![0usize; b.len() + 1]; a.len() + 1];

    for i in 1..=a.len() {
        for j in 1..=b.len() {
            dp[i][j] = if a[i - 1] == b[j - 1] {
                dp[i - 1][j - 1] + 1
            } else {
                dp[i - 1][j].max(dp[i][j - 1])
            };
        }
    }
    dp[a.len()][b.len()]
}

fn to_score(similarity: f64) -> u8 {
    (similarity * 100.0).round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio() {
        assert_eq!(ratio("next", "next"), 100);
        assert_eq!(ratio("abc", "xyz"), 0);
        // lcs "previus" = 7, 2*7/15
        assert_eq!(ratio("previous", "previus"), 93);
    }

    #[test]
    fn test_partial_ratio_contained() {
        assert_eq!(partial_ratio("next", "please go to the next one"), 100);
        assert_eq!(partial_ratio("please go to the next one", "next"), 100);
    }

    #[test]
    fn test_partial_ratio_tolerates_typos() {
        // best window "previus " shares "previus" with the anchor: 2*7/16
        assert_eq!(partial_ratio("previous", "go to the previus one"), 88);
        assert_eq!(partial_ratio("next slide", "go to the next slid please"), 90);
    }

    #[test]
    fn test_partial_ratio_unrelated() {
        assert!(partial_ratio("zoom", "what a lovely afternoon") < 80);
        assert!(partial_ratio("black", "open the door") < 80);
    }

    #[test]
    fn test_partial_ratio_empty() {
        assert_eq!(partial_ratio("", ""), 100);
        assert_eq!(partial_ratio("next", ""), 0);
        assert_eq!(partial_ratio("", "next"), 0);
    }

    #[test]
    fn test_partial_ratio_unicode() {
        assert_eq!(partial_ratio("nächste", "bitte nächste folie"), 100);
    }
}
