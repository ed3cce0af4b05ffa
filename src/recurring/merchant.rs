//! Merchant-pattern extraction: longest common substring
//! across a cluster's descriptions, falling back to the first whitespace
//! token when the result is too short to be meaningful.

const MAX_LEN: usize = 50;

/// Longest common substring of `a` and `b` (dynamic-programming, O(nm)),
/// case-sensitive — callers normalize case before calling if desired.
fn longest_common_substring(a: &str, b: &str) -> String {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    if a_chars.is_empty() || b_chars.is_empty() {
        return String::new();
    }

    let mut table = vec![vec![0usize; b_chars.len() + 1]; a_chars.len() + 1];
    let mut best_len = 0;
    let mut best_end = 0;

    for i in 1..=a_chars.len() {
        for j in 1..=b_chars.len() {
            if a_chars[i - 1] == b_chars[j - 1] {
                table[i][j] = table[i - 1][j - 1] + 1;
                if table[i][j] > best_len {
                    best_len = table[i][j];
                    best_end = i;
                }
            }
        }
    }

    a_chars[best_end - best_len..best_end].iter().collect()
}

/// Merchant pattern for a cluster of descriptions: the longest common
/// substring across all of them (folded pairwise), or the first whitespace
/// token of the first description if that substring is under 3 characters.
/// Truncated to 50 characters.
pub fn merchant_pattern(descriptions: &[String]) -> String {
    let pattern = descriptions
        .iter()
        .skip(1)
        .fold(descriptions.first().cloned().unwrap_or_default(), |acc, next| longest_common_substring(&acc, next));

    let trimmed = pattern.trim();
    let result = if trimmed.chars().count() < 3 {
        descriptions
            .first()
            .and_then(|first| first.split_whitespace().next())
            .unwrap_or("")
            .to_string()
    } else {
        trimmed.to_string()
    };

    result.chars().take(MAX_LEN).collect()
}
