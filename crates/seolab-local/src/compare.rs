/// First longest common run of `a` and `b`: `(start_a, start_b, len)`.
fn longest_common_run(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    for i in 0..a.len() {
        for j in 0..b.len() {
            let mut k = 0;
            while i + k < a.len() && j + k < b.len() && a[i + k] == b[j + k] {
                k += 1;
            }
            if k > best.2 {
                best = (i, j, k);
            }
        }
    }
    best
}

fn common_chars(a: &[char], b: &[char]) -> usize {
    let (i, j, len) = longest_common_run(a, b);
    if len == 0 {
        return 0;
    }
    let mut sum = len;
    if i > 0 && j > 0 {
        sum += common_chars(&a[..i], &b[..j]);
    }
    if i + len < a.len() && j + len < b.len() {
        sum += common_chars(&a[i + len..], &b[j + len..]);
    }
    sum
}

/// Number of matching characters found by recursively taking the longest
/// common substring and then matching what lies left and right of it.
pub fn similar_text(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    common_chars(&a, &b)
}

/// `similar_text` as a percentage of the combined length (0..=100).
pub fn similar_text_percent(a: &str, b: &str) -> f64 {
    let total = a.chars().count() + b.chars().count();
    if total == 0 {
        return 0.0;
    }
    similar_text(a, b) as f64 * 2.0 * 100.0 / total as f64
}
