// ABOUTME: Glob-style wildcard matching with capture support

/// Case-insensitive glob match: `*` matches any run (including empty),
/// `?` matches exactly one character.
pub fn wild_match(pattern: &str, string: &str) -> bool {
    let pat = pattern.to_lowercase();
    let s = string.to_lowercase();
    match_bytes(pat.as_bytes(), s.as_bytes())
}

// Iterative glob with single-star backtracking.
fn match_bytes(pat: &[u8], s: &[u8]) -> bool {
    let (mut p, mut i) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;
    while i < s.len() {
        if p < pat.len() && (pat[p] == b'?' || pat[p] == s[i]) {
            p += 1;
            i += 1;
        } else if p < pat.len() && pat[p] == b'*' {
            star = Some((p, i));
            p += 1;
        } else if let Some((sp, si)) = star {
            p = sp + 1;
            i = si + 1;
            star = Some((sp, si + 1));
        } else {
            return false;
        }
    }
    while p < pat.len() && pat[p] == b'*' {
        p += 1;
    }
    p == pat.len()
}

/// Capture variant: on match, returns the span each `*` consumed, in order.
/// Spans are returned as owned substrings of the original (uncased) input.
pub fn wild_capture(pattern: &str, string: &str) -> Option<Vec<String>> {
    let pat = pattern.to_lowercase();
    let lowered = string.to_lowercase();
    let mut spans = Vec::new();
    if capture_rec(pat.as_bytes(), lowered.as_bytes(), 0, 0, &mut spans) {
        // Lowercasing is byte-length preserving for ASCII; fall back to the
        // lowered text when the input holds multibyte case pairs.
        let source = if string.len() == lowered.len() {
            string
        } else {
            lowered.as_str()
        };
        let out = spans
            .iter()
            .map(|(a, b)| source.get(*a..*b).unwrap_or("").to_string())
            .collect();
        Some(out)
    } else {
        None
    }
}

fn capture_rec(
    pat: &[u8],
    s: &[u8],
    p: usize,
    i: usize,
    spans: &mut Vec<(usize, usize)>,
) -> bool {
    if p == pat.len() {
        return i == s.len();
    }
    match pat[p] {
        b'*' => {
            // Longest-first so greedy captures mirror the matcher.
            for end in (i..=s.len()).rev() {
                spans.push((i, end));
                if capture_rec(pat, s, p + 1, end, spans) {
                    return true;
                }
                spans.pop();
            }
            false
        }
        b'?' => i < s.len() && capture_rec(pat, s, p + 1, i + 1, spans),
        c => i < s.len() && s[i] == c && capture_rec(pat, s, p + 1, i + 1, spans),
    }
}
