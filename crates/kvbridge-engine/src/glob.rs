//! Redis-style glob patterns, as accepted by `SCAN ... MATCH`.
//!
//! `*` matches any run of characters (including `/`), `?` matches one
//! character, `[abc]`, `[^abc]` and `[a-z]` match character classes, and `\`
//! escapes the next character.

const SPECIAL: [char; 5] = ['*', '?', '[', ']', '\\'];

/// Escape every glob metacharacter in `literal` so the result matches only
/// the literal string.
#[must_use]
pub fn escape(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    for c in literal.chars() {
        if SPECIAL.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Check whether `text` matches the glob `pattern`.
#[must_use]
pub fn matches(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    match_from(&pattern, &text)
}

fn match_from(p: &[char], t: &[char]) -> bool {
    let (mut pi, mut ti) = (0, 0);
    while pi < p.len() {
        match p[pi] {
            '*' => {
                while pi + 1 < p.len() && p[pi + 1] == '*' {
                    pi += 1;
                }
                if pi + 1 == p.len() {
                    return true;
                }
                return (ti..=t.len()).any(|start| match_from(&p[pi + 1..], &t[start..]));
            }
            '?' => {
                if ti >= t.len() {
                    return false;
                }
                pi += 1;
                ti += 1;
            }
            '[' => {
                let Some(&c) = t.get(ti) else {
                    return false;
                };
                let (matched, next) = match_class(p, pi + 1, c);
                if !matched {
                    return false;
                }
                pi = next;
                ti += 1;
            }
            '\\' if pi + 1 < p.len() => {
                if t.get(ti) != Some(&p[pi + 1]) {
                    return false;
                }
                pi += 2;
                ti += 1;
            }
            c => {
                if t.get(ti) != Some(&c) {
                    return false;
                }
                pi += 1;
                ti += 1;
            }
        }
    }
    ti == t.len()
}

/// Match `c` against the class starting at `p[i]` (just past `[`). Returns
/// the outcome and the index just past the closing `]`.
fn match_class(p: &[char], mut i: usize, c: char) -> (bool, usize) {
    let negate = p.get(i) == Some(&'^');
    if negate {
        i += 1;
    }
    let mut matched = false;
    while i < p.len() {
        if p[i] == ']' {
            i += 1;
            break;
        }
        if p[i] == '\\' && i + 1 < p.len() {
            matched |= p[i + 1] == c;
            i += 2;
        } else if i + 2 < p.len() && p[i + 1] == '-' && p[i + 2] != ']' {
            let (lo, hi) = if p[i] <= p[i + 2] {
                (p[i], p[i + 2])
            } else {
                (p[i + 2], p[i])
            };
            matched |= lo <= c && c <= hi;
            i += 3;
        } else {
            matched |= p[i] == c;
            i += 1;
        }
    }
    (matched != negate, i)
}
