//! Repetition Expansion
//!
//! Rewrites `[seq]*N` groups into N copies of `seq`, innermost group first,
//! so `[a b]*3` becomes `a ba ba b`. The result is capped in length.

use regex::Regex;
use std::sync::LazyLock;

use super::PreparseError;

/// Innermost group only: the body may not contain brackets
static REPEAT_GROUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([^\[\]]*)\]\*([0-9]{1,3})").expect("repetition pattern is valid")
});

pub fn expand_repetitions(text: &str, max_len: usize) -> Result<String, PreparseError> {
    let mut current = text.to_string();
    loop {
        let Some(caps) = REPEAT_GROUP.captures(&current) else {
            break;
        };
        let (Some(whole), Some(body), Some(count)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            break;
        };
        let count: usize = count.as_str().parse().unwrap_or(0);

        let new_len = current.len() - whole.len() + body.len() * count;
        if new_len > max_len {
            return Err(PreparseError::ExpansionTooLong { limit: max_len });
        }

        let mut next = String::with_capacity(new_len);
        next.push_str(&current[..whole.start()]);
        for _ in 0..count {
            next.push_str(body.as_str());
        }
        next.push_str(&current[whole.end()..]);
        current = next;
    }

    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeat_pattern_is_always_active() {
        assert!(REPEAT_GROUP.is_match("[a]*2"));
        assert_eq!(expand_repetitions("[a]*2", 4096).expect("ok"), "aa");
    }

    #[test]
    fn test_simple_repeat() {
        assert_eq!(expand_repetitions("[a b]*3", 4096).expect("ok"), "a ba ba b");
    }

    #[test]
    fn test_nested_repeat_innermost_first() {
        assert_eq!(
            expand_repetitions("[[a]*2 b]*2", 4096).expect("ok"),
            "aa baa b"
        );
    }

    #[test]
    fn test_zero_removes_group() {
        assert_eq!(expand_repetitions("x [a]*0y", 4096).expect("ok"), "x y");
    }

    #[test]
    fn test_unmatched_brackets_untouched() {
        assert_eq!(expand_repetitions("[a b*3", 4096).expect("ok"), "[a b*3");
        assert_eq!(expand_repetitions("[a b]", 4096).expect("ok"), "[a b]");
    }

    #[test]
    fn test_length_cap() {
        let err = expand_repetitions("[a500ms ]*999", 100).expect_err("too long");
        assert_eq!(err, PreparseError::ExpansionTooLong { limit: 100 });
    }
}
