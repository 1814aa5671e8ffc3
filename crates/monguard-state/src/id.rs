//! Member id allocation: bijective base-26 letter names.
//!
//! `0 → a`, `25 → z`, `26 → aa`, `27 → ab`, … Ids are handed out from a
//! monotonically increasing cursor and never reused.

/// Convert an allocation index to its letter name.
pub fn index_to_name(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        letters.push(b'a' + (n % 26) as u8);
        n /= 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Convert a letter name back to its allocation index.
///
/// Returns `None` for anything that is not a non-empty run of `a`–`z`
/// (external members may carry arbitrary names).
pub fn name_to_index(name: &str) -> Option<usize> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_lowercase()) {
        return None;
    }
    let mut n: usize = 0;
    for b in name.bytes() {
        n = n.checked_mul(26)?.checked_add(usize::from(b - b'a') + 1)?;
    }
    Some(n - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_letters() {
        assert_eq!(index_to_name(0), "a");
        assert_eq!(index_to_name(5), "f");
        assert_eq!(index_to_name(25), "z");
    }

    #[test]
    fn rolls_over_to_two_letters() {
        assert_eq!(index_to_name(26), "aa");
        assert_eq!(index_to_name(27), "ab");
        assert_eq!(index_to_name(26 + 26), "ba");
        assert_eq!(index_to_name(26 * 27), "aaa");
    }

    #[test]
    fn name_to_index_inverts() {
        for i in [0, 1, 25, 26, 51, 700, 702, 5000] {
            assert_eq!(name_to_index(&index_to_name(i)), Some(i));
        }
    }

    #[test]
    fn name_to_index_rejects_foreign_names() {
        assert_eq!(name_to_index(""), None);
        assert_eq!(name_to_index("ext-mon-id"), None);
        assert_eq!(name_to_index("A"), None);
    }
}
