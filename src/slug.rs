/// Lowercases the input and collapses every non-alphanumeric run into a
/// single dash, trimming leading/trailing dashes.
pub fn slugify(base: &str) -> String {
    let mut slug = String::with_capacity(base.len());
    let mut last_dash = true;
    for ch in base.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("item");
    }
    slug
}

/// Candidate slugs in collision-resolution order: `base`, `base-1`, `base-2`…
/// Callers probe each against their table until one is free.
pub fn candidates(base: &str) -> impl Iterator<Item = String> + '_ {
    let root = slugify(base);
    (0u32..).map(move |n| {
        if n == 0 {
            root.clone()
        } else {
            format!("{root}-{n}")
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_normalizes() {
        assert_eq!(slugify("Nordic Oak Table"), "nordic-oak-table");
        assert_eq!(slugify("  Café  ¡Deluxe!  "), "caf-deluxe");
        assert_eq!(slugify("--already--dashed--"), "already-dashed");
        assert_eq!(slugify("UPPER case 123"), "upper-case-123");
    }

    #[test]
    fn slugify_never_empty() {
        assert_eq!(slugify("¡¡¡"), "item");
    }

    #[test]
    fn candidates_follow_suffix_sequence() {
        let got: Vec<String> = candidates("Nordic Oak Table").take(3).collect();
        assert_eq!(
            got,
            vec!["nordic-oak-table", "nordic-oak-table-1", "nordic-oak-table-2"]
        );
    }
}
