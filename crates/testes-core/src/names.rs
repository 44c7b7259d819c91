//! Name utilities shared by fixtures, units and stories.

/// Last path segment of a Rust type name, without generic arguments.
///
/// `my_crate::fixtures::Address` becomes `Address` and
/// `my_crate::Wrapper<my_crate::Inner>` becomes `Wrapper`.
pub fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Normalize a free-form description into a step key.
///
/// Every character that is not a letter becomes a word break; each word is
/// capitalized and the words are joined: `"a user named 'bob'"` becomes
/// `"AUserNamedBob"`.
pub fn normalize_description(description: &str) -> String {
    description
        .split(|c: char| !c.is_alphabetic())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_type_name_strips_path() {
        assert_eq!(short_type_name("my_crate::fixtures::Address"), "Address");
        assert_eq!(short_type_name("Address"), "Address");
    }

    #[test]
    fn test_short_type_name_strips_generics() {
        assert_eq!(
            short_type_name("my_crate::Wrapper<my_crate::Inner>"),
            "Wrapper"
        );
    }

    #[test]
    fn test_normalize_description() {
        assert_eq!(normalize_description("a user named 'bob'"), "AUserNamedBob");
        assert_eq!(normalize_description("  2 apples, then 3  "), "ApplesThen");
        assert_eq!(normalize_description(""), "");
    }
}
