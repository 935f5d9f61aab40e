///
/// Lowercase the given text and replace every non-alphanumeric character with a hyphen.
///
/// Used to derive safe lock-file and log-file names from a rule's display name,
/// e.g. "LS8 BPF" becomes "ls8-bpf".
///
pub fn sanitize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_whitespace_and_punctuation() {
        assert_eq!(sanitize("some one"), "some-one");
        assert_eq!(sanitize("s@me One"), "s-me-one");
        assert_eq!(sanitize("LS8 BPF"), "ls8-bpf");
    }

    #[test]
    fn leaves_already_clean_names_alone() {
        assert_eq!(sanitize("ls7-cpf"), "ls7-cpf");
    }
}
