use unicode_normalization::UnicodeNormalization;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sanitized {
  pub text: String,
  /// Zero-width characters and byte-order marks dropped from the input.
  pub removed: usize,
}

/// U+200B..=U+200D and U+FEFF.
pub fn is_invisible(c: char) -> bool {
  matches!(c, '\u{200B}'..='\u{200D}' | '\u{FEFF}')
}

/// Drops invisible characters, then applies NFKC. Running it on its own
/// output changes nothing.
pub fn sanitize(input: &str) -> Sanitized {
  let mut removed = 0;
  let visible: String = input
    .chars()
    .filter(|&c| {
      let drop = is_invisible(c);
      if drop {
        removed += 1;
      }
      !drop
    })
    .collect();

  Sanitized {
    text: visible.nfkc().collect(),
    removed,
  }
}
