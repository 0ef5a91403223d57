use rand::rngs::OsRng;
use rand::Rng;

pub const UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
pub const LOWER: &str = "abcdefghijklmnopqrstuvwxyz";
pub const DIGITS: &str = "0123456789";
pub const SYMBOLS: &str = "!@#$%^&*()_+~`|}{[]:;?><,./-=";

pub const MAX_LENGTH: usize = 256;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PasswordError {
  #[error("at least one character class must be selected")]
  EmptyCharset,

  #[error("password length must be between 1 and {MAX_LENGTH}, got {0}")]
  InvalidLength(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordOptions {
  pub length: usize,
  pub upper: bool,
  pub lower: bool,
  pub digits: bool,
  pub symbols: bool,
}

impl Default for PasswordOptions {
  fn default() -> Self {
    Self {
      length: 16,
      upper: true,
      lower: true,
      digits: true,
      symbols: true,
    }
  }
}

impl PasswordOptions {
  pub fn alphabet(&self) -> Vec<char> {
    let mut out = Vec::new();
    for (enabled, set) in [
      (self.upper, UPPER),
      (self.lower, LOWER),
      (self.digits, DIGITS),
      (self.symbols, SYMBOLS),
    ] {
      if enabled {
        out.extend(set.chars());
      }
    }
    out
  }
}

pub fn generate(opts: &PasswordOptions) -> Result<String, PasswordError> {
  generate_with(opts, &mut OsRng)
}

/// Each character is drawn uniformly from the enabled alphabets.
pub fn generate_with<R: Rng + ?Sized>(
  opts: &PasswordOptions,
  rng: &mut R,
) -> Result<String, PasswordError> {
  let alphabet = opts.alphabet();
  if alphabet.is_empty() {
    return Err(PasswordError::EmptyCharset);
  }
  if opts.length == 0 || opts.length > MAX_LENGTH {
    return Err(PasswordError::InvalidLength(opts.length));
  }
  Ok(
    (0..opts.length)
      .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
      .collect(),
  )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratedStrength {
  Faible,
  Moyen,
  Fort,
  Excellent,
}

impl GeneratedStrength {
  pub fn label(self) -> &'static str {
    match self {
      Self::Faible => "FAIBLE",
      Self::Moyen => "MOYEN",
      Self::Fort => "FORT",
      Self::Excellent => "EXCELLENT",
    }
  }

  pub fn color(self) -> &'static str {
    match self {
      Self::Faible => "red",
      Self::Moyen => "orange",
      Self::Fort => "#ffffff",
      Self::Excellent => "lime",
    }
  }
}

/// Rates a generated password: one point for 12+ characters and one per
/// enabled class that actually occurs in it.
pub fn generated_strength(password: &str, opts: &PasswordOptions) -> GeneratedStrength {
  let mut score = 0;
  if password.chars().count() >= 12 {
    score += 1;
  }
  if opts.upper && password.chars().any(|c| c.is_ascii_uppercase()) {
    score += 1;
  }
  if opts.lower && password.chars().any(|c| c.is_ascii_lowercase()) {
    score += 1;
  }
  if opts.digits && password.chars().any(|c| c.is_ascii_digit()) {
    score += 1;
  }
  if opts.symbols && password.chars().any(|c| !c.is_ascii_alphanumeric()) {
    score += 1;
  }

  if score >= 4 {
    GeneratedStrength::Excellent
  } else if score == 3 {
    GeneratedStrength::Fort
  } else if score == 2 {
    GeneratedStrength::Moyen
  } else {
    GeneratedStrength::Faible
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckedStrength {
  TresFaible,
  Moyen,
  Fort,
  TresFort,
}

impl CheckedStrength {
  pub fn label(self) -> &'static str {
    match self {
      Self::TresFaible => "TRÈS FAIBLE",
      Self::Moyen => "MOYEN",
      Self::Fort => "FORT",
      Self::TresFort => "TRÈS FORT",
    }
  }

  pub fn color(self) -> &'static str {
    match self {
      Self::TresFaible => "red",
      Self::Moyen => "orange",
      Self::Fort => "#ffffff",
      Self::TresFort => "lime",
    }
  }
}

/// Strength of a user-typed password. Empty input has no verdict.
pub fn check_strength(password: &str) -> Option<CheckedStrength> {
  if password.is_empty() {
    return None;
  }
  let len = password.chars().count();
  let checks = [
    len >= 8,
    len >= 12,
    password.chars().any(|c| c.is_ascii_uppercase()),
    password.chars().any(|c| c.is_ascii_digit()),
    password.chars().any(|c| !c.is_ascii_alphanumeric()),
  ];
  let score = checks.iter().filter(|&&ok| ok).count();

  Some(match score {
    5 => CheckedStrength::TresFort,
    4 => CheckedStrength::Fort,
    2 | 3 => CheckedStrength::Moyen,
    _ => CheckedStrength::TresFaible,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use rand::rngs::StdRng;
  use rand::SeedableRng;

  fn only(upper: bool, lower: bool, digits: bool, symbols: bool) -> PasswordOptions {
    PasswordOptions {
      length: 64,
      upper,
      lower,
      digits,
      symbols,
    }
  }

  #[test]
  fn unchecked_classes_never_appear() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..50 {
      let pw = generate_with(&only(false, true, true, false), &mut rng).unwrap();
      assert_eq!(pw.chars().count(), 64);
      assert!(pw.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }
    for _ in 0..50 {
      let pw = generate_with(&only(false, false, false, true), &mut rng).unwrap();
      assert!(pw.chars().all(|c| SYMBOLS.contains(c)));
    }
  }

  #[test]
  fn no_classes_is_an_error() {
    let opts = only(false, false, false, false);
    assert_eq!(generate(&opts), Err(PasswordError::EmptyCharset));
  }

  #[test]
  fn length_bounds() {
    let mut opts = PasswordOptions::default();
    opts.length = 0;
    assert_eq!(generate(&opts), Err(PasswordError::InvalidLength(0)));
    opts.length = MAX_LENGTH + 1;
    assert!(generate(&opts).is_err());
    opts.length = 1;
    assert_eq!(generate(&opts).unwrap().chars().count(), 1);
  }

  #[test]
  fn alphabet_concatenates_enabled_sets() {
    assert_eq!(only(true, false, true, false).alphabet().len(), 36);
    assert_eq!(PasswordOptions::default().alphabet().len(), 26 + 26 + 10 + SYMBOLS.len());
  }

  #[test]
  fn generated_strength_scale() {
    let all = PasswordOptions::default();
    assert_eq!(generated_strength("Abcdef12!xyz", &all), GeneratedStrength::Excellent);
    assert_eq!(generated_strength("Abc1!", &all), GeneratedStrength::Excellent);
    assert_eq!(generated_strength("abcdefghijkl", &all), GeneratedStrength::Moyen);

    let lower_only = only(false, true, false, false);
    assert_eq!(generated_strength("abcdef", &lower_only), GeneratedStrength::Faible);
    assert_eq!(generated_strength("abcdefghijklm", &lower_only), GeneratedStrength::Moyen);

    let three = only(true, true, false, false);
    assert_eq!(generated_strength("AbcdefGhijkl", &three), GeneratedStrength::Fort);
    assert_eq!(GeneratedStrength::Fort.color(), "#ffffff");
  }

  #[test]
  fn checker_scale() {
    assert_eq!(check_strength(""), None);
    assert_eq!(check_strength("abc"), Some(CheckedStrength::TresFaible));
    assert_eq!(check_strength("abcdefgh"), Some(CheckedStrength::TresFaible));
    assert_eq!(check_strength("abcdefg1"), Some(CheckedStrength::Moyen));
    assert_eq!(check_strength("Abcdefg1"), Some(CheckedStrength::Moyen));
    assert_eq!(check_strength("Abcdefg1!"), Some(CheckedStrength::Fort));
    assert_eq!(check_strength("Abcdefghij1!"), Some(CheckedStrength::TresFort));
    assert_eq!(CheckedStrength::TresFort.label(), "TRÈS FORT");
    assert_eq!(CheckedStrength::TresFaible.color(), "red");
  }
}
