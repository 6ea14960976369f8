//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Case-insensitive equality after trimming surrounding whitespace.
pub fn eq_ignore_case(a: &str, b: &str) -> bool {
  a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// Lowercase and drop punctuation/whitespace, for comparing speech transcripts.
pub fn normalize_spoken(s: &str) -> String {
  s.chars()
    .filter(|c| !c.is_whitespace() && !c.is_ascii_punctuation() && !is_wide_punct(*c))
    .flat_map(char::to_lowercase)
    .collect()
}

fn is_wide_punct(ch: char) -> bool {
  matches!(ch, '。' | '，' | '？' | '！' | '、' | '¿' | '¡' | '«' | '»' | '…' | '’' | '‘' | '“' | '”')
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut end = max;
  while !s.is_char_boundary(end) {
    end -= 1;
  }
  format!("{}… ({} bytes total)", &s[..end], s.len())
}
