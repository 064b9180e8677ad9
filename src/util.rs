//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces `{key}` in the template with the matching value in a single pass, so
/// substituted text (articles, JSON shapes) is never re-scanned for placeholders.
/// Braces that do not name a known key are copied as-is.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = String::with_capacity(tpl.len());
  let mut rest = tpl;
  while let Some(open) = rest.find('{') {
    out.push_str(&rest[..open]);
    let after = &rest[open + 1..];
    let replaced = after.find('}').and_then(|close| {
      let key = &after[..close];
      pairs.iter().find(|(k, _)| *k == key).map(|(_, v)| (*v, close))
    });
    match replaced {
      Some((value, close)) => {
        out.push_str(value);
        rest = &after[close + 1..];
      }
      None => {
        out.push('{');
        rest = after;
      }
    }
  }
  out.push_str(rest);
  out
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max_chars: usize) -> String {
  match s.char_indices().nth(max_chars) {
    None => s.to_string(),
    Some((cut, _)) => format!("{}… ({} bytes total)", &s[..cut], s.len()),
  }
}

/// Remove a surrounding Markdown code fence (```json ... ```), if present.
pub fn strip_code_fence(s: &str) -> &str {
  let t = s.trim();
  let Some(inner) = t.strip_prefix("```") else { return t };
  let Some(inner) = inner.strip_suffix("```") else { return t };
  // Drop an info string such as `json` on the opening line.
  match inner.find('\n') {
    Some(nl) if !inner[..nl].trim_start().starts_with('{') => inner[nl + 1..].trim(),
    _ => inner.trim(),
  }
}
