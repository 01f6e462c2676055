//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values, in order.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Strip a Markdown code fence around model output, if present.
/// Returns the fenced body, or the trimmed input when there is no fence.
pub fn extract_json_payload(text: &str) -> &str {
  let t = text.trim();
  let Some(start) = t.find("```") else {
    return t;
  };
  let after = &t[start + 3..];
  // skip an info string such as `json`
  let body = match after.find('\n') {
    Some(nl) => &after[nl + 1..],
    None => after,
  };
  match body.find("```") {
    Some(end) => body[..end].trim(),
    None => body.trim(),
  }
}

/// Log-safe truncation for large strings.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    s.to_string()
  } else {
    let head: String = s.chars().take(max).collect();
    format!("{}… ({} bytes total)", head, s.len())
  }
}
