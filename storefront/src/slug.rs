// storefront/src/slug.rs

/// URL slug for a product name or category.
pub fn generate_slug(text: &str) -> String {
  let lowered = text.trim().to_lowercase().replace('&', " and ");
  let kept: String = lowered
    .chars()
    .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() || *c == '-')
    .collect();

  let mut slug = String::with_capacity(kept.len());
  let mut pending_dash = false;
  for c in kept.chars() {
    if c.is_whitespace() || c == '-' {
      pending_dash = true;
      continue;
    }
    if pending_dash && !slug.is_empty() {
      slug.push('-');
    }
    pending_dash = false;
    slug.push(c);
  }
  slug
}

/// Display form of a category slug: `home-and-garden` becomes `Home & Garden`.
pub fn decode_category_slug(slug: &str) -> String {
  slug
    .split('-')
    .filter(|word| !word.is_empty())
    .map(|word| {
      if word == "and" {
        return "&".to_string();
      }
      let mut chars = word.chars();
      match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
      }
    })
    .collect::<Vec<_>>()
    .join(" ")
}
