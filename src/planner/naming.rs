use sha2::{Digest, Sha256};

use crate::config::NamingConfig;

/// Expand the naming pattern into a concrete unit name. Deterministic for a
/// given (pattern, focus, date, delta) tuple; the `{hash}` token only takes
/// effect once the policy's pattern opts in.
pub fn unit_name(naming: &NamingConfig, focus: &str, date: &str, delta: f64) -> String {
    let slug = slugify(focus);
    let mut name = naming
        .pattern
        .replace("{focus}", &slug)
        .replace("{date}", date);
    if name.contains("{hash}") {
        name = name.replace("{hash}", &short_hash(&slug, date, delta));
    }
    name
}

fn slugify(focus: &str) -> String {
    let slug: String = focus
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    if slug.is_empty() { "insight".to_string() } else { slug }
}

fn short_hash(slug: &str, date: &str, delta: f64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{slug}|{date}|{delta:.3}").as_bytes());
    let digest = hasher.finalize();
    digest[..4].iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pattern_expands_focus_and_date() {
        let naming = NamingConfig::default();
        assert_eq!(
            unit_name(&naming, "Growth", "2026-08-07", 0.8),
            "growth-2026-08-07"
        );
    }

    #[test]
    fn hash_token_is_stable_and_short() {
        let naming = NamingConfig {
            pattern: "{focus}-{date}-{hash}".to_string(),
            ..NamingConfig::default()
        };
        let first = unit_name(&naming, "growth", "2026-08-07", 0.8);
        let second = unit_name(&naming, "growth", "2026-08-07", 0.8);
        assert_eq!(first, second);

        let suffix = first.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn hash_varies_with_delta() {
        let naming = NamingConfig {
            pattern: "{focus}-{date}-{hash}".to_string(),
            ..NamingConfig::default()
        };
        assert_ne!(
            unit_name(&naming, "growth", "2026-08-07", 0.8),
            unit_name(&naming, "growth", "2026-08-07", 0.4)
        );
    }

    #[test]
    fn awkward_focus_labels_become_safe_slugs() {
        let naming = NamingConfig::default();
        assert_eq!(
            unit_name(&naming, "  Deep Work!  ", "2026-08-07", 0.5),
            "deep-work--2026-08-07"
        );
        assert_eq!(unit_name(&naming, "", "2026-08-07", 0.5), "insight-2026-08-07");
    }
}
