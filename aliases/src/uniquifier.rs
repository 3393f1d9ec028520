//! Alias uniqueness checks scoped to the context of the aliased source.

use std::sync::Arc;

use alias_core::Langcode;
use config::UniquifierConfig;
use tracing::debug;

use crate::store::AliasContextStore;

/// Checks generated aliases against the partition of the source they point
/// at, whatever context the ambient request is in.
pub struct AliasUniquifier {
    store: Arc<AliasContextStore>,
    separator: String,
    max_length: usize,
}

impl AliasUniquifier {
    pub fn new(store: Arc<AliasContextStore>, config: &UniquifierConfig) -> Self {
        Self {
            store,
            separator: config.separator.clone(),
            max_length: config.max_length,
        }
    }

    /// Whether another source already holds `alias` in the context of
    /// `source` (or globally).
    pub async fn is_reserved(&self, alias: &str, source: &str, langcode: &Langcode) -> bool {
        let context = self.store.resolve_context(source);
        self.store
            .alias_exists_in(alias, langcode, Some(source), context.as_ref())
            .await
    }

    /// `alias` itself when free, otherwise the first free
    /// `{alias}{separator}{n}` for n = 0, 1, 2, ... with the base truncated
    /// so the result fits in `max_length` characters.
    pub async fn uniquify(&self, alias: &str, source: &str, langcode: &Langcode) -> String {
        if !self.is_reserved(alias, source, langcode).await {
            return alias.to_string();
        }

        let mut n: u64 = 0;
        loop {
            let suffix = format!("{}{}", self.separator, n);
            let candidate = format!(
                "{}{}",
                truncate_chars(alias, self.max_length.saturating_sub(suffix.chars().count())),
                suffix
            );
            if !self.is_reserved(&candidate, source, langcode).await {
                debug!("Uniquified alias {} to {} for {}", alias, candidate, source);
                return candidate;
            }
            n += 1;
        }
    }
}

fn truncate_chars(value: &str, max: usize) -> &str {
    match value.char_indices().nth(max) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("/abcdef", 4), "/abc");
        assert_eq!(truncate_chars("/ab", 10), "/ab");
        assert_eq!(truncate_chars("/äöü", 3), "/äö");
        assert_eq!(truncate_chars("/a", 0), "");
    }
}
