use crate::core::{settle, PageCapability, SettlePolicy};
use crate::errors::{AutomationError, Result};
use tracing::debug;

/// A selector that met the visibility threshold, with the document-order
/// indices of its visible matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorHandle {
    pub selector: String,
    indices: Vec<usize>,
}

impl SelectorHandle {
    pub fn count(&self) -> usize {
        self.indices.len()
    }

    /// Raw match index of the `n`th visible element
    pub fn index(&self, n: usize) -> Option<usize> {
        self.indices.get(n).copied()
    }

    pub fn first(&self) -> Option<usize> {
        self.index(0)
    }
}

#[derive(Debug, Clone)]
pub struct FieldLocator {
    retries: u32,
    settle: SettlePolicy,
}

impl Default for FieldLocator {
    fn default() -> Self {
        Self::new(0, SettlePolicy::none())
    }
}

impl FieldLocator {
    pub fn new(retries: u32, settle: SettlePolicy) -> Self {
        Self { retries, settle }
    }

    /// First candidate with at least `min_count` visible matches. Earlier candidates win;
    /// a candidate below the threshold is never returned partially.
    pub async fn locate(
        &self,
        page: &dyn PageCapability,
        candidates: &[String],
        min_count: usize,
    ) -> Result<SelectorHandle> {
        let mut attempt = 0;
        loop {
            if let Some(handle) = self.locate_once(page, candidates, min_count).await? {
                return Ok(handle);
            }
            if attempt >= self.retries {
                return Err(AutomationError::LocatorMiss {
                    candidates: candidates.to_vec(),
                    min_count,
                });
            }
            attempt += 1;
            debug!(
                "No selector met threshold {}, retrying after settle ({}/{})",
                min_count, attempt, self.retries
            );
            if let Err(e) = settle(page, &self.settle).await {
                debug!("Settle before retry failed: {}", e);
            }
        }
    }

    async fn locate_once(
        &self,
        page: &dyn PageCapability,
        candidates: &[String],
        min_count: usize,
    ) -> Result<Option<SelectorHandle>> {
        for selector in candidates {
            let count = match page.count(selector).await {
                Ok(count) => count,
                Err(e) => {
                    debug!("Skipping selector {}: {}", selector, e);
                    continue;
                }
            };
            if count < min_count {
                debug!("Selector {} matched {} < {}", selector, count, min_count);
                continue;
            }

            let mut indices = Vec::with_capacity(count);
            for i in 0..count {
                if page.is_visible(selector, i).await.unwrap_or(false) {
                    indices.push(i);
                }
            }

            if indices.len() >= min_count {
                debug!(
                    "Selector {} matched {} visible element(s)",
                    selector,
                    indices.len()
                );
                return Ok(Some(SelectorHandle {
                    selector: selector.clone(),
                    indices,
                }));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockPage, MockView};

    fn candidates(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn earlier_candidate_wins_when_both_qualify() {
        let page = MockPage::with_view(
            "https://example.com",
            MockView::new().with_elements("a", 3).with_elements("b", 5),
        );
        let handle = FieldLocator::default()
            .locate(&page, &candidates(&["a", "b"]), 2)
            .await
            .unwrap();
        assert_eq!(handle.selector, "a");
        assert_eq!(handle.count(), 3);
    }

    #[tokio::test]
    async fn hidden_matches_do_not_count() {
        let page = MockPage::with_view(
            "https://example.com",
            MockView::new()
                .with_hidden_elements("a", 1)
                .with_elements("a", 1)
                .with_elements("b", 2),
        );
        let handle = FieldLocator::default()
            .locate(&page, &candidates(&["a", "b"]), 2)
            .await
            .unwrap();
        assert_eq!(handle.selector, "b");

        let single = FieldLocator::default()
            .locate(&page, &candidates(&["a"]), 1)
            .await
            .unwrap();
        assert_eq!(single.first(), Some(1));
    }

    #[tokio::test]
    async fn miss_reports_threshold_after_retries() {
        let page = MockPage::with_view("https://example.com", MockView::new().with_elements("a", 1));
        let locator = FieldLocator::new(
            2,
            SettlePolicy::DomQuiet {
                quiet_ms: 0,
                timeout_ms: 0,
            },
        );
        let err = locator
            .locate(&page, &candidates(&["a", "missing"]), 4)
            .await
            .unwrap_err();
        assert!(err.is_locator_miss());
        assert_eq!(page.settle_calls(), 2);
    }
}
