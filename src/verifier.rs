//! Best-effort classification of a form submission by what the resulting page shows.
//!
//! A match on page text or URL is evidence, not an acknowledgment from the form
//! backend; false positives and negatives are possible.

use crate::core::config::VerifierConfig;
use crate::core::{settle, PageCapability, SettlePolicy};
use crate::types::FinalPageSignal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub success: bool,
    pub signal: FinalPageSignal,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct SubmissionVerifier {
    success_phrases: Vec<String>,
    url_markers: Vec<String>,
    settle: SettlePolicy,
}

impl SubmissionVerifier {
    pub fn new(config: &VerifierConfig, settle: SettlePolicy) -> Self {
        Self {
            success_phrases: config.success_phrases.clone(),
            url_markers: config.url_markers.clone(),
            settle,
        }
    }

    pub fn with_phrases(mut self, phrases: Vec<String>) -> Self {
        self.success_phrases = phrases;
        self
    }

    /// Reads the page without changing it, so repeated calls on an unchanged page agree.
    pub async fn verify(&self, page: &dyn PageCapability) -> Verification {
        if let Err(e) = settle(page, &self.settle).await {
            debug!("Settle before verification failed: {}", e);
        }

        let body = page.text_content("body").await;
        let url = page.url().await;

        let (body, url) = match (body, url) {
            (Ok(body), Ok(url)) => (body.unwrap_or_default(), url),
            (Err(e), _) | (_, Err(e)) => {
                warn!("Error checking submission status: {}", e);
                return Verification {
                    success: false,
                    signal: FinalPageSignal::Unknown,
                    message: "Form submission status unclear".to_string(),
                };
            }
        };

        self.classify(&body, &url)
    }

    pub fn classify(&self, body: &str, url: &str) -> Verification {
        let body_lower = body.to_lowercase();
        if let Some(phrase) = self
            .success_phrases
            .iter()
            .find(|p| body_lower.contains(&p.to_lowercase()))
        {
            return Verification {
                success: true,
                signal: FinalPageSignal::SuccessPhraseMatched,
                message: format!("Form successfully submitted! (page says \"{}\")", phrase),
            };
        }

        if let Some(marker) = self.url_markers.iter().find(|m| url.contains(m.as_str())) {
            return Verification {
                success: true,
                signal: FinalPageSignal::UrlPatternMatched,
                message: format!("Form successfully submitted! (url contains \"{}\")", marker),
            };
        }

        Verification {
            success: false,
            signal: FinalPageSignal::Unknown,
            message: "No submission confirmation found on the page".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockPage;

    fn verifier() -> SubmissionVerifier {
        SubmissionVerifier::new(&VerifierConfig::default(), SettlePolicy::none())
    }

    #[tokio::test]
    async fn text_match_alone_is_enough() {
        let page = MockPage::new("https://docs.google.com/forms/d/e/abc/viewform");
        page.set_body_text("FINTRAC Internal Form\nYour response has been recorded.");

        let verification = verifier().verify(&page).await;

        assert!(verification.success);
        assert_eq!(verification.signal, FinalPageSignal::SuccessPhraseMatched);
    }

    #[tokio::test]
    async fn url_marker_alone_is_enough() {
        let page = MockPage::new("https://docs.google.com/forms/d/e/abc/formResponse");
        page.set_body_text("FINTRAC Internal Form");

        let verification = verifier().verify(&page).await;

        assert!(verification.success);
        assert_eq!(verification.signal, FinalPageSignal::UrlPatternMatched);
    }

    #[tokio::test]
    async fn no_signal_is_not_an_error() {
        let page = MockPage::new("https://docs.google.com/forms/d/e/abc/viewform");
        page.set_body_text("Legal Name of Corporation *");

        let verification = verifier().verify(&page).await;

        assert!(!verification.success);
        assert_eq!(verification.signal, FinalPageSignal::Unknown);
    }

    #[tokio::test]
    async fn unreadable_page_is_unclear_not_failed() {
        let page = MockPage::new("https://docs.google.com/forms/d/e/abc/formResponse");
        page.set_body_text("Your response has been recorded.");
        page.fail_reads();

        let verification = verifier().verify(&page).await;

        assert!(!verification.success);
        assert_eq!(verification.signal, FinalPageSignal::Unknown);
        assert_eq!(verification.message, "Form submission status unclear");
    }

    #[tokio::test]
    async fn verification_is_idempotent() {
        let page = MockPage::new("https://docs.google.com/forms/d/e/abc/viewform");
        page.set_body_text("thank YOU for your submission");

        let first = verifier().verify(&page).await;
        let second = verifier().verify(&page).await;

        assert_eq!(first, second);
        assert!(first.success);
    }

    #[test]
    fn phrase_match_is_case_insensitive() {
        let verdict = verifier().classify("RESPONSE RECORDED", "https://example.com/viewform");
        assert_eq!(verdict.signal, FinalPageSignal::SuccessPhraseMatched);
    }
}
