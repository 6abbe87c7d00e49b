//! Text enhancement: brand-free names and detail-focused descriptions.
//!
//! A [`TextRewriter`] (normally the chat-completions [`ChatClient`]) drafts
//! the text; the [`OutputGuard`] then removes brand tokens and marketing
//! superlatives no matter what the service returned.
//!
//! ### Fallback
//! When no rewriter is configured, the call fails, or the guarded result is
//! empty, the raw input is returned unchanged with `enhanced = false`:
//! - `name` := title, else user input
//! - `description` := description, else empty

pub mod client;
pub mod error;
pub mod request;
pub mod response;
pub mod sanitize;

pub use client::{ChatClient, ChatConfig};
pub use error::EnhanceError;
pub use request::{ItemEnhancementRequest, RewriteMode};
pub use response::{Enhancement, RewrittenText};
pub use sanitize::OutputGuard;

use async_trait::async_trait;
use std::sync::Arc;

use itemmeta_core::{AppConfig, Error};

/// Drafts `{name, description}` for an item.
#[async_trait]
pub trait TextRewriter: Send + Sync {
    async fn rewrite(&self, mode: RewriteMode, req: &ItemEnhancementRequest) -> Result<RewrittenText, EnhanceError>;
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// The deterministic fallback for `req`.
pub fn fallback(req: &ItemEnhancementRequest) -> Enhancement {
    Enhancement {
        name: non_empty(req.title.as_deref())
            .or_else(|| non_empty(req.user_input.as_deref()))
            .unwrap_or_default(),
        description: non_empty(req.description.as_deref()).unwrap_or_default(),
        enhanced: false,
    }
}

/// Brand hint plus a shouted leading token from the title or user input.
fn brand_terms(req: &ItemEnhancementRequest) -> Vec<String> {
    let mut terms: Vec<String> = non_empty(req.brand.as_deref()).into_iter().collect();
    let lead = req
        .title
        .as_deref()
        .or(req.user_input.as_deref())
        .and_then(sanitize::leading_brand_token);
    if let Some(lead) = lead
        && !terms.iter().any(|t| t.eq_ignore_ascii_case(&lead))
    {
        terms.push(lead);
    }
    terms
}

/// Enhancer with fallback. Never fails; check [`Enhancement::enhanced`].
#[derive(Clone)]
pub struct TextEnhancer {
    rewriter: Option<Arc<dyn TextRewriter>>,
    guard: OutputGuard,
}

impl TextEnhancer {
    pub fn new(rewriter: Option<Arc<dyn TextRewriter>>, blocklist: Vec<String>) -> Self {
        Self { rewriter, guard: OutputGuard::new(blocklist) }
    }

    /// Enhancer backed by the configured chat service, or fallback-only when
    /// no key is set.
    pub fn from_config(config: &AppConfig) -> Self {
        let rewriter = match ChatConfig::from_app(config).and_then(ChatClient::new) {
            Ok(client) => {
                tracing::info!(model = client.model(), "text enhancer enabled");
                Some(Arc::new(client) as Arc<dyn TextRewriter>)
            }
            Err(e) => {
                tracing::warn!(error = %e, "text enhancer disabled, raw text will be used");
                None
            }
        };
        Self::new(rewriter, config.marketing_blocklist.clone())
    }

    pub fn is_enabled(&self) -> bool {
        self.rewriter.is_some()
    }

    /// Rewrite freshly scraped page data.
    pub async fn enhance_scraped(&self, req: &ItemEnhancementRequest) -> Enhancement {
        self.run(RewriteMode::Scraped, req).await
    }

    /// Rewrite a hand-typed item.
    pub async fn enhance_manual(&self, user_input: &str, search_context: Option<&str>) -> Enhancement {
        let req = ItemEnhancementRequest {
            user_input: Some(user_input.to_string()),
            search_context: search_context.map(str::to_string),
            ..Default::default()
        };
        self.run(RewriteMode::Manual, &req).await
    }

    /// Re-polish an existing name/description.
    pub async fn improve_existing(&self, req: &ItemEnhancementRequest) -> Enhancement {
        self.run(RewriteMode::Improve, req).await
    }

    async fn run(&self, mode: RewriteMode, req: &ItemEnhancementRequest) -> Enhancement {
        match self.try_rewrite(mode, req).await {
            Ok(enhancement) => enhancement,
            Err(e) => {
                let e = Error::from(e);
                tracing::warn!(mode = ?mode, error = %e, "enhancement unavailable, using fallback");
                fallback(req)
            }
        }
    }

    async fn try_rewrite(&self, mode: RewriteMode, req: &ItemEnhancementRequest) -> Result<Enhancement, EnhanceError> {
        let rewriter = self.rewriter.as_ref().ok_or(EnhanceError::MissingApiKey)?;
        if !req.has_text() {
            return Err(EnhanceError::EmptyResult);
        }

        let drafted = rewriter.rewrite(mode, req).await?;
        let brands = brand_terms(req);

        let name = self.guard.name(&drafted.name, &brands);
        if name.is_empty() {
            return Err(EnhanceError::EmptyResult);
        }
        let description = self.guard.description(&drafted.description, &brands);

        Ok(Enhancement { name, description, enhanced: true })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Rewriter that echoes a canned reply and records what it was asked.
    #[derive(Default)]
    struct FakeRewriter {
        reply: Option<RewrittenText>,
        calls: AtomicUsize,
        modes: Mutex<Vec<RewriteMode>>,
    }

    impl FakeRewriter {
        fn replying(name: &str, description: &str) -> Self {
            Self {
                reply: Some(RewrittenText { name: name.to_string(), description: description.to_string() }),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl TextRewriter for FakeRewriter {
        async fn rewrite(&self, mode: RewriteMode, _req: &ItemEnhancementRequest) -> Result<RewrittenText, EnhanceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.modes.lock().unwrap().push(mode);
            self.reply.clone().ok_or(EnhanceError::HttpError { status: 503 })
        }
    }

    fn enhancer(rewriter: Arc<FakeRewriter>) -> TextEnhancer {
        let blocklist = itemmeta_core::config::DEFAULT_MARKETING_BLOCKLIST.iter().map(|s| s.to_string()).collect();
        TextEnhancer::new(Some(rewriter as Arc<dyn TextRewriter>), blocklist)
    }

    fn sunlu_request() -> ItemEnhancementRequest {
        ItemEnhancementRequest {
            url: Some("https://www.amazon.com/dp/B07PGY2JP1".into()),
            title: Some("SUNLU PLA+ Filament 1.75mm, Perfect High Speed 3D Printer Filament".into()),
            description: Some("Perfect for any 3D printer. 1.75mm diameter, 1kg spool.".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_guard_strips_brand_and_superlatives_from_reply() {
        // The service echoes the branded copy; the guard still has to clean it.
        let rewriter = Arc::new(FakeRewriter::replying(
            "SUNLU PLA+ Filament 1.75mm",
            "Perfect PLA+ filament, 1.75mm diameter on a 1kg spool. Used for 3D printing classroom projects.",
        ));
        let result = enhancer(rewriter.clone()).enhance_scraped(&sunlu_request()).await;

        assert!(result.enhanced);
        assert!(!result.name.contains("SUNLU"));
        assert!(result.name.contains("Filament"));
        assert!(!result.description.contains("Perfect"));
        assert!(result.description.contains("1.75mm"));
        assert_eq!(rewriter.calls.load(Ordering::SeqCst), 1);
    }

    /// Rewriter that hands the scraped copy straight back.
    struct EchoRewriter;

    #[async_trait]
    impl TextRewriter for EchoRewriter {
        async fn rewrite(&self, _mode: RewriteMode, req: &ItemEnhancementRequest) -> Result<RewrittenText, EnhanceError> {
            Ok(RewrittenText {
                name: req.title.clone().unwrap_or_default(),
                description: req.description.clone().unwrap_or_default(),
            })
        }
    }

    #[tokio::test]
    async fn test_branded_filament_listing_end_to_end() {
        let blocklist = itemmeta_core::config::DEFAULT_MARKETING_BLOCKLIST.iter().map(|s| s.to_string()).collect();
        let enhancer = TextEnhancer::new(Some(Arc::new(EchoRewriter) as Arc<dyn TextRewriter>), blocklist);
        let req = ItemEnhancementRequest {
            title: Some("SUNLU PLA+ Filament 1.75mm High-Speed".into()),
            description: Some("Perfect for detailed prints!".into()),
            ..Default::default()
        };

        let result = enhancer.enhance_scraped(&req).await;

        assert!(result.enhanced);
        assert_eq!(result.name, "PLA+ Filament 1.75mm");
        assert!(!result.name.contains("SUNLU"));
        assert!(!result.name.contains("High-Speed"));
        assert!(!result.description.to_lowercase().contains("perfect"));
        assert!(result.description.contains("detailed prints"));
    }

    #[tokio::test]
    async fn test_explicit_brand_hint_removed() {
        let rewriter = Arc::new(FakeRewriter::replying("Prusament Galaxy Black PETG", "PETG filament from Prusament."));
        let req = ItemEnhancementRequest {
            title: Some("Prusament PETG Galaxy Black".into()),
            brand: Some("Prusament".into()),
            ..Default::default()
        };
        let result = enhancer(rewriter).enhance_scraped(&req).await;

        assert!(result.enhanced);
        assert_eq!(result.name, "Galaxy Black PETG");
        assert!(!result.description.contains("Prusament"));
    }

    #[tokio::test]
    async fn test_service_failure_falls_back() {
        let rewriter = Arc::new(FakeRewriter::default());
        let result = enhancer(rewriter).enhance_scraped(&sunlu_request()).await;

        assert!(!result.enhanced);
        assert_eq!(result.name, "SUNLU PLA+ Filament 1.75mm, Perfect High Speed 3D Printer Filament");
        assert_eq!(result.description, "Perfect for any 3D printer. 1.75mm diameter, 1kg spool.");
    }

    #[tokio::test]
    async fn test_reply_empty_after_guard_falls_back() {
        let rewriter = Arc::new(FakeRewriter::replying("SUNLU Ultimate", "Amazing"));
        let result = enhancer(rewriter).enhance_scraped(&sunlu_request()).await;

        assert!(!result.enhanced);
        assert!(result.name.starts_with("SUNLU PLA+"));
    }

    #[tokio::test]
    async fn test_no_rewriter_falls_back_without_calling() {
        let enhancer = TextEnhancer::new(None, Vec::new());
        assert!(!enhancer.is_enabled());

        let result = enhancer.enhance_manual("  glue sticks, 30 pack ", Some("art class")).await;
        assert_eq!(result, Enhancement { name: "glue sticks, 30 pack".into(), description: String::new(), enhanced: false });
    }

    #[tokio::test]
    async fn test_manual_and_improve_modes() {
        let rewriter = Arc::new(FakeRewriter::replying("Glue Sticks (30 pack)", "Washable glue sticks for crafts."));
        let enhancer = enhancer(rewriter.clone());

        let manual = enhancer.enhance_manual("glue sticks 30pk", None).await;
        assert!(manual.enhanced);
        assert_eq!(manual.name, "Glue Sticks (30 pack)");

        let improved = enhancer
            .improve_existing(&ItemEnhancementRequest { title: Some("glue".into()), ..Default::default() })
            .await;
        assert!(improved.enhanced);

        assert_eq!(*rewriter.modes.lock().unwrap(), vec![RewriteMode::Manual, RewriteMode::Improve]);
    }

    #[tokio::test]
    async fn test_nothing_to_rewrite_skips_service() {
        let rewriter = Arc::new(FakeRewriter::replying("x", "y"));
        let result = enhancer(rewriter.clone()).improve_existing(&ItemEnhancementRequest::default()).await;

        assert_eq!(result, Enhancement { name: String::new(), description: String::new(), enhanced: false });
        assert_eq!(rewriter.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_brand_terms() {
        let req = ItemEnhancementRequest {
            title: Some("SUNLU PLA Filament".into()),
            brand: Some("sunlu".into()),
            ..Default::default()
        };
        assert_eq!(brand_terms(&req), vec!["sunlu".to_string()]);

        let req = ItemEnhancementRequest { user_input: Some("ELMERS glue".into()), ..Default::default() };
        assert_eq!(brand_terms(&req), vec!["ELMERS".to_string()]);
    }
}
