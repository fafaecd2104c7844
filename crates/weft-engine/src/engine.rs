//! Engine façade

use std::rc::Rc;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use weft_page::{ComponentPageElement, DefaultCoercer};
use weft_render::{MarkupWriter, RenderQueue};

use crate::cache::TemplateCache;
use crate::loader::PageLoader;
use crate::pool::{CheckedOutPage, PagePool};
use crate::registry::ComponentRegistry;
use crate::EngineError;

/// Engine configuration options.
#[derive(Debug, Clone)]
pub struct Config {
    /// Locale used when a render does not name one.
    pub default_locale: String,

    /// Pooled page instances kept per (page, locale).
    pub max_pooled_pages: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_locale: "en".to_string(),
            max_pooled_pages: 16,
        }
    }
}

/// One rendering engine instance. Engines are single-threaded (one per
/// worker); the template cache may be shared between them.
pub struct WeftEngine {
    config: Config,
    cache: Arc<TemplateCache>,
    loader: PageLoader,
    pool: PagePool,
}

impl WeftEngine {
    pub fn new(registry: ComponentRegistry, config: Config) -> Self {
        Self::with_cache(registry, config, Arc::new(TemplateCache::new()))
    }

    /// Build an engine over a shared template cache.
    pub fn with_cache(
        registry: ComponentRegistry,
        config: Config,
        cache: Arc<TemplateCache>,
    ) -> Self {
        let pool = PagePool::new(config.max_pooled_pages);

        // A template change retires every pooled page; the next request
        // reassembles from the fresh template.
        let generation = pool.generation_handle();
        cache.add_invalidation_listener(move |_identity| {
            generation.fetch_add(1, Ordering::SeqCst);
        });

        let loader = PageLoader::new(
            Rc::new(registry),
            cache.clone(),
            Rc::new(DefaultCoercer),
        );
        tracing::debug!("weft engine initialized");
        Self {
            config,
            cache,
            loader,
            pool,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &Arc<TemplateCache> {
        &self.cache
    }

    pub fn loader(&self) -> &PageLoader {
        &self.loader
    }

    /// Render a page in the default locale.
    pub fn render_page(&self, name: &str) -> Result<String, EngineError> {
        self.render_page_in(name, &self.config.default_locale)
    }

    /// Render a page: check a clean instance out of the pool (or load a
    /// fresh one), drive the render queue to completion, and serialize.
    pub fn render_page_in(&self, name: &str, locale: &str) -> Result<String, EngineError> {
        let page = match self.pool.checkout(name, locale) {
            Some(page) => page,
            None => self.loader.load_page(name, locale)?,
        };
        let checked_out = CheckedOutPage::new(&self.pool, page);

        let root = checked_out
            .page()
            .root()
            .cloned()
            .ok_or_else(|| EngineError::TemplateStructure {
                message: format!("page '{name}' has no root element"),
            })?;

        let mut writer = MarkupWriter::new();
        let mut queue = RenderQueue::new();
        ComponentPageElement::render(&root, &mut writer, &mut queue);
        queue.run(&mut writer)?;

        Ok(writer.to_markup())
    }
}
