//! qdk-core
//!
//! The quote consolidation engine: request resolution across kinds,
//! collision-free numbering, same-owner merging with exact totals,
//! conversion tracking and detached delivery.
//!
//! IO happens only through the traits in [`store`]; this crate owns no
//! storage, transport or clock.

use std::sync::Arc;

use qdk_config::ServiceConfig;

mod consolidation;
mod conversion;
mod delivery;
mod error;
mod lookup;
mod notify;
mod render;
mod resolver;
mod sequence;
pub mod store;

pub use consolidation::{ConsolidationEngine, CreatedQuote};
pub use conversion::ConversionIndex;
pub use delivery::{document_filename, DeliveryReport, DeliveryTrigger};
pub use error::{ErrorKind, QuoteError};
pub use lookup::{document_url, QuoteLookup};
pub use notify::{notifier_from_secrets, LogNotifier, RelayNotifier};
pub use render::{TextRenderer, TEXT_CONTENT_TYPE};
pub use resolver::{RequestResolver, PROBE_ORDER};
pub use sequence::SequenceGenerator;

use store::{
    ArticleCatalog, DocumentRenderer, Notifier, QuoteStore, RequestStore, SequenceStore,
};

/// Everything the engine talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub requests: Arc<dyn RequestStore>,
    pub articles: Arc<dyn ArticleCatalog>,
    pub quotes: Arc<dyn QuoteStore>,
    pub counters: Arc<dyn SequenceStore>,
    pub renderer: Arc<dyn DocumentRenderer>,
    pub notifier: Arc<dyn Notifier>,
}

/// Wired set of components sharing one configuration.
#[derive(Clone)]
pub struct QuoteDesk {
    pub sequences: SequenceGenerator,
    pub resolver: RequestResolver,
    pub engine: ConsolidationEngine,
    pub conversion: ConversionIndex,
    pub lookup: QuoteLookup,
    pub delivery: DeliveryTrigger,
}

impl QuoteDesk {
    pub fn new(c: Collaborators, cfg: &ServiceConfig) -> Self {
        let sequences = SequenceGenerator::new(c.counters.clone(), cfg.numbering.clone());
        let resolver = RequestResolver::new(c.requests.clone());
        let delivery = DeliveryTrigger::new(
            c.quotes.clone(),
            c.renderer.clone(),
            c.notifier.clone(),
            cfg.delivery.clone(),
        );
        let engine = ConsolidationEngine::new(
            resolver.clone(),
            c.articles.clone(),
            c.quotes.clone(),
            sequences.clone(),
            delivery.clone(),
            cfg.pricing.clone(),
        );
        let conversion =
            ConversionIndex::new(c.requests.clone(), c.quotes.clone(), cfg.conversion.clone());
        let lookup = QuoteLookup::new(
            resolver.clone(),
            c.quotes.clone(),
            cfg.delivery.public_origin.clone(),
        );

        Self {
            sequences,
            resolver,
            engine,
            conversion,
            lookup,
            delivery,
        }
    }
}
