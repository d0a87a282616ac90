//! Shared application state for all routes.

use crate::config::{ResolvedModel, Settings};
use crate::pipeline::ValidateOnlyInterceptor;
use crate::store::Store;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub model: Arc<ResolvedModel>,
    pub settings: Arc<Settings>,
    pub interceptor: Arc<ValidateOnlyInterceptor>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, model: ResolvedModel, settings: Settings) -> Self {
        let interceptor = ValidateOnlyInterceptor::new(settings.validate_only_param.clone(), &["true"]);
        AppState {
            store,
            model: Arc::new(model),
            settings: Arc::new(settings),
            interceptor: Arc::new(interceptor),
        }
    }
}
