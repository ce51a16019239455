use std::sync::Arc;
use crate::{
    config::Settings,
    service::PaymentServices,
};

#[derive(Clone)]
pub struct AppState {
    pub services: Arc<PaymentServices>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(services: Arc<PaymentServices>, settings: Arc<Settings>) -> Self {
        Self { services, settings }
    }
}
