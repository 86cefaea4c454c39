use std::sync::Arc;

use crate::{
    db::{DbPool, OrmConn},
    gateway::PaymentGateway,
    notifier::NotificationBus,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub bus: NotificationBus,
    pub gateway: Arc<dyn PaymentGateway>,
}
