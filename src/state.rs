use std::sync::Arc;
use chrono_tz::Tz;
use crate::domain::ports::UserRepository;
use crate::domain::services::{
    auth_service::AuthService, class_catalog::ClassCatalog, reservation_ledger::ReservationLedger,
};
use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub default_timezone: Tz,
    pub catalog: Arc<ClassCatalog>,
    pub ledger: Arc<ReservationLedger>,
    pub user_repo: Arc<dyn UserRepository>,
    pub auth_service: Arc<AuthService>,
}
