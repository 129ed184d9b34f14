#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

//! Core engine for a small retail storefront: product catalog, append-only
//! inventory ledger, order lifecycle, cart checkout, and low-stock alerting,
//! all backed by a relational store through SeaORM.

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod logging;
pub mod migrator;
pub mod services;

use std::sync::Arc;

use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::{
    alerts::StockAlertService, catalog::CatalogService, checkout::CheckoutService,
    ledger::LedgerService, orders::OrderService,
};

/// The full service graph, wired over one shared pool and event channel.
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<CatalogService>,
    pub ledger: Arc<LedgerService>,
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<OrderService>,
    pub alerts: Arc<StockAlertService>,
}

impl AppServices {
    pub fn build(db: Arc<DbPool>, event_sender: EventSender) -> Self {
        let catalog = Arc::new(CatalogService::new(db.clone(), event_sender.clone()));
        Self {
            ledger: Arc::new(LedgerService::new(db.clone())),
            checkout: Arc::new(CheckoutService::new(
                db.clone(),
                catalog.clone(),
                event_sender.clone(),
            )),
            orders: Arc::new(OrderService::new(db.clone(), event_sender)),
            alerts: Arc::new(StockAlertService::new(db)),
            catalog,
        }
    }
}
