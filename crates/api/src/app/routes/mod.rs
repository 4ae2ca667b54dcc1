use axum::{routing::get, Router};

pub mod campaigns;
pub mod customers;
pub mod sales;
pub mod services;
pub mod stock;
pub mod system;

/// Router for all authenticated (tenant-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/me/access", get(system::my_access))
        .route("/me/access/:module", get(system::explain_access))
        .route("/recovery", get(sales::recovery))
        .nest("/customers", customers::router())
        .nest("/services", services::router())
        .nest("/sales", sales::router())
        .nest("/stock", stock::router().nest("/campaigns", campaigns::router()))
}
