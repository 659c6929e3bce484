#[path = "e2e/lifecycle.rs"]
mod lifecycle;

#[path = "e2e/regimes.rs"]
mod regimes;

#[path = "e2e/forecasting.rs"]
mod forecasting;

#[path = "e2e/persistence.rs"]
mod persistence;

#[path = "e2e/concurrency.rs"]
mod concurrency;
