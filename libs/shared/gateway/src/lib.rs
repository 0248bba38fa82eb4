pub mod client;
pub mod fixtures;
pub mod navigator;

pub use client::{ApiGateway, GatewayResponse, Provenance};
pub use navigator::{Navigator, StaticNavigator};

pub use reqwest::Method;
