//! Upstream advert API client.

mod advert_api;
mod http;

pub use advert_api::{AdvertApiClient, AdvertResponse, CategoryResponse, HttpAdvertApiClient};
pub use http::{ClientError, HttpClient};
