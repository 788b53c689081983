//! Secret delivery: access codes and the release pipeline.

mod access_code;
mod service;

pub use access_code::{AccessCodeConfig, AccessCodeService, CODE_BYTES};
pub use service::{access_link, DeliveryService, Redemption, ReleaseReport};
