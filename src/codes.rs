//! Identifier and display-code generators.
//!
//! Ids are opaque and only need to be unique. Order numbers and payment
//! reference codes are shown to people, so they stay short and readable.

use chrono::Utc;
use rand::Rng;

fn unique_id(prefix: &str) -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix: u32 = rand::thread_rng().gen();
    format!("{}_{}_{:08x}", prefix, millis, suffix)
}

/// `order_<unix millis>_<random hex>`
pub fn generate_order_id() -> String {
    unique_id("order")
}

/// `pay_<unix millis>_<random hex>`
pub fn generate_payment_id() -> String {
    unique_id("pay")
}

/// `ORD-<YYYYMMDD>-<4 digits>`
pub fn generate_order_number() -> String {
    let digits: u16 = rand::thread_rng().gen_range(1000..=9999);
    format!("ORD-{}-{}", Utc::now().format("%Y%m%d"), digits)
}

/// `PAY-<unix millis>-<4 digits>`
pub fn generate_reference_code() -> String {
    let digits: u16 = rand::thread_rng().gen_range(1000..=9999);
    format!("PAY-{}-{}", Utc::now().timestamp_millis(), digits)
}
