//! Wire types shared by the framelens client and the captioning proxy.

pub mod data_url;
pub mod proto;
