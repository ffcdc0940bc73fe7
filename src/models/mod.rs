//! Data models for lotwatch.

mod category;
mod lot;
mod payload;

pub use category::Category;
pub use lot::{AuctionPhase, Lot};
pub use payload::{LotIdPage, LotPayload, LotStatus, LotType, PicturePayload, SellerPayload};
