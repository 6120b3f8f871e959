mod collective;
mod invoice;
mod payout;
mod sub_invoice;
mod user;

pub use collective::*;
pub use invoice::*;
pub use payout::*;
pub use sub_invoice::*;
pub use user::*;
