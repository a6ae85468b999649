pub mod error;
pub mod id;
pub mod product;
pub mod rating;

pub use error::{CoreError, ErrorCategory, Result};
pub use id::{ProductId, UserId};
pub use product::Product;
pub use rating::{RatingScale, mean_rating};
