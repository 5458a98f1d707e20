pub mod comment;
pub mod issue;
pub mod normalize;
pub mod ranking;
pub mod signature;
