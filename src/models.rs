pub mod conversation;
pub mod option;
pub mod place;
pub mod request;
