pub mod endpoints;
pub mod fetch;
pub mod list;

pub use endpoints::EndpointBook;
pub use fetch::{Credentials, HttpFeed, LoginMode};
