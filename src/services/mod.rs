pub mod credentials;
pub mod dispatcher;
pub mod gateway;
pub mod logger;
pub mod request_builder;
