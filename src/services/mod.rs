pub mod advisor;
pub mod gateway;
pub mod geocoding;
