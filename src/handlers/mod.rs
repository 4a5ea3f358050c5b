mod health;
mod upstream;

pub use health::health_check;
pub use upstream::passthrough;
