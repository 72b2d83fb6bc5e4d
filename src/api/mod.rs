// External service clients
pub mod fhe;
pub mod jupiter;
pub mod pyth;
pub mod range;
pub mod relayer;

pub use fhe::FheClient;
pub use jupiter::JupiterClient;
pub use pyth::PythClient;
pub use range::RangeClient;
pub use relayer::RelayerClient;
