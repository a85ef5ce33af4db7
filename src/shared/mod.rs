// This is free and unencumbered software released into the public domain.

mod callbacks;
pub use callbacks::*;

mod config;
pub use config::*;

mod controller;
pub use controller::*;

pub mod drivers {
    #[cfg(feature = "sim")]
    pub mod sim;

    #[cfg(all(feature = "android", target_os = "android"))]
    pub mod android;
}

mod error;
pub use error::*;

mod frame;
pub use frame::*;

mod platform;
pub use platform::*;

mod stream;
pub use stream::*;
