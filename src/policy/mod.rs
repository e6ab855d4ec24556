//! Network argument policy
//!
//! Lexical gate over command-line arguments: classify each token, extract a
//! host, allow only loopback.

pub mod classifier;
pub mod loopback;
pub mod validator;

pub use classifier::{
    classify, extract_host_from_address, extract_host_from_url, AddressKind, Classification,
};
pub use loopback::{is_allowed_host, is_loopback_address};
pub use validator::{validate_network_args, InvocationValidator};
