pub mod atomic;
pub mod host;

pub use atomic::{ConversionRules, Converter, ValidationFailure};
pub use host::{
    ConverterCache, ExtensionFunction, ExtensionSignature, HostTarget, HostValue, JPConverter, PJConverter,
};
