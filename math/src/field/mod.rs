pub mod base;
pub mod element;
pub mod extension;

pub use base::BaseFieldElement;
pub use element::FieldElement;
pub use extension::ExtensionFieldElement;
