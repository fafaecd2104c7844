//! weft Template - Component template tokenizer
//!
//! Streams an XML template resource into an ordered token sequence plus the
//! set of component ids the template declares. Tokens drive both page
//! assembly and render order, so document order is preserved exactly.

mod resource;
mod template;
mod token;
mod tokenizer;

pub use resource::{FileResource, StringResource, TemplateResource};
pub use template::ComponentTemplate;
pub use token::{Location, TemplateToken, TokenKind};
pub use tokenizer::TemplateParser;

/// Namespace URI that marks structural template elements and reserved
/// attributes (`id`, `type`, `mixins`).
pub const TEMPLATE_NS: &str = "http://weft.rs/schema/template";

/// Template tokenization failure.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("malformed template markup at {location}: {source}")]
    Xml {
        location: Location,
        #[source]
        source: quick_xml::Error,
    },

    #[error("unable to read template resource '{identity}'")]
    Resource {
        identity: String,
        #[source]
        source: std::io::Error,
    },

    #[error("<parameter> element at {location} must carry a name attribute")]
    MissingParameterName { location: Location },

    #[error("element at {location} declares mixins but neither id nor type")]
    MixinsRequireIdOrType { location: Location },

    #[error(
        "component element at {location} may not carry a type attribute; \
         the element name supplies the type"
    )]
    UnexpectedTypeAttribute { location: Location },
}
