//! Knowledge model - elements of artifacts and trace links between them

mod element;
mod trace_link;

pub use element::{link_elements, Element, ELEMENT_ID_SEPARATOR};
pub use trace_link::TraceLink;
