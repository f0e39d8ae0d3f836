//! Processed units of artifacts

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Separator between a parent identifier and the index of a child element
pub const ELEMENT_ID_SEPARATOR: char = '$';

fn default_compare() -> bool {
    true
}

/// A processed unit of an artifact: the whole document or one of its substructures
///
/// Elements form a forest through their parents. Granularity 0 is the artifact itself and
/// every child is one level deeper than its parent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Element {
    identifier: String,
    #[serde(rename = "type")]
    element_type: String,
    content: String,
    #[serde(default)]
    granularity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent_id: Option<String>,
    #[serde(skip)]
    parent: Option<Arc<Element>>,
    #[serde(default = "default_compare")]
    compare: bool,
}

impl Element {
    pub fn new(
        identifier: impl Into<String>,
        element_type: impl Into<String>,
        content: impl Into<String>,
        granularity: u32,
        parent: Option<Arc<Element>>,
        compare: bool,
    ) -> Result<Self, DomainError> {
        let identifier = identifier.into();
        let content = normalize_content(content.into());

        if identifier.trim().is_empty() {
            return Err(DomainError::validation("Element identifier must not be empty"));
        }
        if content.is_empty() {
            return Err(DomainError::validation(format!(
                "Element '{}' has empty content",
                identifier
            )));
        }

        Ok(Self {
            identifier,
            element_type: element_type.into(),
            content,
            granularity,
            parent_id: parent.as_ref().map(|p| p.identifier.clone()),
            parent,
            compare,
        })
    }

    /// Child element `index` of `parent`, one granularity level deeper
    pub fn from_parent(
        parent: &Arc<Element>,
        index: usize,
        content: impl Into<String>,
        compare: bool,
    ) -> Result<Self, DomainError> {
        Self::new(
            format!("{}{}{}", parent.identifier, ELEMENT_ID_SEPARATOR, index),
            parent.element_type.clone(),
            content,
            parent.granularity + 1,
            Some(Arc::clone(parent)),
            compare,
        )
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn element_type(&self) -> &str {
        &self.element_type
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn granularity(&self) -> u32 {
        self.granularity
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    pub fn parent(&self) -> Option<&Arc<Element>> {
        self.parent.as_ref()
    }

    pub fn compare(&self) -> bool {
        self.compare
    }

    /// The artifact this element was derived from
    pub fn root(&self) -> &Element {
        let mut current = self;
        while let Some(parent) = current.parent.as_deref() {
            current = parent;
        }
        current
    }

    /// The ancestor (or self) at `granularity`, `None` if this element is shallower
    pub fn ancestor_at(&self, granularity: u32) -> Option<&Element> {
        let mut current = self;
        while current.granularity > granularity {
            current = current.parent.as_deref()?;
        }

        (current.granularity == granularity).then_some(current)
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.identifier == other.identifier
            && self.element_type == other.element_type
            && self.content == other.content
            && self.granularity == other.granularity
            && self.parent_id == other.parent_id
            && self.compare == other.compare
    }
}

impl Eq for Element {}

fn normalize_content(content: String) -> String {
    if content.contains('\r') {
        content.replace("\r\n", "\n")
    } else {
        content
    }
}

/// Validates deserialized elements and resolves their parent references
///
/// Parents may appear anywhere in the input; the returned elements keep the input order.
pub fn link_elements(elements: Vec<Element>) -> Result<Vec<Arc<Element>>, DomainError> {
    let mut order: Vec<usize> = (0..elements.len()).collect();
    order.sort_by_key(|&i| elements[i].granularity);

    let mut linked: HashMap<String, Arc<Element>> = HashMap::with_capacity(elements.len());
    let mut slots: Vec<Option<Arc<Element>>> = vec![None; elements.len()];

    for index in order {
        let raw = &elements[index];
        let parent = match raw.parent_id.as_deref() {
            Some(parent_id) => Some(linked.get(parent_id).cloned().ok_or_else(|| {
                DomainError::validation(format!(
                    "Parent '{}' of element '{}' not found",
                    parent_id, raw.identifier
                ))
            })?),
            None => None,
        };

        if let Some(parent) = &parent {
            if parent.granularity >= raw.granularity {
                return Err(DomainError::validation(format!(
                    "Element '{}' must be finer grained than its parent '{}'",
                    raw.identifier, parent.identifier
                )));
            }
        }

        let element = Arc::new(Element::new(
            raw.identifier.clone(),
            raw.element_type.clone(),
            raw.content.clone(),
            raw.granularity,
            parent,
            raw.compare,
        )?);

        if linked
            .insert(element.identifier.clone(), Arc::clone(&element))
            .is_some()
        {
            return Err(DomainError::validation(format!(
                "Duplicate element identifier '{}'",
                element.identifier
            )));
        }
        slots[index] = Some(element);
    }

    Ok(slots.into_iter().flatten().collect())
}
