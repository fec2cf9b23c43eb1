//! "Same kind of element" by generated CSS class.
//!
//! The result page carries no semantic markup for listing cards or detail
//! sections, so both are recognised by sharing the class string (or one class
//! token) of a reference element.

use crate::driver::PageHandle;

/// A class attribute used as a proxy for element kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructuralClass(String);

impl StructuralClass {
    pub fn new(class_attr: Option<&str>) -> Self {
        Self(class_attr.unwrap_or_default().to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn token(&self, index: usize) -> Option<&str> {
        self.0.split_whitespace().nth(index)
    }
}

/// All `tag` elements carrying the `token_index`-th class token of
/// `element`. `None` when the element has no such token.
pub async fn siblings_sharing_class_of<H: PageHandle>(
    handle: &H,
    element: &H::Element,
    tag: &str,
    token_index: usize,
) -> anyhow::Result<Option<Vec<H::Element>>> {
    let class = StructuralClass::new(handle.attribute(element, "class").await?.as_deref());
    let Some(token) = class.token(token_index) else {
        return Ok(None);
    };
    let selector = format!("{tag}.{token}");
    let siblings = handle.query_all(&selector).await?;
    Ok(Some(siblings))
}
