use std::rc::Rc;

use crate::error::RuntimeError;
use crate::runtime::context::PageContext;
use crate::runtime::descriptor::{DescriptorState, Element, Owner};
use crate::template::model::LocatorSpec;

struct ListInner {
    field: String,
    locator: LocatorSpec,
    owner: Owner,
}

/// Ordered, 1-indexed collection of elements matching one locator.
///
/// With an indexed attribute locator (`item_row_{n}`) items are also
/// addressable by their name parts through `get`.
#[derive(Clone)]
pub struct ElementList {
    inner: Rc<ListInner>,
}

impl ElementList {
    pub fn new(field: &str, locator: LocatorSpec) -> Self {
        Self {
            inner: Rc::new(ListInner {
                field: field.to_string(),
                locator,
                owner: Owner::default(),
            }),
        }
    }

    pub fn field(&self) -> &str {
        &self.inner.field
    }

    pub fn locator(&self) -> &LocatorSpec {
        &self.inner.locator
    }

    pub fn bind(&self, ctx: &Rc<PageContext>) -> Result<(), RuntimeError> {
        self.inner.owner.bind(&self.inner.field, ctx)
    }

    /// Collections never cache handles, so they are at most `Bound`.
    pub fn state(&self) -> DescriptorState {
        if self.inner.owner.is_bound() {
            DescriptorState::Bound
        } else {
            DescriptorState::Unbound
        }
    }

    fn context(&self) -> Result<&Rc<PageContext>, RuntimeError> {
        self.inner.owner.get(&self.inner.field)
    }

    /// Number of matching elements in the live document.
    pub fn len(&self) -> Result<usize, RuntimeError> {
        let ctx = self.context()?;
        Ok(ctx.driver().find_elements(None, &self.inner.locator)?.len())
    }

    pub fn is_empty(&self) -> Result<bool, RuntimeError> {
        Ok(self.len()? == 0)
    }

    /// The `index`-th matching element, counting from 1.
    pub fn at(&self, index: usize) -> Result<Element, RuntimeError> {
        let len = self.len()?;
        if index == 0 || index > len {
            return Err(RuntimeError::IndexOutOfRange {
                field: self.inner.field.clone(),
                index,
                len,
            });
        }
        Element::bound(
            &format!("{}[{}]", self.inner.field, index),
            self.inner.locator.clone(),
            index - 1,
            self.context()?,
        )
    }

    /// The item whose attribute carries exactly these index values:
    /// `get(&[3])` on `item_row_{n}` is the element with `item_row_3`.
    /// Lists without an indexed locator take a single positional index.
    pub fn get(&self, indexes: &[usize]) -> Result<Element, RuntimeError> {
        let locator = &self.inner.locator;
        if !locator.is_indexed() {
            return match indexes {
                [index] => self.at(*index),
                _ => Err(RuntimeError::InvalidListArgs {
                    field: self.inner.field.clone(),
                    expected: 1,
                    got: indexes.len(),
                }),
            };
        }

        let exact = locator
            .with_indexes(indexes)
            .ok_or_else(|| RuntimeError::InvalidListArgs {
                field: self.inner.field.clone(),
                expected: locator.index_arity(),
                got: indexes.len(),
            })?;
        let label = indexes
            .iter()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(",");
        Element::bound(
            &format!("{}[{}]", self.inner.field, label),
            exact,
            0,
            self.context()?,
        )
    }

    /// Every current item, in document order.
    pub fn all(&self) -> Result<Vec<Element>, RuntimeError> {
        let len = self.len()?;
        let ctx = self.context()?;
        (0..len)
            .map(|position| {
                Element::bound(
                    &format!("{}[{}]", self.inner.field, position + 1),
                    self.inner.locator.clone(),
                    position,
                    ctx,
                )
            })
            .collect()
    }

    /// Text of every current item.
    pub fn texts(&self) -> Result<Vec<String>, RuntimeError> {
        let ctx = self.context()?;
        let driver = ctx.driver();
        driver
            .find_elements(None, &self.inner.locator)?
            .iter()
            .map(|h| Ok(driver.text(h)?))
            .collect()
    }
}
