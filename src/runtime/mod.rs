//! Descriptor runtime used by generated page objects.

pub mod context;
pub mod descriptor;
pub mod driver;
pub mod list;
pub mod memory;
pub mod table;
pub mod wait;

pub use crate::config::AppSettings;
pub use crate::error::{DriverError, RuntimeError};
pub use crate::template::model::{AttrValue, LocatorSpec, PathStep};
pub use context::PageContext;
pub use descriptor::{Bindable, DescriptorRegistry, DescriptorState, Element};
pub use driver::{BrowserDriver, ElementHandle};
pub use list::ElementList;
pub use memory::MemoryDriver;
pub use table::{Column, ColumnKey, ColumnValues, Table, TableList};
pub use wait::WaitOptions;
