use std::time::Duration;

use crate::error::{DriverError, RuntimeError};
use crate::runtime::wait;
use crate::template::model::LocatorSpec;

/// Opaque reference to an element in the live document. Only meaningful to
/// the driver that issued it; it may go stale at any time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub String);

/// The narrow browser contract descriptors are resolved against.
///
/// Methods take `&self`: a session is shared by every page object of a
/// test, and implementations keep whatever interior state they need.
pub trait BrowserDriver {
    /// All elements matching `locator`, in document order, searched below
    /// `scope` or in the whole document.
    fn find_elements(
        &self,
        scope: Option<&ElementHandle>,
        locator: &LocatorSpec,
    ) -> Result<Vec<ElementHandle>, DriverError>;

    fn text(&self, element: &ElementHandle) -> Result<String, DriverError>;

    /// Lowercase tag name (`td`, `th`, `button`).
    fn tag_name(&self, element: &ElementHandle) -> Result<String, DriverError>;

    fn attribute(&self, element: &ElementHandle, name: &str) -> Result<Option<String>, DriverError>;

    fn click(&self, element: &ElementHandle) -> Result<(), DriverError>;

    fn is_displayed(&self, element: &ElementHandle) -> Result<bool, DriverError>;

    fn current_url(&self) -> Result<String, DriverError>;

    fn navigate(&self, url: &str) -> Result<(), DriverError>;

    /// Whether the application reports itself ready. Drivers without such a
    /// signal are always ready.
    fn page_ready(&self) -> Result<bool, DriverError> {
        Ok(true)
    }

    fn find_element(
        &self,
        scope: Option<&ElementHandle>,
        locator: &LocatorSpec,
    ) -> Result<Option<ElementHandle>, DriverError> {
        Ok(self.find_elements(scope, locator)?.into_iter().next())
    }

    /// Block until `predicate` holds or `timeout` elapses. Returns whether
    /// the predicate held. Drivers with native waiting can override the
    /// polling default.
    fn wait_until(
        &self,
        predicate: &mut dyn FnMut() -> Result<bool, RuntimeError>,
        timeout: Duration,
        poll: Duration,
    ) -> Result<bool, RuntimeError> {
        wait::poll_until(predicate, timeout, poll)
    }
}
