use std::cell::Cell;
use std::rc::Rc;

use tracing::{debug, info};

use crate::config::AppSettings;
use crate::error::RuntimeError;
use crate::runtime::descriptor::Element;
use crate::runtime::driver::BrowserDriver;
use crate::runtime::wait::{self, WaitOptions};
use crate::template::model::LocatorSpec;

/// Owner every descriptor of one page object binds to: the shared browser
/// session plus the wait/ready settings of the application under test.
pub struct PageContext {
    driver: Rc<dyn BrowserDriver>,
    app: AppSettings,
    wait: WaitOptions,
    page_url: Option<String>,
    /// Bumped on every navigation; element handles cached under an older
    /// epoch are re-resolved before use.
    epoch: Cell<u64>,
}

impl PageContext {
    pub fn new(driver: Rc<dyn BrowserDriver>, app: AppSettings, wait: WaitOptions) -> Self {
        Self {
            driver,
            app,
            wait,
            page_url: None,
            epoch: Cell::new(0),
        }
    }

    /// Route of the page relative to the application's base URL.
    pub fn with_page_url(mut self, page_url: &str) -> Self {
        self.page_url = Some(page_url.to_string());
        self
    }

    pub fn driver(&self) -> &dyn BrowserDriver {
        self.driver.as_ref()
    }

    pub fn session(&self) -> Rc<dyn BrowserDriver> {
        Rc::clone(&self.driver)
    }

    pub fn app(&self) -> &AppSettings {
        &self.app
    }

    pub fn wait_options(&self) -> WaitOptions {
        self.wait
    }

    pub fn page_url(&self) -> Option<&str> {
        self.page_url.as_deref()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.get()
    }

    /// Forget every handle resolved so far.
    pub fn invalidate(&self) {
        self.epoch.set(self.epoch.get() + 1);
    }

    /// Absolute URL of the page: base URL joined with the page route.
    pub fn full_url(&self) -> String {
        let base = self.app.base_url.trim_end_matches('/');
        match self.page_url.as_deref().map(|p| p.trim_start_matches('/')) {
            Some(path) if !path.is_empty() => format!("{}/{}", base, path),
            _ => format!("{}/", base),
        }
    }

    /// Absolute URL of the page with its route parameters filled in and
    /// `query` appended: route `users/:id` with `[("id", "7")]` and query
    /// `[("tab", "roles")]` gives `<base>/users/7?tab=roles`.
    pub fn url_with(&self, params: &[(&str, &str)], query: &[(&str, &str)]) -> Result<String, RuntimeError> {
        let route = self.page_url.as_deref().unwrap_or("");
        let mut segments = Vec::new();
        for segment in route.trim_start_matches('/').split('/') {
            let Some(name) = segment.strip_prefix(':') else {
                segments.push(segment.to_string());
                continue;
            };
            let (_, value) = params
                .iter()
                .find(|(param, _)| *param == name)
                .ok_or_else(|| RuntimeError::MissingUrlParam {
                    route: route.to_string(),
                    param: name.to_string(),
                })?;
            segments.push(urlencoding::encode(value).into_owned());
        }
        if let Some((param, _)) = params
            .iter()
            .find(|(param, _)| !route.split('/').any(|s| s.strip_prefix(':') == Some(*param)))
        {
            return Err(RuntimeError::UnknownUrlParam {
                route: route.to_string(),
                param: param.to_string(),
            });
        }

        let mut url = format!("{}/{}", self.app.base_url.trim_end_matches('/'), segments.join("/"));
        if !query.is_empty() {
            let pairs: Vec<String> = query
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect();
            url.push('?');
            url.push_str(&pairs.join("&"));
        }
        Ok(url)
    }

    /// Navigate to the page and wait until it is ready.
    pub fn open(&self) -> Result<(), RuntimeError> {
        self.open_with(&[], &[])
    }

    /// Navigate to the page with route parameters and a query string.
    pub fn open_with(&self, params: &[(&str, &str)], query: &[(&str, &str)]) -> Result<(), RuntimeError> {
        let url = self.url_with(params, query)?;
        info!("opening {}", url);
        self.driver.navigate(&url)?;
        self.invalidate();
        self.wait_ready()
    }

    /// Value of route parameter `:name` in the current URL
    /// (`users/:id` on `/users/42` → `42`). The page must be open.
    pub fn url_param(&self, name: &str) -> Result<Option<String>, RuntimeError> {
        self.check_opened()?;
        let current = self.driver.current_url()?;
        let expected = self.full_url();
        Ok(path_segments(&expected)
            .into_iter()
            .zip(path_segments(&current))
            .find(|(e, _)| e.strip_prefix(':') == Some(name))
            .map(|(_, actual)| decode(actual)))
    }

    /// First value of query parameter `name` in the current URL. The page
    /// must be open.
    pub fn query_param(&self, name: &str) -> Result<Option<String>, RuntimeError> {
        self.check_opened()?;
        let current = self.driver.current_url()?;
        let Some((_, rest)) = current.split_once('?') else {
            return Ok(None);
        };
        let query = rest.split('#').next().unwrap_or("");
        Ok(query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
            .find(|(key, _)| decode(key) == name)
            .map(|(_, value)| decode(value)))
    }

    /// One-off lookup of an element by its e2e attribute value, for checks
    /// that do not warrant a declared field.
    pub fn find_by_e2e(self: &Rc<Self>, value: &str) -> Result<Element, RuntimeError> {
        let attribute = &self.app.e2e_attribute;
        let element = Element::bound(
            &format!("{}={}", attribute, value),
            LocatorSpec::attribute(attribute, value),
            0,
            self,
        )?;
        element.resolve()?;
        Ok(element)
    }

    /// Whether the browser is on this page. Route parameters (`:id`) match
    /// any single path segment; query string and fragment are ignored.
    pub fn is_opened(&self) -> Result<bool, RuntimeError> {
        let current = self.driver.current_url()?;
        Ok(url_matches(&self.full_url(), &current))
    }

    pub fn check_opened(&self) -> Result<(), RuntimeError> {
        let current = self.driver.current_url()?;
        let expected = self.full_url();
        if url_matches(&expected, &current) {
            Ok(())
        } else {
            Err(RuntimeError::PageNotOpened {
                expected,
                actual: current,
            })
        }
    }

    /// Wait for the ready signal (when the application has one), then for
    /// the page and table loaders to disappear.
    pub fn wait_ready(&self) -> Result<(), RuntimeError> {
        if self.app.has_page_ready_script {
            let driver = self.driver();
            wait::wait_for(driver, self.wait, "page ready signal", &mut || {
                Ok(driver.page_ready()?)
            })?;
        }
        self.wait_loaders_hidden()
    }

    pub fn wait_loaders_hidden(&self) -> Result<(), RuntimeError> {
        if let Some(class) = &self.app.page_loader_css_class {
            self.wait_class_hidden(class, "page loader")?;
        }
        if let Some(class) = &self.app.table_loader_css_class {
            self.wait_class_hidden(class, "table loader")?;
        }
        Ok(())
    }

    /// Wait until no displayed element carries `class`.
    pub fn wait_class_hidden(&self, class: &str, what: &str) -> Result<(), RuntimeError> {
        let driver = self.driver();
        let locator = LocatorSpec::css_class(class);
        let condition = format!("{} '.{}' to disappear", what, class);
        wait::wait_for(driver, self.wait, &condition, &mut || {
            for handle in driver.find_elements(None, &locator)? {
                if driver.is_displayed(&handle)? {
                    return Ok(false);
                }
            }
            Ok(true)
        })
    }

    /// Wait for a displayed element with `role="dialog"`.
    pub fn wait_dialog_visible(&self) -> Result<(), RuntimeError> {
        let driver = self.driver();
        let locator = LocatorSpec::attribute("role", "dialog");
        wait::wait_for(driver, self.wait, "dialog to be visible", &mut || {
            for handle in driver.find_elements(None, &locator)? {
                if driver.is_displayed(&handle)? {
                    return Ok(true);
                }
            }
            Ok(false)
        })
    }

    /// Wait for a displayed element carrying every configured modal class.
    pub fn wait_modal_visible(&self) -> Result<(), RuntimeError> {
        let Some((first, rest)) = self.app.modal_visible_css_class.split_first() else {
            debug!("no modal classes configured, not waiting");
            return Ok(());
        };
        let driver = self.driver();
        let locator = LocatorSpec::css_class(first);
        let condition = format!("modal '.{}' to be visible", self.app.modal_visible_css_class.join("."));
        wait::wait_for(driver, self.wait, &condition, &mut || {
            for handle in driver.find_elements(None, &locator)? {
                let classes = driver.attribute(&handle, "class")?.unwrap_or_default();
                let all = rest
                    .iter()
                    .all(|c| classes.split_whitespace().any(|have| have == c));
                if all && driver.is_displayed(&handle)? {
                    return Ok(true);
                }
            }
            Ok(false)
        })
    }
}

/// Slash-separated parts of a URL without query string, fragment or
/// trailing slash.
fn path_segments(url: &str) -> Vec<&str> {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    url[..end].trim_end_matches('/').split('/').collect()
}

fn decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|v| v.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

fn url_matches(expected: &str, actual: &str) -> bool {
    let expected_parts = path_segments(expected);
    let actual_parts = path_segments(actual);
    expected_parts.len() == actual_parts.len()
        && expected_parts
            .iter()
            .zip(&actual_parts)
            .all(|(e, a)| e == a || (e.starts_with(':') && !a.is_empty()))
}
