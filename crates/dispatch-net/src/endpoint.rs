//! Endpoint addressing

/// Anything that resolves to a request URL.
pub trait Endpoint {
    fn url(&self) -> String;
}

impl Endpoint for str {
    fn url(&self) -> String {
        self.to_owned()
    }
}

impl Endpoint for String {
    fn url(&self) -> String {
        self.clone()
    }
}

impl<E: Endpoint + ?Sized> Endpoint for &E {
    fn url(&self) -> String {
        (**self).url()
    }
}

/// A path under a base URL, joined with exactly one `/` between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub base: String,
    pub path: String,
}

impl Route {
    pub fn new(base: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            path: path.into(),
        }
    }
}

impl Endpoint for Route {
    fn url(&self) -> String {
        let base = self.base.trim_end_matches('/');
        let path = self.path.trim_start_matches('/');
        if path.is_empty() {
            base.to_owned()
        } else {
            format!("{base}/{path}")
        }
    }
}
