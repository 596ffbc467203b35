//! Route table.

use facturly_auth::{LOGIN_PATH, SIGNUP_PATH};
use facturly_core::ProductId;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Signup,
    Dashboard,
    Clients,
    Invoices,
    Products,
    NewProduct,
    EditProduct(ProductId),
}

impl Route {
    /// Match a location. Query string, fragment and trailing slashes are
    /// ignored; unknown paths give `None`.
    pub fn parse(location: &str) -> Option<Route> {
        let path = location.split(['?', '#']).next().unwrap_or_default();
        if !path.starts_with('/') {
            return None;
        }
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let route = match segments.as_slice() {
            [] => Route::Dashboard,
            ["login"] => Route::Login,
            ["signup"] => Route::Signup,
            ["clients"] => Route::Clients,
            ["factures"] => Route::Invoices,
            ["products"] => Route::Products,
            ["products", "new"] => Route::NewProduct,
            ["products", id, "edit"] => Route::EditProduct(id.parse().ok()?),
            _ => return None,
        };
        Some(route)
    }

    /// Canonical path.
    pub fn path(&self) -> String {
        match self {
            Route::Login => LOGIN_PATH.to_string(),
            Route::Signup => SIGNUP_PATH.to_string(),
            Route::Dashboard => "/".to_string(),
            Route::Clients => "/clients".to_string(),
            Route::Invoices => "/factures".to_string(),
            Route::Products => "/products".to_string(),
            Route::NewProduct => "/products/new".to_string(),
            Route::EditProduct(id) => format!("/products/{id}/edit"),
        }
    }

    /// Reachable without a session.
    pub fn is_public(&self) -> bool {
        matches!(self, Route::Login | Route::Signup)
    }
}

impl core::fmt::Display for Route {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_route() {
        let cases = [
            ("/", Route::Dashboard),
            ("/login", Route::Login),
            ("/signup", Route::Signup),
            ("/clients", Route::Clients),
            ("/factures", Route::Invoices),
            ("/products", Route::Products),
            ("/products/new", Route::NewProduct),
            ("/products/p-42/edit", Route::EditProduct("p-42".parse().unwrap())),
        ];
        for (path, route) in cases {
            assert_eq!(Route::parse(path), Some(route.clone()), "{path}");
            assert_eq!(Route::parse(&route.path()), Some(route));
        }
    }

    #[test]
    fn ignores_trailing_slash_and_query() {
        assert_eq!(Route::parse("/clients/"), Some(Route::Clients));
        assert_eq!(Route::parse("/factures?status=paid"), Some(Route::Invoices));
        assert_eq!(Route::parse("/products/#top"), Some(Route::Products));
        assert_eq!(Route::parse("/?tab=1"), Some(Route::Dashboard));
    }

    #[test]
    fn unknown_paths_do_not_match() {
        for path in ["/nope", "/clients/42", "/products/42", "/products//edit", "clients", ""] {
            assert_eq!(Route::parse(path), None, "{path}");
        }
    }

    #[test]
    fn only_auth_pages_are_public() {
        assert!(Route::Login.is_public());
        assert!(Route::Signup.is_public());
        assert!(!Route::Dashboard.is_public());
        assert!(!Route::NewProduct.is_public());
    }
}
