//! Endpoint paths per tenant addressing mode
//!
//! For a tenant-in-path target the host URL already ends in
//! `/SAAS/t/<tenant>`, so its endpoint paths drop the `/SAAS` prefix that
//! tenant-in-host targets need. Both sets start with `/` and are therefore
//! appended directly to the host.

use crate::target::AddressingMode;

/// The endpoint paths used against one kind of target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointPaths {
    /// Browser authorization endpoint
    pub authorize: &'static str,
    /// OAuth2 token endpoint
    pub token: &'static str,
    /// System-user session login endpoint
    pub login: &'static str,
    /// Prefix for all other API calls
    pub api_base: &'static str,
}

/// Paths for targets addressed as `https://<tenant>.<host>`.
pub const TENANT_IN_HOST_PATHS: EndpointPaths = EndpointPaths {
    authorize: "/SAAS/auth/oauth2/authorize",
    token: "/SAAS/auth/oauthtoken",
    login: "/SAAS/API/1.0/REST/auth/system/login",
    api_base: "/SAAS/jersey/manager/api/",
};

/// Paths for targets addressed as `https://<host>/SAAS/t/<tenant>`.
pub const TENANT_IN_PATH_PATHS: EndpointPaths = EndpointPaths {
    authorize: "/auth/oauth2/authorize",
    token: "/auth/oauthtoken",
    login: "/API/1.0/REST/auth/system/login",
    api_base: "/jersey/manager/api/",
};

impl EndpointPaths {
    /// The path set for `mode`.
    pub fn for_mode(mode: AddressingMode) -> &'static EndpointPaths {
        match mode {
            AddressingMode::TenantInHost => &TENANT_IN_HOST_PATHS,
            AddressingMode::TenantInPath => &TENANT_IN_PATH_PATHS,
        }
    }
}

/// Grant procedures bound to one set of endpoint paths.
///
/// The grant operations themselves live in [`super::grant`].
#[derive(Debug, Clone, Copy)]
pub struct TokenService {
    pub(crate) paths: &'static EndpointPaths,
}

impl TokenService {
    /// The endpoint paths this service calls.
    pub fn paths(&self) -> &'static EndpointPaths {
        self.paths
    }
}

/// Returns the token service for a target's addressing mode.
///
/// # Examples
///
/// ```
/// use idmctl::auth::token_service;
/// use idmctl::target::AddressingMode;
///
/// let service = token_service(AddressingMode::TenantInPath);
/// assert_eq!(service.paths().token, "/auth/oauthtoken");
/// ```
pub fn token_service(mode: AddressingMode) -> TokenService {
    TokenService {
        paths: EndpointPaths::for_mode(mode),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_in_host_paths() {
        let service = token_service(AddressingMode::TenantInHost);
        assert_eq!(service.paths().token, "/SAAS/auth/oauthtoken");
        assert_eq!(service.paths().api_base, "/SAAS/jersey/manager/api/");
    }

    #[test]
    fn test_tenant_in_path_paths_drop_saas_prefix() {
        let paths = token_service(AddressingMode::TenantInPath).paths();
        for path in [paths.authorize, paths.token, paths.login, paths.api_base] {
            assert!(path.starts_with('/'), "{path}");
            assert!(!path.starts_with("/SAAS"), "{path}");
        }
    }

    #[test]
    fn test_path_sets_differ() {
        assert_ne!(TENANT_IN_HOST_PATHS, TENANT_IN_PATH_PATHS);
    }
}
