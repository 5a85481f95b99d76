macro_rules! api_path {
    ($path:literal) => {
        concat!("/api", $path)
    };
}

pub const ROOT: &str = "/api";

/// Liveness probe, mounted outside the `/api` prefix.
pub const HEALTH: &str = "/health";

pub mod auth {
    pub const REGISTER: &str = api_path!("/auth/register");
    pub const LOGIN: &str = api_path!("/auth/login");
    pub const LOGOUT: &str = api_path!("/auth/logout");
    pub const VERIFY_EMAIL: &str = api_path!("/auth/verify-email");
    pub const ME: &str = api_path!("/auth/me");
}

pub mod scans {
    pub const COLLECTION: &str = api_path!("/scans");
    pub const START: &str = api_path!("/scans/start");
    pub const ITEM: &str = api_path!("/scans/{id}");
    pub const PDF: &str = api_path!("/scans/{id}/pdf");
}

/// Replace the `{id}` placeholder of a templated route.
pub fn with_id(template: &str, id: impl std::fmt::Display) -> String {
    template.replace("{id}", &id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_live_under_api_prefix() {
        for route in [
            auth::REGISTER,
            auth::LOGIN,
            auth::LOGOUT,
            auth::VERIFY_EMAIL,
            auth::ME,
            scans::COLLECTION,
            scans::START,
            scans::ITEM,
            scans::PDF,
        ] {
            assert!(route.starts_with(ROOT), "{route}");
        }
        assert_eq!(with_id(scans::PDF, 42), "/api/scans/42/pdf");
    }
}
