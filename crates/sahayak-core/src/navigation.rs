//! Navigation seam between the OTP controller and whatever hosts it.
//!
//! The controller only ever asks for two views: the role's dashboard after a
//! successful verification, and the role's login screen on explicit back
//! navigation. The role token is opaque and passed through untouched apart
//! from percent-encoding it into the path.

use std::fmt;

use serde::Serialize;

/// A view the controller can send the user to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum Route {
    /// `/dashboard/<role>`, reached after verification succeeds.
    Dashboard { role: String },
    /// `/login/<role>`, reached by navigating back from the entry screen.
    Login { role: String },
}

impl Route {
    /// The role token this route was built with.
    #[must_use]
    pub fn role(&self) -> &str {
        match self {
            Self::Dashboard { role } | Self::Login { role } => role,
        }
    }

    /// Absolute path for the route.
    #[must_use]
    pub fn path(&self) -> String {
        let prefix = match self {
            Self::Dashboard { .. } => "/dashboard",
            Self::Login { .. } => "/login",
        };
        format!("{prefix}/{}", urlencoding::encode(self.role()))
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Performs navigation on behalf of the controller.
///
/// Called from the controller task, so implementations must not block.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_use_fixed_prefixes() {
        let dash = Route::Dashboard { role: "student".to_owned() };
        let login = Route::Login { role: "teacher".to_owned() };
        assert_eq!(dash.path(), "/dashboard/student");
        assert_eq!(login.to_string(), "/login/teacher");
    }

    #[test]
    fn role_is_percent_encoded() {
        let route = Route::Dashboard { role: "head teacher/x".to_owned() };
        assert_eq!(route.path(), "/dashboard/head%20teacher%2Fx");
        assert_eq!(route.role(), "head teacher/x");
    }
}
