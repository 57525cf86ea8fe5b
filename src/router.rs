use crate::service::auth_service::AuthState;

/// Screens a signed-in user can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Chat,
    History,
    Admin,
}

/// What is actually on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    /// Boot verification still running; never flash the login form first.
    Loading,
    Login,
    Chat,
    History,
    Admin,
}

pub fn route(auth: &AuthState, requested: View) -> Screen {
    let user = match auth {
        AuthState::Booting => return Screen::Loading,
        AuthState::Unauthenticated | AuthState::Authenticating => return Screen::Login,
        AuthState::Authenticated(user) => user,
    };
    match requested {
        View::Chat => Screen::Chat,
        View::History => Screen::History,
        View::Admin if user.is_admin => Screen::Admin,
        View::Admin => Screen::Chat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;

    fn signed_in(is_admin: bool) -> AuthState {
        AuthState::Authenticated(User {
            id: "1".into(),
            display_name: "Ana".into(),
            email: "ana@ufma.br".into(),
            is_admin,
            avatar_url: None,
            login_method: None,
            login_timestamp: None,
        })
    }

    #[test]
    fn booting_shows_loading_for_every_view() {
        for view in [View::Chat, View::History, View::Admin] {
            assert_eq!(route(&AuthState::Booting, view), Screen::Loading);
        }
    }

    #[test]
    fn signed_out_always_lands_on_login() {
        assert_eq!(route(&AuthState::Unauthenticated, View::Admin), Screen::Login);
        assert_eq!(route(&AuthState::Authenticating, View::Chat), Screen::Login);
    }

    #[test]
    fn admin_screen_is_gated_on_the_claim() {
        assert_eq!(route(&signed_in(false), View::Admin), Screen::Chat);
        assert_eq!(route(&signed_in(true), View::Admin), Screen::Admin);
        assert_eq!(route(&signed_in(false), View::History), Screen::History);
    }
}
