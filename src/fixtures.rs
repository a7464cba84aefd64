//! Static fixture data for the Jaipur quest map.

use crate::entity::{Crate, MapEntity, OtherUser, Position, Token, Viewer};

#[cfg(test)]
#[path = "fixtures_test.rs"]
mod fixtures_test;

const TOKEN_LOGO: &str = "/game-assets/token-pic.png";
const TOKEN_COLOR: &str = "#8A2BE2";
const VIEWER_AVATAR: &str = "/assets/nexuslogo.png";

fn token(id: &str, latitude: f64, longitude: f64, symbol: &str, name: &str) -> Token {
    Token {
        id: id.into(),
        position: Position::from_static(latitude, longitude),
        symbol: symbol.into(),
        name: name.into(),
        logo_url: TOKEN_LOGO.into(),
        background_color: TOKEN_COLOR.into(),
    }
}

#[must_use]
pub fn tokens() -> Vec<Token> {
    vec![
        token("1", 26.9124, 75.7873, "EME", "Emerald"),
        token("2", 26.9151, 75.8104, "RUB", "Ruby"),
        token("3", 26.9121, 75.7777, "SHIB", "Shiba"),
        token("4", 26.9168, 75.7936, "PEN", "Pengu"),
    ]
}

#[must_use]
pub fn other_users() -> Vec<OtherUser> {
    vec![
        OtherUser {
            id: "1".into(),
            position: Position::from_static(26.922_07, 75.778_885),
            name: "Alice".into(),
            avatar_url: "/ppgorilla@2x.png".into(),
        },
        OtherUser {
            id: "2".into(),
            position: Position::from_static(26.917_682, 75.785_522),
            name: "Bob".into(),
            avatar_url: "/pplion@2x.png".into(),
        },
    ]
}

#[must_use]
pub fn crates() -> Vec<Crate> {
    vec![
        Crate { id: "1".into(), position: Position::from_static(26.9180, 75.7989) },
        Crate { id: "2".into(), position: Position::from_static(26.9119, 75.8033) },
    ]
}

/// The viewer before geolocation resolves.
#[must_use]
pub fn viewer() -> Viewer {
    Viewer::placeholder("You", VIEWER_AVATAR)
}

/// Entity set in scope for the map. Users and crates are opt-in.
#[must_use]
pub fn entities(include_users: bool, include_crates: bool) -> Vec<MapEntity> {
    let mut out: Vec<MapEntity> = tokens().into_iter().map(MapEntity::from).collect();
    if include_users {
        out.extend(other_users().into_iter().map(MapEntity::from));
    }
    if include_crates {
        out.extend(crates().into_iter().map(MapEntity::from));
    }
    out
}
