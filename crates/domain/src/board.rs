//! Board snapshot types used to ground the model.

use serde::{Deserialize, Serialize};

/// A card as returned by `GET /boards/{id}/cards`. Unknown fields are dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub name: String,
    #[serde(rename = "idList", default)]
    pub id_list: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub closed: bool,
}

/// A list (column) as returned by `GET /boards/{id}/lists`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardList {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub closed: bool,
    #[serde(default)]
    pub pos: Option<f64>,
}

/// Point-in-time view of the board: its cards and lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub cards: Vec<Card>,
    pub lists: Vec<BoardList>,
}

impl BoardSnapshot {
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty() && self.lists.is_empty()
    }

    /// Compact JSON rendering embedded into the system context.
    pub fn to_grounding(&self) -> String {
        // Serializing plain structs of strings/bools/floats cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"cards":[],"lists":[]}"#.to_owned())
    }
}
