//! System context assembly: instruction template plus board grounding.

use bb_domain::board::BoardSnapshot;

/// Built-in instruction template. `{board_id}` and `{board_data}` are
/// substituted on every turn.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You help a team manage a Trello board from chat. Board id: {board_id}.

Turn each request into at most one Trello REST API call and answer with a single JSON object and nothing else:

{
  "api_action": {
    "endpoint": "/cards",
    "method": "POST",
    "url_params": "idList=LIST_ID",
    "parameters": { "name": "Fix bug #123", "idList": "LIST_ID" }
  },
  "response": "Added 'Fix bug #123' to To Do."
}

- "endpoint" is a path under https://api.trello.com/1 and starts with "/".
- "method" is one of POST, GET, PUT, DELETE.
- Take list and card ids from the board data below. Never invent an id.
- If the request is missing something you need, leave out "api_action" and ask one short question in "response".

Board data:
{board_data}"#;

/// How fresh the grounding blob is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grounding {
    /// Fetched for this turn.
    Fresh,
    /// The live read failed; this is the last successful snapshot.
    Stale,
    /// The live read failed and no earlier snapshot exists.
    Unavailable,
}

impl Grounding {
    fn marker(self) -> Option<&'static str> {
        match self {
            Self::Fresh => None,
            Self::Stale => Some(
                "(stale: the board could not be read just now; this is the last known state)",
            ),
            Self::Unavailable => Some(
                "(unavailable: the board could not be read; ask the user for any ids you need)",
            ),
        }
    }
}

/// Render `template` for one turn.
pub fn render_system_context(
    template: &str,
    board_id: &str,
    snapshot: &BoardSnapshot,
    grounding: Grounding,
) -> String {
    let mut board_data = String::new();
    if let Some(marker) = grounding.marker() {
        board_data.push_str(marker);
        board_data.push('\n');
    }
    board_data.push_str(&snapshot.to_grounding());

    // Board data goes in last so text inside card names is never expanded.
    template
        .replace("{board_id}", board_id)
        .replace("{board_data}", &board_data)
}
