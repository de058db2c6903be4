//! Result-set flattening for the league dashboards.

use serde_json::{Map, Value};

use crate::domain::leaders::StatTable;

/// First result set of a dashboard payload as header-keyed row objects.
///
/// Accepts both the singular `resultSet` and the `resultSets` array. A payload
/// without either yields an empty table; short rows leave trailing headers out.
pub fn stat_table(payload: &Value) -> StatTable {
    let Some(set) = payload
        .get("resultSet")
        .or_else(|| payload.pointer("/resultSets/0"))
    else {
        return StatTable::default();
    };

    let headers: Vec<String> = set
        .get("headers")
        .and_then(Value::as_array)
        .map(|headers| {
            headers
                .iter()
                .map(|header| match header {
                    Value::String(name) => name.clone(),
                    other => other.to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    let rows = set
        .get("rowSet")
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .filter_map(Value::as_array)
                .map(|values| {
                    headers
                        .iter()
                        .cloned()
                        .zip(values.iter().cloned())
                        .collect::<Map<String, Value>>()
                })
                .collect()
        })
        .unwrap_or_default();

    StatTable { headers, rows }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn rows_are_keyed_by_header() {
        let table = stat_table(&json!({
            "resultSets": [{
                "name": "LeagueDashPlayerStats",
                "headers": ["PLAYER_NAME", "PTS"],
                "rowSet": [["Luka Doncic", 33.9], ["Joel Embiid", 34.7]]
            }]
        }));

        assert_eq!(table.headers, vec!["PLAYER_NAME", "PTS"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1]["PLAYER_NAME"], "Joel Embiid");
        assert_eq!(table.rows[1]["PTS"], 34.7);
    }

    #[test]
    fn singular_result_set_is_accepted() {
        let table = stat_table(&json!({
            "resultSet": {"headers": ["TEAM_NAME"], "rowSet": [["Boston Celtics"]]}
        }));
        assert_eq!(table.rows[0]["TEAM_NAME"], "Boston Celtics");
    }

    #[test]
    fn short_rows_and_junk_are_tolerated() {
        let table = stat_table(&json!({
            "resultSets": [{
                "headers": ["A", "B", "C"],
                "rowSet": [[1, 2], "not a row", [1, 2, 3, 4]]
            }]
        }));

        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].len(), 2);
        assert!(!table.rows[0].contains_key("C"));
        assert_eq!(table.rows[1].len(), 3);
    }

    #[test]
    fn missing_result_sets_yield_an_empty_table() {
        assert_eq!(stat_table(&json!({"message": "blocked"})), StatTable::default());
        assert_eq!(stat_table(&json!({"resultSets": []})), StatTable::default());
    }
}
